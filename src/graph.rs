//! Tree geometry engine.
//!
//! Computes Cartesian positions for every drawable node and one
//! deduplicated edge per connection, straight or arced. The result is a
//! pure function of the immutable tree data; build it once per
//! [`SkillTree`] and share it across renders.

use std::collections::{BTreeMap, HashSet};
use std::f64::consts::PI;

use kurbo::Point;
use tracing::{debug, warn};

use crate::tree::{NodeGroup, SkillTree, TreeNode};

/// A positioned, drawable node.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub pos: Point,
    pub size: f64,
}

/// One undirected edge between two drawable nodes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GraphEdge {
    pub start_id: String,
    pub end_id: String,
    pub start: Point,
    pub end: Point,
    /// Arc along the shared orbit rather than a straight segment.
    pub is_curved: bool,
    /// Arc radius (the orbit's configured radius).
    pub radius: f64,
    /// Sweep direction of the arc; meaningless for straight edges.
    pub is_clockwise: bool,
}

/// Precomputed geometry for one skill tree.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TreeGraph {
    /// Keyed by node id; ordered for deterministic output.
    pub nodes: BTreeMap<String, GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl TreeGraph {
    #[tracing::instrument(skip_all)]
    pub fn new(tree: &SkillTree) -> Self {
        let nodes = position_nodes(tree);
        let edges = collect_edges(tree, &nodes);
        debug!(nodes = nodes.len(), edges = edges.len(), "computed tree geometry");
        Self { nodes, edges }
    }
}

/// Angle zero points straight up; orbit positions advance clockwise.
pub fn node_position(tree: &SkillTree, group: &NodeGroup, node: &TreeNode) -> Point {
    let per_orbit = f64::from(tree.skills_per_orbit[node.orbit]);
    let radius = tree.orbit_radii[node.orbit];
    let angle = 2.0 * PI / per_orbit * node.orbit_index as f64 - PI / 2.0;
    group.center + radius * kurbo::Vec2::new(angle.cos(), angle.sin())
}

/// An arc sweeps clockwise when the cross product of the two endpoint
/// offsets from the orbit center is non-positive.
pub fn is_clockwise(start: Point, end: Point, center: Point) -> bool {
    let a = start - center;
    let b = end - center;
    a.cross(b) <= 0.0
}

fn position_nodes(tree: &SkillTree) -> BTreeMap<String, GraphNode> {
    let mut nodes = BTreeMap::new();
    for group in tree.groups.values() {
        for node_id in &group.node_ids {
            let Some(node) = tree.nodes.get(node_id) else {
                continue;
            };
            if node.is_mastery || node.is_class_start() {
                continue;
            }
            if node.orbit >= tree.skills_per_orbit.len() || node.orbit >= tree.orbit_radii.len() {
                warn!(node_id = %node.id, orbit = node.orbit, "node orbit out of range, skipped");
                continue;
            }
            nodes.insert(
                node_id.clone(),
                GraphNode {
                    id: node_id.clone(),
                    pos: node_position(tree, group, node),
                    size: node.size(),
                },
            );
        }
    }
    nodes
}

fn collect_edges(tree: &SkillTree, nodes: &BTreeMap<String, GraphNode>) -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    // Iterate the ordered node map so edge order is deterministic.
    for (node_id, graph_node) in nodes {
        let Some(node) = tree.nodes.get(node_id) else {
            continue;
        };
        if node.is_mastery || node.is_class_start() {
            continue;
        }
        for other_id in &node.out {
            let Some(other) = tree.nodes.get(other_id) else {
                warn!(from = %node_id, to = %other_id, "connection to unknown node, skipped");
                continue;
            };
            if !node.connects_to(other) {
                continue;
            }
            let Some(other_graph_node) = nodes.get(other_id) else {
                continue;
            };
            // A→B and B→A are the same edge.
            let key = if node_id < other_id {
                (node_id.clone(), other_id.clone())
            } else {
                (other_id.clone(), node_id.clone())
            };
            if !seen.insert(key) {
                continue;
            }

            let start_group = tree.group_of(node_id);
            let end_group = tree.group_of(other_id);
            let same_group = match (start_group, end_group) {
                (Some(a), Some(b)) => a.id == b.id,
                _ => false,
            };
            let is_curved = same_group && node.orbit == other.orbit;
            let center = start_group.map(|g| g.center).unwrap_or_default();

            edges.push(GraphEdge {
                start_id: node_id.clone(),
                end_id: other_id.clone(),
                start: graph_node.pos,
                end: other_graph_node.pos,
                is_curved,
                radius: tree.orbit_radii[node.orbit],
                is_clockwise: is_clockwise(graph_node.pos, other_graph_node.pos, center),
            });
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SkillTree;

    const TINY_TREE: &str = r#"{
        "min_x": -1000, "max_x": 1000, "min_y": -1000, "max_y": 1000,
        "constants": {
            "skillsPerOrbit": [1, 6, 12],
            "orbitRadii": [0, 82, 162]
        },
        "nodes": {
            "root": {"out": ["1"]},
            "1": {"name": "Heart of the Warrior", "isKeystone": true,
                  "orbit": 1, "orbitIndex": 0, "out": ["2"]},
            "2": {"name": "Strength", "orbit": 1, "orbitIndex": 3, "out": ["1", "3"]},
            "3": {"name": "Forceful Skewering", "isNotable": true,
                  "orbit": 2, "orbitIndex": 6, "out": []},
            "4": {"name": "Slaughter", "ascendancyName": "Slayer",
                  "isAscendancyStart": true, "orbit": 0, "orbitIndex": 0,
                  "out": ["5"]},
            "5": {"name": "Endless Hunger", "ascendancyName": "Slayer",
                  "isNotable": true, "orbit": 1, "orbitIndex": 2, "out": []},
            "6": {"name": "Scion", "classStartIndex": 0, "orbit": 1,
                  "orbitIndex": 1, "out": ["2"]}
        },
        "groups": {
            "g1": {"x": 0, "y": 0, "orbits": 6, "nodes": ["1", "2", "3", "6"]},
            "g2": {"x": 250, "y": 250, "orbits": 3, "nodes": ["4", "5"]}
        },
        "classes": [
            {"name": "Duelist", "ascendancies": [{"id": "Slayer"}]}
        ]
    }"#;

    fn tiny_tree() -> SkillTree {
        SkillTree::from_reader(TINY_TREE.as_bytes()).unwrap()
    }

    #[test]
    fn positions_sit_on_the_orbit_radius() {
        let tree = tiny_tree();
        let graph = TreeGraph::new(&tree);
        for (id, graph_node) in &graph.nodes {
            let node = &tree.nodes[id];
            let center = tree.group_of(id).unwrap().center;
            let distance = (graph_node.pos - center).hypot();
            let radius = tree.orbit_radii[node.orbit];
            assert!(
                (distance - radius).abs() < 1e-9,
                "node {id}: distance {distance} != radius {radius}"
            );
        }
    }

    #[test]
    fn orbit_angle_zero_points_up() {
        let tree = tiny_tree();
        let graph = TreeGraph::new(&tree);
        // Node 1: orbit 1 (radius 82), orbitIndex 0 → straight up from (0,0).
        let pos = graph.nodes["1"].pos;
        assert!(pos.x.abs() < 1e-9);
        assert!((pos.y + 82.0).abs() < 1e-9);
        // Node 2: orbitIndex 3 of 6 → straight down.
        let pos = graph.nodes["2"].pos;
        assert!(pos.x.abs() < 1e-9);
        assert!((pos.y - 82.0).abs() < 1e-9);
    }

    #[test]
    fn masteries_and_class_starts_are_not_drawn() {
        let graph = TreeGraph::new(&tiny_tree());
        assert!(!graph.nodes.contains_key("6"));
        assert!(!graph.nodes.contains_key("root"));
    }

    #[test]
    fn edges_are_deduplicated() {
        let graph = TreeGraph::new(&tiny_tree());
        // 1↔2 (listed in both directions), 2→3, 4→5: three edges total.
        assert_eq!(graph.edges.len(), 3);
        let pairs: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.start_id.as_str(), e.end_id.as_str()))
            .collect();
        assert!(pairs.contains(&("1", "2")));
    }

    #[test]
    fn co_orbital_edges_curve_and_cross_group_edges_do_not() {
        let graph = TreeGraph::new(&tiny_tree());
        let edge_1_2 = graph
            .edges
            .iter()
            .find(|e| e.start_id == "1" && e.end_id == "2")
            .unwrap();
        assert!(edge_1_2.is_curved);
        assert_eq!(edge_1_2.radius, 82.0);

        // 2 and 3 share a group but not an orbit.
        let edge_2_3 = graph
            .edges
            .iter()
            .find(|e| e.start_id == "2" && e.end_id == "3")
            .unwrap();
        assert!(!edge_2_3.is_curved);
    }

    #[test]
    fn sweep_direction_follows_the_cross_product() {
        let center = Point::new(0.0, 0.0);
        let r = 82.0;
        // start (r, 0), end (0, r): cross = r² > 0 → counter-clockwise.
        assert!(!is_clockwise(Point::new(r, 0.0), Point::new(0.0, r), center));
        // start (0, r), end (r, 0): cross = −r² ≤ 0 → clockwise.
        assert!(is_clockwise(Point::new(0.0, r), Point::new(r, 0.0), center));
        // Degenerate collinear case counts as clockwise.
        assert!(is_clockwise(Point::new(r, 0.0), Point::new(2.0 * r, 0.0), center));
    }
}
