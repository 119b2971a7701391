//! SVG diagram rendering.
//!
//! Combines precomputed [`TreeGraph`] geometry with a build's taken-node
//! set into a self-contained vector document. Untaken elements are drawn
//! first so taken ones sit on top; nodes of inactive ascendancies are
//! hidden but stay logical members of the diagram.

use std::collections::HashSet;

use kurbo::Point;
use tracing::debug;

use crate::graph::{GraphEdge, GraphNode, TreeGraph};
use crate::tree::{ASCENDANCY_STAGE, SkillTree, TreeNode};

const TAKEN_COLOR: &str = "#FF0000";
const UNTAKEN_COLOR: &str = "#736d6a";
const EDGE_WIDTH: f64 = 24.0;
const ASCENDANCY_BACKDROP_RADIUS: f64 = 700.0;
const ASCENDANCY_BACKDROP_COLOR: &str = "#35383B";

// Margins trimming the dataset extents down to the drawn area.
const MARGIN_LEFT: f64 = 2400.0;
const MARGIN_TOP: f64 = 800.0;
const MARGIN_WIDTH: f64 = 2800.0;
const MARGIN_HEIGHT: f64 = 1100.0;

/// One drawable diagram element with its per-render visual state.
enum Shape<'a> {
    Node {
        node: &'a GraphNode,
        is_taken: bool,
        is_hidden: bool,
    },
    Edge {
        edge: &'a GraphEdge,
        is_taken: bool,
        is_hidden: bool,
    },
}

impl Shape<'_> {
    fn is_taken(&self) -> bool {
        match self {
            Self::Node { is_taken, .. } | Self::Edge { is_taken, .. } => *is_taken,
        }
    }

    fn color(&self) -> &'static str {
        if self.is_taken() { TAKEN_COLOR } else { UNTAKEN_COLOR }
    }

    fn write_svg(&self, out: &mut String) {
        match self {
            Self::Node { is_hidden: true, .. } | Self::Edge { is_hidden: true, .. } => {}
            Self::Node { node, .. } => {
                out.push_str(&format!(
                    "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\" data-id=\"{}\"/>\n",
                    node.pos.x,
                    node.pos.y,
                    node.size,
                    self.color(),
                    node.id,
                ));
            }
            Self::Edge { edge, .. } if edge.is_curved => {
                // SVG sweep flag 0 draws the arc clockwise in this
                // y-down coordinate space.
                let sweep = if edge.is_clockwise { 0 } else { 1 };
                out.push_str(&format!(
                    "<path d=\"M {} {} A {} {} 0 0 {} {} {}\" fill=\"transparent\" \
                     stroke=\"{}\" stroke-width=\"{}\"/>\n",
                    edge.start.x,
                    edge.start.y,
                    edge.radius,
                    edge.radius,
                    sweep,
                    edge.end.x,
                    edge.end.y,
                    self.color(),
                    EDGE_WIDTH,
                ));
            }
            Self::Edge { edge, .. } => {
                out.push_str(&format!(
                    "<line fill=\"transparent\" stroke=\"{}\" stroke-width=\"{}\" \
                     x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"/>\n",
                    self.color(),
                    EDGE_WIDTH,
                    edge.start.x,
                    edge.start.y,
                    edge.end.x,
                    edge.end.y,
                ));
            }
        }
    }
}

/// The ascendancy whose start node is in the taken set, if any.
///
/// Re-derived per render; a build with no ascendancy nodes taken shows
/// the full unhidden ascendancy layer.
pub fn active_ascendancy<'a>(tree: &'a SkillTree, taken: &HashSet<String>) -> Option<&'a str> {
    tree.asc_start_nodes
        .iter()
        .find(|(_, node_id)| taken.contains(*node_id))
        .map(|(name, _)| name.as_str())
}

/// Keystone nodes present in the taken set, ordered by node id.
pub fn keystones_taken<'a>(tree: &'a SkillTree, taken: &HashSet<String>) -> Vec<&'a TreeNode> {
    let mut keystones: Vec<&TreeNode> = tree
        .nodes
        .values()
        .filter(|node| node.is_keystone && taken.contains(&node.id))
        .collect();
    keystones.sort_by(|a, b| a.id.cmp(&b.id));
    keystones
}

/// Render the tree diagram with taken/untaken/hidden overlays as an SVG
/// document.
#[tracing::instrument(skip_all)]
pub fn render_diagram(tree: &SkillTree, graph: &TreeGraph, taken: &HashSet<String>) -> String {
    let active_asc = active_ascendancy(tree, taken).unwrap_or("");
    debug!(taken = taken.len(), active_asc, "rendering tree diagram");

    let hidden_node = |id: &str| -> bool {
        tree.nodes.get(id).is_some_and(|node| {
            !node.ascendancy_name.is_empty() && node.ascendancy_name != active_asc
        })
    };

    let mut shapes: Vec<Shape> = Vec::with_capacity(graph.nodes.len() + graph.edges.len());
    for node in graph.nodes.values() {
        shapes.push(Shape::Node {
            node,
            is_taken: taken.contains(&node.id),
            is_hidden: hidden_node(&node.id),
        });
    }
    for edge in &graph.edges {
        shapes.push(Shape::Edge {
            edge,
            is_taken: taken.contains(&edge.start_id) && taken.contains(&edge.end_id),
            // Hidden only when BOTH endpoints sit in inactive ascendancies.
            is_hidden: hidden_node(&edge.start_id) && hidden_node(&edge.end_id),
        });
    }
    // Untaken first, so taken elements are drawn on top.
    shapes.sort_by_key(Shape::is_taken);

    let (view_pos, view_size) = view_box(tree);
    let mut svg = format!(
        "<svg style=\"background-color: transparent;\" viewBox=\"{} {} {} {}\">\n",
        view_pos.x, view_pos.y, view_size.0, view_size.1,
    );
    if !active_asc.is_empty() {
        svg.push_str(&format!(
            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"/>\n",
            ASCENDANCY_STAGE.x,
            ASCENDANCY_STAGE.y,
            ASCENDANCY_BACKDROP_RADIUS,
            ASCENDANCY_BACKDROP_COLOR,
        ));
    }
    for shape in &shapes {
        shape.write_svg(&mut svg);
    }
    svg.push_str("</svg>\n");
    svg
}

fn view_box(tree: &SkillTree) -> (Point, (f64, f64)) {
    let size_x = tree.max_x - tree.min_x;
    let size_y = tree.max_y - tree.min_y;
    (
        Point::new(tree.min_x + MARGIN_LEFT, tree.min_y + MARGIN_TOP),
        (size_x - MARGIN_WIDTH, size_y - MARGIN_HEIGHT),
    )
}
