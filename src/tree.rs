//! Skill-tree dataset loader.
//!
//! One [`SkillTree`] per game version, built once at startup from the
//! static JSON dataset and shared read-only for the process lifetime.
//! Any structural defect in the dataset is a fatal [`TreeLoadError`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use kurbo::{Point, Vec2};
use tracing::debug;

use crate::error::{ParseError, TreeLoadError};

/// Fixed screen position every ascendancy sub-tree is translated onto.
/// Only one ascendancy is shown at a time, so they all share it.
pub const ASCENDANCY_STAGE: Point = Point::new(7000.0, -5500.0);

/// One passive-tree node.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    /// Empty for main-tree nodes.
    pub ascendancy_name: String,
    pub is_keystone: bool,
    pub is_notable: bool,
    pub is_mastery: bool,
    pub is_ascendancy_start: bool,
    /// −1 unless this is a class starting node.
    pub class_start_index: i32,
    /// Index into the tree's orbit constants.
    pub orbit: usize,
    /// Angular position along that orbit.
    pub orbit_index: usize,
    /// Outbound connections (node ids).
    pub out: Vec<String>,
}

impl TreeNode {
    pub fn is_class_start(&self) -> bool {
        self.class_start_index != -1
    }

    /// Drawn radius by node category: keystone > notable > normal.
    pub fn size(&self) -> f64 {
        if self.is_keystone {
            48.0
        } else if self.is_notable {
            32.0
        } else {
            28.0
        }
    }

    /// Whether an edge between the two nodes is drawable: neither end may
    /// be a mastery or class-start node and both must share the same
    /// ascendancy scope.
    pub fn connects_to(&self, other: &TreeNode) -> bool {
        !self.is_mastery
            && !self.is_class_start()
            && !other.is_mastery
            && !other.is_class_start()
            && self.ascendancy_name == other.ascendancy_name
    }
}

/// A node cluster sharing one orbit center.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct NodeGroup {
    pub id: String,
    pub center: Point,
    /// Occupied orbit indices, expanded from the dataset bitset.
    pub orbits: Vec<usize>,
    pub node_ids: Vec<String>,
}

/// One game version's full passive tree.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SkillTree {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub nodes: HashMap<String, TreeNode>,
    pub groups: HashMap<String, NodeGroup>,
    pub skills_per_orbit: Vec<u32>,
    pub orbit_radii: Vec<f64>,
    /// Ascendancy name to its start-node id.
    pub asc_start_nodes: HashMap<String, String>,
    /// `(class id, ascendancy id)` to ascendancy name, for tree URLs.
    asc_classes: HashMap<(u8, u8), String>,
    node_to_group: HashMap<String, String>,
}

// Raw dataset shapes; field names follow the exported document.

#[derive(Debug, serde::Deserialize)]
struct RawTree {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    constants: RawConstants,
    nodes: HashMap<String, RawNode>,
    groups: HashMap<String, RawGroup>,
    #[serde(default)]
    classes: Vec<RawClass>,
}

#[derive(Debug, serde::Deserialize)]
struct RawConstants {
    #[serde(rename = "skillsPerOrbit")]
    skills_per_orbit: Vec<u32>,
    #[serde(rename = "orbitRadii")]
    orbit_radii: Vec<f64>,
}

#[derive(Debug, serde::Deserialize)]
struct RawNode {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "ascendancyName")]
    ascendancy_name: String,
    #[serde(default, rename = "isKeystone")]
    is_keystone: bool,
    #[serde(default, rename = "isNotable")]
    is_notable: bool,
    #[serde(default, rename = "isMastery")]
    is_mastery: bool,
    #[serde(default, rename = "isAscendancyStart")]
    is_ascendancy_start: bool,
    #[serde(rename = "classStartIndex")]
    class_start_index: Option<i32>,
    orbit: Option<usize>,
    #[serde(default, rename = "orbitIndex")]
    orbit_index: usize,
    #[serde(default)]
    out: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RawGroup {
    x: f64,
    y: f64,
    /// Bitset of occupied orbit indices.
    #[serde(default)]
    orbits: u32,
    #[serde(default)]
    nodes: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RawClass {
    #[serde(default)]
    ascendancies: Vec<RawAscendancy>,
}

#[derive(Debug, serde::Deserialize)]
struct RawAscendancy {
    id: String,
}

/// Load a skill tree dataset from disk.
pub fn load_skill_tree(path: impl AsRef<Path>) -> Result<SkillTree, TreeLoadError> {
    SkillTree::from_reader(BufReader::new(File::open(path)?))
}

impl SkillTree {
    #[tracing::instrument(skip_all)]
    pub fn from_reader(reader: impl Read) -> Result<Self, TreeLoadError> {
        let raw: RawTree = serde_json::from_reader(reader)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawTree) -> Result<Self, TreeLoadError> {
        let mut nodes = HashMap::new();
        for (id, node) in raw.nodes {
            // The synthetic root and orbit-less helper entries carry no
            // drawable placement.
            if id == "root" {
                continue;
            }
            let Some(orbit) = node.orbit else {
                continue;
            };
            nodes.insert(
                id.clone(),
                TreeNode {
                    id,
                    name: node.name,
                    ascendancy_name: node.ascendancy_name,
                    is_keystone: node.is_keystone,
                    is_notable: node.is_notable,
                    is_mastery: node.is_mastery,
                    is_ascendancy_start: node.is_ascendancy_start,
                    class_start_index: node.class_start_index.unwrap_or(-1),
                    orbit,
                    orbit_index: node.orbit_index,
                    out: node.out,
                },
            );
        }

        let mut groups = HashMap::new();
        let mut node_to_group = HashMap::new();
        for (id, group) in raw.groups {
            for node_id in &group.nodes {
                node_to_group.insert(node_id.clone(), id.clone());
            }
            groups.insert(
                id.clone(),
                NodeGroup {
                    id,
                    center: Point::new(group.x, group.y),
                    orbits: expand_orbit_bitset(group.orbits),
                    node_ids: group.nodes,
                },
            );
        }

        let mut asc_start_nodes: HashMap<String, String> = HashMap::new();
        for node in nodes.values() {
            if node.is_ascendancy_start {
                asc_start_nodes
                    .entry(node.ascendancy_name.clone())
                    .or_insert_with(|| node.id.clone());
            }
        }
        for node in nodes.values() {
            if !node.ascendancy_name.is_empty()
                && !asc_start_nodes.contains_key(&node.ascendancy_name)
            {
                return Err(TreeLoadError::MissingAscendancyStart(
                    node.ascendancy_name.clone(),
                ));
            }
        }

        let asc_classes = raw
            .classes
            .iter()
            .enumerate()
            .flat_map(|(class_id, class)| {
                class
                    .ascendancies
                    .iter()
                    .enumerate()
                    .map(move |(asc_id, asc)| {
                        ((class_id as u8, asc_id as u8 + 1), asc.id.clone())
                    })
            })
            .collect();

        let mut tree = Self {
            min_x: raw.min_x,
            max_x: raw.max_x,
            min_y: raw.min_y,
            max_y: raw.max_y,
            nodes,
            groups,
            skills_per_orbit: raw.constants.skills_per_orbit,
            orbit_radii: raw.constants.orbit_radii,
            asc_start_nodes,
            asc_classes,
            node_to_group,
        };
        tree.reposition_ascendancies()?;
        debug!(
            nodes = tree.nodes.len(),
            groups = tree.groups.len(),
            ascendancies = tree.asc_start_nodes.len(),
            "loaded skill tree"
        );
        Ok(tree)
    }

    /// Translate every ascendancy's groups by one shared delta so the
    /// group holding its start node is centered on the ascendancy stage.
    fn reposition_ascendancies(&mut self) -> Result<(), TreeLoadError> {
        let mut deltas: Vec<(String, Vec2)> = Vec::new();
        for (asc_name, start_id) in &self.asc_start_nodes {
            let group = self.group_of(start_id).ok_or_else(|| {
                TreeLoadError::structure(format!(
                    "start node {start_id} of ascendancy '{asc_name}' belongs to no group"
                ))
            })?;
            deltas.push((asc_name.clone(), ASCENDANCY_STAGE - group.center));
        }

        for (asc_name, delta) in deltas {
            let group_ids: Vec<String> = self
                .groups
                .values()
                .filter(|group| {
                    group.node_ids.iter().any(|id| {
                        self.nodes
                            .get(id)
                            .is_some_and(|node| node.ascendancy_name == asc_name)
                    })
                })
                .map(|group| group.id.clone())
                .collect();
            for id in group_ids {
                if let Some(group) = self.groups.get_mut(&id) {
                    group.center += delta;
                }
            }
        }
        Ok(())
    }

    /// The group a node belongs to.
    pub fn group_of(&self, node_id: &str) -> Option<&NodeGroup> {
        self.node_to_group
            .get(node_id)
            .and_then(|group_id| self.groups.get(group_id))
    }

    /// Ascendancy name for a `(class id, ascendancy id)` pair as encoded
    /// in tree URLs. Ascendancy id 0 means none.
    pub fn ascendancy_for_class(&self, class_id: u8, asc_id: u8) -> Option<&str> {
        self.asc_classes
            .get(&(class_id, asc_id))
            .map(String::as_str)
    }

    /// Decode the taken-node list from a tree-planner URL.
    ///
    /// The last path segment is url-safe base64 over: `u32` big-endian
    /// version, class id byte, ascendancy id byte, locked byte, then one
    /// big-endian `u16` per node. The ascendancy's start node id is
    /// appended when an ascendancy is encoded and the list lacks it.
    pub fn nodes_from_url(&self, tree_url: &str) -> Result<Vec<String>, ParseError> {
        let encoded = tree_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        let bytes = URL_SAFE
            .decode(encoded)
            .map_err(|err| ParseError::tree_url(format!("bad base64 payload: {err}")))?;
        if bytes.len() < 7 || (bytes.len() - 7) % 2 != 0 {
            return Err(ParseError::tree_url(format!(
                "payload has invalid length {}",
                bytes.len()
            )));
        }
        let class_id = bytes[4];
        let asc_id = bytes[5];
        let mut node_ids: Vec<String> = bytes[7..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]).to_string())
            .collect();

        if asc_id != 0 {
            let asc_name = self.ascendancy_for_class(class_id, asc_id).ok_or_else(|| {
                ParseError::tree_url(format!(
                    "unknown class/ascendancy pair ({class_id}, {asc_id})"
                ))
            })?;
            let start_id = self.asc_start_nodes.get(asc_name).ok_or_else(|| {
                ParseError::tree_url(format!("no start node for ascendancy '{asc_name}'"))
            })?;
            if !node_ids.contains(start_id) {
                node_ids.push(start_id.clone());
            }
        }
        Ok(node_ids)
    }

    /// Taken-node set for a build's tree spec, with the synthetic
    /// ascendancy-start entry appended when the export lacks it.
    pub fn taken_nodes(&self, spec_nodes: &[String], ascendancy_name: &str) -> Vec<String> {
        let mut nodes = spec_nodes.to_vec();
        if let Some(start_id) = self.asc_start_nodes.get(ascendancy_name)
            && !nodes.contains(start_id)
        {
            nodes.push(start_id.clone());
        }
        nodes
    }
}

fn expand_orbit_bitset(bitset: u32) -> Vec<usize> {
    (0..u32::BITS as usize)
        .filter(|bit| bitset & (1 << bit) != 0)
        .collect()
}
