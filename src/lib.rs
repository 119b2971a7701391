//! Build-string decoding, build XML parsing and passive-skill-tree SVG
//! rendering.
//!
//! The pipeline has two independent halves. Per request:
//! [`decode`] → XML text → [`parse_build`] → [`BuildModel`]. At startup:
//! [`load_skill_tree`] → [`SkillTree`] → [`TreeGraph`] (cached in a
//! [`TreeRegistry`]) → [`render_diagram`] per request with the taken-node
//! set of a build's tree spec.

#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod gems;
pub mod graph;
pub mod model;
pub mod parse;
pub mod registry;
pub mod render;
pub mod tree;

pub use codec::{decode, encode};
pub use error::{CodecError, ExternalRenderError, ParseError, TreeLoadError};
pub use gems::GemCatalog;
pub use graph::{GraphEdge, GraphNode, TreeGraph};
pub use model::{
    BuildModel, Item, ItemSet, Rarity, SkillGem, SkillGroup, StatValue, TreeSpec, UsedJewels,
};
pub use parse::{BuildParser, ItemFailurePolicy, ItemHtmlRenderer, PlainTextRenderer, parse_build};
pub use registry::TreeRegistry;
pub use render::{active_ascendancy, keystones_taken, render_diagram};
pub use tree::{ASCENDANCY_STAGE, NodeGroup, SkillTree, TreeNode, load_skill_tree};
