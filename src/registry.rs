//! Process-wide tree registry.
//!
//! One [`SkillTree`] plus its [`TreeGraph`] per game version, built once
//! at startup and shared read-only afterwards. Rendering never mutates
//! the registry, so concurrent renders need no locking.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::TreeLoadError;
use crate::graph::TreeGraph;
use crate::tree::{SkillTree, load_skill_tree};

/// Immutable registry of loaded tree versions and their geometry.
#[derive(Debug, Default)]
pub struct TreeRegistry {
    versions: HashMap<String, (SkillTree, TreeGraph)>,
}

impl TreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded tree under its version tag, computing and
    /// caching its geometry.
    pub fn insert(&mut self, version: impl Into<String>, tree: SkillTree) {
        let version = version.into();
        let graph = TreeGraph::new(&tree);
        info!(%version, nodes = graph.nodes.len(), "registered skill tree");
        self.versions.insert(version, (tree, graph));
    }

    /// Load a dataset file and register it in one step.
    pub fn load(
        &mut self,
        version: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<(), TreeLoadError> {
        let tree = load_skill_tree(path)?;
        self.insert(version, tree);
        Ok(())
    }

    pub fn get(&self, version: &str) -> Option<(&SkillTree, &TreeGraph)> {
        self.versions
            .get(version)
            .map(|(tree, graph)| (tree, graph))
    }

    pub fn tree(&self, version: &str) -> Option<&SkillTree> {
        self.versions.get(version).map(|(tree, _)| tree)
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
