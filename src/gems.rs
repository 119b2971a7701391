//! Gem display-name registry.
//!
//! Built once at startup from the per-version gem dataset and shared
//! read-only with every parse. Entries are keyed by the export's
//! `gemId`/`skillId` identifiers.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::TreeLoadError;

/// Alternate-quality prefix for a `qualityId` tag; empty for default or
/// unknown tags.
pub fn alt_quality_prefix(quality_id: &str) -> &'static str {
    match quality_id {
        "Alternate1" => "Anomalous ",
        "Alternate2" => "Divergent ",
        "Alternate3" => "Phantasmal ",
        _ => "",
    }
}

#[derive(Debug, serde::Deserialize)]
struct GemEntry {
    #[serde(default)]
    active_skill: Option<NamedEntry>,
    #[serde(default)]
    base_item: Option<NamedEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct NamedEntry {
    display_name: String,
}

/// Maps gem and skill identifiers to display names.
#[derive(Clone, Debug, Default)]
pub struct GemCatalog {
    names: HashMap<String, String>,
}

impl GemCatalog {
    /// An empty catalog; the parser then relies on `nameSpec` fallbacks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from the gem dataset JSON document.
    pub fn from_reader(reader: impl Read) -> Result<Self, TreeLoadError> {
        let entries: HashMap<String, GemEntry> = serde_json::from_reader(reader)?;
        let names = entries
            .into_iter()
            .filter_map(|(key, entry)| {
                let name = entry
                    .active_skill
                    .or(entry.base_item)
                    .map(|named| named.display_name)?;
                Some((key, name))
            })
            .collect();
        Ok(Self { names })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TreeLoadError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Display name for a gem or skill identifier.
    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
