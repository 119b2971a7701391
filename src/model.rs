//! Build domain model.
//!
//! Fixed-shape value structs produced by the parser. A [`BuildModel`] is
//! owned by whichever request created it; nothing here is shared state.

use std::collections::BTreeMap;

use crate::error::ParseError;

/// Canonical gear-slot order used to sort skill groups for display.
///
/// `Unassigned` sorts last. Any slot value outside this list is a parse
/// error.
pub const SLOT_ORDER: [&str; 13] = [
    "Weapon 1",
    "Weapon 1 Swap",
    "Weapon 2",
    "Weapon 2 Swap",
    "Body Armour",
    "Gloves",
    "Helmet",
    "Boots",
    "Amulet",
    "Ring 1",
    "Ring 2",
    "Belt",
    "Unassigned",
];

/// Position of `slot` in [`SLOT_ORDER`].
pub fn slot_rank(slot: &str) -> Result<usize, ParseError> {
    SLOT_ORDER
        .iter()
        .position(|s| *s == slot)
        .ok_or_else(|| ParseError::UnknownSlot(slot.to_string()))
}

/// A character stat value: integers stay integers, everything else is a
/// float rounded to one decimal place.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
}

impl StatValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// Item rarity tier as exported in item text (`Rarity: RARE` etc.).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Rarity {
    Normal,
    Magic,
    Rare,
    Unique,
}

impl Rarity {
    /// Parse a rarity word case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(Self::Normal),
            "MAGIC" => Some(Self::Magic),
            "RARE" => Some(Self::Rare),
            "UNIQUE" => Some(Self::Unique),
            _ => None,
        }
    }

    /// Whether item text carries a separate base-type line for this tier.
    pub fn has_base_type_line(self) -> bool {
        matches!(self, Self::Rare | Self::Unique)
    }
}

/// One socketed (or item-granted) gem.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SkillGem {
    pub name: String,
    pub is_enabled: bool,
    /// Castable skill, as opposed to a support gem.
    pub is_active_skill: bool,
    pub level: u32,
    pub quality: u32,
    /// Alternate-quality flavor prefix ("Anomalous " etc.), empty for default.
    pub alt_quality: String,
    /// Granted by an item mod rather than socketed by the player.
    pub is_item_provided: bool,
}

/// One socket group: the gems linked together in a single piece of gear.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SkillGroup {
    pub is_enabled: bool,
    /// Originating equipment slot, `"Unassigned"` when unset.
    pub slot: String,
    /// Source tag for groups not socketed by the player (e.g. tree-granted).
    pub source: Option<String>,
    pub gems: Vec<SkillGem>,
    /// 0-based index of the group's main skill among its *active* gems.
    pub main_active_skill_index: usize,
    /// No gems, or granted purely by the passive tree.
    pub is_ignored: bool,
}

/// One equippable item, scoped to its containing item set by numeric id.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Item {
    pub id: u32,
    pub name: String,
    pub base_name: String,
    pub rarity: Rarity,
    /// Pre-rendered tooltip from the external build engine; opaque here.
    pub display_html: String,
    /// Support effects the item grants to socketed gems.
    pub support_gems: Vec<SkillGem>,
    /// The external renderer rejected this item (tolerant policy only).
    pub is_broken: bool,
}

/// A named loadout mapping normalized slot names to items.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ItemSet {
    pub id: String,
    pub title: String,
    /// Keyed by lower-case hyphenated slot name ("body-armour").
    pub slots: BTreeMap<String, Item>,
}

/// One saved passive-tree selection.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TreeSpec {
    pub title: String,
    /// Taken node ids, as recorded in the export.
    pub nodes: Vec<String>,
    pub url: String,
    /// Version tag used to pick the matching skill-tree dataset.
    pub tree_version: String,
}

/// Jewels referenced by the build, partitioned by jewel family.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct UsedJewels {
    pub abyssal: Vec<Item>,
    pub cluster: Vec<Item>,
    pub normal: Vec<Item>,
}

/// Everything extracted from one build export.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BuildModel {
    pub build_stats: BTreeMap<String, StatValue>,
    pub class_name: String,
    pub ascendancy_name: String,
    /// Sorted into [`SLOT_ORDER`]; main-skill resolution happened before
    /// the sort, against the original document order.
    pub skill_groups: Vec<SkillGroup>,
    pub main_active_skill: Option<String>,
    pub tree_specs: Vec<TreeSpec>,
    /// 1-based, as exported. See [`BuildModel::active_tree_spec`].
    pub active_tree_spec_index: usize,
    pub items: Vec<Item>,
    pub item_sets: Vec<ItemSet>,
    pub active_item_set_id: String,
    pub used_jewels: UsedJewels,
}

impl BuildModel {
    /// The tree spec selected in the export, if the index resolves.
    pub fn active_tree_spec(&self) -> Option<&TreeSpec> {
        self.active_tree_spec_index
            .checked_sub(1)
            .and_then(|i| self.tree_specs.get(i))
    }

    /// The item set selected in the export, if the id resolves.
    pub fn active_item_set(&self) -> Option<&ItemSet> {
        self.item_sets
            .iter()
            .find(|set| set.id == self.active_item_set_id)
    }
}
