//! Build XML parser.
//!
//! Turns one exported build document into a [`BuildModel`]. The parse is
//! all-or-nothing: any missing required element or attribute, any
//! unresolved item cross-reference and any unknown gear slot aborts with a
//! [`ParseError`]. The only silently tolerated irregularities are
//! non-numeric stat values and missing titles (defaulted to `"Default"`).

use std::collections::{BTreeSet, HashMap};

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::error::{ExternalRenderError, ParseError};
use crate::gems::{GemCatalog, alt_quality_prefix};
use crate::model::{
    BuildModel, Item, ItemSet, Rarity, SkillGem, SkillGroup, StatValue, TreeSpec, UsedJewels,
    slot_rank,
};

/// Collaborator seam for the external tooltip renderer.
///
/// The implementation is expected to be synchronous and potentially slow;
/// pooling, serialization and timeouts across concurrent parses are the
/// caller's responsibility.
pub trait ItemHtmlRenderer {
    fn render_item_html(&self, item_text: &str) -> Result<String, ExternalRenderError>;
}

/// Fallback renderer that escapes the raw item text into a `<pre>` block.
///
/// Useful for tests and for deployments that run without the external
/// build engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextRenderer;

impl ItemHtmlRenderer for PlainTextRenderer {
    fn render_item_html(&self, item_text: &str) -> Result<String, ExternalRenderError> {
        let escaped = item_text
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        Ok(format!("<pre class=\"item\">{escaped}</pre>"))
    }
}

/// What to do when the external renderer fails for one item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ItemFailurePolicy {
    /// Abort the whole parse (reference behavior).
    #[default]
    Abort,
    /// Keep the item with an empty tooltip and `is_broken = true`.
    Tolerate,
}

/// Configured parser; cheap to construct per call site.
pub struct BuildParser<'a> {
    catalog: &'a GemCatalog,
    renderer: &'a dyn ItemHtmlRenderer,
    policy: ItemFailurePolicy,
}

/// Parse a build document with the default abort-on-item-failure policy.
pub fn parse_build(
    xml: &str,
    catalog: &GemCatalog,
    renderer: &dyn ItemHtmlRenderer,
) -> Result<BuildModel, ParseError> {
    BuildParser::new(catalog, renderer).parse(xml)
}

impl<'a> BuildParser<'a> {
    pub fn new(catalog: &'a GemCatalog, renderer: &'a dyn ItemHtmlRenderer) -> Self {
        Self {
            catalog,
            renderer,
            policy: ItemFailurePolicy::Abort,
        }
    }

    pub fn with_policy(mut self, policy: ItemFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[tracing::instrument(skip_all)]
    pub fn parse(&self, xml: &str) -> Result<BuildModel, ParseError> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        let build_el = require_child(root, "Build")?;
        let skills_el = require_child(root, "Skills")?;
        let items_el = require_child(root, "Items")?;
        let tree_el = require_child(root, "Tree")?;

        let skill_groups = extract_skill_groups(skills_el, self.catalog)?;
        // Main-skill resolution addresses groups by document position, so it
        // must happen before the canonical slot sort.
        let main_active_skill = resolve_main_active_skill(&skill_groups, build_el)?;
        let skill_groups = sort_by_slot(skill_groups)?;

        let items = self.extract_items(items_el)?;
        let item_sets = extract_item_sets(items_el, &items)?;
        let used_jewels = extract_used_jewels(tree_el, items_el, &items)?;

        Ok(BuildModel {
            build_stats: extract_stats(build_el),
            class_name: require_attr(build_el, "className")?.to_string(),
            ascendancy_name: build_el
                .attribute("ascendClassName")
                .unwrap_or_default()
                .to_string(),
            skill_groups,
            main_active_skill,
            tree_specs: extract_tree_specs(tree_el)?,
            active_tree_spec_index: attr_parse::<usize>(tree_el, "activeSpec")?,
            items,
            item_sets,
            active_item_set_id: extract_active_item_set_id(items_el),
            used_jewels,
        })
    }

    fn extract_items(&self, items_el: Node) -> Result<Vec<Item>, ParseError> {
        debug!("extracting items");
        let mut items = Vec::new();
        for item_el in items_el.children().filter(|c| c.has_tag_name("Item")) {
            let id = attr_parse::<u32>(item_el, "id")?;
            let text = item_el
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ParseError::item_text(format!("item {id} has no text")))?;
            items.push(self.parse_item(id, text)?);
        }
        Ok(items)
    }

    fn parse_item(&self, id: u32, text: &str) -> Result<Item, ParseError> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();

        let rarity_line = lines
            .first()
            .ok_or_else(|| ParseError::item_text(format!("item {id} is empty")))?;
        let rarity_value = rarity_line
            .split_once(':')
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case("rarity"))
            .map(|(_, value)| value)
            .ok_or_else(|| {
                ParseError::item_text(format!("item {id} does not start with a rarity line"))
            })?;
        let rarity = Rarity::parse(rarity_value).ok_or_else(|| {
            ParseError::item_text(format!("item {id} has unknown rarity '{rarity_value}'"))
        })?;

        let name = lines
            .get(1)
            .ok_or_else(|| ParseError::item_text(format!("item {id} is missing its name line")))?
            .to_string();
        let base_name = if rarity.has_base_type_line() {
            lines
                .get(2)
                .ok_or_else(|| {
                    ParseError::item_text(format!("item {id} is missing its base type line"))
                })?
                .to_string()
        } else {
            name.clone()
        };

        let (display_html, is_broken) = match self.renderer.render_item_html(text) {
            Ok(html) => (html, false),
            Err(err) if self.policy == ItemFailurePolicy::Tolerate => {
                warn!(item_id = id, error = %err, "keeping item with broken tooltip");
                (String::new(), true)
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Item {
            id,
            name,
            base_name,
            rarity,
            display_html,
            support_gems: extract_item_support_gems(&lines),
            is_broken,
        })
    }
}

fn require_child<'a, 'input>(
    parent: Node<'a, 'input>,
    name: &str,
) -> Result<Node<'a, 'input>, ParseError> {
    parent
        .children()
        .find(|c| c.has_tag_name(name))
        .ok_or_else(|| ParseError::missing_element(name))
}

fn require_attr<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, ParseError> {
    node.attribute(name)
        .ok_or_else(|| ParseError::missing_attr(node.tag_name().name(), name))
}

fn attr_parse<T: std::str::FromStr>(node: Node, name: &str) -> Result<T, ParseError> {
    let raw = require_attr(node, name)?;
    raw.parse()
        .map_err(|_| ParseError::invalid_attr(node.tag_name().name(), name, raw))
}

fn parse_bool(value: Option<&str>) -> bool {
    value == Some("true")
}

/// Flat and minion stats from the `<Build>` children.
///
/// Integer values stay integers; other numeric values are rounded to one
/// decimal place; non-numeric values are skipped silently.
fn extract_stats(build_el: Node) -> std::collections::BTreeMap<String, StatValue> {
    let mut stats = std::collections::BTreeMap::new();
    for stat_el in build_el.children().filter(Node::is_element) {
        let prefix = if stat_el.has_tag_name("MinionStat") {
            "minion_"
        } else {
            ""
        };
        let (Some(stat), Some(value)) = (stat_el.attribute("stat"), stat_el.attribute("value"))
        else {
            continue;
        };
        let name = format!("{prefix}{}", stat.to_lowercase().replace(':', "_"));
        if let Ok(v) = value.parse::<i64>() {
            stats.insert(name, StatValue::Int(v));
        } else if let Ok(v) = value.parse::<f64>() {
            stats.insert(name, StatValue::Float((v * 10.0).round() / 10.0));
        }
    }
    stats
}

fn extract_skill_groups(
    skills_el: Node,
    catalog: &GemCatalog,
) -> Result<Vec<SkillGroup>, ParseError> {
    debug!("extracting skill groups");
    let mut groups = Vec::new();
    for group_el in skills_el.children().filter(Node::is_element) {
        let source = group_el.attribute("source").map(str::to_string);
        let slot = group_el
            .attribute("slot")
            .filter(|s| !s.is_empty())
            .unwrap_or("Unassigned")
            .to_string();
        let gems = extract_gems(group_el, catalog)?;
        let is_ignored = gems.is_empty() || source.as_deref().is_some_and(|s| s.starts_with("Tree"));

        let main_active_skill_index = match group_el.attribute("mainActiveSkill") {
            None | Some("nil") => 0,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .ok_or_else(|| {
                    ParseError::invalid_attr(group_el.tag_name().name(), "mainActiveSkill", raw)
                })?,
        };

        groups.push(SkillGroup {
            is_enabled: parse_bool(group_el.attribute("enabled")),
            slot,
            source,
            gems,
            main_active_skill_index,
            is_ignored,
        });
    }
    Ok(groups)
}

fn extract_gems(group_el: Node, catalog: &GemCatalog) -> Result<Vec<SkillGem>, ParseError> {
    let mut gems = Vec::new();
    for gem_el in group_el.children().filter(Node::is_element) {
        let skill_id = gem_el.attribute("skillId");
        let gem_id = gem_el.attribute("gemId");
        let is_active_skill = skill_id
            .is_some_and(|id| !id.contains("Support") && !id.contains("Enchantment"));

        let name = gem_id
            .and_then(|id| catalog.name_for(id))
            .or_else(|| skill_id.and_then(|id| catalog.name_for(id)))
            .or_else(|| gem_el.attribute("nameSpec").filter(|s| !s.is_empty()))
            .ok_or_else(|| {
                ParseError::UnknownGem(gem_id.or(skill_id).unwrap_or("<unnamed>").to_string())
            })?
            .to_string();

        let gem = SkillGem {
            name,
            is_enabled: parse_bool(gem_el.attribute("enabled")),
            is_active_skill,
            level: attr_parse::<u32>(gem_el, "level")?,
            quality: attr_parse::<u32>(gem_el, "quality")?,
            alt_quality: alt_quality_prefix(gem_el.attribute("qualityId").unwrap_or("Default"))
                .to_string(),
            is_item_provided: gem_id.is_none(),
        };

        // Vaal gems always offer the plain casting mode as well, with the
        // same level, quality and enabled state.
        let vaal_twin = (gem.is_active_skill && gem.name.contains("Vaal ")).then(|| SkillGem {
            name: gem.name.replace("Vaal ", ""),
            ..gem.clone()
        });

        gems.push(gem);
        gems.extend(vaal_twin);
    }
    Ok(gems)
}

/// Resolve the main active skill against the original (document order)
/// group list, translating the 1-based indices of the export.
fn resolve_main_active_skill(
    skill_groups: &[SkillGroup],
    build_el: Node,
) -> Result<Option<String>, ParseError> {
    if skill_groups.is_empty() {
        return Ok(None);
    }
    let raw = require_attr(build_el, "mainSocketGroup")?;
    let group = raw
        .parse::<usize>()
        .ok()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| skill_groups.get(i))
        .ok_or_else(|| ParseError::invalid_attr("Build", "mainSocketGroup", raw))?;

    let active_gems: Vec<&SkillGem> =
        group.gems.iter().filter(|g| g.is_active_skill).collect();
    if active_gems.is_empty() {
        return Ok(None);
    }
    let gem = active_gems.get(group.main_active_skill_index).ok_or_else(|| {
        ParseError::invalid_attr(
            "Skill",
            "mainActiveSkill",
            (group.main_active_skill_index + 1).to_string(),
        )
    })?;
    Ok(Some(gem.name.clone()))
}

fn sort_by_slot(groups: Vec<SkillGroup>) -> Result<Vec<SkillGroup>, ParseError> {
    let mut ranked = groups
        .into_iter()
        .map(|group| Ok((slot_rank(&group.slot)?, group)))
        .collect::<Result<Vec<_>, ParseError>>()?;
    // Stable: groups within the same slot keep document order.
    ranked.sort_by_key(|(rank, _)| *rank);
    Ok(ranked.into_iter().map(|(_, group)| group).collect())
}

/// Support effects an item grants to gems socketed in it, parsed from
/// lines of the form `Socketed Gems are Supported by Level N <Name>`.
fn extract_item_support_gems(lines: &[&str]) -> Vec<SkillGem> {
    let mut supports = Vec::new();
    for line in lines {
        let Some(rest) = line.strip_prefix("Socketed Gems are Supported by Level ") else {
            continue;
        };
        let Some((level_str, gem_name)) = rest.split_once(' ') else {
            continue;
        };
        let Ok(level) = level_str.parse::<u32>() else {
            continue;
        };
        supports.push(SkillGem {
            name: format!("{gem_name} Support"),
            is_enabled: true,
            is_active_skill: false,
            level,
            quality: 0,
            alt_quality: String::new(),
            is_item_provided: true,
        });
    }
    supports
}

fn extract_item_sets(items_el: Node, items: &[Item]) -> Result<Vec<ItemSet>, ParseError> {
    debug!("extracting item sets");
    let items_by_id: HashMap<u32, &Item> = items.iter().map(|item| (item.id, item)).collect();
    let mut item_sets = Vec::new();
    for set_el in items_el.children().filter(|c| c.has_tag_name("ItemSet")) {
        let title = set_el.attribute("title").unwrap_or("Default").to_string();
        let id = require_attr(set_el, "id")?.to_string();
        let mut slots = std::collections::BTreeMap::new();
        for slot_el in set_el.children().filter(Node::is_element) {
            let Some(raw_id) = slot_el.attribute("itemId") else {
                continue;
            };
            let item_id = raw_id.parse::<u32>().map_err(|_| {
                ParseError::invalid_attr(slot_el.tag_name().name(), "itemId", raw_id)
            })?;
            if item_id == 0 {
                continue;
            }
            let slot_name = require_attr(slot_el, "name")?
                .to_lowercase()
                .replace(' ', "-");
            let item = items_by_id.get(&item_id).ok_or(ParseError::UnresolvedItem {
                item_id,
                context: format!("item set '{title}'"),
            })?;
            slots.insert(slot_name, (*item).clone());
        }
        item_sets.push(ItemSet { id, title, slots });
    }
    Ok(item_sets)
}

fn extract_tree_specs(tree_el: Node) -> Result<Vec<TreeSpec>, ParseError> {
    debug!("extracting tree specs");
    let mut specs = Vec::new();
    for spec_el in tree_el.children().filter(Node::is_element) {
        let nodes = require_attr(spec_el, "nodes")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let url = require_child(spec_el, "URL")?
            .text()
            .unwrap_or_default()
            .trim()
            .to_string();
        specs.push(TreeSpec {
            title: spec_el.attribute("title").unwrap_or("Default").to_string(),
            nodes,
            url,
            tree_version: require_attr(spec_el, "treeVersion")?.to_string(),
        });
    }
    Ok(specs)
}

fn extract_active_item_set_id(items_el: Node) -> String {
    match items_el.attribute("activeItemSet") {
        None | Some("nil") => "1".to_string(),
        Some(id) => id.to_string(),
    }
}

/// Jewels referenced from tree sockets or abyssal item-set slots,
/// partitioned by jewel family.
fn extract_used_jewels(
    tree_el: Node,
    items_el: Node,
    items: &[Item],
) -> Result<UsedJewels, ParseError> {
    debug!("extracting jewels");
    let mut jewel_ids = BTreeSet::new();

    for spec_el in tree_el.children().filter(Node::is_element) {
        let Some(sockets_el) = spec_el.children().find(|c| c.has_tag_name("Sockets")) else {
            continue;
        };
        for socket_el in sockets_el.children().filter(Node::is_element) {
            let item_id = attr_parse::<u32>(socket_el, "itemId")?;
            if item_id != 0 {
                jewel_ids.insert(item_id);
            }
        }
    }

    for set_el in items_el.children().filter(|c| c.has_tag_name("ItemSet")) {
        for slot_el in set_el.children().filter(Node::is_element) {
            let Some(raw_id) = slot_el.attribute("itemId") else {
                continue;
            };
            let Ok(item_id) = raw_id.parse::<u32>() else {
                continue;
            };
            let name = slot_el.attribute("name").unwrap_or_default();
            if item_id != 0 && name.contains("Abyssal") {
                jewel_ids.insert(item_id);
            }
        }
    }

    let items_by_id: HashMap<u32, &Item> = items.iter().map(|item| (item.id, item)).collect();
    let mut used = UsedJewels::default();
    for jewel_id in jewel_ids {
        let jewel = *items_by_id.get(&jewel_id).ok_or(ParseError::UnresolvedItem {
            item_id: jewel_id,
            context: "jewel socket".to_string(),
        })?;
        if jewel.base_name.contains("Eye") {
            used.abyssal.push(jewel.clone());
        } else if jewel.base_name.contains("Cluster") {
            used.cluster.push(jewel.clone());
        } else {
            used.normal.push(jewel.clone());
        }
    }
    Ok(used)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> GemCatalog {
        GemCatalog::empty()
    }

    fn parse(xml: &str) -> Result<BuildModel, ParseError> {
        parse_build(xml, &catalog(), &PlainTextRenderer)
    }

    fn minimal_build(skills: &str, items: &str, tree: &str) -> String {
        format!(
            "<PathOfBuilding>\
             <Build className=\"Witch\" ascendClassName=\"Occultist\" mainSocketGroup=\"1\">\
             <PlayerStat stat=\"Life\" value=\"5243\"/>\
             </Build>\
             <Skills>{skills}</Skills>\
             <Items activeItemSet=\"1\">{items}</Items>\
             <Tree activeSpec=\"1\">{tree}</Tree>\
             </PathOfBuilding>"
        )
    }

    const EMPTY_TREE: &str =
        "<Spec title=\"Default\" treeVersion=\"3_18\" nodes=\"1,2\"><URL>url</URL><Sockets/></Spec>";

    #[test]
    fn malformed_xml_is_a_parse_error() {
        assert!(matches!(parse("<PathOfBuilding>"), Err(ParseError::Xml(_))));
    }

    #[test]
    fn missing_build_element_is_reported_by_name() {
        let err = parse("<PathOfBuilding/>").unwrap_err();
        assert!(err.to_string().contains("Build"));
    }

    #[test]
    fn stats_parse_ints_floats_and_skip_junk() {
        let xml = "<PathOfBuilding>\
            <Build className=\"Witch\" ascendClassName=\"\" mainSocketGroup=\"1\">\
            <PlayerStat stat=\"Life\" value=\"5243\"/>\
            <PlayerStat stat=\"TotalDPS\" value=\"12345.6789\"/>\
            <PlayerStat stat=\"Spec:LifeInc\" value=\"180\"/>\
            <PlayerStat stat=\"HitChance\" value=\"unresolved\"/>\
            <MinionStat stat=\"TotalDPS\" value=\"99.99\"/>\
            </Build><Skills/><Items/><Tree activeSpec=\"1\"/>\
            </PathOfBuilding>";
        let build = parse(xml).unwrap();
        assert_eq!(build.build_stats["life"], StatValue::Int(5243));
        assert_eq!(build.build_stats["totaldps"], StatValue::Float(12345.7));
        assert_eq!(build.build_stats["spec_lifeinc"], StatValue::Int(180));
        assert_eq!(build.build_stats["minion_totaldps"], StatValue::Float(100.0));
        assert!(!build.build_stats.contains_key("hitchance"));
    }

    #[test]
    fn vaal_gems_emit_a_plain_twin() {
        let skills = "<Skill enabled=\"true\" slot=\"Body Armour\" mainActiveSkill=\"1\">\
            <Gem enabled=\"true\" nameSpec=\"Vaal Fireball\" level=\"20\" quality=\"18\" \
                 gemId=\"g1\" skillId=\"VaalFireball\"/>\
            </Skill>";
        let build = parse(&minimal_build(skills, "", EMPTY_TREE)).unwrap();
        let gems = &build.skill_groups[0].gems;
        assert_eq!(gems.len(), 2);
        assert_eq!(gems[0].name, "Vaal Fireball");
        assert_eq!(gems[1].name, "Fireball");
        assert_eq!(gems[1].level, 20);
        assert_eq!(gems[1].quality, 18);
        assert!(gems[1].is_enabled);
        assert!(gems[1].is_active_skill);
    }

    #[test]
    fn main_skill_resolves_against_document_order_before_slot_sort() {
        // Group 2 in document order sits in "Weapon 1", which sorts first.
        let skills = "<Skill enabled=\"true\" slot=\"Body Armour\" mainActiveSkill=\"1\">\
            <Gem enabled=\"true\" nameSpec=\"Fireball\" level=\"20\" quality=\"0\" \
                 gemId=\"g1\" skillId=\"Fireball\"/>\
            </Skill>\
            <Skill enabled=\"true\" slot=\"Weapon 1\" mainActiveSkill=\"2\">\
            <Gem enabled=\"true\" nameSpec=\"Spell Echo\" level=\"20\" quality=\"0\" \
                 gemId=\"g2\" skillId=\"SupportSpellEcho\"/>\
            <Gem enabled=\"true\" nameSpec=\"Arc\" level=\"20\" quality=\"0\" \
                 gemId=\"g3\" skillId=\"Arc\"/>\
            <Gem enabled=\"true\" nameSpec=\"Orb of Storms\" level=\"20\" quality=\"0\" \
                 gemId=\"g4\" skillId=\"OrbOfStorms\"/>\
            </Skill>";
        let xml = minimal_build(skills, "", EMPTY_TREE)
            .replace("mainSocketGroup=\"1\"", "mainSocketGroup=\"2\"");
        let build = parse(&xml).unwrap();
        // mainActiveSkill=2 counts only active gems (the support is skipped).
        assert_eq!(build.main_active_skill.as_deref(), Some("Orb of Storms"));
        // The sort itself happened: Weapon 1 now leads.
        assert_eq!(build.skill_groups[0].slot, "Weapon 1");
    }

    #[test]
    fn group_without_gems_yields_no_main_skill() {
        let skills = "<Skill enabled=\"true\" slot=\"Helmet\" mainActiveSkill=\"nil\"/>";
        let build = parse(&minimal_build(skills, "", EMPTY_TREE)).unwrap();
        assert_eq!(build.main_active_skill, None);
        assert!(build.skill_groups[0].is_ignored);
    }

    #[test]
    fn tree_granted_groups_are_ignored() {
        let skills = "<Skill enabled=\"true\" source=\"Tree:1234\" mainActiveSkill=\"1\">\
            <Gem enabled=\"true\" nameSpec=\"Assassin's Mark\" level=\"1\" quality=\"0\" \
                 skillId=\"AssassinsMark\"/>\
            </Skill>";
        let build = parse(&minimal_build(skills, "", EMPTY_TREE)).unwrap();
        let group = &build.skill_groups[0];
        assert!(group.is_ignored);
        assert_eq!(group.slot, "Unassigned");
        // No gemId means the gem is item- or tree-provided.
        assert!(group.gems[0].is_item_provided);
    }

    #[test]
    fn unknown_slot_aborts_the_parse() {
        let skills = "<Skill enabled=\"true\" slot=\"Quiver\" mainActiveSkill=\"1\">\
            <Gem enabled=\"true\" nameSpec=\"Fireball\" level=\"1\" quality=\"0\" \
                 gemId=\"g1\" skillId=\"Fireball\"/>\
            </Skill>";
        let err = parse(&minimal_build(skills, "", EMPTY_TREE)).unwrap_err();
        assert!(matches!(err, ParseError::UnknownSlot(slot) if slot == "Quiver"));
    }

    #[test]
    fn items_parse_rarity_name_and_base() {
        let items = "<Item id=\"1\">\nRarity: RARE\nSoul Bite\nQuartz Wand\n\
            Socketed Gems are Supported by Level 18 Spell Echo\n</Item>\
            <Item id=\"2\">\nRarity: MAGIC\nSapphire Ring of Frost\n</Item>";
        let build = parse(&minimal_build("", items, EMPTY_TREE)).unwrap();
        let rare = &build.items[0];
        assert_eq!(rare.name, "Soul Bite");
        assert_eq!(rare.base_name, "Quartz Wand");
        assert_eq!(rare.rarity, Rarity::Rare);
        assert_eq!(rare.support_gems.len(), 1);
        assert_eq!(rare.support_gems[0].name, "Spell Echo Support");
        assert_eq!(rare.support_gems[0].level, 18);
        assert!(rare.support_gems[0].is_item_provided);
        assert!(rare.display_html.contains("Soul Bite"));

        let magic = &build.items[1];
        assert_eq!(magic.name, magic.base_name);
        assert_eq!(magic.rarity, Rarity::Magic);
    }

    #[test]
    fn item_set_with_unknown_item_id_aborts() {
        let items = "<ItemSet id=\"1\">\
            <Slot name=\"Body Armour\" itemId=\"42\"/>\
            </ItemSet>";
        let err = parse(&minimal_build("", items, EMPTY_TREE)).unwrap_err();
        assert!(matches!(err, ParseError::UnresolvedItem { item_id: 42, .. }));
    }

    #[test]
    fn item_sets_normalize_slot_names_and_default_title() {
        let items = "<Item id=\"1\">\nRarity: NORMAL\nTabula Rasa\n</Item>\
            <ItemSet id=\"2\">\
            <Slot name=\"Body Armour\" itemId=\"1\"/>\
            <Slot name=\"Helmet\" itemId=\"0\"/>\
            </ItemSet>";
        let build = parse(&minimal_build("", items, EMPTY_TREE)).unwrap();
        let set = &build.item_sets[0];
        assert_eq!(set.title, "Default");
        assert_eq!(set.id, "2");
        assert!(set.slots.contains_key("body-armour"));
        assert!(!set.slots.contains_key("helmet"));
    }

    #[test]
    fn jewels_partition_by_base_name() {
        let items = "<Item id=\"1\">\nRarity: RARE\nGhoul Gaze\nGhastly Eye Jewel\n</Item>\
            <Item id=\"2\">\nRarity: RARE\nBramble Glimmer\nLarge Cluster Jewel\n</Item>\
            <Item id=\"3\">\nRarity: RARE\nDoom Orb\nCobalt Jewel\n</Item>\
            <ItemSet id=\"1\">\
            <Slot name=\"Abyssal #1\" itemId=\"1\"/>\
            </ItemSet>";
        let tree = "<Spec title=\"Default\" treeVersion=\"3_18\" nodes=\"1\"><URL>u</URL>\
            <Sockets>\
            <Socket nodeId=\"555\" itemId=\"2\"/>\
            <Socket nodeId=\"556\" itemId=\"3\"/>\
            <Socket nodeId=\"557\" itemId=\"0\"/>\
            </Sockets></Spec>";
        let build = parse(&minimal_build("", items, tree)).unwrap();
        assert_eq!(build.used_jewels.abyssal.len(), 1);
        assert_eq!(build.used_jewels.cluster.len(), 1);
        assert_eq!(build.used_jewels.normal.len(), 1);
        assert_eq!(build.used_jewels.abyssal[0].name, "Ghoul Gaze");
        assert_eq!(build.used_jewels.normal[0].name, "Doom Orb");
    }

    #[test]
    fn jewel_socket_with_unknown_item_aborts() {
        let tree = "<Spec title=\"Default\" treeVersion=\"3_18\" nodes=\"1\"><URL>u</URL>\
            <Sockets><Socket nodeId=\"555\" itemId=\"9\"/></Sockets></Spec>";
        let err = parse(&minimal_build("", "", tree)).unwrap_err();
        assert!(matches!(err, ParseError::UnresolvedItem { item_id: 9, .. }));
    }

    #[test]
    fn tolerant_policy_keeps_broken_items() {
        struct FailingRenderer;
        impl ItemHtmlRenderer for FailingRenderer {
            fn render_item_html(&self, _: &str) -> Result<String, ExternalRenderError> {
                Err(ExternalRenderError::rejected("nope"))
            }
        }

        let items = "<Item id=\"1\">\nRarity: NORMAL\nTabula Rasa\n</Item>";
        let xml = minimal_build("", items, EMPTY_TREE);
        let cat = catalog();

        let err = BuildParser::new(&cat, &FailingRenderer).parse(&xml).unwrap_err();
        assert!(matches!(err, ParseError::Render(_)));

        let build = BuildParser::new(&cat, &FailingRenderer)
            .with_policy(ItemFailurePolicy::Tolerate)
            .parse(&xml)
            .unwrap();
        assert!(build.items[0].is_broken);
        assert!(build.items[0].display_html.is_empty());
    }

    #[test]
    fn active_item_set_defaults_on_nil() {
        let xml = minimal_build("", "", EMPTY_TREE)
            .replace("activeItemSet=\"1\"", "activeItemSet=\"nil\"");
        let build = parse(&xml).unwrap();
        assert_eq!(build.active_item_set_id, "1");
    }

    #[test]
    fn tree_specs_carry_nodes_title_and_version() {
        let build = parse(&minimal_build("", "", EMPTY_TREE)).unwrap();
        let spec = &build.tree_specs[0];
        assert_eq!(spec.nodes, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(spec.tree_version, "3_18");
        assert_eq!(spec.url, "url");
        assert_eq!(build.active_tree_spec_index, 1);
    }
}
