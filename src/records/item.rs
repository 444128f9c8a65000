//! Item rows from the Item and Item-sparse DB2 tables.

use serde::Serialize;

use crate::error::Result;
use crate::schema::FieldRecord;

/// Item DB2 row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemTemplate {
    /// Item entry.
    pub entry: u32,
    /// Item class.
    pub class: i32,
    /// Item sub class.
    pub sub_class: u32,
    /// Sound override sub class, -1 for none.
    pub sound_override_subclass: i32,
    /// Material.
    pub material: i32,
    /// Display id.
    pub display_id: u32,
    /// Inventory type.
    pub inventory_type: u32,
    /// Sheath type.
    pub sheath_type: i32,
}

impl ItemTemplate {
    /// Build from a replayed Item row.
    pub fn from_fields(fields: &FieldRecord) -> Result<Self> {
        Ok(Self {
            entry: fields.u32("entry")?,
            class: fields.i32("class")?,
            sub_class: fields.u32("sub_class")?,
            sound_override_subclass: fields.i32("sound_override_subclass")?,
            material: fields.i32("material")?,
            display_id: fields.u32("display_id")?,
            inventory_type: fields.u32("inventory_type")?,
            sheath_type: fields.i32("sheath_type")?,
        })
    }
}

/// Item-sparse DB2 row: pricing, requirements, stats, spells and names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemSparse {
    /// Item entry.
    pub entry: u32,
    /// Quality.
    pub quality: i32,
    /// Flag words.
    pub flags: [u32; 3],
    /// Stack size bought at once.
    pub buy_count: u32,
    /// Vendor price.
    pub buy_price: u32,
    /// Vendor buy-back price.
    pub sell_price: u32,
    /// Inventory type.
    pub inventory_type: i32,
    /// Class mask, -1 for all.
    pub allowed_classes: i32,
    /// Race mask, -1 for all.
    pub allowed_races: i32,
    /// Item level.
    pub item_level: u32,
    /// Required character level.
    pub required_level: u32,
    /// Required skill id.
    pub required_skill_id: u32,
    /// Required skill rank.
    pub required_skill_level: u32,
    /// Required spell.
    pub required_spell: i32,
    /// Maximum owned count, 0 for unlimited.
    pub max_count: i32,
    /// Maximum stack size.
    pub max_stack_size: i32,
    /// Bag slots.
    pub container_slots: u32,
    /// Stat types, one per stat slot.
    pub stat_types: Vec<i32>,
    /// Stat values, one per stat slot.
    pub stat_values: Vec<i32>,
    /// Damage school.
    pub damage_type: i32,
    /// Weapon delay in milliseconds.
    pub delay: u32,
    /// Spell ids, one per spell slot.
    pub spell_ids: Vec<i32>,
    /// Spell triggers, one per spell slot.
    pub spell_triggers: Vec<i32>,
    /// Bonding.
    pub bonding: i32,
    /// Primary name.
    pub name: String,
    /// Alternate names.
    pub alternate_names: Vec<String>,
    /// Description.
    pub description: String,
    /// Readable page text entry.
    pub page_text: u32,
    /// Quest started by the item.
    pub start_quest: i32,
    /// Item set.
    pub item_set: u32,
    /// Map restriction, 0 for none.
    pub map: i32,
    /// Socket colors.
    pub socket_colors: Vec<i32>,
    /// Duration in seconds, 0 for permanent.
    pub duration: u32,
}

fn i32_list(fields: &FieldRecord, list: &str) -> Result<Vec<i32>> {
    fields.list(list)?.iter().map(|g| g.i32("value")).collect()
}

impl ItemSparse {
    /// Build from a replayed Item-sparse row.
    pub fn from_fields(fields: &FieldRecord) -> Result<Self> {
        Ok(Self {
            entry: fields.u32("entry")?,
            quality: fields.i32("quality")?,
            flags: [
                fields.u32("flags_1")?,
                fields.i32("flags_2")? as u32,
                fields.u32("flags_3")?,
            ],
            buy_count: fields.u32("buy_count")?,
            buy_price: fields.u32("buy_price")?,
            sell_price: fields.u32("sell_price")?,
            inventory_type: fields.i32("inventory_type")?,
            allowed_classes: fields.i32("allowed_classes")?,
            allowed_races: fields.i32("allowed_races")?,
            item_level: fields.u32("item_level")?,
            required_level: fields.u32("required_level")?,
            required_skill_id: fields.u32("required_skill_id")?,
            required_skill_level: fields.u32("required_skill_level")?,
            required_spell: fields.i32("required_spell")?,
            max_count: fields.i32("max_count")?,
            max_stack_size: fields.i32("max_stack_size")?,
            container_slots: fields.u32("container_slots")?,
            stat_types: i32_list(fields, "stat_types")?,
            stat_values: i32_list(fields, "stat_values")?,
            damage_type: fields.i32("damage_type")?,
            delay: fields.u32("delay")?,
            spell_ids: i32_list(fields, "spell_ids")?,
            spell_triggers: i32_list(fields, "spell_triggers")?,
            bonding: fields.i32("bonding")?,
            name: fields.text("name")?.to_string(),
            alternate_names: fields
                .list("alternate_names")?
                .iter()
                .map(|g| g.text("name").map(str::to_string))
                .collect::<Result<_>>()?,
            description: fields.text("description")?.to_string(),
            page_text: fields.u32("page_text")?,
            start_quest: fields.i32("start_quest")?,
            item_set: fields.u32("item_set")?,
            map: fields.i32("map")?,
            socket_colors: i32_list(fields, "socket_colors")?,
            duration: fields.u32("duration")?,
        })
    }
}

/// One item assembled from its Item and Item-sparse rows.
///
/// Either part may be missing when only one table was replied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemEntry<'a> {
    /// Item entry.
    pub entry: u32,
    /// Item row.
    pub template: Option<&'a ItemTemplate>,
    /// Item-sparse row.
    pub sparse: Option<&'a ItemSparse>,
}

impl ItemEntry<'_> {
    /// Item name, known once the sparse row arrived.
    pub fn name(&self) -> Option<&str> {
        self.sparse.map(|s| s.name.as_str())
    }
}
