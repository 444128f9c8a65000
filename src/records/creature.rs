//! Creature template.

use serde::Serialize;

use crate::error::Result;
use crate::schema::FieldRecord;

/// Creature template carried by a creature query response.
///
/// Text fields whose length prefix was 0 or 1 are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreatureTemplate {
    /// Primary name.
    pub name: String,
    /// Female variant of the primary name.
    pub female_name: String,
    /// Alternate names (slots 1-3).
    pub alternate_names: Vec<String>,
    /// Sub name (guild-style title).
    pub sub_name: String,
    /// Cursor icon name.
    pub icon_name: String,
    /// Creature type.
    pub creature_type: i32,
    /// Creature family.
    pub family: i32,
    /// Rank (elite, boss...).
    pub rank: i32,
    /// Type flags.
    pub type_flags: u32,
    /// Second type flags word.
    pub type_flags_2: u32,
    /// Kill credit entries.
    pub kill_credits: [u32; 2],
    /// Display ids.
    pub display_ids: [u32; 4],
    /// Quest item entries.
    pub quest_items: Vec<u32>,
    /// Expansion.
    pub expansion: u32,
    /// Health modifier.
    pub health_modifier: f32,
    /// Mana modifier.
    pub mana_modifier: f32,
    /// Racial leader flag.
    pub racial_leader: bool,
    /// Movement id.
    pub movement_id: u32,
}

impl CreatureTemplate {
    /// Build from a replayed creature response.
    pub fn from_fields(fields: &FieldRecord) -> Result<Self> {
        let names = fields.list("names")?;
        let mut primary = names.iter().map(|n| n.text("name"));
        let name = primary.next().transpose()?.unwrap_or_default().to_string();
        let alternate_names = primary
            .map(|n| n.map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        let female_name = match names.first() {
            Some(first) => first.text("female_name")?.to_string(),
            None => String::new(),
        };

        Ok(Self {
            name,
            female_name,
            alternate_names,
            sub_name: fields.text("sub_name")?.to_string(),
            icon_name: fields.text("icon_name")?.to_string(),
            creature_type: fields.i32("type")?,
            family: fields.i32("family")?,
            rank: fields.i32("rank")?,
            type_flags: fields.u32("type_flags")?,
            type_flags_2: fields.u32("type_flags_2")?,
            kill_credits: [fields.u32("kill_credit_0")?, fields.u32("kill_credit_1")?],
            display_ids: [
                fields.u32("display_id_0")?,
                fields.u32("display_id_1")?,
                fields.u32("display_id_2")?,
                fields.u32("display_id_3")?,
            ],
            quest_items: fields.list_u32("quest_items", "item")?,
            expansion: fields.u32("expansion")?,
            health_modifier: fields.f32("health_modifier")?,
            mana_modifier: fields.f32("mana_modifier")?,
            racial_leader: fields.bool("racial_leader")?,
            movement_id: fields.u32("movement_id")?,
        })
    }
}
