//! DB2 row schemas, decoded from the row blob of a DB2 reply.
//!
//! Row strings are guarded by a u16 length; a zero length means the string
//! is absent and no bytes follow.

use super::db2::*;
use crate::records::{BroadcastText, DecodedRecord, ItemSparse, ItemTemplate};
use crate::schema::{Field, Presence, RecordSchema, Source};

/// DB2 row schemas by table name.
pub fn db2_schemas() -> Vec<(&'static str, RecordSchema)> {
    vec![
        (BROADCAST_TEXT, broadcast_text()),
        (CREATURE, creature()),
        (CREATURE_DIFFICULTY, creature_difficulty()),
        (GAME_OBJECTS, game_objects()),
        (ITEM, item()),
        (ITEM_EXTENDED_COST, item_extended_cost()),
        (ITEM_SPARSE, item_sparse()),
        (KEY_CHAIN, key_chain()),
        (SCENE_SCRIPT, scene_script()),
        (VIGNETTE, vignette()),
    ]
}

fn string(name: &'static str) -> Field {
    Field::optional(Presence::U16Length, Field::CString(name))
}

fn array(name: &'static str, count: u64, element: Field) -> Field {
    Field::Repeat {
        name,
        count: Source::Const(count),
        body: vec![element],
    }
}

fn u32s(names: &[&'static str]) -> Vec<Field> {
    names.iter().map(|&n| Field::U32(n)).collect()
}

fn broadcast_text() -> RecordSchema {
    RecordSchema::new(
        "broadcast_text",
        vec![
            Field::Entry {
                name: "id",
                masked: "id_masked",
            },
            Field::U32("language"),
            string("male_text"),
            string("female_text"),
            array("emotes", 3, Field::U32("emote_id")),
            array("emote_delays", 3, Field::U32("delay")),
            Field::U32("sound_id"),
            Field::U32("unk_1"),
            Field::U32("unk_2"),
        ],
    )
    .with_projection(|fields| Ok(DecodedRecord::BroadcastText(BroadcastText::from_fields(&fields)?)))
}

fn creature() -> RecordSchema {
    RecordSchema::new(
        "db2_creature",
        vec![
            Field::U32("entry"),
            array("items", 3, Field::U32("item")),
            Field::U32("mount"),
            array("display_ids", 4, Field::I32("display_id")),
            array("display_probabilities", 4, Field::F32("probability")),
            string("name"),
            string("sub_name"),
            string("unk_string"),
            Field::U32("rank"),
            Field::U32("inhabit_type"),
        ],
    )
}

fn creature_difficulty() -> RecordSchema {
    RecordSchema::new(
        "db2_creature_difficulty",
        u32s(&[
            "id",
            "creature_entry",
            "faction_template_id",
            "expansion_hp",
            "min_level",
            "max_level",
            "unk_1",
            "unk_2",
            "unk_3",
            "unk_4",
            "unk_5",
        ]),
    )
}

fn game_objects() -> RecordSchema {
    RecordSchema::new(
        "db2_game_objects",
        vec![
            Field::U32("entry"),
            Field::U32("map"),
            Field::U32("display_id"),
            Field::F32("position_x"),
            Field::F32("position_y"),
            Field::F32("position_z"),
            array("rotation", 4, Field::F32("value")),
            Field::F32("size"),
            Field::U32("type"),
            array("data", 4, Field::U32("value")),
            string("name"),
        ],
    )
}

fn item() -> RecordSchema {
    RecordSchema::new(
        "item",
        vec![
            Field::U32("entry"),
            Field::I32("class"),
            Field::U32("sub_class"),
            Field::I32("sound_override_subclass"),
            Field::I32("material"),
            Field::U32("display_id"),
            Field::U32("inventory_type"),
            Field::I32("sheath_type"),
        ],
    )
    .with_projection(|fields| Ok(DecodedRecord::Item(ItemTemplate::from_fields(&fields)?)))
}

fn item_extended_cost() -> RecordSchema {
    let mut fields = u32s(&[
        "entry",
        "required_honor_points",
        "required_arena_points",
        "required_arena_slot",
    ]);
    fields.extend([
        array("required_items", 5, Field::U32("item")),
        array("required_item_counts", 5, Field::U32("count")),
        Field::U32("required_personal_arena_rating"),
        Field::U32("item_purchase_group"),
        array("required_currencies", 5, Field::U32("currency")),
        array("required_currency_counts", 5, Field::U32("count")),
    ]);
    fields.extend(u32s(&[
        "required_faction_id",
        "required_faction_standing",
        "requirement_flags",
        "required_guild_level",
        "required_achievement",
    ]));
    RecordSchema::new("db2_item_extended_cost", fields)
}

fn item_sparse() -> RecordSchema {
    RecordSchema::new(
        "db2_item_sparse",
        vec![
            Field::U32("entry"),
            Field::I32("quality"),
            Field::U32("flags_1"),
            Field::I32("flags_2"),
            Field::U32("flags_3"),
            Field::F32("unk_430_1"),
            Field::F32("unk_430_2"),
            Field::U32("buy_count"),
            Field::U32("buy_price"),
            Field::U32("sell_price"),
            Field::I32("inventory_type"),
            Field::I32("allowed_classes"),
            Field::I32("allowed_races"),
            Field::U32("item_level"),
            Field::U32("required_level"),
            Field::U32("required_skill_id"),
            Field::U32("required_skill_level"),
            Field::I32("required_spell"),
            Field::U32("required_honor_rank"),
            Field::U32("required_city_rank"),
            Field::U32("required_rep_faction"),
            Field::U32("required_rep_value"),
            Field::I32("max_count"),
            Field::I32("max_stack_size"),
            Field::U32("container_slots"),
            array("stat_types", 10, Field::I32("value")),
            array("stat_values", 10, Field::I32("value")),
            array("stat_unk_1", 10, Field::I32("value")),
            array("stat_unk_2", 10, Field::I32("value")),
            Field::I32("scaling_stat_distribution"),
            Field::I32("damage_type"),
            Field::U32("delay"),
            Field::F32("ranged_mod"),
            array("spell_ids", 5, Field::I32("value")),
            array("spell_triggers", 5, Field::I32("value")),
            array("spell_charges", 5, Field::I32("value")),
            array("spell_cooldowns", 5, Field::I32("value")),
            array("spell_categories", 5, Field::U32("value")),
            array("spell_category_cooldowns", 5, Field::I32("value")),
            Field::I32("bonding"),
            string("name"),
            array("alternate_names", 3, string("name")),
            string("description"),
            Field::U32("page_text"),
            Field::I32("language"),
            Field::I32("page_material"),
            Field::I32("start_quest"),
            Field::U32("lock_id"),
            Field::I32("material"),
            Field::I32("sheath_type"),
            Field::I32("random_property"),
            Field::U32("random_suffix"),
            Field::U32("item_set"),
            Field::U32("area"),
            // 0 means no map
            Field::I32("map"),
            Field::I32("bag_family"),
            Field::I32("totem_category"),
            array("socket_colors", 3, Field::I32("value")),
            array("socket_contents", 3, Field::U32("value")),
            Field::I32("socket_bonus"),
            Field::I32("gem_properties"),
            Field::F32("armor_damage_modifier"),
            Field::U32("duration"),
            Field::I32("limit_category"),
            Field::I32("holiday"),
            Field::F32("stat_scaling_factor"),
            Field::U32("currency_substitution_id"),
            Field::U32("currency_substitution_count"),
        ],
    )
    .with_projection(|fields| Ok(DecodedRecord::ItemSparse(ItemSparse::from_fields(&fields)?)))
}

fn key_chain() -> RecordSchema {
    RecordSchema::new(
        "db2_key_chain",
        vec![
            Field::U32("id"),
            Field::Blob {
                name: "key",
                len: Source::Const(32),
            },
        ],
    )
}

fn scene_script() -> RecordSchema {
    RecordSchema::new(
        "db2_scene_script",
        vec![
            Field::U32("id"),
            string("name"),
            string("script"),
            Field::U32("previous_scene_script"),
            Field::U32("next_scene_script"),
        ],
    )
}

fn vignette() -> RecordSchema {
    RecordSchema::new(
        "db2_vignette",
        vec![
            Field::U32("entry"),
            string("name"),
            Field::U32("icon"),
            Field::U32("flags"),
            Field::F32("unk_float_1"),
            Field::F32("unk_float_2"),
        ],
    )
}
