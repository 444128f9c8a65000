//! Query family schemas: creature, DB2, realm, page text, NPC text, name and
//! quest queries.
//!
//! Packed GUID orders are the client's shuffles for this build. Where the
//! client switches from a mask to aligned bytes, the schema resets the bit
//! reader explicitly.

use std::sync::Arc;

use super::opcodes::*;
use crate::dispatch::SchemaTable;
use crate::error::Result;
use crate::records::{CreatureTemplate, DecodedRecord, NpcTextOptions, PageTextPage};
use crate::schema::{Condition, Field, FieldRecord, Presence, RecordSchema, Source};

/// Query family schemas by opcode name.
///
/// `rows` decodes the embedded row of a DB2 reply.
pub fn query_schemas(rows: Arc<SchemaTable>) -> Vec<(&'static str, RecordSchema)> {
    vec![
        (CMSG_CREATURE_QUERY, creature_query()),
        (SMSG_CREATURE_QUERY_RESPONSE, creature_query_response()),
        (CMSG_DB_QUERY_BULK, db_query_bulk()),
        (SMSG_DB_REPLY, db_reply(rows)),
        (SMSG_REALM_QUERY_RESPONSE, realm_query_response()),
        (CMSG_PAGE_TEXT_QUERY, page_text_query()),
        (SMSG_PAGE_TEXT_QUERY_RESPONSE, page_text_query_response()),
        (CMSG_NPC_TEXT_QUERY, npc_text_query()),
        (SMSG_NPC_TEXT_UPDATE, npc_text_update()),
        (CMSG_NAME_QUERY, name_query()),
        (SMSG_NAME_QUERY_RESPONSE, name_query_response()),
        (SMSG_QUEST_QUERY_RESPONSE, quest_query_response()),
    ]
}

fn set(field: &'static str) -> Condition {
    Condition::Set(Source::Field(field))
}

/// Zero-terminated text present only when its length prefix exceeds 1.
fn text_if_longer(len: Source, name: &'static str) -> Field {
    Field::optional(
        Presence::When(Condition::AtLeast(len, 2)),
        Field::CString(name),
    )
}

fn repeat(name: &'static str, count: u64, body: Vec<Field>) -> Field {
    Field::Repeat {
        name,
        count: Source::Const(count),
        body,
    }
}

fn mask(guid: u8, order: &'static [u8]) -> Field {
    Field::GuidMask { guid, order }
}

fn bytes(guid: u8, order: &'static [u8]) -> Field {
    Field::GuidBytes { guid, order }
}

fn i32s(names: &[&'static str]) -> Vec<Field> {
    names.iter().map(|&n| Field::I32(n)).collect()
}

fn creature_query() -> RecordSchema {
    RecordSchema::new("creature_query", vec![Field::I32("entry")])
}

fn creature_query_response() -> RecordSchema {
    let name_len = |field| Source::Element {
        list: "name_lens",
        field,
    };

    RecordSchema::new(
        "creature_query_response",
        vec![
            Field::Entry {
                name: "entry",
                masked: "masked",
            },
            Field::Bit("has_data"),
            Field::when(
                set("has_data"),
                vec![
                    repeat(
                        "name_lens",
                        4,
                        vec![Field::Bits("name_len", 11), Field::Bits("female_name_len", 11)],
                    ),
                    Field::Bits("quest_item_count", 22),
                    Field::Bits("icon_name_len", 6),
                    Field::Bits("sub_name_len", 11),
                    Field::Bits("unk_string_len", 11),
                    Field::Bit("racial_leader"),
                    Field::ResetBits,
                    Field::I32("type"),
                    Field::U32("kill_credit_1"),
                    Field::U32("display_id_3"),
                    Field::U32("display_id_2"),
                    Field::Repeat {
                        name: "quest_items",
                        count: Source::Field("quest_item_count"),
                        body: vec![Field::U32("item")],
                    },
                    Field::U32("expansion"),
                    repeat(
                        "names",
                        4,
                        vec![
                            text_if_longer(name_len("name_len"), "name"),
                            text_if_longer(name_len("female_name_len"), "female_name"),
                        ],
                    ),
                    text_if_longer(Source::Field("unk_string_len"), "unk_string"),
                    Field::F32("mana_modifier"),
                    Field::U32("display_id_0"),
                    text_if_longer(Source::Field("icon_name_len"), "icon_name"),
                    Field::U32("kill_credit_0"),
                    Field::U32("display_id_1"),
                    text_if_longer(Source::Field("sub_name_len"), "sub_name"),
                    Field::U32("type_flags"),
                    Field::U32("type_flags_2"),
                    Field::F32("health_modifier"),
                    Field::I32("family"),
                    Field::I32("rank"),
                    Field::U32("movement_id"),
                ],
            ),
        ],
    )
    .with_projection(project_creature)
}

fn project_creature(fields: FieldRecord) -> Result<DecodedRecord> {
    let template = if fields.bool("has_data")? {
        Some(CreatureTemplate::from_fields(&fields)?)
    } else {
        None
    };
    Ok(DecodedRecord::CreatureQuery {
        entry: fields.u32("entry")?,
        template,
    })
}

fn db_query_bulk() -> RecordSchema {
    RecordSchema::new(
        "db_query_bulk",
        vec![
            Field::U32("table_hash"),
            Field::Bits("count", 21),
            Field::Repeat {
                name: "masks",
                count: Source::Field("count"),
                body: vec![mask(0, &[3, 4, 7, 2, 5, 1, 6, 0])],
            },
            Field::ResetBits,
            Field::Repeat {
                name: "rows",
                count: Source::Field("count"),
                body: vec![
                    bytes(0, &[6, 1, 2]),
                    Field::I32("entry"),
                    bytes(0, &[4, 5, 7, 0, 3]),
                    Field::Guid {
                        name: "guid",
                        guid: 0,
                    },
                ],
            },
        ],
    )
}

fn db_reply(rows: Arc<SchemaTable>) -> RecordSchema {
    RecordSchema::new(
        "db_reply",
        vec![
            Field::I32("size"),
            Field::Blob {
                name: "row_data",
                len: Source::Field("size"),
            },
            Field::U32("table_hash"),
            Field::U32("hotfix_time"),
            Field::I32("entry"),
            Field::when(
                Condition::NonNegative(Source::Field("entry")),
                vec![Field::DispatchBlob {
                    name: "row",
                    blob: "row_data",
                    tag: Source::Field("table_hash"),
                    table: rows,
                }],
            ),
        ],
    )
    .with_projection(project_db_reply)
}

fn project_db_reply(fields: FieldRecord) -> Result<DecodedRecord> {
    let table_hash = fields.u32("table_hash")?;
    let entry = fields.i32("entry")?;
    let row = if entry < 0 {
        tracing::debug!("Row {} of DB2 table 0x{:08X} removed", -i64::from(entry), table_hash);
        None
    } else {
        fields.record("row")?.cloned().map(Box::new)
    };

    Ok(DecodedRecord::DbReply {
        table_hash,
        hotfix_time: fields.u32("hotfix_time")?,
        entry,
        row,
    })
}

fn realm_query_response() -> RecordSchema {
    RecordSchema::new(
        "realm_query_response",
        vec![
            Field::U8("unk"),
            Field::I32("realm_id"),
            Field::Bits("normalized_name_len", 8),
            Field::Bit("unk_bit"),
            Field::Bits("name_len", 8),
            Field::ResetBits,
            Field::text("name", "name_len"),
            Field::text("normalized_name", "normalized_name_len"),
        ],
    )
}

fn page_text_query() -> RecordSchema {
    RecordSchema::new(
        "page_text_query",
        vec![
            Field::I32("entry"),
            mask(0, &[0, 7, 5, 2, 1, 3, 4, 6]),
            Field::ResetBits,
            bytes(0, &[7, 4, 6, 5, 2, 3, 0, 1]),
            Field::Guid {
                name: "guid",
                guid: 0,
            },
        ],
    )
}

fn page_text_query_response() -> RecordSchema {
    RecordSchema::new(
        "page_text_query_response",
        vec![
            Field::Bit("has_data"),
            Field::When {
                condition: set("has_data"),
                then: vec![
                    Field::Bits("text_len", 12),
                    Field::ResetBits,
                    Field::text("text", "text_len"),
                    Field::U32("entry"),
                    Field::U32("next_page"),
                    Field::U32("entry_repeat"),
                ],
                otherwise: vec![Field::ResetBits, Field::U32("entry")],
            },
        ],
    )
    .with_projection(project_page_text)
}

fn project_page_text(fields: FieldRecord) -> Result<DecodedRecord> {
    let page = if fields.bool("has_data")? {
        Some(PageTextPage::from_fields(&fields)?)
    } else {
        None
    };
    Ok(DecodedRecord::PageText {
        entry: fields.u32("entry")?,
        page,
    })
}

fn npc_text_query() -> RecordSchema {
    RecordSchema::new(
        "npc_text_query",
        vec![
            Field::I32("entry"),
            mask(0, &[7, 3, 1, 5, 6, 4, 0, 2]),
            Field::ResetBits,
            bytes(0, &[1, 5, 2, 7, 3, 6, 4, 0]),
            Field::Guid {
                name: "guid",
                guid: 0,
            },
        ],
    )
}

fn npc_text_update() -> RecordSchema {
    RecordSchema::new(
        "npc_text_update",
        vec![
            Field::Entry {
                name: "entry",
                masked: "masked",
            },
            Field::when(
                Condition::Clear(Source::Field("masked")),
                vec![
                    Field::I32("size"),
                    Field::Blob {
                        name: "text_data",
                        len: Source::Field("size"),
                    },
                    Field::Bit("has_data"),
                    Field::when(
                        set("has_data"),
                        vec![Field::Within {
                            name: "text",
                            blob: "text_data",
                            body: vec![
                                repeat("probabilities", 8, vec![Field::F32("probability")]),
                                repeat("broadcast_texts", 8, vec![Field::U32("broadcast_text")]),
                            ],
                        }],
                    ),
                ],
            ),
        ],
    )
    .with_projection(project_npc_text)
}

fn project_npc_text(fields: FieldRecord) -> Result<DecodedRecord> {
    let masked = fields.bool("masked")?;
    let options = if !masked && fields.bool("has_data")? {
        fields.group("text")?.map(NpcTextOptions::from_fields).transpose()?
    } else {
        None
    };
    Ok(DecodedRecord::NpcText {
        entry: fields.u32("entry")?,
        masked,
        options,
    })
}

fn name_query() -> RecordSchema {
    RecordSchema::new(
        "name_query",
        vec![
            mask(0, &[5, 7, 0, 1]),
            Field::Bit("has_realm_id_2"),
            mask(0, &[6]),
            Field::Bit("has_realm_id_1"),
            mask(0, &[3, 2, 4]),
            Field::ResetBits,
            bytes(0, &[0, 1, 3, 4, 6, 5, 2, 7]),
            Field::optional(Presence::When(set("has_realm_id_1")), Field::I32("realm_id_1")),
            Field::optional(Presence::When(set("has_realm_id_2")), Field::I32("realm_id_2")),
            Field::Guid {
                name: "guid",
                guid: 0,
            },
        ],
    )
}

fn name_query_response() -> RecordSchema {
    let has_data = || Condition::Equals(Source::Field("status"), 0);

    RecordSchema::new(
        "name_query_response",
        vec![
            mask(0, &[5, 7, 3, 0, 4, 1, 6, 2]),
            Field::ResetBits,
            bytes(0, &[7, 4, 3]),
            Field::U8("status"),
            Field::when(
                has_data(),
                vec![
                    Field::I32("unk"),
                    Field::U8("race"),
                    Field::U8("gender"),
                    Field::U8("level"),
                    Field::U8("class"),
                    Field::I32("realm_id"),
                ],
            ),
            bytes(0, &[1, 5, 0, 6, 2]),
            Field::when(
                has_data(),
                vec![
                    mask(2, &[6]),
                    mask(1, &[7]),
                    Field::Bits("name_len", 6),
                    mask(2, &[1, 7, 2]),
                    mask(1, &[4]),
                    mask(2, &[4, 0]),
                    mask(1, &[1]),
                    repeat("declined_name_lens", 5, vec![Field::Bits("len", 7)]),
                    mask(1, &[3]),
                    mask(2, &[3]),
                    mask(1, &[5, 0]),
                    mask(2, &[5]),
                    Field::Bit("unused_bit"),
                    mask(1, &[2, 6]),
                    Field::ResetBits,
                    Field::text("name", "name_len"),
                    bytes(2, &[4]),
                    bytes(1, &[3]),
                    bytes(2, &[6]),
                    bytes(1, &[2, 4]),
                    bytes(2, &[5, 1, 7]),
                    repeat(
                        "declined_names",
                        5,
                        vec![Field::FixedText {
                            name: "name",
                            len: Source::Element {
                                list: "declined_name_lens",
                                field: "len",
                            },
                        }],
                    ),
                    bytes(2, &[3]),
                    bytes(1, &[7, 1, 6]),
                    bytes(2, &[0]),
                    bytes(1, &[0]),
                    bytes(2, &[2]),
                    bytes(1, &[5]),
                    Field::Guid {
                        name: "guid_1",
                        guid: 1,
                    },
                    Field::Guid {
                        name: "guid_2",
                        guid: 2,
                    },
                ],
            ),
            Field::Guid {
                name: "guid",
                guid: 0,
            },
        ],
    )
}

/// Quest template. Text lengths and objective shapes are packed up front;
/// most numbers have no known meaning and are named by their slot.
fn quest_query_response() -> RecordSchema {
    let objective = |field| Source::Element {
        list: "objective_bits",
        field,
    };

    let mut quest = vec![
        Field::Bits("len_e2c", 12),
        Field::Bits("objective_count", 19),
        Field::Repeat {
            name: "objective_bits",
            count: Source::Field("objective_count"),
            body: vec![Field::Bits("text_len", 8), Field::Bits("value_count", 22)],
        },
        Field::Bits("len_2600", 11),
        Field::Bits("len_2000", 8),
        Field::Bits("len_2100", 10),
        Field::Bits("len_274", 12),
        Field::Bits("len_19e4", 9),
        Field::Bits("len_2500", 8),
        Field::Bits("len_1c00", 10),
        Field::Bits("len_74", 9),
        Field::ResetBits,
        Field::I32("int_2e34"),
        Field::I32("int_4c"),
        Field::F32("float_54"),
        Field::Repeat {
            name: "objectives",
            count: Source::Field("objective_count"),
            body: vec![
                Field::I32("int_2e10"),
                Field::I32("int_ed_1"),
                Field::I32("int_ed_2"),
                Field::I32("int_ea"),
                Field::FixedText {
                    name: "text",
                    len: objective("text_len"),
                },
                Field::U8("byte_ed"),
                Field::U8("byte_ea"),
                Field::Repeat {
                    name: "values",
                    count: objective("value_count"),
                    body: vec![Field::I32("value")],
                },
            ],
        },
        Field::I32("int_58"),
        Field::I32("int_2e54"),
        Field::F32("float_6c"),
        Field::text("text_2500", "len_2500"),
        Field::I32("int_34"),
        Field::text("text_19e4", "len_19e4"),
        Field::I32("int_2e74"),
        repeat(
            "pairs",
            4,
            vec![Field::I32("int_3001_16"), Field::I32("int_3001_0")],
        ),
        Field::I32("int_1c"),
        Field::F32("float_68"),
        Field::I32("int_2e28"),
        repeat(
            "triples",
            5,
            i32s(&["int_2986_40", "int_2986_0", "int_2986_20"]),
        ),
    ];
    quest.extend(i32s(&[
        "int_1be8", "int_2e7c", "int_1bf8", "int_1bfc", "int_2e90", "int_2e48",
    ]));
    quest.push(Field::text("text_74", "len_74"));
    quest.extend(i32s(&[
        "int_2e2c", "int_2e50", "int_2e64", "int_1bec", "int_60", "int_2e88", "int_2e94",
        "int_2e6c", "int_14", "int_2e20", "int_2e30", "int_2e24", "int_1bf0", "int_2e4c",
        "int_2e68", "int_20", "int_1bf4",
    ]));
    quest.push(Field::text("text_2100", "len_2100"));
    quest.extend(i32s(&["int_2e08", "int_38", "int_5c"]));
    quest.push(Field::text("text_2600", "len_2600"));
    quest.extend(i32s(&[
        "int_24", "int_2e58", "int_30", "int_64", "int_44", "int_2e00", "int_2e44", "int_2ea0",
        "int_28", "int_2e1c", "int_40",
    ]));
    quest.push(Field::text("text_e2c", "len_e2c"));
    quest.push(Field::I32("int_2e60"));
    quest.push(Field::text("text_2000", "len_2000"));
    quest.extend(i32s(&["int_2e70", "int_2e5c", "int_18", "int_50", "int_1be4"]));
    quest.push(Field::text("text_1c00", "len_1c00"));
    quest.extend(i32s(&["int_3c", "int_2c"]));
    quest.push(Field::text("text_274", "len_274"));
    quest.extend(i32s(&[
        "int_48", "int_2e80", "int_2e40", "int_2e9c", "int_2e84", "int_2e38", "int_2e04",
        "int_2e98", "int_2e3c", "int_2e78", "int_70", "int_2e8c",
    ]));
    quest.push(Field::I32("quest_id"));

    RecordSchema::new(
        "quest_query_response",
        vec![
            Field::Bit("has_data"),
            Field::When {
                condition: set("has_data"),
                then: quest,
                otherwise: vec![Field::ResetBits, Field::U32("entry")],
            },
        ],
    )
}
