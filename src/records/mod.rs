//! Records module - decoded application records.
//!
//! [`DecodedRecord`] is the tagged union every routine produces. Kinds the
//! content database keeps have typed payloads; everything else is either a
//! generic [`FieldRecord`] or a fallback listing.

mod creature;
mod item;
mod text;

use std::fmt;

use serde::Serialize;

pub use creature::CreatureTemplate;
pub use item::{ItemEntry, ItemSparse, ItemTemplate};
pub use text::{BroadcastText, NpcTextOptions, PageTextPage, NPC_TEXT_OPTIONS};

use crate::dispatch::FallbackListing;
use crate::schema::FieldRecord;

/// Identity of a record in the content database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordKey {
    /// Record kind, e.g. `creature` or `item_sparse`.
    pub kind: &'static str,
    /// Entry id within the kind.
    pub id: u32,
}

impl RecordKey {
    /// Create a new key.
    pub fn new(kind: &'static str, id: u32) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Kind of object a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Creature.
    Unit,
    /// Item.
    Item,
}

/// Display name of a creature or item, collected alongside its template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectName {
    /// Object kind.
    pub object_type: ObjectType,
    /// Creature or item entry.
    pub id: u32,
    /// Name.
    pub name: String,
}

impl ObjectName {
    /// Store kind for names of this object type.
    pub fn kind(&self) -> &'static str {
        match self.object_type {
            ObjectType::Unit => "unit_name",
            ObjectType::Item => "item_name",
        }
    }
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum DecodedRecord {
    /// Creature query response.
    CreatureQuery {
        /// Creature entry.
        entry: u32,
        /// Template, absent when the server had no data.
        template: Option<CreatureTemplate>,
    },
    /// Page text query response.
    PageText {
        /// Page entry.
        entry: u32,
        /// Page, absent when the server had no data.
        page: Option<PageTextPage>,
    },
    /// NPC text update.
    NpcText {
        /// Text entry.
        entry: u32,
        /// Entry carried the masked flag; nothing follows it.
        masked: bool,
        /// Text options, absent when masked or without data.
        options: Option<NpcTextOptions>,
    },
    /// DB2 row reply.
    DbReply {
        /// DB2 table hash.
        table_hash: u32,
        /// Hotfix timestamp (unix seconds).
        hotfix_time: u32,
        /// Row entry; negative means the row was removed.
        entry: i32,
        /// Decoded row, absent for removed rows or abandoned decodes.
        row: Option<Box<DecodedRecord>>,
    },
    /// BroadcastText DB2 row.
    BroadcastText(BroadcastText),
    /// Item DB2 row.
    Item(ItemTemplate),
    /// Item-sparse DB2 row.
    ItemSparse(ItemSparse),
    /// Name of a creature or item.
    ObjectName(ObjectName),
    /// Record kind without a typed projection.
    Fields {
        /// Schema name.
        kind: &'static str,
        /// Decoded fields.
        fields: FieldRecord,
    },
    /// Best-effort listing of an undecoded record.
    Fallback(FallbackListing),
}

impl DecodedRecord {
    /// Record kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreatureQuery { .. } => "creature",
            Self::PageText { .. } => "page_text",
            Self::NpcText { .. } => "npc_text",
            Self::DbReply { .. } => "db_reply",
            Self::BroadcastText(_) => "broadcast_text",
            Self::Item(_) => "item",
            Self::ItemSparse(_) => "item_sparse",
            Self::ObjectName(name) => name.kind(),
            Self::Fields { kind, .. } => kind,
            Self::Fallback(_) => "fallback",
        }
    }

    /// Key under which the content database keeps this record.
    ///
    /// `None` for records that carry no content: queries, empty responses,
    /// removed rows and fallback listings. DB2 replies are keyed by the kind
    /// of their row and the reply's entry.
    pub fn store_key(&self) -> Option<RecordKey> {
        match self {
            Self::CreatureQuery {
                entry,
                template: Some(_),
            } => Some(RecordKey::new(self.kind(), *entry)),
            Self::PageText {
                entry,
                page: Some(_),
            } => Some(RecordKey::new(self.kind(), *entry)),
            Self::NpcText {
                entry,
                options: Some(_),
                ..
            } => Some(RecordKey::new(self.kind(), *entry)),
            Self::BroadcastText(text) => Some(RecordKey::new(self.kind(), text.id)),
            Self::Item(item) => Some(RecordKey::new(self.kind(), item.entry)),
            Self::ItemSparse(item) => Some(RecordKey::new(self.kind(), item.entry)),
            Self::ObjectName(name) => Some(RecordKey::new(self.kind(), name.id)),
            Self::DbReply {
                entry,
                row: Some(row),
                ..
            } if *entry >= 0 => match row.as_ref() {
                Self::Fallback(_) => None,
                row => Some(RecordKey::new(row.kind(), *entry as u32)),
            },
            _ => None,
        }
    }

    /// Name this record gives a creature or item, if any.
    ///
    /// Creature query responses name a unit; Item-sparse rows, bare or
    /// inside a DB2 reply, name an item.
    pub fn object_name(&self) -> Option<ObjectName> {
        match self {
            Self::CreatureQuery {
                entry,
                template: Some(template),
            } => Some(ObjectName {
                object_type: ObjectType::Unit,
                id: *entry,
                name: template.name.clone(),
            }),
            Self::ItemSparse(item) => Some(ObjectName {
                object_type: ObjectType::Item,
                id: item.entry,
                name: item.name.clone(),
            }),
            Self::DbReply {
                entry,
                row: Some(row),
                ..
            } if *entry >= 0 => row.object_name(),
            _ => None,
        }
    }

    /// Row carried by a DB2 reply.
    pub fn row(&self) -> Option<&DecodedRecord> {
        match self {
            Self::DbReply { row: Some(row), .. } => Some(row.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::FallbackEntry;
    use crate::schema::Value;

    fn item(entry: u32) -> DecodedRecord {
        DecodedRecord::Item(ItemTemplate {
            entry,
            ..ItemTemplate::default()
        })
    }

    #[test]
    fn test_store_keys() {
        assert_eq!(item(25).store_key(), Some(RecordKey::new("item", 25)));
        assert_eq!(
            DecodedRecord::CreatureQuery {
                entry: 3,
                template: None
            }
            .store_key(),
            None
        );
        assert_eq!(
            DecodedRecord::PageText {
                entry: 9,
                page: Some(PageTextPage {
                    text: "hello".into(),
                    next_page: 0
                })
            }
            .store_key(),
            Some(RecordKey::new("page_text", 9))
        );
    }

    #[test]
    fn test_db_reply_key_follows_row() {
        let mut fields = FieldRecord::new();
        fields.push("id", Value::UInt(12));
        let reply = |entry: i32, row: Option<DecodedRecord>| DecodedRecord::DbReply {
            table_hash: 0xABCD,
            hotfix_time: 0,
            entry,
            row: row.map(Box::new),
        };

        let generic = DecodedRecord::Fields {
            kind: "key_chain",
            fields,
        };
        assert_eq!(
            reply(12, Some(generic)).store_key(),
            Some(RecordKey::new("key_chain", 12))
        );
        assert_eq!(reply(40, Some(item(40))).store_key(), Some(RecordKey::new("item", 40)));
        assert_eq!(reply(-4, None).store_key(), None);

        let listing = DecodedRecord::Fallback(FallbackListing {
            tag: 0xABCD,
            entries: vec![FallbackEntry::Byte { index: 0, value: 1 }],
        });
        assert_eq!(reply(5, Some(listing)).store_key(), None);
    }

    #[test]
    fn test_object_names() {
        let creature = DecodedRecord::CreatureQuery {
            entry: 299,
            template: Some(CreatureTemplate {
                name: "Young Wolf".into(),
                ..CreatureTemplate::default()
            }),
        };
        let name = creature.object_name().unwrap();
        assert_eq!(name.object_type, ObjectType::Unit);
        assert_eq!(DecodedRecord::ObjectName(name).store_key(), Some(RecordKey::new("unit_name", 299)));

        let sparse = DecodedRecord::DbReply {
            table_hash: 0x919BE54E,
            hotfix_time: 0,
            entry: 6948,
            row: Some(Box::new(DecodedRecord::ItemSparse(ItemSparse {
                entry: 6948,
                name: "Hearthstone".into(),
                ..ItemSparse::default()
            }))),
        };
        assert_eq!(sparse.store_key(), Some(RecordKey::new("item_sparse", 6948)));
        assert_eq!(
            sparse.object_name(),
            Some(ObjectName {
                object_type: ObjectType::Item,
                id: 6948,
                name: "Hearthstone".into()
            })
        );
        assert_eq!(item(6948).object_name(), None);
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(DecodedRecord::CreatureQuery {
            entry: 7,
            template: None,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"record": "creature_query", "entry": 7, "template": null})
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(RecordKey::new("npc_text", 4).to_string(), "npc_text#4");
    }
}
