//! Catalog module - schemas of the query family and DB2 rows.
//!
//! Schemas are registered under the numbers a [`ProtocolMap`] assigns to
//! their opcode or DB2 table names; names missing from the map stay
//! unregistered and their records go to the fallback.
//!
//! # Example
//!
//! ```
//! use sniffdb::catalog::{self, db2, opcodes};
//! use sniffdb::config::ProtocolMap;
//!
//! let mut map = ProtocolMap::new("5.4.0.17359");
//! map.add_opcode(opcodes::SMSG_DB_REPLY, 0x0A8D)
//!     .add_db2_table(db2::ITEM, 0x50238EC2);
//!
//! let table = catalog::build(&map);
//! assert!(table.contains(0x0A8D));
//! ```

mod db2_rows;
mod query;

use std::sync::Arc;

use crate::config::ProtocolMap;
use crate::dispatch::SchemaTable;
use crate::schema::RecordSchema;

pub use db2_rows::db2_schemas;
pub use query::query_schemas;

/// Opcode names known to the catalog.
pub mod opcodes {
    pub const CMSG_CREATURE_QUERY: &str = "CMSG_CREATURE_QUERY";
    pub const SMSG_CREATURE_QUERY_RESPONSE: &str = "SMSG_CREATURE_QUERY_RESPONSE";
    pub const CMSG_DB_QUERY_BULK: &str = "CMSG_DB_QUERY_BULK";
    pub const SMSG_DB_REPLY: &str = "SMSG_DB_REPLY";
    pub const SMSG_REALM_QUERY_RESPONSE: &str = "SMSG_REALM_QUERY_RESPONSE";
    pub const CMSG_PAGE_TEXT_QUERY: &str = "CMSG_PAGE_TEXT_QUERY";
    pub const SMSG_PAGE_TEXT_QUERY_RESPONSE: &str = "SMSG_PAGE_TEXT_QUERY_RESPONSE";
    pub const CMSG_NPC_TEXT_QUERY: &str = "CMSG_NPC_TEXT_QUERY";
    pub const SMSG_NPC_TEXT_UPDATE: &str = "SMSG_NPC_TEXT_UPDATE";
    pub const CMSG_NAME_QUERY: &str = "CMSG_NAME_QUERY";
    pub const SMSG_NAME_QUERY_RESPONSE: &str = "SMSG_NAME_QUERY_RESPONSE";
    pub const SMSG_QUEST_QUERY_RESPONSE: &str = "SMSG_QUEST_QUERY_RESPONSE";
}

/// DB2 table names known to the catalog.
pub mod db2 {
    pub const BROADCAST_TEXT: &str = "BroadcastText";
    pub const CREATURE: &str = "Creature";
    pub const CREATURE_DIFFICULTY: &str = "CreatureDifficulty";
    pub const GAME_OBJECTS: &str = "GameObjects";
    pub const ITEM: &str = "Item";
    pub const ITEM_EXTENDED_COST: &str = "ItemExtendedCost";
    pub const ITEM_SPARSE: &str = "Item-sparse";
    pub const KEY_CHAIN: &str = "KeyChain";
    pub const SCENE_SCRIPT: &str = "SceneScript";
    pub const VIGNETTE: &str = "Vignette";
}

/// Build the DB2 row table: table hash to row schema.
pub fn build_db2_table(map: &ProtocolMap) -> SchemaTable {
    register_named(db2_schemas(), |name| map.db2_table(name), "DB2 table")
}

/// Build the top-level table: record tag to query family schema.
///
/// DB2 replies decode their rows through a nested table built from the
/// same map.
pub fn build(map: &ProtocolMap) -> SchemaTable {
    let rows = Arc::new(build_db2_table(map));
    let table = register_named(query_schemas(rows), |name| map.opcode(name), "Opcode");

    for (name, tag) in &map.opcodes {
        if !table.contains(*tag) {
            tracing::debug!("Opcode {} (0x{:04X}) has no schema, using fallback", name, tag);
        }
    }
    table
}

fn register_named(
    schemas: Vec<(&'static str, RecordSchema)>,
    lookup: impl Fn(&str) -> Option<u32>,
    what: &str,
) -> SchemaTable {
    let mut table = SchemaTable::new();
    for (name, schema) in schemas {
        match lookup(name) {
            Some(tag) => table.register(tag, schema),
            None => tracing::debug!("{} {} not in protocol map", what, name),
        }
    }
    table
}

#[cfg(test)]
pub(crate) mod test_util {
    /// MSB-first bit packer for building payloads.
    #[derive(Default)]
    pub struct BitWriter {
        bytes: Vec<u8>,
        current: u8,
        used: u8,
    }

    impl BitWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn bit(&mut self, bit: bool) -> &mut Self {
            if bit {
                self.current |= 0x80 >> self.used;
            }
            self.used += 1;
            if self.used == 8 {
                self.flush();
            }
            self
        }

        pub fn bits(&mut self, value: u32, width: u32) -> &mut Self {
            for i in (0..width).rev() {
                self.bit(value >> i & 1 == 1);
            }
            self
        }

        /// Pad to the byte boundary, like a reader reset.
        pub fn flush(&mut self) -> &mut Self {
            if self.used > 0 {
                self.bytes.push(self.current);
                self.current = 0;
                self.used = 0;
            }
            self
        }

        pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
            self.flush();
            self.bytes.extend_from_slice(data);
            self
        }

        pub fn u8(&mut self, v: u8) -> &mut Self {
            self.bytes(&[v])
        }

        pub fn u16(&mut self, v: u16) -> &mut Self {
            self.bytes(&v.to_le_bytes())
        }

        pub fn u32(&mut self, v: u32) -> &mut Self {
            self.bytes(&v.to_le_bytes())
        }

        pub fn i32(&mut self, v: i32) -> &mut Self {
            self.bytes(&v.to_le_bytes())
        }

        pub fn f32(&mut self, v: f32) -> &mut Self {
            self.bytes(&v.to_le_bytes())
        }

        pub fn cstring(&mut self, s: &str) -> &mut Self {
            self.bytes(s.as_bytes()).u8(0)
        }

        pub fn finish(&mut self) -> Vec<u8> {
            self.flush();
            std::mem::take(&mut self.bytes)
        }
    }
}
