//! Decoder configuration and protocol map.
//!
//! [`DecoderConfig`] holds the runtime limits. [`ProtocolMap`] names the
//! numeric record tags and DB2 table hashes of one client build; the catalog
//! registers its schemas against these numbers.
//!
//! # Example
//!
//! ```
//! use sniffdb::config::ProtocolMap;
//!
//! let map = ProtocolMap::from_json(r#"{
//!     "build": "5.4.0.17359",
//!     "opcodes": { "SMSG_DB_REPLY": 4660 },
//!     "db2_tables": { "Item": 1344507586 }
//! }"#).unwrap();
//!
//! assert_eq!(map.opcode("SMSG_DB_REPLY"), Some(4660));
//! assert_eq!(map.db2_table("Item"), Some(1344507586));
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PACKET_SIZE;

/// Default maximum concurrent decodes in the pipeline.
pub const DEFAULT_MAX_CONCURRENT_DECODES: usize = 64;

/// Default pipeline channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Runtime limits of a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Largest packet payload accepted from a capture stream.
    pub max_packet_size: u32,
    /// Maximum decodes in flight in the pipeline.
    pub max_concurrent_decodes: usize,
    /// Capacity of the pipeline packet and result channels.
    pub channel_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            max_concurrent_decodes: DEFAULT_MAX_CONCURRENT_DECODES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Opcode and DB2 table numbering of one client build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMap {
    /// Client build the numbers belong to.
    #[serde(default)]
    pub build: String,
    /// Opcode name to record tag.
    #[serde(default)]
    pub opcodes: BTreeMap<String, u32>,
    /// DB2 table name to table hash.
    #[serde(default)]
    pub db2_tables: BTreeMap<String, u32>,
}

impl ProtocolMap {
    /// Create an empty map.
    pub fn new(build: &str) -> Self {
        Self {
            build: build.to_string(),
            ..Self::default()
        }
    }

    /// Parse a map from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a map from a JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a map from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Serialize the map as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add an opcode.
    pub fn add_opcode(&mut self, name: &str, tag: u32) -> &mut Self {
        self.opcodes.insert(name.to_string(), tag);
        self
    }

    /// Add a DB2 table.
    pub fn add_db2_table(&mut self, name: &str, hash: u32) -> &mut Self {
        self.db2_tables.insert(name.to_string(), hash);
        self
    }

    /// Record tag of an opcode.
    pub fn opcode(&self, name: &str) -> Option<u32> {
        self.opcodes.get(name).copied()
    }

    /// Hash of a DB2 table.
    pub fn db2_table(&self, name: &str) -> Option<u32> {
        self.db2_tables.get(name).copied()
    }

    /// Opcode name of a record tag.
    pub fn opcode_name(&self, tag: u32) -> Option<&str> {
        self.opcodes
            .iter()
            .find(|(_, &t)| t == tag)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn test_config_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
        assert_eq!(config.max_concurrent_decodes, DEFAULT_MAX_CONCURRENT_DECODES);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_config_partial_json() {
        let config: DecoderConfig =
            serde_json::from_str(r#"{"max_concurrent_decodes": 4}"#).unwrap();
        assert_eq!(config.max_concurrent_decodes, 4);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_map_lookup() {
        let mut map = ProtocolMap::new("5.4.0.17359");
        map.add_opcode("CMSG_CREATURE_QUERY", 0x0842)
            .add_db2_table("BroadcastText", 0x21);

        assert_eq!(map.opcode("CMSG_CREATURE_QUERY"), Some(0x0842));
        assert_eq!(map.opcode_name(0x0842), Some("CMSG_CREATURE_QUERY"));
        assert_eq!(map.db2_table("BroadcastText"), Some(0x21));
        assert_eq!(map.opcode("SMSG_UNKNOWN"), None);
    }

    #[test]
    fn test_map_json_round_trip() {
        let mut map = ProtocolMap::new("5.4.0.17359");
        map.add_opcode("SMSG_DB_REPLY", 1).add_db2_table("Item", 2);

        let json = map.to_json().unwrap();
        assert_eq!(ProtocolMap::from_json(&json).unwrap(), map);
    }

    #[test]
    fn test_map_missing_sections() {
        let map = ProtocolMap::from_json(r#"{"opcodes": {"A": 1}}"#).unwrap();
        assert!(map.db2_tables.is_empty());
        assert_eq!(map.build, "");
    }

    #[test]
    fn test_map_invalid_json() {
        let err = ProtocolMap::from_json("{ not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_map_missing_file() {
        let err = ProtocolMap::load("/nonexistent/protocol.json").unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
