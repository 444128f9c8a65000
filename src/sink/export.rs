//! Store snapshots: JSON lines and MessagePack.
//!
//! MessagePack snapshots use `rmp_serde::to_vec_named`, so structs are maps
//! keyed by field name and readable without this crate's types.
//!
//! # Example
//!
//! ```
//! use sniffdb::sink::{export, RecordStore};
//!
//! let store = RecordStore::new();
//! let mut out = Vec::new();
//! assert_eq!(export::write_json_lines(&store, &mut out).unwrap(), 0);
//!
//! let snapshot = export::to_msgpack(&store).unwrap();
//! let entries: Vec<serde_json::Value> = export::MsgPackCodec::decode(&snapshot).unwrap();
//! assert!(entries.is_empty());
//! ```

use std::io::Write;

use serde::Serialize;

use super::{RecordStore, StoredRecord};
use crate::error::Result;
use crate::records::{DecodedRecord, RecordKey};

/// MessagePack codec for snapshots.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value with structs as named maps.
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode a snapshot, typically into `serde_json::Value`.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// One exported record.
#[derive(Debug, Serialize)]
pub struct ExportEntry<'a> {
    /// Store key, `None` for unkeyed records.
    pub key: Option<RecordKey>,
    /// Capture sequence.
    pub sequence: u32,
    /// Provenance.
    pub origin: &'a str,
    /// The record.
    pub record: &'a DecodedRecord,
}

impl<'a> ExportEntry<'a> {
    fn new(key: Option<RecordKey>, stored: &'a StoredRecord) -> Self {
        Self {
            key,
            sequence: stored.sequence,
            origin: &stored.origin,
            record: &stored.record,
        }
    }
}

/// Export entries: keyed records in key order, then unkeyed ones in arrival order.
pub fn entries(store: &RecordStore) -> impl Iterator<Item = ExportEntry<'_>> {
    store
        .iter()
        .map(|(key, stored)| ExportEntry::new(Some(*key), stored))
        .chain(store.unkeyed().iter().map(|stored| ExportEntry::new(None, stored)))
}

/// Write one JSON object per line; returns the number of lines.
pub fn write_json_lines<W: Write>(store: &RecordStore, mut writer: W) -> Result<usize> {
    let mut lines = 0;
    for entry in entries(store) {
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        lines += 1;
    }
    writer.flush()?;
    Ok(lines)
}

/// Encode the whole store as one MessagePack array.
pub fn to_msgpack(store: &RecordStore) -> Result<Vec<u8>> {
    let all: Vec<ExportEntry<'_>> = entries(store).collect();
    MsgPackCodec::encode(&all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Direction, Provenance};
    use crate::records::ItemTemplate;
    use crate::dispatch::FallbackListing;
    use crate::sink::RecordSink;

    fn store() -> RecordStore {
        let mut store = RecordStore::new();
        for entry in [25u32, 17] {
            store.store(
                RecordKey::new("item", entry),
                StoredRecord::new(
                    DecodedRecord::Item(ItemTemplate {
                        entry,
                        display_id: entry * 10,
                        ..ItemTemplate::default()
                    }),
                    &Provenance::new(0x2B, Direction::ServerToClient, 1_000, entry),
                ),
            );
        }
        store
    }

    #[test]
    fn test_json_lines() {
        let mut out = Vec::new();
        let lines = write_json_lines(&store(), &mut out).unwrap();
        assert_eq!(lines, 2);

        let text = String::from_utf8(out).unwrap();
        let parsed: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed[0]["key"], serde_json::json!({"kind": "item", "id": 17}));
        assert_eq!(parsed[0]["record"]["record"], "item");
        assert_eq!(parsed[0]["record"]["display_id"], 170);
        assert_eq!(parsed[1]["sequence"], 25);
        assert!(parsed[1]["origin"].as_str().unwrap().contains("#25"));
    }

    #[test]
    fn test_unkeyed_records_follow_keyed_ones() {
        let mut store = store();
        store.store_unkeyed(StoredRecord::new(
            DecodedRecord::Fallback(FallbackListing {
                tag: 0xFFFF,
                entries: Vec::new(),
            }),
            &Provenance::new(0xFFFF, Direction::ServerToClient, 0, 3),
        ));

        let mut out = Vec::new();
        assert_eq!(write_json_lines(&store, &mut out).unwrap(), 3);
        let text = String::from_utf8(out).unwrap();
        let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
        assert!(last["key"].is_null());
        assert_eq!(last["record"]["record"], "fallback");
        assert_eq!(last["record"]["tag"], 0xFFFF);
    }

    #[test]
    fn test_msgpack_snapshot_uses_named_fields() {
        let bytes = to_msgpack(&store()).unwrap();
        let decoded: serde_json::Value = MsgPackCodec::decode(&bytes).unwrap();

        let entries = decoded.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["key"]["id"], 25);
        assert_eq!(entries[1]["record"]["entry"], 25);
    }
}
