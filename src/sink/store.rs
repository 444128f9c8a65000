//! In-memory record store.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use super::{RecordSink, StoredRecord};
use crate::records::{DecodedRecord, ItemEntry, RecordKey};

/// Session-scoped keyed store.
///
/// A key keeps the record with the highest capture sequence; a record from
/// an older packet never replaces a newer one, whatever order they arrive in.
/// Records without a key are kept in arrival order.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: BTreeMap<RecordKey, StoredRecord>,
    unkeyed: Vec<StoredRecord>,
    stale: usize,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record stored under a key.
    pub fn get(&self, key: &RecordKey) -> Option<&StoredRecord> {
        self.records.get(key)
    }

    /// Check if a key is stored.
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &StoredRecord)> {
        self.records.iter()
    }

    /// Number of records of one kind.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.records.keys().filter(|k| k.kind == kind).count()
    }

    /// Records without a key, in arrival order.
    pub fn unkeyed(&self) -> &[StoredRecord] {
        &self.unkeyed
    }

    /// Fallback listings among the unkeyed records.
    pub fn fallbacks(&self) -> impl Iterator<Item = &StoredRecord> {
        self.unkeyed
            .iter()
            .filter(|s| matches!(s.record, DecodedRecord::Fallback(_)))
    }

    /// Item `entry`, joined from its Item and Item-sparse rows.
    ///
    /// Each part keeps its own newest row.
    pub fn item(&self, entry: u32) -> Option<ItemEntry<'_>> {
        let template = match self.row(RecordKey::new("item", entry)) {
            Some(DecodedRecord::Item(t)) => Some(t),
            _ => None,
        };
        let sparse = match self.row(RecordKey::new("item_sparse", entry)) {
            Some(DecodedRecord::ItemSparse(s)) => Some(s),
            _ => None,
        };
        if template.is_none() && sparse.is_none() {
            return None;
        }
        Some(ItemEntry {
            entry,
            template,
            sparse,
        })
    }

    /// Stored record under `key`, unwrapped from its DB2 reply.
    fn row(&self, key: RecordKey) -> Option<&DecodedRecord> {
        self.records
            .get(&key)
            .map(|s| s.record.row().unwrap_or(&s.record))
    }

    /// Every stored item, one per entry, in entry order.
    pub fn items(&self) -> impl Iterator<Item = ItemEntry<'_>> {
        let entries: BTreeSet<u32> = self
            .records
            .keys()
            .filter(|k| k.kind == "item" || k.kind == "item_sparse")
            .map(|k| k.id)
            .collect();
        entries.into_iter().filter_map(move |entry| self.item(entry))
    }

    /// Writes ignored because a newer record was already stored.
    pub fn stale_writes(&self) -> usize {
        self.stale
    }

    /// Insert a record, keeping the newest per key.
    ///
    /// Returns `true` if the record was stored.
    pub fn insert(&mut self, key: RecordKey, record: StoredRecord) -> bool {
        match self.records.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(mut slot) => {
                if slot.get().sequence > record.sequence {
                    tracing::debug!(
                        "Ignoring {} from #{}: already have #{}",
                        key,
                        record.sequence,
                        slot.get().sequence
                    );
                    self.stale += 1;
                    return false;
                }
                slot.insert(record);
                true
            }
        }
    }
}

impl RecordSink for RecordStore {
    fn store(&mut self, key: RecordKey, record: StoredRecord) {
        self.insert(key, record);
    }

    fn store_unkeyed(&mut self, record: StoredRecord) {
        self.unkeyed.push(record);
    }
}
