//! Sink module - where decoded records go.
//!
//! Provides:
//! - [`RecordSink`] - store interface fed by a decode session
//! - [`RecordStore`] - in-memory last-write-wins store
//! - [`export`] - JSON lines and MessagePack snapshots of a store

pub mod export;
mod store;

use serde::Serialize;

pub use store::RecordStore;

use crate::protocol::Provenance;
use crate::records::{DecodedRecord, RecordKey};

/// A record as kept by a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    /// Capture sequence of the packet the record came from.
    pub sequence: u32,
    /// Human-readable provenance.
    pub origin: String,
    /// The record.
    pub record: DecodedRecord,
}

impl StoredRecord {
    /// Wrap a record with its provenance.
    pub fn new(record: DecodedRecord, provenance: &Provenance) -> Self {
        Self {
            sequence: provenance.sequence,
            origin: provenance.to_string(),
            record,
        }
    }
}

/// Downstream keyed store.
///
/// Implementations must be idempotent: storing the same key twice with the
/// same sequence leaves one record.
pub trait RecordSink {
    /// Store a record under its key.
    fn store(&mut self, key: RecordKey, record: StoredRecord);

    /// Take a record that has no content key: fallback listings, queries,
    /// empty responses and removed DB2 rows.
    fn store_unkeyed(&mut self, record: StoredRecord);
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn store(&mut self, key: RecordKey, record: StoredRecord) {
        (**self).store(key, record)
    }

    fn store_unkeyed(&mut self, record: StoredRecord) {
        (**self).store_unkeyed(record)
    }
}
