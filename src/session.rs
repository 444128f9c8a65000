//! Decoder and decode session.
//!
//! A [`Decoder`] owns the read-only schema table and runtime limits and turns
//! one packet into one [`DecodeOutcome`]. A [`DecodeSession`] drives a decoder
//! over a whole capture, forwarding every decoded record to a [`RecordSink`]
//! (keyed content records, plus unkeyed ones such as fallback listings) and
//! absorbing per-record failures so that one malformed packet never aborts
//! the capture.
//!
//! # Example
//!
//! ```
//! use sniffdb::config::ProtocolMap;
//! use sniffdb::sink::RecordStore;
//! use sniffdb::DecoderBuilder;
//!
//! let decoder = DecoderBuilder::new()
//!     .protocol_map(ProtocolMap::new("5.4.0.17359"))
//!     .max_packet_size(1 << 20)
//!     .build();
//!
//! let mut store = RecordStore::new();
//! let mut session = decoder.session(&mut store);
//! session.process_capture(&[]).unwrap();
//! assert_eq!(session.stats().packets, 0);
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::catalog;
use crate::config::{DecoderConfig, ProtocolMap};
use crate::dispatch::{DecodeOutcome, DecodeWarning, SchemaTable};
use crate::error::{DecodeError, Result};
use crate::protocol::{CaptureReader, Packet, Provenance};
use crate::records::{DecodedRecord, RecordKey};
use crate::sink::{RecordSink, StoredRecord};

/// Builder for configuring and creating a [`Decoder`].
pub struct DecoderBuilder {
    map: ProtocolMap,
    table: Option<SchemaTable>,
    config: DecoderConfig,
}

impl DecoderBuilder {
    /// Create a new decoder builder.
    pub fn new() -> Self {
        Self {
            map: ProtocolMap::default(),
            table: None,
            config: DecoderConfig::default(),
        }
    }

    /// Register the catalog schemas against this build's numbering.
    pub fn protocol_map(mut self, map: ProtocolMap) -> Self {
        self.map = map;
        self
    }

    /// Use a hand-built table instead of the catalog.
    pub fn table(mut self, table: SchemaTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Replace all runtime limits.
    pub fn config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the largest accepted packet payload.
    ///
    /// Default: 16 MiB
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Set the maximum decodes in flight in the pipeline.
    ///
    /// Default: 64
    pub fn max_concurrent_decodes(mut self, limit: usize) -> Self {
        self.config.max_concurrent_decodes = limit;
        self
    }

    /// Set the pipeline channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Build the decoder.
    pub fn build(self) -> Decoder {
        let table = match self.table {
            Some(table) => table,
            None => catalog::build(&self.map),
        };
        tracing::debug!(
            "Decoder ready: {} routines (build {:?})",
            table.len(),
            self.map.build
        );
        Decoder {
            table: Arc::new(table),
            config: self.config,
        }
    }
}

impl Default for DecoderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateless packet decoder. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Decoder {
    table: Arc<SchemaTable>,
    config: DecoderConfig,
}

impl Decoder {
    /// Create a new decoder builder.
    pub fn builder() -> DecoderBuilder {
        DecoderBuilder::new()
    }

    /// The schema table.
    pub fn table(&self) -> &Arc<SchemaTable> {
        &self.table
    }

    /// Runtime limits.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode one packet.
    ///
    /// # Errors
    ///
    /// `Protocol` for a payload above the size limit, otherwise whatever the
    /// record routine fails with. Either way only this record is lost.
    pub fn decode(&self, packet: Packet) -> Result<DecodeOutcome> {
        if packet.payload.len() > self.config.max_packet_size as usize {
            return Err(DecodeError::Protocol(format!(
                "Packet size {} exceeds maximum {}",
                packet.payload.len(),
                self.config.max_packet_size
            )));
        }
        let tag = packet.provenance.tag;
        let mut frame = packet.into_frame();
        self.table.dispatch(tag, &mut frame)
    }

    /// Start a session feeding `sink`.
    pub fn session<S: RecordSink>(&self, sink: S) -> DecodeSession<'_, S> {
        DecodeSession::new(self, sink)
    }
}

/// Counters kept by a session or pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Packets seen.
    pub packets: u64,
    /// Packets that produced a record.
    pub decoded: u64,
    /// Records forwarded to the sink under a key.
    pub stored: u64,
    /// Records forwarded to the sink without a key.
    pub unkeyed: u64,
    /// Creature and item names forwarded alongside their records.
    pub names: u64,
    /// Records produced by the generic fallback.
    pub fallbacks: u64,
    /// Records that did not end on their frame boundary.
    pub mismatches: u64,
    /// Records abandoned on truncated data.
    pub abandoned: u64,
    /// Records lost to schema or protocol errors.
    pub failed: u64,
}

impl SessionStats {
    /// Fold one decode result into the counters and the sink.
    ///
    /// Returns the key the record was stored under, or `None` when it was
    /// forwarded unkeyed or lost.
    pub(crate) fn apply<S: RecordSink + ?Sized>(
        &mut self,
        sink: &mut S,
        provenance: &Provenance,
        result: Result<DecodeOutcome>,
    ) -> Option<RecordKey> {
        self.packets += 1;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_record_local() => {
                tracing::warn!("Abandoned record {}: {}", provenance, e);
                self.abandoned += 1;
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to decode {}: {}", provenance, e);
                self.failed += 1;
                return None;
            }
        };

        self.decoded += 1;
        self.mismatches += outcome
            .warnings
            .iter()
            .filter(|w| matches!(w, DecodeWarning::RecordLengthMismatch { .. }))
            .count() as u64;
        if matches!(outcome.record, DecodedRecord::Fallback(_)) {
            self.fallbacks += 1;
        }

        if let Some(name) = outcome.record.object_name() {
            let record = DecodedRecord::ObjectName(name);
            if let Some(key) = record.store_key() {
                sink.store(key, StoredRecord::new(record, provenance));
                self.names += 1;
            }
        }

        let stored = StoredRecord::new(outcome.record, provenance);
        match stored.record.store_key() {
            Some(key) => {
                sink.store(key, stored);
                self.stored += 1;
                Some(key)
            }
            None => {
                sink.store_unkeyed(stored);
                self.unkeyed += 1;
                None
            }
        }
    }
}

/// Sequential decode of one capture into a sink.
pub struct DecodeSession<'a, S: RecordSink> {
    decoder: &'a Decoder,
    sink: S,
    reader: CaptureReader,
    stats: SessionStats,
}

impl<'a, S: RecordSink> DecodeSession<'a, S> {
    /// Create a session over `sink`.
    pub fn new(decoder: &'a Decoder, sink: S) -> Self {
        Self {
            decoder,
            sink,
            reader: CaptureReader::with_max_packet(decoder.config.max_packet_size),
            stats: SessionStats::default(),
        }
    }

    /// Decode one packet and forward its record.
    ///
    /// Never fails: errors are logged, counted and the record dropped.
    pub fn process(&mut self, packet: Packet) -> Option<RecordKey> {
        let provenance = packet.provenance;
        let result = self.decoder.decode(packet);
        self.stats.apply(&mut self.sink, &provenance, result)
    }

    /// Feed raw capture bytes; partial records wait for the next call.
    ///
    /// Returns the number of packets processed.
    ///
    /// # Errors
    ///
    /// `Protocol` if the capture stream itself is corrupt. Packet-level
    /// failures are absorbed by [`process`](Self::process).
    pub fn process_capture(&mut self, data: &[u8]) -> Result<usize> {
        let packets = self.reader.push(data)?;
        let count = packets.len();
        for packet in packets {
            self.process(packet);
        }
        Ok(count)
    }

    /// True when no partial capture record is buffered.
    pub fn is_idle(&self) -> bool {
        self.reader.is_idle()
    }

    /// Counters so far.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// The sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// End the session, returning the sink and final counters.
    pub fn finish(self) -> (S, SessionStats) {
        if !self.reader.is_idle() {
            tracing::warn!(
                "Capture ended with {} bytes of an incomplete record",
                self.reader.len()
            );
        }
        (self.sink, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Direction;
    use crate::schema::{Field, RecordSchema};
    use crate::sink::RecordStore;
    use bytes::Bytes;

    const PAGE: u32 = 0x30;

    fn decoder() -> Decoder {
        let mut table = SchemaTable::new();
        table.register(
            PAGE,
            RecordSchema::new("page", vec![Field::U32("entry"), Field::CString("text")])
                .with_projection(|fields| {
                    Ok(DecodedRecord::PageText {
                        entry: fields.u32("entry")?,
                        page: Some(crate::records::PageTextPage {
                            text: fields.text("text")?.to_string(),
                            next_page: 0,
                        }),
                    })
                }),
        );
        DecoderBuilder::new().table(table).max_packet_size(64).build()
    }

    fn packet(tag: u32, sequence: u32, payload: &[u8]) -> Packet {
        Packet::new(
            Provenance::new(tag, Direction::ServerToClient, 0, sequence),
            Bytes::copy_from_slice(payload),
        )
    }

    #[test]
    fn test_builder_configuration() {
        let decoder = Decoder::builder()
            .max_packet_size(512)
            .max_concurrent_decodes(8)
            .channel_capacity(16)
            .build();

        assert_eq!(decoder.config().max_packet_size, 512);
        assert_eq!(decoder.config().max_concurrent_decodes, 8);
        assert_eq!(decoder.config().channel_capacity, 16);
        assert!(decoder.table().is_empty());
    }

    #[test]
    fn test_process_stores_keyed_record() {
        let decoder = decoder();
        let mut store = RecordStore::new();
        let mut session = decoder.session(&mut store);

        let key = session.process(packet(PAGE, 1, &[7, 0, 0, 0, b'h', b'i', 0]));
        assert_eq!(key, Some(RecordKey::new("page_text", 7)));
        assert_eq!(session.stats().stored, 1);
        drop(session);

        assert!(store.contains(&RecordKey::new("page_text", 7)));
    }

    #[test]
    fn test_truncated_record_is_abandoned() {
        let decoder = decoder();
        let mut session = decoder.session(RecordStore::new());

        assert_eq!(session.process(packet(PAGE, 1, &[7, 0])), None);
        assert!(session
            .process(packet(PAGE, 2, &[8, 0, 0, 0, 0]))
            .is_some());

        let (store, stats) = session.finish();
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.stored, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_oversized_packet_fails_alone() {
        let decoder = decoder();
        let mut session = decoder.session(RecordStore::new());

        session.process(packet(PAGE, 1, &[0u8; 65]));
        session.process(packet(0x99, 2, &[1, 2, 3, 4]));

        let stats = *session.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.stored, 0);
        assert_eq!(stats.unkeyed, 1);
    }

    #[test]
    fn test_fallback_listing_reaches_sink() {
        let decoder = decoder();
        let mut session = decoder.session(RecordStore::new());

        assert_eq!(session.process(packet(0xFFFF, 4, &[1, 2, 3, 4, 5, 6])), None);

        let (store, stats) = session.finish();
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.unkeyed, 1);
        assert!(store.is_empty());

        let listed: Vec<_> = store.fallbacks().collect();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sequence, 4);
        assert!(listed[0].origin.contains("#4"));
        let DecodedRecord::Fallback(listing) = &listed[0].record else {
            panic!("expected fallback listing");
        };
        assert_eq!(listing.tag, 0xFFFF);
        assert_eq!(listing.block_count(), 1);
        assert_eq!(listing.byte_count(), 2);
    }

    #[test]
    fn test_creature_name_stored_with_template() {
        let mut table = SchemaTable::new();
        table.register(
            0x40,
            RecordSchema::new("creature", vec![Field::U32("entry"), Field::CString("name")])
                .with_projection(|fields| {
                    Ok(DecodedRecord::CreatureQuery {
                        entry: fields.u32("entry")?,
                        template: Some(crate::records::CreatureTemplate {
                            name: fields.text("name")?.to_string(),
                            ..Default::default()
                        }),
                    })
                }),
        );
        let decoder = DecoderBuilder::new().table(table).build();
        let mut session = decoder.session(RecordStore::new());

        let key = session.process(packet(0x40, 1, &[43, 1, 0, 0, b'W', b'o', b'l', b'f', 0]));
        assert_eq!(key, Some(RecordKey::new("creature", 299)));

        let (store, stats) = session.finish();
        assert_eq!(stats.names, 1);
        assert_eq!(store.len(), 2);
        match &store.get(&RecordKey::new("unit_name", 299)).unwrap().record {
            DecodedRecord::ObjectName(name) => {
                assert_eq!(name.object_type, crate::records::ObjectType::Unit);
                assert_eq!(name.name, "Wolf");
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_mismatch_is_counted_and_record_kept() {
        let decoder = decoder();
        let mut session = decoder.session(RecordStore::new());

        session.process(packet(PAGE, 1, &[3, 0, 0, 0, b'x', 0, 0xAA, 0xBB]));
        let stats = *session.stats();
        assert_eq!(stats.mismatches, 1);
        assert_eq!(stats.stored, 1);
    }

    #[test]
    fn test_process_capture_across_chunks() {
        let decoder = decoder();
        let mut session = decoder.session(RecordStore::new());

        let mut capture = packet(PAGE, 1, &[1, 0, 0, 0, b'a', 0]).to_capture_bytes();
        capture.extend(packet(PAGE, 2, &[2, 0, 0, 0, b'b', 0]).to_capture_bytes());
        let (first, second) = capture.split_at(30);

        assert_eq!(session.process_capture(first).unwrap(), 1);
        assert!(!session.is_idle());
        assert_eq!(session.process_capture(second).unwrap(), 1);
        assert!(session.is_idle());

        let (store, stats) = session.finish();
        assert_eq!(stats.packets, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_corrupt_capture_is_an_error() {
        let decoder = decoder();
        let mut session = decoder.session(RecordStore::new());

        let mut capture = packet(PAGE, 1, &[1, 0, 0, 0, 0]).to_capture_bytes();
        capture[4] = 9;
        assert!(matches!(
            session.process_capture(&capture),
            Err(DecodeError::Protocol(_))
        ));
    }
}
