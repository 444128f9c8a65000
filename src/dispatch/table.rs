//! Schema table mapping record tags to decode routines.
//!
//! The table is built once, then shared read-only (usually behind an `Arc`)
//! by every worker. Dispatch never fails on an unknown tag: those frames go
//! to the generic fallback.
//!
//! # Example
//!
//! ```
//! use sniffdb::dispatch::SchemaTable;
//! use sniffdb::protocol::{Direction, Frame, Provenance};
//! use sniffdb::schema::{Field, RecordSchema};
//!
//! let mut table = SchemaTable::new();
//! table.register(0x10, RecordSchema::new("ping", vec![Field::U32("token")]));
//!
//! let mut frame = Frame::from_parts(
//!     Provenance::new(0x10, Direction::ClientToServer, 0, 1),
//!     &[1, 0, 0, 0],
//! );
//! let outcome = table.dispatch(0x10, &mut frame).unwrap();
//! assert!(outcome.warnings.is_empty());
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::fallback::list_frame;
use crate::error::Result;
use crate::protocol::Frame;
use crate::records::DecodedRecord;

/// A decode routine for one record kind.
pub trait Routine: Send + Sync + 'static {
    /// Decode a record from a frame positioned at its start.
    fn decode(&self, frame: &mut Frame) -> Result<DecodedRecord>;

    /// Decode, appending warnings from nested records to `warnings`.
    fn decode_with_warnings(
        &self,
        frame: &mut Frame,
        _warnings: &mut Vec<DecodeWarning>,
    ) -> Result<DecodedRecord> {
        self.decode(frame)
    }
}

impl<F> Routine for F
where
    F: Fn(&mut Frame) -> Result<DecodedRecord> + Send + Sync + 'static,
{
    fn decode(&self, frame: &mut Frame) -> Result<DecodedRecord> {
        self(frame)
    }
}

/// Recoverable anomaly noticed while dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// The routine stopped before (or past) the declared frame end.
    RecordLengthMismatch {
        /// Record tag.
        tag: u32,
        /// Declared frame length.
        expected: usize,
        /// Bytes the routine consumed.
        consumed: usize,
    },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordLengthMismatch {
                tag,
                expected,
                consumed,
            } => write!(
                f,
                "Record 0x{:04X} length mismatch: consumed {} of {} bytes",
                tag, consumed, expected
            ),
        }
    }
}

/// Decoded record plus any warnings raised while decoding it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    /// The decoded record.
    pub record: DecodedRecord,
    /// Recoverable anomalies.
    pub warnings: Vec<DecodeWarning>,
}

/// Map from record tag to decode routine.
pub struct SchemaTable {
    routines: HashMap<u32, Box<dyn Routine>>,
}

impl SchemaTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            routines: HashMap::new(),
        }
    }

    /// Register a routine for a tag, replacing any earlier one.
    pub fn register<R: Routine>(&mut self, tag: u32, routine: R) {
        if self.routines.insert(tag, Box::new(routine)).is_some() {
            tracing::debug!("Routine for tag 0x{:04X} replaced", tag);
        }
    }

    /// Check if a tag has a routine.
    pub fn contains(&self, tag: u32) -> bool {
        self.routines.contains_key(&tag)
    }

    /// Number of registered routines.
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Registered tags in ascending order.
    pub fn tags(&self) -> Vec<u32> {
        let mut tags: Vec<u32> = self.routines.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Decode a frame with the routine registered for `tag`.
    ///
    /// Unknown tags go to the generic fallback. When the routine leaves the
    /// cursor anywhere but the frame end, a `RecordLengthMismatch` warning is
    /// recorded and the cursor is forced to the end. Warnings from records
    /// nested inside this one come first.
    ///
    /// # Errors
    ///
    /// Whatever the routine returns; the record is abandoned.
    pub fn dispatch(&self, tag: u32, frame: &mut Frame) -> Result<DecodeOutcome> {
        let mut warnings = Vec::new();
        let record = match self.routines.get(&tag) {
            Some(routine) => routine.decode_with_warnings(frame, &mut warnings)?,
            None => {
                tracing::info!(
                    "No routine for tag 0x{:04X} ({}), using fallback",
                    tag,
                    frame.provenance()
                );
                DecodedRecord::Fallback(list_frame(tag, frame)?)
            }
        };

        if !frame.at_end() {
            let warning = DecodeWarning::RecordLengthMismatch {
                tag,
                expected: frame.len(),
                consumed: frame.cursor_ref().position(),
            };
            tracing::warn!("{} ({})", warning, frame.provenance());
            frame.cursor().seek_end();
            warnings.push(warning);
        }

        Ok(DecodeOutcome { record, warnings })
    }
}

impl Default for SchemaTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaTable")
            .field("tags", &self.tags())
            .finish()
    }
}
