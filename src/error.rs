//! Error types for sniffdb.

use thiserror::Error;

/// Main error type for all decode operations.
///
/// Errors are per-record values: a decode session catches them at the record
/// boundary, logs them and moves on to the next packet.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The cursor tried to read past the end of its buffer.
    #[error("Out of data: requested {requested} bytes, {available} available")]
    OutOfData {
        /// Bytes the read needed.
        requested: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Schema or engine bug (bad bit width, misaligned read, broken slot contract).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Capture stream violation (oversized record, bad direction byte).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error while exporting records.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config and export).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

impl DecodeError {
    /// Shorthand for an out-of-data error.
    pub(crate) fn out_of_data(requested: usize, available: usize) -> Self {
        Self::OutOfData {
            requested,
            available,
        }
    }

    /// True for errors that only invalidate the current record.
    pub fn is_record_local(&self) -> bool {
        matches!(self, Self::OutOfData { .. })
    }
}

/// Result type alias using DecodeError.
pub type Result<T> = std::result::Result<T, DecodeError>;
