//! Frame struct with provenance and sub-frame slicing.
//!
//! A frame is the bounded byte span of one decodable record. The cursor it
//! carries covers exactly that span, so "frame end" is the end of the cursor's
//! buffer. Uses `bytes::Bytes` so sub-frames share the parent's memory.
//!
//! # Example
//!
//! ```
//! use sniffdb::protocol::{Direction, Frame, Provenance};
//! use bytes::Bytes;
//!
//! let provenance = Provenance::new(0x101, Direction::ServerToClient, 1_700_000_000_000, 7);
//! let mut frame = Frame::new(provenance, Bytes::from_static(&[3, 0, 0, 0, 1, 2, 3, 9]));
//!
//! let len = frame.cursor().read_u32().unwrap() as usize;
//! let mut inner = frame.slice(len).unwrap();
//!
//! assert_eq!(inner.len(), 3);
//! assert_eq!(inner.cursor().read_u8().unwrap(), 1);
//! assert_eq!(frame.cursor().read_u8().unwrap(), 9);
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::BitCursor;
use crate::error::{DecodeError, Result};

/// Traffic direction of a captured packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Sent by the client.
    ClientToServer,
    /// Sent by the server.
    ServerToClient,
}

impl Direction {
    /// Decode the capture-file direction byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::ClientToServer),
            1 => Ok(Self::ServerToClient),
            other => Err(DecodeError::Protocol(format!(
                "Invalid direction byte {}",
                other
            ))),
        }
    }

    /// Capture-file direction byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::ClientToServer => 0,
            Self::ServerToClient => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToServer => f.write_str("ClientToServer"),
            Self::ServerToClient => f.write_str("ServerToClient"),
        }
    }
}

/// Where a frame came from. Read-only once the frame exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Discriminant tag (opcode) of the packet.
    pub tag: u32,
    /// Traffic direction.
    pub direction: Direction,
    /// Capture timestamp, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Packet number within the capture.
    pub sequence: u32,
}

impl Provenance {
    /// Create a new provenance record.
    pub fn new(tag: u32, direction: Direction, timestamp_ms: u64, sequence: u32) -> Self {
        Self {
            tag,
            direction,
            timestamp_ms,
            sequence,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} @ {}ms (tag 0x{:04X})",
            self.direction, self.sequence, self.timestamp_ms, self.tag
        )
    }
}

/// One decodable record: provenance plus a cursor over exactly its bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    provenance: Provenance,
    /// Offset of this span inside the parent frame (0 for top-level frames).
    offset: usize,
    cursor: BitCursor,
}

impl Frame {
    /// Create a top-level frame.
    pub fn new(provenance: Provenance, bytes: Bytes) -> Self {
        Self {
            provenance,
            offset: 0,
            cursor: BitCursor::new(bytes),
        }
    }

    /// Create a frame from raw bytes (copies data).
    pub fn from_parts(provenance: Provenance, bytes: &[u8]) -> Self {
        Self::new(provenance, Bytes::copy_from_slice(bytes))
    }

    /// Provenance inherited by every sub-frame.
    #[inline]
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Discriminant tag.
    #[inline]
    pub fn tag(&self) -> u32 {
        self.provenance.tag
    }

    /// Offset of this span inside its parent.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Declared length of the span.
    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    /// Check if the span is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    /// The frame's cursor.
    #[inline]
    pub fn cursor(&mut self) -> &mut BitCursor {
        &mut self.cursor
    }

    /// Read-only view of the cursor.
    #[inline]
    pub fn cursor_ref(&self) -> &BitCursor {
        &self.cursor
    }

    /// True once the cursor sits on the frame boundary.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.cursor.is_exhausted()
    }

    /// Carve the next `n` bytes into an independent sub-frame.
    ///
    /// The outer cursor advances by exactly `n` before the sub-frame is
    /// returned; whatever the sub-decode does, it cannot read past those `n`
    /// bytes nor move this frame's cursor.
    pub fn slice(&mut self, n: usize) -> Result<Frame> {
        let offset = self.cursor.position();
        let bytes = self.cursor.read_bytes(n)?;
        Ok(Frame {
            provenance: self.provenance,
            offset,
            cursor: BitCursor::new(bytes),
        })
    }
}
