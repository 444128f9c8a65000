//! Generic fallback for tags without a routine.

use serde::Serialize;

use crate::error::Result;
use crate::protocol::Frame;
use crate::records::DecodedRecord;

/// One unit of a fallback listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum FallbackEntry {
    /// A 4-byte block, shown both ways.
    Block {
        /// Block number.
        index: usize,
        /// Block as little-endian u32.
        as_u32: u32,
        /// Block as little-endian f32.
        as_f32: f32,
    },
    /// A trailing single byte.
    Byte {
        /// Byte number, counted after the blocks.
        index: usize,
        /// Byte value.
        value: u8,
    },
}

/// Best-effort listing of an undecoded frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackListing {
    /// Record tag.
    pub tag: u32,
    /// Blocks, then leftover bytes.
    pub entries: Vec<FallbackEntry>,
}

impl FallbackListing {
    /// Number of 4-byte blocks.
    pub fn block_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, FallbackEntry::Block { .. }))
            .count()
    }

    /// Number of leftover single bytes.
    pub fn byte_count(&self) -> usize {
        self.entries.len() - self.block_count()
    }
}

/// List the rest of a frame as 4-byte blocks, then single bytes.
///
/// Starts at the cursor's current position and always consumes the whole frame.
pub fn generic_fallback(frame: &mut Frame) -> Result<DecodedRecord> {
    let tag = frame.tag();
    Ok(DecodedRecord::Fallback(list_frame(tag, frame)?))
}

/// Fallback listing labelled with `tag` (nested records carry their own tag).
pub(crate) fn list_frame(tag: u32, frame: &mut Frame) -> Result<FallbackListing> {
    let cursor = frame.cursor();
    cursor.reset_bit_reader();

    let remaining = cursor.remaining();
    let mut entries = Vec::with_capacity(remaining / 4 + remaining % 4);

    let mut index = 0;
    while cursor.remaining() >= 4 {
        let as_u32 = cursor.read_u32()?;
        entries.push(FallbackEntry::Block {
            index,
            as_u32,
            as_f32: f32::from_bits(as_u32),
        });
        index += 1;
    }

    let mut index = 0;
    while cursor.remaining() > 0 {
        let value = cursor.read_u8()?;
        entries.push(FallbackEntry::Byte { index, value });
        index += 1;
    }

    Ok(FallbackListing { tag, entries })
}
