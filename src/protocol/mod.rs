//! Protocol module - bit cursor, packed identifiers, frames, capture framing.
//!
//! This module implements the transport-level decoding primitives:
//! - Bit-addressable cursor with MSB-first bit reads and aligned LE reads
//! - Two-phase packed GUID decoding
//! - Frames with provenance and zero-copy sub-frame slicing
//! - Capture stream reader for accumulating partial reads

mod bit_cursor;
mod capture;
mod frame;
mod packed_guid;

pub use bit_cursor::{BitCursor, MAX_BIT_WIDTH};
pub use capture::{
    CaptureHeader, CaptureReader, Packet, CAPTURE_HEADER_SIZE, DEFAULT_MAX_PACKET_SIZE,
};
pub use frame::{Direction, Frame, Provenance};
pub use packed_guid::{PackedGuidCodec, PackedSlots, Slot, GUID_SLOTS};
