//! Packed identifier codec.
//!
//! 8-byte identifiers (GUIDs) are mostly zero in their high bytes, so the
//! protocol sends them in two phases:
//!
//! 1. a presence mask, one bit per byte slot, in a kind-specific order;
//! 2. later in the record, one aligned byte for every slot flagged present,
//!    in a second, independent order.
//!
//! The codec is stateless. The caller owns a [`PackedSlots`] per identifier, so
//! phases for several identifiers can interleave with unrelated reads.
//!
//! # Example
//!
//! ```
//! use sniffdb::protocol::{BitCursor, PackedGuidCodec, PackedSlots};
//!
//! // mask: slots 2 and 0 present (read in order 7,6,...,0), then bytes for 2, 0
//! let mut cursor = BitCursor::from_slice(&[0b0000_0101, 0x7F, 0x01]);
//! let mut slots = PackedSlots::new();
//! PackedGuidCodec::decode_presence_mask(&mut cursor, &mut slots, &[7, 6, 5, 4, 3, 2, 1, 0]).unwrap();
//! PackedGuidCodec::fill_present_bytes(&mut cursor, &mut slots, &[2, 0]).unwrap();
//! assert_eq!(PackedGuidCodec::compose(&slots).unwrap(), 0x7F0001);
//! ```

use super::BitCursor;
use crate::error::{DecodeError, Result};

/// Number of byte slots in an identifier.
pub const GUID_SLOTS: usize = 8;

/// State of one identifier byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    /// Presence bit from the mask phase.
    pub present: bool,
    /// Byte value; 0 until filled.
    pub value: u8,
    /// Set once the fill phase has read this slot's byte.
    pub resolved: bool,
}

/// Caller-owned slot array for one identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackedSlots {
    slots: [Slot; GUID_SLOTS],
}

impl PackedSlots {
    /// All slots absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a slot.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 8`.
    #[inline]
    pub fn slot(&self, index: usize) -> Slot {
        self.slots[index]
    }

    /// Indices flagged present but not yet filled.
    pub fn unresolved(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.present && !s.resolved)
            .map(|(i, _)| i)
            .collect()
    }

    fn get_mut(&mut self, index: u8) -> Result<&mut Slot> {
        self.slots
            .get_mut(index as usize)
            .ok_or_else(|| DecodeError::Configuration(format!("GUID slot index {} out of range", index)))
    }
}

/// Two-phase decoder for packed identifiers.
pub struct PackedGuidCodec;

impl PackedGuidCodec {
    /// Phase 1: `slots[order[i]].present = read_bit()` for each `i`.
    ///
    /// `order` is usually a full permutation of 0..8; some records split the
    /// mask into several shorter runs.
    pub fn decode_presence_mask(
        cursor: &mut BitCursor,
        slots: &mut PackedSlots,
        order: &[u8],
    ) -> Result<()> {
        for &index in order {
            let present = cursor.read_bit()?;
            let slot = slots.get_mut(index)?;
            slot.present = present;
            slot.value = 0;
            slot.resolved = false;
        }
        Ok(())
    }

    /// Phase 2: read one aligned byte for every present slot in `order`.
    ///
    /// Absent slots are skipped and stay 0.
    ///
    /// # Errors
    ///
    /// `Configuration` if a slot in `order` was already filled.
    pub fn fill_present_bytes(
        cursor: &mut BitCursor,
        slots: &mut PackedSlots,
        order: &[u8],
    ) -> Result<()> {
        for &index in order {
            let slot = slots.get_mut(index)?;
            if !slot.present {
                continue;
            }
            if slot.resolved {
                return Err(DecodeError::Configuration(format!(
                    "GUID slot {} filled twice",
                    index
                )));
            }
            slot.value = cursor.read_u8()?;
            slot.resolved = true;
        }
        Ok(())
    }

    /// Compose the identifier: Σ value[i] << (8·i).
    ///
    /// # Errors
    ///
    /// `Configuration` if a present slot was never filled.
    pub fn compose(slots: &PackedSlots) -> Result<u64> {
        let unresolved = slots.unresolved();
        if !unresolved.is_empty() {
            return Err(DecodeError::Configuration(format!(
                "GUID slots {:?} marked present but never filled",
                unresolved
            )));
        }
        Ok(slots
            .slots
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, s)| acc | (u64::from(s.value) << (8 * i))))
    }
}
