//! Property tests for the decoding primitives.

mod common;

use common::BitWriter;
use proptest::prelude::*;
use sniffdb::dispatch::generic_fallback;
use sniffdb::protocol::{BitCursor, Direction, Frame, PackedGuidCodec, PackedSlots, Provenance};
use sniffdb::records::DecodedRecord;
use sniffdb::DecodeError;

fn frame(bytes: &[u8]) -> Frame {
    Frame::from_parts(Provenance::new(0x42, Direction::ServerToClient, 0, 1), bytes)
}

/// Width and a value that fits in it.
fn arb_bit_field() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=32).prop_flat_map(|width| {
        let max = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
        (Just(width), 0..=max)
    })
}

fn arb_order() -> impl Strategy<Value = Vec<u8>> {
    Just((0u8..8).collect::<Vec<u8>>()).prop_shuffle()
}

/// Packed form of `value`: mask bits in `mask_order`, then present bytes in `byte_order`.
fn pack_guid(value: u64, mask_order: &[u8], byte_order: &[u8]) -> Vec<u8> {
    let bytes = value.to_le_bytes();
    let mut w = BitWriter::new();
    for &i in mask_order {
        w.bit(bytes[i as usize] != 0);
    }
    w.flush();
    for &i in byte_order {
        if bytes[i as usize] != 0 {
            w.u8(bytes[i as usize]);
        }
    }
    w.finish()
}

proptest! {
    #[test]
    fn read_bits_roundtrip((width, value) in arb_bit_field()) {
        let bytes = BitWriter::new().bits(value, width).finish();
        let mut cursor = BitCursor::from_slice(&bytes);
        prop_assert_eq!(cursor.read_bits(width).unwrap(), value);
        prop_assert!(cursor.is_exhausted());
    }

    #[test]
    fn read_bits_sequence(fields in prop::collection::vec(arb_bit_field(), 1..16)) {
        let mut w = BitWriter::new();
        for &(width, value) in &fields {
            w.bits(value, width);
        }
        let bytes = w.finish();

        let mut cursor = BitCursor::from_slice(&bytes);
        for &(width, value) in &fields {
            prop_assert_eq!(cursor.read_bits(width).unwrap(), value);
        }
    }

    #[test]
    fn packed_guid_roundtrip(value in any::<u64>(), mask_order in arb_order(), byte_order in arb_order()) {
        let bytes = pack_guid(value, &mask_order, &byte_order);
        let mut cursor = BitCursor::from_slice(&bytes);
        let mut slots = PackedSlots::new();

        PackedGuidCodec::decode_presence_mask(&mut cursor, &mut slots, &mask_order).unwrap();
        cursor.reset_bit_reader();
        PackedGuidCodec::fill_present_bytes(&mut cursor, &mut slots, &byte_order).unwrap();

        prop_assert_eq!(PackedGuidCodec::compose(&slots).unwrap(), value);
        prop_assert!(cursor.is_exhausted());
    }

    #[test]
    fn reset_discards_unconsumed_bits(first in any::<u8>(), next in any::<u8>(), unconsumed in 0u32..=7) {
        let mut cursor = BitCursor::from_slice(&[first, next]);
        cursor.read_bits(8 - unconsumed).unwrap();
        prop_assert_eq!(u32::from(cursor.pending_bits()), unconsumed);

        cursor.reset_bit_reader();
        prop_assert_eq!(cursor.pending_bits(), 0);
        prop_assert_eq!(cursor.read_u8().unwrap(), next);
    }

    #[test]
    fn fallback_lists_blocks_then_bytes(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut f = frame(&data);
        let DecodedRecord::Fallback(listing) = generic_fallback(&mut f).unwrap() else {
            panic!("expected fallback listing");
        };

        prop_assert_eq!(listing.block_count(), data.len() / 4);
        prop_assert_eq!(listing.byte_count(), data.len() % 4);
        prop_assert!(f.at_end());
    }

    #[test]
    fn slice_confines_sub_decode(
        (data, n) in prop::collection::vec(any::<u8>(), 1..64)
            .prop_flat_map(|data| { let len = data.len(); (Just(data), 0..=len) })
    ) {
        let mut outer = frame(&data);
        let mut inner = outer.slice(n).unwrap();

        prop_assert_eq!(outer.cursor_ref().position(), n);
        prop_assert_eq!(inner.len(), n);
        let read = inner.cursor().read_bytes(n).unwrap();
        prop_assert_eq!(read.as_ref(), &data[..n]);
        let overrun = inner.cursor().read_u8();
        prop_assert!(matches!(overrun, Err(DecodeError::OutOfData { .. })), "expected OutOfData, got {:?}", overrun);
        prop_assert_eq!(outer.cursor_ref().position(), n);
    }
}

#[test]
fn test_known_packed_guid() {
    // mask 0b00000101: slots 0 and 2, bytes for slot 2 then slot 0
    let mut cursor = BitCursor::from_slice(&[0b0000_0101, 0x7F, 0x01]);
    let mut slots = PackedSlots::new();
    PackedGuidCodec::decode_presence_mask(&mut cursor, &mut slots, &[7, 6, 5, 4, 3, 2, 1, 0]).unwrap();
    PackedGuidCodec::fill_present_bytes(&mut cursor, &mut slots, &[2, 0]).unwrap();
    assert_eq!(PackedGuidCodec::compose(&slots).unwrap(), 0x0000_0000_007F_0001);
}
