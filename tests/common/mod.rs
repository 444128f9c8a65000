//! Shared helpers for integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use sniffdb::protocol::{Direction, Packet, Provenance};

/// MSB-first bit packer mirroring the cursor's layout.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    used: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit(&mut self, bit: bool) -> &mut Self {
        if bit {
            self.current |= 0x80 >> self.used;
        }
        self.used += 1;
        if self.used == 8 {
            self.flush();
        }
        self
    }

    pub fn bits(&mut self, value: u32, width: u32) -> &mut Self {
        for i in (0..width).rev() {
            self.bit(value >> i & 1 == 1);
        }
        self
    }

    /// Pad the partial byte with zero bits.
    pub fn flush(&mut self) -> &mut Self {
        if self.used > 0 {
            self.bytes.push(self.current);
            self.current = 0;
            self.used = 0;
        }
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.flush();
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.bytes(&[v])
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.flush();
        std::mem::take(&mut self.bytes)
    }
}

/// Server packet with the given tag and capture sequence.
pub fn server_packet(tag: u32, sequence: u32, payload: Vec<u8>) -> Packet {
    Packet::new(
        Provenance::new(tag, Direction::ServerToClient, 1_700_000_000_000 + u64::from(sequence), sequence),
        Bytes::from(payload),
    )
}
