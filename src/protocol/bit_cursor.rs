//! Bit-addressable read cursor.
//!
//! The protocol packs flags and short lengths into bit fields that precede
//! the byte-aligned part of a record:
//!
//! ```text
//!  byte 0          byte 1          byte 2..
//! ┌───────────────┬───────────────┬──────────────────────┐
//! │ b7 b6 ... b0  │ b7 b6 ... b0  │ aligned LE fields    │
//! └───────────────┴───────────────┴──────────────────────┘
//!   bits are popped MSB-first      reset_bit_reader() first
//! ```
//!
//! Aligned reads are little-endian and require the bit queue to be empty.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use sniffdb::protocol::BitCursor;
//!
//! let mut cursor = BitCursor::new(Bytes::from_static(&[0b1011_0000, 0x2A, 0, 0, 0]));
//! assert!(cursor.read_bit().unwrap());
//! assert_eq!(cursor.read_bits(3).unwrap(), 0b011);
//! cursor.reset_bit_reader();
//! assert_eq!(cursor.read_u32().unwrap(), 42);
//! ```

use bytes::Bytes;

use crate::error::{DecodeError, Result};

/// Maximum width accepted by [`BitCursor::read_bits`].
pub const MAX_BIT_WIDTH: u32 = 32;

/// Read cursor over an immutable buffer.
#[derive(Debug, Clone)]
pub struct BitCursor {
    buffer: Bytes,
    /// Next byte to fetch. Never decreases.
    position: usize,
    /// Byte the queued bits come from.
    bit_value: u8,
    /// Unconsumed bits of `bit_value` (0-7 between reads).
    bits_left: u8,
}

impl BitCursor {
    /// Create a cursor at position 0.
    pub fn new(buffer: Bytes) -> Self {
        Self {
            buffer,
            position: 0,
            bit_value: 0,
            bits_left: 0,
        }
    }

    /// Create a cursor from a slice (copies data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Byte position of the next fetch.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total buffer length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes not yet fetched.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Number of queued bits.
    #[inline]
    pub fn pending_bits(&self) -> u8 {
        self.bits_left
    }

    /// True when every byte has been fetched.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.position == self.buffer.len()
    }

    /// The underlying buffer.
    #[inline]
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.bits_left == 0 {
            self.bit_value = self.fetch()?;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok((self.bit_value >> self.bits_left) & 1 == 1)
    }

    /// Read `width` bits, most significant first.
    ///
    /// # Errors
    ///
    /// `Configuration` if `width > 32`, `OutOfData` if the buffer runs out.
    pub fn read_bits(&mut self, width: u32) -> Result<u32> {
        if width > MAX_BIT_WIDTH {
            return Err(DecodeError::Configuration(format!(
                "Bit width {} exceeds maximum {}",
                width, MAX_BIT_WIDTH
            )));
        }

        let mut value = 0u32;
        for _ in 0..width {
            value = (value << 1) | u32::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Discard queued bits; the next read starts at the following byte.
    #[inline]
    pub fn reset_bit_reader(&mut self) {
        self.bits_left = 0;
        self.bit_value = 0;
    }

    /// Read one aligned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_aligned("u8")?;
        self.fetch()
    }

    /// Read an aligned little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array("u16")?))
    }

    /// Read an aligned little-endian i32.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array("i32")?))
    }

    /// Read an aligned little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array("u32")?))
    }

    /// Read an aligned little-endian f32.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array("f32")?))
    }

    /// Read `n` aligned bytes (zero-copy).
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.ensure_aligned("bytes")?;
        self.take(n)
    }

    /// Read bytes up to a terminating zero.
    ///
    /// The terminator is consumed but not returned. Invalid UTF-8 is replaced.
    pub fn read_cstring(&mut self) -> Result<String> {
        self.ensure_aligned("cstring")?;
        let rest = &self.buffer[self.position..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| DecodeError::out_of_data(rest.len() + 1, rest.len()))?;
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.position += end + 1;
        Ok(text)
    }

    /// Read exactly `len` bytes as text.
    ///
    /// `len` normally comes from a bit-packed length read earlier in the record.
    pub fn read_fixed_text(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Move to the end of the buffer, dropping queued bits.
    ///
    /// Returns the number of bytes skipped.
    pub fn seek_end(&mut self) -> usize {
        let skipped = self.remaining();
        self.position = self.buffer.len();
        self.reset_bit_reader();
        skipped
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        self.ensure_aligned(what)?;
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    fn ensure_aligned(&self, what: &str) -> Result<()> {
        if self.bits_left != 0 {
            return Err(DecodeError::Configuration(format!(
                "Aligned {} read at byte {} with {} queued bits; reset_bit_reader required",
                what, self.position, self.bits_left
            )));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<Bytes> {
        let available = self.remaining();
        if n > available {
            return Err(DecodeError::out_of_data(n, available));
        }
        let bytes = self.buffer.slice(self.position..self.position + n);
        self.position += n;
        Ok(bytes)
    }

    fn fetch(&mut self) -> Result<u8> {
        let byte = *self
            .buffer
            .get(self.position)
            .ok_or_else(|| DecodeError::out_of_data(1, 0))?;
        self.position += 1;
        Ok(byte)
    }
}
