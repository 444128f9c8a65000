//! Capture stream framing.
//!
//! Captured packets are stored back to back, each behind a 21-byte header:
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────────┬──────────┐
//! │ Tag      │ Direction │ Sequence │ Timestamp ms │ Length   │
//! │ 4 bytes  │ 1 byte    │ 4 bytes  │ 8 bytes      │ 4 bytes  │
//! │ u32 LE   │ 0=C→S 1=S→C│ u32 LE  │ u64 LE       │ u32 LE   │
//! └──────────┴───────────┴──────────┴──────────────┴──────────┘
//! ```
//!
//! [`CaptureReader`] accumulates partial reads with a small state machine:
//! - `WaitingForHeader`: need at least 21 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use sniffdb::protocol::{CaptureHeader, CaptureReader, Direction};
//!
//! let header = CaptureHeader::new(0x101, Direction::ServerToClient, 1, 1_000, 2);
//! let mut bytes = header.encode().to_vec();
//! bytes.extend_from_slice(&[0xAB, 0xCD]);
//!
//! let mut reader = CaptureReader::new();
//! let packets = reader.push(&bytes).unwrap();
//! assert_eq!(packets.len(), 1);
//! assert_eq!(&packets[0].payload[..], &[0xAB, 0xCD]);
//! ```

use bytes::{Bytes, BytesMut};

use super::{Direction, Frame, Provenance};
use crate::error::{DecodeError, Result};

/// Capture record header size in bytes.
pub const CAPTURE_HEADER_SIZE: usize = 21;

/// Default maximum packet payload (16 MB).
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// Decoded capture record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    /// Packet provenance.
    pub provenance: Provenance,
    /// Payload length in bytes.
    pub length: u32,
}

impl CaptureHeader {
    /// Create a new header.
    pub fn new(
        tag: u32,
        direction: Direction,
        sequence: u32,
        timestamp_ms: u64,
        length: u32,
    ) -> Self {
        Self {
            provenance: Provenance::new(tag, direction, timestamp_ms, sequence),
            length,
        }
    }

    /// Encode header to bytes (little-endian).
    pub fn encode(&self) -> [u8; CAPTURE_HEADER_SIZE] {
        let p = &self.provenance;
        let mut buf = [0u8; CAPTURE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&p.tag.to_le_bytes());
        buf[4] = p.direction.as_byte();
        buf[5..9].copy_from_slice(&p.sequence.to_le_bytes());
        buf[9..17].copy_from_slice(&p.timestamp_ms.to_le_bytes());
        buf[17..21].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `Ok(None)` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf.len() < CAPTURE_HEADER_SIZE {
            return Ok(None);
        }
        let le_u32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&buf[9..17]);

        Ok(Some(Self {
            provenance: Provenance {
                tag: le_u32(0),
                direction: Direction::from_byte(buf[4])?,
                sequence: le_u32(5),
                timestamp_ms: u64::from_le_bytes(ts),
            },
            length: le_u32(17),
        }))
    }
}

/// A captured packet: provenance plus its opaque payload.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Where the packet came from.
    pub provenance: Provenance,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet.
    pub fn new(provenance: Provenance, payload: Bytes) -> Self {
        Self {
            provenance,
            payload,
        }
    }

    /// Turn the packet into a top-level frame.
    pub fn into_frame(self) -> Frame {
        Frame::new(self.provenance, self.payload)
    }

    /// Encode as a capture record (header + payload).
    pub fn to_capture_bytes(&self) -> Vec<u8> {
        let header = CaptureHeader {
            provenance: self.provenance,
            length: self.payload.len() as u32,
        };
        let mut buf = Vec::with_capacity(CAPTURE_HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// State machine for record parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header.
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: CaptureHeader },
}

/// Buffer for accumulating capture bytes and extracting complete packets.
pub struct CaptureReader {
    buffer: BytesMut,
    state: State,
    max_packet_size: u32,
}

impl CaptureReader {
    /// Create a reader with the default maximum packet size.
    pub fn new() -> Self {
        Self::with_max_packet(DEFAULT_MAX_PACKET_SIZE)
    }

    /// Create a reader with a custom maximum packet size.
    pub fn with_max_packet(max_packet_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_packet_size,
        }
    }

    /// Push data and extract all complete packets.
    ///
    /// Partial data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// `Protocol` if a header declares a payload above the maximum or carries
    /// an invalid direction byte.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Packet>> {
        self.buffer.extend_from_slice(data);

        let mut packets = Vec::new();
        while let Some(packet) = self.try_extract_one()? {
            packets.push(packet);
        }
        Ok(packets)
    }

    fn try_extract_one(&mut self) -> Result<Option<Packet>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    let header = match CaptureHeader::decode(&self.buffer)? {
                        Some(h) => h,
                        None => return Ok(None),
                    };

                    if header.length > self.max_packet_size {
                        return Err(DecodeError::Protocol(format!(
                            "Packet size {} exceeds maximum {}",
                            header.length, self.max_packet_size
                        )));
                    }

                    let _ = self.buffer.split_to(CAPTURE_HEADER_SIZE);
                    self.state = State::WaitingForPayload { header };
                }
                State::WaitingForPayload { header } => {
                    let length = header.length as usize;
                    if self.buffer.len() < length {
                        return Ok(None);
                    }

                    let provenance = header.provenance;
                    let payload = self.buffer.split_to(length).freeze();
                    self.state = State::WaitingForHeader;
                    return Ok(Some(Packet::new(provenance, payload)));
                }
            }
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// True when no partial record is pending.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && matches!(self.state, State::WaitingForHeader)
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for CaptureReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: u32, sequence: u32, payload: &[u8]) -> Vec<u8> {
        Packet::new(
            Provenance::new(tag, Direction::ServerToClient, 5_000 + sequence as u64, sequence),
            Bytes::copy_from_slice(payload),
        )
        .to_capture_bytes()
    }

    #[test]
    fn test_header_layout() {
        let header = CaptureHeader::new(0x0102_0304, Direction::ServerToClient, 7, 0x1122, 9);
        let bytes = header.encode();

        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[5..9], &[7, 0, 0, 0]);
        assert_eq!(&bytes[9..11], &[0x22, 0x11]);
        assert_eq!(&bytes[17..21], &[9, 0, 0, 0]);
        assert_eq!(CaptureHeader::decode(&bytes).unwrap(), Some(header));
    }

    #[test]
    fn test_header_too_short() {
        assert_eq!(CaptureHeader::decode(&[0u8; 20]).unwrap(), None);
    }

    #[test]
    fn test_invalid_direction() {
        let mut bytes = CaptureHeader::new(1, Direction::ClientToServer, 1, 1, 0).encode();
        bytes[4] = 9;
        let mut reader = CaptureReader::new();
        let err = reader.push(&bytes).unwrap_err();
        assert!(err.to_string().contains("Invalid direction"));
    }

    #[test]
    fn test_multiple_packets_in_one_push() {
        let mut data = record(1, 1, b"first");
        data.extend(record(2, 2, b""));
        data.extend(record(3, 3, b"third"));

        let mut reader = CaptureReader::new();
        let packets = reader.push(&data).unwrap();

        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].provenance.tag, 1);
        assert!(packets[1].payload.is_empty());
        assert_eq!(&packets[2].payload[..], b"third");
        assert!(reader.is_idle());
    }

    #[test]
    fn test_fragmented_header_and_payload() {
        let data = record(0x101, 9, b"payload bytes");
        let mut reader = CaptureReader::new();

        assert!(reader.push(&data[..10]).unwrap().is_empty());
        assert_eq!(reader.state_name(), "WaitingForHeader");

        assert!(reader.push(&data[10..CAPTURE_HEADER_SIZE + 3]).unwrap().is_empty());
        assert_eq!(reader.state_name(), "WaitingForPayload");

        let packets = reader.push(&data[CAPTURE_HEADER_SIZE + 3..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].provenance.sequence, 9);
        assert_eq!(&packets[0].payload[..], b"payload bytes");
    }

    #[test]
    fn test_byte_at_a_time() {
        let data = record(5, 1, b"hi");
        let mut reader = CaptureReader::new();
        let mut all = Vec::new();
        for byte in &data {
            all.extend(reader.push(&[*byte]).unwrap());
        }
        assert_eq!(all.len(), 1);
        assert_eq!(&all[0].payload[..], b"hi");
    }

    #[test]
    fn test_max_packet_validation() {
        let mut reader = CaptureReader::with_max_packet(4);
        let err = reader.push(&record(1, 1, b"too long")).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_clear_resets_state() {
        let data = record(1, 1, b"abcdef");
        let mut reader = CaptureReader::new();
        reader.push(&data[..CAPTURE_HEADER_SIZE + 2]).unwrap();
        assert_eq!(reader.state_name(), "WaitingForPayload");
        assert_eq!(reader.len(), 2);

        reader.clear();
        assert!(reader.is_idle());
    }

    #[test]
    fn test_packet_into_frame() {
        let packet = Packet::new(
            Provenance::new(3, Direction::ClientToServer, 0, 1),
            Bytes::from_static(&[1, 2]),
        );
        let frame = packet.into_frame();
        assert_eq!(frame.tag(), 3);
        assert_eq!(frame.len(), 2);
    }
}
