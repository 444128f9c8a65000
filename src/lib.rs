//! # sniffdb
//!
//! Bit-level decoding engine for captured game protocol traffic.
//!
//! Captured packets are turned into typed content records (creatures, texts,
//! items, DB2 rows) and collected in a keyed store.
//!
//! ## Architecture
//!
//! - **Protocol**: MSB-first bit cursor, packed GUIDs, frames and sub-frames,
//!   capture stream framing
//! - **Schema**: record layouts as data, replayed by one generic interpreter
//! - **Dispatch**: tag to schema table with a generic fallback for unknown tags
//! - **Session**: sequential or parallel (`tokio`) decoding into a
//!   [`RecordSink`](sink::RecordSink)
//!
//! ## Example
//!
//! ```
//! use sniffdb::catalog::opcodes;
//! use sniffdb::config::ProtocolMap;
//! use sniffdb::protocol::{Direction, Packet, Provenance};
//! use sniffdb::sink::RecordStore;
//! use sniffdb::Decoder;
//!
//! let mut map = ProtocolMap::new("5.4.0.17359");
//! map.add_opcode(opcodes::CMSG_PAGE_TEXT_QUERY, 0x1022);
//!
//! let decoder = Decoder::builder().protocol_map(map).build();
//! let mut store = RecordStore::new();
//! let mut session = decoder.session(&mut store);
//!
//! // An unmapped tag still decodes, as a fallback listing without a key.
//! let packet = Packet::new(
//!     Provenance::new(0xFFFF, Direction::ServerToClient, 0, 1),
//!     vec![1, 2, 3, 4, 5, 6].into(),
//! );
//! assert!(session.process(packet).is_none());
//! assert_eq!(session.stats().fallbacks, 1);
//! drop(session);
//! assert_eq!(store.fallbacks().count(), 1);
//! ```

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod records;
pub mod schema;
pub mod session;
pub mod sink;

pub use dispatch::{DecodeOutcome, DecodeWarning, SchemaTable};
pub use error::{DecodeError, Result};
pub use records::{DecodedRecord, RecordKey};
pub use session::{DecodeSession, Decoder, DecoderBuilder, SessionStats};
