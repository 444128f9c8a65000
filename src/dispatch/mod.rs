//! Dispatch module - tag to routine mapping.
//!
//! Provides:
//! - [`SchemaTable`] - maps record tags to routines, shared read-only
//! - [`Routine`] - anything that decodes a frame into a record
//! - [`generic_fallback`] - listing for tags without a routine

mod fallback;
mod table;

pub use fallback::{generic_fallback, FallbackEntry, FallbackListing};
pub use table::{DecodeOutcome, DecodeWarning, Routine, SchemaTable};
