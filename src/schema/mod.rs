//! Schema module - record layouts as data.
//!
//! Each record kind is an ordered list of typed field descriptors. One generic
//! replay routine interprets any list, so protocol knowledge lives in data
//! (see [`crate::catalog`]) and the engine stays small:
//! - [`Field`] - one step: a bit/aligned read, a GUID phase, a branch, a nested blob
//! - [`RecordSchema`] - name + fields + optional typed projection
//! - [`FieldRecord`] / [`Value`] - generic decode output

mod field;
mod replay;

pub use field::{Condition, Field, FieldRecord, Name, Presence, Source, Value};
pub use replay::{Projection, RecordSchema};
