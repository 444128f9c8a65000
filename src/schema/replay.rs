//! Generic schema replay.
//!
//! A [`RecordSchema`] is an ordered list of [`Field`] descriptors. Replaying it
//! drives the frame's cursor step by step and collects a [`FieldRecord`];
//! an optional projection then turns the generic record into a typed
//! [`DecodedRecord`].
//!
//! # Example
//!
//! ```
//! use sniffdb::protocol::{Direction, Frame, Provenance};
//! use sniffdb::schema::{Field, Presence, RecordSchema, Value};
//!
//! let schema = RecordSchema::new(
//!     "greeting",
//!     vec![
//!         Field::Bits("len", 8),
//!         Field::ResetBits,
//!         Field::text("text", "len"),
//!         Field::optional(Presence::U16Length, Field::CString("note")),
//!     ],
//! );
//!
//! let mut frame = Frame::from_parts(
//!     Provenance::new(1, Direction::ServerToClient, 0, 1),
//!     &[2, b'h', b'i', 0, 0],
//! );
//! let fields = schema.replay(&mut frame).unwrap();
//! assert_eq!(fields.text("text").unwrap(), "hi");
//! assert_eq!(fields.get("note"), Some(&Value::Text(String::new())));
//! ```

use std::collections::HashMap;

use super::field::{Condition, Field, FieldRecord, Name, Presence, Source, Value};
use crate::dispatch::{DecodeWarning, Routine};
use crate::error::{DecodeError, Result};
use crate::protocol::{Frame, PackedGuidCodec, PackedSlots};
use crate::records::DecodedRecord;

/// Turns a replayed record into a typed record.
pub type Projection = fn(FieldRecord) -> Result<DecodedRecord>;

/// Named list of field descriptors for one record kind.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    name: &'static str,
    fields: Vec<Field>,
    projection: Option<Projection>,
}

impl RecordSchema {
    /// Create a schema whose output is a generic `Fields` record.
    pub fn new(name: &'static str, fields: Vec<Field>) -> Self {
        Self {
            name,
            fields,
            projection: None,
        }
    }

    /// Attach a projection into a typed record.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Record kind name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Field descriptors.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Replay the descriptors against a frame positioned at its start.
    pub fn replay(&self, frame: &mut Frame) -> Result<FieldRecord> {
        self.replay_with_warnings(frame, &mut Vec::new())
    }

    /// Replay, appending warnings raised by nested dispatches to `warnings`.
    pub fn replay_with_warnings(
        &self,
        frame: &mut Frame,
        warnings: &mut Vec<DecodeWarning>,
    ) -> Result<FieldRecord> {
        let mut state = ReplayState::default();
        let mut out = FieldRecord::new();
        let result = replay_fields(&self.fields, frame, &mut state, &mut out, None, None);
        warnings.append(&mut state.warnings);
        result.map(|()| out)
    }
}

impl Routine for RecordSchema {
    fn decode(&self, frame: &mut Frame) -> Result<DecodedRecord> {
        self.decode_with_warnings(frame, &mut Vec::new())
    }

    fn decode_with_warnings(
        &self,
        frame: &mut Frame,
        warnings: &mut Vec<DecodeWarning>,
    ) -> Result<DecodedRecord> {
        let fields = self.replay_with_warnings(frame, warnings)?;
        match self.projection {
            Some(project) => project(fields),
            None => Ok(DecodedRecord::Fields {
                kind: self.name,
                fields,
            }),
        }
    }
}

/// Per-call scratch state: GUID slot arrays, pending blobs and warnings
/// from nested dispatches.
#[derive(Default)]
struct ReplayState {
    /// Keyed by (guid id, indices of every enclosing repeat).
    guids: HashMap<(u8, Vec<usize>), PackedSlots>,
    blobs: HashMap<Name, Frame>,
    /// Current iteration of each enclosing repeat, outermost first.
    path: Vec<usize>,
    warnings: Vec<DecodeWarning>,
}

impl ReplayState {
    fn slots(&mut self, guid: u8) -> &mut PackedSlots {
        self.guids.entry((guid, self.path.clone())).or_default()
    }

    fn take_blob(&mut self, name: Name) -> Result<Frame> {
        self.blobs.remove(name).ok_or_else(|| {
            DecodeError::Configuration(format!("Blob '{}' not read before use", name))
        })
    }
}

/// Read-only view of the records enclosing the one being built.
struct Scope<'a> {
    record: &'a FieldRecord,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, name: &str) -> Option<&'a Value> {
        match self.record.get(name) {
            Some(v) => Some(v),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }
}

fn resolve(source: Source, scope: &Scope<'_>, index: Option<usize>) -> Result<i64> {
    let value = match source {
        Source::Const(v) => return Ok(v as i64),
        Source::Field(name) => scope.lookup(name).ok_or_else(|| {
            DecodeError::Configuration(format!("Source field '{}' not decoded yet", name))
        })?,
        Source::Element { list, field } => {
            let i = index.ok_or_else(|| {
                DecodeError::Configuration(format!(
                    "Element source '{}.{}' used outside a repeat",
                    list, field
                ))
            })?;
            match scope.lookup(list) {
                Some(Value::List(items)) => items
                    .get(i)
                    .and_then(|item| item.get(field))
                    .ok_or_else(|| {
                        DecodeError::Configuration(format!(
                            "Element source '{}[{}].{}' missing",
                            list, i, field
                        ))
                    })?,
                _ => {
                    return Err(DecodeError::Configuration(format!(
                        "Element source list '{}' not decoded yet",
                        list
                    )))
                }
            }
        }
    };
    value.as_i64().ok_or_else(|| {
        DecodeError::Configuration(format!("Source {:?} is not numeric: {:?}", source, value))
    })
}

fn resolve_len(source: Source, scope: &Scope<'_>, index: Option<usize>) -> Result<usize> {
    let value = resolve(source, scope, index)?;
    usize::try_from(value).map_err(|_| {
        DecodeError::Configuration(format!("Negative length {} from {:?}", value, source))
    })
}

fn check(condition: Condition, scope: &Scope<'_>, index: Option<usize>) -> Result<bool> {
    Ok(match condition {
        Condition::Set(s) => resolve(s, scope, index)? != 0,
        Condition::Clear(s) => resolve(s, scope, index)? == 0,
        Condition::AtLeast(s, min) => resolve(s, scope, index)? >= min as i64,
        Condition::Equals(s, v) => resolve(s, scope, index)? == v,
        Condition::NonNegative(s) => resolve(s, scope, index)? >= 0,
    })
}

fn replay_fields(
    fields: &[Field],
    frame: &mut Frame,
    state: &mut ReplayState,
    out: &mut FieldRecord,
    parent: Option<&Scope<'_>>,
    index: Option<usize>,
) -> Result<()> {
    for field in fields {
        replay_field(field, frame, state, out, parent, index)?;
    }
    Ok(())
}

fn replay_field(
    field: &Field,
    frame: &mut Frame,
    state: &mut ReplayState,
    out: &mut FieldRecord,
    parent: Option<&Scope<'_>>,
    index: Option<usize>,
) -> Result<()> {
    match field {
        Field::Bit(name) => {
            let v = frame.cursor().read_bit()?;
            out.push(*name, Value::Bool(v));
        }
        Field::Bits(name, width) => {
            let v = frame.cursor().read_bits(*width)?;
            out.push(*name, Value::UInt(u64::from(v)));
        }
        Field::ResetBits => frame.cursor().reset_bit_reader(),
        Field::U8(name) => {
            let v = frame.cursor().read_u8()?;
            out.push(*name, Value::UInt(u64::from(v)));
        }
        Field::U16(name) => {
            let v = frame.cursor().read_u16()?;
            out.push(*name, Value::UInt(u64::from(v)));
        }
        Field::I32(name) => {
            let v = frame.cursor().read_i32()?;
            out.push(*name, Value::Int(i64::from(v)));
        }
        Field::U32(name) => {
            let v = frame.cursor().read_u32()?;
            out.push(*name, Value::UInt(u64::from(v)));
        }
        Field::F32(name) => {
            let v = frame.cursor().read_f32()?;
            out.push(*name, Value::Float(v));
        }
        Field::Entry { name, masked } => {
            let raw = frame.cursor().read_u32()?;
            out.push(*name, Value::UInt(u64::from(raw & 0x7FFF_FFFF)));
            out.push(*masked, Value::Bool(raw & 0x8000_0000 != 0));
        }
        Field::CString(name) => {
            let v = frame.cursor().read_cstring()?;
            out.push(*name, Value::Text(v));
        }
        Field::FixedText { name, len } => {
            let len = resolve_len(*len, &Scope { record: &*out, parent }, index)?;
            let v = frame.cursor().read_fixed_text(len)?;
            out.push(*name, Value::Text(v));
        }
        Field::GuidMask { guid, order } => {
            let slots = state.slots(*guid);
            PackedGuidCodec::decode_presence_mask(frame.cursor(), slots, order)?;
        }
        Field::GuidBytes { guid, order } => {
            let slots = state.slots(*guid);
            PackedGuidCodec::fill_present_bytes(frame.cursor(), slots, order)?;
        }
        Field::Guid { name, guid } => {
            let v = PackedGuidCodec::compose(state.slots(*guid))?;
            out.push(*name, Value::Guid(v));
        }
        Field::Repeat { name, count, body } => {
            let count = resolve_len(*count, &Scope { record: &*out, parent }, index)?;
            let mut items = Vec::with_capacity(count.min(256));
            for i in 0..count {
                let mut item = FieldRecord::new();
                let scope = Scope {
                    record: &*out,
                    parent,
                };
                state.path.push(i);
                let result = replay_fields(body, frame, state, &mut item, Some(&scope), Some(i));
                state.path.pop();
                result?;
                items.push(item);
            }
            out.push(*name, Value::List(items));
        }
        Field::When {
            condition,
            then,
            otherwise,
        } => {
            let taken = check(*condition, &Scope { record: &*out, parent }, index)?;
            let branch = if taken { then } else { otherwise };
            replay_fields(branch, frame, state, out, parent, index)?;
        }
        Field::Optional { presence, field } => {
            let present = match presence {
                Presence::Bit => frame.cursor().read_bit()?,
                Presence::U16Length => frame.cursor().read_u16()? > 0,
                Presence::When(condition) => {
                    check(*condition, &Scope { record: &*out, parent }, index)?
                }
            };
            if present {
                replay_field(field, frame, state, out, parent, index)?;
            } else {
                push_default(field, out);
            }
        }
        Field::Blob { name, len } => {
            let len = resolve_len(*len, &Scope { record: &*out, parent }, index)?;
            let blob = frame.slice(len)?;
            out.push(*name, Value::Bytes(blob.cursor_ref().buffer().clone()));
            state.blobs.insert(*name, blob);
        }
        Field::Within { name, blob, body } => {
            let mut sub = state.take_blob(*blob)?;
            let mut group = FieldRecord::new();
            let result = {
                let scope = Scope {
                    record: &*out,
                    parent,
                };
                replay_fields(body, &mut sub, state, &mut group, Some(&scope), index)
            };
            match result {
                Ok(()) => {
                    if !sub.at_end() {
                        tracing::warn!(
                            "Blob '{}' of {} has {} trailing bytes",
                            blob,
                            sub.provenance(),
                            sub.cursor_ref().remaining()
                        );
                    }
                    out.push(*name, Value::Group(group));
                }
                Err(e) if e.is_record_local() => {
                    tracing::warn!("Blob '{}' of {} abandoned: {}", blob, sub.provenance(), e);
                    out.push(*name, Value::Absent);
                }
                Err(e) => return Err(e),
            }
        }
        Field::DispatchBlob {
            name,
            blob,
            tag,
            table,
        } => {
            let raw = resolve(*tag, &Scope { record: &*out, parent }, index)?;
            let tag = u32::try_from(raw).map_err(|_| {
                DecodeError::Configuration(format!("Tag {} from {:?} is not a u32", raw, tag))
            })?;
            let mut sub = state.take_blob(*blob)?;
            match table.dispatch(tag, &mut sub) {
                Ok(outcome) => {
                    state.warnings.extend(outcome.warnings);
                    out.push(*name, Value::Record(Box::new(outcome.record)));
                }
                Err(e) if e.is_record_local() => {
                    tracing::warn!(
                        "Nested record 0x{:08X} of {} abandoned: {}",
                        tag,
                        sub.provenance(),
                        e
                    );
                    out.push(*name, Value::Absent);
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

fn push_default(field: &Field, out: &mut FieldRecord) {
    match field {
        Field::Entry { name, masked } => {
            out.push(*name, Value::UInt(0));
            out.push(*masked, Value::Bool(false));
        }
        other => {
            if let Some(name) = other.name() {
                out.push(name, other.default_value());
            }
        }
    }
}
