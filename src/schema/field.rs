//! Field descriptors, decoded values and field records.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::dispatch::SchemaTable;
use crate::error::{DecodeError, Result};
use crate::records::DecodedRecord;

/// Field names are static schema data.
pub type Name = &'static str;

/// Where a count, length or tag comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fixed value.
    Const(u64),
    /// Earlier field, searched from the innermost scope outwards.
    Field(Name),
    /// Field of an earlier list's element at the current repeat index.
    Element {
        /// List field name.
        list: Name,
        /// Field inside the element.
        field: Name,
    },
}

/// Predicate over earlier fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Value is non-zero / true.
    Set(Source),
    /// Value is zero / false.
    Clear(Source),
    /// Value >= threshold.
    AtLeast(Source, u64),
    /// Value == constant.
    Equals(Source, i64),
    /// Signed value >= 0.
    NonNegative(Source),
}

/// Presence indicator in front of an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Inline bit; 1 means present.
    Bit,
    /// Inline aligned u16 length; > 0 means present.
    U16Length,
    /// No inline indicator; decided by earlier fields.
    When(Condition),
}

/// One step of a record schema.
#[derive(Debug, Clone)]
pub enum Field {
    /// Single bit, stored as `Bool`.
    Bit(Name),
    /// Unsigned bit field of the given width (<= 32).
    Bits(Name, u32),
    /// Drop queued bits before the aligned part of the record.
    ResetBits,
    /// Aligned u8.
    U8(Name),
    /// Aligned u16.
    U16(Name),
    /// Aligned i32.
    I32(Name),
    /// Aligned u32.
    U32(Name),
    /// Aligned f32.
    F32(Name),
    /// u32 entry id whose top bit flags a masked entry.
    Entry {
        /// Field receiving the id (top bit cleared).
        name: Name,
        /// Field receiving the masked flag.
        masked: Name,
    },
    /// Zero-terminated text.
    CString(Name),
    /// Text of a length read earlier.
    FixedText {
        /// Field name.
        name: Name,
        /// Length in bytes.
        len: Source,
    },
    /// Presence-mask phase of a packed GUID.
    GuidMask {
        /// GUID id within the record.
        guid: u8,
        /// Slot order.
        order: &'static [u8],
    },
    /// Byte-fill phase of a packed GUID.
    GuidBytes {
        /// GUID id within the record.
        guid: u8,
        /// Slot order.
        order: &'static [u8],
    },
    /// Compose a packed GUID and store it.
    Guid {
        /// Field name.
        name: Name,
        /// GUID id within the record.
        guid: u8,
    },
    /// Repeated group, stored as `List`.
    Repeat {
        /// Field name.
        name: Name,
        /// Number of iterations.
        count: Source,
        /// Fields of one element.
        body: Vec<Field>,
    },
    /// Branch; fields land in the enclosing record.
    When {
        /// Branch condition.
        condition: Condition,
        /// Fields when the condition holds.
        then: Vec<Field>,
        /// Fields otherwise.
        otherwise: Vec<Field>,
    },
    /// Field behind a presence indicator; absent fields take their default.
    Optional {
        /// Presence indicator.
        presence: Presence,
        /// The guarded field (scalar).
        field: Box<Field>,
    },
    /// Length-prefixed embedded block, carved into a sub-frame and kept.
    Blob {
        /// Field name; the sub-frame is stored under this name.
        name: Name,
        /// Length in bytes.
        len: Source,
    },
    /// Decode a stored blob with an inline body, stored as `Group`.
    Within {
        /// Field name.
        name: Name,
        /// Blob to decode.
        blob: Name,
        /// Fields of the blob.
        body: Vec<Field>,
    },
    /// Decode a stored blob through another table, stored as `Record`.
    DispatchBlob {
        /// Field name.
        name: Name,
        /// Blob to decode.
        blob: Name,
        /// Tag selecting the blob's routine.
        tag: Source,
        /// Table of blob routines.
        table: Arc<SchemaTable>,
    },
}

impl Field {
    /// Guard a field with a presence indicator.
    pub fn optional(presence: Presence, field: Field) -> Self {
        Self::Optional {
            presence,
            field: Box::new(field),
        }
    }

    /// Branch without an `otherwise` part.
    pub fn when(condition: Condition, then: Vec<Field>) -> Self {
        Self::When {
            condition,
            then,
            otherwise: Vec::new(),
        }
    }

    /// Text of a length stored in an earlier field.
    pub fn text(name: Name, len_field: Name) -> Self {
        Self::FixedText {
            name,
            len: Source::Field(len_field),
        }
    }

    /// Value a field takes when its presence indicator says absent.
    ///
    /// Text defaults to empty, numbers to zero, flags to false; references
    /// and structured fields are `Absent`.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Bit(_) => Value::Bool(false),
            Self::Bits(..) | Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::Entry { .. } => {
                Value::UInt(0)
            }
            Self::I32(_) => Value::Int(0),
            Self::F32(_) => Value::Float(0.0),
            Self::CString(_) | Self::FixedText { .. } => Value::Text(String::new()),
            _ => Value::Absent,
        }
    }

    /// Name the field is stored under, if it stores anything.
    pub fn name(&self) -> Option<Name> {
        match self {
            Self::Bit(n)
            | Self::Bits(n, _)
            | Self::U8(n)
            | Self::U16(n)
            | Self::I32(n)
            | Self::U32(n)
            | Self::F32(n)
            | Self::CString(n) => Some(*n),
            Self::Entry { name, .. }
            | Self::FixedText { name, .. }
            | Self::Guid { name, .. }
            | Self::Repeat { name, .. }
            | Self::Blob { name, .. }
            | Self::Within { name, .. }
            | Self::DispatchBlob { name, .. } => Some(*name),
            Self::Optional { field, .. } => field.name(),
            Self::ResetBits | Self::GuidMask { .. } | Self::GuidBytes { .. } | Self::When { .. } => {
                None
            }
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Bit flag.
    Bool(bool),
    /// Unsigned integer (bit fields, u8-u32, entries).
    UInt(u64),
    /// Signed integer.
    Int(i64),
    /// Float.
    Float(f32),
    /// Text.
    Text(String),
    /// Composed packed GUID.
    Guid(u64),
    /// Raw embedded block.
    Bytes(Bytes),
    /// Decoded embedded block.
    Group(FieldRecord),
    /// Repeated groups.
    List(Vec<FieldRecord>),
    /// Record decoded through a nested table.
    Record(Box<DecodedRecord>),
    /// Absent reference.
    Absent,
}

impl Value {
    /// Numeric view used by sources and conditions.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::UInt(v) | Self::Guid(v) => Some(*v as i64),
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Ordered `(name, value)` pairs produced by replaying a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRecord {
    fields: Vec<(Name, Value)>,
}

impl FieldRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn push(&mut self, name: Name, value: Value) {
        self.fields.push((name, value));
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in decode order.
    pub fn iter(&self) -> impl Iterator<Item = &(Name, Value)> {
        self.fields.iter()
    }

    /// Last value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Check if a field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn require(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| DecodeError::Configuration(format!("Field '{}' missing", name)))
    }

    fn mismatch(name: &str, expected: &str, found: &Value) -> DecodeError {
        DecodeError::Configuration(format!(
            "Field '{}' is not {}: {:?}",
            name, expected, found
        ))
    }

    /// Flag value.
    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(Self::mismatch(name, "a flag", other)),
        }
    }

    /// Unsigned value truncated to u32.
    pub fn u32(&self, name: &str) -> Result<u32> {
        match self.require(name)? {
            Value::UInt(v) => Ok(*v as u32),
            other => Err(Self::mismatch(name, "unsigned", other)),
        }
    }

    /// Signed value.
    pub fn i32(&self, name: &str) -> Result<i32> {
        match self.require(name)? {
            Value::Int(v) => Ok(*v as i32),
            other => Err(Self::mismatch(name, "signed", other)),
        }
    }

    /// Float value.
    pub fn f32(&self, name: &str) -> Result<f32> {
        match self.require(name)? {
            Value::Float(v) => Ok(*v),
            other => Err(Self::mismatch(name, "a float", other)),
        }
    }

    /// Text value.
    pub fn text(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            Value::Text(s) => Ok(s),
            other => Err(Self::mismatch(name, "text", other)),
        }
    }

    /// Composed GUID.
    pub fn guid(&self, name: &str) -> Result<u64> {
        match self.require(name)? {
            Value::Guid(v) => Ok(*v),
            other => Err(Self::mismatch(name, "a GUID", other)),
        }
    }

    /// Repeated groups.
    pub fn list(&self, name: &str) -> Result<&[FieldRecord]> {
        match self.require(name)? {
            Value::List(items) => Ok(items),
            other => Err(Self::mismatch(name, "a list", other)),
        }
    }

    /// Decoded inline blob, `None` when absent.
    pub fn group(&self, name: &str) -> Result<Option<&FieldRecord>> {
        match self.require(name)? {
            Value::Group(g) => Ok(Some(g)),
            Value::Absent => Ok(None),
            other => Err(Self::mismatch(name, "a group", other)),
        }
    }

    /// Nested record, `None` when absent.
    pub fn record(&self, name: &str) -> Result<Option<&DecodedRecord>> {
        match self.require(name)? {
            Value::Record(r) => Ok(Some(r)),
            Value::Absent => Ok(None),
            other => Err(Self::mismatch(name, "a record", other)),
        }
    }

    /// Collect one u32 field from each element of a list.
    pub fn list_u32(&self, list: &str, field: &str) -> Result<Vec<u32>> {
        self.list(list)?.iter().map(|g| g.u32(field)).collect()
    }
}

impl Serialize for FieldRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl fmt::Display for FieldRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", name, value)?;
        }
        Ok(())
    }
}
