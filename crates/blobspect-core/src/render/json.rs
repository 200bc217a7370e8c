//! Pretty-printed JSON output through `serde_json`.
//!
//! Records referenced more than once carry an `"@id"` member, and later
//! occurrences are written as `{"@ref": N}`. Member names that start with
//! `@` (record fields and string map keys) get one more `@` in front, so
//! `"@ref"` from the payload comes out as `"@@ref"` and never reads as a
//! reference.

use crate::error::{Error, Result};
use crate::value::{ObjectId, StructuredValue, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::borrow::Cow;
use std::collections::BTreeSet;

pub(super) fn render(value: &StructuredValue, indent: &str) -> Result<String> {
    let anchors = value.referenced();
    let root = Node {
        value: value.root(),
        doc: value,
        anchors: &anchors,
    };

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    root.serialize(&mut serializer).map_err(|e| Error::render("json", e.to_string()))?;
    buf.push(b'\n');

    String::from_utf8(buf).map_err(|e| Error::render("json", e.to_string()))
}

/// Serializable view of one value within its document
#[derive(Clone, Copy)]
struct Node<'a> {
    value: &'a Value,
    doc: &'a StructuredValue,
    anchors: &'a BTreeSet<ObjectId>,
}

impl<'a> Node<'a> {
    fn child(&self, value: &'a Value) -> Self {
        Node { value, ..*self }
    }
}

impl<'a> Serialize for Node<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I8(v) => serializer.serialize_i8(*v),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U8(v) => serializer.serialize_u8(*v),
            Value::U16(v) => serializer.serialize_u16(*v),
            Value::U32(v) => serializer.serialize_u32(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F32(v) if v.is_finite() => serializer.serialize_f32(*v),
            Value::F64(v) if v.is_finite() => serializer.serialize_f64(*v),
            Value::F32(v) => serializer.serialize_str(non_finite(f64::from(*v))),
            Value::F64(v) => serializer.serialize_str(non_finite(*v)),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    match key {
                        Value::String(name) => {
                            map.serialize_entry(&member_name(name), &self.child(value))?
                        }
                        _ => map.serialize_entry(&self.child(key), &self.child(value))?,
                    }
                }
                map.end()
            }
            Value::Enum { constant, .. } => serializer.serialize_str(constant),
            Value::Object(id) => {
                let record = self.doc.record(*id).ok_or_else(|| {
                    <S::Error as serde::ser::Error>::custom(format!("no record for {id}"))
                })?;
                let anchored = self.anchors.contains(id);
                let len = record.fields.len() + usize::from(anchored);

                let mut map = serializer.serialize_map(Some(len))?;
                if anchored {
                    map.serialize_entry("@id", &id.0)?;
                }
                for field in &record.fields {
                    map.serialize_entry(&member_name(&field.name), &self.child(&field.value))?;
                }
                map.end()
            }
            Value::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("@ref", &id.0)?;
                map.end()
            }
        }
    }
}

/// Escapes names that would collide with the `@id`/`@ref` members
fn member_name(name: &str) -> Cow<'_, str> {
    if name.starts_with('@') {
        Cow::Owned(format!("@{name}"))
    } else {
        Cow::Borrowed(name)
    }
}

fn non_finite(v: f64) -> &'static str {
    if v.is_nan() {
        "NaN"
    } else if v.is_sign_negative() {
        "-Infinity"
    } else {
        "Infinity"
    }
}
