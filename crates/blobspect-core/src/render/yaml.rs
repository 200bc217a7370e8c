//! Block-style YAML output.
//!
//! Nodes are written after their prefix (`---`, `key:` or `-`) has already
//! been emitted, so every node starts with either a space and an inline
//! scalar, or a newline followed by its indented block.

use crate::value::{ObjectId, StructuredValue, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::BTreeSet;
use std::fmt::{self, Write};

/// Words a YAML reader would not load back as strings when unquoted.
///
/// Single-letter `y`/`n` are left plain; common loaders keep them strings.
const RESERVED: &[&str] = &["null", "~", "true", "false", "yes", "no", "on", "off"];

/// Characters that may not start a plain scalar
const INDICATORS: &str = "-?:,[]{}#&*!|>'\"%@`.+";

pub(super) fn render(value: &StructuredValue, indent: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let mut writer = YamlWriter {
        out: &mut out,
        doc: value,
        anchors: value.referenced(),
        indent,
    };
    writer.write_document()?;
    Ok(out)
}

struct YamlWriter<'a> {
    out: &'a mut String,
    doc: &'a StructuredValue,
    /// Records that need an anchor at their first occurrence
    anchors: BTreeSet<ObjectId>,
    indent: &'a str,
}

impl YamlWriter<'_> {
    fn write_document(&mut self) -> fmt::Result {
        let doc = self.doc;
        self.out.push_str("---");
        self.write_node(doc.root(), 0)
    }

    fn write_indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(self.indent);
        }
    }

    /// Writes `value`; block children go at `level`
    fn write_node(&mut self, value: &Value, level: usize) -> fmt::Result {
        let doc = self.doc;
        match value {
            Value::Object(id) => {
                let record = doc.record(*id).ok_or(fmt::Error)?;
                if self.anchors.contains(id) {
                    write!(self.out, " &{}", id)?;
                }
                if record.fields.is_empty() {
                    self.out.push_str(" {}\n");
                    return Ok(());
                }
                self.out.push('\n');
                for field in &record.fields {
                    self.write_indent(level);
                    self.write_str(&field.name);
                    self.out.push(':');
                    self.write_node(&field.value, level + 1)?;
                }
            }
            Value::Ref(id) => writeln!(self.out, " *{}", id)?,
            Value::List(items) if items.is_empty() => self.out.push_str(" []\n"),
            Value::List(items) => {
                self.out.push('\n');
                for item in items {
                    self.write_indent(level);
                    self.out.push('-');
                    self.write_node(item, level + 1)?;
                }
            }
            Value::Map(entries) if entries.is_empty() => self.out.push_str(" {}\n"),
            Value::Map(entries) if entries.iter().all(|(key, _)| is_scalar_key(key)) => {
                self.out.push('\n');
                for (key, value) in entries {
                    self.write_indent(level);
                    self.write_scalar(key)?;
                    self.out.push(':');
                    self.write_node(value, level + 1)?;
                }
            }
            Value::Map(entries) => {
                // Composite keys become a sequence of key/value entries
                self.out.push('\n');
                for (key, value) in entries {
                    self.write_indent(level);
                    self.out.push_str("-\n");
                    self.write_indent(level + 1);
                    self.out.push_str("key:");
                    self.write_node(key, level + 2)?;
                    self.write_indent(level + 1);
                    self.out.push_str("value:");
                    self.write_node(value, level + 2)?;
                }
            }
            scalar => {
                self.out.push(' ');
                self.write_scalar(scalar)?;
                self.out.push('\n');
            }
        }
        Ok(())
    }

    fn write_scalar(&mut self, value: &Value) -> fmt::Result {
        match value {
            Value::Null => self.out.push_str("null"),
            Value::Bool(v) => write!(self.out, "{}", v)?,
            Value::I8(v) => write!(self.out, "{}", v)?,
            Value::I16(v) => write!(self.out, "{}", v)?,
            Value::I32(v) => write!(self.out, "{}", v)?,
            Value::I64(v) => write!(self.out, "{}", v)?,
            Value::U8(v) => write!(self.out, "{}", v)?,
            Value::U16(v) => write!(self.out, "{}", v)?,
            Value::U32(v) => write!(self.out, "{}", v)?,
            Value::U64(v) => write!(self.out, "{}", v)?,
            Value::F32(v) if v.is_finite() => write!(self.out, "{:?}", v)?,
            Value::F64(v) if v.is_finite() => write!(self.out, "{:?}", v)?,
            Value::F32(v) => self.out.push_str(non_finite(f64::from(*v))),
            Value::F64(v) => self.out.push_str(non_finite(*v)),
            Value::Char(c) => self.write_str(c.encode_utf8(&mut [0; 4])),
            Value::String(s) => self.write_str(s),
            Value::Bytes(bytes) if bytes.is_empty() => self.out.push_str("!!binary \"\""),
            Value::Bytes(bytes) => {
                self.out.push_str("!!binary ");
                self.out.push_str(&STANDARD.encode(bytes));
            }
            Value::Enum { constant, .. } => self.write_str(constant),
            Value::List(_) | Value::Map(_) | Value::Object(_) | Value::Ref(_) => {
                return Err(fmt::Error)
            }
        }
        Ok(())
    }

    fn write_str(&mut self, s: &str) {
        if is_plain(s) {
            self.out.push_str(s);
        } else {
            write_quoted(self.out, s);
        }
    }
}

fn non_finite(v: f64) -> &'static str {
    if v.is_nan() {
        ".nan"
    } else if v.is_sign_negative() {
        "-.inf"
    } else {
        ".inf"
    }
}

fn is_scalar_key(value: &Value) -> bool {
    !matches!(
        value,
        Value::Bytes(_) | Value::List(_) | Value::Map(_) | Value::Object(_) | Value::Ref(_)
    )
}

/// Returns true if `s` reads back as the same string without quotes
fn is_plain(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };
    if first.is_whitespace() || s.ends_with(char::is_whitespace) {
        return false;
    }
    if INDICATORS.contains(first) || first.is_ascii_digit() {
        return false;
    }
    if s.ends_with(':') || s.contains(": ") || s.contains(" #") {
        return false;
    }
    if s.chars().any(needs_escape) {
        return false;
    }
    !RESERVED.iter().any(|word| word.eq_ignore_ascii_case(s))
}

fn needs_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}')
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if needs_escape(c) => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::basic_value;
    use crate::value::{Field, ObjectArena, Record};
    use pretty_assertions::assert_eq;

    fn yaml(value: &StructuredValue) -> String {
        render(value, "  ").unwrap()
    }

    fn list(items: Vec<Value>) -> StructuredValue {
        StructuredValue::new("list", Value::List(items), ObjectArena::new())
    }

    fn record_value(fields: Vec<(&str, Value)>) -> StructuredValue {
        let mut objects = ObjectArena::new();
        let id = objects.push(Record {
            type_name: "a.Record".to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| Field {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        });
        StructuredValue::new("a.Record", Value::Object(id), objects)
    }

    #[test]
    fn test_basic_record() {
        assert_eq!(yaml(&basic_value()), "---\nname: a\nvalue: 1\n");
    }

    #[test]
    fn test_cycle_uses_anchor_and_alias() {
        let mut objects = ObjectArena::new();
        let id = objects.push(Record {
            type_name: "example.Node".to_string(),
            fields: vec![
                Field {
                    name: "label".to_string(),
                    value: Value::String("n".to_string()),
                },
                Field {
                    name: "next".to_string(),
                    value: Value::Ref(ObjectId(0)),
                },
            ],
        });
        let value = StructuredValue::new("example.Node", Value::Object(id), objects);

        assert_eq!(yaml(&value), "--- &obj0\nlabel: n\nnext: *obj0\n");
    }

    #[test]
    fn test_shared_object_in_list() {
        let mut objects = ObjectArena::new();
        let id = objects.push(Record {
            type_name: "a.Leaf".to_string(),
            fields: vec![Field {
                name: "n".to_string(),
                value: Value::U8(7),
            }],
        });
        let value = StructuredValue::new(
            "list<a.Leaf>",
            Value::List(vec![Value::Object(id), Value::Ref(id), Value::Null]),
            objects,
        );

        assert_eq!(yaml(&value), "---\n- &obj0\n  n: 7\n- *obj0\n- null\n");
    }

    #[test]
    fn test_string_quoting() {
        let strings = [
            "",
            "true",
            "Off",
            "a: b",
            "123",
            "line\nbreak",
            "-x",
            "plain text",
            "naïve",
            "n",
        ];
        let value = list(strings.iter().map(|s| Value::String(s.to_string())).collect());

        assert_eq!(
            yaml(&value),
            "---\n\
             - \"\"\n\
             - \"true\"\n\
             - \"Off\"\n\
             - \"a: b\"\n\
             - \"123\"\n\
             - \"line\\nbreak\"\n\
             - \"-x\"\n\
             - plain text\n\
             - naïve\n\
             - n\n"
        );
    }

    #[test]
    fn test_scalars() {
        let value = record_value(vec![
            ("raw", Value::Bytes(vec![1, 2, 3])),
            ("none", Value::Bytes(vec![])),
            ("nan", Value::F64(f64::NAN)),
            ("low", Value::F32(f32::NEG_INFINITY)),
            ("half", Value::F32(0.5)),
            ("whole", Value::F64(2.0)),
            ("c", Value::Char('x')),
            (
                "color",
                Value::Enum {
                    type_name: "a.Color".to_string(),
                    constant: "GREEN".to_string(),
                },
            ),
            ("missing", Value::Null),
            ("items", Value::List(vec![])),
            ("dict", Value::Map(vec![])),
        ]);

        assert_eq!(
            yaml(&value),
            "---\n\
             raw: !!binary AQID\n\
             none: !!binary \"\"\n\
             nan: .nan\n\
             low: -.inf\n\
             half: 0.5\n\
             whole: 2.0\n\
             c: x\n\
             color: GREEN\n\
             missing: null\n\
             items: []\n\
             dict: {}\n"
        );
    }

    #[test]
    fn test_scalar_keyed_map() {
        let value = StructuredValue::new(
            "map",
            Value::Map(vec![
                (Value::String("a".to_string()), Value::U8(1)),
                (Value::I32(-3), Value::Bool(true)),
            ]),
            ObjectArena::new(),
        );
        assert_eq!(yaml(&value), "---\na: 1\n-3: true\n");
    }

    #[test]
    fn test_composite_keyed_map() {
        let value = StructuredValue::new(
            "map<list<u8>, string>",
            Value::Map(vec![(
                Value::List(vec![Value::U8(1)]),
                Value::String("v".to_string()),
            )]),
            ObjectArena::new(),
        );
        assert_eq!(yaml(&value), "---\n-\n  key:\n    - 1\n  value: v\n");
    }

    #[test]
    fn test_empty_record() {
        assert_eq!(yaml(&record_value(vec![])), "--- {}\n");
    }

    #[test]
    fn test_field_names_are_quoted_when_needed() {
        let value = record_value(vec![("null", Value::U8(0))]);
        assert_eq!(yaml(&value), "---\n\"null\": 0\n");
    }
}
