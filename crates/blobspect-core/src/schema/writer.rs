//! Extensible schema walking.
//!
//! This module provides the [`SchemaVisitor`] trait for customizing what
//! happens to each schema element. Printing the schema and counting its
//! elements are both visitors.

use super::{DescriptorId, FieldDescriptor, Schema};
use std::fmt::{Result, Write};

/// Trait for visiting schema elements in table order.
///
/// Every method has a no-op default, so implementors only override the
/// elements they care about.
///
/// # Example
///
/// ```
/// use blobspect_core::schema::{DescriptorId, Schema, SchemaVisitor, TypeRef};
///
/// struct Names(Vec<String>);
///
/// impl SchemaVisitor for Names {
///     fn visit_record(&mut self, _id: DescriptorId, name: &str) -> std::fmt::Result {
///         self.0.push(name.to_string());
///         Ok(())
///     }
/// }
///
/// let schema = Schema::new(TypeRef::Bool, vec![]);
/// let mut names = Names(vec![]);
/// schema.walk(&mut names).unwrap();
/// assert!(names.0.is_empty());
/// ```
pub trait SchemaVisitor {
    /// Visit the schema as a whole, before any descriptor
    fn visit_schema(&mut self, schema: &Schema) -> Result {
        let _ = schema;
        Ok(())
    }

    /// Start of a record descriptor
    fn visit_record(&mut self, id: DescriptorId, name: &str) -> Result {
        let _ = (id, name);
        Ok(())
    }

    /// A field of the current record
    fn visit_field(&mut self, index: usize, field: &FieldDescriptor) -> Result {
        let _ = (index, field);
        Ok(())
    }

    /// End of the current record
    fn end_record(&mut self) -> Result {
        Ok(())
    }

    /// Start of an enum descriptor
    fn visit_enum(&mut self, id: DescriptorId, name: &str) -> Result {
        let _ = (id, name);
        Ok(())
    }

    /// A constant of the current enum
    fn visit_constant(&mut self, ordinal: usize, name: &str) -> Result {
        let _ = (ordinal, name);
        Ok(())
    }

    /// End of the current enum
    fn end_enum(&mut self) -> Result {
        Ok(())
    }
}

/// A visitor that collects statistics about the schema
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStats {
    /// Number of record descriptors
    pub record_count: usize,
    /// Number of record fields across all records
    pub field_count: usize,
    /// Number of enum descriptors
    pub enum_count: usize,
    /// Number of enum constants across all enums
    pub constant_count: usize,
}

impl SchemaVisitor for SchemaStats {
    fn visit_record(&mut self, _id: DescriptorId, _name: &str) -> Result {
        self.record_count += 1;
        Ok(())
    }

    fn visit_field(&mut self, _index: usize, _field: &FieldDescriptor) -> Result {
        self.field_count += 1;
        Ok(())
    }

    fn visit_enum(&mut self, _id: DescriptorId, _name: &str) -> Result {
        self.enum_count += 1;
        Ok(())
    }

    fn visit_constant(&mut self, _ordinal: usize, _name: &str) -> Result {
        self.constant_count += 1;
        Ok(())
    }
}

/// Writes the schema in its textual form
pub(super) struct TextWriter<'a, W: Write> {
    writer: &'a mut W,
    schema: &'a Schema,
    indent_str: &'static str,
}

impl<'a, W: Write> TextWriter<'a, W> {
    pub(super) fn new(writer: &'a mut W, schema: &'a Schema) -> Self {
        Self {
            writer,
            schema,
            indent_str: "  ",
        }
    }
}

impl<W: Write> SchemaVisitor for TextWriter<'_, W> {
    fn visit_schema(&mut self, schema: &Schema) -> Result {
        writeln!(
            self.writer,
            "root {};",
            schema.type_name(schema.root()).escape_debug()
        )
    }

    fn visit_record(&mut self, _id: DescriptorId, name: &str) -> Result {
        writeln!(self.writer)?;
        writeln!(self.writer, "record {} {{", name.escape_debug())
    }

    fn visit_field(&mut self, index: usize, field: &FieldDescriptor) -> Result {
        writeln!(
            self.writer,
            "{}{} {} = {};",
            self.indent_str,
            self.schema.type_name(&field.ty).escape_debug(),
            field.name.escape_debug(),
            index
        )
    }

    fn end_record(&mut self) -> Result {
        writeln!(self.writer, "}}")
    }

    fn visit_enum(&mut self, _id: DescriptorId, name: &str) -> Result {
        writeln!(self.writer)?;
        writeln!(self.writer, "enum {} {{", name.escape_debug())
    }

    fn visit_constant(&mut self, ordinal: usize, name: &str) -> Result {
        writeln!(
            self.writer,
            "{}{} = {};",
            self.indent_str,
            name.escape_debug(),
            ordinal
        )
    }

    fn end_enum(&mut self) -> Result {
        writeln!(self.writer, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Descriptor, TypeRef};

    #[test]
    fn test_stats_visitor() {
        let schema = Schema::new(
            TypeRef::Named(DescriptorId(0)),
            vec![
                Descriptor::Record {
                    name: "a.Pair".to_string(),
                    fields: vec![
                        FieldDescriptor {
                            name: "left".to_string(),
                            ty: TypeRef::I8,
                        },
                        FieldDescriptor {
                            name: "right".to_string(),
                            ty: TypeRef::I8,
                        },
                    ],
                },
                Descriptor::Enum {
                    name: "a.Side".to_string(),
                    constants: vec!["L".to_string(), "R".to_string(), "C".to_string()],
                },
            ],
        );

        let mut stats = SchemaStats::default();
        schema.walk(&mut stats).unwrap();

        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.field_count, 2);
        assert_eq!(stats.enum_count, 1);
        assert_eq!(stats.constant_count, 3);
    }

    #[test]
    fn test_names_are_escaped() {
        let schema = Schema::new(
            TypeRef::Named(DescriptorId(0)),
            vec![Descriptor::Enum {
                name: "bad\nname".to_string(),
                constants: vec![],
            }],
        );
        let text = schema.to_string();
        assert!(text.contains("enum bad\\nname {"), "{text}");
    }
}
