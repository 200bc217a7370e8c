//! Embedded type schema.
//!
//! A blob carries a [`Schema`] describing every type its payload uses: a
//! root [`TypeRef`] plus a table of named [`Descriptor`]s (records and
//! enums). Named references are indices into that table and may point
//! forward, which is how self-referential records are described.
//!
//! The schema is parsed by the envelope extractor and can be printed on its
//! own through its [`Display`](std::fmt::Display) implementation without
//! decoding any payload. Whether every reference resolves is only checked
//! by [`Schema::validate`], which the decoder runs before reading values.
//!
//! ## Encoding
//!
//! ```text
//! schema     = root:type count:varint descriptor*
//! descriptor = 0x01 name:str count:varint (name:str type)*   ; record
//!            | 0x02 name:str count:varint name:str*          ; enum
//! type       = 0x01..0x0E                                    ; primitives
//!            | 0x10 type | 0x11 type type | 0x12 type        ; list, map, optional
//!            | 0x20 index:varint                             ; named
//!            | 0x21                                          ; any
//! ```
//!
//! Primitive tags in order: bool, i8, i16, i32, i64, u8, u16, u32, u64,
//! f32, f64, char, string, bytes.

mod writer;

use crate::error::{DecodeCause, Error, Result};
use crate::wire::{Reader, WireError, WireResult};
use std::fmt;

pub use writer::{SchemaStats, SchemaVisitor};

/// Maximum nesting of composite type references inside a schema
pub const MAX_TYPE_NESTING: usize = 64;

/// Type tags of the wire format
pub(crate) mod tag {
    pub(crate) const BOOL: u8 = 0x01;
    pub(crate) const I8: u8 = 0x02;
    pub(crate) const I16: u8 = 0x03;
    pub(crate) const I32: u8 = 0x04;
    pub(crate) const I64: u8 = 0x05;
    pub(crate) const U8: u8 = 0x06;
    pub(crate) const U16: u8 = 0x07;
    pub(crate) const U32: u8 = 0x08;
    pub(crate) const U64: u8 = 0x09;
    pub(crate) const F32: u8 = 0x0A;
    pub(crate) const F64: u8 = 0x0B;
    pub(crate) const CHAR: u8 = 0x0C;
    pub(crate) const STRING: u8 = 0x0D;
    pub(crate) const BYTES: u8 = 0x0E;
    pub(crate) const LIST: u8 = 0x10;
    pub(crate) const MAP: u8 = 0x11;
    pub(crate) const OPTIONAL: u8 = 0x12;
    pub(crate) const NAMED: u8 = 0x20;
    pub(crate) const ANY: u8 = 0x21;

    pub(crate) const RECORD_DESCRIPTOR: u8 = 0x01;
    pub(crate) const ENUM_DESCRIPTOR: u8 = 0x02;
}

/// Index of a descriptor in the schema's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorId(pub u64);

impl DescriptorId {
    /// Returns the index as a `usize`, if it fits
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declared type of a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// `true` / `false`
    Bool,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Unicode scalar value
    Char,
    /// UTF-8 string
    String,
    /// Opaque byte array
    Bytes,
    /// Ordered sequence of one element type
    List(Box<TypeRef>),
    /// Ordered key/value pairs
    Map(Box<TypeRef>, Box<TypeRef>),
    /// Value that may be absent
    Optional(Box<TypeRef>),
    /// Record or enum from the descriptor table
    Named(DescriptorId),
    /// Type given inline in the payload
    Any,
}

impl TypeRef {
    /// Reads a type reference, nesting at most [`MAX_TYPE_NESTING`] levels
    pub(crate) fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        Self::read_nested(reader, 0)
    }

    fn read_nested(reader: &mut Reader<'_>, depth: usize) -> WireResult<Self> {
        if depth >= MAX_TYPE_NESTING {
            return Err(reader.error(DecodeCause::DepthExceeded {
                limit: MAX_TYPE_NESTING,
            }));
        }

        let start = reader.offset();
        let ty = match reader.read_u8()? {
            tag::BOOL => TypeRef::Bool,
            tag::I8 => TypeRef::I8,
            tag::I16 => TypeRef::I16,
            tag::I32 => TypeRef::I32,
            tag::I64 => TypeRef::I64,
            tag::U8 => TypeRef::U8,
            tag::U16 => TypeRef::U16,
            tag::U32 => TypeRef::U32,
            tag::U64 => TypeRef::U64,
            tag::F32 => TypeRef::F32,
            tag::F64 => TypeRef::F64,
            tag::CHAR => TypeRef::Char,
            tag::STRING => TypeRef::String,
            tag::BYTES => TypeRef::Bytes,
            tag::LIST => TypeRef::List(Box::new(Self::read_nested(reader, depth + 1)?)),
            tag::MAP => {
                let key = Self::read_nested(reader, depth + 1)?;
                let value = Self::read_nested(reader, depth + 1)?;
                TypeRef::Map(Box::new(key), Box::new(value))
            }
            tag::OPTIONAL => TypeRef::Optional(Box::new(Self::read_nested(reader, depth + 1)?)),
            tag::NAMED => TypeRef::Named(DescriptorId(reader.read_varint()?)),
            tag::ANY => TypeRef::Any,
            other => {
                return Err(WireError {
                    offset: start,
                    cause: DecodeCause::UnknownTypeTag { tag: other },
                })
            }
        };
        Ok(ty)
    }

    /// Spelling of primitive types; `None` for composite and named types
    pub fn primitive_name(&self) -> Option<&'static str> {
        let name = match self {
            TypeRef::Bool => "bool",
            TypeRef::I8 => "i8",
            TypeRef::I16 => "i16",
            TypeRef::I32 => "i32",
            TypeRef::I64 => "i64",
            TypeRef::U8 => "u8",
            TypeRef::U16 => "u16",
            TypeRef::U32 => "u32",
            TypeRef::U64 => "u64",
            TypeRef::F32 => "f32",
            TypeRef::F64 => "f64",
            TypeRef::Char => "char",
            TypeRef::String => "string",
            TypeRef::Bytes => "bytes",
            TypeRef::Any => "any",
            TypeRef::List(_) | TypeRef::Map(..) | TypeRef::Optional(_) | TypeRef::Named(_) => {
                return None
            }
        };
        Some(name)
    }

    fn for_each_named(&self, f: &mut dyn FnMut(DescriptorId) -> bool) -> bool {
        match self {
            TypeRef::Named(id) => f(*id),
            TypeRef::List(inner) | TypeRef::Optional(inner) => inner.for_each_named(f),
            TypeRef::Map(key, value) => key.for_each_named(f) && value.for_each_named(f),
            _ => true,
        }
    }
}

/// A field of a record descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
}

/// A named type in the schema's descriptor table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// Composite type with ordered, named fields
    Record {
        /// Type name
        name: String,
        /// Fields in payload order
        fields: Vec<FieldDescriptor>,
    },
    /// Enumeration; payload values are ordinals into `constants`
    Enum {
        /// Type name
        name: String,
        /// Constant names in ordinal order
        constants: Vec<String>,
    },
}

impl Descriptor {
    /// Returns the descriptor's type name
    pub fn name(&self) -> &str {
        match self {
            Descriptor::Record { name, .. } | Descriptor::Enum { name, .. } => name,
        }
    }

    fn read(reader: &mut Reader<'_>) -> WireResult<Self> {
        let start = reader.offset();
        match reader.read_u8()? {
            tag::RECORD_DESCRIPTOR => {
                let name = reader.read_str()?.to_string();
                let count = reader.read_count()?;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = reader.read_str()?.to_string();
                    let ty = TypeRef::read(reader)?;
                    fields.push(FieldDescriptor { name, ty });
                }
                Ok(Descriptor::Record { name, fields })
            }
            tag::ENUM_DESCRIPTOR => {
                let name = reader.read_str()?.to_string();
                let count = reader.read_count()?;
                let mut constants = Vec::with_capacity(count);
                for _ in 0..count {
                    constants.push(reader.read_str()?.to_string());
                }
                Ok(Descriptor::Enum { name, constants })
            }
            other => Err(WireError {
                offset: start,
                cause: DecodeCause::InvalidMarker {
                    type_name: "descriptor".to_string(),
                    marker: other,
                },
            }),
        }
    }
}

/// Hierarchical description of every type a payload uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    root: TypeRef,
    descriptors: Vec<Descriptor>,
}

impl Schema {
    /// Creates a schema from its parts
    pub fn new(root: TypeRef, descriptors: Vec<Descriptor>) -> Self {
        Self { root, descriptors }
    }

    /// Parses a schema region; it must be consumed exactly.
    ///
    /// Errors are reported as [`Error::MalformedEnvelope`] with offsets
    /// relative to `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        Self::read_exact(&mut reader).map_err(malformed)
    }

    /// Parses a schema that must span everything left in `reader`.
    ///
    /// Error offsets include the reader's base, so a reader created with
    /// `Reader::with_base` reports positions within the whole blob.
    pub(crate) fn read_exact(reader: &mut Reader<'_>) -> WireResult<Self> {
        let root = TypeRef::read(reader)?;
        let count = reader.read_count()?;
        let mut descriptors = Vec::with_capacity(count);
        for _ in 0..count {
            descriptors.push(Descriptor::read(reader)?);
        }
        if !reader.is_empty() {
            return Err(reader.error(DecodeCause::TrailingBytes {
                count: reader.remaining(),
            }));
        }
        Ok(Self { root, descriptors })
    }

    /// Returns the root type
    pub fn root(&self) -> &TypeRef {
        &self.root
    }

    /// Returns the descriptor table
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Looks up a descriptor by id
    pub fn descriptor(&self, id: DescriptorId) -> Option<&Descriptor> {
        id.index().and_then(|i| self.descriptors.get(i))
    }

    /// Human-readable spelling of a type, resolving names where possible
    pub fn type_name(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::List(elem) => format!("list<{}>", self.type_name(elem)),
            TypeRef::Map(key, value) => {
                format!("map<{}, {}>", self.type_name(key), self.type_name(value))
            }
            TypeRef::Optional(inner) => format!("optional<{}>", self.type_name(inner)),
            TypeRef::Named(id) => match self.descriptor(*id) {
                Some(descriptor) => descriptor.name().to_string(),
                None => id.to_string(),
            },
            primitive => primitive.primitive_name().unwrap_or("?").to_string(),
        }
    }

    /// Checks that every named reference resolves to a descriptor
    pub fn validate(&self) -> std::result::Result<(), DecodeCause> {
        self.check_type(&self.root)?;
        for descriptor in &self.descriptors {
            if let Descriptor::Record { fields, .. } = descriptor {
                for field in fields {
                    self.check_type(&field.ty)?;
                }
            }
        }
        Ok(())
    }

    /// Checks that every named reference inside `ty` resolves
    pub(crate) fn check_type(&self, ty: &TypeRef) -> std::result::Result<(), DecodeCause> {
        let mut missing = None;
        ty.for_each_named(&mut |id| {
            if self.descriptor(id).is_some() {
                true
            } else {
                missing = Some(id);
                false
            }
        });
        match missing {
            Some(id) => Err(DecodeCause::UnknownDescriptor { index: id.0 }),
            None => Ok(()),
        }
    }

    /// Walks the schema with a visitor
    pub fn walk(&self, visitor: &mut impl SchemaVisitor) -> fmt::Result {
        visitor.visit_schema(self)?;
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            let id = DescriptorId(i as u64);
            match descriptor {
                Descriptor::Record { name, fields } => {
                    visitor.visit_record(id, name)?;
                    for (index, field) in fields.iter().enumerate() {
                        visitor.visit_field(index, field)?;
                    }
                    visitor.end_record()?;
                }
                Descriptor::Enum { name, constants } => {
                    visitor.visit_enum(id, name)?;
                    for (ordinal, constant) in constants.iter().enumerate() {
                        visitor.visit_constant(ordinal, constant)?;
                    }
                    visitor.end_enum()?;
                }
            }
        }
        Ok(())
    }

    /// Counts the descriptors, fields and constants in the schema
    pub fn stats(&self) -> SchemaStats {
        let mut stats = SchemaStats::default();
        // Counting never fails
        let _ = self.walk(&mut stats);
        stats
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::new();
        self.walk(&mut writer::TextWriter::new(&mut text, self))?;
        f.write_str(text.trim_end())
    }
}

fn malformed(err: WireError) -> Error {
    Error::malformed_envelope(err.offset, format!("invalid schema: {}", err.cause))
}
