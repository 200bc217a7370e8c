//! Schema-driven payload decoding.
//!
//! The [`Decoder`] walks the declared type of each value and reads the
//! payload accordingly, building a [`StructuredValue`].
//!
//! Fixed-width numbers are little-endian and `char` is a `u32` code point.
//! Strings and bytes are length-prefixed, lists and maps carry a varint
//! count, optionals a `0`/`1` presence byte, enums a varint ordinal, and
//! `any` an inline type followed by the value.
//!
//! ## Object identity
//!
//! Named records carry a one-byte marker:
//!
//! | marker | meaning |
//! |--------|---------|
//! | `0x00` | null |
//! | `0x01` | new object, fields follow in schema order |
//! | `0x02` | back-reference, varint object id follows |
//!
//! A new object's id is reserved in the arena *before* its fields are read,
//! so a field may refer back to the record that contains it. Back-references
//! become [`Value::Ref`] and are never decoded twice, which keeps cyclic
//! graphs finite.

use crate::error::{DecodeCause, Error, Result};
use crate::schema::{Descriptor, DescriptorId, Schema, TypeRef};
use crate::value::{Field, ObjectArena, ObjectId, Record, StructuredValue, Value};
use crate::wire::{Reader, WireError, WireResult};
use tracing::{debug, trace};

const MARKER_NULL: u8 = 0x00;
const MARKER_NEW: u8 = 0x01;
const MARKER_REF: u8 = 0x02;

/// Configuration for payload decoding
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum value nesting depth
    pub max_depth: usize,
    /// Accept bytes after the root value instead of failing
    pub allow_trailing_bytes: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            allow_trailing_bytes: false,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets whether trailing payload bytes are tolerated
    pub fn allow_trailing_bytes(mut self, allow: bool) -> Self {
        self.allow_trailing_bytes = allow;
        self
    }
}

/// Decodes payloads against one schema
#[derive(Debug, Clone)]
pub struct Decoder<'s> {
    schema: &'s Schema,
    config: DecoderConfig,
}

impl<'s> Decoder<'s> {
    /// Creates a decoder for `schema`
    pub fn new(schema: &'s Schema, config: DecoderConfig) -> Self {
        Self { schema, config }
    }

    /// Decodes a payload into a structured value.
    ///
    /// Fails without partial output if the schema has unresolved names or
    /// the payload does not conform to it.
    pub fn decode(&self, payload: &[u8]) -> Result<StructuredValue> {
        self.schema
            .validate()
            .map_err(|cause| Error::decode(0, cause))?;

        let mut state = DecodeState {
            schema: self.schema,
            reader: Reader::new(payload),
            objects: ObjectArena::new(),
            object_types: Vec::new(),
            depth: 0,
            max_depth: self.config.max_depth,
        };

        let (root, type_name) = state.read_root().map_err(into_error)?;

        if !state.reader.is_empty() {
            let count = state.reader.remaining();
            if self.config.allow_trailing_bytes {
                debug!("Ignoring {} trailing payload bytes", count);
            } else {
                return Err(Error::decode(
                    state.reader.offset(),
                    DecodeCause::TrailingBytes { count },
                ));
            }
        }

        debug!(
            "Decoded {} from {} payload bytes ({} objects)",
            type_name,
            payload.len(),
            state.objects.len()
        );
        Ok(StructuredValue::new(type_name, root, state.objects))
    }
}

fn into_error(err: WireError) -> Error {
    Error::decode(err.offset, err.cause)
}

struct DecodeState<'s, 'p> {
    schema: &'s Schema,
    reader: Reader<'p>,
    objects: ObjectArena,
    /// Descriptor of each arena entry, by object id
    object_types: Vec<DescriptorId>,
    depth: usize,
    max_depth: usize,
}

impl DecodeState<'_, '_> {
    /// Reads the root value and its reported type name
    fn read_root(&mut self) -> WireResult<(Value, String)> {
        let schema = self.schema;
        match schema.root() {
            TypeRef::Any => {
                let ty = self.read_inline_type()?;
                let value = self.read_value(&ty)?;
                Ok((value, schema.type_name(&ty)))
            }
            ty => {
                let value = self.read_value(ty)?;
                Ok((value, schema.type_name(ty)))
            }
        }
    }

    fn read_inline_type(&mut self) -> WireResult<TypeRef> {
        let start = self.reader.offset();
        let ty = TypeRef::read(&mut self.reader)?;
        self.schema.check_type(&ty).map_err(|cause| WireError {
            offset: start,
            cause,
        })?;
        trace!("Inline type {} at offset {}", self.schema.type_name(&ty), start);
        Ok(ty)
    }

    fn read_value(&mut self, ty: &TypeRef) -> WireResult<Value> {
        if self.depth >= self.max_depth {
            return Err(self.reader.error(DecodeCause::DepthExceeded {
                limit: self.max_depth,
            }));
        }
        self.depth += 1;
        let value = self.read_value_inner(ty);
        self.depth -= 1;
        value
    }

    fn read_value_inner(&mut self, ty: &TypeRef) -> WireResult<Value> {
        let value = match ty {
            TypeRef::Bool => {
                let start = self.reader.offset();
                match self.reader.read_u8()? {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    other => {
                        return Err(WireError {
                            offset: start,
                            cause: DecodeCause::InvalidBool(other),
                        })
                    }
                }
            }
            TypeRef::I8 => Value::I8(i8::from_le_bytes(self.reader.read_array()?)),
            TypeRef::I16 => Value::I16(i16::from_le_bytes(self.reader.read_array()?)),
            TypeRef::I32 => Value::I32(i32::from_le_bytes(self.reader.read_array()?)),
            TypeRef::I64 => Value::I64(i64::from_le_bytes(self.reader.read_array()?)),
            TypeRef::U8 => Value::U8(self.reader.read_u8()?),
            TypeRef::U16 => Value::U16(u16::from_le_bytes(self.reader.read_array()?)),
            TypeRef::U32 => Value::U32(u32::from_le_bytes(self.reader.read_array()?)),
            TypeRef::U64 => Value::U64(u64::from_le_bytes(self.reader.read_array()?)),
            TypeRef::F32 => Value::F32(f32::from_le_bytes(self.reader.read_array()?)),
            TypeRef::F64 => Value::F64(f64::from_le_bytes(self.reader.read_array()?)),
            TypeRef::Char => {
                let start = self.reader.offset();
                let code = u32::from_le_bytes(self.reader.read_array()?);
                let c = char::from_u32(code).ok_or(WireError {
                    offset: start,
                    cause: DecodeCause::InvalidChar(code),
                })?;
                Value::Char(c)
            }
            TypeRef::String => Value::String(self.reader.read_str()?.to_string()),
            TypeRef::Bytes => Value::Bytes(self.reader.read_len_prefixed()?.to_vec()),
            TypeRef::List(elem) => {
                let count = self.reader.read_count()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_value(elem)?);
                }
                Value::List(items)
            }
            TypeRef::Map(key_ty, value_ty) => {
                let count = self.reader.read_count()?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.read_value(key_ty)?;
                    let value = self.read_value(value_ty)?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            TypeRef::Optional(inner) => {
                let start = self.reader.offset();
                match self.reader.read_u8()? {
                    0 => Value::Null,
                    1 => self.read_value(inner)?,
                    marker => {
                        return Err(WireError {
                            offset: start,
                            cause: DecodeCause::InvalidMarker {
                                type_name: self.schema.type_name(ty),
                                marker,
                            },
                        })
                    }
                }
            }
            TypeRef::Named(id) => self.read_named(*id)?,
            TypeRef::Any => {
                let inline = self.read_inline_type()?;
                self.read_value(&inline)?
            }
        };
        Ok(value)
    }

    fn read_named(&mut self, id: DescriptorId) -> WireResult<Value> {
        let schema = self.schema;
        let descriptor = schema
            .descriptor(id)
            .ok_or_else(|| self.reader.error(DecodeCause::UnknownDescriptor { index: id.0 }))?;

        match descriptor {
            Descriptor::Record { name, fields } => {
                let start = self.reader.offset();
                match self.reader.read_u8()? {
                    MARKER_NULL => Ok(Value::Null),
                    MARKER_NEW => {
                        let object = self.objects.push(Record {
                            type_name: name.clone(),
                            fields: Vec::with_capacity(fields.len()),
                        });
                        self.object_types.push(id);
                        trace!("New {} {} at offset {}", name, object, start);

                        for field in fields {
                            let value = self.read_value(&field.ty)?;
                            if let Some(record) = self.objects.get_mut(object) {
                                record.fields.push(Field {
                                    name: field.name.clone(),
                                    value,
                                });
                            }
                        }
                        Ok(Value::Object(object))
                    }
                    MARKER_REF => self.read_back_reference(id, name),
                    marker => Err(WireError {
                        offset: start,
                        cause: DecodeCause::InvalidMarker {
                            type_name: name.clone(),
                            marker,
                        },
                    }),
                }
            }
            Descriptor::Enum { name, constants } => {
                let start = self.reader.offset();
                let ordinal = self.reader.read_varint()?;
                let constant = usize::try_from(ordinal)
                    .ok()
                    .and_then(|i| constants.get(i))
                    .ok_or_else(|| WireError {
                        offset: start,
                        cause: DecodeCause::EnumOutOfRange {
                            type_name: name.clone(),
                            ordinal,
                            count: constants.len(),
                        },
                    })?;
                Ok(Value::Enum {
                    type_name: name.clone(),
                    constant: constant.clone(),
                })
            }
        }
    }

    fn read_back_reference(&mut self, expected: DescriptorId, name: &str) -> WireResult<Value> {
        let start = self.reader.offset();
        let raw = self.reader.read_varint()?;
        let dangling = || WireError {
            offset: start,
            cause: DecodeCause::DanglingReference {
                id: raw,
                known: self.object_types.len(),
            },
        };

        let index = usize::try_from(raw).map_err(|_| dangling())?;
        let actual = *self.object_types.get(index).ok_or_else(dangling)?;
        let object = ObjectId(index as u32);

        if actual != expected {
            let found = self
                .objects
                .get(object)
                .map(|record| record.type_name.clone())
                .unwrap_or_else(|| actual.to_string());
            return Err(WireError {
                offset: start,
                cause: DecodeCause::TypeMismatch {
                    expected: name.to_string(),
                    found,
                },
            });
        }

        trace!("Back-reference to {} at offset {}", object, start);
        Ok(Value::Ref(object))
    }
}
