//! Decoded, format-independent values.
//!
//! Records are stored once in an [`ObjectArena`] and addressed by
//! [`ObjectId`]. The value tree holds ids instead of owning records: the
//! first occurrence of a record is a [`Value::Object`], every later
//! occurrence a [`Value::Ref`]. Shared and cyclic object graphs therefore
//! never form ownership cycles, and walking the tree without following refs
//! always terminates.

use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of a record in the arena, assigned in encounter order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Returns the id as an arena index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj{}", self.0)
    }
}

/// A dynamically-typed decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent optional or null record
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 8-bit integer
    I8(i8),
    /// Signed 16-bit integer
    I16(i16),
    /// Signed 32-bit integer
    I32(i32),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 8-bit integer
    U8(u8),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Unsigned 64-bit integer
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Unicode scalar value
    Char(char),
    /// UTF-8 string
    String(String),
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// Ordered sequence
    List(Vec<Value>),
    /// Ordered key/value pairs
    Map(Vec<(Value, Value)>),
    /// Enum constant
    Enum {
        /// Enum type name
        type_name: String,
        /// Constant name
        constant: String,
    },
    /// First occurrence of a record; its fields live in the arena
    Object(ObjectId),
    /// Later occurrence of a record already decoded
    Ref(ObjectId),
}

/// A named field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name from the schema
    pub name: String,
    /// Decoded value
    pub value: Value,
}

/// A decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record type name from the schema
    pub type_name: String,
    /// Fields in schema order
    pub fields: Vec<Field>,
}

/// Storage for every record decoded from one payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectArena {
    records: Vec<Record>,
}

impl ObjectArena {
    /// Creates an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record and returns its id
    pub fn push(&mut self, record: Record) -> ObjectId {
        let id = ObjectId(self.records.len() as u32);
        self.records.push(record);
        id
    }

    /// Looks up a record
    pub fn get(&self, id: ObjectId) -> Option<&Record> {
        self.records.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut Record> {
        self.records.get_mut(id.index())
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records were decoded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in id order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Record)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, record)| (ObjectId(i as u32), record))
    }
}

/// The decoder's output: a value tree, its records, and a type name
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredValue {
    type_name: String,
    root: Value,
    objects: ObjectArena,
}

impl StructuredValue {
    /// Assembles a structured value
    pub fn new(type_name: impl Into<String>, root: Value, objects: ObjectArena) -> Self {
        Self {
            type_name: type_name.into(),
            root,
            objects,
        }
    }

    /// Reported runtime type name of the root
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Root of the value tree
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Records referenced from the tree
    pub fn objects(&self) -> &ObjectArena {
        &self.objects
    }

    /// Looks up a record
    pub fn record(&self, id: ObjectId) -> Option<&Record> {
        self.objects.get(id)
    }

    /// Ids of every record that is the target of at least one [`Value::Ref`]
    pub fn referenced(&self) -> BTreeSet<ObjectId> {
        let mut ids = BTreeSet::new();
        for (_, record) in self.objects.iter() {
            for field in &record.fields {
                collect_refs(&field.value, &mut ids);
            }
        }
        collect_refs(&self.root, &mut ids);
        ids
    }
}

/// Collects ref targets without descending into records, which are visited
/// through the arena instead
fn collect_refs(value: &Value, ids: &mut BTreeSet<ObjectId>) {
    match value {
        Value::Ref(id) => {
            ids.insert(*id);
        }
        Value::List(items) => items.iter().for_each(|item| collect_refs(item, ids)),
        Value::Map(entries) => entries.iter().for_each(|(k, v)| {
            collect_refs(k, ids);
            collect_refs(v, ids);
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_finds_nested_refs() {
        let mut objects = ObjectArena::new();
        let a = objects.push(Record {
            type_name: "a.Node".to_string(),
            fields: vec![],
        });
        let b = objects.push(Record {
            type_name: "a.Node".to_string(),
            fields: vec![Field {
                name: "peers".to_string(),
                value: Value::List(vec![Value::Ref(a)]),
            }],
        });

        let value = StructuredValue::new(
            "list<a.Node>",
            Value::List(vec![Value::Object(a), Value::Object(b)]),
            objects,
        );

        let referenced = value.referenced();
        assert!(referenced.contains(&a));
        assert!(!referenced.contains(&b));
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(3).to_string(), "obj3");
    }
}
