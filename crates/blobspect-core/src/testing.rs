//! Hand-assembled blobs for unit tests.

use crate::envelope::Magic;
use crate::source::Blob;

/// Little byte builder mirroring the wire primitives
#[derive(Debug, Default)]
pub(crate) struct Enc(Vec<u8>);

impl Enc {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn u8(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub(crate) fn varint(mut self, mut value: u64) -> Self {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.0.push(byte);
                return self;
            }
            self.0.push(byte | 0x80);
        }
    }

    pub(crate) fn str(self, s: &str) -> Self {
        self.varint(s.len() as u64).raw(s.as_bytes())
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.0
    }
}

/// Wraps schema and payload bytes into a blob
pub(crate) fn blob_with(magic: Magic, schema: &[u8], payload: &[u8]) -> Blob {
    let bytes = Enc::new()
        .raw(magic.as_bytes())
        .varint(schema.len() as u64)
        .raw(schema)
        .raw(payload)
        .finish();
    Blob::new("test.blob", bytes)
}

/// Schema of `example.Basic { name: string, value: i32 }`
pub(crate) fn basic_schema() -> Vec<u8> {
    Enc::new()
        .u8(0x20)
        .varint(0) // root: #0
        .varint(1) // one descriptor
        .u8(0x01)
        .str("example.Basic")
        .varint(2)
        .str("name")
        .u8(0x0D)
        .str("value")
        .u8(0x04)
        .finish()
}

/// `example.Basic { name: "a", value: 1 }` under the accepted magic
pub(crate) fn basic_blob() -> Blob {
    let payload = Enc::new()
        .u8(0x01) // new object
        .str("a")
        .raw(&1i32.to_le_bytes())
        .finish();
    blob_with(crate::envelope::SDBF_MAGIC, &basic_schema(), &payload)
}
