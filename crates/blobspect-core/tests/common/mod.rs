use blobspect_core::{Blob, Magic, SDBF_MAGIC};

/// Builds blobs byte by byte using the wire primitives
#[derive(Debug, Clone, Default)]
pub struct BlobBuilder {
    magic: Option<Magic>,
    schema: Vec<u8>,
    payload: Vec<u8>,
}

impl BlobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn magic(mut self, magic: Magic) -> Self {
        self.magic = Some(magic);
        self
    }

    pub fn schema(mut self, bytes: Vec<u8>) -> Self {
        self.schema = bytes;
        self
    }

    pub fn payload(mut self, bytes: Vec<u8>) -> Self {
        self.payload = bytes;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.magic.unwrap_or(SDBF_MAGIC).as_bytes().to_vec();
        varint(&mut out, self.schema.len() as u64);
        out.extend_from_slice(&self.schema);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn build(&self) -> Blob {
        Blob::new("test.blob", self.to_bytes())
    }
}

pub fn varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn string(out: &mut Vec<u8>, s: &str) {
    varint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

/// `root example.Basic; record example.Basic { string name; i32 value; }`
pub fn basic_schema() -> Vec<u8> {
    let mut out = vec![0x20, 0x00, 0x01, 0x01];
    string(&mut out, "example.Basic");
    out.push(0x02);
    string(&mut out, "name");
    out.push(0x0D);
    string(&mut out, "value");
    out.push(0x04);
    out
}

pub fn basic_payload() -> Vec<u8> {
    let mut out = vec![0x01];
    string(&mut out, "a");
    out.extend_from_slice(&1i32.to_le_bytes());
    out
}

/// `root example.Node; record example.Node { string label; example.Node next; }`
pub fn node_schema() -> Vec<u8> {
    let mut out = vec![0x20, 0x00, 0x01, 0x01];
    string(&mut out, "example.Node");
    out.push(0x02);
    string(&mut out, "label");
    out.push(0x0D);
    string(&mut out, "next");
    out.extend_from_slice(&[0x20, 0x00]);
    out
}

/// `a -> b -> a`
pub fn cyclic_payload() -> Vec<u8> {
    let mut out = vec![0x01];
    string(&mut out, "a");
    out.push(0x01);
    string(&mut out, "b");
    out.extend_from_slice(&[0x02, 0x00]);
    out
}
