//! Envelope extraction.
//!
//! An envelope is the outer structure of a blob:
//!
//! ```text
//! +-----------+------------------+----------------+-------------------+
//! | magic [8] | schema_len (var) | schema [len]   | payload (rest)    |
//! +-----------+------------------+----------------+-------------------+
//! ```
//!
//! Extraction reads the magic, parses the schema region, and records where
//! the payload starts. It never looks at the payload and never checks
//! whether the magic is supported; both are left to the scheme.

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::source::Blob;
use crate::wire::{Reader, WireError};
use bytes::Bytes;
use std::fmt;
use tracing::{debug, trace};

/// Width of the magic marker in bytes
pub const MAGIC_LEN: usize = 8;

/// Magic of the self-describing blob format, version 1.0
pub const SDBF_MAGIC: Magic = Magic(*b"SDBF\x01\x00\x00\x00");

/// Fixed-width tag identifying the encoding family and version.
///
/// Layout: 4-byte family tag, major version, minor version, 2 reserved bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Magic(pub [u8; MAGIC_LEN]);

impl Magic {
    /// Returns the raw bytes
    pub fn as_bytes(&self) -> &[u8; MAGIC_LEN] {
        &self.0
    }

    /// Returns the 4-byte family tag
    pub fn family(&self) -> &[u8] {
        &self.0[..4]
    }

    /// Returns the (major, minor) format version
    pub fn version(&self) -> (u8, u8) {
        (self.0[4], self.0[5])
    }

    /// Reads the magic at the start of a blob without touching the rest.
    ///
    /// Scheme selection only needs the magic, so a blob in a foreign format
    /// can be rejected before its schema region is parsed.
    pub fn read(blob: &Blob) -> Result<Self> {
        let data = blob.bytes();
        let magic = Reader::new(data)
            .read_array::<MAGIC_LEN>()
            .map_err(|_| {
                Error::malformed_envelope(
                    0,
                    format!(
                        "blob is {} bytes, shorter than the {}-byte magic",
                        data.len(),
                        MAGIC_LEN
                    ),
                )
            })?;
        Ok(Magic(magic))
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.version();
        write!(
            f,
            "{} v{}.{} ({})",
            self.family().escape_ascii(),
            major,
            minor,
            hex::encode(self.0)
        )
    }
}

/// A blob split into magic, schema and payload
#[derive(Debug, Clone)]
pub struct Envelope {
    magic: Magic,
    schema: Schema,
    payload: Bytes,
    payload_offset: usize,
}

impl Envelope {
    /// Extracts the envelope from a blob.
    ///
    /// The payload is a zero-copy slice of the blob's bytes.
    pub fn extract(blob: &Blob) -> Result<Self> {
        let data = blob.bytes();
        let magic = Magic::read(blob)?;
        trace!("Read magic {}", magic);

        let mut reader = Reader::with_base(&data[MAGIC_LEN..], MAGIC_LEN);

        let schema_len = reader.read_len().map_err(malformed("schema length"))?;
        let schema_start = reader.offset();
        let schema_bytes = reader
            .read_bytes(schema_len)
            .map_err(malformed("schema region"))?;
        let payload_offset = reader.offset();

        let mut schema_reader = Reader::with_base(schema_bytes, schema_start);
        let schema = Schema::read_exact(&mut schema_reader).map_err(malformed("schema"))?;

        debug!(
            "Extracted envelope: magic {}, schema {} bytes, payload {} bytes at offset {}",
            magic,
            schema_len,
            data.len() - payload_offset,
            payload_offset
        );

        Ok(Self {
            magic,
            schema,
            payload: data.slice(payload_offset..),
            payload_offset,
        })
    }

    /// Returns the magic marker
    pub fn magic(&self) -> &Magic {
        &self.magic
    }

    /// Returns the embedded schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the encoded payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the payload's offset within the blob
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }
}

fn malformed(what: &'static str) -> impl Fn(WireError) -> Error {
    move |err| Error::malformed_envelope(err.offset, format!("invalid {}: {}", what, err.cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{basic_blob, blob_with};

    #[test]
    fn test_magic_display() {
        assert_eq!(SDBF_MAGIC.to_string(), "SDBF v1.0 (5344424601000000)");

        let odd = Magic([0x00, b'x', 0xFF, b'y', 2, 7, 0, 0]);
        assert_eq!(odd.to_string(), "\\x00x\\xffy v2.7 (0078ff7902070000)");
    }

    #[test]
    fn test_extract_basic() {
        let blob = basic_blob();
        let envelope = Envelope::extract(&blob).unwrap();

        assert_eq!(envelope.magic(), &SDBF_MAGIC);
        assert_eq!(envelope.schema().descriptors().len(), 1);
        assert_eq!(envelope.schema().descriptors()[0].name(), "example.Basic");
        assert_eq!(
            envelope.payload().as_ref(),
            &[0x01, 0x01, b'a', 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            envelope.payload_offset() + envelope.payload().len(),
            blob.len()
        );
    }

    #[test]
    fn test_extract_ignores_magic_support() {
        let mut bytes = basic_blob().bytes().to_vec();
        bytes[..4].copy_from_slice(b"NOPE");
        let envelope = Envelope::extract(&Blob::new("test.blob", bytes)).unwrap();
        assert_eq!(envelope.magic().family(), b"NOPE");
    }

    #[test]
    fn test_short_blob() {
        let err = Envelope::extract(&Blob::new("test.blob", b"SDBF".to_vec())).unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope { offset: 0, .. }));
        assert!(err.to_string().contains("shorter than the 8-byte magic"));
    }

    #[test]
    fn test_read_magic_ignores_garbage_after_it() {
        let mut bytes = b"OTHR\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&[0xFF; 12]);
        let blob = Blob::new("foreign.blob", bytes);

        let magic = Magic::read(&blob).unwrap();
        assert_eq!(magic.family(), b"OTHR");
        assert!(matches!(
            Envelope::extract(&blob),
            Err(Error::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn test_read_magic_short_blob() {
        let err = Magic::read(&Blob::new("test.blob", vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope { offset: 0, .. }));
    }

    #[test]
    fn test_schema_length_past_end() {
        let mut bytes = SDBF_MAGIC.as_bytes().to_vec();
        bytes.extend_from_slice(&[0x40, 0x01, 0x02]);
        let err = Envelope::extract(&Blob::new("test.blob", bytes)).unwrap_err();
        match err {
            Error::MalformedEnvelope { offset, details } => {
                assert_eq!(offset, 9);
                assert!(details.contains("schema region"), "{details}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_schema_errors_use_blob_offsets() {
        // Valid length, but the root type tag is unknown
        let blob = blob_with(SDBF_MAGIC, &[0x7F, 0x00], &[]);
        let err = Envelope::extract(&blob).unwrap_err();
        match err {
            Error::MalformedEnvelope { offset, details } => {
                assert_eq!(offset, 9);
                assert!(details.contains("unknown type tag 0x7f"), "{details}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_payload_is_extracted() {
        let blob = blob_with(SDBF_MAGIC, &[0x01, 0x00], &[]);
        let envelope = Envelope::extract(&blob).unwrap();
        assert!(envelope.payload().is_empty());
    }
}
