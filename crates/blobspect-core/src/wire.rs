//! Low-level wire primitives shared by the envelope and payload parsers.
//!
//! Everything in a blob is built from three primitives:
//! - unsigned LEB128 varints (at most 10 bytes for a 64-bit value)
//! - fixed-width little-endian numbers
//! - length-prefixed byte strings (varint length, then the bytes)
//!
//! [`Reader`] walks a byte slice with an explicit position so that every
//! failure can report the offset it happened at.

use crate::error::DecodeCause;

/// Maximum number of bytes in a 64-bit varint
pub(crate) const MAX_VARINT_LEN: usize = 10;

/// A wire-level failure and the offset it occurred at
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WireError {
    pub(crate) offset: usize,
    pub(crate) cause: DecodeCause,
}

pub(crate) type WireResult<T> = std::result::Result<T, WireError>;

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub(crate) fn decode_varint(data: &[u8]) -> std::result::Result<(u64, usize), DecodeCause> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(DecodeCause::InvalidVarint);
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    if data.len() >= MAX_VARINT_LEN {
        Err(DecodeCause::InvalidVarint)
    } else {
        Err(DecodeCause::Truncated {
            needed: data.len() + 1,
            available: data.len(),
        })
    }
}

/// Cursor over a byte slice
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    position: usize,
    /// Added to positions when reporting errors
    base: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Creates a reader whose reported offsets start at `base`
    pub(crate) fn with_base(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            position: 0,
            base,
        }
    }

    /// Current offset, including the base
    pub(crate) fn offset(&self) -> usize {
        self.base + self.position
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn error(&self, cause: DecodeCause) -> WireError {
        WireError {
            offset: self.offset(),
            cause,
        }
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.error(DecodeCause::Truncated {
                needed: len,
                available: self.remaining(),
            }));
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_varint(&mut self) -> WireResult<u64> {
        let (value, len) =
            decode_varint(&self.data[self.position..]).map_err(|cause| self.error(cause))?;
        self.position += len;
        Ok(value)
    }

    /// Reads a varint that sizes something in memory
    pub(crate) fn read_len(&mut self) -> WireResult<usize> {
        let start = self.offset();
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| WireError {
            offset: start,
            cause: DecodeCause::Truncated {
                needed: usize::MAX,
                available: self.remaining(),
            },
        })
    }

    /// Reads a varint count of items, each at least one byte long.
    ///
    /// Counts that could not possibly fit in the remaining bytes are
    /// rejected here, before anything is allocated for them.
    pub(crate) fn read_count(&mut self) -> WireResult<usize> {
        let start = self.offset();
        let count = self.read_len()?;
        if count > self.remaining() {
            return Err(WireError {
                offset: start,
                cause: DecodeCause::Truncated {
                    needed: count,
                    available: self.remaining(),
                },
            });
        }
        Ok(count)
    }

    /// Reads a varint length followed by that many bytes
    pub(crate) fn read_len_prefixed(&mut self) -> WireResult<&'a [u8]> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    /// Reads a length-prefixed UTF-8 string
    pub(crate) fn read_str(&mut self) -> WireResult<&'a str> {
        let start = self.offset();
        let bytes = self.read_len_prefixed()?;
        std::str::from_utf8(bytes).map_err(|_| WireError {
            offset: start,
            cause: DecodeCause::InvalidUtf8,
        })
    }
}
