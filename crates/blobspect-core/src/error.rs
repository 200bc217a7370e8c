//! Error types for the blobspect-core library.
//!
//! Every stage of the inspection pipeline fails through the single [`Error`]
//! enum. Each variant is terminal for an invocation; nothing here is retried.

use crate::envelope::Magic;
use crate::scheme::UseCase;
use std::fmt;
use thiserror::Error;

/// Result type alias for blobspect operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error carried as the source of a resolution failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Comprehensive error type for all blobspect operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The source locator could not be turned into bytes
    #[error("cannot resolve '{locator}': {reason}")]
    Resolution {
        /// The locator as given by the caller
        locator: String,
        /// Why resolution failed
        reason: ResolutionReason,
        /// Underlying I/O or transport error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// The bytes do not contain a well-formed envelope
    #[error("malformed envelope at offset {offset}: {details}")]
    MalformedEnvelope {
        /// Absolute byte offset in the blob where parsing failed
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// No registered scheme accepts the (magic, use case) pair
    #[error("no registered scheme accepts magic {magic} for use case {use_case}")]
    UnsupportedScheme {
        /// Magic marker read from the blob
        magic: Magic,
        /// Use case the caller asked to decode under
        use_case: UseCase,
    },

    /// A scheme was registered twice on the same registry
    #[error("a scheme is already registered ('{active}')")]
    SchemeAlreadyRegistered {
        /// Name of the scheme that stays active
        active: String,
    },

    /// The payload does not conform to its declared schema
    #[error("decode failed at payload offset {offset}: {cause}")]
    Decode {
        /// Byte offset relative to the start of the payload
        offset: usize,
        /// What went wrong
        cause: DecodeCause,
    },

    /// The structured value cannot be expressed in the chosen format
    #[error("cannot render as {format}: {details}")]
    Render {
        /// Name of the output format
        format: &'static str,
        /// Detailed description of the issue
        details: String,
    },

    /// Writing the rendered output failed
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

/// Reason attached to [`Error::Resolution`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolutionReason {
    /// The file or remote resource does not exist
    NotFound,
    /// Access to the file or remote resource was refused
    PermissionDenied,
    /// The source exceeds the configured size limit
    TooLarge,
    /// Any other I/O or transport failure
    Unreadable,
    /// The locator names a URL that cannot be mapped to a source
    InvalidLocator,
    /// The locator needs support that was compiled out
    Unsupported,
}

impl fmt::Display for ResolutionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionReason::NotFound => "not found",
            ResolutionReason::PermissionDenied => "permission denied",
            ResolutionReason::TooLarge => "source too large",
            ResolutionReason::Unreadable => "unreadable",
            ResolutionReason::InvalidLocator => "invalid locator",
            ResolutionReason::Unsupported => "unsupported locator",
        };
        f.write_str(s)
    }
}

/// Cause attached to [`Error::Decode`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeCause {
    /// The payload ended before a value was complete
    #[error("truncated payload (need {needed} bytes, have {available})")]
    Truncated {
        /// Bytes required by the value being read
        needed: usize,
        /// Bytes left in the payload
        available: usize,
    },

    /// A varint ran past 10 bytes
    #[error("invalid varint encoding")]
    InvalidVarint,

    /// The bytes contradict the declared type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared type name
        expected: String,
        /// Type name actually encountered
        found: String,
    },

    /// A named type points past the schema's descriptor table
    #[error("unknown type descriptor #{index}")]
    UnknownDescriptor {
        /// The unresolved descriptor index
        index: u64,
    },

    /// An inline type tag is not part of the wire format
    #[error("unknown type tag 0x{tag:02x}")]
    UnknownTypeTag {
        /// The offending tag byte
        tag: u8,
    },

    /// A record or optional marker byte is not recognised
    #[error("invalid marker 0x{marker:02x} for {type_name}")]
    InvalidMarker {
        /// Declared type being read
        type_name: String,
        /// The offending marker byte
        marker: u8,
    },

    /// A bool byte was neither 0 nor 1
    #[error("invalid bool byte 0x{0:02x}")]
    InvalidBool(u8),

    /// A char is not a Unicode scalar value
    #[error("invalid char code point 0x{0:x}")]
    InvalidChar(u32),

    /// A string is not valid UTF-8
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// An enum ordinal is outside the declared constants
    #[error("ordinal {ordinal} out of range for enum {type_name} ({count} constants)")]
    EnumOutOfRange {
        /// Enum type name
        type_name: String,
        /// Ordinal read from the payload
        ordinal: u64,
        /// Number of declared constants
        count: usize,
    },

    /// A back-reference names an object that was never decoded
    #[error("back-reference to unknown object {id} ({known} objects decoded)")]
    DanglingReference {
        /// Referenced object id
        id: u64,
        /// Number of objects decoded so far
        known: usize,
    },

    /// Values nest deeper than the configured limit
    #[error("nesting exceeds the maximum depth of {limit}")]
    DepthExceeded {
        /// Configured maximum depth
        limit: usize,
    },

    /// Bytes remain after the root value
    #[error("{count} trailing bytes after the root value")]
    TrailingBytes {
        /// Number of unconsumed bytes
        count: usize,
    },
}

/// Coarse classification of an [`Error`], one per pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source locator could not be read
    Resolution,
    /// Envelope structure is broken
    MalformedEnvelope,
    /// Magic or use case not accepted
    UnsupportedScheme,
    /// Scheme registry misuse
    Registry,
    /// Payload does not match its schema
    Decode,
    /// Output could not be produced
    Render,
}

impl Error {
    /// Creates a new resolution error
    pub fn resolution(
        locator: impl Into<String>,
        reason: ResolutionReason,
        source: Option<BoxError>,
    ) -> Self {
        Self::Resolution {
            locator: locator.into(),
            reason,
            source,
        }
    }

    /// Creates a new malformed envelope error
    pub fn malformed_envelope(offset: usize, details: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new unsupported scheme error
    pub fn unsupported_scheme(magic: Magic, use_case: UseCase) -> Self {
        Self::UnsupportedScheme { magic, use_case }
    }

    /// Creates a new decode error
    pub fn decode(offset: usize, cause: DecodeCause) -> Self {
        Self::Decode { offset, cause }
    }

    /// Creates a new render error
    pub fn render(format: &'static str, details: impl Into<String>) -> Self {
        Self::Render {
            format,
            details: details.into(),
        }
    }

    /// Returns the pipeline stage this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolution { .. } => ErrorKind::Resolution,
            Self::MalformedEnvelope { .. } => ErrorKind::MalformedEnvelope,
            Self::UnsupportedScheme { .. } => ErrorKind::UnsupportedScheme,
            Self::SchemeAlreadyRegistered { .. } => ErrorKind::Registry,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Render { .. } | Self::Output(_) => ErrorKind::Render,
        }
    }
}
