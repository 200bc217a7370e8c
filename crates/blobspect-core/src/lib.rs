//! # blobspect-core
//!
//! A library for inspecting self-describing binary blobs.
//!
//! A blob starts with an 8-byte magic, carries the schema of its own
//! payload, and then the payload itself. This crate provides the core
//! functionality for:
//! - Resolving a blob from a file path or URL
//! - Splitting it into magic, schema and payload
//! - Selecting the decoding scheme registered for its magic
//! - Decoding the payload into a format-independent value
//! - Rendering that value as YAML or JSON
//!
//! ## Architecture
//!
//! - [`source`]: Locator parsing and blob resolution
//! - [`envelope`]: Magic, schema and payload extraction
//! - [`schema`]: The embedded type schema
//! - [`scheme`]: Decoding schemes and their registry
//! - [`decoder`]: Schema-driven payload decoding
//! - [`value`]: Decoded values with object identity
//! - [`render`]: YAML and JSON output
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use blobspect_core::{
//!     resolve, Envelope, InspectorScheme, RenderFormat, ResolverConfig, SchemeRegistry, UseCase,
//! };
//!
//! let blob = resolve("./capture.blob", &ResolverConfig::default())?;
//! let envelope = Envelope::extract(&blob)?;
//!
//! let registry = SchemeRegistry::with_scheme(Box::new(InspectorScheme::default()));
//! let scheme = registry.resolve(envelope.magic(), UseCase::P2p)?;
//! let value = scheme.decode(envelope.schema(), envelope.payload())?;
//!
//! RenderFormat::Yaml.write(&value, &mut std::io::stdout())?;
//! # Ok::<(), blobspect_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`Scheme`]: Plug in a decoder for another magic or use case
//! - [`SchemaVisitor`]: Walk the schema's descriptors

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod decoder;
pub mod envelope;
pub mod error;
pub mod render;
pub mod schema;
pub mod scheme;
pub mod source;
pub mod value;

mod wire;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use decoder::{Decoder, DecoderConfig};
pub use envelope::{Envelope, Magic, MAGIC_LEN, SDBF_MAGIC};
pub use error::{DecodeCause, Error, ErrorKind, ResolutionReason, Result};
pub use render::{RenderConfig, RenderFormat};
pub use schema::{Schema, SchemaStats, SchemaVisitor};
pub use scheme::{InspectorScheme, Scheme, SchemeRegistry, UseCase};
pub use source::{resolve, Blob, ResolverConfig, Source};
pub use value::{ObjectId, StructuredValue, Value};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
