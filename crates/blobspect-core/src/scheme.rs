//! Decoding schemes and the registry that selects one.
//!
//! A [`Scheme`] is a decoding capability bound to exactly one accepted
//! (magic, use case) pair. A [`SchemeRegistry`] holds at most one active
//! scheme and hands it out only for that exact pair; there is no fallback
//! and no multi-format detection.
//!
//! The registry is an ordinary value owned by the caller, so independent
//! inspections can run side by side with different schemes.
//!
//! ## Extensibility
//!
//! ```
//! use blobspect_core::scheme::{Scheme, SchemeRegistry, UseCase};
//! use blobspect_core::{Magic, Result, Schema, StructuredValue, SDBF_MAGIC};
//!
//! struct Refuser;
//!
//! impl Scheme for Refuser {
//!     fn name(&self) -> &str {
//!         "refuser"
//!     }
//!     fn accepted_magic(&self) -> Magic {
//!         SDBF_MAGIC
//!     }
//!     fn accepted_use_case(&self) -> UseCase {
//!         UseCase::Testing
//!     }
//!     fn decode(&self, _schema: &Schema, _payload: &[u8]) -> Result<StructuredValue> {
//!         unimplemented!()
//!     }
//! }
//!
//! let registry = SchemeRegistry::new();
//! registry.register(Box::new(Refuser))?;
//! assert!(registry.resolve(&SDBF_MAGIC, UseCase::P2p).is_err());
//! assert!(registry.resolve(&SDBF_MAGIC, UseCase::Testing).is_ok());
//! # Ok::<(), blobspect_core::Error>(())
//! ```

use crate::decoder::{Decoder, DecoderConfig};
use crate::envelope::{Magic, SDBF_MAGIC};
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::StructuredValue;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Protocol context a blob is decoded under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseCase {
    /// Peer-to-peer messaging
    P2p,
    /// Server side of an RPC connection
    RpcServer,
    /// Client side of an RPC connection
    RpcClient,
    /// Persisted records
    Storage,
    /// Checkpointed state
    Checkpoint,
    /// Test fixtures
    Testing,
}

impl UseCase {
    /// Returns the lower-case name used in messages and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::P2p => "p2p",
            UseCase::RpcServer => "rpc-server",
            UseCase::RpcClient => "rpc-client",
            UseCase::Storage => "storage",
            UseCase::Checkpoint => "checkpoint",
            UseCase::Testing => "testing",
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoding capability bound to one (magic, use case) pair
pub trait Scheme: Send + Sync {
    /// Short name for logs and errors
    fn name(&self) -> &str;

    /// The magic this scheme decodes
    fn accepted_magic(&self) -> Magic;

    /// The use case this scheme decodes for
    fn accepted_use_case(&self) -> UseCase;

    /// Returns true if this scheme decodes the given pair.
    ///
    /// Both components must match exactly.
    fn accepts(&self, magic: &Magic, use_case: UseCase) -> bool {
        *magic == self.accepted_magic() && use_case == self.accepted_use_case()
    }

    /// Decodes a payload according to its schema
    fn decode(&self, schema: &Schema, payload: &[u8]) -> Result<StructuredValue>;
}

impl fmt::Debug for dyn Scheme + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheme")
            .field("name", &self.name())
            .field("magic", &self.accepted_magic())
            .field("use_case", &self.accepted_use_case())
            .finish()
    }
}

/// Holds the single active scheme
#[derive(Default)]
pub struct SchemeRegistry {
    active: OnceLock<Box<dyn Scheme>>,
}

impl SchemeRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with `scheme` already registered
    pub fn with_scheme(scheme: Box<dyn Scheme>) -> Self {
        let registry = Self::new();
        // A fresh registry is always empty
        let _ = registry.active.set(scheme);
        registry
    }

    /// Installs `scheme` as the active scheme.
    ///
    /// Only one registration is allowed per registry; later calls fail with
    /// [`Error::SchemeAlreadyRegistered`] and leave the first scheme active.
    pub fn register(&self, scheme: Box<dyn Scheme>) -> Result<()> {
        let name = scheme.name().to_string();
        self.active.set(scheme).map_err(|_| Error::SchemeAlreadyRegistered {
            active: self
                .active
                .get()
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
        })?;
        debug!("Registered scheme '{}'", name);
        Ok(())
    }

    /// Returns the active scheme, if any
    pub fn active(&self) -> Option<&dyn Scheme> {
        self.active.get().map(|s| s.as_ref())
    }

    /// Returns the active scheme if it accepts exactly this pair
    pub fn resolve(&self, magic: &Magic, use_case: UseCase) -> Result<&dyn Scheme> {
        match self.active() {
            Some(scheme) if scheme.accepts(magic, use_case) => {
                debug!(
                    "Scheme '{}' accepts magic {} for {}",
                    scheme.name(),
                    magic,
                    use_case
                );
                Ok(scheme)
            }
            _ => Err(Error::unsupported_scheme(*magic, use_case)),
        }
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("active", &self.active().map(|s| s.name()))
            .finish()
    }
}

/// The built-in scheme for the self-describing blob format
#[derive(Debug, Clone)]
pub struct InspectorScheme {
    magic: Magic,
    use_case: UseCase,
    config: DecoderConfig,
}

impl Default for InspectorScheme {
    fn default() -> Self {
        Self::new(SDBF_MAGIC, UseCase::P2p)
    }
}

impl InspectorScheme {
    /// Creates a scheme accepting the given pair
    pub fn new(magic: Magic, use_case: UseCase) -> Self {
        Self {
            magic,
            use_case,
            config: DecoderConfig::default(),
        }
    }

    /// Sets the decoder configuration
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }
}

impl Scheme for InspectorScheme {
    fn name(&self) -> &str {
        "sdbf-inspector"
    }

    fn accepted_magic(&self) -> Magic {
        self.magic
    }

    fn accepted_use_case(&self) -> UseCase {
        self.use_case
    }

    fn decode(&self, schema: &Schema, payload: &[u8]) -> Result<StructuredValue> {
        Decoder::new(schema, self.config.clone()).decode(payload)
    }
}
