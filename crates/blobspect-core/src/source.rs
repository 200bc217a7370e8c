//! Source resolution.
//!
//! Turns a user-supplied locator into a [`Blob`]. A locator that parses as an
//! `http`, `https` or `file` URL is treated as a URL; anything else is a
//! filesystem path relative to the working directory. Sources are read in
//! full, exactly once, with no retry and no caching.

use crate::error::{Error, ResolutionReason, Result};
use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// An immutable byte sequence and the locator it was read from
#[derive(Debug, Clone)]
pub struct Blob {
    origin: String,
    bytes: Bytes,
}

impl Blob {
    /// Creates a blob from bytes already in memory
    pub fn new(origin: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            origin: origin.into(),
            bytes: bytes.into(),
        }
    }

    /// Returns where the blob was read from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the blob's bytes
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Returns the blob's length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the blob has no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// BLAKE3 digest of the blob, as 64 hex characters
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }
}

/// Configuration for source resolution
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Timeout for fetching network sources
    pub timeout: Duration,
    /// Maximum accepted source size in bytes
    pub max_bytes: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: 256 * 1024 * 1024, // 256 MB
        }
    }
}

impl ResolverConfig {
    /// Creates a new resolver config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the network timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum source size
    pub fn max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = max;
        self
    }
}

/// A parsed source locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Remote or `file:` URL
    Url(Url),
    /// Filesystem path
    Path(PathBuf),
}

impl Source {
    /// Classifies a locator as a URL or a path.
    ///
    /// Only `http`, `https` and `file` URLs count as URLs. This keeps
    /// Windows drive paths such as `C:\blob.bin`, which parse as URLs with a
    /// one-letter scheme, on the path side.
    pub fn parse(locator: &str) -> Self {
        match Url::parse(locator) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => Source::Url(url),
            _ => Source::Path(PathBuf::from(locator)),
        }
    }

    /// Reads the whole source into a blob
    pub fn read(&self, config: &ResolverConfig) -> Result<Blob> {
        let blob = match self {
            Source::Path(path) => read_path(&path.display().to_string(), path, config)?,
            Source::Url(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|()| {
                    Error::resolution(url.as_str(), ResolutionReason::InvalidLocator, None)
                })?;
                read_path(url.as_str(), &path, config)?
            }
            Source::Url(url) => fetch(url, config)?,
        };

        debug!("Resolved {} ({} bytes)", blob.origin(), blob.len());
        Ok(blob)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => write!(f, "{}", url),
            Source::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parses a locator and reads it in one step
pub fn resolve(locator: &str, config: &ResolverConfig) -> Result<Blob> {
    let source = Source::parse(locator);
    trace!("Locator '{}' parsed as {:?}", locator, source);
    source.read(config)
}

fn read_path(locator: &str, path: &Path, config: &ResolverConfig) -> Result<Blob> {
    let io_error = |e: std::io::Error| {
        let reason = match e.kind() {
            std::io::ErrorKind::NotFound => ResolutionReason::NotFound,
            std::io::ErrorKind::PermissionDenied => ResolutionReason::PermissionDenied,
            _ => ResolutionReason::Unreadable,
        };
        Error::resolution(locator, reason, Some(Box::new(e)))
    };

    let metadata = std::fs::metadata(path).map_err(io_error)?;
    if metadata.len() > config.max_bytes {
        return Err(too_large(locator, &format!("{} bytes", metadata.len()), config));
    }

    let data = std::fs::read(path).map_err(io_error)?;
    Ok(Blob::new(locator, data))
}

fn too_large(locator: &str, size: &str, config: &ResolverConfig) -> Error {
    Error::resolution(
        locator,
        ResolutionReason::TooLarge,
        Some(format!("{} exceeds the {}-byte limit", size, config.max_bytes).into()),
    )
}

#[cfg(feature = "http")]
fn fetch(url: &Url, config: &ResolverConfig) -> Result<Blob> {
    use std::io::Read;

    let locator = url.as_str();
    let transport = |e: reqwest::Error| {
        Error::resolution(locator, ResolutionReason::Unreadable, Some(Box::new(e)))
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(transport)?;

    trace!("GET {}", locator);
    let resp = client.get(url.clone()).send().map_err(transport)?;

    let status = resp.status();
    if !status.is_success() {
        let reason = match status.as_u16() {
            404 | 410 => ResolutionReason::NotFound,
            401 | 403 => ResolutionReason::PermissionDenied,
            _ => ResolutionReason::Unreadable,
        };
        return Err(Error::resolution(
            locator,
            reason,
            Some(format!("HTTP {}", status).into()),
        ));
    }

    if let Some(len) = resp.content_length() {
        if len > config.max_bytes {
            return Err(too_large(locator, &format!("{} bytes", len), config));
        }
    }

    // Bodies without a length are cut off one byte past the limit
    let mut body = Vec::new();
    resp.take(config.max_bytes.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|e| Error::resolution(locator, ResolutionReason::Unreadable, Some(Box::new(e))))?;
    if body.len() as u64 > config.max_bytes {
        return Err(too_large(locator, "response body", config));
    }

    Ok(Blob::new(locator, body))
}

#[cfg(not(feature = "http"))]
fn fetch(url: &Url, _config: &ResolverConfig) -> Result<Blob> {
    Err(Error::resolution(
        url.as_str(),
        ResolutionReason::Unsupported,
        Some("built without the `http` feature".into()),
    ))
}
