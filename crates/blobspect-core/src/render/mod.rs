//! Rendering structured values as text documents.
//!
//! Two formats are supported: YAML (the default) and JSON. Both preserve
//! object identity: a record that is referenced again later in the graph is
//! labelled at its first occurrence, and every later occurrence points back
//! at that label instead of being expanded again.
//!
//! | | label | back-reference |
//! |------|-------------------|----------------|
//! | YAML | anchor `&objN` | alias `*objN` |
//! | JSON | `"@id": N` member | `{"@ref": N}` |

mod json;
mod yaml;

use crate::error::{Error, Result};
use crate::value::StructuredValue;
use std::fmt;
use std::io::Write;
use tracing::debug;

/// Configuration for rendering
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Number of spaces per indentation level
    pub indent: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl RenderConfig {
    /// Creates a new render config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation width; values below one are treated as one
    pub fn indent(mut self, width: usize) -> Self {
        self.indent = width;
        self
    }

    fn indent_str(&self) -> String {
        " ".repeat(self.indent.max(1))
    }
}

/// Output document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    /// Block-style YAML
    #[default]
    Yaml,
    /// Pretty-printed JSON
    Json,
}

impl RenderFormat {
    /// Returns the lower-case format name
    pub fn name(&self) -> &'static str {
        match self {
            RenderFormat::Yaml => "yaml",
            RenderFormat::Json => "json",
        }
    }

    /// Renders the document for `value` with the default configuration
    pub fn render(&self, value: &StructuredValue) -> Result<String> {
        self.render_with(value, &RenderConfig::default())
    }

    /// Renders the document for `value`.
    ///
    /// The result ends with a newline. The type-name line is not included.
    pub fn render_with(&self, value: &StructuredValue, config: &RenderConfig) -> Result<String> {
        let indent = config.indent_str();
        let document = match self {
            RenderFormat::Yaml => yaml::render(value, &indent)
                .map_err(|e| Error::render(self.name(), e.to_string()))?,
            RenderFormat::Json => json::render(value, &indent)?,
        };
        debug!("Rendered {} document ({} bytes)", self.name(), document.len());
        Ok(document)
    }

    /// Writes the type name on its own line, then the document.
    ///
    /// The document is rendered before anything is written, so a render
    /// failure leaves `out` untouched.
    pub fn write(&self, value: &StructuredValue, out: &mut impl Write) -> Result<()> {
        self.write_with(value, &RenderConfig::default(), out)
    }

    /// Like [`write`](Self::write) with an explicit configuration
    pub fn write_with(
        &self,
        value: &StructuredValue,
        config: &RenderConfig,
        out: &mut impl Write,
    ) -> Result<()> {
        let document = self.render_with(value, config)?;
        writeln!(out, "{}", value.type_name()).map_err(Error::Output)?;
        out.write_all(document.as_bytes()).map_err(Error::Output)?;
        out.flush().map_err(Error::Output)
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
