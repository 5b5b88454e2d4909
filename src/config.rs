//! Engine configuration.
//!
//! Both structs derive serde traits with `#[serde(default)]`, so a host can
//! load them from any partial configuration document.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::document::{DEFAULT_ENCODING, DEFAULT_VERSION};
use crate::writer::{IndentConfig, XmlWriter};

/// Output options for the marshaller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Encoding written in the declaration of marshalled object graphs.
    pub encoding: String,
    /// Version written in the declaration of marshalled object graphs.
    pub version: String,
    /// Whether to write the `<?xml ...?>` declaration at all.
    pub declaration: bool,
    /// Indentation; compact output when `None`.
    pub indent: Option<IndentConfig>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            version: DEFAULT_VERSION.to_string(),
            declaration: true,
            indent: None,
        }
    }
}

impl WriterConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the declared encoding.
    pub fn with_encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Sets the declared version.
    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = version.into();
        self
    }

    /// Enables or disables the XML declaration.
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Enables indented output.
    pub fn with_indent(mut self, indent: IndentConfig) -> Self {
        self.indent = Some(indent);
        self
    }

    pub(crate) fn writer<W: Write>(&self, out: W) -> XmlWriter<W> {
        match &self.indent {
            Some(indent) => XmlWriter::with_indent(out, indent.clone()),
            None => XmlWriter::new(out),
        }
    }
}

/// Options for the unmarshaller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnmarshalConfig {
    /// Reuse tag instances across converted subtrees.
    pub use_tag_pool: bool,
}

impl Default for UnmarshalConfig {
    fn default() -> Self {
        Self { use_tag_pool: true }
    }
}

impl UnmarshalConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the tag pool.
    pub fn with_tag_pool(mut self, use_tag_pool: bool) -> Self {
        self.use_tag_pool = use_tag_pool;
        self
    }
}
