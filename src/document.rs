//! Document-level wrapper around a root tag.

use crate::tag::CompositeTag;

/// Encoding written when none is set.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// XML version written when none is set.
pub const DEFAULT_VERSION: &str = "1.0";

/// A tag tree plus the declaration it is written with.
#[derive(Debug, Clone)]
pub struct Document {
    encoding: String,
    version: String,
    root: Option<CompositeTag>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            version: DEFAULT_VERSION.to_string(),
            root: None,
        }
    }
}

impl Document {
    /// A document around `root` with the default declaration.
    pub fn new(root: CompositeTag) -> Self {
        Self {
            root: Some(root),
            ..Self::default()
        }
    }

    /// Declared encoding.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Sets the encoding; an empty value restores the default.
    pub fn set_encoding<S: Into<String>>(&mut self, encoding: S) {
        let encoding = encoding.into();
        self.encoding = if encoding.is_empty() {
            DEFAULT_ENCODING.to_string()
        } else {
            encoding
        };
    }

    /// Declared XML version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Sets the version; an empty value restores the default.
    pub fn set_version<S: Into<String>>(&mut self, version: S) {
        let version = version.into();
        self.version = if version.is_empty() {
            DEFAULT_VERSION.to_string()
        } else {
            version
        };
    }

    /// The root tag.
    pub fn root(&self) -> Option<&CompositeTag> {
        self.root.as_ref()
    }

    /// Replaces the root tag.
    pub fn set_root(&mut self, root: CompositeTag) {
        self.root = Some(root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let mut doc = Document::default();
        assert_eq!(doc.encoding(), "UTF-8");
        assert_eq!(doc.version(), "1.0");
        assert!(doc.root().is_none());

        doc.set_encoding("ISO-8859-1");
        doc.set_version("");
        assert_eq!(doc.encoding(), "ISO-8859-1");
        assert_eq!(doc.version(), "1.0");
    }
}
