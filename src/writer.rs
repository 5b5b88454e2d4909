//! Namespace-repairing XML writer.
//!
//! [`XmlWriter`] emits well-formed XML for elements named by [`QName`]. Any
//! namespace used by an element or attribute name that is not already in
//! scope gets an `xmlns` declaration on that element, so callers never have
//! to declare namespaces by hand.

use std::io::Write;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::escape::{escape_attr, escape_text};
use crate::namespace::NamespaceScopes;
use crate::qname::QName;

/// Indentation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndentConfig {
    /// String repeated once per nesting level.
    pub indent_str: String,
    /// Whether to start every element on a new line.
    pub newlines: bool,
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            newlines: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    Nothing,
    Declaration,
    Start,
    Text,
    End,
}

/// Streaming XML writer with namespace repairing.
pub struct XmlWriter<W: Write> {
    writer: W,
    open: Vec<String>,
    scopes: NamespaceScopes,
    in_tag: bool,
    indent: Option<IndentConfig>,
    last: Last,
}

impl<W: Write> XmlWriter<W> {
    /// Creates a writer producing compact output.
    #[inline]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            open: Vec::new(),
            scopes: NamespaceScopes::new(),
            in_tag: false,
            indent: None,
            last: Last::Nothing,
        }
    }

    /// Creates a writer producing indented output.
    #[inline]
    pub fn with_indent(writer: W, indent: IndentConfig) -> Self {
        Self {
            indent: Some(indent),
            ..Self::new(writer)
        }
    }

    /// Returns the inner writer.
    #[inline]
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Number of open elements.
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Writes `<?xml version=".." encoding=".."?>`.
    pub fn write_declaration(&mut self, version: &str, encoding: Option<&str>) -> Result<()> {
        if self.last != Last::Nothing {
            return Err(Error::structural("XML declaration must come first"));
        }
        write!(self.writer, "<?xml version=\"{}\"", escape_attr(version))?;
        if let Some(enc) = encoding {
            write!(self.writer, " encoding=\"{}\"", escape_attr(enc))?;
        }
        self.writer.write_all(b"?>")?;
        self.last = Last::Declaration;
        Ok(())
    }

    /// Opens an element.
    ///
    /// `namespaces` are declarations the caller wants emitted on this element
    /// (prefix -> uri, empty prefix for the default namespace). Declarations
    /// needed for `name` or the attribute names are added as required.
    pub fn start_element(
        &mut self,
        name: &QName,
        namespaces: &IndexMap<String, String>,
        attributes: &IndexMap<QName, String>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::validation("element name has an empty local part"));
        }
        if self.open.is_empty()
            && !matches!(self.last, Last::Nothing | Last::Declaration | Last::Start)
        {
            return Err(Error::structural("document already has a root element"));
        }

        self.close_tag_if_open()?;
        self.write_indent()?;
        self.scopes.push_scope();

        let mut declared: IndexMap<String, String> = IndexMap::new();
        for (prefix, uri) in namespaces {
            if prefix == "xml" || prefix == "xmlns" {
                continue;
            }
            self.scopes.declare(prefix, uri);
            declared.insert(prefix.clone(), uri.clone());
        }

        let element_prefix = self.element_prefix(name, &mut declared);
        let raw = if element_prefix.is_empty() {
            name.local_part().to_string()
        } else {
            format!("{}:{}", element_prefix, name.local_part())
        };

        let mut written = Vec::with_capacity(attributes.len());
        for (attr, value) in attributes {
            let prefix = self.attribute_prefix(attr, &mut declared);
            let raw_attr = if prefix.is_empty() {
                attr.local_part().to_string()
            } else {
                format!("{}:{}", prefix, attr.local_part())
            };
            written.push((raw_attr, value));
        }

        write!(self.writer, "<{}", raw)?;
        for (prefix, uri) in &declared {
            if prefix.is_empty() {
                write!(self.writer, " xmlns=\"{}\"", escape_attr(uri))?;
            } else {
                write!(self.writer, " xmlns:{}=\"{}\"", prefix, escape_attr(uri))?;
            }
        }
        for (raw_attr, value) in written {
            write!(self.writer, " {}=\"{}\"", raw_attr, escape_attr(value))?;
        }

        self.open.push(raw);
        self.in_tag = true;
        self.last = Last::Start;
        Ok(())
    }

    fn element_prefix(&mut self, name: &QName, declared: &mut IndexMap<String, String>) -> String {
        let uri = name.namespace_uri();
        if uri.is_empty() {
            if !self.scopes.is_bound("", "") {
                self.bind("", "", declared);
            }
            return String::new();
        }

        let wanted = name.prefix();
        if self.scopes.is_bound(wanted, uri) {
            return wanted.to_string();
        }
        if declared.contains_key(wanted) {
            let prefix = self.scopes.generate_prefix();
            self.bind(&prefix, uri, declared);
            return prefix;
        }
        self.bind(wanted, uri, declared);
        wanted.to_string()
    }

    fn attribute_prefix(&mut self, name: &QName, declared: &mut IndexMap<String, String>) -> String {
        let uri = name.namespace_uri();
        if uri.is_empty() {
            return String::new();
        }

        let wanted = name.prefix();
        if !wanted.is_empty() && self.scopes.is_bound(wanted, uri) {
            return wanted.to_string();
        }
        if let Some(prefix) = self.scopes.prefix_for(uri) {
            return prefix.to_string();
        }
        if !wanted.is_empty() && !declared.contains_key(wanted) {
            self.bind(wanted, uri, declared);
            return wanted.to_string();
        }
        let prefix = self.scopes.generate_prefix();
        self.bind(&prefix, uri, declared);
        prefix
    }

    fn bind(&mut self, prefix: &str, uri: &str, declared: &mut IndexMap<String, String>) {
        self.scopes.declare(prefix, uri);
        declared.insert(prefix.to_string(), uri.to_string());
    }

    /// Closes the innermost open element.
    pub fn end_element(&mut self) -> Result<()> {
        let Some(raw) = self.open.pop() else {
            return Err(Error::structural("no element to close"));
        };

        if self.in_tag {
            self.writer.write_all(b"/>")?;
            self.in_tag = false;
        } else {
            if self.last == Last::End {
                self.write_indent()?;
            }
            write!(self.writer, "</{}>", raw)?;
        }
        self.scopes.pop_scope();
        self.last = Last::End;
        Ok(())
    }

    /// Writes escaped character data into the open element.
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        if self.open.is_empty() {
            return Err(Error::structural("character data outside the root element"));
        }
        if text.is_empty() {
            return Ok(());
        }
        self.close_tag_if_open()?;
        self.writer.write_all(escape_text(text).as_bytes())?;
        self.last = Last::Text;
        Ok(())
    }

    /// Writes a complete element holding only text.
    pub fn write_text_element(
        &mut self,
        name: &QName,
        namespaces: &IndexMap<String, String>,
        attributes: &IndexMap<QName, String>,
        text: &str,
    ) -> Result<()> {
        self.start_element(name, namespaces, attributes)?;
        self.write_text(text)?;
        self.end_element()
    }

    /// Fails if elements are still open, then flushes.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(raw) = self.open.last() {
            return Err(Error::unclosed_tag(raw.clone()));
        }
        self.flush()
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn close_tag_if_open(&mut self) -> Result<()> {
        if self.in_tag {
            self.writer.write_all(b">")?;
            self.in_tag = false;
        }
        Ok(())
    }

    fn write_indent(&mut self) -> Result<()> {
        if let Some(indent) = &self.indent {
            if indent.newlines && !matches!(self.last, Last::Nothing | Last::Declaration) {
                self.writer.write_all(b"\n")?;
            }
            for _ in 0..self.open.len() {
                self.writer.write_all(indent.indent_str.as_bytes())?;
            }
        }
        Ok(())
    }
}
