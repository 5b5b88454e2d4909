//! Namespace-resolved token stream.
//!
//! [`TokenStream`] wraps [`XmlReader`] and hands out owned [`Token`]s whose
//! names are resolved against the in-scope namespace declarations.
//! Self-closing elements are reported as a start token followed by an end
//! token. The stream also enforces document-level sequencing: exactly one
//! root element, a declaration only at the very start, nothing read after the
//! end of the document.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::namespace::NamespaceScopes;
use crate::qname::QName;
use crate::reader::{Attribute, XmlEvent, XmlReader};

/// A namespace-resolved structural token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An element was opened.
    StartElement {
        /// Resolved element name.
        name: QName,
        /// Attributes other than namespace declarations.
        attributes: IndexMap<QName, String>,
        /// Namespace declarations made on this element (prefix -> uri).
        namespaces: IndexMap<String, String>,
    },
    /// An element was closed.
    EndElement {
        /// Resolved element name.
        name: QName,
    },
    /// Non-whitespace character data.
    Characters(String),
    /// The root element has been closed and the input is exhausted.
    EndDocument,
}

/// Pull-based stream of [`Token`]s with one token of lookahead.
pub struct TokenStream<'a> {
    reader: XmlReader<'a>,
    scopes: NamespaceScopes,
    peeked: Option<Token>,
    pending_end: Option<QName>,
    version: Option<String>,
    encoding: Option<String>,
    seen_root: bool,
    seen_content: bool,
    finished: bool,
}

impl<'a> TokenStream<'a> {
    /// Creates a stream over UTF-8 input.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            reader: XmlReader::from_bytes(input),
            scopes: NamespaceScopes::new(),
            peeked: None,
            pending_end: None,
            version: None,
            encoding: None,
            seen_root: false,
            seen_content: false,
            finished: false,
        }
    }

    /// Version from the XML declaration, if one has been read.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Encoding from the XML declaration, if one has been read.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Looks at the next token without consuming it.
    pub fn peek(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            let token = self.read()?;
            self.peeked = Some(token);
        }
        match &self.peeked {
            Some(token) => Ok(token),
            None => Err(Error::structural("token lookahead lost")),
        }
    }

    /// Consumes the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.read(),
        }
    }

    fn read(&mut self) -> Result<Token> {
        if let Some(name) = self.pending_end.take() {
            self.scopes.pop_scope();
            return Ok(Token::EndElement { name });
        }
        if self.finished {
            return Err(Error::structural("read past the end of the document"));
        }

        loop {
            match self.reader.next_event()? {
                XmlEvent::Declaration { version, encoding } => {
                    if self.seen_content {
                        return Err(self.structural("XML declaration after document content"));
                    }
                    self.version = version.map(|v| v.into_owned());
                    self.encoding = encoding.map(|e| e.into_owned());
                    self.seen_content = true;
                }
                XmlEvent::Start { name, attributes, empty } => {
                    if self.reader.depth() == usize::from(!empty) && self.seen_root {
                        return Err(self.structural("more than one root element"));
                    }
                    self.seen_root = true;
                    self.seen_content = true;
                    let token = self.start(name, attributes)?;
                    if empty {
                        if let Token::StartElement { name, .. } = &token {
                            self.pending_end = Some(name.clone());
                        }
                    }
                    return Ok(token);
                }
                XmlEvent::End { name } => {
                    let name = self.resolve_element(name)?;
                    self.scopes.pop_scope();
                    return Ok(Token::EndElement { name });
                }
                XmlEvent::Text(text) => return Ok(Token::Characters(text.into_owned())),
                XmlEvent::CData(text) => return Ok(Token::Characters(text.to_string())),
                XmlEvent::Eof => {
                    if !self.seen_root {
                        return Err(self.structural("document has no root element"));
                    }
                    self.finished = true;
                    return Ok(Token::EndDocument);
                }
            }
        }
    }

    fn structural(&self, msg: &str) -> Error {
        Error::structural(msg).with_position(self.reader.position())
    }

    fn start(&mut self, raw: &str, attributes: Vec<Attribute<'_>>) -> Result<Token> {
        self.scopes.push_scope();

        let mut namespaces = IndexMap::new();
        for attr in &attributes {
            let prefix = if attr.name == "xmlns" {
                ""
            } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                prefix
            } else {
                continue;
            };
            self.scopes.declare(prefix, &attr.value);
            namespaces.insert(prefix.to_string(), attr.value.to_string());
        }

        let name = self.resolve_element(raw)?;

        let mut resolved = IndexMap::with_capacity(attributes.len());
        for attr in attributes {
            if attr.name == "xmlns" || attr.name.starts_with("xmlns:") {
                continue;
            }
            let key = match attr.name.split_once(':') {
                Some((prefix, local)) => {
                    let uri = self.lookup(prefix)?;
                    QName::with_prefix(uri, local, prefix)
                }
                None => QName::local(attr.name),
            };
            resolved.insert(key, attr.value.into_owned());
        }

        Ok(Token::StartElement {
            name,
            attributes: resolved,
            namespaces,
        })
    }

    fn resolve_element(&self, raw: &str) -> Result<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => Ok(QName::with_prefix(self.lookup(prefix)?, local, prefix)),
            None => Ok(QName::new(self.scopes.resolve("").unwrap_or_default(), raw)),
        }
    }

    fn lookup(&self, prefix: &str) -> Result<String> {
        self.scopes
            .resolve(prefix)
            .map(str::to_string)
            .ok_or_else(|| Error::unbound_prefix(prefix).with_position(self.reader.position()))
    }
}
