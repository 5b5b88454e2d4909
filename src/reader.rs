//! Byte-level XML tokenizer.
//!
//! [`XmlReader`] turns a borrowed byte slice into raw [`XmlEvent`]s. It checks
//! well-formedness of names, quoting and tag nesting but knows nothing about
//! namespaces; prefixed names are handed out verbatim and resolved by
//! [`crate::tokens`]. Comments, processing instructions and the document type
//! declaration are consumed silently.

use std::borrow::Cow;

use memchr::{memchr, memchr2};

use crate::error::{Error, ErrorKind, Position, Result};
use crate::escape::unescape;

static IS_WHITESPACE: [bool; 256] = {
    let mut lut = [false; 256];
    lut[b' ' as usize] = true;
    lut[b'\t' as usize] = true;
    lut[b'\n' as usize] = true;
    lut[b'\r' as usize] = true;
    lut
};

static IS_NAME_START: [bool; 256] = {
    let mut lut = [false; 256];
    let mut i = b'A';
    while i <= b'Z' {
        lut[i as usize] = true;
        i += 1;
    }
    let mut i = b'a';
    while i <= b'z' {
        lut[i as usize] = true;
        i += 1;
    }
    lut[b'_' as usize] = true;
    lut[b':' as usize] = true;
    // UTF-8 lead and continuation bytes
    let mut i: usize = 0x80;
    while i < 256 {
        lut[i] = true;
        i += 1;
    }
    lut
};

static IS_NAME_CHAR: [bool; 256] = {
    let mut lut = IS_NAME_START;
    let mut i = b'0';
    while i <= b'9' {
        lut[i as usize] = true;
        i += 1;
    }
    lut[b'-' as usize] = true;
    lut[b'.' as usize] = true;
    lut
};

/// A raw event produced by [`XmlReader`].
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent<'a> {
    /// `<?xml version="1.0" encoding="UTF-8"?>`
    Declaration {
        /// Declared version, `None` if the attribute is absent.
        version: Option<Cow<'a, str>>,
        /// Declared encoding.
        encoding: Option<Cow<'a, str>>,
    },
    /// `<name attr="value">` or `<name attr="value"/>`.
    Start {
        /// Raw (possibly prefixed) element name.
        name: &'a str,
        /// Attributes in document order, including `xmlns` declarations.
        attributes: Vec<Attribute<'a>>,
        /// Whether the tag was self-closing.
        empty: bool,
    },
    /// `</name>`
    End {
        /// Raw element name.
        name: &'a str,
    },
    /// Character data, unescaped. Whitespace-only runs are never reported.
    Text(Cow<'a, str>),
    /// Contents of a CDATA section.
    CData(&'a str),
    /// End of input.
    Eof,
}

/// A raw attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<'a> {
    /// Raw (possibly prefixed) attribute name.
    pub name: &'a str,
    /// Unescaped value.
    pub value: Cow<'a, str>,
}

/// A zero-copy tokenizer over a byte slice.
pub struct XmlReader<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    open: Vec<&'a str>,
}

impl<'a> XmlReader<'a> {
    /// Creates a reader over a string.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &'a str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Creates a reader over raw bytes, which must be UTF-8.
    #[inline]
    pub fn from_bytes(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
            open: Vec::with_capacity(8),
        }
    }

    /// Current position in the input.
    #[inline]
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.col,
            offset: self.pos,
        }
    }

    /// Number of currently open elements.
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Reads the next event.
    pub fn next_event(&mut self) -> Result<XmlEvent<'a>> {
        loop {
            if self.pos >= self.input.len() {
                if let Some(tag) = self.open.pop() {
                    return Err(Error::unclosed_tag(tag).with_position(self.position()));
                }
                return Ok(XmlEvent::Eof);
            }

            let event = if self.input[self.pos] == b'<' {
                self.read_markup()?
            } else {
                self.read_text()?
            };
            if let Some(event) = event {
                return Ok(event);
            }
        }
    }

    fn fail(&self, err: Error) -> Error {
        err.with_position(self.position())
    }

    fn str_at(&self, start: usize, end: usize) -> Result<&'a str> {
        std::str::from_utf8(&self.input[start..end])
            .map_err(|_| self.fail(Error::new(ErrorKind::InvalidUtf8)))
    }

    #[inline]
    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && IS_WHITESPACE[self.input[self.pos] as usize] {
            self.advance(1);
        }
    }

    /// Moves forward `n` bytes, keeping line and column current.
    #[inline]
    fn advance(&mut self, n: usize) {
        let end = (self.pos + n).min(self.input.len());
        for &b in &self.input[self.pos..end] {
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos = end;
    }

    fn read_text(&mut self) -> Result<Option<XmlEvent<'a>>> {
        let start = self.pos;
        let len = memchr(b'<', &self.input[start..]).unwrap_or(self.input.len() - start);
        self.advance(len);

        let raw = &self.input[start..self.pos];
        if raw.iter().all(|&b| IS_WHITESPACE[b as usize]) {
            return Ok(None);
        }
        if self.open.is_empty() {
            return Err(self.fail(Error::syntax("character data outside the root element")));
        }

        let text = self.str_at(start, self.pos)?;
        let text = unescape(text).map_err(|e| self.fail(e))?;
        Ok(Some(XmlEvent::Text(text)))
    }

    fn read_markup(&mut self) -> Result<Option<XmlEvent<'a>>> {
        self.advance(1);
        match self.input.get(self.pos) {
            None => Err(self.fail(Error::unexpected_eof())),
            Some(b'/') => self.read_end().map(Some),
            Some(b'?') => self.read_instruction(),
            Some(b'!') => self.read_bang(),
            Some(_) => self.read_start().map(Some),
        }
    }

    fn read_start(&mut self) -> Result<XmlEvent<'a>> {
        let name = self.read_name()?;
        let attributes = self.read_attributes()?;
        self.skip_whitespace();

        match self.input.get(self.pos) {
            Some(b'/') => {
                self.advance(1);
                self.expect(b'>')?;
                Ok(XmlEvent::Start { name, attributes, empty: true })
            }
            Some(b'>') => {
                self.advance(1);
                self.open.push(name);
                Ok(XmlEvent::Start { name, attributes, empty: false })
            }
            Some(_) => Err(self.fail(Error::syntax("expected '>' or '/>'"))),
            None => Err(self.fail(Error::unexpected_eof())),
        }
    }

    fn read_end(&mut self) -> Result<XmlEvent<'a>> {
        self.advance(1);
        let name = self.read_name()?;
        self.skip_whitespace();
        self.expect(b'>')?;

        match self.open.pop() {
            Some(expected) if expected == name => Ok(XmlEvent::End { name }),
            Some(expected) => Err(self.fail(Error::mismatched_tag(expected, name))),
            None => Err(self.fail(Error::syntax(format!("unexpected closing tag: {}", name)))),
        }
    }

    /// `<?xml ...?>` yields a declaration; other instructions are skipped.
    fn read_instruction(&mut self) -> Result<Option<XmlEvent<'a>>> {
        self.advance(1);
        let target = self.read_name()?;

        if target.eq_ignore_ascii_case("xml") {
            let attributes = self.read_attributes()?;
            self.skip_whitespace();
            self.expect(b'?')?;
            self.expect(b'>')?;

            let mut version = None;
            let mut encoding = None;
            for attr in attributes {
                match attr.name {
                    "version" => version = Some(attr.value),
                    "encoding" => encoding = Some(attr.value),
                    _ => {}
                }
            }
            return Ok(Some(XmlEvent::Declaration { version, encoding }));
        }

        self.skip_past(b"?>", "unterminated processing instruction")?;
        Ok(None)
    }

    fn read_bang(&mut self) -> Result<Option<XmlEvent<'a>>> {
        self.advance(1);
        let rest = &self.input[self.pos..];

        if rest.starts_with(b"--") {
            self.advance(2);
            self.skip_past(b"-->", "unterminated comment")?;
            Ok(None)
        } else if rest.starts_with(b"[CDATA[") {
            self.advance(7);
            let start = self.pos;
            let end = self.skip_past(b"]]>", "unterminated CDATA section")?;
            if self.open.is_empty() {
                return Err(self.fail(Error::syntax("CDATA outside the root element")));
            }
            Ok(Some(XmlEvent::CData(self.str_at(start, end)?)))
        } else if rest.starts_with(b"DOCTYPE") {
            self.skip_doctype();
            Ok(None)
        } else {
            Err(self.fail(Error::syntax("unknown construct after '<!'")))
        }
    }

    /// Advances past `terminator`, returning the offset where it started.
    fn skip_past(&mut self, terminator: &[u8], what: &str) -> Result<usize> {
        let first = terminator[0];
        loop {
            let Some(offset) = memchr(first, &self.input[self.pos..]) else {
                self.advance(self.input.len() - self.pos);
                return Err(self.fail(Error::syntax(what)));
            };
            let at = self.pos + offset;
            if self.input[at..].starts_with(terminator) {
                self.advance(offset + terminator.len());
                return Ok(at);
            }
            self.advance(offset + 1);
        }
    }

    fn skip_doctype(&mut self) {
        let mut depth = 1usize;
        while depth > 0 {
            let Some(offset) = memchr2(b'<', b'>', &self.input[self.pos..]) else {
                self.advance(self.input.len() - self.pos);
                return;
            };
            self.advance(offset);
            if self.input[self.pos] == b'<' {
                depth += 1;
            } else {
                depth -= 1;
            }
            self.advance(1);
        }
    }

    fn read_name(&mut self) -> Result<&'a str> {
        let start = self.pos;
        match self.input.get(self.pos) {
            None => return Err(self.fail(Error::unexpected_eof())),
            Some(&b) if !IS_NAME_START[b as usize] => {
                return Err(self.fail(Error::invalid_name(format!(
                    "invalid name start character: {:?}",
                    b as char
                ))))
            }
            Some(_) => {}
        }
        let len = self.input[start..]
            .iter()
            .take_while(|&&b| IS_NAME_CHAR[b as usize])
            .count();
        self.advance(len);
        self.str_at(start, self.pos)
    }

    fn read_attributes(&mut self) -> Result<Vec<Attribute<'a>>> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.input.get(self.pos) {
                None | Some(b'>') | Some(b'/') | Some(b'?') => return Ok(attributes),
                Some(_) => {}
            }

            let name = self.read_name()?;
            if attributes.iter().any(|a: &Attribute<'a>| a.name == name) {
                return Err(self.fail(Error::syntax(format!("duplicate attribute: {}", name))));
            }
            self.skip_whitespace();
            self.expect(b'=')?;
            self.skip_whitespace();
            let value = self.read_attribute_value()?;
            attributes.push(Attribute { name, value });
        }
    }

    fn read_attribute_value(&mut self) -> Result<Cow<'a, str>> {
        let quote = match self.input.get(self.pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            Some(_) => return Err(self.fail(Error::syntax("expected quote"))),
            None => return Err(self.fail(Error::unexpected_eof())),
        };
        self.advance(1);

        let start = self.pos;
        let Some(offset) = memchr(quote, &self.input[start..]) else {
            return Err(self.fail(Error::syntax("unterminated attribute value")));
        };
        let raw = self.str_at(start, start + offset)?;
        self.advance(offset + 1);
        unescape(raw).map_err(|e| self.fail(e))
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.input.get(self.pos) {
            Some(&b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(&b) => Err(self.fail(Error::syntax(format!(
                "expected '{}', found '{}'",
                expected as char, b as char
            )))),
            None => Err(self.fail(Error::unexpected_eof())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Vec<XmlEvent<'_>> {
        let mut reader = XmlReader::from_str(xml);
        let mut events = Vec::new();
        loop {
            match reader.next_event().unwrap() {
                XmlEvent::Eof => return events,
                event => events.push(event),
            }
        }
    }

    #[test]
    fn test_start_and_end() {
        let events = collect("<root></root>");
        assert_eq!(
            events,
            vec![
                XmlEvent::Start { name: "root", attributes: vec![], empty: false },
                XmlEvent::End { name: "root" },
            ]
        );
    }

    #[test]
    fn test_empty_element_with_attributes() {
        let events = collect(r#"<root id="1" name='test'/>"#);
        match &events[0] {
            XmlEvent::Start { name, attributes, empty } => {
                assert_eq!(*name, "root");
                assert!(*empty);
                assert_eq!(attributes.len(), 2);
                assert_eq!(attributes[1].name, "name");
                assert_eq!(attributes[1].value, "test");
            }
            other => panic!("expected Start, got {:?}", other),
        }
    }

    #[test]
    fn test_text_is_not_trimmed() {
        let events = collect("<root>  Hello &amp; bye </root>");
        assert_eq!(events[1], XmlEvent::Text(Cow::Borrowed("  Hello & bye ")));
    }

    #[test]
    fn test_whitespace_runs_are_skipped() {
        let events = collect("<a>\n  <b/>\n</a>\n");
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_declaration() {
        let events = collect(r#"<?xml version="1.1" encoding="ISO-8859-1"?><root/>"#);
        assert_eq!(
            events[0],
            XmlEvent::Declaration {
                version: Some(Cow::Borrowed("1.1")),
                encoding: Some(Cow::Borrowed("ISO-8859-1")),
            }
        );
    }

    #[test]
    fn test_comments_instructions_and_doctype_skipped() {
        let xml = "<!DOCTYPE root [<!ELEMENT root ANY>]><!-- c --><?pi data?><root><!-- x --></root>";
        let events = collect(xml);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_cdata() {
        let events = collect("<root><![CDATA[<special>]]></root>");
        assert_eq!(events[1], XmlEvent::CData("<special>"));
    }

    #[test]
    fn test_mismatched_tags() {
        let mut reader = XmlReader::from_str("<root></wrong>");
        reader.next_event().unwrap();
        let err = reader.next_event().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MismatchedTag { .. }));
        assert!(err.position().is_some());
    }

    #[test]
    fn test_unclosed_tag() {
        let mut reader = XmlReader::from_str("<root>");
        reader.next_event().unwrap();
        assert!(matches!(reader.next_event().unwrap_err().kind(), ErrorKind::UnclosedTag(_)));
    }

    #[test]
    fn test_duplicate_attribute() {
        let mut reader = XmlReader::from_str(r#"<root a="1" a="2"/>"#);
        assert!(reader.next_event().is_err());
    }

    #[test]
    fn test_position_and_depth() {
        let mut reader = XmlReader::from_str("<a>\n  <b>\n</b></a>");
        reader.next_event().unwrap();
        assert_eq!(reader.depth(), 1);
        reader.next_event().unwrap();
        assert_eq!(reader.depth(), 2);
        assert_eq!(reader.position().line, 2);
    }
}
