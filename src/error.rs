//! Error types for tree building, marshalling and unmarshalling.
//!
//! Every failure raised by the crate is an [`Error`]. Errors fall into one of
//! four [`ErrorCategory`] buckets: bad arguments or configuration
//! (validation), violations of the tree shape (structural), failures while
//! converting objects or tags (conversion), and failures of the underlying
//! XML stream (stream).

use std::fmt::{self, Display};
use std::io;

/// Result type alias for adaptive_xml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for every fallible operation in the crate.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    position: Option<Position>,
}

/// Position information for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
    /// Byte offset from start.
    pub offset: usize,
}

/// Broad classification of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid argument or configuration.
    Validation,
    /// Violation of a tree invariant or of the token sequence.
    Structural,
    /// Failure while converting between objects and tags.
    Conversion,
    /// Failure reported by the XML reader or writer.
    Stream,
}

/// The kind of error that occurred.
#[derive(Debug)]
pub enum ErrorKind {
    /// Invalid argument, mapping or configuration.
    Validation(String),
    /// Tree or token sequence invariant violated.
    Structural(String),
    /// Converter failure or null dependent.
    Conversion(String),
    /// A converter was handed an object it does not accept.
    ConverterMismatch {
        /// Type name of the object.
        object: String,
        /// Type name of the converter.
        converter: String,
    },
    /// An I/O error occurred.
    Io(io::Error),
    /// Unexpected end of input.
    UnexpectedEof,
    /// Invalid XML syntax.
    Syntax(String),
    /// Invalid XML name.
    InvalidName(String),
    /// Unclosed tag.
    UnclosedTag(String),
    /// Mismatched closing tag.
    MismatchedTag {
        /// The expected tag name.
        expected: String,
        /// The actual tag name found.
        found: String,
    },
    /// Invalid escape sequence.
    InvalidEscape(String),
    /// Invalid UTF-8.
    InvalidUtf8,
    /// Unbound namespace prefix.
    UnboundPrefix(String),
    /// Custom error message.
    Custom(String),
}

impl ErrorKind {
    /// Returns the category this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::Validation(_) => ErrorCategory::Validation,
            ErrorKind::Structural(_) => ErrorCategory::Structural,
            ErrorKind::Conversion(_)
            | ErrorKind::ConverterMismatch { .. }
            | ErrorKind::Custom(_) => ErrorCategory::Conversion,
            ErrorKind::Io(_)
            | ErrorKind::UnexpectedEof
            | ErrorKind::Syntax(_)
            | ErrorKind::InvalidName(_)
            | ErrorKind::UnclosedTag(_)
            | ErrorKind::MismatchedTag { .. }
            | ErrorKind::InvalidEscape(_)
            | ErrorKind::InvalidUtf8
            | ErrorKind::UnboundPrefix(_) => ErrorCategory::Stream,
        }
    }
}

impl Error {
    /// Creates a new error with the given kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, position: None }
    }

    /// Creates a new error with position information.
    #[inline]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the category of this error.
    #[inline]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the position where the error occurred.
    #[inline]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Creates a validation error.
    #[inline]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Validation(msg.into()))
    }

    /// Creates a structural error.
    #[inline]
    pub fn structural<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Structural(msg.into()))
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Conversion(msg.into()))
    }

    /// Creates a converter mismatch error.
    #[inline]
    pub fn converter_mismatch<S: Into<String>>(object: S, converter: S) -> Self {
        Self::new(ErrorKind::ConverterMismatch {
            object: object.into(),
            converter: converter.into(),
        })
    }

    /// Creates an unexpected EOF error.
    #[inline]
    pub fn unexpected_eof() -> Self {
        Self::new(ErrorKind::UnexpectedEof)
    }

    /// Creates a syntax error.
    #[inline]
    pub fn syntax<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Syntax(msg.into()))
    }

    /// Creates an invalid name error.
    #[inline]
    pub fn invalid_name<S: Into<String>>(name: S) -> Self {
        Self::new(ErrorKind::InvalidName(name.into()))
    }

    /// Creates an unclosed tag error.
    #[inline]
    pub fn unclosed_tag<S: Into<String>>(tag: S) -> Self {
        Self::new(ErrorKind::UnclosedTag(tag.into()))
    }

    /// Creates a mismatched tag error.
    #[inline]
    pub fn mismatched_tag<S: Into<String>>(expected: S, found: S) -> Self {
        Self::new(ErrorKind::MismatchedTag {
            expected: expected.into(),
            found: found.into(),
        })
    }

    /// Creates an invalid escape error.
    #[inline]
    pub fn invalid_escape<S: Into<String>>(seq: S) -> Self {
        Self::new(ErrorKind::InvalidEscape(seq.into()))
    }

    /// Creates an unbound prefix error.
    #[inline]
    pub fn unbound_prefix<S: Into<String>>(prefix: S) -> Self {
        Self::new(ErrorKind::UnboundPrefix(prefix.into()))
    }

    /// Creates a custom error.
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Custom(msg.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Validation(msg) => write!(f, "validation error: {}", msg),
            ErrorKind::Structural(msg) => write!(f, "structural error: {}", msg),
            ErrorKind::Conversion(msg) => write!(f, "conversion error: {}", msg),
            ErrorKind::ConverterMismatch { object, converter } => write!(
                f,
                "conversion error: object of type {} is not compatible with converter {}",
                object, converter
            ),
            ErrorKind::Io(e) => write!(f, "I/O error: {}", e),
            ErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            ErrorKind::Syntax(msg) => write!(f, "syntax error: {}", msg),
            ErrorKind::InvalidName(name) => write!(f, "invalid XML name: {}", name),
            ErrorKind::UnclosedTag(tag) => write!(f, "unclosed tag: <{}>", tag),
            ErrorKind::MismatchedTag { expected, found } => {
                write!(f, "mismatched closing tag: expected </{}>, found </{}>", expected, found)
            }
            ErrorKind::InvalidEscape(seq) => write!(f, "invalid escape sequence: {}", seq),
            ErrorKind::InvalidUtf8 => write!(f, "invalid UTF-8"),
            ErrorKind::UnboundPrefix(prefix) => write!(f, "unbound namespace prefix: {}", prefix),
            ErrorKind::Custom(msg) => write!(f, "{}", msg),
        }?;

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {} (offset {})", pos.line, pos.column, pos.offset)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::Io(e))
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::custom(msg.to_string())
    }
}
