//! # adaptive_xml
//!
//! Bidirectional conversion between object graphs and a namespace-aware XML
//! tree model.
//!
//! ## Features
//!
//! - An in-memory tree of simple and composite tags that keeps document order
//! - Marshalling driven by a mapping tree of converters, with collections and
//!   maps wrapped in `list` and `map` tags
//! - Streaming unmarshalling that only materializes subtrees with a
//!   registered converter, reusing tag instances across subtrees
//! - Namespace-repairing output and full qualified-name handling on input
//! - Explicit work stacks everywhere, so deep documents never overflow the
//!   call stack
//!
//! ## Quick Start
//!
//! ```rust
//! use adaptive_xml::{
//!     fn_converter, CompositeTag, ConvertedObjects, Marshaller, MappingNode, QName,
//!     TextConverter, Unmarshaller, Value, WriterConfig,
//! };
//! use std::sync::Arc;
//!
//! // Object graph to XML
//! let mut marshaller = Marshaller::new().with_config(WriterConfig::new().with_declaration(false));
//! let item = MappingNode::object(Arc::new(TextConverter::<String>::new("item")));
//! marshaller
//!     .register_mapping(MappingNode::collection().with_container(item).unwrap())
//!     .unwrap();
//! let xml = marshaller
//!     .marshal_to_string(vec![Value::object(String::from("a")), Value::object(String::from("b"))])
//!     .unwrap();
//! assert_eq!(xml, "<list><item>a</item><item>b</item></list>");
//!
//! // XML to values
//! let mut unmarshaller = Unmarshaller::new();
//! unmarshaller.register_converter(
//!     "pair",
//!     fn_converter(|tag: &CompositeTag, _: &ConvertedObjects| Ok(tag.child_count())),
//! );
//! let objects = unmarshaller
//!     .unmarshal_str("<doc><pair><a/><b/></pair><other/></doc>")
//!     .unwrap();
//! assert_eq!(objects.get::<usize>(&QName::local("pair")), Some(&2));
//! ```
//!
//! ## Tree Model
//!
//! ```rust
//! use adaptive_xml::{Marshaller, Unmarshaller};
//!
//! let document = Unmarshaller::new()
//!     .tree_model_from_str(r#"<a xmlns:x="urn:x"><x:b>1</x:b><c><d/></c></a>"#)
//!     .unwrap();
//! let root = document.root().unwrap();
//! assert_eq!(root.child_count(), 2);
//!
//! let xml = Marshaller::new().tree_model_to_string(&document).unwrap();
//! assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cache;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod escape;
pub mod mapping;
pub mod marshal;
pub mod namespace;
pub mod object;
pub mod order;
pub mod pool;
pub mod qname;
pub mod reader;
pub mod tag;
pub mod text;
pub mod tokens;
pub mod unmarshal;
pub mod writer;

// Re-export main types and functions
pub use cache::{Dependents, Mapped, MappedType, MappingCache, Shape};
pub use config::{UnmarshalConfig, WriterConfig};
pub use convert::{
    fn_converter, typed_converter, ConvertedObjects, ConvertedTags, FnConverter, MarshalConverter,
    TextConverter, TypedConverter, UnmarshalConverter,
};
pub use document::{Document, DEFAULT_ENCODING, DEFAULT_VERSION};
pub use error::{Error, ErrorCategory, ErrorKind, Position, Result};
pub use escape::{escape_attr, escape_text, unescape};
pub use mapping::{MappingNode, MappingType};
pub use marshal::{Marshaller, ENTRY_TAG, KEY_TAG, LIST_TAG, MAP_TAG, VALUE_TAG};
pub use namespace::NamespaceScopes;
pub use object::{AsAny, IntoValue, Object, Value};
pub use order::Order;
pub use pool::TagPool;
pub use qname::QName;
pub use reader::{Attribute, XmlEvent, XmlReader};
pub use tag::{CompositeTag, SimpleTag, Tag};
pub use text::to_text;
pub use tokens::{Token, TokenStream};
pub use unmarshal::Unmarshaller;
pub use writer::{IndentConfig, XmlWriter};
