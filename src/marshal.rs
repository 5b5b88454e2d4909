//! Object graph to XML.
//!
//! The [`Marshaller`] walks an object graph along a registered
//! [`MappingNode`] tree and produces a tag tree, then streams that tree out
//! through the namespace-repairing [`XmlWriter`]. Both walks use explicit
//! work stacks, so neither the depth of the object graph nor the depth of
//! the tag tree is limited by the call stack.
//!
//! Collections are wrapped in a `list` tag holding one tag per element. Maps
//! are wrapped in a `map` tag holding one `entry` per key:
//!
//! ```text
//! <map>
//!   <entry><key>k</key><value>...converted value...</value></entry>
//! </map>
//! ```

use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;
use std::vec;

use tracing::{debug, trace};

use crate::cache::{Mapped, MappingCache};
use crate::config::WriterConfig;
use crate::convert::ConvertedTags;
use crate::document::Document;
use crate::error::{Error, ErrorCategory, ErrorKind, Result};
use crate::mapping::{MappingNode, MappingType};
use crate::object::{IntoValue, Object, Value};
use crate::tag::{CompositeTag, SimpleTag, Tag};
use crate::writer::XmlWriter;

/// Name of the tag wrapping a collection.
pub const LIST_TAG: &str = "list";
/// Name of the tag wrapping a map.
pub const MAP_TAG: &str = "map";
/// Name of the tag holding one map entry.
pub const ENTRY_TAG: &str = "entry";
/// Name of the simple tag holding an entry's key.
pub const KEY_TAG: &str = "key";
/// Name of the tag holding an entry's converted value.
pub const VALUE_TAG: &str = "value";

/// Converts object graphs to XML according to a mapping tree.
///
/// ```
/// use std::sync::Arc;
/// use adaptive_xml::{Marshaller, MappingNode, TextConverter, Value, WriterConfig};
///
/// let mut marshaller = Marshaller::new().with_config(WriterConfig::new().with_declaration(false));
/// marshaller
///     .register_mapping(MappingNode::object(Arc::new(TextConverter::<String>::new("greeting"))))
///     .unwrap();
///
/// let xml = marshaller.marshal_to_string(Value::object(String::from("hi"))).unwrap();
/// assert_eq!(xml, "<greeting>hi</greeting>");
/// ```
#[derive(Debug, Default)]
pub struct Marshaller {
    mapping: Option<MappingNode>,
    cache: Arc<MappingCache>,
    config: WriterConfig,
}

impl Marshaller {
    /// Creates a marshaller with no mapping and a private template cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the output configuration.
    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a template cache shared with other marshallers.
    pub fn with_cache(mut self, cache: Arc<MappingCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The output configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Registers the mapping tree used for every following call.
    ///
    /// The root may be of any type, so a bare collection or map can be
    /// marshalled; the whole tree must pass [`MappingNode::validate`].
    pub fn register_mapping(&mut self, mapping: MappingNode) -> Result<()> {
        mapping.validate()?;
        debug!(root = %mapping.mapping_type(), "registered marshalling mapping");
        self.mapping = Some(mapping);
        Ok(())
    }

    /// A copy of the registered mapping tree.
    pub fn registered_mapping(&self) -> Option<MappingNode> {
        self.mapping.as_ref().map(MappingNode::copy)
    }

    /// Builds the mapping tree `T` describes, without registering it.
    pub fn create_mapping<T: Mapped + 'static>(&self) -> Result<MappingNode> {
        self.cache.mapping_for::<T>()
    }

    /// Builds and registers the mapping tree `T` describes.
    pub fn register<T: Mapped + 'static>(&mut self) -> Result<()> {
        let mapping = self.create_mapping::<T>()?;
        self.register_mapping(mapping)
    }

    /// Converts `value` to a tag tree.
    pub fn tree_from_object<V: IntoValue>(&self, value: V) -> Result<Tag> {
        let Some(mapping) = &self.mapping else {
            return Err(Error::validation("no mapping registered for the root object"));
        };
        let value = value.into_value()?;
        debug!(root = value.kind(), "marshalling object graph");
        let tag = build_tree(value, mapping)?;
        debug!(root = %tag.name(), "object graph converted");
        Ok(tag)
    }

    /// Converts `value` and writes it to `out`.
    pub fn marshal<V: IntoValue, W: Write>(&self, value: V, out: W) -> Result<()> {
        let tag = self.tree_from_object(value)?;
        let mut writer = self.config.writer(out);
        if self.config.declaration {
            writer.write_declaration(&self.config.version, Some(&self.config.encoding))?;
        }
        write_tree(&mut writer, &tag)?;
        writer.finish()
    }

    /// Converts `value` to an XML string.
    pub fn marshal_to_string<V: IntoValue>(&self, value: V) -> Result<String> {
        let mut out = Vec::new();
        self.marshal(value, &mut out)?;
        String::from_utf8(out).map_err(|_| Error::new(ErrorKind::InvalidUtf8))
    }

    /// Writes a tag tree with the document's declaration.
    pub fn save_tree_model<W: Write>(&self, document: &Document, out: W) -> Result<()> {
        let Some(root) = document.root() else {
            return Err(Error::validation("document has no root tag"));
        };
        if root.name().is_empty() {
            return Err(Error::validation("root tag must have a non-empty name"));
        }

        let mut writer = self.config.writer(out);
        if self.config.declaration {
            writer.write_declaration(document.version(), Some(document.encoding()))?;
        }
        write_tree(&mut writer, &Tag::Composite(root.clone()))?;
        writer.finish()?;
        debug!(root = %root.name(), "tree model saved");
        Ok(())
    }

    /// Writes a tag tree to an XML string.
    pub fn tree_model_to_string(&self, document: &Document) -> Result<String> {
        let mut out = Vec::new();
        self.save_tree_model(document, &mut out)?;
        String::from_utf8(out).map_err(|_| Error::new(ErrorKind::InvalidUtf8))
    }
}

enum State {
    Object {
        object: Rc<dyn Object>,
        next: usize,
        children: ConvertedTags,
    },
    Collection {
        items: vec::IntoIter<Value>,
        wrapper: Option<CompositeTag>,
    },
    Map {
        entries: vec::IntoIter<(String, Value)>,
        wrapper: Option<CompositeTag>,
        key: Option<String>,
    },
}

enum Step<'m> {
    Descend(Value, &'m MappingNode),
    Complete(Tag),
}

struct Frame<'m> {
    mapping: &'m MappingNode,
    state: State,
}

impl<'m> Frame<'m> {
    fn open(value: Value, mapping: &'m MappingNode, ancestors: &[Frame<'m>]) -> Result<Self> {
        let state = match (mapping.mapping_type(), value) {
            (_, Value::Null) => return Err(null_value(mapping, ancestors)),
            (MappingType::Object, Value::Object(object)) => State::Object {
                object,
                next: 0,
                children: ConvertedTags::new(),
            },
            (MappingType::Collection, Value::Collection(items)) => State::Collection {
                items: items.into_iter(),
                wrapper: None,
            },
            (MappingType::Map, Value::Map(entries)) => State::Map {
                entries: entries.into_iter(),
                wrapper: None,
                key: None,
            },
            (expected, value) => {
                return Err(Error::conversion(format!(
                    "accessor '{}' returned a {} where a {} mapping is registered",
                    mapping.accessor_name(),
                    value.kind(),
                    expected
                )))
            }
        };
        Ok(Self { mapping, state })
    }

    fn advance(&mut self) -> Result<Step<'m>> {
        let mapping = self.mapping;
        match &mut self.state {
            State::Object { object, next, children } => {
                if let Some((accessor, dependent)) = mapping.mapping_at(*next) {
                    *next += 1;
                    let value = object.access(accessor).map_err(|err| {
                        into_conversion(err, || {
                            format!("accessor '{}' of {} failed", accessor, object.type_name())
                        })
                    })?;
                    trace!(accessor, kind = value.kind(), "descending into dependent");
                    return Ok(Step::Descend(value, dependent));
                }

                let Some(converter) = mapping.converter() else {
                    return Err(Error::conversion(format!(
                        "no converter registered for {}",
                        object.type_name()
                    )));
                };
                let tag = converter.convert(&**object, children).map_err(|err| {
                    into_conversion(err, || {
                        format!(
                            "converter {} failed for {}",
                            converter.describe(),
                            object.type_name()
                        )
                    })
                })?;
                Ok(Step::Complete(tag))
            }
            State::Collection { items, wrapper } => match items.next() {
                Some(item) => Ok(Step::Descend(item, container(mapping)?)),
                None => Ok(Step::Complete(
                    wrapper.take().unwrap_or_else(|| CompositeTag::new(LIST_TAG)).into(),
                )),
            },
            State::Map { entries, wrapper, key } => match entries.next() {
                Some((entry_key, value)) => {
                    *key = Some(entry_key);
                    Ok(Step::Descend(value, container(mapping)?))
                }
                None => Ok(Step::Complete(
                    wrapper.take().unwrap_or_else(|| CompositeTag::new(MAP_TAG)).into(),
                )),
            },
        }
    }

    fn merge(&mut self, accessor: &str, tag: Tag) -> Result<()> {
        match &mut self.state {
            State::Object { children, .. } => {
                children.insert(accessor.to_string(), tag);
            }
            State::Collection { wrapper, .. } => {
                wrapper
                    .get_or_insert_with(|| CompositeTag::new(LIST_TAG))
                    .add_tag(tag)?;
            }
            State::Map { wrapper, key, .. } => {
                let Some(key) = key.take() else {
                    return Err(Error::conversion(format!(
                        "map value for accessor '{}' arrived without its key",
                        accessor
                    )));
                };
                let entry = CompositeTag::new(ENTRY_TAG);
                entry.add_tag(SimpleTag::with_value(KEY_TAG, key).into())?;
                let value = CompositeTag::new(VALUE_TAG);
                value.add_tag(tag)?;
                entry.add_tag(value.into())?;
                wrapper
                    .get_or_insert_with(|| CompositeTag::new(MAP_TAG))
                    .add_tag(entry.into())?;
            }
        }
        Ok(())
    }
}

fn build_tree(root: Value, mapping: &MappingNode) -> Result<Tag> {
    if root.is_null() {
        return Err(Error::validation("cannot marshal a null root object"));
    }

    let mut stack = vec![Frame::open(root, mapping, &[])?];
    loop {
        let Some(top) = stack.last_mut() else {
            return Err(Error::conversion("marshalling stack underflow"));
        };
        match top.advance()? {
            Step::Descend(value, dependent) => {
                let frame = Frame::open(value, dependent, &stack)?;
                stack.push(frame);
            }
            Step::Complete(tag) => {
                let Some(done) = stack.pop() else {
                    return Err(Error::conversion("marshalling stack underflow"));
                };
                match stack.last_mut() {
                    None => return Ok(tag),
                    Some(parent) => parent.merge(done.mapping.accessor_name(), tag)?,
                }
            }
        }
    }
}

fn container(mapping: &MappingNode) -> Result<&MappingNode> {
    mapping.container_mapping().ok_or_else(|| {
        Error::validation(format!(
            "{} mapping at '{}' has no container mapping",
            mapping.mapping_type(),
            mapping.accessor_name()
        ))
    })
}

/// Error for a null value, naming the accessor and the nearest object that
/// owns it.
fn null_value(mapping: &MappingNode, ancestors: &[Frame<'_>]) -> Error {
    let owner = ancestors
        .iter()
        .rev()
        .find_map(|frame| match &frame.state {
            State::Object { object, .. } => Some(object.type_name()),
            _ => None,
        })
        .unwrap_or("<root>");
    Error::conversion(format!(
        "accessor '{}' of {} returned null, or a collection or map containing null",
        mapping.accessor_name(),
        owner
    ))
}

fn into_conversion(err: Error, context: impl FnOnce() -> String) -> Error {
    if err.category() == ErrorCategory::Conversion {
        err
    } else {
        Error::conversion(format!("{}: {}", context(), err))
    }
}

fn write_simple<W: Write>(writer: &mut XmlWriter<W>, tag: &SimpleTag) -> Result<()> {
    writer.write_text_element(&tag.name(), &tag.namespaces(), &tag.attributes(), &tag.value())
}

fn write_tree<W: Write>(writer: &mut XmlWriter<W>, root: &Tag) -> Result<()> {
    let root = match root {
        Tag::Simple(simple) => return write_simple(writer, simple),
        Tag::Composite(composite) => composite,
    };

    writer.start_element(&root.name(), &root.namespaces(), &root.attributes())?;
    let mut stack = vec![(root.clone(), 0usize)];
    while let Some((current, index)) = stack.last_mut() {
        let child = current.child_at(*index);
        *index += 1;
        match child {
            None => {
                writer.end_element()?;
                stack.pop();
            }
            Some(Tag::Simple(simple)) => write_simple(writer, &simple)?,
            Some(Tag::Composite(composite)) => {
                writer.start_element(&composite.name(), &composite.namespaces(), &composite.attributes())?;
                stack.push((composite, 0));
            }
        }
    }
    Ok(())
}
