//! The mapping meta-model driving the marshaller.
//!
//! A [`MappingNode`] describes how the value found at one accessor path is
//! decomposed. An `Object` node carries the converter for the object and one
//! child mapping per dependent accessor. A `Collection` or `Map` node carries
//! a container mapping describing its elements (or values); container
//! mappings may nest but always end in an `Object` node with a converter.
//!
//! Nodes own their children, so attaching a node moves it: it can never be
//! reachable from two parents. `Clone` (and [`MappingNode::copy`]) is a full
//! deep copy; converters are shared.
//!
//! ```
//! use adaptive_xml::{typed_converter, ConvertedTags, MappingNode, SimpleTag};
//!
//! let item = MappingNode::object(typed_converter(|v: &String, _: &mut ConvertedTags| {
//!     Ok(SimpleTag::with_value("item", v.as_str()).into())
//! }));
//! let list = MappingNode::collection().with_container(item).unwrap();
//! assert!(list.validate().is_ok());
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::convert::MarshalConverter;
use crate::error::{Error, Result};

/// How the value at an accessor path is decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingType {
    /// A single object converted by a converter.
    Object,
    /// An ordered collection, wrapped in a `list` tag.
    Collection,
    /// A keyed map, wrapped in a `map` tag of `entry` tags.
    Map,
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MappingType::Object => "object",
            MappingType::Collection => "collection",
            MappingType::Map => "map",
        })
    }
}

/// A mapping rule attached at one accessor path.
#[derive(Debug, Clone)]
pub struct MappingNode {
    mapping_type: MappingType,
    accessor_name: String,
    converter: Option<Arc<dyn MarshalConverter>>,
    child_mappings: IndexMap<String, MappingNode>,
    container: Option<Box<MappingNode>>,
}

impl MappingNode {
    /// A node of the given type with no converter and no children.
    pub fn new(mapping_type: MappingType) -> Self {
        Self {
            mapping_type,
            accessor_name: String::new(),
            converter: None,
            child_mappings: IndexMap::new(),
            container: None,
        }
    }

    /// An `Object` node converted by `converter`.
    pub fn object(converter: Arc<dyn MarshalConverter>) -> Self {
        Self {
            converter: Some(converter),
            ..Self::new(MappingType::Object)
        }
    }

    /// A `Collection` node without a container mapping yet.
    pub fn collection() -> Self {
        Self::new(MappingType::Collection)
    }

    /// A `Map` node without a container mapping yet.
    pub fn map() -> Self {
        Self::new(MappingType::Map)
    }

    /// The node's type.
    pub fn mapping_type(&self) -> MappingType {
        self.mapping_type
    }

    /// The accessor this node is attached at, empty for a root.
    pub fn accessor_name(&self) -> &str {
        &self.accessor_name
    }

    /// The converter of an `Object` node.
    pub fn converter(&self) -> Option<&Arc<dyn MarshalConverter>> {
        self.converter.as_ref()
    }

    /// Sets the converter. Only `Object` nodes are converted.
    pub fn set_converter(&mut self, converter: Arc<dyn MarshalConverter>) -> Result<()> {
        if self.mapping_type != MappingType::Object {
            return Err(Error::validation(format!(
                "a {} mapping cannot carry a converter",
                self.mapping_type
            )));
        }
        self.converter = Some(converter);
        Ok(())
    }

    /// Attaches `node` as the mapping for the dependent `accessor`.
    ///
    /// Returns the mapping previously registered for that accessor.
    pub fn add_mapping(&mut self, accessor: &str, mut node: MappingNode) -> Result<Option<MappingNode>> {
        if accessor.is_empty() {
            return Err(Error::validation("accessor name cannot be empty"));
        }
        if self.mapping_type != MappingType::Object {
            return Err(Error::validation(format!(
                "a {} mapping cannot have dependent mappings",
                self.mapping_type
            )));
        }
        node.rename(accessor);
        Ok(self.child_mappings.insert(accessor.to_string(), node).map(|mut old| {
            old.rename("");
            old
        }))
    }

    /// Builder form of [`MappingNode::add_mapping`].
    pub fn with_mapping(mut self, accessor: &str, node: MappingNode) -> Result<Self> {
        self.add_mapping(accessor, node)?;
        Ok(self)
    }

    /// Sets the mapping of the contained elements or values.
    ///
    /// The container mapping takes over this node's accessor name.
    pub fn set_container_mapping(&mut self, mut node: MappingNode) -> Result<Option<MappingNode>> {
        if self.mapping_type == MappingType::Object {
            return Err(Error::validation("an object mapping cannot have a container mapping"));
        }
        node.rename(&self.accessor_name);
        Ok(self.container.replace(Box::new(node)).map(|old| *old))
    }

    /// Builder form of [`MappingNode::set_container_mapping`].
    pub fn with_container(mut self, node: MappingNode) -> Result<Self> {
        self.set_container_mapping(node)?;
        Ok(self)
    }

    /// The mapping of contained elements or values.
    pub fn container_mapping(&self) -> Option<&MappingNode> {
        self.container.as_deref()
    }

    /// Detaches and returns the mapping for `accessor`.
    pub fn remove_mapping(&mut self, accessor: &str) -> Option<MappingNode> {
        self.child_mappings.shift_remove(accessor).map(|mut node| {
            node.rename("");
            node
        })
    }

    /// The mapping for `accessor`.
    pub fn mapping(&self, accessor: &str) -> Option<&MappingNode> {
        self.child_mappings.get(accessor)
    }

    /// Mutable access to the mapping for `accessor`.
    pub fn mapping_mut(&mut self, accessor: &str) -> Option<&mut MappingNode> {
        self.child_mappings.get_mut(accessor)
    }

    /// Dependent accessors in registration order.
    pub fn mappings(&self) -> impl Iterator<Item = (&str, &MappingNode)> {
        self.child_mappings.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub(crate) fn mapping_at(&self, index: usize) -> Option<(&str, &MappingNode)> {
        self.child_mappings
            .get_index(index)
            .map(|(name, node)| (name.as_str(), node))
    }

    /// Returns `true` if any dependent mapping is registered.
    pub fn has_mappings(&self) -> bool {
        !self.child_mappings.is_empty()
    }

    /// A deep copy of this subtree.
    pub fn copy(&self) -> MappingNode {
        self.clone()
    }

    /// Sets the accessor name, following it down the container chain.
    fn rename(&mut self, accessor: &str) {
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            node.accessor_name = accessor.to_string();
            cursor = node.container.as_deref_mut();
        }
    }

    pub(crate) fn clear_accessor_name(&mut self) {
        self.rename("");
    }

    /// Checks the whole subtree: every `Object` node has a converter and
    /// every container node has a container mapping.
    pub fn validate(&self) -> Result<()> {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            match node.mapping_type {
                MappingType::Object => {
                    if node.converter.is_none() {
                        return Err(Error::validation(format!(
                            "object mapping at '{}' has no converter",
                            node.accessor_name
                        )));
                    }
                    pending.extend(node.child_mappings.values());
                }
                MappingType::Collection | MappingType::Map => match &node.container {
                    Some(container) => pending.push(container),
                    None => {
                        return Err(Error::validation(format!(
                            "{} mapping at '{}' has no container mapping",
                            node.mapping_type, node.accessor_name
                        )))
                    }
                },
            }
        }
        Ok(())
    }
}
