//! Building mapping trees from type descriptions, with a shared template
//! cache.
//!
//! A type takes part by implementing [`Mapped`]: it names its converter and
//! lists its dependent accessors together with the [`Shape`] of the value
//! each returns. [`MappingCache`] turns those descriptions into
//! [`MappingNode`] trees. The finished tree for every object type is kept as
//! a template; callers always get deep copies, so nothing a caller does to a
//! mapping can reach the cache.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::convert::MarshalConverter;
use crate::error::{Error, Result};
use crate::mapping::{MappingNode, MappingType};
use crate::object::Object;

/// A type that can describe its own mapping.
///
/// ```
/// use std::sync::Arc;
/// use adaptive_xml::{
///     typed_converter, ConvertedTags, Dependents, MappingCache, MarshalConverter,
///     Mapped, Object, Result, Shape, SimpleTag, Value,
/// };
///
/// struct Leaf;
///
/// impl Object for Leaf {
///     fn access(&self, _: &str) -> Result<Value> {
///         Ok(Value::Null)
///     }
/// }
///
/// impl Mapped for Leaf {
///     fn converter() -> Arc<dyn MarshalConverter> {
///         typed_converter(|_: &Leaf, _: &mut ConvertedTags| Ok(SimpleTag::new("leaf").into()))
///     }
/// }
///
/// let cache = MappingCache::new();
/// let mapping = cache.mapping_for::<Leaf>().unwrap();
/// assert!(!mapping.has_mappings());
/// ```
pub trait Mapped: Object + Sized {
    /// The converter producing this type's tag.
    fn converter() -> Arc<dyn MarshalConverter>;

    /// Declares the dependent accessors. None by default.
    fn dependents(_dependents: &mut Dependents) {}
}

/// Type-erased view of a [`Mapped`] type.
#[derive(Clone, Copy)]
pub struct MappedType {
    id: TypeId,
    name: &'static str,
    converter: fn() -> Arc<dyn MarshalConverter>,
    dependents: fn(&mut Dependents),
}

impl MappedType {
    /// The view of `T`.
    pub fn of<T: Mapped + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            converter: T::converter,
            dependents: T::dependents,
        }
    }

    /// Name of the type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for MappedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// The shape of the value an accessor returns.
#[derive(Debug, Clone)]
pub enum Shape {
    /// A single object of a mapped type.
    Object(MappedType),
    /// A collection of values of the inner shape.
    Collection(Box<Shape>),
    /// A map whose values have the inner shape.
    Map(Box<Shape>),
}

impl Shape {
    /// A single `T`.
    pub fn of<T: Mapped + 'static>() -> Shape {
        Shape::Object(MappedType::of::<T>())
    }

    /// A collection of `element`.
    pub fn list(element: Shape) -> Shape {
        Shape::Collection(Box::new(element))
    }

    /// A map with values of shape `value`.
    pub fn map(value: Shape) -> Shape {
        Shape::Map(Box::new(value))
    }

    /// The object type at the bottom of the container chain, and the chain
    /// of container kinds from the outside in.
    fn split(&self) -> (MappedType, Vec<MappingType>) {
        let mut kinds = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Shape::Object(ty) => return (*ty, kinds),
                Shape::Collection(inner) => {
                    kinds.push(MappingType::Collection);
                    cursor = inner;
                }
                Shape::Map(inner) => {
                    kinds.push(MappingType::Map);
                    cursor = inner;
                }
            }
        }
    }
}

/// Dependent accessors declared by a [`Mapped`] type.
#[derive(Debug, Default)]
pub struct Dependents {
    entries: Vec<(String, Shape)>,
}

impl Dependents {
    /// Declares an accessor returning a single `T`.
    pub fn object<T: Mapped + 'static>(&mut self, accessor: &str) -> &mut Self {
        self.shape(accessor, Shape::of::<T>())
    }

    /// Declares an accessor returning a collection of `element`.
    pub fn collection(&mut self, accessor: &str, element: Shape) -> &mut Self {
        self.shape(accessor, Shape::list(element))
    }

    /// Declares an accessor returning a map with values of shape `value`.
    pub fn map(&mut self, accessor: &str, value: Shape) -> &mut Self {
        self.shape(accessor, Shape::map(value))
    }

    /// Declares an accessor returning a value of any shape.
    pub fn shape(&mut self, accessor: &str, shape: Shape) -> &mut Self {
        self.entries.push((accessor.to_string(), shape));
        self
    }
}

struct BuildFrame {
    ty: MappedType,
    node: MappingNode,
    dependents: std::vec::IntoIter<(String, Shape)>,
    awaiting: Option<(String, Vec<MappingType>)>,
}

impl BuildFrame {
    fn new(ty: MappedType) -> Self {
        let mut dependents = Dependents::default();
        (ty.dependents)(&mut dependents);
        Self {
            ty,
            node: MappingNode::object((ty.converter)()),
            dependents: dependents.entries.into_iter(),
            awaiting: None,
        }
    }
}

/// Thread-safe cache of per-type mapping templates.
#[derive(Debug, Default)]
pub struct MappingCache {
    templates: RwLock<HashMap<TypeId, MappingNode>>,
}

impl MappingCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapping tree for `T`, rooted at an `Object` node.
    pub fn mapping_for<T: Mapped + 'static>(&self) -> Result<MappingNode> {
        self.mapping_for_shape(&Shape::of::<T>())
    }

    /// The mapping tree for a root of the given shape.
    ///
    /// Only object shapes can be roots; a container shape is a validation
    /// error.
    pub fn mapping_for_shape(&self, shape: &Shape) -> Result<MappingNode> {
        match shape {
            Shape::Object(ty) => self.template(*ty),
            Shape::Collection(_) | Shape::Map(_) => Err(Error::validation(
                "a collection or map type cannot be the root of a mapping",
            )),
        }
    }

    /// Number of cached templates.
    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    /// Drops every cached template.
    pub fn clear(&self) {
        self.templates.write().clear();
    }

    fn cached(&self, id: TypeId) -> Option<MappingNode> {
        self.templates.read().get(&id).map(|template| {
            let mut copy = template.copy();
            copy.clear_accessor_name();
            copy
        })
    }

    fn store(&self, ty: MappedType, node: &MappingNode) {
        self.templates.write().entry(ty.id).or_insert_with(|| {
            debug!(ty = ty.name, "cached mapping template");
            let mut template = node.copy();
            template.clear_accessor_name();
            template
        });
    }

    fn template(&self, root: MappedType) -> Result<MappingNode> {
        if let Some(copy) = self.cached(root.id) {
            trace!(ty = root.name, "mapping template cache hit");
            return Ok(copy);
        }

        let mut stack = vec![BuildFrame::new(root)];
        loop {
            let Some(top) = stack.len().checked_sub(1) else {
                return Err(Error::validation("mapping build stack underflow"));
            };

            if let Some((accessor, shape)) = stack[top].dependents.next() {
                let (ty, kinds) = shape.split();
                if let Some(copy) = self.cached(ty.id) {
                    stack[top].node.add_mapping(&accessor, wrap(copy, &kinds)?)?;
                    continue;
                }
                if stack.iter().any(|frame| frame.ty.id == ty.id) {
                    return Err(Error::validation(format!(
                        "mapping for {} refers back to itself through accessor {}",
                        ty.name, accessor
                    )));
                }
                stack[top].awaiting = Some((accessor, kinds));
                stack.push(BuildFrame::new(ty));
                continue;
            }

            let Some(done) = stack.pop() else {
                return Err(Error::validation("mapping build stack underflow"));
            };
            self.store(done.ty, &done.node);
            match stack.last_mut() {
                None => return Ok(done.node),
                Some(parent) => {
                    let Some((accessor, kinds)) = parent.awaiting.take() else {
                        return Err(Error::validation("dependent mapping built without an owner"));
                    };
                    parent.node.add_mapping(&accessor, wrap(done.node, &kinds)?)?;
                }
            }
        }
    }
}

/// Wraps `leaf` in container mappings, `kinds` listed from the outside in.
fn wrap(leaf: MappingNode, kinds: &[MappingType]) -> Result<MappingNode> {
    kinds.iter().rev().try_fold(leaf, |inner, kind| {
        MappingNode::new(*kind).with_container(inner)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{typed_converter, ConvertedTags};
    use crate::error::ErrorCategory;
    use crate::object::Value;
    use crate::tag::{CompositeTag, SimpleTag};

    struct Leaf;
    struct Branch;
    struct Looping;

    impl Object for Leaf {
        fn access(&self, _: &str) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    impl Object for Branch {
        fn access(&self, _: &str) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    impl Object for Looping {
        fn access(&self, _: &str) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    impl Mapped for Leaf {
        fn converter() -> Arc<dyn MarshalConverter> {
            typed_converter(|_: &Leaf, _: &mut ConvertedTags| Ok(SimpleTag::new("leaf").into()))
        }
    }

    impl Mapped for Branch {
        fn converter() -> Arc<dyn MarshalConverter> {
            typed_converter(|_: &Branch, _: &mut ConvertedTags| Ok(CompositeTag::new("branch").into()))
        }

        fn dependents(dependents: &mut Dependents) {
            dependents
                .object::<Leaf>("first")
                .collection("many", Shape::map(Shape::of::<Leaf>()));
        }
    }

    impl Mapped for Looping {
        fn converter() -> Arc<dyn MarshalConverter> {
            typed_converter(|_: &Looping, _: &mut ConvertedTags| Ok(CompositeTag::new("loop").into()))
        }

        fn dependents(dependents: &mut Dependents) {
            dependents.collection("children", Shape::of::<Looping>());
        }
    }

    #[test]
    fn test_builds_nested_containers() {
        let cache = MappingCache::new();
        let branch = cache.mapping_for::<Branch>().unwrap();
        assert_eq!(branch.accessor_name(), "");
        assert!(branch.validate().is_ok());

        let many = branch.mapping("many").unwrap();
        assert_eq!(many.mapping_type(), MappingType::Collection);
        let values = many.container_mapping().unwrap();
        assert_eq!(values.mapping_type(), MappingType::Map);
        let leaf = values.container_mapping().unwrap();
        assert_eq!(leaf.mapping_type(), MappingType::Object);
        assert_eq!(leaf.accessor_name(), "many");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_hands_out_independent_copies() {
        let cache = MappingCache::new();
        let mut first = cache.mapping_for::<Branch>().unwrap();
        first.remove_mapping("first");
        let second = cache.mapping_for::<Branch>().unwrap();
        assert!(second.mapping("first").is_some());
    }

    #[test]
    fn test_container_root_rejected() {
        let cache = MappingCache::new();
        let err = cache.mapping_for_shape(&Shape::list(Shape::of::<Leaf>())).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_self_reference_rejected() {
        let cache = MappingCache::new();
        assert!(cache.mapping_for::<Looping>().is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_between_threads() {
        let cache = Arc::new(MappingCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.mapping_for::<Branch>().map(|m| m.has_mappings()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().unwrap());
        }
        assert_eq!(cache.len(), 2);
    }
}
