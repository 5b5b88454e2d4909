//! Converters between objects and tags.
//!
//! Marshalling uses [`MarshalConverter`]: it receives an object together
//! with the tags already produced for its dependents and builds the object's
//! own tag. Unmarshalling uses [`UnmarshalConverter`]: it receives a
//! completed composite tag together with the values already produced by
//! converters of its descendants and builds a value.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::object::Object;
use crate::qname::QName;
use crate::tag::{CompositeTag, SimpleTag, Tag};

/// Tags produced for an object's dependents, keyed by accessor name.
#[derive(Debug, Default)]
pub struct ConvertedTags {
    tags: IndexMap<String, Tag>,
}

impl ConvertedTags {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, accessor: String, tag: Tag) {
        self.tags.insert(accessor, tag);
    }

    /// The tag produced for `accessor`.
    pub fn get(&self, accessor: &str) -> Option<&Tag> {
        self.tags.get(accessor)
    }

    /// Removes and returns the tag produced for `accessor`.
    pub fn take(&mut self, accessor: &str) -> Option<Tag> {
        self.tags.shift_remove(accessor)
    }

    /// Removes and returns the tag for `accessor`, failing if there is none.
    pub fn require(&mut self, accessor: &str) -> Result<Tag> {
        self.take(accessor)
            .ok_or_else(|| Error::conversion(format!("no tag was produced for accessor {}", accessor)))
    }

    /// Number of converted dependents.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if no dependent was converted.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Drains every converted dependent in accessor registration order.
    pub fn drain(&mut self) -> impl Iterator<Item = (String, Tag)> + '_ {
        self.tags.drain(..)
    }
}

/// Builds the tag for one object.
pub trait MarshalConverter: Send + Sync {
    /// Converts `object`, consuming whatever it needs from `children`.
    fn convert(&self, object: &dyn Object, children: &mut ConvertedTags) -> Result<Tag>;

    /// Name used in error messages.
    fn describe(&self) -> String {
        type_name::<Self>().to_string()
    }
}

impl fmt::Debug for dyn MarshalConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A [`MarshalConverter`] for one concrete object type, backed by a closure.
///
/// Handing it any other type fails with a converter mismatch naming both
/// types.
pub struct TypedConverter<T, F> {
    convert: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> TypedConverter<T, F>
where
    T: Object,
    F: Fn(&T, &mut ConvertedTags) -> Result<Tag> + Send + Sync,
{
    /// Wraps `convert`.
    pub fn new(convert: F) -> Self {
        Self {
            convert,
            _marker: PhantomData,
        }
    }
}

impl<T, F> MarshalConverter for TypedConverter<T, F>
where
    T: Object,
    F: Fn(&T, &mut ConvertedTags) -> Result<Tag> + Send + Sync,
{
    fn convert(&self, object: &dyn Object, children: &mut ConvertedTags) -> Result<Tag> {
        match object.downcast_ref::<T>() {
            Some(typed) => (self.convert)(typed, children),
            None => Err(Error::converter_mismatch(object.type_name().to_string(), self.describe())),
        }
    }

    fn describe(&self) -> String {
        format!("TypedConverter<{}>", type_name::<T>())
    }
}

/// Shared [`TypedConverter`] ready to put into a mapping.
pub fn typed_converter<T, F>(convert: F) -> Arc<dyn MarshalConverter>
where
    T: Object,
    F: Fn(&T, &mut ConvertedTags) -> Result<Tag> + Send + Sync + 'static,
{
    Arc::new(TypedConverter::new(convert))
}

/// Converter rendering an object's text form as a simple tag.
///
/// Works for any object that is a [`ToString`] leaf such as `String` or the
/// primitive numbers.
pub struct TextConverter<T> {
    name: QName,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Object + ToString> TextConverter<T> {
    /// Produces simple tags named `name`.
    pub fn new<N: Into<QName>>(name: N) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<T: Object + ToString> MarshalConverter for TextConverter<T> {
    fn convert(&self, object: &dyn Object, _children: &mut ConvertedTags) -> Result<Tag> {
        match object.downcast_ref::<T>() {
            Some(value) => Ok(SimpleTag::with_value(self.name.clone(), value.to_string()).into()),
            None => Err(Error::converter_mismatch(object.type_name().to_string(), self.describe())),
        }
    }

    fn describe(&self) -> String {
        format!("TextConverter<{}>", type_name::<T>())
    }
}

/// Values produced by unmarshal converters, grouped by element name.
#[derive(Default)]
pub struct ConvertedObjects {
    values: IndexMap<QName, Vec<Box<dyn Any>>>,
}

impl ConvertedObjects {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: QName, value: Box<dyn Any>) {
        self.values.entry(name).or_default().push(value);
    }

    /// First value under `name` that is a `T`.
    pub fn get<T: 'static>(&self, name: &QName) -> Option<&T> {
        self.values
            .get(name)?
            .iter()
            .find_map(|value| value.downcast_ref::<T>())
    }

    /// Every value under `name` that is a `T`, in completion order.
    pub fn all<T: 'static>(&self, name: &QName) -> Vec<&T> {
        self.values
            .get(name)
            .map(|values| values.iter().filter_map(|v| v.downcast_ref::<T>()).collect())
            .unwrap_or_default()
    }

    /// Removes every value under `name`, failing if one is not a `T`.
    pub fn take<T: 'static>(&mut self, name: &QName) -> Result<Vec<T>> {
        let values = self.values.shift_remove(name).unwrap_or_default();
        values
            .into_iter()
            .map(|value| {
                value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                    Error::conversion(format!(
                        "value converted for {} is not a {}",
                        name,
                        type_name::<T>()
                    ))
                })
            })
            .collect()
    }

    /// Number of values under `name`.
    pub fn count(&self, name: &QName) -> usize {
        self.values.get(name).map_or(0, Vec::len)
    }

    /// Names with at least one value.
    pub fn names(&self) -> impl Iterator<Item = &QName> {
        self.values.keys()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing was converted.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ConvertedObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(name, values)| (name, values.len())))
            .finish()
    }
}

/// Turns a completed composite tag into a value.
pub trait UnmarshalConverter {
    /// Converts `tag`. `children` holds what converters of its descendants
    /// produced. `None` means nothing is recorded for this element.
    fn convert(&self, tag: &CompositeTag, children: &ConvertedObjects) -> Result<Option<Box<dyn Any>>>;
}

/// An [`UnmarshalConverter`] backed by a closure returning a `T`.
pub struct FnConverter<F, T> {
    convert: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> FnConverter<F, T>
where
    F: Fn(&CompositeTag, &ConvertedObjects) -> Result<T>,
    T: 'static,
{
    /// Wraps `convert`.
    pub fn new(convert: F) -> Self {
        Self {
            convert,
            _marker: PhantomData,
        }
    }
}

impl<F, T> UnmarshalConverter for FnConverter<F, T>
where
    F: Fn(&CompositeTag, &ConvertedObjects) -> Result<T>,
    T: 'static,
{
    fn convert(&self, tag: &CompositeTag, children: &ConvertedObjects) -> Result<Option<Box<dyn Any>>> {
        (self.convert)(tag, children).map(|value| Some(Box::new(value) as Box<dyn Any>))
    }
}

/// Shared [`FnConverter`] ready to register with an unmarshaller.
pub fn fn_converter<F, T>(convert: F) -> Rc<dyn UnmarshalConverter>
where
    F: Fn(&CompositeTag, &ConvertedObjects) -> Result<T> + 'static,
    T: 'static,
{
    Rc::new(FnConverter::new(convert))
}
