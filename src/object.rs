//! Object graphs as seen by the marshaller.
//!
//! The marshaller never inspects user types directly. It asks an [`Object`]
//! for the value behind a named zero-argument accessor and gets a [`Value`]
//! back: another object, a collection, a keyed map, or null.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::text::to_text;

/// Upcast to [`Any`], implemented for every `'static` type.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A node of the object graph being marshalled.
///
/// ```
/// use adaptive_xml::{Error, Object, Result, Value};
///
/// struct Employee {
///     name: String,
/// }
///
/// impl Object for Employee {
///     fn access(&self, accessor: &str) -> Result<Value> {
///         match accessor {
///             "name" => Ok(Value::object(self.name.clone())),
///             _ => Err(Error::conversion(format!("no accessor {}", accessor))),
///         }
///     }
/// }
/// ```
pub trait Object: AsAny {
    /// Value returned by the zero-argument accessor named `accessor`.
    fn access(&self, accessor: &str) -> Result<Value>;

    /// Name used in error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn Object {
    /// Downcasts to a concrete object type.
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns `true` if the object is a `T`.
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

macro_rules! leaf_objects {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Object for $ty {
                fn access(&self, accessor: &str) -> Result<Value> {
                    Err(Error::conversion(format!(
                        "{} has no accessor {}",
                        std::any::type_name::<$ty>(),
                        accessor
                    )))
                }
            }
        )*
    };
}

leaf_objects!(
    String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

/// The result of an accessor.
#[derive(Clone)]
pub enum Value {
    /// No value. Marshalling a null dependent fails.
    Null,
    /// A single object.
    Object(Rc<dyn Object>),
    /// An ordered collection.
    Collection(Vec<Value>),
    /// Entries keyed by their text form, in iteration order.
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Wraps a single object.
    pub fn object<T: Object>(object: T) -> Value {
        Value::Object(Rc::new(object))
    }

    /// Wraps an already shared object.
    pub fn shared<T: Object>(object: Rc<T>) -> Value {
        Value::Object(object)
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short description used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Object(object) => object.type_name(),
            Value::Collection(_) => "collection",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Object(object) => write!(f, "Object({})", object.type_name()),
            Value::Collection(items) => f.debug_tuple("Collection").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}

/// Conversion into a [`Value`].
///
/// Map keys are rendered with [`to_text`], so any scalar key type works.
pub trait IntoValue {
    /// Performs the conversion.
    fn into_value(self) -> Result<Value>;
}

impl IntoValue for Value {
    fn into_value(self) -> Result<Value> {
        Ok(self)
    }
}

impl<T: Object> IntoValue for Rc<T> {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Object(self))
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Result<Value> {
        match self {
            Some(value) => value.into_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Result<Value> {
        self.into_iter()
            .map(IntoValue::into_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::Collection)
    }
}

fn map_value<K, V, I>(entries: I) -> Result<Value>
where
    K: Serialize,
    V: IntoValue,
    I: IntoIterator<Item = (K, V)>,
{
    entries
        .into_iter()
        .map(|(key, value)| Ok((to_text(&key)?, value.into_value()?)))
        .collect::<Result<Vec<_>>>()
        .map(Value::Map)
}

impl<K: Serialize, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn into_value(self) -> Result<Value> {
        map_value(self)
    }
}

impl<K: Serialize, V: IntoValue, S: BuildHasher> IntoValue for HashMap<K, V, S> {
    fn into_value(self) -> Result<Value> {
        map_value(self)
    }
}

impl<K: Serialize, V: IntoValue, S: BuildHasher> IntoValue for IndexMap<K, V, S> {
    fn into_value(self) -> Result<Value> {
        map_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Object for Probe {
        fn access(&self, accessor: &str) -> Result<Value> {
            match accessor {
                "nothing" => Ok(Value::Null),
                _ => Err(Error::conversion("no such accessor")),
            }
        }
    }

    #[test]
    fn test_downcast_through_dyn_object() {
        let value = Value::object(Probe);
        let Value::Object(object) = value else {
            panic!("expected an object");
        };
        assert!(object.is::<Probe>());
        assert!(object.downcast_ref::<String>().is_none());
        assert!(object.type_name().ends_with("Probe"));
        assert!(object.access("nothing").unwrap().is_null());
    }

    #[test]
    fn test_nested_containers() {
        let mut inner = BTreeMap::new();
        inner.insert(3u32, Rc::new(Probe));
        let value = vec![Some(inner), None].into_value().unwrap();
        match value {
            Value::Collection(items) => {
                assert_eq!(items.len(), 2);
                match &items[0] {
                    Value::Map(entries) => assert_eq!(entries[0].0, "3"),
                    other => panic!("expected map, got {:?}", other),
                }
                assert!(items[1].is_null());
            }
            other => panic!("expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_leaf_objects_have_no_accessors() {
        let value = Value::object(String::from("x"));
        let Value::Object(object) = value else {
            panic!("expected an object");
        };
        assert!(object.access("len").is_err());
        assert_eq!(object.downcast_ref::<String>().map(String::as_str), Some("x"));
    }
}
