// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property set value trees
//!
//! Property sets are exposed as nested maps of plain values. Scalars map
//! onto IfcPropertySingleValue, nested maps and lists onto IfcComplexProperty.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Properties of one property set, in insertion order
pub type PropertyMap = IndexMap<String, PropertyValue>;

/// Property sets of an object keyed by set name
pub type PropertySets = IndexMap<String, PropertyMap>;

/// A single property value
///
/// Equality of [`PropertyValue::Map`] ignores key order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Stored as IFCBOOLEAN
    Bool(bool),
    /// Stored as IFCINTEGER
    Integer(i64),
    /// Stored as IFCREAL
    Real(f64),
    /// Stored as IFCLABEL
    Label(String),
    /// Complex property whose children are keyed by index
    List(Vec<PropertyValue>),
    /// Complex property whose children are keyed by name
    Map(PropertyMap),
}

impl PropertyValue {
    /// Whether this value is stored as a single value property
    pub fn is_scalar(&self) -> bool {
        !matches!(self, PropertyValue::List(_) | PropertyValue::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view, integers widen to f64
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PropertyValue::Real(v) => Some(*v),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Label(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Real(v) => write!(f, "{}", v),
            PropertyValue::Label(s) => f.write_str(s),
            PropertyValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            PropertyValue::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Real(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Label(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Label(value)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(value: PropertyMap) -> Self {
        PropertyValue::Map(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        PropertyValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Build a [`PropertyMap`] from `key => value` pairs
#[macro_export]
macro_rules! property_map {
    () => { $crate::PropertyMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::PropertyMap::new();
        $( map.insert(($key).to_string(), $crate::PropertyValue::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_equality_ignores_order() {
        let a = property_map! { "a" => 1, "b" => "x" };
        let b = property_map! { "b" => "x", "a" => 1 };
        assert_eq!(PropertyValue::Map(a), PropertyValue::Map(b));
    }

    #[test]
    fn test_untagged_json_shape() {
        let map = property_map! {
            "IsExternal" => true,
            "Width" => 0.2,
            "Layers" => vec![1, 2],
        };
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"IsExternal":true,"Width":0.2,"Layers":[1,2]}"#);

        let back: PropertyMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back["Layers"], PropertyValue::List(vec![1.into(), 2.into()]));
        assert_eq!(back["Width"].as_real(), Some(0.2));
    }

    #[test]
    fn test_display() {
        let value = PropertyValue::Map(property_map! { "k" => vec!["a", "b"] });
        assert_eq!(value.to_string(), "{k: [a, b]}");
    }
}
