// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute values as seen by calling code
//!
//! [`Value`] mirrors the raw `AttributeValue` of the engine, except that
//! references are always wrapped [`Entity`] handles and typed values carry
//! their schema-cased type name. Generated accessors convert through
//! [`FromValue`] and [`IntoValue`].

use crate::entity::{AsEntity, Entity, EntityType};
use ifc_orm_model::{format_real, Error, Result};
use std::fmt;

/// An attribute value with references resolved to entities
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Unset (`$`)
    #[default]
    Null,
    /// Derived by the schema (`*`)
    Derived,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    /// Enumeration item, upper case without dots
    Enum(String),
    /// Hex digits of a binary literal
    Binary(String),
    Entity(Entity),
    List(Vec<Value>),
    /// Value tagged with a defined type, e.g. `IfcLabel('x')` in a select
    Typed(String, Box<Value>),
}

impl Value {
    /// Typed value with a schema-cased tag
    pub fn typed(type_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Value::Typed(type_name.into(), Box::new(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Derived)
    }

    /// Name of the variant, used in conversion errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Derived => "derived",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Enum(_) => "enumeration",
            Value::Binary(_) => "binary",
            Value::Entity(_) => "entity",
            Value::List(_) => "list",
            Value::Typed(..) => "typed value",
        }
    }

    /// The value with any type tags removed
    pub fn untyped(self) -> Value {
        match self {
            Value::Typed(_, inner) => inner.untyped(),
            other => other,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            Value::Typed(_, inner) => inner.as_entity(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            Value::Typed(_, inner) => inner.as_str(),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            Value::Typed(_, inner) => inner.as_real(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Typed(_, inner) => inner.as_list(),
            _ => None,
        }
    }

    /// Entities of an aggregate, skipping anything else
    pub fn entities(&self) -> Vec<Entity> {
        match self {
            Value::Entity(entity) => vec![entity.clone()],
            Value::List(items) => items.iter().flat_map(Value::entities).collect(),
            Value::Typed(_, inner) => inner.entities(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("$"),
            Value::Derived => f.write_str("*"),
            Value::Bool(true) => f.write_str(".T."),
            Value::Bool(false) => f.write_str(".F."),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => f.write_str(&format_real(*v)),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Enum(s) => write!(f, ".{}.", s),
            Value::Binary(s) => write!(f, "\"{}\"", s),
            Value::Entity(entity) => write!(f, "{}", entity.id()),
            Value::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Value::Typed(tag, inner) => write!(f, "{}({})", tag, inner),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Entity> for Value {
    fn from(v: Entity) -> Self {
        Value::Entity(v)
    }
}

impl From<&Entity> for Value {
    fn from(v: &Entity) -> Self {
        Value::Entity(v.clone())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Error for a value of the wrong shape
pub fn mismatch(expected: &str, value: &Value) -> Error {
    Error::other(format!("expected {}, got {}", expected, value.kind()))
}

/// Conversion out of a [`Value`], used by generated getters
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

/// Conversion into a [`Value`], used by generated setters
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            other => Err(mismatch("real", &other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::Integer(v) => Ok(v),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

/// Three-valued `LOGICAL`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Logical {
    True,
    False,
    Unknown,
}

impl From<bool> for Logical {
    fn from(v: bool) -> Self {
        if v {
            Logical::True
        } else {
            Logical::False
        }
    }
}

impl FromValue for Logical {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::Bool(v) => Ok(v.into()),
            Value::Enum(item) if item == "U" || item == "UNKNOWN" => Ok(Logical::Unknown),
            Value::Enum(item) if item == "T" => Ok(Logical::True),
            Value::Enum(item) if item == "F" => Ok(Logical::False),
            other => Err(mismatch("logical", &other)),
        }
    }
}

impl IntoValue for Logical {
    fn into_value(self) -> Value {
        match self {
            Logical::True => Value::Bool(true),
            Logical::False => Value::Bool(false),
            Logical::Unknown => Value::Enum("U".to_string()),
        }
    }
}

/// `BINARY` as hex digits
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Binary(pub String);

impl FromValue for Binary {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::Binary(hex) => Ok(Binary(hex)),
            other => Err(mismatch("binary", &other)),
        }
    }
}

impl IntoValue for Binary {
    fn into_value(self) -> Value {
        Value::Binary(self.0)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null | Value::Derived => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl FromValue for Entity {
    fn from_value(value: Value) -> Result<Self> {
        match value.untyped() {
            Value::Entity(entity) => Ok(entity),
            other => Err(mismatch("entity", &other)),
        }
    }
}

impl IntoValue for Entity {
    fn into_value(self) -> Value {
        Value::Entity(self)
    }
}

/// Entity of class `T` or one of its subclasses
pub fn entity_from_value<T: EntityType>(value: Value) -> Result<T> {
    let entity = Entity::from_value(value)?;
    if entity.is_a_type(T::TYPE_NAME) {
        Ok(T::from_entity_unchecked(entity))
    } else {
        Err(Error::other(format!(
            "expected {}, got {} {}",
            T::TYPE_NAME,
            entity.type_name(),
            entity.id()
        )))
    }
}

/// Wrap any entity handle as a value
pub fn entity_value(entity: &impl AsEntity) -> Value {
    Value::Entity(entity.as_entity().clone())
}
