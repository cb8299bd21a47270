// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value-type checks applied on every write

use ifc_orm_model::{AttributeValue, EntityId, Error, Result};
use ifc_orm_schema::{Declaration, Schema, SimpleType, TypeDescriptor};

/// Checks values against attribute type descriptors
///
/// `type_of` reports the concrete type of an existing record; references
/// to ids it does not know are rejected.
pub struct Validator<'a> {
    schema: &'a Schema,
    type_of: &'a dyn Fn(EntityId) -> Option<String>,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a Schema, type_of: &'a dyn Fn(EntityId) -> Option<String>) -> Self {
        Self { schema, type_of }
    }

    /// Check `value` for an attribute of type `ty`
    ///
    /// The error message describes the mismatch only; callers attach the
    /// attribute name with [`Error::with_attribute`].
    pub fn check(&self, ty: &TypeDescriptor, optional: bool, value: &AttributeValue) -> Result<()> {
        match value {
            AttributeValue::Null if optional => Ok(()),
            AttributeValue::Null => Err(Error::other("attribute is not optional")),
            AttributeValue::Derived => Err(Error::other("'*' is only valid for derived attributes")),
            _ => self.check_type(ty, value),
        }
    }

    fn check_type(&self, ty: &TypeDescriptor, value: &AttributeValue) -> Result<()> {
        match ty {
            TypeDescriptor::Simple(simple) => check_simple(*simple, value),
            TypeDescriptor::Aggregation {
                bounds, element, ..
            } => {
                let items = value.as_list().ok_or_else(|| {
                    Error::other(format!("expected {}, got {}", ty, value.kind()))
                })?;
                if let Some(bounds) = bounds {
                    if !bounds.contains(items.len()) {
                        return Err(Error::other(format!(
                            "{} elements do not satisfy bounds {}",
                            items.len(),
                            bounds
                        )));
                    }
                }
                for item in items {
                    if item.is_null() {
                        return Err(Error::other("aggregates cannot contain '$'"));
                    }
                    self.check_type(element, item)?;
                }
                Ok(())
            }
            TypeDescriptor::Named(name) => self.check_named(name, value),
        }
    }

    fn check_named(&self, name: &str, value: &AttributeValue) -> Result<()> {
        match self.schema.declaration(name)? {
            Declaration::Type(alias) => match value {
                AttributeValue::TypedValue(tag, args) => {
                    if !self.names_type(tag, name) {
                        return Err(Error::other(format!("expected {}, got {}", name, tag)));
                    }
                    let inner = single_arg(tag, args)?;
                    self.check_type(&alias.underlying, inner)
                }
                _ => self.check_type(&alias.underlying, value),
            },
            Declaration::Enumeration(enumeration) => match value {
                AttributeValue::Enum(item) if enumeration.contains(item) => Ok(()),
                AttributeValue::Enum(item) => Err(Error::other(format!(
                    "'{}' is not an item of {}",
                    item, name
                ))),
                other => Err(Error::other(format!(
                    "expected {} enumeration, got {}",
                    name,
                    other.kind()
                ))),
            },
            Declaration::Entity(_) => self.check_reference(value, &[name]),
            Declaration::Select(_) => self.check_select(name, value),
        }
    }

    fn check_reference(&self, value: &AttributeValue, allowed: &[&str]) -> Result<()> {
        let AttributeValue::EntityRef(id) = value else {
            return Err(Error::other(format!(
                "expected a reference to {}, got {}",
                allowed.join(" | "),
                value.kind()
            )));
        };
        let actual = (self.type_of)(*id)
            .ok_or_else(|| Error::other(format!("{} does not exist", id)))?;
        if allowed
            .iter()
            .any(|ancestor| self.schema.is_subtype_of(&actual, ancestor))
        {
            Ok(())
        } else {
            Err(Error::other(format!(
                "{} is a {}, expected {}",
                id,
                actual,
                allowed.join(" | ")
            )))
        }
    }

    fn check_select(&self, name: &str, value: &AttributeValue) -> Result<()> {
        let members = self.schema.flatten_select(name)?;
        match value {
            AttributeValue::EntityRef(_) => {
                let entities: Vec<&str> = members
                    .iter()
                    .copied()
                    .filter(|m| matches!(self.schema.get(m), Some(Declaration::Entity(_))))
                    .collect();
                self.check_reference(value, &entities)
            }
            AttributeValue::TypedValue(tag, args) => {
                let member = members
                    .iter()
                    .copied()
                    .find(|m| self.names_type(tag, m))
                    .ok_or_else(|| {
                        Error::other(format!("{} is not a member of {}", tag, name))
                    })?;
                let inner = single_arg(tag, args)?;
                match self.schema.declaration(member)? {
                    Declaration::Type(alias) => self.check_type(&alias.underlying, inner),
                    _ => self.check_named(member, inner),
                }
            }
            AttributeValue::Enum(item) => {
                let found = members.iter().any(|m| {
                    self.schema
                        .get(m)
                        .and_then(Declaration::as_enumeration)
                        .is_some_and(|e| e.contains(item))
                });
                if found {
                    Ok(())
                } else {
                    Err(Error::other(format!("'{}' is not an item of {}", item, name)))
                }
            }
            other => Err(Error::other(format!(
                "{} values must be typed or references, got {}",
                name,
                other.kind()
            ))),
        }
    }

    fn names_type(&self, tag: &str, expected: &str) -> bool {
        self.schema.canonical_name(tag) == Some(expected)
    }
}

fn single_arg<'v>(tag: &str, args: &'v [AttributeValue]) -> Result<&'v AttributeValue> {
    match args {
        [inner] => Ok(inner),
        _ => Err(Error::other(format!(
            "{} takes exactly one value, got {}",
            tag,
            args.len()
        ))),
    }
}

fn check_simple(simple: SimpleType, value: &AttributeValue) -> Result<()> {
    let ok = match (simple, value) {
        (SimpleType::String, AttributeValue::String(_)) => true,
        (SimpleType::Real | SimpleType::Number, AttributeValue::Float(_)) => true,
        (SimpleType::Real | SimpleType::Number, AttributeValue::Integer(_)) => true,
        (SimpleType::Integer, AttributeValue::Integer(_)) => true,
        (SimpleType::Boolean, AttributeValue::Bool(_)) => true,
        (SimpleType::Logical, AttributeValue::Bool(_)) => true,
        (SimpleType::Logical, AttributeValue::Enum(e)) => e.eq_ignore_ascii_case("U"),
        (SimpleType::Binary, AttributeValue::Binary(_)) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::other(format!(
            "expected {}, got {}",
            simple.keyword(),
            value.kind()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_orm_model::AttributeValue as V;

    fn types(id: EntityId) -> Option<String> {
        match id.0 {
            1 => Some("IfcWall".into()),
            2 => Some("IfcCartesianPoint".into()),
            3 => Some("IfcPropertySet".into()),
            _ => None,
        }
    }

    fn check(entity: &str, attribute: &str, value: V) -> Result<()> {
        let schema = ifc_orm_schema::load("IFC4").unwrap();
        let decl = schema.entity(entity).unwrap();
        let attr = decl.attribute(attribute).unwrap();
        let validator = Validator::new(&schema, &types);
        validator.check(&attr.ty, attr.optional, &value)
    }

    #[test]
    fn test_simple_and_alias_values() {
        assert!(check("IfcRoot", "Name", V::String("Wall".into())).is_ok());
        assert!(check("IfcRoot", "Name", V::Integer(3)).is_err());
        assert!(check("IfcRoot", "Name", V::Null).is_ok());
        assert!(check("IfcRoot", "GlobalId", V::Null).is_err());
        assert!(check("IfcRectangleProfileDef", "XDim", V::Integer(2)).is_ok());
        assert!(check(
            "IfcRoot",
            "Name",
            V::TypedValue("IFCLABEL".into(), vec![V::String("x".into())])
        )
        .is_ok());
    }

    #[test]
    fn test_enumeration_items() {
        assert!(check("IfcWall", "PredefinedType", V::Enum("SOLIDWALL".into())).is_ok());
        assert!(check("IfcWall", "PredefinedType", V::Enum("BANANA".into())).is_err());
    }

    #[test]
    fn test_references_check_type_and_existence() {
        assert!(check("IfcRelAggregates", "RelatingObject", V::EntityRef(EntityId(1))).is_ok());
        let err = check("IfcRelAggregates", "RelatingObject", V::EntityRef(EntityId(2)));
        assert!(err.unwrap_err().to_string().contains("IfcCartesianPoint"));
        assert!(check("IfcRelAggregates", "RelatingObject", V::EntityRef(EntityId(77))).is_err());
    }

    #[test]
    fn test_aggregate_bounds() {
        let related = |ids: &[u32]| V::List(ids.iter().map(|&i| V::EntityRef(EntityId(i))).collect());
        assert!(check("IfcRelAggregates", "RelatedObjects", related(&[1])).is_ok());
        assert!(check("IfcRelAggregates", "RelatedObjects", related(&[])).is_err());
        assert!(check(
            "IfcCartesianPoint",
            "Coordinates",
            V::List(vec![V::Float(0.0), V::Float(1.0), V::Float(2.0), V::Float(3.0)])
        )
        .is_err());
    }

    #[test]
    fn test_select_members() {
        let single = |value: V| check("IfcPropertySingleValue", "NominalValue", value);
        assert!(single(V::TypedValue("IFCBOOLEAN".into(), vec![V::Bool(true)])).is_ok());
        assert!(single(V::TypedValue("IFCLABEL".into(), vec![V::String("x".into())])).is_ok());
        assert!(single(V::TypedValue("IFCLABEL".into(), vec![V::Integer(1)])).is_err());
        assert!(single(V::TypedValue("IFCWALL".into(), vec![V::Integer(1)])).is_err());
        assert!(single(V::String("bare".into())).is_err());

        let definition = V::EntityRef(EntityId(3));
        assert!(check("IfcRelDefinesByProperties", "RelatingPropertyDefinition", definition).is_ok());
    }
}
