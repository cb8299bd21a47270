// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linked schema: name lookup, inheritance and select flattening

use crate::declaration::{Attribute, Declaration, EntityDeclaration, InverseAttribute};
use crate::express::parse_schema;
use ifc_orm_model::{Error, Result};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

/// A parsed and linked schema version
///
/// Declarations keep their source order. Lookups by [`declaration`](Self::declaration)
/// use schema casing; [`canonical_name`](Self::canonical_name) maps the
/// upper-case names found in files back to it.
#[derive(Debug)]
pub struct Schema {
    name: String,
    declarations: IndexMap<String, Declaration>,
    canonical: FxHashMap<String, String>,
    /// Direct subtypes per entity, in source order
    children: FxHashMap<String, Vec<String>>,
}

impl Schema {
    /// Parse and link EXPRESS source text
    pub fn parse(source: &str) -> Result<Self> {
        let parsed = parse_schema(source)?;
        Self::link(parsed.name, parsed.declarations)
    }

    /// Link raw declarations: resolve supertypes and flatten attributes
    pub fn link(name: String, raw: Vec<Declaration>) -> Result<Self> {
        let mut declarations = IndexMap::with_capacity(raw.len());
        let mut canonical = FxHashMap::default();
        for declaration in raw {
            let key = declaration.name().to_string();
            if canonical
                .insert(key.to_ascii_uppercase(), key.clone())
                .is_some()
            {
                return Err(Error::schema(format!("duplicate declaration '{}'", key)));
            }
            declarations.insert(key, declaration);
        }

        let mut children: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for declaration in declarations.values() {
            let Some(entity) = declaration.as_entity() else {
                continue;
            };
            if let Some(supertype) = &entity.supertype {
                match declarations.get(supertype) {
                    Some(Declaration::Entity(_)) => {}
                    Some(_) => {
                        return Err(Error::schema(format!(
                            "{} is a subtype of {}, which is not an entity",
                            entity.name, supertype
                        )))
                    }
                    None => {
                        return Err(Error::schema(format!(
                            "{} is a subtype of unknown entity {}",
                            entity.name, supertype
                        )))
                    }
                }
                children
                    .entry(supertype.clone())
                    .or_default()
                    .push(entity.name.clone());
            }
        }

        // Flatten in an order where supertypes come first
        let order = inheritance_order(&declarations)?;
        let mut flattened: FxHashMap<String, (Vec<Attribute>, Vec<InverseAttribute>)> =
            FxHashMap::default();
        for entity_name in &order {
            let Some(Declaration::Entity(entity)) = declarations.get(entity_name) else {
                continue;
            };
            let (mut attributes, mut inverse) = match &entity.supertype {
                Some(supertype) => flattened.get(supertype).cloned().unwrap_or_default(),
                None => Default::default(),
            };
            for redeclared in &entity.derived_overrides {
                match attributes.iter_mut().find(|a| &a.name == redeclared) {
                    Some(attr) => attr.derived = true,
                    None => log::warn!(
                        "{}: derived redeclaration of unknown attribute '{}'",
                        entity.name,
                        redeclared
                    ),
                }
            }
            attributes.extend(entity.attributes.iter().cloned());
            for own in &entity.inverse {
                if !inverse.iter().any(|i| i.name == own.name) {
                    inverse.push(own.clone());
                }
            }
            flattened.insert(entity_name.clone(), (attributes, inverse));
        }
        for (entity_name, (attributes, inverse)) in flattened {
            if let Some(Declaration::Entity(entity)) = declarations.get_mut(&entity_name) {
                entity.all_attributes = attributes;
                entity.all_inverse = inverse;
            }
        }

        log::debug!(
            "linked schema {} with {} declarations",
            name,
            declarations.len()
        );

        Ok(Self {
            name,
            declarations,
            canonical,
            children,
        })
    }

    /// Schema identifier as written in `FILE_SCHEMA`, e.g. `IFC4`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All declarations in source order
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// All entity declarations in source order
    pub fn entities(&self) -> impl Iterator<Item = &EntityDeclaration> {
        self.declarations.values().filter_map(Declaration::as_entity)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Look up a declaration by its exact, schema-cased name
    pub fn declaration(&self, name: &str) -> Result<&Declaration> {
        self.declarations
            .get(name)
            .ok_or_else(|| Error::unknown_type(name))
    }

    /// Same as [`declaration`](Self::declaration) without the error
    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    /// Look up an entity declaration by exact name
    pub fn entity(&self, name: &str) -> Result<&EntityDeclaration> {
        self.declaration(name)?
            .as_entity()
            .ok_or_else(|| Error::unknown_type(format!("{} is not an entity", name)))
    }

    /// Schema casing for any casing of a declared name (`IFCWALL` → `IfcWall`)
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        if self.declarations.contains_key(name) {
            return self.declarations.get_key_value(name).map(|(k, _)| k.as_str());
        }
        self.canonical
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Supertype chain from the root down to `name` inclusive
    pub fn inheritance(&self, name: &str) -> Result<Vec<&str>> {
        let mut chain = Vec::new();
        let mut current = Some(self.entity(name)?);
        while let Some(entity) = current {
            chain.push(entity.name.as_str());
            current = match &entity.supertype {
                Some(supertype) => Some(self.entity(supertype)?),
                None => None,
            };
        }
        chain.reverse();
        Ok(chain)
    }

    /// Whether entity `name` is `ancestor` or inherits from it
    pub fn is_subtype_of(&self, name: &str, ancestor: &str) -> bool {
        let mut current = self.get(name).and_then(Declaration::as_entity);
        while let Some(entity) = current {
            if entity.name == ancestor {
                return true;
            }
            current = entity
                .supertype
                .as_deref()
                .and_then(|s| self.get(s))
                .and_then(Declaration::as_entity);
        }
        false
    }

    /// Direct subtypes of an entity
    pub fn direct_subtypes(&self, name: &str) -> &[String] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitive subtypes of an entity, depth-first, excluding itself
    pub fn subtypes(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = self
            .direct_subtypes(name)
            .iter()
            .rev()
            .map(String::as_str)
            .collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.direct_subtypes(next).iter().rev().map(String::as_str));
        }
        out
    }

    /// Concrete members of a select, nested selects expanded
    ///
    /// Order follows the declaration, duplicates are dropped and cycles
    /// between selects terminate.
    pub fn flatten_select(&self, name: &str) -> Result<Vec<&str>> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        self.flatten_into(name, &mut seen, &mut out)?;
        Ok(out)
    }

    fn flatten_into<'s>(
        &'s self,
        name: &str,
        seen: &mut FxHashSet<&'s str>,
        out: &mut Vec<&'s str>,
    ) -> Result<()> {
        let (key, declaration) = self
            .declarations
            .get_key_value(name)
            .ok_or_else(|| Error::unknown_type(name))?;
        if !seen.insert(key.as_str()) {
            return Ok(());
        }
        match declaration {
            Declaration::Select(select) => {
                for member in &select.members {
                    self.flatten_into(member, seen, out)?;
                }
            }
            _ => out.push(key.as_str()),
        }
        Ok(())
    }
}

/// Entity names ordered so every supertype precedes its subtypes
fn inheritance_order(declarations: &IndexMap<String, Declaration>) -> Result<Vec<String>> {
    let mut order = Vec::new();
    let mut done: FxHashSet<&str> = FxHashSet::default();
    for entity in declarations.values().filter_map(Declaration::as_entity) {
        let mut chain = Vec::new();
        let mut current = Some(entity);
        while let Some(e) = current {
            if done.contains(e.name.as_str()) {
                break;
            }
            if chain.contains(&e.name.as_str()) {
                return Err(Error::schema(format!(
                    "inheritance cycle through {}",
                    e.name
                )));
            }
            chain.push(e.name.as_str());
            current = e
                .supertype
                .as_deref()
                .and_then(|s| declarations.get(s))
                .and_then(Declaration::as_entity);
        }
        for name in chain.into_iter().rev() {
            done.insert(name);
            order.push(name.to_string());
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
SCHEMA MINI;

TYPE Label = STRING;
END_TYPE;

TYPE Colour = ENUMERATION OF (RED, GREEN);
END_TYPE;

TYPE A = SELECT (B, Label);
END_TYPE;

TYPE B = SELECT (A, Colour, Label, Thing);
END_TYPE;

ENTITY Root
 ABSTRACT SUPERTYPE OF (ONEOF (Thing));
  Id : Label;
  Size : OPTIONAL INTEGER;
 INVERSE
  Owners : SET [0:?] OF Owner FOR Owned;
END_ENTITY;

ENTITY Thing
 SUBTYPE OF (Root);
  Tag : OPTIONAL Label;
 DERIVE
  SELF\Root.Size : INTEGER := 3;
  Area : REAL := 1.0;
 INVERSE
  Owners : SET [0:?] OF Owner FOR Owned;
  Parts : SET [0:?] OF Owner FOR Owned;
END_ENTITY;

ENTITY Owner;
  Owned : SET [1:?] OF Root;
END_ENTITY;

END_SCHEMA;
"#;

    #[test]
    fn test_all_attributes_inherited_then_own() {
        let schema = Schema::parse(SOURCE).unwrap();
        let thing = schema.entity("Thing").unwrap();
        let names: Vec<&str> = thing
            .all_attributes()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        // `Area` is derived-only and has no position
        assert_eq!(names, vec!["Id", "Size", "Tag"]);
        assert_eq!(thing.derived(), vec![false, true, false]);

        // The supertype keeps its own view
        let root = schema.entity("Root").unwrap();
        assert_eq!(root.derived(), vec![false, false]);
    }

    #[test]
    fn test_inverse_listed_once() {
        let schema = Schema::parse(SOURCE).unwrap();
        let thing = schema.entity("Thing").unwrap();
        let names: Vec<&str> = thing
            .all_inverse_attributes()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Owners", "Parts"]);
    }

    #[test]
    fn test_declaration_is_case_sensitive() {
        let schema = Schema::parse(SOURCE).unwrap();
        assert!(schema.declaration("Thing").is_ok());
        assert!(matches!(
            schema.declaration("THING"),
            Err(Error::UnknownType(_))
        ));
        assert_eq!(schema.canonical_name("THING"), Some("Thing"));
        assert_eq!(schema.canonical_name("Nope"), None);
    }

    #[test]
    fn test_flatten_select_terminates_on_cycles() {
        let schema = Schema::parse(SOURCE).unwrap();
        assert_eq!(
            schema.flatten_select("A").unwrap(),
            vec!["Colour", "Label", "Thing"]
        );
        assert_eq!(
            schema.flatten_select("B").unwrap(),
            vec!["Label", "Colour", "Thing"]
        );
    }

    #[test]
    fn test_subtypes_and_inheritance() {
        let schema = Schema::parse(SOURCE).unwrap();
        assert!(schema.is_subtype_of("Thing", "Root"));
        assert!(!schema.is_subtype_of("Root", "Thing"));
        assert_eq!(schema.subtypes("Root"), vec!["Thing"]);
        assert_eq!(schema.inheritance("Thing").unwrap(), vec!["Root", "Thing"]);
    }

    #[test]
    fn test_unknown_supertype_is_rejected() {
        let err = Schema::parse(
            "SCHEMA X;\nENTITY A SUBTYPE OF (Missing);\nEND_ENTITY;\nEND_SCHEMA;",
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown entity Missing"), "{}", err);
    }

    #[test]
    fn test_inheritance_cycle_is_rejected() {
        let err = Schema::parse(
            "SCHEMA X;\nENTITY A SUBTYPE OF (B);\nEND_ENTITY;\nENTITY B SUBTYPE OF (A);\nEND_ENTITY;\nEND_SCHEMA;",
        )
        .unwrap_err();
        assert!(err.to_string().contains("cycle"), "{}", err);
    }
}
