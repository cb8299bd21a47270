// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-ORM Schema - EXPRESS schema catalog
//!
//! Loads a named schema version and exposes its declarations: entity
//! attributes (inherited first, with derived flags), inverse attributes,
//! enumerations, selects and type aliases.
//!
//! # Example
//!
//! ```
//! let schema = ifc_orm_schema::load("ifc4").unwrap();
//! let wall = schema.entity("IfcWall").unwrap();
//! assert_eq!(wall.all_attributes()[2].name, "Name");
//! assert!(schema.is_subtype_of("IfcWall", "IfcProduct"));
//! ```

pub mod declaration;
pub mod express;
pub mod schema;

pub use declaration::*;
pub use schema::Schema;

use ifc_orm_model::{Error, Result};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Schema versions compiled into the catalog
const EMBEDDED: &[(&str, &str)] = &[
    ("IFC2X3", include_str!("../schemas/IFC2X3.exp")),
    ("IFC4", include_str!("../schemas/IFC4.exp")),
];

static LOADED: Lazy<RwLock<FxHashMap<&'static str, Arc<Schema>>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Names of the schema versions the catalog can load
pub fn available() -> Vec<&'static str> {
    EMBEDDED.iter().map(|(name, _)| *name).collect()
}

/// EXPRESS source of an embedded schema version
pub fn source(name: &str) -> Result<&'static str> {
    EMBEDDED
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, source)| *source)
        .ok_or_else(|| Error::SchemaNotFound(name.to_string()))
}

/// Load a schema version by name, ignoring case
///
/// Linked schemas are cached for the lifetime of the process.
pub fn load(name: &str) -> Result<Arc<Schema>> {
    let Some(&(key, text)) = EMBEDDED
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
    else {
        return Err(Error::SchemaNotFound(name.to_string()));
    };

    if let Ok(loaded) = LOADED.read() {
        if let Some(schema) = loaded.get(key) {
            return Ok(Arc::clone(schema));
        }
    }

    let schema = Arc::new(Schema::parse(text)?);
    log::debug!("loaded schema {}", key);
    let mut loaded = LOADED
        .write()
        .map_err(|_| Error::other("schema cache poisoned"))?;
    Ok(Arc::clone(loaded.entry(key).or_insert(schema)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_is_case_insensitive_and_cached() {
        let a = load("IFC4").unwrap();
        let b = load("ifc4").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "IFC4");
    }

    #[test]
    fn test_unknown_schema() {
        assert!(matches!(load("IFC9"), Err(Error::SchemaNotFound(name)) if name == "IFC9"));
    }

    #[test]
    fn test_embedded_schemas_link() {
        for name in available() {
            let schema = load(name).unwrap();
            assert!(schema.entity("IfcProject").is_ok(), "{}", name);
            assert!(schema.entity("IfcWall").is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_ifc4_derived_dimensions() {
        let schema = load("IFC4").unwrap();
        let unit = schema.entity("IfcSIUnit").unwrap();
        let dims = unit.attribute_index("Dimensions").unwrap();
        assert_eq!(dims, 0);
        assert!(unit.all_attributes()[dims].derived);
    }

    #[test]
    fn test_ifc4_inverse_relations() {
        let schema = load("IFC4").unwrap();
        let storey = schema.entity("IfcBuildingStorey").unwrap();
        let decomposed = storey.inverse_attribute("IsDecomposedBy").unwrap();
        assert_eq!(decomposed.entity, "IfcRelAggregates");
        assert_eq!(decomposed.attribute, "RelatingObject");
        assert!(storey.inverse_attribute("ContainsElements").is_some());

        let wall = schema.entity("IfcWall").unwrap();
        let contained = wall.inverse_attribute("ContainedInStructure").unwrap();
        assert_eq!(contained.attribute, "RelatedElements");
    }

    #[test]
    fn test_material_associations() {
        for name in available() {
            let schema = load(name).unwrap();
            let wall = schema.entity("IfcWall").unwrap();
            let associations = wall.inverse_attribute("HasAssociations").unwrap();
            assert_eq!(associations.entity, "IfcRelAssociates", "{}", name);
            assert_eq!(associations.attribute, "RelatedObjects", "{}", name);
            assert_eq!(schema.flatten_select("IfcMaterialSelect").unwrap().len(), 1, "{}", name);
            assert!(schema.is_subtype_of("IfcRelAssociatesMaterial", "IfcRelationship"));
            assert!(schema.entity("IfcMaterial").is_ok(), "{}", name);
        }
        assert!(load("IFC4").unwrap().is_subtype_of("IfcGeographicElement", "IfcElement"));
        assert!(load("IFC2X3").unwrap().entity("IfcGeographicElement").is_err());
    }

    #[test]
    fn test_ifc4_value_select_flattens() {
        let schema = load("IFC4").unwrap();
        let members = schema.flatten_select("IfcValue").unwrap();
        for expected in ["IfcLabel", "IfcReal", "IfcBoolean", "IfcInteger", "IfcLengthMeasure"] {
            assert!(members.contains(&expected), "{} missing", expected);
        }
    }
}
