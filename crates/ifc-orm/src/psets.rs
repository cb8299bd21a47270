// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property sets as nested maps
//!
//! Scalars are stored as `IfcPropertySingleValue` with an `IfcBoolean`,
//! `IfcInteger`, `IfcReal` or `IfcLabel` nominal value. Maps and lists are
//! stored as `IfcComplexProperty`; the usage name tells them apart (`{}` or
//! `[]`) and list items are keyed by their index.
//!
//! A complex property needs at least one member, so an empty map or list is
//! stored as a single value without a nominal value whose description holds
//! the `{}` or `[]` marker.

use crate::entity::Entity;
use crate::file::IfcFile;
use crate::value::Value;
use ifc_orm_model::{Error, PropertyMap, PropertySets, PropertyValue, Result};
use ifc_orm_parser::new_global_id;

pub const PROPERTY_SET: &str = "IfcPropertySet";
pub const SINGLE_VALUE: &str = "IfcPropertySingleValue";
pub const COMPLEX: &str = "IfcComplexProperty";
pub const DEFINES_BY_PROPERTIES: &str = "IfcRelDefinesByProperties";

/// Usage name of a complex property holding a map
pub const MAP_USAGE: &str = "{}";
/// Usage name of a complex property holding a list
pub const LIST_USAGE: &str = "[]";

/// Create an `IfcPropertySet` named `name` holding `properties`
///
/// An empty top-level map is rejected since a property set needs at least
/// one property.
pub fn to_records(file: &IfcFile, name: &str, properties: &PropertyMap) -> Result<Entity> {
    if properties.is_empty() {
        return Err(Error::invalid_value(
            "HasProperties",
            "{}",
            "a property set needs at least one property",
        ));
    }
    let members = property_records(file, properties.iter().map(|(k, v)| (k.clone(), v)))?;
    let mut attributes = vec![
        ("GlobalId", Value::from(new_global_id())),
        ("Name", Value::from(name)),
        ("HasProperties", Value::List(members)),
    ];
    if let Some(owner) = owner_history(file)? {
        attributes.push(("OwnerHistory", Value::from(owner)));
    }
    file.create_entity(PROPERTY_SET, attributes)
}

fn property_records<'a>(
    file: &IfcFile,
    properties: impl Iterator<Item = (String, &'a PropertyValue)>,
) -> Result<Vec<Value>> {
    properties
        .map(|(key, value)| property_record(file, &key, value).map(Value::from))
        .collect()
}

fn property_record(file: &IfcFile, name: &str, value: &PropertyValue) -> Result<Entity> {
    let (usage, members) = match value {
        PropertyValue::Map(map) if map.is_empty() => return empty_container(file, name, MAP_USAGE),
        PropertyValue::List(items) if items.is_empty() => {
            return empty_container(file, name, LIST_USAGE)
        }
        PropertyValue::Map(map) => (
            MAP_USAGE,
            property_records(file, map.iter().map(|(k, v)| (k.clone(), v)))?,
        ),
        PropertyValue::List(items) => (
            LIST_USAGE,
            property_records(file, items.iter().enumerate().map(|(i, v)| (i.to_string(), v)))?,
        ),
        scalar => {
            return file.create_entity(
                SINGLE_VALUE,
                [
                    ("Name", Value::from(name)),
                    ("NominalValue", nominal_value(scalar)),
                ],
            );
        }
    };
    file.create_entity(
        COMPLEX,
        [
            ("Name", Value::from(name)),
            ("UsageName", Value::from(usage)),
            ("HasProperties", Value::List(members)),
        ],
    )
}

/// Valueless single value standing in for an empty map or list
fn empty_container(file: &IfcFile, name: &str, marker: &str) -> Result<Entity> {
    file.create_entity(
        SINGLE_VALUE,
        [
            ("Name", Value::from(name)),
            ("Description", Value::from(marker)),
        ],
    )
}

/// Typed nominal value for a scalar property
fn nominal_value(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Bool(b) => Value::typed("IfcBoolean", *b),
        PropertyValue::Integer(i) => Value::typed("IfcInteger", *i),
        PropertyValue::Real(r) => Value::typed("IfcReal", *r),
        PropertyValue::Label(s) => Value::typed("IfcLabel", s.as_str()),
        PropertyValue::List(_) | PropertyValue::Map(_) => Value::Null,
    }
}

/// Owner history used for new records: the first one in the file
fn owner_history(file: &IfcFile) -> Result<Option<Entity>> {
    let first = file
        .session()
        .ids_of_type("IfcOwnerHistory", false)?
        .first()
        .copied();
    first.map(|id| file.entity(id)).transpose()
}

/// Rebuild the map of an `IfcPropertySet` or `IfcComplexProperty`
///
/// Properties without a value and property kinds other than single values
/// and complex properties are skipped.
pub fn from_records(container: &Entity) -> Result<PropertyMap> {
    let mut map = PropertyMap::new();
    for member in container.get("HasProperties")?.entities() {
        let Some(name) = member.get("Name")?.as_str().map(str::to_string) else {
            continue;
        };
        if let Some(value) = property_value(&member)? {
            map.insert(name, value);
        }
    }
    Ok(map)
}

fn property_value(property: &Entity) -> Result<Option<PropertyValue>> {
    if property.is_a_type(SINGLE_VALUE) {
        let value = property.get("NominalValue")?;
        if value.is_null() {
            return Ok(match property.get("Description")?.as_str() {
                Some(MAP_USAGE) => Some(PropertyValue::Map(PropertyMap::new())),
                Some(LIST_USAGE) => Some(PropertyValue::List(Vec::new())),
                _ => None,
            });
        }
        return Ok(scalar(value));
    }
    if !property.is_a_type(COMPLEX) {
        log::debug!("skipping unsupported property {:?}", property);
        return Ok(None);
    }
    let map = from_records(property)?;
    let usage = property.get("UsageName")?;
    if usage.as_str() == Some(LIST_USAGE) {
        let mut items: Vec<(usize, PropertyValue)> = Vec::with_capacity(map.len());
        for (key, value) in map {
            match key.parse::<usize>() {
                Ok(index) => items.push((index, value)),
                Err(_) => log::warn!("{:?} has non-index list key {:?}", property, key),
            }
        }
        items.sort_by_key(|(index, _)| *index);
        Ok(Some(PropertyValue::List(items.into_iter().map(|(_, v)| v).collect())))
    } else {
        Ok(Some(PropertyValue::Map(map)))
    }
}

fn scalar(value: Value) -> Option<PropertyValue> {
    match value.untyped() {
        Value::Bool(b) => Some(PropertyValue::Bool(b)),
        Value::Integer(i) => Some(PropertyValue::Integer(i)),
        Value::Real(r) => Some(PropertyValue::Real(r)),
        Value::String(s) => Some(PropertyValue::Label(s)),
        Value::Enum(e) if e == "T" => Some(PropertyValue::Bool(true)),
        Value::Enum(e) if e == "F" => Some(PropertyValue::Bool(false)),
        Value::Enum(e) => Some(PropertyValue::Label(e)),
        _ => None,
    }
}

/// Property sets attached to `object` through `IfcRelDefinesByProperties`
///
/// Sets are keyed by name; a later set with the same name is merged into
/// the earlier one.
pub fn property_sets(object: &Entity) -> Result<PropertySets> {
    let mut sets = PropertySets::new();
    if object.is_transient() {
        return Ok(sets);
    }
    let file = object.file()?;
    let relations = file
        .session()
        .referencing(object.id(), DEFINES_BY_PROPERTIES, "RelatedObjects")?;
    for relation in relations {
        let relation = file.entity(relation)?;
        let Some(pset) = relation.get("RelatingPropertyDefinition")?.as_entity().cloned() else {
            continue;
        };
        if !pset.is_a_type(PROPERTY_SET) {
            continue;
        }
        let name = pset.get("Name")?.as_str().unwrap_or_default().to_string();
        let properties = from_records(&pset)?;
        sets.entry(name).or_default().extend(properties);
    }
    Ok(sets)
}

/// Attach `sets` to `object`, one `IfcRelDefinesByProperties` per set
///
/// Sets equal to one written earlier through the same file share its
/// `IfcPropertySet` record. Existing sets of `object` are kept.
pub fn set_property_sets(object: &Entity, sets: &PropertySets) -> Result<Vec<Entity>> {
    let file = object.file()?;
    file.commit(object)?;
    let mut relations = Vec::with_capacity(sets.len());

    for (name, properties) in sets {
        let key = serde_json::to_string(&(name, properties))
            .map_err(|e| Error::other(format!("property set key: {}", e)))?;
        let cached = file.pset_cache().borrow().get(&key).copied();
        let pset = match cached.and_then(|id| file.by_id(id)) {
            Some(pset) => {
                let linked = file
                    .session()
                    .referencing(object.id(), DEFINES_BY_PROPERTIES, "RelatedObjects")?
                    .into_iter()
                    .any(|rel| {
                        file.session()
                            .get(rel, "RelatingPropertyDefinition")
                            .map(|v| v.as_entity_ref() == Some(pset.id()))
                            .unwrap_or(false)
                    });
                if linked {
                    continue;
                }
                pset
            }
            None => {
                let pset = to_records(&file, name, properties)?;
                file.pset_cache().borrow_mut().insert(key, pset.id());
                pset
            }
        };

        let mut attributes = vec![
            ("GlobalId", Value::from(new_global_id())),
            ("RelatedObjects", Value::List(vec![Value::from(object)])),
            ("RelatingPropertyDefinition", Value::from(&pset)),
        ];
        if let Some(owner) = owner_history(&file)? {
            attributes.push(("OwnerHistory", Value::from(owner)));
        }
        relations.push(file.create_entity(DEFINES_BY_PROPERTIES, attributes)?);
    }
    Ok(relations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileOptions;
    use ifc_orm_model::{property_map, EntityId};
    use pretty_assertions::assert_eq;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('psets.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall',$,$,$,$,$,$);
#2=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOI',$,'Other',$,$,$,$,$,$);
#10=IFCPROPERTYSINGLEVALUE('IsExternal',$,IFCBOOLEAN(.T.),$);
#11=IFCPROPERTYSINGLEVALUE('Width',$,IFCLENGTHMEASURE(0.2),$);
#12=IFCPROPERTYSINGLEVALUE('Empty',$,$,$);
#13=IFCPROPERTYSINGLEVALUE('Note',$,IFCTEXT('plastered'),$);
#14=IFCPROPERTYSET('3kN2pA0Mj4OBYUGHx1qJxT',$,'Pset_WallCommon',$,(#10,#11,#12,#13));
#15=IFCRELDEFINESBYPROPERTIES('3kN2pA0Mj4OBYUGHx1qJxU',$,$,$,(#1),#14);
ENDSEC;
END-ISO-10303-21;
"#;

    fn file() -> IfcFile {
        IfcFile::from_content(TEST_IFC, FileOptions::new()).unwrap()
    }

    #[test]
    fn test_reads_existing_set() {
        let file = file();
        let wall = file.entity(EntityId(1)).unwrap();
        let sets = property_sets(&wall).unwrap();
        assert_eq!(
            sets["Pset_WallCommon"],
            property_map! { "IsExternal" => true, "Width" => 0.2, "Note" => "plastered" }
        );
        assert!(property_sets(&file.entity(EntityId(2)).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_nested_round_trip() {
        let file = file();
        let properties = property_map! {
            "Flag" => false,
            "Count" => 3,
            "Ratio" => 0.5,
            "Layers" => vec![
                PropertyValue::from("gypsum"),
                PropertyValue::Map(property_map! { "Thickness" => 0.0125, "Fire" => true }),
            ],
            "Meta" => property_map! { "Author" => "x", "Tags" => vec![1, 2, 3] },
        };
        let pset = to_records(&file, "Pset_Custom", &properties).unwrap();
        assert_eq!(pset.get("Name").unwrap().as_str(), Some("Pset_Custom"));
        assert_eq!(from_records(&pset).unwrap(), properties);
    }

    #[test]
    fn test_list_usage_name() {
        let file = file();
        let pset = to_records(&file, "P", &property_map! { "L" => vec!["a", "b"] }).unwrap();
        let list = &pset.get("HasProperties").unwrap().entities()[0];
        assert_eq!(list.type_name(), COMPLEX);
        assert_eq!(list.get("UsageName").unwrap().as_str(), Some(LIST_USAGE));
        let names: Vec<String> = list
            .get("HasProperties")
            .unwrap()
            .entities()
            .iter()
            .map(|p| p.get("Name").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["0", "1"]);
    }

    #[test]
    fn test_empty_containers_round_trip() {
        let file = file();
        let properties = property_map! {
            "L" => Vec::<PropertyValue>::new(),
            "M" => PropertyMap::new(),
            "Nested" => property_map! { "Inner" => PropertyMap::new(), "Count" => 1 },
            "Items" => vec![PropertyValue::List(Vec::new()), PropertyValue::from("x")],
        };
        let pset = to_records(&file, "P", &properties).unwrap();
        assert_eq!(from_records(&pset).unwrap(), properties);

        let empty_list = &pset.get("HasProperties").unwrap().entities()[0];
        assert_eq!(empty_list.type_name(), SINGLE_VALUE);
        assert_eq!(empty_list.get("Description").unwrap().as_str(), Some(LIST_USAGE));
        assert!(empty_list.get("NominalValue").unwrap().is_null());

        let text = file.to_step(&Default::default()).unwrap();
        let back = IfcFile::from_content(text, FileOptions::new()).unwrap();
        let pset = back.entity(pset.id()).unwrap();
        assert_eq!(from_records(&pset).unwrap(), properties);
    }

    #[test]
    fn test_empty_property_set_is_rejected() {
        let file = file();
        assert!(matches!(
            to_records(&file, "P", &PropertyMap::new()),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_set_property_sets_shares_equal_sets() {
        let file = file();
        let a = file.entity(EntityId(1)).unwrap();
        let b = file.entity(EntityId(2)).unwrap();
        let mut sets = PropertySets::new();
        sets.insert("Pset_Custom".into(), property_map! { "Flag" => true, "Count" => 3 });

        let first = set_property_sets(&a, &sets).unwrap();
        let second = set_property_sets(&b, &sets).unwrap();
        let pset_of = |rel: &Entity| rel.get("RelatingPropertyDefinition").unwrap();
        assert_eq!(pset_of(&first[0]), pset_of(&second[0]));
        assert_ne!(first[0], second[0]);

        assert!(set_property_sets(&a, &sets).unwrap().is_empty());
        assert_eq!(property_sets(&b).unwrap()["Pset_Custom"], sets["Pset_Custom"]);
        assert_eq!(property_sets(&a).unwrap().len(), 2);
    }
}
