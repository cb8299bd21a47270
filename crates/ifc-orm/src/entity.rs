// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The entity handle every generated class wraps
//!
//! An [`Entity`] is a cheap, reference-counted handle on one record of an
//! [`IfcFile`]. The file hands out at most one handle per id, so handle
//! equality is record identity. Transient entities (created but not yet
//! added to the file) hold their record privately and compare by handle
//! only.
//!
//! Attribute reads go through the file on every call; values that refer to
//! other records come back as entities from the same identity map.

use crate::class::EntityClass;
use crate::file::{FileInner, IfcFile};
use crate::value::{FromValue, IntoValue, Value};
use ifc_orm_geometry::{Frame, Matrix4};
use ifc_orm_model::{AttributeValue, DecodedEntity, EntityId, Error, Result, Style};
use ifc_orm_schema::Schema;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Access to the underlying [`Entity`] of a typed wrapper
pub trait AsEntity {
    fn as_entity(&self) -> &Entity;
}

/// A generated entity class
pub trait EntityType: AsEntity + Sized {
    /// Schema-cased name of the class
    const TYPE_NAME: &'static str;

    /// Wrap an entity without checking its type
    fn from_entity_unchecked(entity: Entity) -> Self;
}

impl AsEntity for Entity {
    fn as_entity(&self) -> &Entity {
        self
    }
}

/// Records placement chains are built from
///
/// Writing one of them drops the frames, transformations and geometry of
/// every product in the file.
const PLACEMENT_TYPES: [&str; 4] = ["IfcObjectPlacement", "IfcPlacement", "IfcCartesianPoint", "IfcDirection"];

/// Values computed from the record graph
///
/// Dropped when the entity itself is written. The frame and transformation
/// also depend on placement records, so they are dropped file-wide when one
/// of those is written.
#[derive(Debug, Default)]
pub(crate) struct DerivedCache {
    pub parent: Option<Option<EntityId>>,
    pub frame: Option<Frame>,
    pub transformation: Option<Matrix4<f64>>,
    pub style: Option<Style>,
}

pub(crate) struct EntityInner {
    id: Cell<EntityId>,
    type_name: String,
    schema: Arc<Schema>,
    file: Weak<FileInner>,
    /// Record of a transient entity until it is committed
    pending: RefCell<Option<DecodedEntity>>,
    cache: RefCell<DerivedCache>,
}

/// Handle on one record of an open file
#[derive(Clone)]
pub struct Entity(Rc<EntityInner>);

impl Entity {
    pub(crate) fn attached(
        id: EntityId,
        type_name: impl Into<String>,
        schema: Arc<Schema>,
        file: Weak<FileInner>,
    ) -> Self {
        Self(Rc::new(EntityInner {
            id: Cell::new(id),
            type_name: type_name.into(),
            schema,
            file,
            pending: RefCell::new(None),
            cache: RefCell::new(DerivedCache::default()),
        }))
    }

    pub(crate) fn transient(record: DecodedEntity, schema: Arc<Schema>, file: Weak<FileInner>) -> Self {
        Self(Rc::new(EntityInner {
            id: Cell::new(EntityId::TRANSIENT),
            type_name: record.type_name.clone(),
            schema,
            file,
            pending: RefCell::new(Some(record)),
            cache: RefCell::new(DerivedCache::default()),
        }))
    }

    /// Instance name, `#0` while transient
    pub fn id(&self) -> EntityId {
        self.0.id.get()
    }

    /// Concrete type in schema casing
    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /// Concrete type in schema casing
    pub fn is_a(&self) -> &str {
        &self.0.type_name
    }

    /// Whether this entity is of type `name` or one of its subtypes
    ///
    /// `name` may use any casing.
    pub fn is_a_type(&self, name: &str) -> bool {
        if self.0.type_name.eq_ignore_ascii_case(name) {
            return true;
        }
        match self.0.schema.canonical_name(name) {
            Some(ancestor) => self.0.schema.is_subtype_of(&self.0.type_name, ancestor),
            None => false,
        }
    }

    /// Supertype chain from the root down to the concrete type
    pub fn inheritance(&self) -> Vec<&str> {
        self.0.schema.inheritance(&self.0.type_name).unwrap_or_default()
    }

    pub fn is_transient(&self) -> bool {
        self.0.pending.borrow().is_some()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.0.schema
    }

    /// Generated class metadata for the concrete type
    pub fn class(&self) -> Option<&'static EntityClass> {
        crate::generated::registry_for(self.0.schema.name())?.class(&self.0.type_name)
    }

    /// The owning file
    pub fn file(&self) -> Result<IfcFile> {
        self.0
            .file
            .upgrade()
            .map(IfcFile::from_inner)
            .ok_or(Error::SessionClosed)
    }

    /// Attribute names in positional order
    pub fn attribute_names(&self) -> Vec<&str> {
        self.0
            .schema
            .entity(&self.0.type_name)
            .map(|d| d.all_attributes().iter().map(|a| a.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Read an attribute
    ///
    /// References come back as entities of the same file. Fails with
    /// `UnknownAttribute` when the concrete type has no such attribute.
    pub fn get(&self, attribute: &str) -> Result<Value> {
        let file = self.file()?;
        let raw = match &*self.0.pending.borrow() {
            Some(record) => {
                let index = file.session().attribute_index(&record.type_name, attribute)?;
                record.get(index).cloned().unwrap_or_default()
            }
            None => file.session().get(self.id(), attribute)?,
        };
        file.to_value(raw)
    }

    /// Write an attribute
    ///
    /// Entities in `value` are unwrapped to references; transient ones are
    /// committed first. Values are checked against the schema. Writing a
    /// derived attribute or the current value again does nothing.
    pub fn set(&self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        let file = self.file()?;
        let raw = file.to_raw(value.into())?;

        if self.is_transient() {
            let index = file
                .session()
                .check_attribute(&self.0.type_name, attribute, &raw)?;
            if let (Some(index), Some(record)) = (index, self.0.pending.borrow_mut().as_mut()) {
                if record.attributes.len() <= index {
                    record.attributes.resize(index + 1, AttributeValue::Null);
                }
                record.attributes[index] = raw;
            }
        } else {
            file.session_mut().set(self.id(), attribute, raw)?;
            if PLACEMENT_TYPES.iter().any(|t| self.is_a_type(t)) {
                file.forget_placements();
            } else {
                file.forget_geometry(self.id());
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Write several attributes in order
    ///
    /// Not transactional: when one write fails, the earlier ones stay.
    pub fn set_attributes<'a, V: Into<Value>>(
        &self,
        attributes: impl IntoIterator<Item = (&'a str, V)>,
    ) -> Result<()> {
        for (name, value) in attributes {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Read an attribute converted to `T`
    pub fn get_typed<T: FromValue>(&self, attribute: &str) -> Result<T> {
        let value = self.get(attribute)?;
        let kind = value.kind();
        T::from_value(value).map_err(|e| Error::invalid_value(attribute, kind, e.to_string()))
    }

    pub fn set_typed<T: IntoValue>(&self, attribute: &str, value: T) -> Result<()> {
        self.set(attribute, value.into_value())
    }

    /// Records whose forward attribute refers to this entity
    ///
    /// `name` is an inverse attribute of the concrete type or one of its
    /// supertypes. Transient entities have no inverses.
    pub fn inverse(&self, name: &str) -> Result<Vec<Entity>> {
        let declaration = self.0.schema.entity(&self.0.type_name)?;
        let inverse = declaration
            .inverse_attribute(name)
            .ok_or_else(|| Error::unknown_attribute(&self.0.type_name, name))?;
        if self.is_transient() {
            return Ok(Vec::new());
        }
        let file = self.file()?;
        let ids = file
            .session()
            .referencing(self.id(), &inverse.entity, &inverse.attribute)?;
        ids.into_iter().map(|id| file.entity(id)).collect()
    }

    pub fn inverse_typed<T: EntityType>(&self, name: &str) -> Result<Vec<T>> {
        Ok(self
            .inverse(name)?
            .into_iter()
            .map(T::from_entity_unchecked)
            .collect())
    }

    /// This entity as generated class `T`, if it is one
    pub fn cast<T: EntityType>(&self) -> Result<T> {
        if self.is_a_type(T::TYPE_NAME) {
            Ok(T::from_entity_unchecked(self.clone()))
        } else {
            Err(Error::other(format!(
                "{} {} is not a {}",
                self.0.type_name,
                self.id(),
                T::TYPE_NAME
            )))
        }
    }

    /// Snapshot of the attributes as a plain mapping
    pub fn to_mapping(&self, options: &MappingOptions) -> Result<Mapping> {
        let mut visiting = FxHashSet::default();
        self.mapping_into(options, &mut visiting)
    }

    /// [`to_mapping`](Self::to_mapping) rendered as JSON
    pub fn to_json(&self, options: &MappingOptions) -> Result<serde_json::Value> {
        let mapping = self.to_mapping(options)?;
        serde_json::to_value(mapping).map_err(|e| Error::other(e.to_string()))
    }

    fn mapping_into(&self, options: &MappingOptions, visiting: &mut FxHashSet<Entity>) -> Result<Mapping> {
        visiting.insert(self.clone());
        let mut out = Mapping::new();
        for name in self.attribute_names() {
            if !options.accepts(name) {
                continue;
            }
            let value = self.get(name)?;
            out.insert(name.to_string(), mapped(value, options, visiting)?);
        }
        visiting.remove(self);
        Ok(out)
    }

    /// Drop values derived from the record graph
    pub fn invalidate(&self) {
        *self.0.cache.borrow_mut() = DerivedCache::default();
    }

    pub(crate) fn forget_placement(&self) {
        let mut cache = self.0.cache.borrow_mut();
        cache.frame = None;
        cache.transformation = None;
    }

    pub(crate) fn cache(&self) -> &RefCell<DerivedCache> {
        &self.0.cache
    }

    pub(crate) fn pending(&self) -> Ref<'_, Option<DecodedEntity>> {
        self.0.pending.borrow()
    }

    /// Take the pending record for committing
    pub(crate) fn take_pending(&self) -> Option<DecodedEntity> {
        self.0.pending.borrow_mut().take()
    }

    /// Put back a record whose commit failed
    pub(crate) fn restore_pending(&self, record: DecodedEntity) {
        *self.0.pending.borrow_mut() = Some(record);
    }

    pub(crate) fn set_id(&self, id: EntityId) {
        self.0.id.set(id);
    }

    pub(crate) fn belongs_to(&self, file: &Rc<FileInner>) -> bool {
        std::ptr::eq(self.0.file.as_ptr(), Rc::as_ptr(file))
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_transient() {
            write!(f, "{} (transient)", self.0.type_name)
        } else {
            write!(f, "{}={}", self.id(), self.0.type_name)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn mapped(value: Value, options: &MappingOptions, visiting: &mut FxHashSet<Entity>) -> Result<Mapped> {
    Ok(match value {
        Value::Null | Value::Derived => Mapped::Null,
        Value::Bool(v) => Mapped::Bool(v),
        Value::Integer(v) => Mapped::Integer(v),
        Value::Real(v) => Mapped::Real(v),
        Value::String(s) | Value::Enum(s) | Value::Binary(s) => Mapped::String(s),
        Value::Typed(_, inner) => mapped(*inner, options, visiting)?,
        Value::List(items) => Mapped::List(
            items
                .into_iter()
                .map(|item| mapped(item, options, visiting))
                .collect::<Result<_>>()?,
        ),
        Value::Entity(entity) => {
            if options.recursive && !visiting.contains(&entity) {
                Mapped::Record(entity.mapping_into(options, visiting)?)
            } else {
                Mapped::Reference(entity.id().to_string())
            }
        }
    })
}

/// Attribute name to plain value, in positional order
pub type Mapping = IndexMap<String, Mapped>;

/// A plain attribute value inside a [`Mapping`]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Mapped {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    /// Strings, enumeration items and binary digits
    String(String),
    /// Referenced record by instance name, e.g. `#12`
    Reference(String),
    List(Vec<Mapped>),
    /// Referenced record expanded in place
    Record(Mapping),
}

/// Options for [`Entity::to_mapping`]
#[derive(Debug, Clone, Default)]
pub struct MappingOptions {
    pub recursive: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl MappingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand referenced records instead of naming them; cycles stay references
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Keep only these attributes
    pub fn with_include<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.include = names.into_iter().map(Into::into).collect();
        self
    }

    /// Leave out these attributes
    pub fn with_exclude<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    fn accepts(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|n| n == name))
            && !self.exclude.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileOptions, IfcFile};
    use pretty_assertions::assert_eq;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('test.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCAXIS2PLACEMENT3D(#1,$,$);
#3=IFCLOCALPLACEMENT($,#2);
#10=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall A',$,$,#3,$,$,.STANDARD.);
#11=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
ENDSEC;
END-ISO-10303-21;
"#;

    fn file() -> IfcFile {
        IfcFile::from_content(TEST_IFC, FileOptions::new()).unwrap()
    }

    #[test]
    fn test_get_reads_through() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        assert_eq!(wall.is_a(), "IfcWall");
        assert_eq!(wall.get("Name").unwrap(), Value::String("Wall A".into()));
        assert_eq!(wall.get("PredefinedType").unwrap(), Value::Enum("STANDARD".into()));
        assert!(wall.get("Description").unwrap().is_null());
    }

    #[test]
    fn test_references_come_back_wrapped() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        let placement = wall.get("ObjectPlacement").unwrap();
        let placement = placement.as_entity().unwrap();
        assert_eq!(placement.type_name(), "IfcLocalPlacement");
        assert_eq!(placement, &file.entity(EntityId(3)).unwrap());
    }

    #[test]
    fn test_unknown_attribute() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        assert!(matches!(
            wall.get("NoSuchAttribute"),
            Err(Error::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_set_checks_and_writes() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        wall.set("Name", "Wall B").unwrap();
        assert_eq!(wall.get_typed::<String>("Name").unwrap(), "Wall B");

        let err = wall.set("Name", 12_i64).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref attribute, .. } if attribute == "Name"));
        assert_eq!(wall.get_typed::<String>("Name").unwrap(), "Wall B");
    }

    #[test]
    fn test_same_value_is_a_no_op() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        wall.set("Name", "Wall A").unwrap();
        assert!(!file.is_modified());
    }

    #[test]
    fn test_derived_write_is_ignored() {
        let file = file();
        let unit = file.entity(EntityId(11)).unwrap();
        let before = unit.get("Dimensions").unwrap();
        unit.set("Dimensions", Value::Null).unwrap();
        assert_eq!(unit.get("Dimensions").unwrap(), before);
    }

    #[test]
    fn test_is_a_type_walks_supertypes() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        assert!(wall.is_a_type("IfcWall"));
        assert!(wall.is_a_type("IFCPRODUCT"));
        assert!(!wall.is_a_type("IfcSlab"));
        assert_eq!(wall.inheritance().first(), Some(&"IfcRoot"));
        assert_eq!(wall.inheritance().last(), Some(&"IfcWall"));
    }

    #[test]
    fn test_transient_set_before_commit() {
        let file = file();
        let slab = file.new_entity("IfcSlab", Vec::<(&str, Value)>::new()).unwrap();
        assert!(slab.is_transient());
        slab.set("Name", "Floor").unwrap();
        assert_eq!(slab.get("Name").unwrap(), Value::from("Floor"));
        assert!(slab.inverse("ContainedInStructure").unwrap().is_empty());
        assert!(slab.set("Name", 1.5).is_err());
    }

    #[test]
    fn test_mapping_order_and_filters() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        let mapping = wall.to_mapping(&MappingOptions::new()).unwrap();
        let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
        assert_eq!(keys, wall.attribute_names());
        assert_eq!(mapping["ObjectPlacement"], Mapped::Reference("#3".into()));

        let filtered = wall
            .to_mapping(&MappingOptions::new().with_include(["Name", "Tag"]).with_exclude(["Tag"]))
            .unwrap();
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["Name"]);
    }

    #[test]
    fn test_recursive_mapping_expands_references() {
        let file = file();
        let wall = file.entity(EntityId(10)).unwrap();
        let mapping = wall
            .to_mapping(&MappingOptions::new().with_recursive(true).with_include(["ObjectPlacement", "RelativePlacement", "Location"]))
            .unwrap();
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(
            json,
            r#"{"ObjectPlacement":{"RelativePlacement":{"Location":{}}}}"#
        );
    }

    #[test]
    fn test_entity_outlives_file() {
        let wall = {
            let file = file();
            file.entity(EntityId(10)).unwrap()
        };
        assert!(matches!(wall.get("Name"), Err(Error::SessionClosed)));
        assert_eq!(format!("{:?}", wall), "#10=IfcWall");
    }
}
