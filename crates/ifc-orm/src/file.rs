// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An open file and everything scoped to it
//!
//! [`IfcFile`] owns the engine session together with the identity map, the
//! geometry cache and the property set cache. All of them live and die with
//! the file; nothing is shared between files.

use crate::entity::Entity;
use crate::identity::IdentityMap;
use crate::value::Value;
use ifc_orm_geometry::{preload, GeometryBackend, StyleIndex, TessellationBackend};
use ifc_orm_model::{
    AttributeValue, DecodedEntity, EntityGeometry, EntityId, Error, ModelMetadata, Result,
};
use ifc_orm_parser::{Session, WriterOptions};
use ifc_orm_schema::Schema;
use rustc_hash::FxHashMap;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// Options applied when a file is opened
#[derive(Clone)]
pub struct FileOptions {
    /// Compute product geometry for the whole file at open time
    pub geometry: bool,
    /// Worker threads for the geometry preload
    pub workers: usize,
    pub backend: Arc<dyn GeometryBackend>,
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geometry(mut self, geometry: bool) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_backend(mut self, backend: impl GeometryBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            geometry: false,
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            backend: Arc::new(TessellationBackend::new()),
        }
    }
}

impl fmt::Debug for FileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileOptions")
            .field("geometry", &self.geometry)
            .field("workers", &self.workers)
            .field("backend", &self.backend.name())
            .finish()
    }
}

pub(crate) struct FileInner {
    session: RefCell<Session>,
    schema: Arc<Schema>,
    identity: RefCell<IdentityMap>,
    geometry: RefCell<FxHashMap<EntityId, EntityGeometry>>,
    styles: RefCell<Option<Rc<StyleIndex>>>,
    /// Property set content key to the record holding it
    psets: RefCell<FxHashMap<String, EntityId>>,
    options: FileOptions,
}

/// An open IFC file
///
/// Cloning is cheap and yields another handle on the same file.
#[derive(Clone)]
pub struct IfcFile(Rc<FileInner>);

impl IfcFile {
    /// Open a file from disk with default options
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, FileOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: FileOptions) -> Result<Self> {
        Self::from_session(Session::open(path)?, options)
    }

    /// Parse STEP text held in memory
    pub fn from_content(content: impl Into<String>, options: FileOptions) -> Result<Self> {
        Self::from_session(Session::from_content(content)?, options)
    }

    /// Start an empty file for a schema version
    pub fn create(schema_name: &str) -> Result<Self> {
        Self::from_session(Session::create(schema_name)?, FileOptions::default())
    }

    pub fn from_session(session: Session, options: FileOptions) -> Result<Self> {
        let schema = Arc::clone(session.schema());
        let file = Self(Rc::new(FileInner {
            session: RefCell::new(session),
            schema,
            identity: RefCell::new(IdentityMap::new()),
            geometry: RefCell::new(FxHashMap::default()),
            styles: RefCell::new(None),
            psets: RefCell::new(FxHashMap::default()),
            options,
        }));
        if file.0.options.geometry {
            file.preload_geometry()?;
        }
        Ok(file)
    }

    pub(crate) fn from_inner(inner: Rc<FileInner>) -> Self {
        Self(inner)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.0.schema
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.session().metadata().clone()
    }

    pub fn options(&self) -> &FileOptions {
        &self.0.options
    }

    /// The engine session, for read access below the entity layer
    pub fn session(&self) -> Ref<'_, Session> {
        self.0.session.borrow()
    }

    pub(crate) fn session_mut(&self) -> RefMut<'_, Session> {
        self.0.session.borrow_mut()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.session().len()
    }

    pub fn is_empty(&self) -> bool {
        self.session().is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.session().is_modified()
    }

    /// The entity with instance name `id`
    pub fn entity(&self, id: EntityId) -> Result<Entity> {
        if let Some(entity) = self.0.identity.borrow().get(id) {
            return Ok(entity.clone());
        }
        let type_name = self
            .session()
            .type_of(id)
            .map(str::to_string)
            .ok_or(Error::EntityNotFound(id))?;
        Ok(self.0.identity.borrow_mut().wrap(id, || {
            Entity::attached(id, type_name, Arc::clone(&self.0.schema), Rc::downgrade(&self.0))
        }))
    }

    pub fn by_id(&self, id: EntityId) -> Option<Entity> {
        self.entity(id).ok()
    }

    /// Entity for a raw record of this file
    ///
    /// Records with an id share the handle of that id whatever their
    /// content. Records with id 0 get a new transient handle every time.
    pub fn wrap(&self, record: &DecodedEntity) -> Entity {
        if record.id.is_transient() {
            let mut record = record.clone();
            if let Some(name) = self.0.schema.canonical_name(&record.type_name) {
                record.type_name = name.to_string();
            }
            return Entity::transient(record, Arc::clone(&self.0.schema), Rc::downgrade(&self.0));
        }
        let type_name = self
            .0
            .schema
            .canonical_name(&record.type_name)
            .unwrap_or(record.type_name.as_str())
            .to_string();
        self.0.identity.borrow_mut().wrap(record.id, || {
            Entity::attached(record.id, type_name, Arc::clone(&self.0.schema), Rc::downgrade(&self.0))
        })
    }

    /// Entities of a type in file order
    pub fn by_type(&self, type_name: &str, include_subtypes: bool) -> Result<Vec<Entity>> {
        let ids = self.session().ids_of_type(type_name, include_subtypes)?;
        ids.into_iter().map(|id| self.entity(id)).collect()
    }

    /// Instances of a generated class and its subclasses
    pub fn instances_of<T: crate::entity::EntityType>(&self) -> Result<Vec<T>> {
        Ok(self
            .by_type(T::TYPE_NAME, true)?
            .into_iter()
            .map(T::from_entity_unchecked)
            .collect())
    }

    pub fn by_global_id(&self, global_id: &str) -> Option<Entity> {
        let id = self.session().by_global_id(global_id)?.id;
        self.by_id(id)
    }

    /// Rooted entities whose `Name` equals `name`
    pub fn by_name(&self, name: &str) -> Result<Vec<Entity>> {
        let ids: Vec<EntityId> = self
            .session()
            .by_type("IfcRoot", true)?
            .into_iter()
            .filter(|record| record.get_string(2) == Some(name))
            .map(|record| record.id)
            .collect();
        ids.into_iter().map(|id| self.entity(id)).collect()
    }

    /// New transient entity, checked but not yet part of the file
    ///
    /// Referenced transient entities are committed right away.
    pub fn new_entity<'a, V: Into<Value>>(
        &self,
        type_name: &str,
        attributes: impl IntoIterator<Item = (&'a str, V)>,
    ) -> Result<Entity> {
        let mut raw = Vec::new();
        for (name, value) in attributes {
            raw.push((name, self.to_raw(value.into())?));
        }
        let record = self.session().create_record(type_name, raw)?;
        Ok(Entity::transient(record, Arc::clone(&self.0.schema), Rc::downgrade(&self.0)))
    }

    /// New entity added to the file
    pub fn create_entity<'a, V: Into<Value>>(
        &self,
        type_name: &str,
        attributes: impl IntoIterator<Item = (&'a str, V)>,
    ) -> Result<Entity> {
        let entity = self.new_entity(type_name, attributes)?;
        self.commit(&entity)?;
        Ok(entity)
    }

    /// Add a transient entity to the file and give it an id
    ///
    /// Committed entities are left alone.
    pub fn commit(&self, entity: &Entity) -> Result<EntityId> {
        if !entity.belongs_to(&self.0) {
            return Err(Error::other(format!("{:?} belongs to another file", entity)));
        }
        let Some(record) = entity.take_pending() else {
            return Ok(entity.id());
        };
        let added = self.session_mut().add(record.clone());
        match added {
            Ok(id) => {
                entity.set_id(id);
                self.0.identity.borrow_mut().insert(id, entity.clone());
                if self.0.schema.is_subtype_of(&record.type_name, "IfcStyledItem") {
                    *self.0.styles.borrow_mut() = None;
                }
                log::trace!("committed {} as {}", record.type_name, id);
                Ok(id)
            }
            Err(e) => {
                entity.restore_pending(record);
                Err(e)
            }
        }
    }

    /// Write the whole file to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(path, &WriterOptions::new())
    }

    pub fn save_with(&self, path: impl AsRef<Path>, options: &WriterOptions) -> Result<()> {
        self.session().write(path, options)
    }

    pub fn to_step(&self, options: &WriterOptions) -> Result<String> {
        self.session().to_step(options)
    }

    /// Length unit of the file as a factor to metres
    pub fn unit_scale(&self) -> f64 {
        self.session().unit_scale()
    }

    pub fn backend(&self) -> &dyn GeometryBackend {
        self.0.options.backend.as_ref()
    }

    /// Compute geometry for every product on the worker pool
    ///
    /// Returns once all workers are done; the results are then visible to
    /// every geometry accessor. Products that fail are left out and are
    /// computed on demand later.
    pub fn preload_geometry(&self) -> Result<usize> {
        let (snapshot, ids) = {
            let session = self.session();
            (session.snapshot(), session.ids_of_type("IfcProduct", true)?)
        };
        let loaded = preload(&snapshot, self.backend(), &ids, self.0.options.workers);
        let count = loaded.len();
        self.0.geometry.borrow_mut().extend(loaded);
        Ok(count)
    }

    /// Cached geometry of a product, if computed
    pub fn geometry_of(&self, id: EntityId) -> Option<EntityGeometry> {
        self.0.geometry.borrow().get(&id).cloned()
    }

    pub(crate) fn store_geometry(&self, id: EntityId, geometry: EntityGeometry) {
        self.0.geometry.borrow_mut().insert(id, geometry);
    }

    pub(crate) fn forget_geometry(&self, id: EntityId) {
        self.0.geometry.borrow_mut().remove(&id);
    }

    /// Drop every cached frame, transformation and geometry
    pub(crate) fn forget_placements(&self) {
        self.0.geometry.borrow_mut().clear();
        for entity in self.0.identity.borrow().entities() {
            entity.forget_placement();
        }
        log::debug!("placement written, dropped cached placements");
    }

    /// Surface styles of the file, built on first use
    pub fn styles(&self) -> Rc<StyleIndex> {
        if let Some(styles) = self.0.styles.borrow().as_ref() {
            return Rc::clone(styles);
        }
        let styles = Rc::new(StyleIndex::build(&*self.session()));
        *self.0.styles.borrow_mut() = Some(Rc::clone(&styles));
        styles
    }

    pub(crate) fn pset_cache(&self) -> &RefCell<FxHashMap<String, EntityId>> {
        &self.0.psets
    }

    /// Raw value to entity-level value
    ///
    /// Dangling references read as `$` with a warning.
    pub(crate) fn to_value(&self, raw: AttributeValue) -> Result<Value> {
        Ok(match raw {
            AttributeValue::Null => Value::Null,
            AttributeValue::Derived => Value::Derived,
            AttributeValue::EntityRef(id) => match self.entity(id) {
                Ok(entity) => Value::Entity(entity),
                Err(Error::EntityNotFound(_)) => {
                    log::warn!("reference to missing record {}", id);
                    Value::Null
                }
                Err(e) => return Err(e),
            },
            AttributeValue::Bool(v) => Value::Bool(v),
            AttributeValue::Integer(v) => Value::Integer(v),
            AttributeValue::Float(v) => Value::Real(v),
            AttributeValue::String(s) => Value::String(s),
            AttributeValue::Enum(s) => Value::Enum(s),
            AttributeValue::Binary(s) => Value::Binary(s),
            AttributeValue::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.to_value(item))
                    .collect::<Result<_>>()?,
            ),
            AttributeValue::TypedValue(tag, mut items) => {
                let name = self
                    .0
                    .schema
                    .canonical_name(&tag)
                    .map(str::to_string)
                    .unwrap_or(tag);
                let inner = if items.len() == 1 {
                    self.to_value(items.remove(0))?
                } else {
                    self.to_value(AttributeValue::List(items))?
                };
                Value::Typed(name, Box::new(inner))
            }
        })
    }

    /// Entity-level value to raw value
    ///
    /// Transient entities are committed; entities of other files are rejected.
    pub(crate) fn to_raw(&self, value: Value) -> Result<AttributeValue> {
        Ok(match value {
            Value::Null => AttributeValue::Null,
            Value::Derived => AttributeValue::Derived,
            Value::Bool(v) => AttributeValue::Bool(v),
            Value::Integer(v) => AttributeValue::Integer(v),
            Value::Real(v) => AttributeValue::Float(v),
            Value::String(s) => AttributeValue::String(s),
            Value::Enum(s) => AttributeValue::Enum(s.trim_matches('.').to_ascii_uppercase()),
            Value::Binary(s) => AttributeValue::Binary(s),
            Value::Entity(entity) => AttributeValue::EntityRef(self.commit(&entity)?),
            Value::List(items) => AttributeValue::List(
                items
                    .into_iter()
                    .map(|item| self.to_raw(item))
                    .collect::<Result<_>>()?,
            ),
            Value::Typed(tag, inner) => {
                AttributeValue::TypedValue(tag.to_ascii_uppercase(), vec![self.to_raw(*inner)?])
            }
        })
    }
}

impl PartialEq for IfcFile {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for IfcFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IfcFile")
            .field("schema", &self.0.schema.name())
            .field("records", &self.len())
            .field("entities", &self.0.identity.borrow().len())
            .finish()
    }
}
