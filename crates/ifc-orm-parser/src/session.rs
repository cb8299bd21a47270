// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session - an open or newly created STEP file
//!
//! Records are decoded lazily from the scanned byte index and cached.
//! Edited and added records live only in the cache and are marked dirty;
//! everything else is written back verbatim.

use crate::header::parse_header;
use crate::index::TypeIndex;
use crate::scanner::{EntityIndex, EntityScanner};
use crate::snapshot::Snapshot;
use crate::tokenizer::parse_entity_at;
use crate::units;
use crate::validate::Validator;
use crate::writer::{write_step, WriterOptions};
use ifc_orm_model::{
    AttributeValue, DecodedEntity, EntityId, EntityResolver, Error, ModelMetadata, Result,
};
use ifc_orm_schema::{EntityDeclaration, Schema};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Root of all entities carrying a GlobalId at position 0
const ROOT_TYPE: &str = "IfcRoot";

/// An open or newly created file
///
/// Not `Sync`: the decode cache uses interior mutability. Take a
/// [`snapshot`](Self::snapshot) to share read access across threads.
pub struct Session {
    schema: Arc<Schema>,
    metadata: ModelMetadata,
    source: Arc<str>,
    spans: EntityIndex,
    types: TypeIndex,
    decoded: RefCell<FxHashMap<u32, Arc<DecodedEntity>>>,
    dirty: FxHashSet<u32>,
    guids: RefCell<Option<FxHashMap<String, EntityId>>>,
    unit_scale: Cell<Option<f64>>,
    max_id: u32,
}

impl Session {
    /// Open a file from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        log::debug!("opening {} ({} bytes)", path.display(), content.len());
        Self::from_content(content)
    }

    /// Parse STEP text held in memory
    pub fn from_content(content: impl Into<String>) -> Result<Self> {
        let content: Arc<str> = Arc::from(content.into());
        let metadata = parse_header(&content)?;
        let schema = ifc_orm_schema::load(&metadata.schema_version)?;

        let mut spans = EntityIndex::default();
        let mut types = TypeIndex::default();
        let mut max_id = 0;
        let mut unknown: FxHashSet<&str> = FxHashSet::default();

        for entity in EntityScanner::new(&content) {
            match schema.canonical_name(entity.type_name) {
                Some(name) => types.insert(EntityId(entity.id), name),
                None => {
                    if unknown.insert(entity.type_name) {
                        log::warn!(
                            "{} is not declared by {}, its records are kept verbatim",
                            entity.type_name,
                            schema.name()
                        );
                    }
                    types.insert(EntityId(entity.id), entity.type_name);
                }
            }
            if spans.insert(entity.id, (entity.start, entity.end)).is_some() {
                log::warn!("duplicate instance name #{}, the last one wins", entity.id);
            }
            max_id = max_id.max(entity.id);
        }
        log::info!(
            "indexed {} records ({} schema)",
            spans.len(),
            schema.name()
        );

        Ok(Self {
            schema,
            metadata,
            source: content,
            spans,
            types,
            decoded: RefCell::new(FxHashMap::default()),
            dirty: FxHashSet::default(),
            guids: RefCell::new(None),
            unit_scale: Cell::new(None),
            max_id,
        })
    }

    /// Start an empty file for a schema version
    pub fn create(schema_name: &str) -> Result<Self> {
        let schema = ifc_orm_schema::load(schema_name)?;
        let metadata = ModelMetadata {
            schema_version: schema.name().to_string(),
            ..ModelMetadata::default()
        };
        Ok(Self {
            schema,
            metadata,
            source: Arc::from(""),
            spans: EntityIndex::default(),
            types: TypeIndex::default(),
            decoded: RefCell::new(FxHashMap::default()),
            dirty: FxHashSet::default(),
            guids: RefCell::new(None),
            unit_scale: Cell::new(None),
            max_id: 0,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ModelMetadata {
        &mut self.metadata
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.len() == 0
    }

    /// All record ids, ascending
    pub fn ids(&self) -> Vec<EntityId> {
        self.types.ids()
    }

    /// Highest id in use
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// Whether any record was added or edited since opening
    pub fn is_modified(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Concrete type name of a record, without decoding it
    pub fn type_of(&self, id: EntityId) -> Option<&str> {
        self.types.type_of(id)
    }

    /// Instance counts per concrete type, in first-seen order
    pub fn type_counts(&self) -> Vec<(String, usize)> {
        self.types
            .counts()
            .map(|(name, count)| (name.to_string(), count))
            .collect()
    }

    /// Look up a record by id
    ///
    /// Records that fail to decode are logged and reported as missing.
    pub fn by_id(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        if let Some(cached) = self.decoded.borrow().get(&id.0) {
            return Some(Arc::clone(cached));
        }
        let &(start, end) = self.spans.get(&id.0)?;
        let mut record = match parse_entity_at(&self.source, start, end) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("skipping undecodable record {}: {}", id, err);
                return None;
            }
        };
        if let Some(name) = self.schema.canonical_name(&record.type_name) {
            record.type_name = name.to_string();
        }
        let record = Arc::new(record);
        self.decoded.borrow_mut().insert(id.0, Arc::clone(&record));
        Some(record)
    }

    /// Look up a record by id, failing when it does not exist
    pub fn record(&self, id: EntityId) -> Result<Arc<DecodedEntity>> {
        self.by_id(id).ok_or(Error::EntityNotFound(id))
    }

    /// Records of a type in file order, optionally including subtypes
    pub fn by_type(&self, type_name: &str, include_subtypes: bool) -> Result<Vec<Arc<DecodedEntity>>> {
        Ok(self
            .types
            .ids_of(&self.schema, type_name, include_subtypes)?
            .into_iter()
            .filter_map(|id| self.by_id(id))
            .collect())
    }

    /// Ids of a type without decoding anything
    pub fn ids_of_type(&self, type_name: &str, include_subtypes: bool) -> Result<Vec<EntityId>> {
        self.types.ids_of(&self.schema, type_name, include_subtypes)
    }

    /// Look up a rooted record by its GlobalId
    pub fn by_global_id(&self, global_id: &str) -> Option<Arc<DecodedEntity>> {
        if self.guids.borrow().is_none() {
            let index = self.build_guid_index();
            *self.guids.borrow_mut() = Some(index);
        }
        let id = self.guids.borrow().as_ref()?.get(global_id).copied()?;
        self.by_id(id)
    }

    fn build_guid_index(&self) -> FxHashMap<String, EntityId> {
        let mut index = FxHashMap::default();
        let ids = self
            .types
            .ids_of(&self.schema, ROOT_TYPE, true)
            .unwrap_or_default();
        for id in ids {
            if let Some(guid) = self.by_id(id).and_then(|r| r.get_string(0).map(str::to_string)) {
                index.insert(guid, id);
            }
        }
        log::debug!("indexed {} global ids", index.len());
        index
    }

    /// Entity declaration for a record's concrete type
    pub fn declaration_of(&self, record: &DecodedEntity) -> Result<&EntityDeclaration> {
        self.schema.entity(&record.type_name)
    }

    /// Position of `attribute` on the concrete type
    pub fn attribute_index(&self, type_name: &str, attribute: &str) -> Result<usize> {
        let name = self
            .schema
            .canonical_name(type_name)
            .ok_or_else(|| Error::unknown_type(type_name))?;
        self.schema
            .entity(name)?
            .attribute_index(attribute)
            .ok_or_else(|| Error::unknown_attribute(name, attribute))
    }

    /// Read an attribute by name
    ///
    /// Positions missing from a short record read as `$`.
    pub fn get(&self, id: EntityId, attribute: &str) -> Result<AttributeValue> {
        let record = self.record(id)?;
        let index = self.attribute_index(&record.type_name, attribute)?;
        Ok(record.get(index).cloned().unwrap_or_default())
    }

    /// Build a transient record with id 0, checked against the schema
    ///
    /// Unset attributes are `$`, derived positions are `*`.
    pub fn create_record<'n>(
        &self,
        type_name: &str,
        attributes: impl IntoIterator<Item = (&'n str, AttributeValue)>,
    ) -> Result<DecodedEntity> {
        let name = self
            .schema
            .canonical_name(type_name)
            .ok_or_else(|| Error::unknown_type(type_name))?;
        let declaration = self.schema.entity(name)?;
        if declaration.is_abstract {
            return Err(Error::other(format!("{} is abstract", name)));
        }

        let mut values: Vec<AttributeValue> = declaration
            .all_attributes()
            .iter()
            .map(|a| {
                if a.derived {
                    AttributeValue::Derived
                } else {
                    AttributeValue::Null
                }
            })
            .collect();

        for (attribute, value) in attributes {
            let index = declaration
                .attribute_index(attribute)
                .ok_or_else(|| Error::unknown_attribute(name, attribute))?;
            let declared = &declaration.all_attributes()[index];
            if declared.derived {
                continue;
            }
            self.check(&declared.ty, declared.optional, &value)
                .map_err(|e| e.with_attribute(attribute, value.to_string()))?;
            values[index] = value;
        }

        Ok(DecodedEntity::new(EntityId::TRANSIENT, name, values))
    }

    /// Commit a record and return its id
    ///
    /// Transient records get `max_id + 1`. A record carrying an unused id
    /// keeps it. Non-null values are checked as in [`set`](Self::set).
    pub fn add(&mut self, mut record: DecodedEntity) -> Result<EntityId> {
        let name = self
            .schema
            .canonical_name(&record.type_name)
            .ok_or_else(|| Error::unknown_type(&record.type_name))?
            .to_string();
        let declaration = self.schema.entity(&name)?;
        let declared = declaration.all_attributes();
        if record.attributes.len() != declared.len() {
            return Err(Error::other(format!(
                "{} takes {} attributes, got {}",
                name,
                declared.len(),
                record.attributes.len()
            )));
        }
        for (attribute, value) in declared.iter().zip(&record.attributes) {
            if attribute.derived || value.is_null() {
                continue;
            }
            self.check(&attribute.ty, true, value)
                .map_err(|e| e.with_attribute(&attribute.name, value.to_string()))?;
        }

        let id = if record.id.is_transient() {
            EntityId(self.max_id + 1)
        } else if self.types.contains(record.id) {
            return Err(Error::other(format!("{} is already in use", record.id)));
        } else {
            record.id
        };
        record.id = id;
        record.type_name = name;

        self.max_id = self.max_id.max(id.0);
        self.types.insert(id, &record.type_name);
        if let Some(guids) = self.guids.get_mut() {
            if self.schema.is_subtype_of(&record.type_name, ROOT_TYPE) {
                if let Some(guid) = record.get_string(0) {
                    guids.insert(guid.to_string(), id);
                }
            }
        }
        self.decoded.get_mut().insert(id.0, Arc::new(record));
        self.dirty.insert(id.0);
        log::trace!("added {}", id);
        Ok(id)
    }

    /// Write one attribute
    ///
    /// Derived attributes are accepted and ignored. Writing the current
    /// value again is a no-op.
    pub fn set(&mut self, id: EntityId, attribute: &str, value: AttributeValue) -> Result<()> {
        let record = self.record(id)?;
        let declaration = self.schema.entity(&record.type_name)?;
        let index = declaration
            .attribute_index(attribute)
            .ok_or_else(|| Error::unknown_attribute(&record.type_name, attribute))?;
        let declared = &declaration.all_attributes()[index];
        if declared.derived {
            log::debug!("ignoring write to derived attribute {}.{}", record.type_name, attribute);
            return Ok(());
        }
        if record.get(index) == Some(&value) {
            return Ok(());
        }
        self.check(&declared.ty, declared.optional, &value)
            .map_err(|e| e.with_attribute(attribute, value.to_string()))?;

        let mut updated = DecodedEntity::clone(&record);
        if updated.attributes.len() <= index {
            updated.attributes.resize(index + 1, AttributeValue::Null);
        }
        updated.attributes[index] = value;
        if index == 0 && self.schema.is_subtype_of(&updated.type_name, ROOT_TYPE) {
            *self.guids.get_mut() = None;
        }
        self.decoded.get_mut().insert(id.0, Arc::new(updated));
        self.dirty.insert(id.0);
        Ok(())
    }

    /// Check a value for one attribute of `type_name` without writing it
    ///
    /// Returns the attribute position, or `None` for a derived attribute,
    /// which accepts any value and ignores it.
    pub fn check_attribute(
        &self,
        type_name: &str,
        attribute: &str,
        value: &AttributeValue,
    ) -> Result<Option<usize>> {
        let declaration = self.schema.entity(type_name)?;
        let index = declaration
            .attribute_index(attribute)
            .ok_or_else(|| Error::unknown_attribute(type_name, attribute))?;
        let declared = &declaration.all_attributes()[index];
        if declared.derived {
            return Ok(None);
        }
        self.check(&declared.ty, declared.optional, value)
            .map_err(|e| e.with_attribute(attribute, value.to_string()))?;
        Ok(Some(index))
    }

    fn check(
        &self,
        ty: &ifc_orm_schema::TypeDescriptor,
        optional: bool,
        value: &AttributeValue,
    ) -> Result<()> {
        let type_of = |id: EntityId| self.types.type_of(id).map(str::to_string);
        Validator::new(&self.schema, &type_of).check(ty, optional, value)
    }

    /// Ids of records of `entity_type` (with subtypes) whose `attribute` refers to `id`
    ///
    /// This is the query behind inverse attributes. Aggregate attributes
    /// match when any element refers to `id`. Results are in file order.
    pub fn referencing(&self, id: EntityId, entity_type: &str, attribute: &str) -> Result<Vec<EntityId>> {
        let mut out = Vec::new();
        let mut refs = Vec::new();
        for candidate in self.types.ids_of(&self.schema, entity_type, true)? {
            let Some(record) = self.by_id(candidate) else {
                continue;
            };
            let index = self.attribute_index(&record.type_name, attribute)?;
            refs.clear();
            if let Some(value) = record.get(index) {
                value.collect_refs(&mut refs);
            }
            if refs.contains(&id) {
                out.push(candidate);
            }
        }
        Ok(out)
    }

    /// Length unit of the project as a factor to metres, cached
    pub fn unit_scale(&self) -> f64 {
        if let Some(scale) = self.unit_scale.get() {
            return scale;
        }
        let scale = units::extract_unit_scale(self);
        self.unit_scale.set(Some(scale));
        scale
    }

    /// Forget the cached unit scale after editing unit records
    pub fn reset_unit_scale(&self) {
        self.unit_scale.set(None);
    }

    /// Immutable, thread-safe view of the current state
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let decoded = self.decoded.borrow();
        let overrides = self
            .dirty
            .iter()
            .filter_map(|id| decoded.get(id).map(|r| (*id, Arc::clone(r))))
            .collect();
        Arc::new(Snapshot::new(
            Arc::clone(&self.schema),
            Arc::clone(&self.source),
            self.spans.clone(),
            overrides,
            self.types.clone(),
            self.unit_scale(),
        ))
    }

    /// Copy the records reachable from `roots` into a new session
    ///
    /// `replacements` stand in for records of the same id; their forward
    /// references are followed instead of the originals. Ids are kept.
    /// References to missing records are skipped with a warning and stay
    /// dangling in the copy.
    pub fn extract(&self, roots: &[EntityId], replacements: &[DecodedEntity]) -> Result<Session> {
        let replaced: FxHashMap<EntityId, &DecodedEntity> =
            replacements.iter().map(|r| (r.id, r)).collect();

        let mut seen: BTreeSet<EntityId> = BTreeSet::new();
        let mut records: Vec<DecodedEntity> = Vec::new();
        let mut stack: Vec<EntityId> = roots.to_vec();
        let mut refs = Vec::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let record = match replaced.get(&id) {
                Some(record) => (*record).clone(),
                None => match self.by_id(id) {
                    Some(record) => DecodedEntity::clone(&record),
                    None => {
                        log::warn!("reference to missing record {} left out of extract", id);
                        continue;
                    }
                },
            };
            refs.clear();
            record.attributes.iter().for_each(|v| v.collect_refs(&mut refs));
            stack.extend(refs.iter().filter(|r| !seen.contains(*r)));
            records.push(record);
        }

        let mut out = Session::create(self.schema.name())?;
        out.metadata = self.metadata.clone();
        records.sort_by_key(|record| record.id);
        for record in records {
            out.insert_unchecked(record);
        }
        log::debug!("extracted {} of {} records", out.len(), self.len());
        Ok(out)
    }

    fn insert_unchecked(&mut self, record: DecodedEntity) {
        let id = record.id;
        self.max_id = self.max_id.max(id.0);
        self.types.insert(id, &record.type_name);
        self.decoded.get_mut().insert(id.0, Arc::new(record));
        self.dirty.insert(id.0);
    }

    /// Serialize the whole file
    pub fn to_step(&self, options: &WriterOptions) -> Result<String> {
        write_step(self, options)
    }

    /// Serialize the whole file to `path`
    pub fn write(&self, path: impl AsRef<Path>, options: &WriterOptions) -> Result<()> {
        let path = path.as_ref();
        let mut options = options.clone();
        if options.file_name.is_none() {
            options.file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        }
        let text = self.to_step(&options)?;
        std::fs::write(path, text)?;
        log::info!("wrote {} records to {}", self.len(), path.display());
        Ok(())
    }

    /// Source text of a record that is still byte-identical to the input
    pub(crate) fn verbatim(&self, id: EntityId) -> Option<&str> {
        if self.dirty.contains(&id.0) {
            return None;
        }
        let &(start, end) = self.spans.get(&id.0)?;
        self.source.get(start..end)
    }
}

impl EntityResolver for Session {
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        self.by_id(id)
    }

    fn by_type(&self, type_name: &str, include_subtypes: bool) -> Vec<Arc<DecodedEntity>> {
        Session::by_type(self, type_name, include_subtypes).unwrap_or_default()
    }

    fn is_subtype_of(&self, type_name: &str, ancestor: &str) -> bool {
        self.schema.is_subtype_of(type_name, ancestor)
    }

    fn all_ids(&self) -> Vec<EntityId> {
        self.types.ids()
    }

    fn entity_count(&self) -> usize {
        self.types.len()
    }
}
