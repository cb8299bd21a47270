// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Immutable, thread-safe view of a session

use crate::index::TypeIndex;
use crate::scanner::EntityIndex;
use crate::tokenizer::parse_entity_at;
use ifc_orm_model::{DecodedEntity, EntityId, EntityResolver};
use ifc_orm_schema::Schema;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Read-only session state shared by geometry workers
///
/// Edited records are captured when the snapshot is taken; the rest decode
/// lazily from the shared source text into a lock-guarded cache.
pub struct Snapshot {
    schema: Arc<Schema>,
    source: Arc<str>,
    spans: EntityIndex,
    overrides: FxHashMap<u32, Arc<DecodedEntity>>,
    cache: RwLock<FxHashMap<u32, Arc<DecodedEntity>>>,
    types: TypeIndex,
    unit_scale: f64,
}

impl Snapshot {
    pub(crate) fn new(
        schema: Arc<Schema>,
        source: Arc<str>,
        spans: EntityIndex,
        overrides: FxHashMap<u32, Arc<DecodedEntity>>,
        types: TypeIndex,
        unit_scale: f64,
    ) -> Self {
        Self {
            schema,
            source,
            spans,
            overrides,
            cache: RwLock::new(FxHashMap::default()),
            types,
            unit_scale,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Length unit factor to metres at the time of the snapshot
    pub fn unit_scale(&self) -> f64 {
        self.unit_scale
    }

    /// Concrete type name of a record
    pub fn type_of(&self, id: EntityId) -> Option<&str> {
        self.types.type_of(id)
    }

    fn decode_and_cache(&self, id: u32) -> Option<Arc<DecodedEntity>> {
        if let Some(record) = self.overrides.get(&id) {
            return Some(Arc::clone(record));
        }
        {
            let cache = self.cache.read().ok()?;
            if let Some(cached) = cache.get(&id) {
                return Some(Arc::clone(cached));
            }
        }

        let &(start, end) = self.spans.get(&id)?;
        let mut record = parse_entity_at(&self.source, start, end).ok()?;
        if let Some(name) = self.schema.canonical_name(&record.type_name) {
            record.type_name = name.to_string();
        }
        let record = Arc::new(record);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id, Arc::clone(&record));
        }
        Some(record)
    }
}

impl EntityResolver for Snapshot {
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        self.decode_and_cache(id.0)
    }

    fn by_type(&self, type_name: &str, include_subtypes: bool) -> Vec<Arc<DecodedEntity>> {
        self.types
            .ids_of(&self.schema, type_name, include_subtypes)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use ifc_orm_model::AttributeValue;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',#5,'Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,$,.METRE.);
#4=IFCWALL('3vB2YO$MX4xv5uCqZZG05x',#5,'Wall 1',$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_snapshot_sees_edits() {
        let mut session = Session::from_content(TEST_IFC).unwrap();
        session
            .set(EntityId(4), "Name", AttributeValue::String("Edited".into()))
            .unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.get(EntityId(4)).unwrap().get_string(2), Some("Edited"));
        assert_eq!(snapshot.by_type("IfcWall", true).len(), 1);
        assert_eq!(snapshot.unit_scale(), 1.0);
    }

    #[test]
    fn test_snapshot_is_shareable() {
        use std::thread;

        let session = Session::from_content(TEST_IFC).unwrap();
        let snapshot = session.snapshot();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = Arc::clone(&snapshot);
                thread::spawn(move || (1..=4).filter(|&id| snapshot.get(EntityId(id)).is_some()).count())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 4);
        }
    }
}
