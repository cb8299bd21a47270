// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! At most one entity handle per instance name
//!
//! Entries live as long as the file. Transient records (id 0) never enter
//! the map.

use crate::entity::Entity;
use ifc_orm_model::EntityId;
use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct IdentityMap {
    entries: FxHashMap<EntityId, Entity>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entries.get(&id)
    }

    /// The cached handle for `id`, or a new one from `make`
    ///
    /// `make` runs only on a miss. For id 0 it runs every time and the
    /// result is not kept.
    pub fn wrap(&mut self, id: EntityId, make: impl FnOnce() -> Entity) -> Entity {
        if id.is_transient() {
            return make();
        }
        self.entries.entry(id).or_insert_with(make).clone()
    }

    /// Register a handle that was just committed
    ///
    /// An existing entry for the id is kept and returned.
    pub fn insert(&mut self, id: EntityId, entity: Entity) -> Entity {
        if id.is_transient() {
            return entity;
        }
        self.entries.entry(id).or_insert(entity).clone()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileOptions, IfcFile};
    use ifc_orm_model::{AttributeValue, DecodedEntity};

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCCARTESIANPOINT((1.,0.,0.));
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_same_id_same_handle() {
        let file = IfcFile::from_content(TEST_IFC, FileOptions::new()).unwrap();
        let a = file.entity(EntityId(1)).unwrap();
        let b = file.entity(EntityId(1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, file.entity(EntityId(2)).unwrap());
    }

    #[test]
    fn test_equal_records_share_the_handle() {
        let file = IfcFile::from_content(TEST_IFC, FileOptions::new()).unwrap();
        let record = DecodedEntity::new(
            EntityId(1),
            "IfcCartesianPoint",
            vec![AttributeValue::List(vec![AttributeValue::Float(0.0); 3])],
        );
        let copy = record.clone();
        assert_eq!(file.wrap(&record), file.wrap(&copy));
        assert_eq!(file.wrap(&record), file.entity(EntityId(1)).unwrap());
    }

    #[test]
    fn test_transient_records_are_never_cached() {
        let file = IfcFile::from_content(TEST_IFC, FileOptions::new()).unwrap();
        let record = DecodedEntity::new(EntityId::TRANSIENT, "IfcCartesianPoint", vec![]);
        let a = file.wrap(&record);
        let b = file.wrap(&record);
        assert!(a.is_transient());
        assert_ne!(a, b);
    }
}
