// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type index: concrete type name per id and ids per type, in insertion order

use ifc_orm_model::{EntityId, Error, Result};
use ifc_orm_schema::Schema;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub(crate) struct TypeIndex {
    by_type: IndexMap<Arc<str>, Vec<EntityId>>,
    of: FxHashMap<u32, Arc<str>>,
}

impl TypeIndex {
    /// Record `id` under `type_name`, which should already be in schema casing
    pub fn insert(&mut self, id: EntityId, type_name: &str) {
        let key = match self.by_type.get_key_value(type_name) {
            Some((key, _)) => Arc::clone(key),
            None => Arc::from(type_name),
        };
        self.by_type.entry(Arc::clone(&key)).or_default().push(id);
        self.of.insert(id.0, key);
    }

    pub fn type_of(&self, id: EntityId) -> Option<&str> {
        self.of.get(&id.0).map(|name| &**name)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.of.contains_key(&id.0)
    }

    pub fn len(&self) -> usize {
        self.of.len()
    }

    /// All ids, ascending
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.of.keys().map(|&id| EntityId(id)).collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of `type_name` (any casing), optionally with all subtypes
    ///
    /// A single type keeps insertion order. With subtypes the merged list is
    /// sorted by id, which is file order for files written by this crate.
    pub fn ids_of(
        &self,
        schema: &Schema,
        type_name: &str,
        include_subtypes: bool,
    ) -> Result<Vec<EntityId>> {
        let name = schema
            .canonical_name(type_name)
            .ok_or_else(|| Error::unknown_type(type_name))?;
        schema.entity(name)?;

        let mut ids = self.by_type.get(name).cloned().unwrap_or_default();
        if include_subtypes {
            let before = ids.len();
            for subtype in schema.subtypes(name) {
                if let Some(more) = self.by_type.get(subtype) {
                    ids.extend_from_slice(more);
                }
            }
            if ids.len() != before {
                ids.sort_unstable();
            }
        }
        Ok(ids)
    }

    /// Type names present, with instance counts
    pub fn counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_type.iter().map(|(name, ids)| (&**name, ids.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_of_with_subtypes() {
        let schema = ifc_orm_schema::load("IFC4").unwrap();
        let mut index = TypeIndex::default();
        index.insert(EntityId(5), "IfcWallStandardCase");
        index.insert(EntityId(2), "IfcWall");
        index.insert(EntityId(9), "IfcSlab");

        assert_eq!(index.ids_of(&schema, "IFCWALL", false).unwrap(), vec![EntityId(2)]);
        assert_eq!(
            index.ids_of(&schema, "IfcWall", true).unwrap(),
            vec![EntityId(2), EntityId(5)]
        );
        assert_eq!(index.ids_of(&schema, "IfcBuildingElement", true).unwrap().len(), 3);
        assert_eq!(index.type_of(EntityId(9)), Some("IfcSlab"));
        assert!(matches!(
            index.ids_of(&schema, "IfcNope", false),
            Err(Error::UnknownType(_))
        ));
    }
}
