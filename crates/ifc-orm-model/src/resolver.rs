// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only record lookup used by geometry processing and unit extraction

use crate::{AttributeValue, DecodedEntity, EntityId};
use std::sync::Arc;

/// Record lookup and reference resolution
///
/// Implemented by the live engine session (single-threaded) and by its
/// immutable snapshots, which are shared across geometry workers.
///
/// # Example
///
/// ```ignore
/// use ifc_orm_model::{EntityResolver, EntityId};
///
/// fn placement_of(resolver: &dyn EntityResolver, product: EntityId) -> Option<EntityId> {
///     let product = resolver.get(product)?;
///     // ObjectPlacement follows OwnerHistory, Name, Description and ObjectType
///     product.get_ref(5)
/// }
/// ```
pub trait EntityResolver {
    /// Get record by ID
    ///
    /// # Arguments
    /// * `id` - The entity ID to look up
    ///
    /// # Returns
    /// `Some(Arc<DecodedEntity>)` if found, `None` otherwise
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>>;

    /// Resolve an entity reference from an attribute value
    ///
    /// # Arguments
    /// * `attr` - The attribute value that may contain an entity reference
    ///
    /// # Returns
    /// `Some(Arc<DecodedEntity>)` if the attribute is a valid reference, `None` otherwise
    fn resolve_ref(&self, attr: &AttributeValue) -> Option<Arc<DecodedEntity>> {
        match attr {
            AttributeValue::EntityRef(id) => self.get(*id),
            _ => None,
        }
    }

    /// Resolve a list of entity references
    ///
    /// # Arguments
    /// * `attr` - The attribute value that may contain a list of entity references
    ///
    /// # Returns
    /// The resolved records (empty if the attribute is not a list or contains no refs)
    fn resolve_ref_list(&self, attr: &AttributeValue) -> Vec<Arc<DecodedEntity>> {
        match attr {
            AttributeValue::List(items) => items
                .iter()
                .filter_map(|item| self.resolve_ref(item))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Get all records of a type
    ///
    /// # Arguments
    /// * `type_name` - Type name in schema casing
    /// * `include_subtypes` - Whether instances of subtypes are included
    ///
    /// # Returns
    /// Matching records in file order
    fn by_type(&self, type_name: &str, include_subtypes: bool) -> Vec<Arc<DecodedEntity>>;

    /// Whether `type_name` equals `ancestor` or is one of its subtypes
    fn is_subtype_of(&self, type_name: &str, ancestor: &str) -> bool;

    /// Get all record IDs
    fn all_ids(&self) -> Vec<EntityId>;

    /// Get total record count
    fn entity_count(&self) -> usize {
        self.all_ids().len()
    }
}

/// Extension methods for EntityResolver
pub trait EntityResolverExt: EntityResolver {
    /// Get entity by raw u32 ID
    fn get_by_u32(&self, id: u32) -> Option<Arc<DecodedEntity>> {
        self.get(EntityId(id))
    }

    /// Get entity or return error
    fn get_or_err(&self, id: EntityId) -> crate::Result<Arc<DecodedEntity>> {
        self.get(id).ok_or(crate::Error::EntityNotFound(id))
    }

    /// Whether a record is an instance of `ancestor` or one of its subtypes
    fn is_instance_of(&self, entity: &DecodedEntity, ancestor: &str) -> bool {
        self.is_subtype_of(&entity.type_name, ancestor)
    }
}

// Blanket implementation for all EntityResolver types
impl<T: EntityResolver + ?Sized> EntityResolverExt for T {}
