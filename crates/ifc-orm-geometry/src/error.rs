// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for geometry processing

use ifc_orm_model::EntityId;
use thiserror::Error;

/// Geometry processing result type
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry processing errors
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry processing error
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Missing entity error
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Invalid attribute error
    #[error("Invalid attribute at index {index} of {entity}: {message}")]
    InvalidAttribute {
        entity: EntityId,
        index: usize,
        message: String,
    },

    /// Profile processing error
    #[error("Profile error: {0}")]
    Profile(String),

    /// Triangulation error
    #[error("Triangulation error: {0}")]
    Triangulation(String),

    /// No processor is registered for this type
    #[error("Unsupported geometry type: {0}")]
    UnsupportedType(String),

    /// The backend does not implement an operation
    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
}

impl Error {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Error::Geometry(msg.into())
    }

    pub fn profile(msg: impl Into<String>) -> Self {
        Error::Profile(msg.into())
    }

    pub fn triangulation(msg: impl Into<String>) -> Self {
        Error::Triangulation(msg.into())
    }

    pub fn entity_not_found(id: EntityId) -> Self {
        Error::EntityNotFound(id)
    }

    /// Missing or malformed attribute on a geometry record
    pub fn invalid_attribute(entity: EntityId, index: usize, msg: impl Into<String>) -> Self {
        Error::InvalidAttribute {
            entity,
            index,
            message: msg.into(),
        }
    }

    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Error::UnsupportedType(type_name.into())
    }

    pub fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        Error::Unsupported { backend, operation }
    }

    /// Convert into the model error, attributed to the product being processed
    pub fn for_entity(self, entity: EntityId) -> ifc_orm_model::Error {
        match self {
            Error::EntityNotFound(id) => ifc_orm_model::Error::EntityNotFound(id),
            other => ifc_orm_model::Error::geometry(entity, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_entity_keeps_missing_references() {
        let err = Error::entity_not_found(EntityId(7)).for_entity(EntityId(1));
        assert!(matches!(err, ifc_orm_model::Error::EntityNotFound(EntityId(7))));

        let err = Error::unsupported("tessellation", "boolean difference").for_entity(EntityId(1));
        assert_eq!(
            err.to_string(),
            "Geometry error for entity #1: tessellation backend does not support boolean difference"
        );
    }
}
