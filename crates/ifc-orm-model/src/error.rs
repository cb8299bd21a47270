// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types shared by the schema catalog, the engine and the entity layer

use crate::EntityId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading schemas, reading files or operating on entities
#[derive(Error, Debug)]
pub enum Error {
    /// The named schema version is not known to the catalog
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// A type name is not declared by the active schema
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// The concrete type does not declare the requested attribute
    #[error("{entity_type} has no attribute '{attribute}'")]
    UnknownAttribute {
        entity_type: String,
        attribute: String,
    },

    /// A write was rejected by the value-type check
    #[error("Invalid value for attribute '{attribute}' ({value}): {message}")]
    InvalidValue {
        attribute: String,
        value: String,
        message: String,
    },

    /// Entity not found
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// Input file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid STEP file format
    #[error("Invalid IFC format: {0}")]
    InvalidFormat(String),

    /// Failed to parse header section
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Failed to parse entity
    #[error("Failed to parse entity {0}: {1}")]
    EntityParse(EntityId, String),

    /// Schema source text could not be parsed or linked
    #[error("Schema error: {0}")]
    SchemaParse(String),

    /// A single declaration could not be generated
    #[error("Cannot generate {declaration}{}: {message}", .attribute.as_ref().map(|a| format!(".{a}")).unwrap_or_default())]
    Generation {
        declaration: String,
        attribute: Option<String>,
        message: String,
    },

    /// Geometry processing error
    #[error("Geometry error for entity {entity}: {message}")]
    Geometry { entity: EntityId, message: String },

    /// The owning file of an entity has been dropped
    #[error("The file owning this entity is no longer open")]
    SessionClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new format error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Create a new entity parse error
    pub fn entity_parse(id: EntityId, msg: impl Into<String>) -> Self {
        Error::EntityParse(id, msg.into())
    }

    /// Create an unknown type error
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Error::UnknownType(name.into())
    }

    /// Create an unknown attribute error
    pub fn unknown_attribute(entity_type: impl Into<String>, attribute: impl Into<String>) -> Self {
        Error::UnknownAttribute {
            entity_type: entity_type.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        attribute: impl Into<String>,
        value: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Error::InvalidValue {
            attribute: attribute.into(),
            value: value.into(),
            message: msg.into(),
        }
    }

    /// Create a schema parse error
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::SchemaParse(msg.into())
    }

    /// Create a generation error for a declaration, optionally naming the attribute
    pub fn generation(
        declaration: impl Into<String>,
        attribute: Option<&str>,
        msg: impl Into<String>,
    ) -> Self {
        Error::Generation {
            declaration: declaration.into(),
            attribute: attribute.map(str::to_string),
            message: msg.into(),
        }
    }

    /// Create a new geometry error
    pub fn geometry(entity: EntityId, msg: impl Into<String>) -> Self {
        Error::Geometry {
            entity,
            message: msg.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Attach an attribute name and attempted value to a value-type failure
    ///
    /// Errors that already carry attribute context are returned unchanged.
    pub fn with_attribute(self, attribute: &str, value: impl Into<String>) -> Self {
        match self {
            Error::InvalidValue { .. } | Error::UnknownAttribute { .. } => self,
            other => Error::invalid_value(attribute, value, other.to_string()),
        }
    }
}
