// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-ORM - typed, identity-preserving entities over IFC files
//!
//! Every entity declared by a supported schema version gets a generated
//! Rust type with typed getters and setters. Records are wrapped on demand,
//! at most once per instance name, and the wrappers resolve inverse
//! attributes, the spatial tree, property sets and geometry lazily.
//!
//! # Features
//!
//! - **Generated classes** for IFC4 and IFC2X3, built from the embedded
//!   EXPRESS schemas at compile time
//! - **One handle per record** - the same instance name always yields the
//!   same [`Entity`]
//! - **Spatial tree** through aggregation and containment relations
//! - **Property sets** read and written as nested maps
//! - **Geometry** meshed on demand or preloaded on a worker pool
//! - **Editing** - create entities, wire them into the tree, save or
//!   export a branch
//!
//! # Example
//!
//! ```no_run
//! use ifc_orm::ifc4::{IfcBuildingStorey, IfcWall};
//! use ifc_orm::{IfcFile, ObjectDefinitionExt, ProductExt};
//!
//! let file = IfcFile::open("model.ifc")?;
//! for wall in file.instances_of::<IfcWall>()? {
//!     let storey = wall.parent()?.and_then(|p| p.cast::<IfcBuildingStorey>().ok());
//!     let geometry = wall.geometry()?;
//!     println!(
//!         "{:?} on {:?}: {} triangles",
//!         wall.name()?,
//!         storey.map(|s| s.name()),
//!         geometry.map_or(0, |g| g.mesh.triangle_count())
//!     );
//! }
//! # Ok::<(), ifc_orm::Error>(())
//! ```

pub mod class;
pub mod entity;
pub mod extensions;
pub mod file;
pub mod generated;
pub mod identity;
pub mod model;
pub mod psets;
pub mod relations;
pub mod value;

pub use class::{AttributeInfo, ClassRegistry, EntityClass, InverseInfo};
pub use entity::{AsEntity, Entity, EntityType, Mapped, Mapping, MappingOptions};
pub use extensions::{
    BuildingExt, ContextInfo, ObjectDefinitionExt, ObjectExt, ProductExt, ProjectExt, SiteExt,
    UnitInfo,
};
pub use file::{FileOptions, IfcFile};
pub use generated::{ifc2x3, ifc4, registry_for};
pub use model::{Model, ModelOptions};
pub use value::{Binary, FromValue, IntoValue, Logical, Value};

pub use ifc_orm_geometry::{Frame, GeometryBackend, Matrix4, Point3, TessellationBackend, Vector3};
pub use ifc_orm_model::{
    property_map, EntityGeometry, EntityId, Error, MeshData, ModelMetadata, PropertyMap,
    PropertySets, PropertyValue, Result, SpatialNode, Style,
};
pub use ifc_orm_parser::WriterOptions;
