// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-ORM Geometry
//!
//! Geometry backends for product bodies. Processing looks records up
//! through the `EntityResolver` trait from `ifc-orm-model`, so it runs the
//! same on a live session and on a thread-safe snapshot.
//!
//! ## Overview
//!
//! - **Backends**: [`GeometryBackend`] is the seam; [`TessellationBackend`]
//!   produces triangle meshes and reports booleans as unsupported
//! - **Processors**: extruded area solids (rectangle, circle and polyline
//!   profiles), triangulated face sets and faceted breps
//! - **Placements**: `IfcLocalPlacement` chains to world matrices and [`Frame`]s
//! - **Styles**: surface colors from `IfcStyledItem`
//! - **Preload**: bulk processing on a rayon pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_orm_geometry::{extrude_profile, Profile2D};
//!
//! let profile = Profile2D::rectangle(2.0, 1.0);
//! let mesh = extrude_profile(&profile, 3.0, None)?;
//! println!("Generated {} triangles", mesh.triangle_count());
//! ```

pub mod backend;
pub mod error;
pub mod extrusion;
pub mod frame;
pub mod mesh;
pub mod placement;
pub mod preload;
pub mod processors;
pub mod profile;
pub mod router;
pub mod style;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use backend::{BodyGeometry, GeometryBackend, TessellationBackend};
pub use error::{Error, Result};
pub use extrusion::{apply_transform, direction_transform, extrude_profile};
pub use frame::{column_major, Frame};
pub use mesh::Mesh;
pub use placement::{object_transform, placement_transform, relative_frame};
pub use preload::preload;
pub use profile::{calculate_circle_segments, Profile2D, Triangulation};
pub use router::{GeometryProcessor, GeometryRouter};
pub use style::StyleIndex;
pub use triangulation::{calculate_polygon_normal, triangulate_polygon, triangulate_polygon_with_holes};

pub use processors::{ExtrudedAreaSolidProcessor, FacetedBrepProcessor, TriangulatedFaceSetProcessor};
