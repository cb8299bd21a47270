// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backend-neutral geometry values exposed on products

use crate::MeshData;
use std::sync::Arc;

/// Column-major identity matrix
pub const IDENTITY_TRANSFORM: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// Default color for products without a surface style
pub const DEFAULT_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

/// Entity geometry with mesh, color, and transform
///
/// The mesh is expressed in the product's local coordinates; `transform`
/// places it in the world (placement chain times length unit scale).
#[derive(Clone, Debug, PartialEq)]
pub struct EntityGeometry {
    /// Processed mesh data (shared via Arc)
    pub mesh: Arc<MeshData>,
    /// RGBA color [r, g, b, a] where values are 0.0-1.0
    pub color: [f32; 4],
    /// 4x4 transformation matrix (column-major order)
    pub transform: [f64; 16],
    /// Name of the backend that produced the mesh
    pub backend: &'static str,
}

impl EntityGeometry {
    /// Create new entity geometry
    pub fn new(mesh: Arc<MeshData>, color: [f32; 4], transform: [f64; 16]) -> Self {
        Self {
            mesh,
            color,
            transform,
            backend: "tessellation",
        }
    }

    /// Create geometry with identity transform
    pub fn with_identity_transform(mesh: Arc<MeshData>, color: [f32; 4]) -> Self {
        Self::new(mesh, color, IDENTITY_TRANSFORM)
    }

    /// Check if geometry is empty
    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }
}

impl Default for EntityGeometry {
    fn default() -> Self {
        Self::with_identity_transform(Arc::new(MeshData::default()), DEFAULT_COLOR)
    }
}

/// Surface style resolved for a product
#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    /// Name of the surface style, if any
    pub name: Option<String>,
    /// RGBA color, alpha is `1 - transparency`
    pub color: [f32; 4],
}

impl Default for Style {
    fn default() -> Self {
        Self {
            name: None,
            color: DEFAULT_COLOR,
        }
    }
}

/// Get default color for a type name
///
/// Provides consistent colors for element types that carry no style.
pub fn get_default_color(type_name: &str) -> [f32; 4] {
    match type_name {
        "IfcWall" | "IfcWallStandardCase" => [0.85, 0.80, 0.70, 1.0],
        "IfcCurtainWall" => [0.6, 0.7, 0.8, 0.7],
        "IfcSlab" => [0.75, 0.75, 0.75, 1.0],
        "IfcRoof" => [0.72, 0.45, 0.35, 1.0],
        "IfcBeam" => [0.55, 0.60, 0.65, 1.0],
        "IfcColumn" => [0.60, 0.60, 0.60, 1.0],
        "IfcDoor" => [0.55, 0.40, 0.25, 1.0],
        "IfcWindow" => [0.7, 0.85, 0.95, 0.5],
        "IfcCovering" => [0.95, 0.95, 0.95, 1.0],
        "IfcPlate" => [0.60, 0.65, 0.70, 1.0],
        "IfcMember" => [0.58, 0.58, 0.58, 1.0],
        "IfcOpeningElement" => [1.0, 0.3, 0.3, 0.3],
        "IfcBuildingElementProxy" => [0.7, 0.5, 0.8, 1.0],
        _ => DEFAULT_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry_is_empty() {
        let geometry = EntityGeometry::default();
        assert!(geometry.is_empty());
        assert_eq!(geometry.transform, IDENTITY_TRANSFORM);
        assert_eq!(geometry.color, DEFAULT_COLOR);
    }

    #[test]
    fn test_default_color_falls_back_to_grey() {
        assert_eq!(get_default_color("IfcWall"), [0.85, 0.80, 0.70, 1.0]);
        assert_eq!(get_default_color("IfcFurniture"), DEFAULT_COLOR);
    }
}
