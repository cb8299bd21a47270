// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pluggable geometry backends
//!
//! A backend turns a product into a [`BodyGeometry`]: a mesh in product
//! coordinates plus the placement matrix that puts it in the world. The
//! runtime only talks to the [`GeometryBackend`] trait, so a BRep kernel
//! can replace the tessellation backend without touching entity code.

use crate::frame::column_major;
use crate::placement::object_transform;
use crate::router::GeometryRouter;
use crate::{Error, Mesh, Result};
use ifc_orm_model::{DecodedEntity, EntityGeometry, EntityId, EntityResolver};
use nalgebra::{Matrix4, Vector3};
use std::sync::Arc;

/// Body of a product as produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct BodyGeometry {
    /// Mesh in product coordinates, file length units
    pub mesh: Mesh,
    /// Product-to-world matrix, file length units
    pub transform: Matrix4<f64>,
    /// Representation items that contributed to the mesh
    pub items: Vec<EntityId>,
}

impl BodyGeometry {
    pub fn new(mesh: Mesh, transform: Matrix4<f64>) -> Self {
        Self {
            mesh,
            transform,
            items: Vec::new(),
        }
    }

    /// Mesh with the placement applied
    pub fn world_mesh(&self) -> Mesh {
        let mut mesh = self.mesh.clone();
        mesh.transform(&self.transform);
        mesh
    }

    /// Backend-neutral geometry value
    ///
    /// `unit_scale` converts file length units to metres and is folded
    /// into the transform; the mesh itself stays in file units.
    pub fn into_entity_geometry(
        self,
        color: [f32; 4],
        unit_scale: f64,
        backend: &'static str,
    ) -> EntityGeometry {
        let scale = Matrix4::new_nonuniform_scaling(&Vector3::repeat(unit_scale));
        let mut geometry = EntityGeometry::new(
            Arc::new(self.mesh.to_mesh_data()),
            color,
            column_major(&(scale * self.transform)),
        );
        geometry.backend = backend;
        geometry
    }
}

/// Geometry kernel behind product bodies
///
/// Implementations must be shareable across the preload pool.
pub trait GeometryBackend: Send + Sync {
    /// Short identifier recorded on produced geometry
    fn name(&self) -> &'static str;

    /// Body of a product, `None` when it has no body representation
    fn from_shape(
        &self,
        element: &DecodedEntity,
        resolver: &dyn EntityResolver,
    ) -> Result<Option<BodyGeometry>>;

    /// Boolean difference `body - opening`, both in world coordinates
    fn subtract(&self, body: &BodyGeometry, opening: &BodyGeometry) -> Result<BodyGeometry>;

    /// Body moved by `matrix`
    fn transform(&self, body: &BodyGeometry, matrix: &Matrix4<f64>) -> BodyGeometry {
        BodyGeometry {
            mesh: body.mesh.clone(),
            transform: matrix * body.transform,
            items: body.items.clone(),
        }
    }
}

/// Triangle meshes from the processor router; no boolean operations
#[derive(Default)]
pub struct TessellationBackend {
    router: GeometryRouter,
}

impl TessellationBackend {
    pub const NAME: &'static str = "tessellation";

    pub fn new() -> Self {
        Self::default()
    }

    /// Backend over a custom router
    pub fn with_router(router: GeometryRouter) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &GeometryRouter {
        &self.router
    }
}

impl GeometryBackend for TessellationBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn from_shape(
        &self,
        element: &DecodedEntity,
        resolver: &dyn EntityResolver,
    ) -> Result<Option<BodyGeometry>> {
        let (mesh, items) = self.router.process_product(element, resolver);
        if mesh.is_empty() {
            return Ok(None);
        }
        let transform = object_transform(resolver, element, 1.0)?;
        Ok(Some(BodyGeometry {
            mesh,
            transform,
            items,
        }))
    }

    fn subtract(&self, _body: &BodyGeometry, _opening: &BodyGeometry) -> Result<BodyGeometry> {
        Err(Error::unsupported(Self::NAME, "boolean difference"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ifc_orm_parser::Session;
    use nalgebra::Point3;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCDIRECTION((0.,0.,1.));
#3=IFCAXIS2PLACEMENT3D(#1,$,$);
#4=IFCGEOMETRICREPRESENTATIONCONTEXT($,'Model',3,1.E-05,#3,$);
#5=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,2000.,1000.);
#6=IFCEXTRUDEDAREASOLID(#5,$,#2,3000.);
#7=IFCSHAPEREPRESENTATION(#4,'Body','SweptSolid',(#6));
#8=IFCPRODUCTDEFINITIONSHAPE($,$,(#7));
#9=IFCCARTESIANPOINT((5000.,0.,0.));
#10=IFCAXIS2PLACEMENT3D(#9,$,$);
#11=IFCLOCALPLACEMENT($,#10);
#12=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall',$,$,#11,#8,$,$);
#13=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOI',$,'Bare',$,$,#11,$,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_from_shape_places_body() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let backend = TessellationBackend::new();
        let wall = session.by_id(EntityId(12)).unwrap();

        let body = backend.from_shape(&wall, &session).unwrap().unwrap();
        assert_eq!(body.items, vec![EntityId(6)]);
        let (min, max) = body.world_mesh().bounds().unwrap();
        assert_relative_eq!(min, Point3::new(4000.0, -500.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(max, Point3::new(6000.0, 500.0, 3000.0), epsilon = 1e-9);

        let bare = session.by_id(EntityId(13)).unwrap();
        assert!(backend.from_shape(&bare, &session).unwrap().is_none());
    }

    #[test]
    fn test_entity_geometry_folds_unit_scale() {
        let session = Session::from_content(TEST_IFC).unwrap();
        let backend = TessellationBackend::new();
        let wall = session.by_id(EntityId(12)).unwrap();
        let body = backend.from_shape(&wall, &session).unwrap().unwrap();

        let geometry = body.into_entity_geometry([1.0; 4], 0.001, backend.name());
        assert_eq!(geometry.backend, "tessellation");
        assert_relative_eq!(geometry.transform[0], 0.001);
        assert_relative_eq!(geometry.transform[12], 5.0);
        assert_eq!(geometry.triangle_count(), 12);
    }

    #[test]
    fn test_subtract_is_unsupported() {
        let backend = TessellationBackend::new();
        let body = BodyGeometry::new(Mesh::new(), Matrix4::identity());
        let err = backend.subtract(&body, &body).unwrap_err();
        assert!(matches!(err, Error::Unsupported { operation: "boolean difference", .. }));
    }

    #[test]
    fn test_default_transform_composes() {
        let backend = TessellationBackend::new();
        let body = BodyGeometry::new(
            Mesh::new(),
            Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0)),
        );
        let moved = backend.transform(&body, &Matrix4::new_translation(&Vector3::new(0.0, 2.0, 0.0)));
        assert_relative_eq!(moved.transform[(0, 3)], 1.0);
        assert_relative_eq!(moved.transform[(1, 3)], 2.0);
    }
}
