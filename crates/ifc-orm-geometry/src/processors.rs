// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Processors - one per representation item type
//!
//! Processors emit meshes in the item's own coordinates, in file length
//! units. Placement and unit scaling are applied by the caller.

use crate::{
    extrusion::{direction_transform, extrude_profile},
    placement::{axis2_placement_frame, cartesian_point, direction, placement_2d},
    profile::Profile2D,
    router::GeometryProcessor,
    triangulation::{calculate_polygon_normal, triangulate_polygon_with_holes, PlaneBasis},
    Error, Mesh, Result,
};
use ifc_orm_model::{AttributeValue, DecodedEntity, EntityId, EntityResolver};
use nalgebra::{Point2, Point3};
use std::sync::Arc;

fn fetch(resolver: &dyn EntityResolver, id: EntityId) -> Result<Arc<DecodedEntity>> {
    resolver.get(id).ok_or(Error::EntityNotFound(id))
}

fn required_ref(entity: &DecodedEntity, index: usize, name: &str) -> Result<EntityId> {
    entity
        .get_ref(index)
        .ok_or_else(|| Error::invalid_attribute(entity.id, index, format!("missing {}", name)))
}

fn required_float(entity: &DecodedEntity, index: usize, name: &str) -> Result<f64> {
    entity
        .get_float(index)
        .ok_or_else(|| Error::invalid_attribute(entity.id, index, format!("missing {}", name)))
}

/// Extrusion of a 2D profile along a direction
///
/// Handles `IfcExtrudedAreaSolid` with rectangle, circle and closed polyline
/// profiles.
#[derive(Debug, Default)]
pub struct ExtrudedAreaSolidProcessor;

impl ExtrudedAreaSolidProcessor {
    pub fn new() -> Self {
        Self
    }

    fn profile(&self, profile: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Profile2D> {
        let is = |ancestor: &str| resolver.is_subtype_of(&profile.type_name, ancestor);

        // IFCRECTANGLEPROFILEDEF(ProfileType, ProfileName, Position, XDim, YDim)
        let mut outline = if is("IfcRectangleProfileDef") {
            Profile2D::rectangle(
                required_float(profile, 3, "XDim")?,
                required_float(profile, 4, "YDim")?,
            )
        } else if is("IfcCircleProfileDef") {
            Profile2D::circle(required_float(profile, 3, "Radius")?, None)
        } else if is("IfcArbitraryClosedProfileDef") {
            let curve = required_ref(profile, 2, "OuterCurve")?;
            Profile2D::new(self.polyline(curve, resolver)?)
        } else {
            return Err(Error::unsupported_type(format!("profile {}", profile.type_name)));
        };

        if is("IfcParameterizedProfileDef") {
            if let Some(position) = profile.get_ref(2) {
                outline.transform(&placement_2d(resolver, position)?);
            }
        }
        Ok(outline)
    }

    fn polyline(&self, curve: EntityId, resolver: &dyn EntityResolver) -> Result<Vec<Point2<f64>>> {
        let curve = fetch(resolver, curve)?;
        if !resolver.is_subtype_of(&curve.type_name, "IfcPolyline") {
            return Err(Error::unsupported_type(format!("curve {}", curve.type_name)));
        }

        let mut points = curve
            .get_refs(0)
            .unwrap_or_default()
            .into_iter()
            .map(|id| cartesian_point(resolver, id).map(|p| Point2::new(p.x, p.y)))
            .collect::<Result<Vec<_>>>()?;

        // Closed polylines repeat the first point
        if points.len() > 1 && (points[0] - points[points.len() - 1]).norm() < 1e-10 {
            points.pop();
        }
        if points.len() < 3 {
            return Err(Error::profile(format!("{} has fewer than 3 distinct points", curve.id)));
        }
        Ok(points)
    }
}

impl GeometryProcessor for ExtrudedAreaSolidProcessor {
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh> {
        // IFCEXTRUDEDAREASOLID(SweptArea, Position, ExtrudedDirection, Depth)
        let profile = fetch(resolver, required_ref(entity, 0, "SweptArea")?)?;
        let profile = self.profile(&profile, resolver)?;
        let extruded = direction(resolver, required_ref(entity, 2, "ExtrudedDirection")?)?;
        let depth = required_float(entity, 3, "Depth")?;

        let mut mesh = extrude_profile(&profile, depth, direction_transform(&extruded)?)?;
        if let Some(position) = entity.get_ref(1) {
            mesh.transform(&axis2_placement_frame(resolver, position)?.to_matrix());
        }
        Ok(mesh)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IfcExtrudedAreaSolid"]
    }
}

/// Explicit triangle mesh, `IfcTriangulatedFaceSet` (IFC4)
#[derive(Debug, Default)]
pub struct TriangulatedFaceSetProcessor;

impl TriangulatedFaceSetProcessor {
    pub fn new() -> Self {
        Self
    }
}

fn triples(list: &[AttributeValue]) -> impl Iterator<Item = Option<[&AttributeValue; 3]>> {
    list.iter().map(|row| match row.as_list() {
        Some([a, b, c]) => Some([a, b, c]),
        _ => None,
    })
}

impl GeometryProcessor for TriangulatedFaceSetProcessor {
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh> {
        // IFCTRIANGULATEDFACESET(Coordinates, Normals, Closed, CoordIndex, PnIndex)
        let points = fetch(resolver, required_ref(entity, 0, "Coordinates")?)?;
        let coords = points
            .get_list(0)
            .ok_or_else(|| Error::invalid_attribute(points.id, 0, "missing CoordList"))?;

        let mut positions = Vec::with_capacity(coords.len() * 3);
        for xyz in triples(coords) {
            let xyz = xyz.ok_or_else(|| Error::invalid_attribute(points.id, 0, "expected 3 coordinates"))?;
            for v in xyz {
                positions.push(v.as_float().unwrap_or(0.0) as f32);
            }
        }
        let vertex_count = positions.len() / 3;

        // PnIndex remaps CoordIndex entries onto the point list
        let pn_index: Option<Vec<i64>> = entity
            .get_list(4)
            .map(|list| list.iter().filter_map(AttributeValue::as_integer).collect());
        let resolve = |one_based: i64| -> Result<u32> {
            let index = match &pn_index {
                Some(map) => usize::try_from(one_based - 1)
                    .ok()
                    .and_then(|i| map.get(i).copied())
                    .unwrap_or(0),
                None => one_based,
            };
            usize::try_from(index - 1)
                .ok()
                .filter(|&i| i < vertex_count)
                .map(|i| i as u32)
                .ok_or_else(|| {
                    Error::invalid_attribute(entity.id, 3, format!("index {} out of range", one_based))
                })
        };

        let faces = entity
            .get_list(3)
            .ok_or_else(|| Error::invalid_attribute(entity.id, 3, "missing CoordIndex"))?;
        let mut indices = Vec::with_capacity(faces.len() * 3);
        for tri in triples(faces) {
            let tri = tri.ok_or_else(|| Error::invalid_attribute(entity.id, 3, "expected 3 indices"))?;
            for v in tri {
                indices.push(resolve(v.as_integer().unwrap_or(0))?);
            }
        }

        let mut mesh = Mesh {
            positions,
            normals: Vec::new(),
            indices,
        };
        mesh.compute_normals();
        Ok(mesh)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IfcTriangulatedFaceSet"]
    }
}

/// Polygonal boundary representation, `IfcFacetedBrep`
///
/// Faces are flat-shaded; inner bounds become holes.
#[derive(Debug, Default)]
pub struct FacetedBrepProcessor;

impl FacetedBrepProcessor {
    pub fn new() -> Self {
        Self
    }

    fn polygon(&self, bound: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Vec<Point3<f64>>> {
        // IFCFACEBOUND(Bound, Orientation)
        let polyloop = fetch(resolver, required_ref(bound, 0, "Bound")?)?;
        if !resolver.is_subtype_of(&polyloop.type_name, "IfcPolyLoop") {
            return Err(Error::unsupported_type(format!("loop {}", polyloop.type_name)));
        }
        let mut points = polyloop
            .get_refs(0)
            .unwrap_or_default()
            .into_iter()
            .map(|id| cartesian_point(resolver, id))
            .collect::<Result<Vec<_>>>()?;

        let forward = match bound.get(1) {
            Some(AttributeValue::Bool(b)) => *b,
            Some(AttributeValue::Enum(e)) => e != "F",
            _ => true,
        };
        if !forward {
            points.reverse();
        }
        Ok(points)
    }

    fn add_face(&self, mesh: &mut Mesh, outer: &[Point3<f64>], holes: &[Vec<Point3<f64>>]) {
        let normal = calculate_polygon_normal(outer);
        let basis = PlaneBasis::new(outer[0], &normal);
        let holes_2d: Vec<Vec<Point2<f64>>> = holes.iter().map(|h| basis.project(h)).collect();

        let all: Vec<&Point3<f64>> = outer.iter().chain(holes.iter().flatten()).collect();
        let indices = match triangulate_polygon_with_holes(&basis.project(outer), &holes_2d) {
            Ok(indices) => indices,
            Err(e) => {
                log::debug!("falling back to a fan for a brep face: {}", e);
                (1..outer.len() - 1).flat_map(|i| [0, i, i + 1]).collect()
            }
        };

        let base = mesh.vertex_count() as u32;
        for p in &all {
            mesh.add_vertex(**p, normal);
        }
        for tri in indices.chunks_exact(3) {
            let corners = [*all[tri[0]], *all[tri[1]], *all[tri[2]]];
            // Keep triangles facing along the face normal
            let facing = (corners[1] - corners[0]).cross(&(corners[2] - corners[0])).dot(&normal);
            let (b, c) = if facing >= 0.0 { (tri[1], tri[2]) } else { (tri[2], tri[1]) };
            mesh.add_triangle(base + tri[0] as u32, base + b as u32, base + c as u32);
        }
    }
}

impl GeometryProcessor for FacetedBrepProcessor {
    fn process(&self, entity: &DecodedEntity, resolver: &dyn EntityResolver) -> Result<Mesh> {
        // IFCFACETEDBREP(Outer) -> IFCCLOSEDSHELL(CfsFaces) -> IFCFACE(Bounds)
        let shell = fetch(resolver, required_ref(entity, 0, "Outer")?)?;
        let mut mesh = Mesh::new();

        for face_id in shell.get_refs(0).unwrap_or_default() {
            let face = fetch(resolver, face_id)?;
            let mut outer: Option<Vec<Point3<f64>>> = None;
            let mut holes = Vec::new();

            for bound_id in face.get_refs(0).unwrap_or_default() {
                let bound = fetch(resolver, bound_id)?;
                let polygon = self.polygon(&bound, resolver)?;
                if polygon.len() < 3 {
                    continue;
                }
                let is_outer = resolver.is_subtype_of(&bound.type_name, "IfcFaceOuterBound");
                match (is_outer, outer.is_some()) {
                    (true, true) => {
                        holes.extend(outer.replace(polygon));
                    }
                    (_, false) => outer = Some(polygon),
                    (false, true) => holes.push(polygon),
                }
            }

            if let Some(outer) = outer {
                self.add_face(&mut mesh, &outer, &holes);
            }
        }
        Ok(mesh)
    }

    fn supported_types(&self) -> &'static [&'static str] {
        &["IfcFacetedBrep"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ifc_orm_parser::Session;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCDIRECTION((0.,0.,1.));
#3=IFCAXIS2PLACEMENT3D(#1,$,$);
#4=IFCCARTESIANPOINT((0.,0.));
#5=IFCAXIS2PLACEMENT2D(#4,$);
#10=IFCRECTANGLEPROFILEDEF(.AREA.,$,#5,4.,0.2);
#11=IFCEXTRUDEDAREASOLID(#10,#3,#2,3.);
#12=IFCCIRCLEPROFILEDEF(.AREA.,$,$,1.);
#13=IFCEXTRUDEDAREASOLID(#12,$,#2,2.);
#20=IFCCARTESIANPOINT((0.,0.));
#21=IFCCARTESIANPOINT((2.,0.));
#22=IFCCARTESIANPOINT((2.,1.));
#23=IFCCARTESIANPOINT((1.,1.));
#24=IFCCARTESIANPOINT((1.,2.));
#25=IFCCARTESIANPOINT((0.,2.));
#26=IFCPOLYLINE((#20,#21,#22,#23,#24,#25,#20));
#27=IFCARBITRARYCLOSEDPROFILEDEF(.AREA.,'L',#26);
#28=IFCEXTRUDEDAREASOLID(#27,$,#2,1.);
#30=IFCCARTESIANPOINTLIST3D(((0.,0.,0.),(1.,0.,0.),(0.,1.,0.),(0.,0.,1.)));
#31=IFCTRIANGULATEDFACESET(#30,$,.T.,((1,3,2),(1,2,4),(2,3,4),(3,1,4)),$);
#32=IFCTRIANGULATEDFACESET(#30,$,.T.,((1,2,9)),$);
#33=IFCTRIANGULATEDFACESET(#30,$,.T.,((1,2,3)),(4,3,2,1));
#40=IFCCARTESIANPOINT((0.,0.,0.));
#41=IFCCARTESIANPOINT((1.,0.,0.));
#42=IFCCARTESIANPOINT((1.,1.,0.));
#43=IFCCARTESIANPOINT((0.,1.,0.));
#44=IFCPOLYLOOP((#40,#41,#42,#43));
#45=IFCFACEOUTERBOUND(#44,.F.);
#46=IFCFACE((#45));
#47=IFCCLOSEDSHELL((#46));
#48=IFCFACETEDBREP(#47);
#50=IFCDIRECTION((1.,0.,0.));
#51=IFCEXTRUDEDAREASOLID(#10,$,#50,1.);
ENDSEC;
END-ISO-10303-21;
"#;

    fn process(processor: &dyn GeometryProcessor, id: u32) -> Result<Mesh> {
        let session = Session::from_content(TEST_IFC).unwrap();
        let entity = session.by_id(EntityId(id)).unwrap();
        processor.process(&entity, &session)
    }

    fn volume(mesh: &Mesh) -> f64 {
        mesh.indices
            .chunks_exact(3)
            .map(|t| {
                let a = mesh.point(t[0] as usize).unwrap().coords;
                let b = mesh.point(t[1] as usize).unwrap().coords;
                let c = mesh.point(t[2] as usize).unwrap().coords;
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    #[test]
    fn test_rectangle_extrusion() {
        let mesh = process(&ExtrudedAreaSolidProcessor::new(), 11).unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        assert_relative_eq!(volume(&mesh), 4.0 * 0.2 * 3.0, epsilon = 1e-4);
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.x, -2.0);
        assert_relative_eq!(max.z, 3.0);
    }

    #[test]
    fn test_circle_and_polyline_extrusions() {
        let cylinder = process(&ExtrudedAreaSolidProcessor::new(), 13).unwrap();
        let (min, max) = cylinder.bounds().unwrap();
        assert_relative_eq!(min.x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(max.z, 2.0);

        let l_shape = process(&ExtrudedAreaSolidProcessor::new(), 28).unwrap();
        assert_relative_eq!(volume(&l_shape), 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_direction_in_profile_plane_is_rejected() {
        assert!(process(&ExtrudedAreaSolidProcessor::new(), 51).is_err());
    }

    #[test]
    fn test_triangulated_face_set() {
        let mesh = process(&TriangulatedFaceSetProcessor::new(), 31).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(&mesh.indices[..3], &[0, 2, 1]);
        assert_eq!(mesh.normals.len(), 12);
        assert_relative_eq!(volume(&mesh), 1.0 / 6.0, epsilon = 1e-6);

        let err = process(&TriangulatedFaceSetProcessor::new(), 32).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let remapped = process(&TriangulatedFaceSetProcessor::new(), 33).unwrap();
        assert_eq!(remapped.indices, vec![3, 2, 1]);
    }

    #[test]
    fn test_faceted_brep_respects_orientation() {
        let mesh = process(&FacetedBrepProcessor::new(), 48).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        // The loop is reversed, so the face points down
        assert_relative_eq!(mesh.normals[2], -1.0, epsilon = 1e-6);
    }
}
