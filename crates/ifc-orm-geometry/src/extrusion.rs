// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linear extrusion of 2D profiles into closed meshes

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::profile::{signed_area, Profile2D};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

/// Extrude a profile along +Z by `depth`
///
/// The mesh has flat-shaded caps and side walls, each face with its own
/// vertices. `transform` is applied to the result when given.
pub fn extrude_profile(
    profile: &Profile2D,
    depth: f64,
    transform: Option<Matrix4<f64>>,
) -> Result<Mesh> {
    if !(depth.is_finite() && depth > 0.0) {
        return Err(Error::geometry(format!("invalid extrusion depth {}", depth)));
    }

    let profile = profile.clone().normalized();
    let triangulation = profile.triangulate()?;
    let points = &triangulation.points;

    let side_count = profile.outer.len() + profile.holes.iter().map(Vec::len).sum::<usize>();
    let mut mesh = Mesh::with_capacity(
        points.len() * 2 + side_count * 4,
        triangulation.indices.len() / 3 * 2 + side_count * 2,
    );

    // Caps
    for (z, normal) in [(0.0, -Vector3::z()), (depth, Vector3::z())] {
        let base = mesh.vertex_count() as u32;
        for p in points {
            mesh.add_vertex(Point3::new(p.x, p.y, z), normal);
        }
        for tri in triangulation.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let ccw = signed_area(&[points[a], points[b], points[c]]) > 0.0;
            // Top faces up, bottom faces down
            let (b, c) = if ccw == (normal.z > 0.0) { (b, c) } else { (c, b) };
            mesh.add_triangle(base + a as u32, base + b as u32, base + c as u32);
        }
    }

    // Walls
    for ring in std::iter::once(&profile.outer).chain(profile.holes.iter()) {
        add_walls(&mut mesh, ring, depth);
    }

    if let Some(matrix) = transform {
        mesh.transform(&matrix);
    }
    Ok(mesh)
}

/// One quad per edge of a closed ring, normals pointing away from the solid
fn add_walls(mesh: &mut Mesh, ring: &[Point2<f64>], depth: f64) {
    let n = ring.len();
    for i in 0..n {
        let (p0, p1) = (ring[i], ring[(i + 1) % n]);
        let edge = p1 - p0;
        let Some(normal) = Vector3::new(edge.y, -edge.x, 0.0).try_normalize(1e-12) else {
            continue;
        };
        let a = mesh.add_vertex(Point3::new(p0.x, p0.y, 0.0), normal);
        let b = mesh.add_vertex(Point3::new(p1.x, p1.y, 0.0), normal);
        let c = mesh.add_vertex(Point3::new(p1.x, p1.y, depth), normal);
        let d = mesh.add_vertex(Point3::new(p0.x, p0.y, depth), normal);
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(a, c, d);
    }
}

/// Apply a transform to a mesh in place
#[inline]
pub fn apply_transform(mesh: &mut Mesh, transform: &Matrix4<f64>) {
    mesh.transform(transform);
}

/// Shear that carries the +Z extrusion onto `direction`
///
/// Mesh heights become distances along the normalized direction. Returns
/// `None` for +Z itself.
pub fn direction_transform(direction: &Vector3<f64>) -> Result<Option<Matrix4<f64>>> {
    let d = direction
        .try_normalize(1e-12)
        .ok_or_else(|| Error::geometry("zero extrusion direction"))?;
    if d.z.abs() < 1e-10 {
        return Err(Error::geometry("extrusion direction lies in the profile plane"));
    }
    if (d - Vector3::z()).norm() < 1e-10 {
        return Ok(None);
    }
    let mut matrix = Matrix4::identity();
    matrix[(0, 2)] = d.x;
    matrix[(1, 2)] = d.y;
    matrix[(2, 2)] = d.z;
    Ok(Some(matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Signed volume by the divergence theorem, positive for outward winding
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
    fn test_box_extrusion() {
        let mesh = extrude_profile(&Profile2D::rectangle(2.0, 1.0), 3.0, None).unwrap();
        // two caps of 2 triangles plus 4 walls of 2 triangles
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertex_count(), 8 + 16);
        assert_relative_eq!(volume(&mesh), 6.0, epsilon = 1e-5);

        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.z, 0.0);
        assert_relative_eq!(max.z, 3.0);
    }

    #[test]
    fn test_clockwise_input_is_still_outward() {
        let mut profile = Profile2D::rectangle(1.0, 1.0);
        profile.outer.reverse();
        let mesh = extrude_profile(&profile, 2.0, None).unwrap();
        assert_relative_eq!(volume(&mesh), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_hollow_extrusion_volume() {
        let mut profile = Profile2D::rectangle(4.0, 4.0);
        profile.add_hole(Profile2D::rectangle(2.0, 2.0).outer);
        let mesh = extrude_profile(&profile, 1.0, None).unwrap();
        assert_relative_eq!(volume(&mesh), 12.0, epsilon = 1e-5);
    }

    #[test]
    fn test_transform_is_applied() {
        let offset = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0));
        let mesh = extrude_profile(&Profile2D::rectangle(2.0, 2.0), 1.0, Some(offset)).unwrap();
        let (min, _) = mesh.bounds().unwrap();
        assert_relative_eq!(min.x, 9.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_bad_depth() {
        assert!(extrude_profile(&Profile2D::rectangle(1.0, 1.0), 0.0, None).is_err());
        assert!(extrude_profile(&Profile2D::rectangle(1.0, 1.0), f64::NAN, None).is_err());
    }

    #[test]
    fn test_direction_transform() {
        assert!(direction_transform(&Vector3::z()).unwrap().is_none());
        assert!(direction_transform(&Vector3::x()).is_err());

        let down = direction_transform(&-Vector3::z()).unwrap().unwrap();
        let mesh = extrude_profile(&Profile2D::rectangle(1.0, 1.0), 2.0, Some(down)).unwrap();
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.z, -2.0);
        assert_relative_eq!(max.z, 0.0);
        assert_relative_eq!(volume(&mesh), 2.0, epsilon = 1e-5);

        let oblique = direction_transform(&Vector3::new(1.0, 0.0, 1.0)).unwrap().unwrap();
        let p = oblique.transform_point(&Point3::new(0.0, 0.0, 2f64.sqrt()));
        assert_relative_eq!(p, Point3::new(1.0, 0.0, 1.0), epsilon = 1e-12);
    }
}
