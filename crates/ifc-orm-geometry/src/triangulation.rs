// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar polygon triangulation for brep faces

use crate::{Error, Point2, Point3, Result, Vector3};

/// Whether all turns of a polygon have the same sign
fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    let mut sign = 0.0f64;
    for i in 0..n {
        let (p0, p1, p2) = (&points[i], &points[(i + 1) % n], &points[(i + 2) % n]);
        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);
        if cross.abs() <= 1e-10 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if sign != cross.signum() {
            return false;
        }
    }
    n >= 3
}

fn fan(n: usize) -> Vec<usize> {
    (1..n - 1).flat_map(|i| [0, i, i + 1]).collect()
}

/// Triangulate a simple polygon, indices into `points`
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    triangulate_polygon_with_holes(points, &[])
}

/// Triangulate a polygon with holes
///
/// Indices address the outer points followed by every hole with at least
/// three points, in order.
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    let n = outer.len();
    if n < 3 {
        return Err(Error::triangulation("polygon needs at least 3 points"));
    }

    let holes: Vec<&Vec<Point2<f64>>> = holes.iter().filter(|h| h.len() >= 3).collect();
    if holes.is_empty() && (n <= 4 || (n <= 8 && is_convex(outer))) {
        return Ok(fan(n));
    }

    let mut flat: Vec<f64> = outer.iter().flat_map(|p| [p.x, p.y]).collect();
    let mut starts = Vec::with_capacity(holes.len());
    for hole in holes {
        starts.push(flat.len() / 2);
        flat.extend(hole.iter().flat_map(|p| [p.x, p.y]));
    }

    earcutr::earcut(&flat, &starts, 2).map_err(|e| Error::triangulation(format!("{:?}", e)))
}

/// Orthonormal 2D coordinate system on a plane in space
#[derive(Debug, Clone, Copy)]
pub struct PlaneBasis {
    pub origin: Point3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl PlaneBasis {
    /// Basis through `origin` perpendicular to `normal`
    pub fn new(origin: Point3<f64>, normal: &Vector3<f64>) -> Self {
        let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());
        let reference = if ax <= ay && ax <= az {
            Vector3::x()
        } else if ay <= az {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let u = normal.cross(&reference).normalize();
        let v = normal.cross(&u).normalize();
        Self { origin, u, v }
    }

    pub fn project(&self, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        points
            .iter()
            .map(|p| {
                let d = p - self.origin;
                Point2::new(d.dot(&self.u), d.dot(&self.v))
            })
            .collect()
    }
}

/// Unit normal of a polygon by Newell's method, +Z when degenerate
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    let mut normal = Vector3::<f64>::zeros();
    for i in 0..n {
        let (c, d) = (&points[i], &points[(i + 1) % n]);
        normal.x += (c.y - d.y) * (c.z + d.z);
        normal.y += (c.z - d.z) * (c.x + d.x);
        normal.z += (c.x - d.x) * (c.y + d.y);
    }
    normal.try_normalize(1e-10).unwrap_or_else(Vector3::z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_small_polygons_use_a_fan() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(triangulate_polygon(&square).unwrap(), vec![0, 1, 2, 0, 2, 3]);
        assert!(triangulate_polygon(&square[..2]).is_err());
    }

    #[test]
    fn test_concave_polygon_uses_earcut() {
        // L-shape
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert_eq!(triangulate_polygon(&points).unwrap().len(), 4 * 3);
    }

    #[test]
    fn test_newell_normal_and_projection() {
        let points = [
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(0.0, 1.0, 2.0),
            Point3::new(0.0, 1.0, 3.0),
            Point3::new(0.0, 0.0, 3.0),
        ];
        let normal = calculate_polygon_normal(&points);
        assert_relative_eq!(normal, Vector3::x(), epsilon = 1e-12);

        let basis = PlaneBasis::new(points[0], &normal);
        let projected = basis.project(&points);
        let diagonal = projected[2] - projected[0];
        assert_relative_eq!(diagonal.norm(), 2f64.sqrt(), epsilon = 1e-12);
    }
}
