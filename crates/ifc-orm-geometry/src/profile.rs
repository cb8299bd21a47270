// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D profiles swept by area solids

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Point2};

/// Closed 2D outline with optional holes
#[derive(Debug, Clone, PartialEq)]
pub struct Profile2D {
    /// Outer boundary
    pub outer: Vec<Point2<f64>>,
    /// Inner boundaries
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Profile2D {
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn add_hole(&mut self, hole: Vec<Point2<f64>>) {
        self.holes.push(hole);
    }

    /// Rectangle centered at the origin
    pub fn rectangle(width: f64, height: f64) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::new(vec![
            Point2::new(-hw, -hh),
            Point2::new(hw, -hh),
            Point2::new(hw, hh),
            Point2::new(-hw, hh),
        ])
    }

    /// Circle centered at the origin, segment count adapted to the radius
    pub fn circle(radius: f64, segments: Option<usize>) -> Self {
        let segments = segments.unwrap_or_else(|| calculate_circle_segments(radius));
        Self::new(circle_points(radius, segments))
    }

    /// Orient the outer boundary counter-clockwise and holes clockwise
    pub fn normalized(mut self) -> Self {
        if signed_area(&self.outer) < 0.0 {
            self.outer.reverse();
        }
        for hole in &mut self.holes {
            if signed_area(hole) > 0.0 {
                hole.reverse();
            }
        }
        self
    }

    /// Apply a 2D homogeneous transform to every point
    pub fn transform(&mut self, matrix: &Matrix3<f64>) {
        let apply = |p: &mut Point2<f64>| *p = matrix.transform_point(p);
        self.outer.iter_mut().for_each(apply);
        self.holes.iter_mut().flatten().for_each(apply);
    }

    /// Triangulate with earcut
    ///
    /// Indices address `outer` followed by each hole in order.
    pub fn triangulate(&self) -> Result<Triangulation> {
        if self.outer.len() < 3 {
            return Err(Error::profile("profile needs at least 3 points"));
        }

        let points: Vec<Point2<f64>> = self
            .outer
            .iter()
            .chain(self.holes.iter().flatten())
            .copied()
            .collect();
        let flat: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y]).collect();

        let mut hole_starts = Vec::with_capacity(self.holes.len());
        let mut start = self.outer.len();
        for hole in &self.holes {
            hole_starts.push(start);
            start += hole.len();
        }

        let indices = earcutr::earcut(&flat, &hole_starts, 2)
            .map_err(|e| Error::triangulation(format!("{:?}", e)))?;
        Ok(Triangulation { points, indices })
    }
}

/// Triangulated profile
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Outer and hole points, flattened
    pub points: Vec<Point2<f64>>,
    /// Triangle indices into `points`
    pub indices: Vec<usize>,
}

/// Shoelace area, positive for counter-clockwise loops
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (&points[i], &points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

/// Counter-clockwise points on a circle
pub fn circle_points(radius: f64, segments: usize) -> Vec<Point2<f64>> {
    (0..segments)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / segments as f64;
            Point2::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Adaptive number of segments for a circle
#[inline]
pub fn calculate_circle_segments(radius: f64) -> usize {
    let segments = (radius.sqrt() * 8.0).ceil() as usize;
    segments.clamp(8, 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn test_rectangle_profile() {
        let profile = Profile2D::rectangle(10.0, 5.0);
        assert_eq!(profile.outer.len(), 4);
        assert_relative_eq!(signed_area(&profile.outer), 50.0);
    }

    #[test]
    fn test_circle_segments_are_clamped() {
        assert_eq!(Profile2D::circle(0.01, None).outer.len(), 8);
        assert_eq!(Profile2D::circle(5000.0, None).outer.len(), 32);
        assert_eq!(Profile2D::circle(1.0, Some(12)).outer.len(), 12);
    }

    #[test]
    fn test_normalized_fixes_winding() {
        let mut outer = Profile2D::rectangle(2.0, 2.0).outer;
        outer.reverse();
        let mut profile = Profile2D::new(outer);
        profile.add_hole(Profile2D::rectangle(1.0, 1.0).outer);

        let profile = profile.normalized();
        assert!(signed_area(&profile.outer) > 0.0);
        assert!(signed_area(&profile.holes[0]) < 0.0);
    }

    #[test]
    fn test_triangulate_with_hole() {
        let mut profile = Profile2D::rectangle(4.0, 4.0);
        profile.add_hole(Profile2D::rectangle(1.0, 1.0).outer);
        let tri = profile.normalized().triangulate().unwrap();
        assert_eq!(tri.points.len(), 8);
        assert_eq!(tri.indices.len(), 8 * 3);

        let area: f64 = tri
            .indices
            .chunks_exact(3)
            .map(|t| signed_area(&[tri.points[t[0]], tri.points[t[1]], tri.points[t[2]]]).abs())
            .sum();
        assert_relative_eq!(area, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_transform_translates() {
        let mut profile = Profile2D::rectangle(2.0, 2.0);
        profile.transform(&Matrix3::new_translation(&Vector2::new(1.0, 1.0)));
        assert_eq!(profile.outer[0], Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_degenerate_profile_is_rejected() {
        let profile = Profile2D::new(vec![Point2::origin(), Point2::new(1.0, 0.0)]);
        assert!(matches!(profile.triangulate(), Err(Error::Profile(_))));
    }
}
