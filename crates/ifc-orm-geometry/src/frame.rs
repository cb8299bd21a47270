// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Right-handed coordinate frames

use nalgebra::{Matrix4, Point3, Vector3};

/// Origin plus orthonormal X and Y axes; Z follows from their cross product
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub origin: Point3<f64>,
    pub xaxis: Vector3<f64>,
    pub yaxis: Vector3<f64>,
}

impl Frame {
    /// Frame from an origin and two directions
    ///
    /// `xaxis` keeps its direction; `yaxis` is re-orthogonalized against it.
    /// Degenerate input falls back to the world axes.
    pub fn new(origin: Point3<f64>, xaxis: Vector3<f64>, yaxis: Vector3<f64>) -> Self {
        let Some(x) = xaxis.try_normalize(1e-12) else {
            return Self::world_xy().with_origin(origin);
        };
        let Some(z) = x.cross(&yaxis).try_normalize(1e-12) else {
            return Self::world_xy().with_origin(origin);
        };
        Self {
            origin,
            xaxis: x,
            yaxis: z.cross(&x),
        }
    }

    pub fn world_xy() -> Self {
        Self {
            origin: Point3::origin(),
            xaxis: Vector3::x(),
            yaxis: Vector3::y(),
        }
    }

    pub fn with_origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }

    pub fn zaxis(&self) -> Vector3<f64> {
        self.xaxis.cross(&self.yaxis)
    }

    /// Matrix taking frame-local coordinates to the parent space
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let z = self.zaxis();
        let o = self.origin;
        #[rustfmt::skip]
        let m = Matrix4::new(
            self.xaxis.x, self.yaxis.x, z.x, o.x,
            self.xaxis.y, self.yaxis.y, z.y, o.y,
            self.xaxis.z, self.yaxis.z, z.z, o.z,
            0.0, 0.0, 0.0, 1.0,
        );
        m
    }

    /// Frame of a rigid transform; scale in the matrix is dropped
    pub fn from_matrix(matrix: &Matrix4<f64>) -> Self {
        let column = |i: usize| Vector3::new(matrix[(0, i)], matrix[(1, i)], matrix[(2, i)]);
        Self::new(
            Point3::from(column(3)),
            column(0),
            column(1),
        )
    }

    /// This frame moved by `matrix`
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        Self::new(
            matrix.transform_point(&self.origin),
            matrix.transform_vector(&self.xaxis),
            matrix.transform_vector(&self.yaxis),
        )
    }

    /// Column-major flat matrix, as stored on `EntityGeometry`
    pub fn to_column_major(&self) -> [f64; 16] {
        column_major(&self.to_matrix())
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::world_xy()
    }
}

/// Flatten a matrix in column-major order
pub fn column_major(matrix: &Matrix4<f64>) -> [f64; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_orthonormalizes() {
        let frame = Frame::new(
            Point3::new(1.0, 2.0, 3.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        );
        assert_relative_eq!(frame.xaxis, Vector3::x());
        assert_relative_eq!(frame.yaxis, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(frame.zaxis(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_axes_fall_back() {
        let frame = Frame::new(Point3::new(5.0, 0.0, 0.0), Vector3::x(), Vector3::x());
        assert_eq!(frame, Frame::world_xy().with_origin(Point3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn test_matrix_conversion() {
        let frame = Frame::new(Point3::new(1.0, 0.0, 0.0), Vector3::y(), -Vector3::x());
        let matrix = frame.to_matrix();
        let p = matrix.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);

        let back = Frame::from_matrix(&matrix);
        assert_relative_eq!(back.origin, frame.origin);
        assert_relative_eq!(back.yaxis, frame.yaxis, epsilon = 1e-12);

        let flat = frame.to_column_major();
        assert_eq!(&flat[12..15], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transformed() {
        let shift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 2.0));
        let frame = Frame::world_xy().transformed(&shift);
        assert_eq!(frame.origin, Point3::new(0.0, 0.0, 2.0));
        assert_eq!(frame.xaxis, Vector3::x());
    }
}
