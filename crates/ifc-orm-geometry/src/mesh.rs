// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle mesh produced by the processors

use ifc_orm_model::MeshData;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Indexed triangle mesh with per-vertex normals
///
/// `positions` and `normals` are flat `xyz` arrays. `normals` is either
/// empty or the same length as `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices * 3),
            normals: Vec::with_capacity(vertices * 3),
            indices: Vec::with_capacity(triangles * 3),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions
            .extend([position.x as f32, position.y as f32, position.z as f32]);
        self.normals
            .extend([normal.x as f32, normal.y as f32, normal.z as f32]);
        index
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend([a, b, c]);
    }

    /// Append another mesh, offsetting its indices
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        let offset = self.vertex_count() as u32;
        let keep_normals = self.normals.len() == self.positions.len()
            && other.normals.len() == other.positions.len();
        self.positions.extend_from_slice(&other.positions);
        if keep_normals {
            self.normals.extend_from_slice(&other.normals);
        } else {
            self.normals.clear();
        }
        self.indices.extend(other.indices.iter().map(|i| i + offset));
    }

    /// Recompute area-weighted vertex normals from the triangles
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vector3::<f64>::zeros(); self.vertex_count()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(pa), Some(pb), Some(pc)) = (self.point(a), self.point(b), self.point(c))
            else {
                continue;
            };
            let face = (pb - pa).cross(&(pc - pa));
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        self.normals = normals
            .into_iter()
            .flat_map(|n| {
                let n = n.try_normalize(1e-12).unwrap_or_else(Vector3::z);
                [n.x as f32, n.y as f32, n.z as f32]
            })
            .collect();
    }

    /// Vertex position at `index`
    pub fn point(&self, index: usize) -> Option<Point3<f64>> {
        let p = self.positions.get(index * 3..index * 3 + 3)?;
        Some(Point3::new(p[0] as f64, p[1] as f64, p[2] as f64))
    }

    /// Apply a homogeneous transform to positions and normals
    ///
    /// Mirroring transforms also flip the triangle winding so faces keep
    /// pointing outward.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for p in self.positions.chunks_exact_mut(3) {
            let q = matrix.transform_point(&Point3::new(p[0] as f64, p[1] as f64, p[2] as f64));
            p[0] = q.x as f32;
            p[1] = q.y as f32;
            p[2] = q.z as f32;
        }

        let rotation: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if rotation.determinant() < 0.0 {
            for tri in self.indices.chunks_exact_mut(3) {
                tri.swap(1, 2);
            }
        }
        let normal_matrix = rotation
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(rotation);
        for n in self.normals.chunks_exact_mut(3) {
            let v = normal_matrix * Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64);
            let v = v.try_normalize(1e-12).unwrap_or(v);
            n[0] = v.x as f32;
            n[1] = v.y as f32;
            n[2] = v.z as f32;
        }
    }

    /// Axis-aligned bounds as `(min, max)`
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);
        for p in self.positions.chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis] as f64);
                max[axis] = max[axis].max(p[axis] as f64);
            }
        }
        (self.vertex_count() > 0).then_some((min, max))
    }

    pub fn to_mesh_data(&self) -> MeshData {
        MeshData {
            positions: self.positions.clone(),
            normals: self.normals.clone(),
            indices: self.indices.clone(),
        }
    }
}

impl From<MeshData> for Mesh {
    fn from(data: MeshData) -> Self {
        Self {
            positions: data.positions,
            normals: data.normals,
            indices: data.indices,
        }
    }
}

impl From<Mesh> for MeshData {
    fn from(mesh: Mesh) -> Self {
        MeshData {
            positions: mesh.positions,
            normals: mesh.normals,
            indices: mesh.indices,
        }
    }
}
