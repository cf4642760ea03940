//! Mesh geometry built from model elements.

use crate::resource_pack::{BlockModel, ModelElement};
use crate::types::Direction;

/// A vertex in the output mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in block space, centered on the origin (-0.5..0.5).
    pub position: [f32; 3],
    /// Normal vector.
    pub normal: [f32; 3],
    /// Atlas texture coordinates, V up.
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// A triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Triangle indices (3 per triangle).
    pub indices: Vec<u32>,
}

/// UVs for a face with no atlas: the whole texture, V up.
const FULL_FACE_UV: [[f32; 2]; 4] = [[0.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Box geometry for every element of `model`: six quads per element,
    /// textured with the element's `mapped_uv` when present.
    pub fn from_model(model: &BlockModel) -> Self {
        let mut mesh = Mesh::new();
        for element in model.elements() {
            mesh.add_element(element);
        }
        mesh
    }

    /// Append the six faces of one element.
    pub fn add_element(&mut self, element: &ModelElement) {
        for direction in Direction::ALL {
            let uvs = element.face_uv(direction).unwrap_or(FULL_FACE_UV);
            let corners = direction.corners(element.from, element.to);
            let normal = match &element.rotation {
                Some(rotation) => rotation.apply_normal(direction.normal()),
                None => direction.normal(),
            };

            let mut indices = [0u32; 4];
            for (i, corner) in corners.iter().enumerate() {
                let point = match &element.rotation {
                    Some(rotation) => rotation.apply(*corner),
                    None => *corner,
                };
                let position = [point[0] / 16.0 - 0.5, point[1] / 16.0 - 0.5, point[2] / 16.0 - 0.5];
                indices[i] = self.add_vertex(Vertex::new(position, normal, uvs[i]));
            }
            self.add_quad(indices[0], indices[1], indices[2], indices[3]);
        }
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        index
    }

    /// Add a triangle by vertex indices.
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// Add a quad (two triangles). Vertices run counter-clockwise as seen
    /// from the front.
    pub fn add_quad(&mut self, i0: u32, i1: u32, i2: u32, i3: u32) {
        self.add_triangle(i0, i1, i2);
        self.add_triangle(i0, i2, i3);
    }

    /// Get the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the mesh is empty.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|index| index + offset));
    }

    /// Positions as a flat array.
    pub fn positions_flat(&self) -> Vec<f32> {
        self.vertices.iter().flat_map(|v| v.position).collect()
    }

    /// Normals as a flat array.
    pub fn normals_flat(&self) -> Vec<f32> {
        self.vertices.iter().flat_map(|v| v.normal).collect()
    }

    /// UVs as a flat array.
    pub fn uvs_flat(&self) -> Vec<f32> {
        self.vertices.iter().flat_map(|v| v.uv).collect()
    }
}
