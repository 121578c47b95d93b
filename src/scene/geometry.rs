//! Mesh geometry types.

use super::ResourceId;
use crate::types::BoundingBox;
use glam::Vec3;

/// A vertex of decoded geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in node-local space.
    pub position: [f32; 3],
    /// Normal vector.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
    /// Vertex color (linear RGBA).
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            color: [1.0, 1.0, 1.0, 1.0], // White by default
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Indexed triangle geometry.
///
/// Every geometry carries a [`ResourceId`] so the render surface can track the
/// prepared copy it keeps for it and release that copy on disposal.
#[derive(Debug)]
pub struct Geometry {
    id: ResourceId,
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Triangle indices (3 per triangle).
    pub indices: Vec<u32>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    pub fn new() -> Self {
        Self {
            id: ResourceId::next(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        index
    }

    /// Add a triangle by vertex indices.
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Get the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the geometry has no drawable triangles.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.len() < 3
    }

    /// Local-space bounds of all vertices.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.vertices.iter().map(|v| Vec3::from(v.position)))
    }

    /// Replace normals with area-weighted averages of adjacent face normals.
    pub fn compute_vertex_normals(&mut self) {
        let mut accumulated = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= self.vertices.len() || b >= self.vertices.len() || c >= self.vertices.len() {
                continue;
            }
            let p0 = Vec3::from(self.vertices[a].position);
            let p1 = Vec3::from(self.vertices[b].position);
            let p2 = Vec3::from(self.vertices[c].position);
            let face = (p1 - p0).cross(p2 - p0);
            accumulated[a] += face;
            accumulated[b] += face;
            accumulated[c] += face;
        }

        for (vertex, normal) in self.vertices.iter_mut().zip(accumulated) {
            vertex.normal = normal.try_normalize().unwrap_or(Vec3::Y).to_array();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Geometry {
        let mut geometry = Geometry::new();
        let v0 = geometry.add_vertex(Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0]));
        let v1 = geometry.add_vertex(Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0]));
        let v2 = geometry.add_vertex(Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0]));
        geometry.add_triangle(v0, v1, v2);
        geometry
    }

    #[test]
    fn test_geometry_creation() {
        let geometry = triangle();
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.triangle_count(), 1);
        assert!(!geometry.is_empty());
        assert!(Geometry::new().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Geometry::new().id(), Geometry::new().id());
    }

    #[test]
    fn test_compute_vertex_normals() {
        let mut geometry = triangle();
        geometry.compute_vertex_normals();
        for vertex in &geometry.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_bounding_box() {
        let bounds = triangle().bounding_box().unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }
}
