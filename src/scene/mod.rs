//! In-memory scene graph produced by the format loaders.
//!
//! A [`SceneNode`] tree owns its meshes, materials and textures. Nodes are
//! format-agnostic: both the FBX and glTF decoders produce the same shape.

mod geometry;
mod material;

pub use geometry::{Geometry, Vertex};
pub use material::{load_texture_from_bytes, ColorSpace, Material, Side, Texture, TextureData};

use crate::types::{BoundingBox, Transform};
use glam::Mat4;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a geometry or texture, used to key renderer-side copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Drawable geometry paired with its material.
#[derive(Debug)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

/// A node in the decoded model hierarchy.
#[derive(Debug, Default)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Visit every mesh together with its world matrix.
    pub fn visit_meshes<'a>(&'a self, f: &mut impl FnMut(&'a Mesh, Mat4)) {
        self.visit_meshes_with_parent(Mat4::IDENTITY, f);
    }

    fn visit_meshes_with_parent<'a>(&'a self, parent: Mat4, f: &mut impl FnMut(&'a Mesh, Mat4)) {
        let world = parent * self.transform.matrix();
        if let Some(mesh) = &self.mesh {
            f(mesh, world);
        }
        for child in &self.children {
            child.visit_meshes_with_parent(world, f);
        }
    }

    /// Visit every mesh mutably, depth first.
    pub fn visit_meshes_mut(&mut self, f: &mut impl FnMut(&mut Mesh)) {
        if let Some(mesh) = &mut self.mesh {
            f(mesh);
        }
        for child in &mut self.children {
            child.visit_meshes_mut(f);
        }
    }

    /// All meshes with their world matrices, in traversal order.
    pub fn world_meshes(&self) -> Vec<(&Mesh, Mat4)> {
        let mut meshes = Vec::new();
        self.visit_meshes(&mut |mesh, world| meshes.push((mesh, world)));
        meshes
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(&mut |_, _| count += 1);
        count
    }

    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(&mut |mesh, _| count += mesh.geometry.triangle_count());
        count
    }

    /// World-space bounds of every vertex in the hierarchy.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut bounds: Option<BoundingBox> = None;
        self.visit_meshes(&mut |mesh, world| {
            let points = mesh
                .geometry
                .vertices
                .iter()
                .map(|v| world.transform_point3(glam::Vec3::from(v.position)));
            if let Some(mesh_bounds) = BoundingBox::from_points(points) {
                bounds = Some(match bounds {
                    Some(b) => b.union(&mesh_bounds),
                    None => mesh_bounds,
                });
            }
        });
        bounds
    }

    /// Ids of every geometry and texture owned by this tree.
    pub fn resource_ids(&self) -> (Vec<ResourceId>, Vec<ResourceId>) {
        let mut geometries = Vec::new();
        let mut textures = Vec::new();
        self.visit_meshes(&mut |mesh, _| {
            geometries.push(mesh.geometry.id());
            textures.extend(mesh.material.textures().map(Texture::id));
        });
        textures.sort();
        textures.dedup();
        (geometries, textures)
    }
}
