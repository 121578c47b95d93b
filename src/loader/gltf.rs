//! glTF 2.0 decoder for both `.gltf` (JSON) and `.glb` (binary) payloads.

use super::{root_name, FormatDecoder, ObjectUrl, ObjectUrlRegistry};
use crate::asset::ModelAsset;
use crate::error::{Result, SnapshotError};
use crate::scene::{
    load_texture_from_bytes, ColorSpace, Geometry, Material, Mesh, SceneNode, Side, Texture, Vertex,
};
use crate::types::Transform;
use base64::Engine;
use glam::{Quat, Vec3};
use gltf::{buffer, image, material::AlphaMode, mesh::Mode, Buffer};
use std::collections::HashMap;
use std::sync::Arc;

/// Decoder for glTF JSON and GLB payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfDecoder;

impl FormatDecoder for GltfDecoder {
    fn decode(&self, asset: &ModelAsset, urls: &ObjectUrlRegistry) -> Result<SceneNode> {
        let gltf = gltf::Gltf::from_slice(&asset.bytes)
            .map_err(|e| SnapshotError::decode(format!("invalid glTF: {}", e)))?;

        // Relative references go through a temporary URL that is revoked when
        // this guard drops, whether decoding succeeds or not.
        let external = has_external_references(&gltf);
        let base_url = match (&asset.resources, external) {
            (Some(resolver), true) => Some(urls.create(resolver.clone())),
            _ => None,
        };

        let sources = Sources {
            blob: gltf.blob.as_deref(),
            base_url: base_url.as_ref(),
        };
        let buffers = gltf
            .buffers()
            .map(|b| sources.buffer(&b))
            .collect::<Result<Vec<_>>>()?;

        let scene = gltf
            .default_scene()
            .or_else(|| gltf.scenes().next())
            .ok_or_else(|| SnapshotError::decode("model is empty"))?;

        let mut builder = Builder {
            sources: &sources,
            buffers: &buffers,
            textures: HashMap::new(),
            materials: HashMap::new(),
        };
        let mut root = SceneNode::new(root_name(&asset.name));
        for node in scene.nodes() {
            root.add_child(builder.node(&node)?);
        }
        Ok(root)
    }
}

fn has_external_references(gltf: &gltf::Gltf) -> bool {
    let is_external = |uri: &str| !uri.starts_with("data:");
    gltf.buffers()
        .any(|b| matches!(b.source(), buffer::Source::Uri(uri) if is_external(uri)))
        || gltf
            .images()
            .any(|i| matches!(i.source(), image::Source::Uri { uri, .. } if is_external(uri)))
}

/// Decode a `data:` URI payload.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, data) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| SnapshotError::decode("malformed data URI"))?;
    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| SnapshotError::decode(format!("bad base64 in data URI: {}", e)))
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

struct Sources<'a> {
    blob: Option<&'a [u8]>,
    base_url: Option<&'a ObjectUrl<'a>>,
}

impl Sources<'_> {
    fn fetch_uri(&self, uri: &str) -> Result<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri);
        }
        let url = self.base_url.ok_or_else(|| {
            SnapshotError::decode(format!("external reference {} cannot be resolved", uri))
        })?;
        url.fetch(uri)
            .map_err(|e| SnapshotError::decode(format!("failed to load {}: {}", uri, e)))
    }

    fn buffer(&self, buffer: &Buffer<'_>) -> Result<Vec<u8>> {
        let data = match buffer.source() {
            buffer::Source::Bin => self
                .blob
                .map(<[u8]>::to_vec)
                .ok_or_else(|| SnapshotError::decode("GLB binary chunk is missing"))?,
            buffer::Source::Uri(uri) => self.fetch_uri(uri)?,
        };
        if data.len() < buffer.length() {
            return Err(SnapshotError::decode(format!(
                "buffer {} is shorter than declared",
                buffer.index()
            )));
        }
        Ok(data)
    }
}

struct Builder<'s> {
    sources: &'s Sources<'s>,
    buffers: &'s [Vec<u8>],
    textures: HashMap<usize, Option<Texture>>,
    materials: HashMap<Option<usize>, Material>,
}

impl Builder<'_> {
    fn node(&mut self, node: &gltf::Node<'_>) -> Result<SceneNode> {
        let (translation, rotation, scale) = node.transform().decomposed();
        let transform = Transform {
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from(scale),
        };
        let mut scene_node = SceneNode::new(format!("node_{}", node.index())).with_transform(transform);

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    tracing::warn!(
                        "Skipping mesh {} primitive {}: {:?} topology is not rendered",
                        mesh.index(),
                        primitive.index(),
                        primitive.mode()
                    );
                    continue;
                }
                let Some(geometry) = self.geometry(&primitive)? else {
                    continue;
                };
                let material = self.material(&primitive.material());
                scene_node.add_child(
                    SceneNode::new(format!("mesh_{}_{}", mesh.index(), primitive.index()))
                        .with_mesh(Mesh::new(geometry, material)),
                );
            }
        }

        for child in node.children() {
            scene_node.add_child(self.node(&child)?);
        }
        Ok(scene_node)
    }

    fn geometry(&self, primitive: &gltf::Primitive<'_>) -> Result<Option<Geometry>> {
        let buffers = self.buffers;
        let reader = primitive.reader(|b: Buffer<'_>| buffers.get(b.index()).map(Vec::as_slice));

        let Some(positions) = reader.read_positions() else {
            tracing::warn!("Skipping primitive {} without positions", primitive.index());
            return Ok(None);
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
        let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
        let colors: Option<Vec<[f32; 4]>> = reader.read_colors(0).map(|c| c.into_rgba_f32().collect());

        let mut geometry = Geometry::new();
        for (i, position) in positions.iter().enumerate() {
            let normal = normals.as_ref().and_then(|n| n.get(i)).copied().unwrap_or([0.0; 3]);
            let uv = uvs.as_ref().and_then(|t| t.get(i)).copied().unwrap_or([0.0; 2]);
            let mut vertex = Vertex::new(*position, normal, uv);
            if let Some(color) = colors.as_ref().and_then(|c| c.get(i)) {
                vertex = vertex.with_color(*color);
            }
            geometry.add_vertex(vertex);
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        if indices.iter().any(|&i| i as usize >= positions.len()) {
            return Err(SnapshotError::decode(format!(
                "primitive {} indexes past its vertices",
                primitive.index()
            )));
        }
        for tri in indices.chunks_exact(3) {
            geometry.add_triangle(tri[0], tri[1], tri[2]);
        }

        if normals.is_none() {
            geometry.compute_vertex_normals();
        }
        Ok(Some(geometry))
    }

    fn material(&mut self, material: &gltf::Material<'_>) -> Material {
        if let Some(cached) = self.materials.get(&material.index()) {
            return cached.clone();
        }

        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();
        let mut result = Material {
            name: material.index().map(|i| format!("material_{}", i)),
            color: Vec3::new(r, g, b),
            emissive: Vec3::from(material.emissive_factor()),
            metalness: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            opacity: a,
            transparent: material.alpha_mode() == AlphaMode::Blend,
            side: if material.double_sided() { Side::Double } else { Side::Front },
            ..Material::default()
        };
        result.map = pbr
            .base_color_texture()
            .and_then(|info| self.texture(&info.texture().source()));
        result.emissive_map = material
            .emissive_texture()
            .and_then(|info| self.texture(&info.texture().source()));

        self.materials.insert(material.index(), result.clone());
        result
    }

    /// Colour textures in glTF are sRGB-encoded.
    fn texture(&mut self, image: &gltf::Image<'_>) -> Option<Texture> {
        if let Some(cached) = self.textures.get(&image.index()) {
            return cached.clone();
        }

        let bytes = match image.source() {
            image::Source::View { view, .. } => {
                let start = view.offset();
                self.buffers
                    .get(view.buffer().index())
                    .zip(start.checked_add(view.length()))
                    .and_then(|(data, end)| data.get(start..end))
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| SnapshotError::decode("image view out of range"))
            }
            image::Source::Uri { uri, .. } => self.sources.fetch_uri(uri),
        };

        let texture = match bytes.and_then(|b| load_texture_from_bytes(&b).map_err(SnapshotError::from)) {
            Ok(data) => Some(
                Texture::new(Arc::new(data), ColorSpace::Srgb).with_name(format!("image_{}", image.index())),
            ),
            Err(e) => {
                tracing::warn!("Failed to load glTF image {}: {}", image.index(), e);
                None
            }
        };
        self.textures.insert(image.index(), texture.clone());
        texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryResolver;
    use crate::testing;

    fn decode(name: &str, bytes: Vec<u8>, registry: &ObjectUrlRegistry) -> Result<SceneNode> {
        let asset = ModelAsset::from_bytes(name, bytes)?;
        GltfDecoder.decode(&asset, registry)
    }

    #[test]
    fn test_decode_cube_glb() {
        let registry = ObjectUrlRegistry::new();
        let root = decode("cube.glb", testing::cube_glb(Vec3::new(1.0, 2.0, 3.0), false), &registry).unwrap();

        assert_eq!(root.name, "cube");
        assert_eq!(root.mesh_count(), 1);
        assert_eq!(root.triangle_count(), 12);
        let bounds = root.bounding_box().unwrap();
        assert!((bounds.center() - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_embedded_texture_is_srgb() {
        let registry = ObjectUrlRegistry::new();
        let root = decode("cube.glb", testing::cube_glb(Vec3::ZERO, true), &registry).unwrap();
        let (mesh, _) = root.world_meshes()[0];
        let map = mesh.material.map.as_ref().expect("base colour map");
        assert_eq!(map.color_space(), ColorSpace::Srgb);
    }

    #[test]
    fn test_bad_image_view_drops_texture() {
        let registry = ObjectUrlRegistry::new();
        for (offset, length) in [(16, usize::MAX - 8), (1000, 4096)] {
            let root = decode("cube.glb", testing::cube_glb_with_image_view(offset, length), &registry).unwrap();
            let (mesh, _) = root.world_meshes()[0];
            assert!(mesh.material.map.is_none());
            assert_eq!(root.triangle_count(), 12);
        }
    }

    #[test]
    fn test_data_uri_buffers() {
        let registry = ObjectUrlRegistry::new();
        let root = decode("cube.gltf", testing::cube_gltf_data_uri(), &registry).unwrap();
        assert_eq!(root.triangle_count(), 12);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_external_resources_use_revoked_url() {
        let (json, bin, png) = testing::cube_gltf_external();
        let registry = ObjectUrlRegistry::new();
        let resolver = Arc::new(
            MemoryResolver::new()
                .with_file("cube.bin", bin)
                .with_file("albedo.png", png),
        );
        let asset = ModelAsset::from_bytes("cube.gltf", json).unwrap();
        let asset = ModelAsset {
            resources: Some(resolver),
            ..asset
        };

        let root = GltfDecoder.decode(&asset, &registry).unwrap();
        assert_eq!(root.triangle_count(), 12);
        let (mesh, _) = root.world_meshes()[0];
        assert!(mesh.material.map.is_some());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_missing_external_buffer_fails_and_revokes() {
        let (json, _, _) = testing::cube_gltf_external();
        let registry = ObjectUrlRegistry::new();
        let asset = ModelAsset {
            resources: Some(Arc::new(MemoryResolver::new())),
            ..ModelAsset::from_bytes("cube.gltf", json).unwrap()
        };

        let err = GltfDecoder.decode(&asset, &registry).unwrap_err();
        assert!(err.is_decode());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_external_reference_without_resolver() {
        let (json, _, _) = testing::cube_gltf_external();
        let err = decode("cube.gltf", json, &ObjectUrlRegistry::new()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_no_scene_is_empty() {
        let err = decode("none.glb", testing::no_scene_glb(), &ObjectUrlRegistry::new()).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode(msg) if msg == "model is empty"));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode("broken.glb", b"glTF not really".to_vec(), &ObjectUrlRegistry::new()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_data_uri_decoding() {
        assert_eq!(decode_data_uri("data:application/octet-stream;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_data_uri("data:,abc").unwrap(), b"abc".to_vec());
        assert!(decode_data_uri("data:nocomma").is_err());
    }
}
