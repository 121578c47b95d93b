//! Fixtures shared by the unit tests: small glTF/GLB and FBX models built in
//! memory, and helpers for wiring them into sessions.

pub mod fbx;

use crate::asset::SourceFile;
use crate::config::SnapshotConfig;
use crate::host::{HeadlessDrawable, RecordingNotifier};
use crate::package::MemorySink;
use crate::session::SnapshotSession;
use base64::Engine;
use glam::Vec3;
use gltf_json as json;
use image::ImageEncoder;
use json::validation::Checked::Valid;
use json::validation::USize64;
use std::collections::BTreeMap;

/// Encode a solid-colour RGBA PNG.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let pixels: Vec<u8> = rgba
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect();
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut bytes))
        .write_image(&pixels, width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    bytes
}

const VERTEX_COUNT: usize = 24;
const INDEX_COUNT: usize = 36;
const POSITIONS_OFFSET: usize = 0;
const NORMALS_OFFSET: usize = VERTEX_COUNT * 12;
const UVS_OFFSET: usize = NORMALS_OFFSET + VERTEX_COUNT * 12;
const INDICES_OFFSET: usize = UVS_OFFSET + VERTEX_COUNT * 8;
const GEOMETRY_LEN: usize = INDICES_OFFSET + INDEX_COUNT * 4;

/// Interleaved-by-block geometry of a 2-unit cube centred on the origin.
fn cube_geometry_bytes() -> Vec<u8> {
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut indices = Vec::new();
    for (face, (n, u, v)) in faces.iter().enumerate() {
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (su, sv) in corners {
            let p = *n + *u * su + *v * sv;
            positions.extend_from_slice(&p.to_array());
            normals.extend_from_slice(&n.to_array());
            uvs.extend_from_slice(&[(su + 1.0) / 2.0, (1.0 - sv) / 2.0]);
        }
        let base = (face * 4) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let mut bytes = Vec::with_capacity(GEOMETRY_LEN);
    for value in positions.iter().chain(&normals).chain(&uvs) {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for index in &indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    bytes
}

enum ImageRef {
    View { offset: usize, length: usize },
    Uri(String),
}

fn buffer_view(offset: usize, length: usize, target: Option<json::buffer::Target>) -> json::buffer::View {
    json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64(length as u64),
        byte_offset: Some(USize64(offset as u64)),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        target: target.map(Valid),
    }
}

fn accessor(
    view: u32,
    count: usize,
    type_: json::accessor::Type,
    component_type: json::accessor::ComponentType,
    bounds: Option<([f32; 3], [f32; 3])>,
) -> json::Accessor {
    json::Accessor {
        buffer_view: Some(json::Index::new(view)),
        byte_offset: Some(USize64(0)),
        count: USize64(count as u64),
        component_type: Valid(json::accessor::GenericComponentType(component_type)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(type_),
        min: bounds.map(|(min, _)| json::Value::from(min.to_vec())),
        max: bounds.map(|(_, max)| json::Value::from(max.to_vec())),
        normalized: false,
        sparse: None,
    }
}

fn cube_root(offset: Vec3, buffer_uri: Option<String>, buffer_len: usize, image: Option<ImageRef>) -> json::Root {
    use json::accessor::{ComponentType, Type};
    use json::buffer::Target;

    let mut buffer_views = vec![
        buffer_view(POSITIONS_OFFSET, VERTEX_COUNT * 12, Some(Target::ArrayBuffer)),
        buffer_view(NORMALS_OFFSET, VERTEX_COUNT * 12, Some(Target::ArrayBuffer)),
        buffer_view(UVS_OFFSET, VERTEX_COUNT * 8, Some(Target::ArrayBuffer)),
        buffer_view(INDICES_OFFSET, INDEX_COUNT * 4, Some(Target::ElementArrayBuffer)),
    ];
    let accessors = vec![
        accessor(0, VERTEX_COUNT, Type::Vec3, ComponentType::F32, Some(([-1.0; 3], [1.0; 3]))),
        accessor(1, VERTEX_COUNT, Type::Vec3, ComponentType::F32, None),
        accessor(2, VERTEX_COUNT, Type::Vec2, ComponentType::F32, None),
        accessor(3, INDEX_COUNT, Type::Scalar, ComponentType::U32, None),
    ];

    let mut images = Vec::new();
    let mut textures = Vec::new();
    if let Some(image) = image {
        let (buffer_view, uri, mime_type) = match image {
            ImageRef::View { offset, length } => {
                buffer_views.push(buffer_view(offset, length, None));
                (
                    Some(json::Index::new(buffer_views.len() as u32 - 1)),
                    None,
                    Some(json::image::MimeType("image/png".to_string())),
                )
            }
            ImageRef::Uri(uri) => (None, Some(uri), None),
        };
        images.push(json::Image {
            buffer_view,
            mime_type,
            uri,
            extensions: Default::default(),
            extras: Default::default(),
        });
        textures.push(json::Texture {
            sampler: None,
            source: json::Index::new(0),
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    let material = json::Material {
        pbr_metallic_roughness: json::material::PbrMetallicRoughness {
            base_color_texture: (!textures.is_empty()).then(|| json::texture::Info {
                index: json::Index::new(0),
                tex_coord: 0,
                extensions: Default::default(),
                extras: Default::default(),
            }),
            base_color_factor: json::material::PbrBaseColorFactor([0.8, 0.3, 0.2, 1.0]),
            metallic_factor: json::material::StrengthFactor(0.0),
            roughness_factor: json::material::StrengthFactor(0.6),
            metallic_roughness_texture: None,
            extensions: Default::default(),
            extras: Default::default(),
        },
        alpha_mode: Valid(json::material::AlphaMode::Opaque),
        alpha_cutoff: None,
        double_sided: false,
        normal_texture: None,
        occlusion_texture: None,
        emissive_texture: None,
        emissive_factor: json::material::EmissiveFactor([0.0, 0.0, 0.0]),
        extensions: Default::default(),
        extras: Default::default(),
    };

    let mut attributes = BTreeMap::new();
    attributes.insert(Valid(json::mesh::Semantic::Positions), json::Index::new(0));
    attributes.insert(Valid(json::mesh::Semantic::Normals), json::Index::new(1));
    attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), json::Index::new(2));
    let primitive = json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices: Some(json::Index::new(3)),
        material: Some(json::Index::new(0)),
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
    };

    json::Root {
        accessors,
        buffers: vec![json::Buffer {
            byte_length: USize64(buffer_len as u64),
            extensions: Default::default(),
            extras: Default::default(),
            uri: buffer_uri,
        }],
        buffer_views,
        images,
        textures,
        materials: vec![material],
        meshes: vec![json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            primitives: vec![primitive],
            weights: None,
        }],
        nodes: vec![json::Node {
            camera: None,
            children: None,
            extensions: Default::default(),
            extras: Default::default(),
            matrix: None,
            mesh: Some(json::Index::new(0)),
            rotation: None,
            scale: None,
            translation: (offset != Vec3::ZERO).then(|| offset.to_array()),
            skin: None,
            weights: None,
        }],
        scenes: vec![json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            nodes: vec![json::Index::new(0)],
        }],
        scene: Some(json::Index::new(0)),
        ..Default::default()
    }
}

/// Pack a glTF root and binary chunk into a GLB container.
fn write_glb(root: &json::Root, bin: &[u8]) -> Vec<u8> {
    let json_string = json::serialize::to_string(root).unwrap();
    let json_bytes = json_string.as_bytes();
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let bin_padding = (4 - (bin.len() % 4)) % 4;

    let mut total = 12 + 8 + json_bytes.len() + json_padding;
    if !bin.is_empty() {
        total += 8 + bin.len() + bin_padding;
    }

    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());

    glb.extend_from_slice(&((json_bytes.len() + json_padding) as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend_from_slice(&vec![0x20u8; json_padding]);

    if !bin.is_empty() {
        glb.extend_from_slice(&((bin.len() + bin_padding) as u32).to_le_bytes());
        glb.extend_from_slice(&0x004E4942u32.to_le_bytes());
        glb.extend_from_slice(bin);
        glb.extend_from_slice(&vec![0u8; bin_padding]);
    }
    glb
}

/// A 2-unit cube GLB whose node is translated by `offset`.
pub fn cube_glb(offset: Vec3, textured: bool) -> Vec<u8> {
    let mut bin = cube_geometry_bytes();
    let image = textured.then(|| {
        let png = png_bytes(4, 4, [40, 160, 220, 255]);
        let offset = bin.len();
        bin.extend_from_slice(&png);
        ImageRef::View {
            offset,
            length: png.len(),
        }
    });
    let root = cube_root(offset, None, bin.len(), image);
    write_glb(&root, &bin)
}

/// A cube GLB whose image buffer view spans `offset..offset + length` of a
/// buffer that holds only the geometry.
pub fn cube_glb_with_image_view(offset: usize, length: usize) -> Vec<u8> {
    let bin = cube_geometry_bytes();
    let root = cube_root(Vec3::ZERO, None, bin.len(), Some(ImageRef::View { offset, length }));
    write_glb(&root, &bin)
}

/// A `.gltf` cube with its buffer embedded as a base64 data URI.
pub fn cube_gltf_data_uri() -> Vec<u8> {
    let bin = cube_geometry_bytes();
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bin)
    );
    let root = cube_root(Vec3::ZERO, Some(uri), bin.len(), None);
    json::serialize::to_vec(&root).unwrap()
}

/// A `.gltf` cube referencing `cube.bin` and `albedo.png`: (json, bin, png).
pub fn cube_gltf_external() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let bin = cube_geometry_bytes();
    let png = png_bytes(2, 2, [255, 255, 255, 255]);
    let root = cube_root(
        Vec3::ZERO,
        Some("cube.bin".to_string()),
        bin.len(),
        Some(ImageRef::Uri("albedo.png".to_string())),
    );
    (json::serialize::to_vec(&root).unwrap(), bin, png)
}

/// A GLB whose default scene holds one node without a mesh.
pub fn empty_scene_glb() -> Vec<u8> {
    let root = json::Root {
        nodes: vec![json::Node {
            camera: None,
            children: None,
            extensions: Default::default(),
            extras: Default::default(),
            matrix: None,
            mesh: None,
            rotation: None,
            scale: None,
            translation: None,
            skin: None,
            weights: None,
        }],
        scenes: vec![json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            nodes: vec![json::Index::new(0)],
        }],
        scene: Some(json::Index::new(0)),
        ..Default::default()
    };
    write_glb(&root, &[])
}

/// A GLB with no scenes at all.
pub fn no_scene_glb() -> Vec<u8> {
    write_glb(&json::Root::default(), &[])
}

/// A readable cube model file.
pub fn cube_file(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, cube_glb(Vec3::new(5.0, -3.0, 2.0), false))
}

/// A file whose payload cannot be read.
pub fn unreadable_file(name: &str) -> SourceFile {
    SourceFile::missing(name)
}

/// Default configuration shrunk so a full capture stays fast.
pub fn small_config() -> SnapshotConfig {
    SnapshotConfig::default()
        .with_capture_size(48, 27)
        .with_shadow_map_size(64)
}

/// A session on a small headless drawable that records notifications and
/// downloads.
pub fn session() -> (SnapshotSession, RecordingNotifier, MemorySink) {
    let notifier = RecordingNotifier::default();
    let sink = MemorySink::default();
    let session = SnapshotSession::new(HeadlessDrawable::new(64, 48), small_config())
        .with_notifier(notifier.clone())
        .with_sink(sink.clone());
    (session, notifier, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_layout() {
        assert_eq!(cube_geometry_bytes().len(), GEOMETRY_LEN);
        let glb = cube_glb(Vec3::ZERO, true);
        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes([glb[8], glb[9], glb[10], glb[11]]) as usize, glb.len());
    }
}
