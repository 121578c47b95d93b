//! Binary FBX decoder.
//!
//! Parses the node-record tree of a binary FBX file (32-bit record headers
//! before version 7500, 64-bit after) and rebuilds the model hierarchy from
//! the `Objects` and `Connections` sections. Only what a snapshot needs is
//! read: mesh geometry with normal/UV/material layers, model transforms,
//! basic material colours and embedded texture images.

use super::{root_name, FormatDecoder};
use crate::asset::ModelAsset;
use crate::error::{Result, SnapshotError};
use crate::loader::ObjectUrlRegistry;
use crate::scene::{
    load_texture_from_bytes, ColorSpace, Geometry, Material, Mesh, SceneNode, Texture, Vertex,
};
use crate::types::{srgb_to_linear, Rgb, Transform};
use glam::{EulerRot, Quat, Vec3};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::sync::Arc;

const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";
const HEADER_LEN: usize = 27;
const MAX_NODE_DEPTH: usize = 64;

/// Colour FBX importers fall back to for meshes without a material.
const DEFAULT_COLOR: u32 = 0xcccccc;

/// Decoder for binary FBX payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct FbxDecoder;

impl FormatDecoder for FbxDecoder {
    fn decode(&self, asset: &ModelAsset, _urls: &ObjectUrlRegistry) -> Result<SceneNode> {
        let document = parse_document(&asset.bytes)?;
        tracing::debug!(
            "Parsed FBX {} (version {}, {} top-level records)",
            asset.name,
            document.version,
            document.nodes.len()
        );
        build_scene(&document, root_name(&asset.name))
    }
}

// ---------------------------------------------------------------------------
// Record tree
// ---------------------------------------------------------------------------

/// A property value attached to an FBX record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FbxProperty {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl FbxProperty {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I16(v) => Some(*v as i64),
            Self::I32(v) => Some(*v as i64),
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(v) => Some(*v as f64),
            Self::F64(v) => Some(*v),
            Self::I16(v) => Some(*v as f64),
            Self::I32(v) => Some(*v as f64),
            Self::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::F64Array(v) => Some(v.clone()),
            Self::F32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    fn to_i32_vec(&self) -> Option<Vec<i32>> {
        match self {
            Self::I32Array(v) => Some(v.clone()),
            Self::I64Array(v) => Some(v.iter().map(|&x| x as i32).collect()),
            _ => None,
        }
    }
}

/// One FBX node record.
#[derive(Debug, Clone, Default)]
pub(crate) struct FbxNode {
    pub name: String,
    pub properties: Vec<FbxProperty>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn prop(&self, index: usize) -> Option<&FbxProperty> {
        self.properties.get(index)
    }

    /// Object id (first property of every object record).
    fn id(&self) -> Option<i64> {
        self.prop(0).and_then(FbxProperty::as_i64)
    }

    /// Object name with the `\0\x01Class` suffix removed.
    fn object_name(&self) -> String {
        let raw = self.prop(1).and_then(FbxProperty::as_str).unwrap_or_default();
        raw.split("\u{0}\u{1}").next().unwrap_or_default().to_string()
    }

    fn child_f64_array(&self, name: &str) -> Option<Vec<f64>> {
        self.child(name)?.prop(0)?.to_f64_vec()
    }

    fn child_i32_array(&self, name: &str) -> Option<Vec<i32>> {
        self.child(name)?.prop(0)?.to_i32_vec()
    }

    fn child_str(&self, name: &str) -> Option<&str> {
        self.child(name)?.prop(0)?.as_str()
    }

    /// Values of a `Properties70` entry (`P` record) by property name.
    fn property70(&self, name: &str) -> Option<&[FbxProperty]> {
        self.child("Properties70")?
            .children_named("P")
            .find(|p| p.prop(0).and_then(FbxProperty::as_str) == Some(name))
            .map(|p| p.properties.get(4..).unwrap_or_default())
    }

    fn property70_f64(&self, name: &str) -> Option<f64> {
        self.property70(name)?.first()?.as_f64()
    }

    fn property70_vec3(&self, name: &str) -> Option<Vec3> {
        let values = self.property70(name)?;
        let get = |i: usize| values.get(i).and_then(FbxProperty::as_f64).map(|v| v as f32);
        Some(Vec3::new(get(0)?, get(1)?, get(2)?))
    }
}

/// A parsed binary FBX file.
#[derive(Debug, Clone)]
pub(crate) struct FbxDocument {
    pub version: u32,
    pub nodes: Vec<FbxNode>,
}

impl FbxDocument {
    fn section(&self, name: &str) -> Option<&FbxNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| SnapshotError::decode(format!("FBX truncated at byte {}", self.pos)))?;
        let data = self.data;
        let slice = &data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

/// Parse the record tree of a binary FBX file.
pub(crate) fn parse_document(data: &[u8]) -> Result<FbxDocument> {
    if data.len() < HEADER_LEN || &data[..MAGIC.len()] != MAGIC {
        return Err(SnapshotError::decode("not a binary FBX file (ASCII FBX is not supported)"));
    }
    let mut reader = ByteReader { data, pos: MAGIC.len() + 2 };
    let version = reader.u32()?;

    let mut nodes = Vec::new();
    while reader.pos < data.len() {
        match read_node(&mut reader, version, 0)? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }

    Ok(FbxDocument { version, nodes })
}

fn read_node(reader: &mut ByteReader<'_>, version: u32, depth: usize) -> Result<Option<FbxNode>> {
    if depth > MAX_NODE_DEPTH {
        return Err(SnapshotError::decode(format!(
            "FBX records nested deeper than {} levels",
            MAX_NODE_DEPTH
        )));
    }

    let (end_offset, property_count) = if version >= 7500 {
        let end = reader.u64()?;
        let count = reader.u64()?;
        let _list_len = reader.u64()?;
        (end, count)
    } else {
        let end = reader.u32()? as u64;
        let count = reader.u32()? as u64;
        let _list_len = reader.u32()?;
        (end, count)
    };
    let name_len = reader.u8()? as usize;
    let name = String::from_utf8_lossy(reader.bytes(name_len)?).into_owned();

    if end_offset == 0 {
        return Ok(None);
    }
    let end_offset = usize::try_from(end_offset)
        .ok()
        .filter(|&end| end <= reader.data.len() && end >= reader.pos)
        .ok_or_else(|| SnapshotError::decode(format!("FBX record {} has a bad end offset", name)))?;

    let mut properties = Vec::new();
    for _ in 0..property_count {
        properties.push(read_property(reader)?);
    }

    let mut children = Vec::new();
    while reader.pos < end_offset {
        match read_node(reader, version, depth + 1)? {
            Some(child) => children.push(child),
            None => break,
        }
    }
    reader.pos = end_offset;

    Ok(Some(FbxNode {
        name,
        properties,
        children,
    }))
}

fn read_property(reader: &mut ByteReader<'_>) -> Result<FbxProperty> {
    let type_code = reader.u8()?;
    let property = match type_code {
        b'C' => FbxProperty::Bool(reader.u8()? != 0),
        b'Y' => FbxProperty::I16(i16::from_le_bytes(reader.array()?)),
        b'I' => FbxProperty::I32(i32::from_le_bytes(reader.array()?)),
        b'L' => FbxProperty::I64(i64::from_le_bytes(reader.array()?)),
        b'F' => FbxProperty::F32(f32::from_le_bytes(reader.array()?)),
        b'D' => FbxProperty::F64(f64::from_le_bytes(reader.array()?)),
        b'S' => {
            let len = reader.u32()? as usize;
            FbxProperty::String(String::from_utf8_lossy(reader.bytes(len)?).into_owned())
        }
        b'R' => {
            let len = reader.u32()? as usize;
            FbxProperty::Raw(reader.bytes(len)?.to_vec())
        }
        b'b' => FbxProperty::BoolArray(read_array(reader, 1, |b| b[0] != 0)?),
        b'i' => FbxProperty::I32Array(read_array(reader, 4, |b| {
            i32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })?),
        b'f' => FbxProperty::F32Array(read_array(reader, 4, |b| {
            f32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })?),
        b'l' => FbxProperty::I64Array(read_array(reader, 8, |b| {
            i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })?),
        b'd' => FbxProperty::F64Array(read_array(reader, 8, |b| {
            f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })?),
        other => {
            return Err(SnapshotError::decode(format!(
                "unknown FBX property type {:?}",
                other as char
            )))
        }
    };
    Ok(property)
}

fn read_array<T>(
    reader: &mut ByteReader<'_>,
    element_size: usize,
    convert: impl Fn(&[u8]) -> T,
) -> Result<Vec<T>> {
    let count = reader.u32()? as usize;
    let encoding = reader.u32()?;
    let stored_len = reader.u32()? as usize;
    let stored = reader.bytes(stored_len)?;
    let expected = count
        .checked_mul(element_size)
        .ok_or_else(|| SnapshotError::decode("FBX array too large"))?;

    let decoded;
    let raw: &[u8] = match encoding {
        0 => stored,
        1 => {
            let mut out = Vec::with_capacity(expected.min(stored_len.saturating_mul(64)));
            flate2::read::ZlibDecoder::new(stored)
                .take(expected as u64)
                .read_to_end(&mut out)
                .map_err(|e| SnapshotError::decode(format!("FBX array inflate failed: {}", e)))?;
            decoded = out;
            &decoded
        }
        other => {
            return Err(SnapshotError::decode(format!("unknown FBX array encoding {}", other)))
        }
    };

    if raw.len() < expected {
        return Err(SnapshotError::decode("FBX array shorter than its declared length"));
    }
    Ok(raw[..expected].chunks_exact(element_size).map(convert).collect())
}

// ---------------------------------------------------------------------------
// Scene reconstruction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mapping {
    ByPolygonVertex,
    ByControlPoint,
    ByPolygon,
    AllSame,
}

impl Mapping {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "ByPolygonVertex" => Some(Self::ByPolygonVertex),
            "ByVertice" | "ByVertex" | "ByControlPoint" => Some(Self::ByControlPoint),
            "ByPolygon" => Some(Self::ByPolygon),
            "AllSame" => Some(Self::AllSame),
            _ => None,
        }
    }
}

/// A per-element attribute layer (`LayerElementNormal`, `LayerElementUV`, ...).
#[derive(Debug)]
struct LayerElement {
    mapping: Mapping,
    values: Vec<f64>,
    indices: Option<Vec<i32>>,
    stride: usize,
}

impl LayerElement {
    fn parse(node: &FbxNode, data_name: &str, index_name: &str, stride: usize) -> Option<Self> {
        let mapping = Mapping::parse(node.child_str("MappingInformationType")?)?;
        let values = node.child_f64_array(data_name)?;
        let indexed = node.child_str("ReferenceInformationType") == Some("IndexToDirect");
        let indices = if indexed { node.child_i32_array(index_name) } else { None };
        Some(Self {
            mapping,
            values,
            indices,
            stride,
        })
    }

    fn get(&self, polygon_vertex: usize, control_point: usize, polygon: usize) -> Option<&[f64]> {
        let element = match self.mapping {
            Mapping::ByPolygonVertex => polygon_vertex,
            Mapping::ByControlPoint => control_point,
            Mapping::ByPolygon => polygon,
            Mapping::AllSame => 0,
        };
        let element = match &self.indices {
            Some(indices) => usize::try_from(*indices.get(element)?).ok()?,
            None => element,
        };
        let start = element * self.stride;
        self.values.get(start..start + self.stride)
    }
}

/// Triangulated geometry split by material slot.
fn build_geometries(node: &FbxNode) -> Result<BTreeMap<usize, Geometry>> {
    let positions = node.child_f64_array("Vertices").unwrap_or_default();
    let polygon_indices = node.child_i32_array("PolygonVertexIndex").unwrap_or_default();

    let normals = node
        .child("LayerElementNormal")
        .and_then(|l| LayerElement::parse(l, "Normals", "NormalsIndex", 3));
    let uvs = node
        .child("LayerElementUV")
        .and_then(|l| LayerElement::parse(l, "UV", "UVIndex", 2));
    let materials = node.child("LayerElementMaterial").and_then(|l| {
        let mapping = Mapping::parse(l.child_str("MappingInformationType")?)?;
        Some((mapping, l.child_i32_array("Materials")?))
    });

    let control_point = |index: usize| -> Result<[f32; 3]> {
        positions
            .get(index * 3..index * 3 + 3)
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .ok_or_else(|| SnapshotError::decode(format!("FBX polygon references missing vertex {}", index)))
    };

    let mut geometries: BTreeMap<usize, Geometry> = BTreeMap::new();
    let mut polygon: Vec<(usize, usize)> = Vec::new();
    let mut polygon_index = 0usize;

    for (polygon_vertex, &raw) in polygon_indices.iter().enumerate() {
        let (control, closes) = if raw < 0 { ((!raw) as usize, true) } else { (raw as usize, false) };
        polygon.push((polygon_vertex, control));
        if !closes {
            continue;
        }

        let slot = match &materials {
            Some((Mapping::ByPolygon, slots)) => slots.get(polygon_index).copied().unwrap_or(0),
            Some((_, slots)) => slots.first().copied().unwrap_or(0),
            None => 0,
        }
        .max(0) as usize;
        let geometry = geometries.entry(slot).or_default();

        let mut corners = Vec::with_capacity(polygon.len());
        for &(pv, cp) in &polygon {
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(pv, cp, polygon_index))
                .map(|n| [n[0] as f32, n[1] as f32, n[2] as f32])
                .unwrap_or([0.0, 0.0, 0.0]);
            // FBX UVs put v=0 at the bottom of the image.
            let uv = uvs
                .as_ref()
                .and_then(|t| t.get(pv, cp, polygon_index))
                .map(|t| [t[0] as f32, 1.0 - t[1] as f32])
                .unwrap_or([0.0, 0.0]);
            corners.push(geometry.add_vertex(Vertex::new(control_point(cp)?, normal, uv)));
        }
        for k in 1..corners.len().saturating_sub(1) {
            geometry.add_triangle(corners[0], corners[k], corners[k + 1]);
        }

        polygon.clear();
        polygon_index += 1;
    }

    if normals.is_none() {
        for geometry in geometries.values_mut() {
            geometry.compute_vertex_normals();
        }
    }
    geometries.retain(|_, g| !g.is_empty());
    Ok(geometries)
}

fn model_transform(model: &FbxNode) -> Transform {
    let translation = model.property70_vec3("Lcl Translation").unwrap_or(Vec3::ZERO);
    let euler = |v: Vec3| {
        let r = v * std::f32::consts::PI / 180.0;
        // FBX default order eEulerXYZ: X applied first.
        Quat::from_euler(EulerRot::ZYX, r.z, r.y, r.x)
    };
    let pre = model.property70_vec3("PreRotation").map(euler).unwrap_or(Quat::IDENTITY);
    let rotation = model.property70_vec3("Lcl Rotation").map(euler).unwrap_or(Quat::IDENTITY);
    let scale = model.property70_vec3("Lcl Scaling").unwrap_or(Vec3::ONE);
    Transform {
        translation,
        rotation: pre * rotation,
        scale,
    }
}

fn srgb_color(value: Vec3) -> Vec3 {
    Vec3::new(srgb_to_linear(value.x), srgb_to_linear(value.y), srgb_to_linear(value.z))
}

fn build_material(node: &FbxNode) -> Material {
    let mut material = Material {
        name: Some(node.object_name()),
        color: node
            .property70_vec3("DiffuseColor")
            .or_else(|| node.property70_vec3("Diffuse"))
            .map(srgb_color)
            .unwrap_or_else(|| Rgb::from_u32(DEFAULT_COLOR).to_linear()),
        ..Material::default()
    };

    let emissive_factor = node.property70_f64("EmissiveFactor").unwrap_or(1.0) as f32;
    if let Some(emissive) = node.property70_vec3("EmissiveColor").or_else(|| node.property70_vec3("Emissive")) {
        material.emissive = srgb_color(emissive) * emissive_factor;
    }

    let opacity = node
        .property70_f64("Opacity")
        .or_else(|| node.property70_f64("TransparencyFactor").map(|t| 1.0 - t))
        .unwrap_or(1.0) as f32;
    material.opacity = opacity.clamp(0.0, 1.0);
    material.transparent = material.opacity < 1.0;

    // Phong shininess to a perceptual roughness.
    let shininess = node
        .property70_f64("ShininessExponent")
        .or_else(|| node.property70_f64("Shininess"))
        .unwrap_or(20.0) as f32;
    material.roughness = (2.0 / (shininess.max(0.0) + 2.0)).sqrt().clamp(0.04, 1.0);
    material
}

/// The `Objects` and `Connections` sections, indexed.
struct ObjectGraph<'a> {
    models: HashMap<i64, &'a FbxNode>,
    geometries: HashMap<i64, &'a FbxNode>,
    materials: HashMap<i64, &'a FbxNode>,
    textures: HashMap<i64, &'a FbxNode>,
    videos: HashMap<i64, &'a FbxNode>,
    /// (child, parent, property) in file order.
    connections: Vec<(i64, i64, Option<&'a str>)>,
}

impl<'a> ObjectGraph<'a> {
    fn new(document: &'a FbxDocument) -> Self {
        let mut graph = Self {
            models: HashMap::new(),
            geometries: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            videos: HashMap::new(),
            connections: Vec::new(),
        };

        if let Some(objects) = document.section("Objects") {
            for object in &objects.children {
                let Some(id) = object.id() else { continue };
                let table = match object.name.as_str() {
                    "Model" => &mut graph.models,
                    "Geometry" => &mut graph.geometries,
                    "Material" => &mut graph.materials,
                    "Texture" => &mut graph.textures,
                    "Video" => &mut graph.videos,
                    _ => continue,
                };
                table.insert(id, object);
            }
        }

        if let Some(connections) = document.section("Connections") {
            for c in connections.children_named("C") {
                let child = c.prop(1).and_then(FbxProperty::as_i64);
                let parent = c.prop(2).and_then(FbxProperty::as_i64);
                if let (Some(child), Some(parent)) = (child, parent) {
                    graph
                        .connections
                        .push((child, parent, c.prop(3).and_then(FbxProperty::as_str)));
                }
            }
        }

        graph
    }

    fn children_of(&self, parent: i64) -> impl Iterator<Item = (i64, Option<&'a str>)> + '_ {
        self.connections
            .iter()
            .filter(move |(_, p, _)| *p == parent)
            .map(|(c, _, prop)| (*c, *prop))
    }

    fn parent_of(&self, child: i64, table: &HashMap<i64, &'a FbxNode>) -> Option<i64> {
        self.connections
            .iter()
            .find(|(c, p, _)| *c == child && table.contains_key(p))
            .map(|(_, p, _)| *p)
    }
}

struct SceneBuilder<'a> {
    graph: ObjectGraph<'a>,
    textures: HashMap<i64, Option<Texture>>,
    visited: HashSet<i64>,
}

impl<'a> SceneBuilder<'a> {
    fn texture(&mut self, texture_id: i64) -> Option<Texture> {
        if let Some(cached) = self.textures.get(&texture_id) {
            return cached.clone();
        }
        let texture = self.decode_texture(texture_id);
        self.textures.insert(texture_id, texture.clone());
        texture
    }

    fn decode_texture(&self, texture_id: i64) -> Option<Texture> {
        let node = self.graph.textures.get(&texture_id)?;
        let content = self
            .graph
            .children_of(texture_id)
            .filter_map(|(child, _)| self.graph.videos.get(&child))
            .find_map(|video| match video.child("Content")?.prop(0)? {
                FbxProperty::Raw(bytes) if !bytes.is_empty() => Some(bytes),
                _ => None,
            });

        let Some(content) = content else {
            tracing::warn!(
                "FBX texture {:?} has no embedded image; referenced file {:?} is not loaded",
                node.object_name(),
                node.child_str("RelativeFilename")
            );
            return None;
        };

        match load_texture_from_bytes(content) {
            // FBX images carry no colour-space tag.
            Ok(data) => Some(Texture::new(Arc::new(data), ColorSpace::Linear).with_name(node.object_name())),
            Err(e) => {
                tracing::warn!("Failed to decode FBX texture {:?}: {}", node.object_name(), e);
                None
            }
        }
    }

    fn material(&mut self, material_id: i64) -> Material {
        let Some(node) = self.graph.materials.get(&material_id).copied() else {
            return Material::default();
        };
        let mut material = build_material(node);
        let bound: Vec<(i64, Option<&str>)> = self
            .graph
            .children_of(material_id)
            .filter(|(child, _)| self.graph.textures.contains_key(child))
            .collect();
        for (texture_id, property) in bound {
            match property {
                Some("EmissiveColor") | Some("Emissive") => material.emissive_map = self.texture(texture_id),
                Some("DiffuseColor") | Some("Diffuse") | None => {
                    if material.map.is_none() {
                        material.map = self.texture(texture_id);
                    }
                }
                _ => {}
            }
        }
        material
    }

    fn model_node(&mut self, model_id: i64) -> Result<Option<SceneNode>> {
        if !self.visited.insert(model_id) {
            return Ok(None);
        }
        let Some(model) = self.graph.models.get(&model_id).copied() else {
            return Ok(None);
        };
        let mut node = SceneNode::new(model.object_name()).with_transform(model_transform(model));

        let linked: Vec<i64> = self.graph.children_of(model_id).map(|(c, _)| c).collect();
        let linked_of = |table: &HashMap<i64, &'a FbxNode>| -> Vec<i64> {
            linked.iter().copied().filter(|id| table.contains_key(id)).collect()
        };
        let material_ids = linked_of(&self.graph.materials);
        let geometry_nodes: Vec<&'a FbxNode> = linked_of(&self.graph.geometries)
            .iter()
            .filter_map(|id| self.graph.geometries.get(id).copied())
            .collect();
        let child_models = linked_of(&self.graph.models);

        for geometry_node in geometry_nodes {
            let mut parts = build_geometries(geometry_node)?;
            let single = parts.len() == 1;
            while let Some((slot, geometry)) = parts.pop_first() {
                let material = match material_ids.get(slot) {
                    Some(&id) => self.material(id),
                    None => Material::default().with_color(Rgb::from_u32(DEFAULT_COLOR).to_linear()),
                };
                let mesh = Mesh::new(geometry, material);
                if single && node.mesh.is_none() {
                    node.mesh = Some(mesh);
                } else {
                    node.add_child(SceneNode::new(format!("{}_{}", node.name, slot)).with_mesh(mesh));
                }
            }
        }

        for child_id in child_models {
            if let Some(child) = self.model_node(child_id)? {
                node.add_child(child);
            }
        }

        Ok(Some(node))
    }
}

fn build_scene(document: &FbxDocument, name: &str) -> Result<SceneNode> {
    let graph = ObjectGraph::new(document);
    let mut roots: Vec<i64> = graph
        .models
        .keys()
        .copied()
        .filter(|id| graph.parent_of(*id, &graph.models).is_none())
        .collect();
    // Keep file order stable regardless of hash order.
    let order: HashMap<i64, usize> = graph
        .connections
        .iter()
        .enumerate()
        .map(|(i, (c, _, _))| (*c, i))
        .collect();
    roots.sort_by_key(|id| (order.get(id).copied().unwrap_or(usize::MAX), *id));

    let mut builder = SceneBuilder {
        graph,
        textures: HashMap::new(),
        visited: HashSet::new(),
    };

    let mut root = SceneNode::new(name);
    for id in roots {
        if let Some(node) = builder.model_node(id)? {
            root.add_child(node);
        }
    }
    Ok(root)
}
