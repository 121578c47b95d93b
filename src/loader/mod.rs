//! Format loaders.
//!
//! Each supported [`ModelFormat`] maps to one [`FormatDecoder`]. Decoders turn
//! a [`ModelAsset`] into a [`SceneNode`] tree; relative references (external
//! glTF buffers and images) are fetched through a temporary object URL that
//! is always revoked before decoding returns.

pub mod fbx;
pub mod gltf;
mod resources;

pub use resources::{DirectoryResolver, MemoryResolver, ObjectUrl, ObjectUrlRegistry, ResourceResolver};

use crate::asset::{ModelAsset, ModelFormat};
use crate::error::{Result, SnapshotError};
use crate::scene::SceneNode;

/// Decodes one model format into a scene tree.
pub trait FormatDecoder: Sync {
    fn decode(&self, asset: &ModelAsset, urls: &ObjectUrlRegistry) -> Result<SceneNode>;
}

static FBX: fbx::FbxDecoder = fbx::FbxDecoder;
static GLTF: gltf::GltfDecoder = gltf::GltfDecoder;

/// The decoder responsible for a format.
pub fn decoder_for(format: ModelFormat) -> &'static dyn FormatDecoder {
    match format {
        ModelFormat::Fbx => &FBX,
        ModelFormat::Gltf | ModelFormat::Glb => &GLTF,
    }
}

/// Decode an asset and reject results with nothing to draw.
pub fn load_model(asset: &ModelAsset, urls: &ObjectUrlRegistry) -> Result<SceneNode> {
    let root = decoder_for(asset.format).decode(asset, urls)?;
    if root.mesh_count() == 0 {
        return Err(SnapshotError::decode("model is empty"));
    }
    tracing::info!(
        "Loaded {} ({} meshes, {} triangles)",
        asset.name,
        root.mesh_count(),
        root.triangle_count()
    );
    Ok(root)
}

/// Root node name for a file: the name without its extension.
pub(crate) fn root_name(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}
