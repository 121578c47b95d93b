//! Model input: format tags, source files and immutable assets.

use crate::error::{Result, SnapshotError};
use crate::loader::{DirectoryResolver, ResourceResolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A supported model file format, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    /// Autodesk FBX, binary encoding.
    Fbx,
    /// glTF 2.0 JSON, optionally referencing external buffers and images.
    Gltf,
    /// glTF 2.0 binary container.
    Glb,
}

impl ModelFormat {
    /// Extensions accepted by [`ModelFormat::from_file_name`].
    pub const SUPPORTED_EXTENSIONS: [&'static str; 3] = ["fbx", "gltf", "glb"];

    /// Detect the format from the text after the last `.` (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "fbx" => Ok(Self::Fbx),
            "gltf" => Ok(Self::Gltf),
            "glb" => Ok(Self::Glb),
            _ => Err(SnapshotError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Fbx => "fbx",
            Self::Gltf => "gltf",
            Self::Glb => "glb",
        }
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Memory(Arc<[u8]>),
    Path(PathBuf),
    Missing,
}

/// A file handed over by the host: a display name plus a payload that may or
/// may not be readable.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    payload: Payload,
    resources: Option<Arc<dyn ResourceResolver>>,
}

impl SourceFile {
    /// A file whose bytes are already in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Memory(bytes.into()),
            resources: None,
        }
    }

    /// A file on disk, read lazily. Sibling files resolve relative references.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let resources = path
            .parent()
            .map(|dir| Arc::new(DirectoryResolver::new(dir)) as Arc<dyn ResourceResolver>);
        Self {
            name,
            payload: Payload::Path(path.to_path_buf()),
            resources,
        }
    }

    /// A selection entry whose payload is no longer available.
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Payload::Missing,
            resources: None,
        }
    }

    /// Attach a resolver for resources the model references by relative path.
    pub fn with_resources(mut self, resources: Arc<dyn ResourceResolver>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> Option<&Arc<dyn ResourceResolver>> {
        self.resources.as_ref()
    }

    /// Read the full payload.
    pub fn read(&self) -> Result<Arc<[u8]>> {
        match &self.payload {
            Payload::Memory(bytes) => Ok(bytes.clone()),
            Payload::Path(path) => std::fs::read(path)
                .map(Arc::from)
                .map_err(|e| SnapshotError::Read(format!("{}: {}", path.display(), e))),
            Payload::Missing => Err(SnapshotError::Read(format!("{}: no payload", self.name))),
        }
    }
}

/// Raw model bytes with their declared format. Immutable once read.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub name: String,
    pub format: ModelFormat,
    pub bytes: Arc<[u8]>,
    pub resources: Option<Arc<dyn ResourceResolver>>,
}

impl ModelAsset {
    /// Check the format, then read the payload.
    ///
    /// The format check happens first so an unsupported file never touches
    /// its payload.
    pub fn read(file: &SourceFile) -> Result<Self> {
        let format = ModelFormat::from_file_name(file.name())?;
        let bytes = file.read()?;
        Ok(Self {
            name: file.name().to_string(),
            format,
            bytes,
            resources: file.resources().cloned(),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let name = name.into();
        Ok(Self {
            format: ModelFormat::from_file_name(&name)?,
            name,
            bytes: bytes.into(),
            resources: None,
        })
    }
}
