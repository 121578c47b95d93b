//! # Model Snapshot
//!
//! A Rust library for rendering standardized snapshot images of 3D models.
//!
//! ## Overview
//!
//! This library takes an FBX, glTF or GLB model as input, centres and frames
//! it, and renders seven fixed views (front, back, left, right, top, bottom
//! and an isometric perspective) at a fixed resolution. Views can be
//! downloaded as single PNGs or as a ZIP archive; a batch of models becomes
//! one archive with a folder per model.
//!
//! ## Quick Start
//!
//! ```ignore
//! use model_snapshot::{HeadlessDrawable, ProcessOptions, SnapshotConfig, SnapshotSession, SourceFile};
//!
//! let mut session = SnapshotSession::new(HeadlessDrawable::new(800, 600), SnapshotConfig::default());
//!
//! // Load, normalize and capture
//! let file = SourceFile::from_path("chair.glb");
//! let views = pollster::block_on(session.process_file(&file, ProcessOptions::default()))?;
//!
//! // Package the seven views
//! session.download_current_views()?;
//! ```
//!
//! ## Batches
//!
//! Queue files with [`BatchQueue`] and run them through one session. Files
//! are processed strictly one after another; a failing file is recorded and
//! skipped:
//!
//! ```ignore
//! use model_snapshot::{BatchQueue, SelectionItem};
//!
//! let mut queue = BatchQueue::new();
//! queue.handle_change(&[SelectionItem::new(SourceFile::from_path("a.fbx"))]);
//! let report = pollster::block_on(queue.generate(&mut session))?;
//! ```

pub mod error;
pub mod types;
pub mod asset;
pub mod scene;
pub mod loader;
pub mod normalize;
pub mod render;
pub mod frame;
pub mod capture;
pub mod package;
pub mod host;
pub mod config;
pub mod session;
pub mod batch;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use error::{Result, SnapshotError};
pub use types::{BoundingBox, Rgb, Transform};
pub use asset::{ModelAsset, ModelFormat, SourceFile};
pub use scene::{Geometry, Material, Mesh, SceneNode, Texture};
pub use loader::{load_model, DirectoryResolver, MemoryResolver, ResourceResolver};
pub use normalize::{normalize, Framing, NormalizeOptions};
pub use render::{RenderSurface, SurfaceState};
pub use frame::{AnimationScheduler, FrameSynchronizer, ImmediateScheduler};
pub use capture::{CanonicalView, CapturedView};
pub use package::{Download, DirectorySink, MemorySink};
pub use host::{Drawable, HeadlessDrawable, Notifier, SelectionItem, SelectionWidget, Severity, TracingNotifier};
pub use config::{CaptureSettings, SnapshotConfig};
pub use session::{ProcessOptions, SnapshotSession};
pub use batch::{BatchItem, BatchQueue, BatchReport, BatchStatus};

/// Decode a model from bytes and centre it on the origin.
pub fn load_model_bytes(name: &str, bytes: &[u8]) -> Result<(SceneNode, Framing)> {
    let asset = ModelAsset::from_bytes(name, bytes.to_vec())?;
    let mut root = load_model(&asset, &loader::ObjectUrlRegistry::new())?;
    let framing = normalize(&mut root, NormalizeOptions::default())?;
    Ok((root, framing))
}

/// Capture the seven views of a model file on disk with a headless session.
pub fn capture_file<P: AsRef<std::path::Path>>(path: P, config: SnapshotConfig) -> Result<Vec<CapturedView>> {
    let options = ProcessOptions {
        silent: true,
        preserve_materials: config.preserve_materials,
    };
    let drawable = HeadlessDrawable::new(config.fallback_width, config.fallback_height);
    let mut session = SnapshotSession::new(drawable, config);
    let file = SourceFile::from_path(path);
    let views = pollster::block_on(session.process_file(&file, options));
    session.dispose_scene();
    views
}
