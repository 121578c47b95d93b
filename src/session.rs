//! The snapshot session: one lazily built render surface plus the state the
//! load, normalize and capture steps share.
//!
//! Steps run strictly in sequence. Every async method takes `&mut self`, so a
//! second load can never interleave with a capture in progress.

use crate::asset::{ModelAsset, ModelFormat, SourceFile};
use crate::capture::{capture_canonical_views, CanonicalView, CapturedView};
use crate::config::{SnapshotConfig, DEFAULT_BACKGROUND};
use crate::error::{Result, SnapshotError};
use crate::frame::{AnimationScheduler, FrameSynchronizer};
use crate::host::{Drawable, DownloadSink, Notifier, Severity, TracingNotifier};
use crate::loader::{self, ObjectUrlRegistry};
use crate::normalize::{normalize, Framing, NormalizeOptions};
use crate::package::{self, Download, MemorySink};
use crate::render::{RenderSurface, SurfaceOptions, SurfaceState};
use glam::Vec3;

const LOADED_MESSAGE: &str = "model loaded, generating views";
const UPLOAD_FAILED_MESSAGE: &str = "model processing failed, please check that the file is valid";
const UNSUPPORTED_MESSAGE: &str = "only FBX / GLTF / GLB model files are supported";
const ZIP_STARTED_MESSAGE: &str = "zip download started";

/// Per-call options for [`SnapshotSession::process_file`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// Suppress the success notification.
    pub silent: bool,
    /// Retag colour maps as sRGB while normalizing.
    pub preserve_materials: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            silent: false,
            preserve_materials: true,
        }
    }
}

/// Owner of the render surface, the active model's framing and the last
/// generated views.
pub struct SnapshotSession {
    config: SnapshotConfig,
    drawable: Box<dyn Drawable>,
    surface: Option<RenderSurface>,
    sync: FrameSynchronizer,
    notifier: Box<dyn Notifier>,
    sink: Box<dyn DownloadSink>,
    urls: ObjectUrlRegistry,
    framing: Option<Framing>,
    views: Vec<CapturedView>,
}

impl SnapshotSession {
    /// A session bound to `drawable`. Nothing is constructed until the first
    /// model is loaded.
    pub fn new(drawable: impl Drawable + 'static, config: SnapshotConfig) -> Self {
        Self {
            config,
            drawable: Box::new(drawable),
            surface: None,
            sync: FrameSynchronizer::default(),
            notifier: Box::new(TracingNotifier),
            sink: Box::new(MemorySink::default()),
            urls: ObjectUrlRegistry::new(),
            framing: None,
            views: Vec::new(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn AnimationScheduler>) -> Self {
        self.sync = FrameSynchronizer::new(scheduler);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_sink(mut self, sink: impl DownloadSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Views from the last capture.
    pub fn views(&self) -> &[CapturedView] {
        &self.views
    }

    pub fn surface(&self) -> Option<&RenderSurface> {
        self.surface.as_ref()
    }

    /// Sizing of the surface, once it exists.
    pub fn surface_state(&self) -> Option<SurfaceState> {
        self.surface.as_ref().map(RenderSurface::state)
    }

    pub fn framing(&self) -> Option<&Framing> {
        self.framing.as_ref()
    }

    pub fn object_urls(&self) -> &ObjectUrlRegistry {
        &self.urls
    }

    pub fn frames_presented(&self) -> u64 {
        self.sync.frames_presented()
    }

    pub fn notify(&self, severity: Severity, message: &str) {
        self.notifier.notify(severity, message);
    }

    /// Hand a finished file to the download sink.
    pub fn deliver(&mut self, download: Download) -> Result<()> {
        self.sink.deliver(download)
    }

    fn surface_mut(&mut self) -> &mut RenderSurface {
        let config = &self.config;
        let drawable = self.drawable.as_ref();
        self.surface.get_or_insert_with(|| {
            let width = nonzero_or(drawable.client_width(), config.fallback_width);
            let height = nonzero_or(drawable.client_height(), config.fallback_height);
            let options = SurfaceOptions {
                background: config.background(),
                shadow_map_size: config.shadow_map_size,
            };
            let mut surface = RenderSurface::new(width, height, drawable.device_pixel_ratio(), options);
            surface.render();
            surface
        })
    }

    /// Read `file`, load and normalize it, then capture the seven views.
    pub async fn process_file(&mut self, file: &SourceFile, options: ProcessOptions) -> Result<Vec<CapturedView>> {
        let asset = ModelAsset::read(file)?;
        self.load_model(&asset, options)?;
        self.generate_views().await
    }

    /// Replace the active model with `asset`, centred and framed from
    /// `(d, d, d)`.
    pub fn load_model(&mut self, asset: &ModelAsset, options: ProcessOptions) -> Result<Framing> {
        self.framing = None;
        if let Some(surface) = self.surface.as_mut() {
            surface.clear_model();
        }

        let mut root = loader::load_model(asset, &self.urls)?;
        let framing = normalize(
            &mut root,
            NormalizeOptions {
                preserve_materials: options.preserve_materials,
            },
        )?;

        let distance = framing.view_distance;
        let surface = self.surface_mut();
        surface.set_model(root);
        surface.fit_clip_planes(distance);
        surface.place_camera(Vec3::splat(distance), Vec3::Y);
        surface.render();
        self.framing = Some(framing);

        if !options.silent {
            self.notify(Severity::Success, LOADED_MESSAGE);
        }
        Ok(framing)
    }

    /// Capture the seven canonical views of the active model. Without a model
    /// this returns no views.
    pub async fn generate_views(&mut self) -> Result<Vec<CapturedView>> {
        self.views.clear();
        let (Some(surface), Some(framing)) = (self.surface.as_mut(), self.framing) else {
            return Ok(Vec::new());
        };

        let result = capture_canonical_views(surface, &mut self.sync, framing.view_distance, &self.config.capture).await;
        self.handle_resize();

        let views = result?;
        self.views = views.clone();
        Ok(views)
    }

    /// Whether `name` has a supported extension. Notifies the user when not.
    pub fn before_upload(&self, name: &str) -> bool {
        if ModelFormat::from_file_name(name).is_ok() {
            true
        } else {
            self.notify(Severity::Error, UNSUPPORTED_MESSAGE);
            false
        }
    }

    /// Interactive single-file flow: validate, reset, process.
    ///
    /// Failures are reported to the user and then returned.
    pub async fn handle_upload(&mut self, file: &SourceFile) -> Result<Vec<CapturedView>> {
        if !self.before_upload(file.name()) {
            return Err(SnapshotError::UnsupportedFormat(file.name().to_string()));
        }
        self.reset_state();

        match self.process_file(file, ProcessOptions::default()).await {
            Ok(views) => Ok(views),
            Err(e) => {
                tracing::warn!("Processing {} failed: {}", file.name(), e);
                self.notify(Severity::Error, UPLOAD_FAILED_MESSAGE);
                Err(e)
            }
        }
    }

    /// Archive the last views and deliver them. Returns the archive name, or
    /// `None` when there is nothing to download.
    pub fn download_current_views(&mut self) -> Result<Option<String>> {
        if self.views.is_empty() {
            return Ok(None);
        }
        let download = package::views_archive(&self.views)?;
        let file_name = download.file_name.clone();
        self.deliver(download)?;
        self.notify(Severity::Success, ZIP_STARTED_MESSAGE);
        tracing::info!("Packaged {} views into {}", self.views.len(), file_name);
        Ok(Some(file_name))
    }

    /// Deliver one view's PNG by view name.
    pub fn download_view(&mut self, name: &str) -> Result<Option<String>> {
        let Some(view) = CanonicalView::from_name(name)
            .and_then(|view| self.views.iter().find(|captured| captured.view == view))
        else {
            return Ok(None);
        };
        let download = package::single_image(view);
        let file_name = download.file_name.clone();
        self.deliver(download)?;
        Ok(Some(file_name))
    }

    /// Forget the last views and release the active model.
    pub fn reset_state(&mut self) {
        self.views.clear();
        self.framing = None;
        if let Some(surface) = self.surface.as_mut() {
            surface.clear_model();
        }
    }

    /// Release the surface and everything it holds. Safe to call repeatedly;
    /// the next load builds a fresh surface.
    pub fn dispose_scene(&mut self) {
        self.framing = None;
        if let Some(surface) = self.surface.take() {
            surface.dispose();
        }
    }

    /// Follow the drawable's current size. A zero height follows the width.
    pub fn handle_resize(&mut self) {
        let width = nonzero_or(self.drawable.client_width(), self.config.fallback_width);
        let height = match self.drawable.client_height() {
            0 => ((width as f32 * 0.66).round() as u32).max(1),
            h => h,
        };
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.set_size(width, height);
        surface.set_aspect(width as f32 / height as f32);
        surface.render();
    }

    /// Apply a hex background colour to the scene and clear colour.
    pub fn set_background_color(&mut self, color: &str) {
        self.config.background_color = color.to_string();
        self.apply_background();
    }

    pub fn reset_background(&mut self) {
        self.set_background_color(DEFAULT_BACKGROUND);
    }

    fn apply_background(&mut self) {
        let background = self.config.background();
        if let Some(surface) = self.surface.as_mut() {
            surface.set_background(background);
            surface.render();
        }
    }
}

fn nonzero_or(value: u32, fallback: u32) -> u32 {
    if value == 0 {
        fallback.max(1)
    } else {
        value
    }
}

impl std::fmt::Debug for SnapshotSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSession")
            .field("config", &self.config)
            .field("surface", &self.surface_state())
            .field("framing", &self.framing)
            .field("views", &self.views.len())
            .finish_non_exhaustive()
    }
}
