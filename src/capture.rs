//! View Capture Engine.
//!
//! Renders the active model from seven fixed viewpoints at a forced,
//! device-independent output size. The surface's sizing is saved before the
//! sequence and restored after it on every path.

use crate::config::CaptureSettings;
use crate::error::{Result, SnapshotError};
use crate::frame::FrameSynchronizer;
use crate::render::RenderSurface;
use base64::Engine;
use glam::Vec3;
use image::ImageEncoder;

/// One of the seven fixed camera placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalView {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
    Perspective,
}

impl CanonicalView {
    /// Capture order.
    pub const ALL: [CanonicalView; 7] = [
        Self::Front,
        Self::Back,
        Self::Left,
        Self::Right,
        Self::Top,
        Self::Bottom,
        Self::Perspective,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Perspective => "perspective",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Front => "Front view",
            Self::Back => "Back view",
            Self::Left => "Left view",
            Self::Right => "Right view",
            Self::Top => "Top view",
            Self::Bottom => "Bottom view",
            Self::Perspective => "Perspective view",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.name() == name)
    }

    /// Camera position at `distance` from the origin.
    pub fn position(&self, distance: f32) -> Vec3 {
        let d = distance;
        match self {
            Self::Front => Vec3::new(0.0, 0.0, d),
            Self::Back => Vec3::new(0.0, 0.0, -d),
            Self::Left => Vec3::new(-d, 0.0, 0.0),
            Self::Right => Vec3::new(d, 0.0, 0.0),
            Self::Top => Vec3::new(0.0, d, 0.0),
            Self::Bottom => Vec3::new(0.0, -d, 0.0),
            Self::Perspective => Vec3::splat(d),
        }
    }

    /// Camera up vector. Looking straight down or up the world Y axis needs
    /// an up that is not parallel to the view direction.
    pub fn up(&self) -> Vec3 {
        match self {
            Self::Top => Vec3::NEG_Z,
            Self::Bottom => Vec3::Z,
            _ => Vec3::Y,
        }
    }
}

/// A rendered viewpoint: PNG bytes plus a data-URL preview.
#[derive(Debug, Clone)]
pub struct CapturedView {
    pub view: CanonicalView,
    pub png: Vec<u8>,
    /// `data:image/png;base64,...`
    pub preview: String,
}

impl CapturedView {
    pub fn new(view: CanonicalView, png: Vec<u8>) -> Self {
        let preview = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );
        Self { view, png, preview }
    }

    pub fn name(&self) -> &'static str {
        self.view.name()
    }

    pub fn label(&self) -> &'static str {
        self.view.label()
    }

    pub fn file_name(&self) -> String {
        format!("{}.png", self.view.name())
    }
}

/// Encode an RGBA frame as PNG.
pub fn encode_png(image: &image::RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let cursor = std::io::Cursor::new(&mut bytes);
    let encoder = image::codecs::png::PngEncoder::new(cursor);

    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| SnapshotError::Capture(format!("Failed to encode PNG: {}", e)))?;

    Ok(bytes)
}

/// Capture all seven canonical views of the surface's model.
///
/// Returns no views when no model is loaded. The surface's output size, pixel
/// ratio, aspect and display size are identical before and after, whether or
/// not a view fails. The caller is expected to run its resize handling
/// afterwards.
pub async fn capture_canonical_views(
    surface: &mut RenderSurface,
    sync: &mut FrameSynchronizer,
    distance: f32,
    settings: &CaptureSettings,
) -> Result<Vec<CapturedView>> {
    if !surface.has_model() {
        tracing::debug!("No model loaded, skipping capture");
        return Ok(Vec::new());
    }

    let saved = surface.state();
    surface.force_output(settings.width, settings.height);
    let result = capture_views(surface, sync, distance, settings).await;
    surface.restore(&saved);
    result
}

async fn capture_views(
    surface: &mut RenderSurface,
    sync: &mut FrameSynchronizer,
    distance: f32,
    settings: &CaptureSettings,
) -> Result<Vec<CapturedView>> {
    if settings.settle_frames > 0 {
        sync.wait_for_frames(surface, settings.settle_frames).await;
    }

    let mut views = Vec::with_capacity(CanonicalView::ALL.len());
    for view in CanonicalView::ALL {
        surface.place_camera(view.position(distance), view.up());
        sync.wait_for_frames(surface, settings.frames_per_view).await;

        let frame = surface.read_pixels()?;
        let png = encode_png(&frame)?;
        tracing::debug!("Captured {} view ({} bytes)", view.name(), png.len());
        views.push(CapturedView::new(view, png));
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ModelAsset;
    use crate::loader::{load_model, ObjectUrlRegistry};
    use crate::normalize::{normalize, NormalizeOptions};
    use crate::render::SurfaceOptions;
    use crate::testing;

    fn settings() -> CaptureSettings {
        CaptureSettings {
            width: 48,
            height: 27,
            ..CaptureSettings::default()
        }
    }

    fn surface_with_cube(width: u32, height: u32, ratio: f32) -> (RenderSurface, f32) {
        let options = SurfaceOptions {
            shadow_map_size: 64,
            ..SurfaceOptions::default()
        };
        let mut surface = RenderSurface::new(width, height, ratio, options);
        let asset = ModelAsset::from_bytes("cube.glb", testing::cube_glb(Vec3::new(3.0, 1.0, 0.0), false)).unwrap();
        let mut root = load_model(&asset, &ObjectUrlRegistry::new()).unwrap();
        let framing = normalize(&mut root, NormalizeOptions::default()).unwrap();
        surface.set_model(root);
        surface.fit_clip_planes(framing.view_distance);
        (surface, framing.view_distance)
    }

    #[test]
    fn test_seven_views_in_order() {
        let (mut surface, distance) = surface_with_cube(60, 40, 1.0);
        let mut sync = FrameSynchronizer::default();
        let views = pollster::block_on(capture_canonical_views(&mut surface, &mut sync, distance, &settings())).unwrap();

        let names: Vec<_> = views.iter().map(|v| v.name()).collect();
        assert_eq!(names, ["front", "back", "left", "right", "top", "bottom", "perspective"]);
        assert_eq!(views[0].file_name(), "front.png");
        assert_eq!(views[6].label(), "Perspective view");
        // Three settle frames, then two per view.
        assert_eq!(sync.frames_presented(), 3 + 7 * 2);

        for view in &views {
            let decoded = image::load_from_memory(&view.png).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (48, 27));
            assert!(view.preview.starts_with("data:image/png;base64,"));
        }
    }

    #[test]
    fn test_surface_state_round_trip() {
        for (width, height, ratio) in [(600, 400, 1.0), (333, 517, 2.0), (1, 1, 1.5)] {
            let (mut surface, distance) = surface_with_cube(width, height, ratio);
            surface.set_display_size((width + 7, height));
            let before = surface.state();

            let mut sync = FrameSynchronizer::default();
            pollster::block_on(capture_canonical_views(&mut surface, &mut sync, distance, &settings())).unwrap();
            assert_eq!(surface.state(), before);
        }
    }

    #[test]
    fn test_no_model_is_noop() {
        let mut surface = RenderSurface::new(32, 32, 1.0, SurfaceOptions::default());
        let before = surface.state();
        let mut sync = FrameSynchronizer::default();
        let views = pollster::block_on(capture_canonical_views(&mut surface, &mut sync, 4.0, &settings())).unwrap();
        assert!(views.is_empty());
        assert_eq!(sync.frames_presented(), 0);
        assert_eq!(surface.state(), before);
    }

    #[test]
    fn test_top_and_bottom_override_up() {
        let distance = 4.0;
        for view in [CanonicalView::Top, CanonicalView::Bottom] {
            let mut surface = RenderSurface::new(8, 8, 1.0, SurfaceOptions::default());
            surface.place_camera(view.position(distance), view.up());
            let view_matrix = surface.camera().view_matrix();
            assert!(view_matrix.is_finite());

            // A default-up look-at straight along the Y axis has no basis.
            let naive = glam::Mat4::look_at_rh(view.position(distance), Vec3::ZERO, Vec3::Y);
            assert!(!naive.is_finite());
            assert_ne!(view_matrix, naive);

            // Screen up follows the override.
            let [_, y, _] = surface.camera().axes();
            assert!(y.distance(view.up()) < 1e-5);
        }
        assert_eq!(CanonicalView::Front.up(), Vec3::Y);
    }

    #[test]
    fn test_top_view_frames_model() {
        let (mut surface, distance) = surface_with_cube(16, 16, 1.0);
        surface.set_background(crate::types::Rgb::from_u32(0x000000));
        let mut sync = FrameSynchronizer::default();
        let views = pollster::block_on(capture_canonical_views(&mut surface, &mut sync, distance, &settings())).unwrap();

        let top = image::load_from_memory(&views[4].png).unwrap().to_rgba8();
        let centre = top.get_pixel(24, 13).0;
        assert_ne!(centre, [0, 0, 0, 255]);
        assert_eq!(top.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_view_lookup() {
        assert_eq!(CanonicalView::from_name("bottom"), Some(CanonicalView::Bottom));
        assert_eq!(CanonicalView::from_name("diagonal"), None);
        assert_eq!(CanonicalView::Perspective.position(2.0), Vec3::splat(2.0));
        assert_eq!(CanonicalView::Left.position(3.0), Vec3::new(-3.0, 0.0, 0.0));
    }
}
