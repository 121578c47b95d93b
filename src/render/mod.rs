//! Render Surface: the persistent renderer, camera, lighting rig and
//! environment that survive across model loads.
//!
//! Rendering is a deterministic CPU rasterizer. The surface owns at most one
//! model at a time together with the prepared copies of its geometry and
//! textures; replacing or clearing the model releases those copies.

pub mod camera;
pub mod environment;
pub mod lights;
pub mod raster;
pub mod resources;
pub mod shadow;
pub mod tonemap;

pub use camera::PerspectiveCamera;
pub use environment::Environment;
pub use lights::LightRig;
pub use resources::ResourceCounts;

use crate::error::{Result, SnapshotError};
use crate::scene::{Mesh, SceneNode, Side};
use crate::types::Rgb;
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use lights::SurfaceSample;
use raster::{draw_triangle, ClipVertex, Cull, Varying};
use resources::ResourceCache;
use shadow::ShadowMap;

/// Camera vertical field of view in degrees.
pub const CAMERA_FOV: f32 = 45.0;

/// Output sizing of a surface, everything a capture overrides and restores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceState {
    /// Logical output size.
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    /// Camera aspect ratio.
    pub aspect: f32,
    /// Size the host displays the output at.
    pub display_size: (u32, u32),
}

/// Options fixed when a surface is constructed.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceOptions {
    pub background: Rgb,
    pub shadow_map_size: u32,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            background: Rgb::from_u32(0xbfbfbf),
            shadow_map_size: 2048,
        }
    }
}

/// A loaded model and the shadow map fitted to it.
#[derive(Debug)]
struct ActiveModel {
    root: SceneNode,
    shadow: Option<ShadowMap>,
}

/// Offscreen renderer with a persistent camera and light rig.
#[derive(Debug)]
pub struct RenderSurface {
    width: u32,
    height: u32,
    pixel_ratio: f32,
    display_size: (u32, u32),
    camera: PerspectiveCamera,
    lights: LightRig,
    environment: Environment,
    background: Rgb,
    shadow_map_size: u32,
    model: Option<ActiveModel>,
    cache: ResourceCache,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
    dirty: bool,
    frames_rendered: u64,
}

impl RenderSurface {
    /// Build a surface for a drawable of the given size and device pixel ratio.
    pub fn new(width: u32, height: u32, pixel_ratio: f32, options: SurfaceOptions) -> Self {
        let mut camera = PerspectiveCamera::new(CAMERA_FOV, aspect_of(width, height));
        camera.position = Vec3::splat(5.0);
        camera.look_at(Vec3::ZERO);

        let environment = Environment::room();
        tracing::debug!(
            "Created render surface {}x{} @{} (shadow map {})",
            width,
            height,
            pixel_ratio,
            options.shadow_map_size
        );

        Self {
            width,
            height,
            pixel_ratio: sanitize_ratio(pixel_ratio),
            display_size: (width, height),
            camera,
            lights: LightRig::studio(),
            environment,
            background: options.background,
            shadow_map_size: options.shadow_map_size,
            model: None,
            cache: ResourceCache::default(),
            color: Vec::new(),
            depth: Vec::new(),
            dirty: true,
            frames_rendered: 0,
        }
    }

    /// Resize the output. The displayed size follows.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.set_output_size(width, height);
        self.display_size = (width, height);
    }

    /// Resize the output without touching the displayed size.
    pub fn set_output_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.dirty = true;
    }

    pub fn set_display_size(&mut self, size: (u32, u32)) {
        self.display_size = size;
    }

    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = sanitize_ratio(ratio);
        self.dirty = true;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.camera.aspect = aspect;
        self.dirty = true;
    }

    /// Logical size scaled by the pixel ratio.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    pub fn state(&self) -> SurfaceState {
        SurfaceState {
            width: self.width,
            height: self.height,
            pixel_ratio: self.pixel_ratio,
            aspect: self.camera.aspect,
            display_size: self.display_size,
        }
    }

    pub fn restore(&mut self, state: &SurfaceState) {
        self.pixel_ratio = state.pixel_ratio;
        self.set_output_size(state.width, state.height);
        self.display_size = state.display_size;
        self.set_aspect(state.aspect);
    }

    /// Force a device-independent output size for capture.
    pub fn force_output(&mut self, width: u32, height: u32) {
        self.set_pixel_ratio(1.0);
        self.set_output_size(width, height);
        self.display_size = (width, height);
        self.set_aspect(aspect_of(width, height));
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn set_background(&mut self, color: Rgb) {
        self.background = color;
        self.dirty = true;
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    /// Place the camera at `position` with `up`, looking at the origin.
    pub fn place_camera(&mut self, position: Vec3, up: Vec3) {
        self.camera.position = position;
        self.camera.up = up;
        self.camera.look_at(Vec3::ZERO);
        self.dirty = true;
    }

    pub fn fit_clip_planes(&mut self, distance: f32) {
        self.camera.fit_clip_planes(distance);
        self.dirty = true;
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&SceneNode> {
        self.model.as_ref().map(|m| &m.root)
    }

    /// Make `root` the active model, releasing any previous one first.
    pub fn set_model(&mut self, root: SceneNode) {
        self.clear_model();
        self.model = Some(ActiveModel { root, shadow: None });
        self.dirty = true;
    }

    /// Remove the active model and release its prepared resources.
    pub fn clear_model(&mut self) -> Option<SceneNode> {
        let model = self.model.take()?;
        let (geometries, textures) = model.root.resource_ids();
        self.cache.release(&geometries, &textures);
        self.dirty = true;
        tracing::debug!(
            "Released model {} ({} geometries, {} textures)",
            model.root.name,
            geometries.len(),
            textures.len()
        );
        Some(model.root)
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        self.cache.counts()
    }

    /// Number of frames rendered since construction.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Release everything the surface holds.
    pub fn dispose(mut self) {
        self.clear_model();
        self.cache.clear();
        tracing::debug!("Disposed render surface after {} frames", self.frames_rendered);
    }

    /// Render one frame into the drawing buffer.
    pub fn render(&mut self) {
        self.frames_rendered += 1;
        let (width, height) = self.drawing_buffer_size();
        let pixels = width as usize * height as usize;
        if !self.dirty && self.color.len() == pixels {
            return;
        }

        let [r, g, b] = self.background.to_rgb8();
        self.color.clear();
        self.color.resize(pixels, [r, g, b, 255]);
        self.depth.clear();
        self.depth.resize(pixels, 1.0);

        if let Some(mut model) = self.model.take() {
            self.draw_model(&mut model, width as usize, height as usize);
            self.model = Some(model);
        }
        self.dirty = false;
    }

    /// Copy out the last rendered frame.
    pub fn read_pixels(&self) -> Result<image::RgbaImage> {
        let (width, height) = self.drawing_buffer_size();
        if self.color.len() != width as usize * height as usize {
            return Err(SnapshotError::Capture("no frame has been rendered at the current size".to_string()));
        }
        let bytes: Vec<u8> = self.color.iter().flatten().copied().collect();
        image::RgbaImage::from_raw(width, height, bytes)
            .ok_or_else(|| SnapshotError::Capture("frame buffer size mismatch".to_string()))
    }

    fn draw_model(&mut self, model: &mut ActiveModel, width: usize, height: usize) {
        let meshes = model.root.world_meshes();

        for (mesh, _) in &meshes {
            self.cache.prepare_geometry(&mesh.geometry);
            for texture in mesh.material.textures() {
                self.cache.prepare_texture(texture);
            }
        }

        if model.shadow.is_none() && self.lights.key.cast_shadow {
            model.shadow = Some(self.build_shadow_map(&meshes));
        }

        let view_projection = self.camera.view_projection();
        let eye = self.camera.position;

        let (opaque, mut transparent): (Vec<_>, Vec<_>) =
            meshes.iter().partition(|(mesh, _)| !mesh.material.transparent);
        let distance = |(mesh, world): &(&Mesh, Mat4)| {
            mesh.geometry
                .bounding_box()
                .map(|b| world.transform_point3(b.center()).distance_squared(eye))
                .unwrap_or(0.0)
        };
        // Far to near.
        transparent.sort_by(|a, b| distance(*b).total_cmp(&distance(*a)));

        for (mesh, world) in opaque.into_iter().chain(transparent) {
            self.draw_mesh(mesh, world, &view_projection, model.shadow.as_ref(), width, height);
        }
    }

    fn build_shadow_map(&self, meshes: &[(&Mesh, Mat4)]) -> ShadowMap {
        let bounds = meshes
            .iter()
            .filter_map(|(mesh, world)| mesh.geometry.bounding_box().map(|b| b.transformed(world)))
            .reduce(|a, b| a.union(&b));
        let (center, radius) = bounds
            .map(|b| (b.center(), b.bounding_radius()))
            .unwrap_or((Vec3::ZERO, 1.0));

        let mut map = ShadowMap::new(self.shadow_map_size, self.lights.key.direction(), center, radius);
        for (mesh, world) in meshes.iter().filter(|(mesh, _)| mesh.cast_shadow) {
            let positions: Vec<Vec3> = mesh
                .geometry
                .vertices
                .iter()
                .map(|v| world.transform_point3(Vec3::from(v.position)))
                .collect();
            for tri in mesh.geometry.indices.chunks_exact(3) {
                if let (Some(a), Some(b), Some(c)) = (
                    positions.get(tri[0] as usize),
                    positions.get(tri[1] as usize),
                    positions.get(tri[2] as usize),
                ) {
                    map.draw([*a, *b, *c]);
                }
            }
        }
        map
    }

    fn draw_mesh(
        &mut self,
        mesh: &Mesh,
        world: &Mat4,
        view_projection: &Mat4,
        shadow: Option<&ShadowMap>,
        width: usize,
        height: usize,
    ) {
        let material = &mesh.material;
        let normal_matrix = Mat3::from_mat4(*world).inverse().transpose();
        let cull = match material.side {
            Side::Front => Cull::Back,
            Side::Back => Cull::Front,
            Side::Double => Cull::None,
        };
        let map = material.map.as_ref().and_then(|t| self.cache.texture(t.id()));
        let emissive_map = material.emissive_map.as_ref().and_then(|t| self.cache.texture(t.id()));
        let eye = self.camera.position;
        let blend = material.transparent;

        let vertices: Vec<ClipVertex> = mesh
            .geometry
            .vertices
            .iter()
            .map(|v| {
                let world_pos = world.transform_point3(Vec3::from(v.position));
                ClipVertex {
                    clip: *view_projection * world_pos.extend(1.0),
                    varying: Varying {
                        world: world_pos,
                        normal: (normal_matrix * Vec3::from(v.normal)).normalize_or_zero(),
                        uv: Vec2::from(v.uv),
                        color: Vec4::from(v.color),
                    },
                }
            })
            .collect();

        let color = &mut self.color;
        let depth = &mut self.depth;
        let lights = &self.lights;
        let environment = &self.environment;

        for tri in mesh.geometry.indices.chunks_exact(3) {
            let (Some(a), Some(b), Some(c)) = (
                vertices.get(tri[0] as usize),
                vertices.get(tri[1] as usize),
                vertices.get(tri[2] as usize),
            ) else {
                continue;
            };

            draw_triangle(&[*a, *b, *c], width, height, cull, &mut |f| {
                let index = f.y * width + f.x;
                if f.depth >= depth[index] {
                    return;
                }

                let mut base = Vec4::new(material.color.x, material.color.y, material.color.z, material.opacity);
                base *= f.varying.color;
                if let Some(map) = map {
                    base *= map.sample(f.varying.uv);
                }
                let mut emissive = material.emissive;
                if let Some(map) = emissive_map {
                    emissive *= map.sample(f.varying.uv).truncate();
                }

                let mut normal = f.varying.normal.normalize_or_zero();
                if !f.front_facing {
                    normal = -normal;
                }
                let visibility = match shadow {
                    Some(map) if mesh.receive_shadow => map.visibility(f.varying.world),
                    _ => 1.0,
                };
                let sample = SurfaceSample {
                    position: f.varying.world,
                    normal,
                    albedo: base.truncate(),
                    emissive,
                    metalness: material.metalness,
                    roughness: material.roughness,
                };
                let radiance = lights.shade(&sample, eye, visibility, environment);
                let [r, g, b] = tonemap::encode_pixel(radiance);

                depth[index] = f.depth;
                color[index] = if blend {
                    let alpha = base.w.clamp(0.0, 1.0);
                    let dst = color[index];
                    let mix = |s: u8, d: u8| (s as f32 * alpha + d as f32 * (1.0 - alpha)).round() as u8;
                    [mix(r, dst[0]), mix(g, dst[1]), mix(b, dst[2]), 255]
                } else {
                    [r, g, b, 255]
                };
            });
        }
    }
}

fn aspect_of(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}
