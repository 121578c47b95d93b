//! Depth shadow map for the key light.

use super::raster::{draw_triangle, ClipVertex, Cull, Varying};
use glam::{Mat4, Vec3, Vec4};

/// Depth offset applied to receivers to avoid self-shadowing acne.
const BIAS: f32 = -0.0005;

/// An orthographic depth map rendered from a directional light, with a
/// frustum fitted to the model's bounding sphere.
#[derive(Debug, Clone)]
pub struct ShadowMap {
    size: usize,
    view_projection: Mat4,
    depth: Vec<f32>,
}

impl ShadowMap {
    /// Fit the light frustum around a sphere. `light_direction` points from the
    /// scene towards the light.
    pub fn new(size: u32, light_direction: Vec3, center: Vec3, radius: f32) -> Self {
        let size = size.max(1) as usize;
        let radius = radius.max(1e-4);
        let direction = light_direction.normalize_or_zero();
        let eye = center + direction * radius * 2.0;
        let up = if direction.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(eye, center, up);
        let projection = Mat4::orthographic_rh_gl(-radius, radius, -radius, radius, radius * 0.5, radius * 3.5);

        Self {
            size,
            view_projection: projection * view,
            depth: vec![1.0; size * size],
        }
    }

    /// Rasterize a world-space triangle as an occluder. Both faces cast.
    pub fn draw(&mut self, triangle: [Vec3; 3]) {
        let clip = triangle.map(|p| ClipVertex {
            clip: self.view_projection * p.extend(1.0),
            varying: Varying::default(),
        });
        let size = self.size;
        let depth = &mut self.depth;
        draw_triangle(&clip, size, size, Cull::None, &mut |f| {
            let slot = &mut depth[f.y * size + f.x];
            if f.depth < *slot {
                *slot = f.depth;
            }
        });
    }

    /// Fraction of a 3x3 neighbourhood around `world` that sees the light.
    pub fn visibility(&self, world: Vec3) -> f32 {
        let clip: Vec4 = self.view_projection * world.extend(1.0);
        if clip.w <= 0.0 {
            return 1.0;
        }
        let ndc = clip.truncate() / clip.w;
        let depth = ndc.z * 0.5 + 0.5 + BIAS;
        if !(0.0..=1.0).contains(&depth) {
            return 1.0;
        }

        let size = self.size as f32;
        let px = ((ndc.x + 1.0) * 0.5 * size).floor() as i64;
        let py = ((1.0 - ndc.y) * 0.5 * size).floor() as i64;

        let mut lit = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (x, y) = (px + dx, py + dy);
                let occluder = if x < 0 || y < 0 || x >= self.size as i64 || y >= self.size as i64 {
                    1.0
                } else {
                    self.depth[y as usize * self.size + x as usize]
                };
                if depth <= occluder {
                    lit += 1;
                }
            }
        }
        lit as f32 / 9.0
    }
}
