//! Prepared copies of scene resources, the software stand-in for GPU buffers
//! and textures.

use crate::scene::{ColorSpace, Geometry, ResourceId, Texture};
use crate::types::srgb_to_linear;
use glam::{Vec2, Vec4};
use std::collections::HashMap;

/// Texels decoded to linear RGBA floats.
#[derive(Debug)]
pub struct PreparedTexture {
    version: u32,
    width: usize,
    height: usize,
    texels: Vec<Vec4>,
}

impl PreparedTexture {
    fn prepare(texture: &Texture) -> Self {
        let image = &texture.image;
        let decode = |c: u8| {
            let v = c as f32 / 255.0;
            match texture.color_space() {
                ColorSpace::Srgb => srgb_to_linear(v),
                ColorSpace::Linear => v,
            }
        };
        let texels = image
            .pixels
            .chunks_exact(4)
            .map(|p| Vec4::new(decode(p[0]), decode(p[1]), decode(p[2]), p[3] as f32 / 255.0))
            .collect::<Vec<_>>();
        let (width, height) = if texels.len() == (image.width as usize) * (image.height as usize) {
            (image.width as usize, image.height as usize)
        } else {
            (0, 0)
        };
        Self {
            version: texture.version(),
            width,
            height,
            texels,
        }
    }

    /// Bilinear sample with repeat wrapping.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::ONE;
        }
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);

        let texel = |tx: f32, ty: f32| {
            let tx = (tx as i64).rem_euclid(self.width as i64) as usize;
            let ty = (ty as i64).rem_euclid(self.height as i64) as usize;
            self.texels[ty * self.width + tx]
        };
        let top = texel(x0, y0).lerp(texel(x0 + 1.0, y0), fx);
        let bottom = texel(x0, y0 + 1.0).lerp(texel(x0 + 1.0, y0 + 1.0), fx);
        top.lerp(bottom, fy)
    }
}

/// Number of prepared resources held by a surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub geometries: usize,
    pub textures: usize,
}

/// Cache of prepared resources keyed by [`ResourceId`].
#[derive(Debug, Default)]
pub struct ResourceCache {
    geometries: HashMap<ResourceId, usize>,
    textures: HashMap<ResourceId, PreparedTexture>,
}

impl ResourceCache {
    /// Record a geometry upload. Returns its vertex count.
    pub fn prepare_geometry(&mut self, geometry: &Geometry) -> usize {
        *self
            .geometries
            .entry(geometry.id())
            .or_insert_with(|| geometry.vertex_count())
    }

    /// Decode a texture, or re-decode it when its version moved on.
    pub fn prepare_texture(&mut self, texture: &Texture) {
        let stale = self
            .textures
            .get(&texture.id())
            .map_or(true, |prepared| prepared.version != texture.version());
        if stale {
            self.textures.insert(texture.id(), PreparedTexture::prepare(texture));
        }
    }

    pub fn texture(&self, id: ResourceId) -> Option<&PreparedTexture> {
        self.textures.get(&id)
    }

    pub fn release(&mut self, geometries: &[ResourceId], textures: &[ResourceId]) {
        for id in geometries {
            self.geometries.remove(id);
        }
        for id in textures {
            self.textures.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.geometries.clear();
        self.textures.clear();
    }

    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            geometries: self.geometries.len(),
            textures: self.textures.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::TextureData;
    use std::sync::Arc;

    #[test]
    fn test_srgb_decode_and_reprepare() {
        let data = Arc::new(TextureData::solid(2, 2, [128, 128, 128, 255]));
        let mut texture = Texture::new(data, ColorSpace::Linear);
        let mut cache = ResourceCache::default();

        cache.prepare_texture(&texture);
        let linear = cache.texture(texture.id()).unwrap().sample(Vec2::new(0.5, 0.5));
        assert!((linear.x - 128.0 / 255.0).abs() < 1e-6);

        texture.set_color_space(ColorSpace::Srgb);
        cache.prepare_texture(&texture);
        let decoded = cache.texture(texture.id()).unwrap().sample(Vec2::new(0.5, 0.5));
        assert!(decoded.x < 0.25);
        assert_eq!(cache.counts().textures, 1);
    }

    #[test]
    fn test_bilinear_wraps() {
        let data = TextureData::new(2, 1, vec![0, 0, 0, 255, 255, 255, 255, 255]);
        let texture = Texture::new(Arc::new(data), ColorSpace::Linear);
        let prepared = PreparedTexture::prepare(&texture);

        assert_eq!(prepared.sample(Vec2::new(0.25, 0.5)).x, 0.0);
        assert_eq!(prepared.sample(Vec2::new(0.75, 0.5)).x, 1.0);
        // Halfway across the seam blends both texels.
        assert!((prepared.sample(Vec2::new(1.0, 0.5)).x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_release() {
        let mut cache = ResourceCache::default();
        let geometry = Geometry::new();
        cache.prepare_geometry(&geometry);
        assert_eq!(cache.counts().geometries, 1);
        cache.release(&[geometry.id()], &[]);
        assert_eq!(cache.counts(), ResourceCounts::default());
    }
}
