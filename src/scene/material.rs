//! Materials and textures.

use super::ResourceId;
use glam::Vec3;
use std::sync::Arc;

/// Raw texture data decoded from an embedded or referenced image.
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// RGBA8 pixel data (4 bytes per pixel).
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Create a new texture from RGBA data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A single-colour texture.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self::new(width, height, pixels)
    }

    /// Check if this texture has transparency.
    pub fn has_transparency(&self) -> bool {
        self.pixels.chunks(4).any(|pixel| pixel[3] < 255)
    }

    /// Get a pixel at (x, y).
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }
}

/// Decode an encoded image (PNG/JPEG) into RGBA8 texture data.
pub fn load_texture_from_bytes(data: &[u8]) -> Result<TextureData, image::ImageError> {
    let img = image::load_from_memory(data)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(TextureData {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// How texel values of a texture are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Values are used as-is (data textures, untagged colour maps).
    Linear,
    /// Values are sRGB-encoded and decoded before lighting.
    Srgb,
}

/// A texture handle: shared image data plus sampling state.
///
/// Clones share the same [`ResourceId`]; changing the colour space bumps the
/// version so prepared copies are rebuilt.
#[derive(Debug, Clone)]
pub struct Texture {
    id: ResourceId,
    pub name: Option<String>,
    pub image: Arc<TextureData>,
    color_space: ColorSpace,
    version: u32,
}

impl Texture {
    pub fn new(image: Arc<TextureData>, color_space: ColorSpace) -> Self {
        Self {
            id: ResourceId::next(),
            name: None,
            image,
            color_space,
            version: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn set_color_space(&mut self, color_space: ColorSpace) {
        if self.color_space != color_space {
            self.color_space = color_space;
            self.needs_update();
        }
    }

    pub fn needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

/// Which triangle faces a material renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// A physically based surface description.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: Option<String>,
    /// Base colour factor in linear light.
    pub color: Vec3,
    /// Base colour map.
    pub map: Option<Texture>,
    /// Emissive colour in linear light.
    pub emissive: Vec3,
    pub emissive_map: Option<Texture>,
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub side: Side,
    pub(crate) version: u32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            color: Vec3::ONE,
            map: None,
            emissive: Vec3::ZERO,
            emissive_map: None,
            metalness: 0.0,
            roughness: 1.0,
            opacity: 1.0,
            transparent: false,
            side: Side::Front,
            version: 0,
        }
    }
}

impl Material {
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_map(mut self, map: Texture) -> Self {
        self.map = Some(map);
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Flag the material for re-preparation by the renderer.
    pub fn needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// All textures referenced by this material.
    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.map.iter().chain(self.emissive_map.iter())
    }
}
