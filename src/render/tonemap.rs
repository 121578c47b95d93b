//! ACES filmic tone mapping and output encoding.

use crate::types::linear_to_srgb;
use glam::{Mat3, Vec3};

/// Fixed exposure applied before tone mapping.
pub const EXPOSURE: f32 = 1.6;

const ACES_INPUT: Mat3 = Mat3::from_cols(
    Vec3::new(0.59719, 0.07600, 0.02840),
    Vec3::new(0.35458, 0.90834, 0.13383),
    Vec3::new(0.04823, 0.01566, 0.83777),
);

const ACES_OUTPUT: Mat3 = Mat3::from_cols(
    Vec3::new(1.60475, -0.10208, -0.00327),
    Vec3::new(-0.53108, 1.10813, -0.07276),
    Vec3::new(-0.07367, -0.00605, 1.07602),
);

fn rrt_and_odt_fit(v: Vec3) -> Vec3 {
    let a = v * (v + 0.0245786) - 0.000090537;
    let b = v * (0.983729 * v + 0.4329510) + 0.238081;
    a / b
}

/// Map scene-referred linear radiance to display-referred linear [0, 1].
pub fn aces_filmic(color: Vec3, exposure: f32) -> Vec3 {
    let color = color * (exposure / 0.6);
    let color = ACES_INPUT * color;
    let color = rrt_and_odt_fit(color);
    (ACES_OUTPUT * color).clamp(Vec3::ZERO, Vec3::ONE)
}

/// Tone map and sRGB-encode one pixel.
pub fn encode_pixel(color: Vec3) -> [u8; 3] {
    let mapped = aces_filmic(color, EXPOSURE);
    [mapped.x, mapped.y, mapped.z].map(|c| (linear_to_srgb(c) * 255.0).round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_and_monotonic() {
        assert_eq!(encode_pixel(Vec3::ZERO), [0, 0, 0]);

        let mut last = 0u8;
        for step in 1..20 {
            let [r, _, _] = encode_pixel(Vec3::splat(step as f32 * 0.1));
            assert!(r >= last);
            last = r;
        }
    }

    #[test]
    fn test_highlights_compress() {
        let bright = aces_filmic(Vec3::splat(100.0), EXPOSURE);
        assert!(bright.max_element() <= 1.0);
        assert!(bright.min_element() > 0.9);
    }
}
