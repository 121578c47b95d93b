//! Image-based ambient lighting from a synthetic studio room.
//!
//! The room is an analytic radiance function (grey walls, a warm floor, a
//! bank of ceiling panels and two side softboxes). It is integrated once into
//! an ambient cube: six cosine-weighted radiance averages, one per axis
//! direction, which can be evaluated for any normal at shading time.

use glam::Vec3;

const SAMPLE_COUNT: usize = 2048;

/// Cosine-convolved environment lighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Average radiance seen by normals along +X, -X, +Y, -Y, +Z, -Z.
    faces: [Vec3; 6],
}

impl Environment {
    /// Bake the studio room preset.
    pub fn room() -> Self {
        Self::bake(room_radiance)
    }

    pub(crate) fn bake(radiance: impl Fn(Vec3) -> Vec3) -> Self {
        let axes = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        let mut sums = [Vec3::ZERO; 6];
        let mut weights = [0.0f32; 6];

        for i in 0..SAMPLE_COUNT {
            let dir = fibonacci_direction(i, SAMPLE_COUNT);
            let value = radiance(dir);
            for (face, axis) in axes.iter().enumerate() {
                let cos = dir.dot(*axis);
                if cos > 0.0 {
                    sums[face] += value * cos;
                    weights[face] += cos;
                }
            }
        }

        let mut faces = [Vec3::ZERO; 6];
        for face in 0..6 {
            if weights[face] > 0.0 {
                faces[face] = sums[face] / weights[face];
            }
        }
        Self { faces }
    }

    /// Diffuse environment radiance for a unit normal.
    pub fn irradiance(&self, n: Vec3) -> Vec3 {
        let sq = n * n;
        let x = if n.x >= 0.0 { self.faces[0] } else { self.faces[1] };
        let y = if n.y >= 0.0 { self.faces[2] } else { self.faces[3] };
        let z = if n.z >= 0.0 { self.faces[4] } else { self.faces[5] };
        x * sq.x + y * sq.y + z * sq.z
    }
}

fn fibonacci_direction(i: usize, n: usize) -> Vec3 {
    let golden = std::f32::consts::PI * (3.0 - 5f32.sqrt());
    let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
    let r = (1.0 - y * y).max(0.0).sqrt();
    let theta = golden * i as f32;
    Vec3::new(theta.cos() * r, y, theta.sin() * r)
}

fn room_radiance(dir: Vec3) -> Vec3 {
    let wall = Vec3::new(0.42, 0.42, 0.42);
    let floor = Vec3::new(0.30, 0.28, 0.26);

    // Ceiling light panels.
    if dir.y > 0.85 {
        return Vec3::splat(4.0);
    }
    // Softboxes to the left and right.
    if dir.x.abs() > 0.9 && dir.y > -0.2 {
        return Vec3::splat(2.5);
    }
    if dir.y < -0.3 {
        floor
    } else {
        wall
    }
}
