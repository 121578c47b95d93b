//! Perspective camera.

use glam::{Mat4, Vec3};

const DEFAULT_NEAR: f32 = 0.1;
const DEFAULT_FAR: f32 = 2000.0;

/// A right-handed perspective camera looking down its local -Z axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    /// World direction that maps to screen-up in [`look_at`](Self::look_at).
    pub up: Vec3,
    /// Camera-to-world rotation axes (right, up, back).
    basis: [Vec3; 3],
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32) -> Self {
        Self {
            fov,
            aspect,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            position: Vec3::ZERO,
            up: Vec3::Y,
            basis: [Vec3::X, Vec3::Y, Vec3::Z],
        }
    }

    /// Orient the camera towards `target`, keeping [`up`](Self::up) as close
    /// to screen-up as the view direction allows.
    ///
    /// When the view direction is parallel to `up` the back axis is nudged so
    /// the basis stays orthonormal.
    pub fn look_at(&mut self, target: Vec3) {
        let up = self.up;
        let mut z = self.position - target;
        if z.length_squared() == 0.0 {
            z.z = 1.0;
        }
        z = z.normalize();

        let mut x = up.cross(z);
        if x.length_squared() == 0.0 {
            if up.z.abs() == 1.0 {
                z.x += 0.0001;
            } else {
                z.z += 0.0001;
            }
            z = z.normalize();
            x = up.cross(z);
        }
        x = x.normalize();
        let y = z.cross(x);
        self.basis = [x, y, z];
    }

    /// Right, up and backward axes in world space.
    pub fn axes(&self) -> [Vec3; 3] {
        self.basis
    }

    /// Widen the clip planes so a model framed at `distance` is never clipped.
    pub fn fit_clip_planes(&mut self, distance: f32) {
        self.near = DEFAULT_NEAR.min(distance * 0.01).max(1e-5);
        self.far = DEFAULT_FAR.max(distance * 10.0);
    }

    pub fn world_matrix(&self) -> Mat4 {
        let [x, y, z] = self.basis;
        Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), self.position.extend(1.0))
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
