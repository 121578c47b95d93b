//! Scene normalization: centre the model, derive the framing distance and
//! standardize material state.

use crate::error::{Result, SnapshotError};
use crate::scene::{ColorSpace, SceneNode, Side};
use glam::Vec3;

/// Options for [`normalize`].
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Tag base colour maps as sRGB so lighting decodes them correctly.
    pub preserve_materials: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            preserve_materials: true,
        }
    }
}

/// Where the model sat before centring and how far the camera stands off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    /// Bounding-box centre before the model was moved to the origin.
    pub center: Vec3,
    pub size: Vec3,
    /// Reference camera distance: twice the largest dimension, at least 2.
    pub view_distance: f32,
}

impl Framing {
    fn from_size(center: Vec3, size: Vec3) -> Self {
        let mut max_dim = size.max_element();
        if max_dim <= 0.0 || !max_dim.is_finite() {
            max_dim = 1.0;
        }
        Self {
            center,
            size,
            view_distance: max_dim * 2.0,
        }
    }
}

/// Centre `root` on the world origin and prepare every mesh for capture.
pub fn normalize(root: &mut SceneNode, options: NormalizeOptions) -> Result<Framing> {
    let bounds = root
        .bounding_box()
        .ok_or_else(|| SnapshotError::decode("model is empty"))?;
    let framing = Framing::from_size(bounds.center(), bounds.dimensions());

    // Shift in the parent frame of the root, which is world space.
    root.transform.translation -= framing.center;

    let mut retagged = 0;
    root.visit_meshes_mut(&mut |mesh| {
        mesh.cast_shadow = true;
        mesh.receive_shadow = true;
        mesh.material.side = Side::Double;

        if options.preserve_materials {
            if let Some(map) = &mut mesh.material.map {
                if map.color_space() != ColorSpace::Srgb {
                    map.set_color_space(ColorSpace::Srgb);
                    retagged += 1;
                }
            }
        }
        mesh.material.needs_update();
    });

    tracing::debug!(
        "Normalized {}: center {:?}, size {:?}, distance {:.3}, {} maps retagged",
        root.name,
        framing.center,
        framing.size,
        framing.view_distance,
        retagged
    );
    Ok(framing)
}
