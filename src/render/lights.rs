//! The fixed studio lighting rig and surface shading.

use super::environment::Environment;
use crate::types::Rgb;
use glam::Vec3;
use std::f32::consts::PI;

/// A light shining from `position` towards the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub cast_shadow: bool,
}

impl DirectionalLight {
    fn new(intensity: f32, position: Vec3) -> Self {
        Self {
            color: Vec3::ONE,
            intensity,
            position,
            cast_shadow: false,
        }
    }

    /// Unit vector from the lit surface towards the light.
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or_zero()
    }

    fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}

/// Sky/ground gradient light.
#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereLight {
    pub sky: Vec3,
    pub ground: Vec3,
    pub intensity: f32,
}

impl HemisphereLight {
    fn irradiance(&self, normal: Vec3) -> Vec3 {
        let weight = 0.5 * normal.y + 0.5;
        self.ground.lerp(self.sky, weight) * self.intensity
    }
}

/// Surface properties at one shaded pixel.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    /// Linear base colour.
    pub albedo: Vec3,
    pub emissive: Vec3,
    pub metalness: f32,
    pub roughness: f32,
}

/// Ambient + hemisphere fill plus a key/fill/rim three-point rig.
#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    pub ambient: Vec3,
    pub hemisphere: HemisphereLight,
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
    pub rim: DirectionalLight,
    pub environment_intensity: f32,
}

impl LightRig {
    /// The product-photography preset.
    pub fn studio() -> Self {
        let mut key = DirectionalLight::new(1.6, Vec3::new(25.0, 35.0, 20.0));
        key.cast_shadow = true;
        Self {
            ambient: Vec3::ONE * 0.8,
            hemisphere: HemisphereLight {
                sky: Rgb::from_u32(0xffffff).to_linear(),
                ground: Rgb::from_u32(0x404040).to_linear(),
                intensity: 1.0,
            },
            key,
            fill: DirectionalLight::new(1.1, Vec3::new(-30.0, 20.0, -25.0)),
            rim: DirectionalLight::new(0.7, Vec3::new(0.0, 40.0, -35.0)),
            environment_intensity: 1.0,
        }
    }

    pub fn directional(&self) -> [&DirectionalLight; 3] {
        [&self.key, &self.fill, &self.rim]
    }

    /// Outgoing linear radiance towards `eye`. `key_visibility` is the
    /// fraction of the key light not blocked by shadow casters.
    pub fn shade(&self, surface: &SurfaceSample, eye: Vec3, key_visibility: f32, environment: &Environment) -> Vec3 {
        let n = surface.normal;
        let v = (eye - surface.position).normalize_or_zero();
        let metalness = surface.metalness.clamp(0.0, 1.0);
        let diffuse_color = surface.albedo * (1.0 - metalness);
        let f0 = Vec3::splat(0.04).lerp(surface.albedo, metalness);

        let alpha = surface.roughness.clamp(0.04, 1.0).powi(2);
        let shininess = (2.0 / (alpha * alpha) - 2.0).clamp(1.0, 2048.0);
        let specular_norm = (shininess + 2.0) / (8.0 * PI);

        let mut diffuse_irradiance = self.ambient + self.hemisphere.irradiance(n);
        let mut specular = Vec3::ZERO;
        for (i, light) in self.directional().into_iter().enumerate() {
            let l = light.direction();
            let n_dot_l = n.dot(l);
            if n_dot_l <= 0.0 {
                continue;
            }
            let visibility = if i == 0 && light.cast_shadow { key_visibility } else { 1.0 };
            let irradiance = light.radiance() * n_dot_l * visibility;
            diffuse_irradiance += irradiance;

            let h = (l + v).normalize_or_zero();
            let n_dot_h = n.dot(h).max(0.0);
            specular += irradiance * f0 * specular_norm * n_dot_h.powf(shininess);
        }

        let env = environment.irradiance(n) * self.environment_intensity;
        let reflected = environment.irradiance(reflect(-v, n)) * self.environment_intensity;
        let env_specular = reflected * f0 * (1.0 - alpha).max(0.0);

        diffuse_color * (diffuse_irradiance / PI + env) + specular + env_specular + surface.emissive
    }
}

fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}
