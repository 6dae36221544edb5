//! Scene lighting and frame timing.

use glam::Vec3;
use std::time::Instant;

use crate::config::SceneConfig;

/// Directional light plus a flat ambient term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Unit vector pointing toward the light
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub ambient: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::from_config(&SceneConfig::default())
    }
}

impl DirectionalLight {
    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            direction: Vec3::from_array(config.light_direction).normalize_or(Vec3::Y),
            color: Vec3::from_array(config.light_color),
            intensity: config.light_intensity,
            ambient: config.ambient,
        }
    }

    /// Lambert factor for a surface normal, ambient included.
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let diffuse = normal.dot(self.direction).max(0.0) * self.intensity;
        self.color * (self.ambient + diffuse)
    }
}

/// Seconds between successive `get_delta` calls.
#[derive(Debug, Default)]
pub struct Clock {
    last: Option<Instant>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the previous call; the first call returns 0.
    pub fn get_delta(&mut self) -> f32 {
        let now = Instant::now();
        let delta = self
            .last
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        delta
    }
}
