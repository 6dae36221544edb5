//! Configuration parsing and management for posevrm

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, PosevrmError};
use crate::rig::profile::RigStep;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub avatar: AvatarConfig,
    pub scene: SceneConfig,
    pub tracker: TrackerConfig,
    pub rig: RigConfig,
    pub ui: UiConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PosevrmError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, PosevrmError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, PosevrmError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PosevrmError> {
        if self.tracker.port == 0 {
            return Err(invalid("tracker.port", "Port must be greater than 0"));
        }

        for (field, value) in [
            (
                "tracker.min_detection_confidence",
                self.tracker.min_detection_confidence,
            ),
            (
                "tracker.min_tracking_confidence",
                self.tracker.min_tracking_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "Confidence must be between 0.0 and 1.0"));
            }
        }

        if self.tracker.model_complexity > 2 {
            return Err(invalid(
                "tracker.model_complexity",
                "Model complexity must be 0, 1 or 2",
            ));
        }

        if self.tracker.send_preview && self.tracker.preview_width == 0 {
            return Err(invalid(
                "tracker.preview_width",
                "Preview width must be greater than 0",
            ));
        }

        if !(self.scene.fov_deg > 0.0 && self.scene.fov_deg < 180.0) {
            return Err(invalid(
                "scene.fov_deg",
                "Field of view must be between 0 and 180 degrees",
            ));
        }

        if self.scene.near <= 0.0 || self.scene.near >= self.scene.far {
            return Err(invalid(
                "scene.near",
                "Near plane must be positive and closer than the far plane",
            ));
        }

        let [lx, ly, lz] = self.scene.light_direction;
        if lx == 0.0 && ly == 0.0 && lz == 0.0 {
            return Err(invalid(
                "scene.light_direction",
                "Light direction must not be zero",
            ));
        }

        if let Some(steps) = &self.rig.steps {
            for (i, step) in steps.iter().enumerate() {
                if !(0.0..=1.0).contains(&step.lerp) {
                    return Err(invalid(
                        &format!("rig.steps[{}].lerp", i),
                        "Lerp amount must be between 0.0 and 1.0",
                    ));
                }
            }
        }

        if let Some(video) = &self.tracker.video_path {
            if !video.exists() {
                tracing::warn!("Configured tracker video not found: {}", video.display());
            }
        }

        if self.tracker.enabled && self.tracker.auto_launch {
            let path = Path::new(&self.tracker.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "Tracker auto_launch enabled but script not found at: {}",
                    self.tracker.tracker_script
                );
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> PosevrmError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Avatar model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Path to the VRM/GLB model file
    pub model_path: PathBuf,
    /// Turn the avatar 180 degrees about Y so it faces the camera
    pub face_camera: bool,
    /// Drop skin joints that carry no vertex weight after loading
    pub remove_unnecessary_joints: bool,
    /// Simulate VRM spring bones (hair, cloth)
    pub spring_bones: bool,
    /// Multiplier on authored spring bone gravity
    pub gravity_scale: f32,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model1.vrm"),
            face_camera: true,
            remove_unnecessary_joints: true,
            spring_bones: true,
            gravity_scale: 1.0,
        }
    }
}

/// Camera and lighting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Vertical field of view in degrees
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: [f32; 3],
    /// Orbit target the camera looks at
    pub camera_target: [f32; 3],
    /// Direction the light shines from (normalized on use)
    pub light_direction: [f32; 3],
    pub light_color: [f32; 3],
    pub light_intensity: f32,
    /// Flat ambient term added to the directional light
    pub ambient: f32,
    /// Leave the viewport background unpainted
    pub transparent_background: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fov_deg: 35.0,
            near: 0.1,
            far: 1000.0,
            camera_position: [0.0, 1.4, 0.7],
            camera_target: [0.0, 1.4, 0.0],
            light_direction: [1.0, 1.0, 1.0],
            light_color: [1.0, 1.0, 1.0],
            light_intensity: 1.0,
            ambient: 0.35,
            transparent_background: true,
        }
    }
}

/// Pose tracker helper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Enable the pose receiver
    pub enabled: bool,
    /// Listen address for UDP socket
    pub listen_address: String,
    /// UDP port to receive pose packets on
    pub port: u16,
    /// Auto-launch the Python tracker subprocess
    pub auto_launch: bool,
    /// Path to the tracker helper script
    pub tracker_script: String,
    /// Python interpreter used to run the helper
    pub python: String,
    /// Camera device index
    pub camera_device: u32,
    /// Video file to track instead of the camera
    pub video_path: Option<PathBuf>,
    /// Camera capture width
    pub capture_width: u32,
    /// Camera capture height
    pub capture_height: u32,
    /// MediaPipe Pose model complexity (0, 1 or 2)
    pub model_complexity: u8,
    /// Let MediaPipe filter landmarks across frames
    pub smooth_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Ask the helper to stream downscaled JPEG frames for the preview panel
    pub send_preview: bool,
    /// Width of the preview frames; height keeps the capture aspect
    pub preview_width: u32,
    /// Auto-restart subprocess on crash
    pub auto_restart: bool,
    /// Delay before restarting crashed subprocess (seconds)
    pub restart_delay_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: "127.0.0.1".to_string(),
            port: 12347,
            auto_launch: true,
            tracker_script: "scripts/pose_tracker.py".to_string(),
            python: "python3".to_string(),
            camera_device: 0,
            video_path: None,
            capture_width: 640,
            capture_height: 480,
            model_complexity: 2,
            smooth_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            send_preview: true,
            preview_width: 320,
            auto_restart: true,
            restart_delay_secs: 3,
        }
    }
}

/// Rigging tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Replaces the built-in step list when present
    pub steps: Option<Vec<RigStep>>,
    /// Added to the solved hips position before interpolation
    pub hips_offset: [f32; 3],
    /// Flip the solved hips Z into the scene's handedness
    pub invert_hips_z: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            steps: None,
            hips_offset: [0.0, 1.4, 0.0],
            invert_hips_z: true,
        }
    }
}

/// Window layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Show the landmark preview panel on startup
    pub show_preview: bool,
    pub window_width: f32,
    pub window_height: f32,
    /// Width of the preview side panel in points
    pub preview_width: f32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_preview: true,
            window_width: 1280.0,
            window_height: 720.0,
            preview_width: 320.0,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("posevrm");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/posevrm");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/posevrm");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("posevrm");
        }
    }

    PathBuf::from(".")
}
