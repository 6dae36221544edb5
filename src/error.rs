//! Error types for posevrm

use thiserror::Error;

/// Main error type for posevrm
#[derive(Error, Debug)]
pub enum PosevrmError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Avatar model errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Invalid GLB container: {0}")]
    InvalidGlb(String),

    #[error("Model has no humanoid bone '{0}'")]
    MissingBone(String),

    #[error("VRM extension JSON error: {0}")]
    Json(String),
}

/// Pose tracker errors (receiver + helper subprocess)
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Pose receiver error: {0}")]
    Receiver(String),

    #[error("Pose packet parse error: {0}")]
    Parse(String),

    #[error("Preview frame decode error: {0}")]
    Frame(#[from] image::ImageError),

    #[error("Tracker subprocess error: {0}")]
    Subprocess(String),
}

/// Result type alias for posevrm operations
pub type Result<T> = std::result::Result<T, PosevrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_wraps_inner() {
        let err: PosevrmError = ConfigError::InvalidValue {
            field: "tracker.port".to_string(),
            message: "Port must be greater than 0".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration value: tracker.port - Port must be greater than 0"
        );
    }

    #[test]
    fn test_tracking_error_from() {
        let err: PosevrmError = TrackingError::Parse("bad json".to_string()).into();
        assert!(matches!(err, PosevrmError::Tracking(TrackingError::Parse(_))));
    }
}
