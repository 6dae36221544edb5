//! Tracker subprocess manager
//!
//! Launches and manages the Python pose tracker helper as a child process with
//! automatic cleanup on drop.

use std::fmt;
use std::path::PathBuf;
use tokio::process::{Child, Command};

use crate::config::TrackerConfig;
use crate::error::{PosevrmError, TrackingError};

/// What the tracker helper reads frames from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Camera device index
    Camera(u32),
    /// Local video file
    File(PathBuf),
}

impl VideoSource {
    /// Source named by the config: the video file when set, else the camera.
    pub fn from_config(config: &TrackerConfig) -> Self {
        match &config.video_path {
            Some(path) => Self::File(path.clone()),
            None => Self::Camera(config.camera_device),
        }
    }

    fn args(&self) -> [String; 2] {
        match self {
            Self::Camera(device) => ["--capture".to_string(), device.to_string()],
            Self::File(path) => ["--video".to_string(), path.display().to_string()],
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera(device) => write!(f, "camera {}", device),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Manages the pose tracker subprocess (scripts/pose_tracker.py)
pub struct TrackerSubprocess {
    child: Option<Child>,
    config: TrackerConfig,
    source: VideoSource,
    /// Set when a video source ran to the end and the helper exited cleanly
    finished: bool,
}

impl TrackerSubprocess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            child: None,
            config: config.clone(),
            source: VideoSource::from_config(config),
            finished: false,
        }
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    /// True once a video file has been tracked to the end.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Helper arguments after the script path.
    pub fn build_args(&self) -> Vec<String> {
        let c = &self.config;
        let mut args = vec![
            "--ip".to_string(),
            c.listen_address.clone(),
            "--port".to_string(),
            c.port.to_string(),
        ];
        args.extend(self.source.args());
        args.extend([
            "--width".to_string(),
            c.capture_width.to_string(),
            "--height".to_string(),
            c.capture_height.to_string(),
            "--model-complexity".to_string(),
            c.model_complexity.to_string(),
            "--min-detection-confidence".to_string(),
            c.min_detection_confidence.to_string(),
            "--min-tracking-confidence".to_string(),
            c.min_tracking_confidence.to_string(),
        ]);
        if c.send_preview {
            args.extend(["--preview-width".to_string(), c.preview_width.to_string()]);
        }
        if !c.smooth_landmarks {
            args.push("--no-smooth-landmarks".to_string());
        }
        args
    }

    /// Launch the tracker subprocess.
    pub fn start(&mut self) -> Result<(), PosevrmError> {
        if self.is_running() {
            return Ok(());
        }

        self.finished = false;
        let child = Command::new(&self.config.python)
            .arg(&self.config.tracker_script)
            .args(self.build_args())
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| {
                TrackingError::Subprocess(format!(
                    "Failed to launch pose tracker at '{}': {}",
                    self.config.tracker_script, e
                ))
            })?;

        tracing::info!(
            "Pose tracker subprocess started (pid: {:?}, source: {}, port: {})",
            child.id(),
            self.source,
            self.config.port,
        );

        self.child = Some(child);
        Ok(())
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    if status.success() && matches!(self.source, VideoSource::File(_)) {
                        tracing::info!("Pose tracker finished video {}", self.source);
                        self.finished = true;
                    } else {
                        tracing::warn!("Pose tracker subprocess exited with: {}", status);
                    }
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check pose tracker status: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Stop the subprocess by killing it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping pose tracker subprocess (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }

    /// Stop, switch to `source`, and start again.
    pub async fn restart(&mut self, source: VideoSource) -> Result<(), PosevrmError> {
        self.stop().await;
        tracing::info!("Switching pose tracker source to {}", source);
        self.source = source;
        self.start()
    }
}

/// Check if the `mediapipe` Python package is available.
///
/// Runs `<python> -c "import mediapipe"` and returns true if it succeeds.
/// The import takes seconds, so the child is awaited rather than blocked on.
pub async fn check_mediapipe_available(python: &str) -> bool {
    match Command::new(python)
        .args(["-c", "import mediapipe"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_args() {
        let sub = TrackerSubprocess::new(&TrackerConfig::default());
        let args = sub.build_args();
        assert_eq!(
            args,
            vec![
                "--ip",
                "127.0.0.1",
                "--port",
                "12347",
                "--capture",
                "0",
                "--width",
                "640",
                "--height",
                "480",
                "--model-complexity",
                "2",
                "--min-detection-confidence",
                "0.5",
                "--min-tracking-confidence",
                "0.5",
                "--preview-width",
                "320",
            ]
        );
    }

    #[test]
    fn test_video_args_and_smoothing_flag() {
        let config = TrackerConfig {
            video_path: Some(PathBuf::from("clips/dance.mp4")),
            smooth_landmarks: false,
            ..TrackerConfig::default()
        };
        let sub = TrackerSubprocess::new(&config);
        assert_eq!(sub.source(), &VideoSource::File(PathBuf::from("clips/dance.mp4")));

        let args = sub.build_args();
        let video = args.iter().position(|a| a == "--video").unwrap();
        assert_eq!(args[video + 1], "clips/dance.mp4");
        assert!(!args.contains(&"--capture".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--no-smooth-landmarks"));
    }

    #[test]
    fn test_preview_disabled_args() {
        let config = TrackerConfig {
            send_preview: false,
            ..TrackerConfig::default()
        };
        let args = TrackerSubprocess::new(&config).build_args();
        assert!(!args.contains(&"--preview-width".to_string()));
    }

    #[test]
    fn test_not_running_before_start() {
        let mut sub = TrackerSubprocess::new(&TrackerConfig::default());
        assert!(!sub.is_running());
        assert!(!sub.finished());
    }

    #[tokio::test]
    async fn test_start_missing_interpreter() {
        let config = TrackerConfig {
            python: "/nonexistent/python-for-posevrm-tests".to_string(),
            ..TrackerConfig::default()
        };
        let mut sub = TrackerSubprocess::new(&config);
        let result = sub.start();
        assert!(matches!(
            result,
            Err(PosevrmError::Tracking(TrackingError::Subprocess(_)))
        ));
        assert!(!sub.is_running());
    }

    #[tokio::test]
    async fn test_restart_switches_source() {
        let config = TrackerConfig {
            python: "/nonexistent/python-for-posevrm-tests".to_string(),
            ..TrackerConfig::default()
        };
        let mut sub = TrackerSubprocess::new(&config);
        let source = VideoSource::File(PathBuf::from("clip.mp4"));
        // The launch fails, but the new source sticks for the next attempt
        assert!(sub.restart(source.clone()).await.is_err());
        assert_eq!(sub.source(), &source);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(VideoSource::Camera(1).to_string(), "camera 1");
        assert_eq!(VideoSource::File(PathBuf::from("a.mp4")).to_string(), "a.mp4");
    }

    #[tokio::test]
    async fn test_missing_python_has_no_mediapipe() {
        assert!(!check_mediapipe_available("/nonexistent/python-for-posevrm-tests").await);
    }
}
