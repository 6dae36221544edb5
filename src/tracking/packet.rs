//! JSON datagrams sent by the pose tracker helper.

use serde::{Deserialize, Serialize};

use super::landmark::Landmark;
use crate::error::TrackingError;
use crate::rig::pose::RiggedPose;

/// One processed camera or video frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PosePacket {
    #[serde(default)]
    pub frame: u64,
    #[serde(default)]
    pub timestamp_ms: f64,
    #[serde(default)]
    pub image_width: u32,
    #[serde(default)]
    pub image_height: u32,
    /// Normalized image-space landmarks; empty when no body was found
    pub pose_landmarks: Vec<Landmark>,
    /// Metric landmarks around the hip centre
    #[serde(default)]
    pub pose_world_landmarks: Option<Vec<Landmark>>,
    /// Solver output for this frame
    #[serde(default)]
    pub rig: Option<RiggedPose>,
}

impl PosePacket {
    pub fn parse(data: &[u8]) -> Result<Self, TrackingError> {
        serde_json::from_slice(data).map_err(|e| TrackingError::Parse(format!("JSON parse error: {}", e)))
    }

    pub fn has_pose(&self) -> bool {
        !self.pose_landmarks.is_empty()
    }
}
