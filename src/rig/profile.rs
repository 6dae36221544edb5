//! Rig profiles: which solver field drives which bone, and how hard.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::bones::HumanoidBone;
use super::pose::{EulerRotation, RiggedPose, Vector3Value};
use crate::config::RigConfig;

/// A field of the solver output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RigSource {
    HipsRotation,
    HipsPosition,
    Spine,
    Chest,
    RightUpperArm,
    RightLowerArm,
    LeftUpperArm,
    LeftLowerArm,
    RightHand,
    LeftHand,
    RightUpperLeg,
    RightLowerLeg,
    LeftUpperLeg,
    LeftLowerLeg,
}

/// Whether a step slerps a rotation or lerps a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigKind {
    Rotation,
    Position,
}

impl RigSource {
    pub fn kind(self) -> RigKind {
        match self {
            Self::HipsPosition => RigKind::Position,
            _ => RigKind::Rotation,
        }
    }

    /// Rotation carried by this field, `None` for the hips position or a
    /// limb the solver did not produce.
    pub fn rotation(self, pose: &RiggedPose) -> Option<EulerRotation> {
        match self {
            Self::HipsRotation => pose.hips.rotation,
            Self::HipsPosition => None,
            Self::Spine => pose.spine,
            Self::Chest => pose.chest,
            Self::RightUpperArm => pose.right_upper_arm,
            Self::RightLowerArm => pose.right_lower_arm,
            Self::LeftUpperArm => pose.left_upper_arm,
            Self::LeftLowerArm => pose.left_lower_arm,
            Self::RightHand => pose.right_hand,
            Self::LeftHand => pose.left_hand,
            Self::RightUpperLeg => pose.right_upper_leg,
            Self::RightLowerLeg => pose.right_lower_leg,
            Self::LeftUpperLeg => pose.left_upper_leg,
            Self::LeftLowerLeg => pose.left_lower_leg,
        }
    }

    /// Translation carried by this field.
    pub fn position(self, pose: &RiggedPose) -> Option<Vector3Value> {
        match self {
            Self::HipsPosition => pose.hips.position,
            _ => None,
        }
    }
}

/// One interpolation call applied per landmark update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigStep {
    pub bone: HumanoidBone,
    pub source: RigSource,
    /// Scales every Euler angle (or position component)
    #[serde(default = "default_dampener")]
    pub dampener: f32,
    /// Interpolation factor toward the target
    #[serde(default = "default_lerp")]
    pub lerp: f32,
}

fn default_dampener() -> f32 {
    1.0
}

fn default_lerp() -> f32 {
    0.3
}

impl RigStep {
    pub const fn new(bone: HumanoidBone, source: RigSource, dampener: f32, lerp: f32) -> Self {
        Self {
            bone,
            source,
            dampener,
            lerp,
        }
    }

    pub fn kind(&self) -> RigKind {
        self.source.kind()
    }
}

/// Hand-tuned steps for a MediaPipe full-body solve, in application order.
pub const DEFAULT_STEPS: &[RigStep] = &[
    RigStep::new(HumanoidBone::Hips, RigSource::HipsRotation, 0.7, 0.3),
    RigStep::new(HumanoidBone::Hips, RigSource::HipsPosition, 1.0, 0.07),
    RigStep::new(HumanoidBone::Chest, RigSource::Spine, 0.25, 0.3),
    RigStep::new(HumanoidBone::Spine, RigSource::Spine, 0.45, 0.3),
    RigStep::new(HumanoidBone::RightUpperArm, RigSource::RightUpperArm, 1.0, 0.3),
    RigStep::new(HumanoidBone::RightLowerArm, RigSource::RightLowerArm, 1.0, 0.3),
    RigStep::new(HumanoidBone::LeftUpperArm, RigSource::LeftUpperArm, 1.0, 0.3),
    RigStep::new(HumanoidBone::LeftLowerArm, RigSource::LeftLowerArm, 1.0, 0.3),
    RigStep::new(HumanoidBone::LeftUpperLeg, RigSource::LeftUpperLeg, 1.0, 0.3),
    RigStep::new(HumanoidBone::LeftLowerLeg, RigSource::LeftLowerLeg, 1.0, 0.3),
    RigStep::new(HumanoidBone::RightUpperLeg, RigSource::RightUpperLeg, 1.0, 0.3),
    RigStep::new(HumanoidBone::RightLowerLeg, RigSource::RightLowerLeg, 1.0, 0.3),
    RigStep::new(HumanoidBone::LeftHand, RigSource::LeftHand, 1.0, 0.3),
    RigStep::new(HumanoidBone::RightHand, RigSource::RightHand, 1.0, 0.3),
];

/// Steps plus the hips coordinate adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct RigProfile {
    pub steps: Vec<RigStep>,
    /// Added to the solved hips position
    pub hips_offset: Vec3,
    /// Negate solved hips Z before the offset is added
    pub invert_hips_z: bool,
}

impl Default for RigProfile {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS.to_vec(),
            hips_offset: Vec3::new(0.0, 1.4, 0.0),
            invert_hips_z: true,
        }
    }
}

impl RigProfile {
    pub fn from_config(config: &RigConfig) -> Self {
        Self {
            steps: config
                .steps
                .clone()
                .unwrap_or_else(|| DEFAULT_STEPS.to_vec()),
            hips_offset: Vec3::from_array(config.hips_offset),
            invert_hips_z: config.invert_hips_z,
        }
    }

    /// Solved hips position moved into scene space.
    pub fn hips_target(&self, solved: Vector3Value) -> Vec3 {
        let z = if self.invert_hips_z { -solved.z } else { solved.z };
        Vec3::new(solved.x, solved.y, z) + self.hips_offset
    }
}
