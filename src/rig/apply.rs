//! Per-bone interpolation toward solved rotations and positions.

use glam::Vec3;
use std::collections::HashSet;

use super::bones::HumanoidBone;
use super::pose::EulerRotation;
use super::profile::{RigKind, RigProfile};
use crate::avatar::{Avatar, VrmVersion};
use crate::tracking::packet::PosePacket;

/// What `animate` did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigOutcome {
    NoAvatar,
    NoWorldLandmarks,
    NoRig,
    /// Number of distinct bones that moved
    Applied { bones: usize },
}

/// Solved poses are in VRM 0.x bone axes. A 1.0 rig is the same skeleton
/// turned half a turn about Y, which negates the X and Z components.
fn to_model_rotation(version: VrmVersion, rotation: &EulerRotation) -> EulerRotation {
    match version {
        VrmVersion::V0 => *rotation,
        VrmVersion::V1 => EulerRotation {
            x: -rotation.x,
            z: -rotation.z,
            ..*rotation
        },
    }
}

fn to_model_position(version: VrmVersion, position: Vec3) -> Vec3 {
    match version {
        VrmVersion::V0 => position,
        VrmVersion::V1 => Vec3::new(-position.x, position.y, -position.z),
    }
}

/// Slerp a bone toward `rotation` scaled by `dampener`.
///
/// A missing rotation means `{0, 0, 0}`, which eases the bone back to identity.
/// Returns `false` when the avatar has no such bone.
pub fn rig_rotation(
    avatar: &mut Avatar,
    bone: HumanoidBone,
    rotation: Option<&EulerRotation>,
    dampener: f32,
    lerp: f32,
) -> bool {
    let version = avatar.version();
    let Some(node) = avatar.bone_mut(bone) else {
        return false;
    };
    let rotation = to_model_rotation(version, rotation.unwrap_or(&EulerRotation::ZERO));
    let target = rotation.to_quat(dampener);
    node.rotation = node.rotation.slerp(target, lerp);
    true
}

/// Lerp a bone's translation toward `position` scaled by `dampener`.
pub fn rig_position(
    avatar: &mut Avatar,
    bone: HumanoidBone,
    position: Vec3,
    dampener: f32,
    lerp: f32,
) -> bool {
    let version = avatar.version();
    let Some(node) = avatar.bone_mut(bone) else {
        return false;
    };
    let target = to_model_position(version, position * dampener);
    node.translation = node.translation.lerp(target, lerp);
    true
}

/// Run every profile step against the packet's solved pose.
pub fn animate(avatar: Option<&mut Avatar>, packet: &PosePacket, profile: &RigProfile) -> RigOutcome {
    let Some(avatar) = avatar else {
        return RigOutcome::NoAvatar;
    };
    if packet.pose_world_landmarks.is_none() {
        return RigOutcome::NoWorldLandmarks;
    }
    let Some(pose) = &packet.rig else {
        return RigOutcome::NoRig;
    };

    let mut moved_bones = HashSet::new();
    for step in &profile.steps {
        let moved = match step.kind() {
            RigKind::Rotation => {
                let rotation = step.source.rotation(pose);
                rig_rotation(avatar, step.bone, rotation.as_ref(), step.dampener, step.lerp)
            }
            RigKind::Position => match step.source.position(pose) {
                Some(position) => rig_position(
                    avatar,
                    step.bone,
                    profile.hips_target(position),
                    step.dampener,
                    step.lerp,
                ),
                None => false,
            },
        };
        if moved {
            moved_bones.insert(step.bone);
        }
    }

    let bones = moved_bones.len();
    tracing::trace!("Frame {}: rigged {} bones", packet.frame, bones);
    RigOutcome::Applied { bones }
}
