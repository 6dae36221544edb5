//! Rigging: the humanoid bone schema, solver output, rig profiles, and the
//! interpolation that applies a solved pose to an avatar.

pub mod apply;
pub mod bones;
pub mod pose;
pub mod profile;

pub use apply::{animate, rig_position, rig_rotation, RigOutcome};
pub use bones::HumanoidBone;
pub use pose::{EulerRotation, RiggedPose, RotationOrder};
pub use profile::{RigProfile, RigSource, RigStep, DEFAULT_STEPS};
