//! Avatar module
//!
//! VRM loading, forward kinematics and skinning, spring bones, and the posable
//! `Avatar` the rig writes into.

mod humanoid;
pub mod model;
pub mod skinning;
pub mod spring_bone;

pub use humanoid::{Avatar, LocalTransform};
pub use model::{VrmModel, VrmVersion};

#[cfg(test)]
pub(crate) use humanoid::test_support;
