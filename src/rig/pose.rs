//! Solver output: per-bone Euler rotations plus the hips translation.
//!
//! Field names follow the solver's JSON (`RightUpperArm`, `Hips.worldPosition`,
//! `rotationOrder`), so packets deserialize without a translation layer.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Axis order of an Euler rotation. Intrinsic, matching three.js `Euler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationOrder {
    #[default]
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

impl RotationOrder {
    pub fn euler_rot(self) -> EulerRot {
        match self {
            Self::XYZ => EulerRot::XYZ,
            Self::XZY => EulerRot::XZY,
            Self::YXZ => EulerRot::YXZ,
            Self::YZX => EulerRot::YZX,
            Self::ZXY => EulerRot::ZXY,
            Self::ZYX => EulerRot::ZYX,
        }
    }
}

/// Euler rotation in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerRotation {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(rename = "rotationOrder", default)]
    pub rotation_order: RotationOrder,
}

impl EulerRotation {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        rotation_order: RotationOrder::XYZ,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            rotation_order: RotationOrder::XYZ,
        }
    }

    /// Quaternion for this rotation with every angle scaled by `dampener`.
    ///
    /// Angles are passed to glam in the order the axes are named, so
    /// `ZXY` feeds (z, x, y).
    pub fn to_quat(&self, dampener: f32) -> Quat {
        let (x, y, z) = (self.x * dampener, self.y * dampener, self.z * dampener);
        let (a, b, c) = match self.rotation_order {
            RotationOrder::XYZ => (x, y, z),
            RotationOrder::XZY => (x, z, y),
            RotationOrder::YXZ => (y, x, z),
            RotationOrder::YZX => (y, z, x),
            RotationOrder::ZXY => (z, x, y),
            RotationOrder::ZYX => (z, y, x),
        };
        Quat::from_euler(self.rotation_order.euler_rot(), a, b, c)
    }
}

/// Plain `{x, y, z}` triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3Value {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Vector3Value {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Hips carry both a rotation and a translation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HipsRig {
    #[serde(default)]
    pub rotation: Option<EulerRotation>,
    #[serde(default)]
    pub position: Option<Vector3Value>,
    #[serde(rename = "worldPosition", default)]
    pub world_position: Option<Vector3Value>,
}

/// One solved frame. Limbs the solver could not see are absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RiggedPose {
    #[serde(default)]
    pub hips: HipsRig,
    #[serde(default)]
    pub spine: Option<EulerRotation>,
    #[serde(default)]
    pub chest: Option<EulerRotation>,
    #[serde(default)]
    pub right_upper_arm: Option<EulerRotation>,
    #[serde(default)]
    pub right_lower_arm: Option<EulerRotation>,
    #[serde(default)]
    pub left_upper_arm: Option<EulerRotation>,
    #[serde(default)]
    pub left_lower_arm: Option<EulerRotation>,
    #[serde(default)]
    pub right_hand: Option<EulerRotation>,
    #[serde(default)]
    pub left_hand: Option<EulerRotation>,
    #[serde(default)]
    pub right_upper_leg: Option<EulerRotation>,
    #[serde(default)]
    pub right_lower_leg: Option<EulerRotation>,
    #[serde(default)]
    pub left_upper_leg: Option<EulerRotation>,
    #[serde(default)]
    pub left_lower_leg: Option<EulerRotation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx_quat(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 0.9999
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        assert!(approx_quat(EulerRotation::ZERO.to_quat(1.0), Quat::IDENTITY));
    }

    #[test]
    fn test_dampener_scales_angles() {
        let rot = EulerRotation::new(0.0, 0.0, FRAC_PI_2);
        let q = rot.to_quat(0.5);
        assert!(approx_quat(q, Quat::from_rotation_z(FRAC_PI_2 * 0.5)));
    }

    #[test]
    fn test_xyz_is_intrinsic() {
        // three.js XYZ: q = qx * qy * qz
        let rot = EulerRotation::new(0.3, -0.4, 0.5);
        let expected =
            Quat::from_rotation_x(0.3) * Quat::from_rotation_y(-0.4) * Quat::from_rotation_z(0.5);
        assert!(approx_quat(rot.to_quat(1.0), expected));
    }

    #[test]
    fn test_zxy_order() {
        let rot = EulerRotation {
            x: 0.2,
            y: 0.7,
            z: -0.3,
            rotation_order: RotationOrder::ZXY,
        };
        let expected =
            Quat::from_rotation_z(-0.3) * Quat::from_rotation_x(0.2) * Quat::from_rotation_y(0.7);
        assert!(approx_quat(rot.to_quat(1.0), expected));
    }

    #[test]
    fn test_parse_solver_output() {
        let json = serde_json::json!({
            "Hips": {
                "position": {"x": 0.1, "y": -0.05, "z": 0.3},
                "worldPosition": {"x": 0.1, "y": 0.0, "z": 0.3},
                "rotation": {"x": 0.05, "y": 0.2, "z": 0.0}
            },
            "Spine": {"x": 0.1, "y": 0.0, "z": -0.1},
            "RightUpperArm": {"x": 0.0, "y": 0.0, "z": -1.2},
            "LeftUpperArm": {"x": 0.0, "y": 0.0, "z": 1.2},
            "RightLowerArm": {"x": 0.0, "y": 0.4, "z": 0.0},
            "LeftLowerArm": {"x": 0.0, "y": -0.4, "z": 0.0},
            "RightUpperLeg": {"x": -0.1, "y": 0.0, "z": 0.05, "rotationOrder": "XYZ"},
            "LeftHand": {"x": 0.0, "y": 0.3, "z": 0.1, "rotationOrder": "ZXY"}
        });

        let pose: RiggedPose = serde_json::from_value(json).unwrap();
        assert_eq!(pose.hips.position, Some(Vector3Value::new(0.1, -0.05, 0.3)));
        assert!(pose.hips.world_position.is_some());
        assert_eq!(pose.spine.unwrap().z, -0.1);
        assert_eq!(pose.right_upper_arm.unwrap().z, -1.2);
        assert_eq!(
            pose.left_hand.unwrap().rotation_order,
            RotationOrder::ZXY
        );
        // Not present in the packet
        assert!(pose.right_hand.is_none());
        assert!(pose.chest.is_none());
    }

    #[test]
    fn test_parse_empty_rig() {
        let pose: RiggedPose = serde_json::from_str("{}").unwrap();
        assert_eq!(pose, RiggedPose::default());
    }
}
