//! VRM humanoid bone schema.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! humanoid_bones {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A bone of the VRM humanoid schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HumanoidBone {
            $($variant),+
        }

        impl HumanoidBone {
            /// Every humanoid bone, in schema order.
            pub const ALL: &'static [HumanoidBone] = &[$(HumanoidBone::$variant),+];

            /// VRM 1.0 (camelCase) bone name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(HumanoidBone::$variant => $name),+
                }
            }

            /// VRM 0.x style (PascalCase) bone name.
            pub fn pascal_name(&self) -> &'static str {
                match self {
                    $(HumanoidBone::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

humanoid_bones! {
    Hips => "hips",
    Spine => "spine",
    Chest => "chest",
    UpperChest => "upperChest",
    Neck => "neck",
    Head => "head",
    LeftEye => "leftEye",
    RightEye => "rightEye",
    Jaw => "jaw",
    LeftUpperLeg => "leftUpperLeg",
    LeftLowerLeg => "leftLowerLeg",
    LeftFoot => "leftFoot",
    LeftToes => "leftToes",
    RightUpperLeg => "rightUpperLeg",
    RightLowerLeg => "rightLowerLeg",
    RightFoot => "rightFoot",
    RightToes => "rightToes",
    LeftShoulder => "leftShoulder",
    LeftUpperArm => "leftUpperArm",
    LeftLowerArm => "leftLowerArm",
    LeftHand => "leftHand",
    RightShoulder => "rightShoulder",
    RightUpperArm => "rightUpperArm",
    RightLowerArm => "rightLowerArm",
    RightHand => "rightHand",
    LeftThumbMetacarpal => "leftThumbMetacarpal",
    LeftThumbProximal => "leftThumbProximal",
    LeftThumbDistal => "leftThumbDistal",
    LeftIndexProximal => "leftIndexProximal",
    LeftIndexIntermediate => "leftIndexIntermediate",
    LeftIndexDistal => "leftIndexDistal",
    LeftMiddleProximal => "leftMiddleProximal",
    LeftMiddleIntermediate => "leftMiddleIntermediate",
    LeftMiddleDistal => "leftMiddleDistal",
    LeftRingProximal => "leftRingProximal",
    LeftRingIntermediate => "leftRingIntermediate",
    LeftRingDistal => "leftRingDistal",
    LeftLittleProximal => "leftLittleProximal",
    LeftLittleIntermediate => "leftLittleIntermediate",
    LeftLittleDistal => "leftLittleDistal",
    RightThumbMetacarpal => "rightThumbMetacarpal",
    RightThumbProximal => "rightThumbProximal",
    RightThumbDistal => "rightThumbDistal",
    RightIndexProximal => "rightIndexProximal",
    RightIndexIntermediate => "rightIndexIntermediate",
    RightIndexDistal => "rightIndexDistal",
    RightMiddleProximal => "rightMiddleProximal",
    RightMiddleIntermediate => "rightMiddleIntermediate",
    RightMiddleDistal => "rightMiddleDistal",
    RightRingProximal => "rightRingProximal",
    RightRingIntermediate => "rightRingIntermediate",
    RightRingDistal => "rightRingDistal",
    RightLittleProximal => "rightLittleProximal",
    RightLittleIntermediate => "rightLittleIntermediate",
    RightLittleDistal => "rightLittleDistal",
}

impl HumanoidBone {
    /// Look up a bone by VRM 1.0 (camelCase) or PascalCase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == name || b.pascal_name() == name)
    }

    /// Look up a bone by VRM 0.x name.
    ///
    /// VRM 0.x thumbs are `thumbProximal/Intermediate/Distal`; they map onto the
    /// 1.0 `thumbMetacarpal/Proximal/Distal` chain.
    pub fn from_vrm0_name(name: &str) -> Option<Self> {
        let mut lower = String::with_capacity(name.len());
        for (i, c) in name.chars().enumerate() {
            if i == 0 {
                lower.extend(c.to_lowercase());
            } else {
                lower.push(c);
            }
        }
        match lower.as_str() {
            "leftThumbProximal" => Some(Self::LeftThumbMetacarpal),
            "leftThumbIntermediate" => Some(Self::LeftThumbProximal),
            "rightThumbProximal" => Some(Self::RightThumbMetacarpal),
            "rightThumbIntermediate" => Some(Self::RightThumbProximal),
            other => Self::from_name(other),
        }
    }
}

impl fmt::Display for HumanoidBone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HumanoidBone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.pascal_name())
    }
}

impl<'de> Deserialize<'de> for HumanoidBone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown humanoid bone: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_bones_count() {
        assert_eq!(HumanoidBone::ALL.len(), 55);
    }

    #[test]
    fn test_from_name_both_cases() {
        assert_eq!(
            HumanoidBone::from_name("leftUpperArm"),
            Some(HumanoidBone::LeftUpperArm)
        );
        assert_eq!(
            HumanoidBone::from_name("LeftUpperArm"),
            Some(HumanoidBone::LeftUpperArm)
        );
        assert_eq!(HumanoidBone::from_name("hips"), Some(HumanoidBone::Hips));
        assert_eq!(HumanoidBone::from_name("tail"), None);
    }

    #[test]
    fn test_vrm0_thumb_mapping() {
        assert_eq!(
            HumanoidBone::from_vrm0_name("leftThumbIntermediate"),
            Some(HumanoidBone::LeftThumbProximal)
        );
        assert_eq!(
            HumanoidBone::from_vrm0_name("RightThumbProximal"),
            Some(HumanoidBone::RightThumbMetacarpal)
        );
        assert_eq!(
            HumanoidBone::from_vrm0_name("LeftUpperArm"),
            Some(HumanoidBone::LeftUpperArm)
        );
        // 0.x "thumbProximal" is the first thumb bone, i.e. the 1.0 metacarpal
        assert_eq!(
            HumanoidBone::from_vrm0_name("leftThumbProximal"),
            Some(HumanoidBone::LeftThumbMetacarpal)
        );
        assert_eq!(HumanoidBone::from_vrm0_name("spine"), Some(HumanoidBone::Spine));
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<&str> = HumanoidBone::ALL.iter().map(|b| b.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), HumanoidBone::ALL.len());
    }

    #[test]
    fn test_serde_round_trip_name() {
        let json = serde_json::to_string(&HumanoidBone::RightLowerLeg).unwrap();
        assert_eq!(json, "\"RightLowerLeg\"");
        let bone: HumanoidBone = serde_json::from_str("\"rightLowerLeg\"").unwrap();
        assert_eq!(bone, HumanoidBone::RightLowerLeg);
    }
}
