//! The live avatar: a loaded model plus its current node pose.

use glam::{Mat4, Quat, Vec3};
use std::f32::consts::PI;
use std::sync::Arc;

use super::model::{VrmModel, VrmVersion};
use super::skinning;
use super::spring_bone::SpringBoneSimulator;
use crate::config::AvatarConfig;
use crate::error::AvatarError;
use crate::rig::bones::HumanoidBone;

/// Local TRS of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl LocalTransform {
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A posable VRM avatar.
pub struct Avatar {
    model: Arc<VrmModel>,
    pose: Vec<LocalTransform>,
    world: Vec<Mat4>,
    root: Mat4,
    springs: Option<SpringBoneSimulator>,
    gravity_scale: f32,
}

impl Avatar {
    /// Load the configured model and prepare it for posing.
    pub fn load(config: &AvatarConfig) -> Result<Self, AvatarError> {
        let mut model = VrmModel::load(&config.model_path)?;
        if model.bone_node(HumanoidBone::Hips).is_none() {
            return Err(AvatarError::MissingBone(HumanoidBone::Hips.to_string()));
        }
        if config.remove_unnecessary_joints {
            model.remove_unnecessary_joints();
        }

        tracing::info!(
            "Loaded {} ({:?}): {} nodes, {} humanoid bones, {} triangles, {} spring chains",
            config.model_path.display(),
            model.version,
            model.node_count,
            model.humanoid.len(),
            model.triangle_count(),
            model.spring_chains.len()
        );

        Ok(Self::new(Arc::new(model), config))
    }

    pub fn new(model: Arc<VrmModel>, config: &AvatarConfig) -> Self {
        // 0.x models face -Z; 1.0 models already face the camera on +Z
        let root = if config.face_camera && model.version == VrmVersion::V0 {
            Mat4::from_quat(Quat::from_rotation_y(PI))
        } else {
            Mat4::IDENTITY
        };
        let pose = skinning::rest_pose(&model);
        let world = skinning::compute_world_transforms(&model, &pose, root);
        let springs = if config.spring_bones {
            SpringBoneSimulator::new(&model, &world)
        } else {
            None
        };

        Self {
            model,
            pose,
            world,
            root,
            springs,
            gravity_scale: config.gravity_scale,
        }
    }

    pub fn model(&self) -> &VrmModel {
        &self.model
    }

    pub fn version(&self) -> VrmVersion {
        self.model.version
    }

    pub fn has_bone(&self, bone: HumanoidBone) -> bool {
        self.model.bone_node(bone).is_some()
    }

    /// Local transform of a humanoid bone, `None` when the model lacks it.
    pub fn bone(&self, bone: HumanoidBone) -> Option<&LocalTransform> {
        self.model.bone_node(bone).and_then(|n| self.pose.get(n))
    }

    pub fn bone_mut(&mut self, bone: HumanoidBone) -> Option<&mut LocalTransform> {
        let node = self.model.bone_node(bone)?;
        self.pose.get_mut(node)
    }

    /// World-space position of a bone as of the last `update`.
    pub fn bone_world_position(&self, bone: HumanoidBone) -> Option<Vec3> {
        let node = self.model.bone_node(bone)?;
        self.world.get(node).map(|m| m.col(3).truncate())
    }

    /// Advance secondary motion by `dt` seconds and refresh world transforms.
    pub fn update(&mut self, dt: f32) {
        self.world = skinning::compute_world_transforms(&self.model, &self.pose, self.root);
        if let Some(springs) = &mut self.springs {
            springs.step(
                &self.model,
                &mut self.pose,
                &mut self.world,
                dt,
                self.gravity_scale,
            );
            self.world = skinning::compute_world_transforms(&self.model, &self.pose, self.root);
        }
    }

    /// Skinned positions per mesh, per primitive, from the last `update`.
    pub fn skinned_meshes(&self) -> Vec<Vec<Vec<Vec3>>> {
        (0..self.model.meshes.len())
            .map(|mesh_idx| skinning::skin_vertices(&self.model, mesh_idx, &self.world))
            .collect()
    }

    /// Return every node to its rest transform.
    pub fn reset_pose(&mut self) {
        self.pose = skinning::rest_pose(&self.model);
        self.world = skinning::compute_world_transforms(&self.model, &self.pose, self.root);
        if let Some(springs) = &mut self.springs {
            springs.reset(&self.world);
        }
    }

    /// Simulated spring chains; 0 when spring bones are off.
    pub fn spring_chain_count(&self) -> usize {
        self.springs.as_ref().map_or(0, SpringBoneSimulator::chain_count)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_avatar;
    use super::*;
    use crate::avatar::model::test_support::humanoid_model;

    #[test]
    fn test_bone_lookup() {
        let avatar = test_avatar();
        assert!(avatar.has_bone(HumanoidBone::Hips));
        assert_eq!(
            avatar.bone(HumanoidBone::Hips).map(|t| t.translation),
            Some(Vec3::new(0.0, 1.0, 0.0))
        );
        // Not mapped in the synthetic model
        assert!(avatar.bone(HumanoidBone::UpperChest).is_none());
        assert!(!avatar.has_bone(HumanoidBone::LeftFoot));
    }

    #[test]
    fn test_bone_mut_then_update() {
        let mut avatar = test_avatar();
        avatar.bone_mut(HumanoidBone::Hips).unwrap().translation = Vec3::new(0.0, 2.0, 0.0);
        avatar.update(1.0 / 60.0);
        let head = avatar.bone_world_position(HumanoidBone::Head).unwrap();
        assert!((head.y - 2.55).abs() < 1e-5);
    }

    #[test]
    fn test_face_camera_rotates_root() {
        let config = AvatarConfig {
            spring_bones: false,
            ..AvatarConfig::default()
        };
        let mut avatar = Avatar::new(Arc::new(humanoid_model()), &config);
        avatar.update(0.0);
        let hand = avatar.bone_world_position(HumanoidBone::LeftHand).unwrap();
        assert!(hand.x < 0.0);
    }

    #[test]
    fn test_vrm1_model_not_flipped() {
        let mut model = humanoid_model();
        model.version = VrmVersion::V1;
        let config = AvatarConfig {
            spring_bones: false,
            ..AvatarConfig::default()
        };
        let mut avatar = Avatar::new(Arc::new(model), &config);
        avatar.update(0.0);
        assert_eq!(avatar.version(), VrmVersion::V1);
        let hand = avatar.bone_world_position(HumanoidBone::LeftHand).unwrap();
        assert!((hand - Vec3::new(0.65, 1.4, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_reset_pose() {
        let mut avatar = test_avatar();
        avatar.bone_mut(HumanoidBone::Spine).unwrap().rotation = Quat::from_rotation_x(1.0);
        avatar.reset_pose();
        assert_eq!(
            avatar.bone(HumanoidBone::Spine).unwrap().rotation,
            Quat::IDENTITY
        );
    }

    #[test]
    fn test_skinned_meshes_shape() {
        let mut avatar = test_avatar();
        avatar.update(1.0 / 60.0);
        let meshes = avatar.skinned_meshes();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0][0].len(), 3);
    }

    #[test]
    fn test_springs_enabled_from_config() {
        let avatar = Avatar::new(Arc::new(humanoid_model()), &AvatarConfig::default());
        assert_eq!(avatar.spring_chain_count(), 1);
        assert_eq!(test_avatar().spring_chain_count(), 0);
    }

    #[test]
    fn test_load_missing_model() {
        let config = AvatarConfig {
            model_path: "models/missing.vrm".into(),
            ..AvatarConfig::default()
        };
        assert!(matches!(Avatar::load(&config), Err(AvatarError::Load(_))));
    }
}
