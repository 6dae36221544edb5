//! CPU skinning: forward kinematics over the current node pose and linear
//! blend skinning (LBS) of mesh positions.

use glam::{Mat4, Vec3, Vec4};

use super::humanoid::LocalTransform;
use super::model::VrmModel;

/// Rest-pose local transforms for every node.
pub fn rest_pose(model: &VrmModel) -> Vec<LocalTransform> {
    (0..model.node_count)
        .map(|i| LocalTransform {
            translation: model.rest_translations[i],
            rotation: model.rest_rotations[i],
            scale: model.rest_scales[i],
        })
        .collect()
}

/// World transforms of the rest pose with no root transform.
pub fn rest_world_transforms(model: &VrmModel) -> Vec<Mat4> {
    compute_world_transforms(model, &rest_pose(model), Mat4::IDENTITY)
}

/// Compute world transforms for all nodes using forward kinematics.
///
/// `root` is applied above every parentless node.
pub fn compute_world_transforms(
    model: &VrmModel,
    locals: &[LocalTransform],
    root: Mat4,
) -> Vec<Mat4> {
    let mut world = vec![Mat4::IDENTITY; model.node_count];
    let mut computed = vec![false; model.node_count];

    for i in 0..model.node_count {
        compute_node(model, locals, root, &mut world, &mut computed, i);
    }

    world
}

fn compute_node(
    model: &VrmModel,
    locals: &[LocalTransform],
    root: Mat4,
    world: &mut [Mat4],
    computed: &mut [bool],
    idx: usize,
) {
    if computed[idx] {
        return;
    }

    let local = locals
        .get(idx)
        .map(LocalTransform::to_mat4)
        .unwrap_or(Mat4::IDENTITY);

    match model.parents[idx] {
        Some(parent) => {
            compute_node(model, locals, root, world, computed, parent);
            world[idx] = world[parent] * local;
        }
        None => world[idx] = root * local,
    }
    computed[idx] = true;
}

/// Skin one mesh against `world_transforms`.
///
/// Meshes without a skin are placed by their node's world transform.
/// Returns positions per primitive.
pub fn skin_vertices(model: &VrmModel, mesh_idx: usize, world_transforms: &[Mat4]) -> Vec<Vec<Vec3>> {
    let mesh = &model.meshes[mesh_idx];

    let skin = match model.mesh_skin.get(&mesh_idx).and_then(|&s| model.skins.get(s)) {
        Some(skin) => skin,
        None => {
            let node_world = model
                .mesh_node
                .get(&mesh_idx)
                .and_then(|&n| world_transforms.get(n))
                .copied()
                .unwrap_or(Mat4::IDENTITY);
            return mesh
                .primitives
                .iter()
                .map(|p| {
                    p.positions
                        .iter()
                        .map(|v| node_world.transform_point3(*v))
                        .collect()
                })
                .collect();
        }
    };

    // Joint matrices: world[joint_node] * inverse_bind_matrix
    let joint_matrices: Vec<Mat4> = skin
        .joints
        .iter()
        .zip(skin.inverse_bind_matrices.iter())
        .map(|(&node_idx, ibm)| world_transforms[node_idx] * *ibm)
        .collect();

    mesh.primitives
        .iter()
        .map(|prim| {
            prim.positions
                .iter()
                .enumerate()
                .map(|(v_idx, pos)| {
                    let j = prim.joints[v_idx];
                    let w = prim.weights[v_idx];
                    let p = Vec4::new(pos.x, pos.y, pos.z, 1.0);

                    let mut skinned = Vec4::ZERO;
                    for k in 0..4 {
                        if w[k] < 0.0001 {
                            continue;
                        }
                        if let Some(jm) = joint_matrices.get(j[k] as usize) {
                            skinned += w[k] * (*jm * p);
                        }
                    }
                    skinned.truncate()
                })
                .collect()
        })
        .collect()
}
