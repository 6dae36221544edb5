//! Verlet-based spring bone simulator for VRM secondary motion (hair, cloth, etc.).
//!
//! Verlet integration with stiffness, gravity, drag, a length constraint, and
//! sphere/capsule collision. Results are written straight into the avatar's
//! local node rotations.

use glam::{Mat4, Quat, Vec3};

use super::humanoid::LocalTransform;
use super::model::{ColliderShape, VrmModel};

/// Largest step the simulation accepts; longer frames are clamped.
pub const MAX_STEP: f32 = 0.05;

/// Synthesized tail length for a chain end with no child node.
const DEFAULT_TAIL_LENGTH: f32 = 0.07;

/// Runtime state for a single spring joint.
struct JointState {
    node: usize,
    /// Tail positions (world space)
    prev_tail: Vec3,
    current_tail: Vec3,
    bone_length: f32,
    /// Rest-pose direction to the tail in the joint's local space
    bone_axis: Vec3,
    stiffness: f32,
    gravity_power: f32,
    gravity_dir: Vec3,
    drag_force: f32,
    hit_radius: f32,
}

struct ChainState {
    joints: Vec<JointState>,
    collider_groups: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WorldCollider {
    Sphere { center: Vec3, radius: f32 },
    Capsule { start: Vec3, end: Vec3, radius: f32 },
}

/// Spring bone physics simulator.
pub struct SpringBoneSimulator {
    chains: Vec<ChainState>,
}

impl SpringBoneSimulator {
    /// Build the simulator from a model and its current world transforms.
    /// Returns `None` if the model has no usable spring chains.
    pub fn new(model: &VrmModel, world: &[Mat4]) -> Option<Self> {
        let rest_world = super::skinning::rest_world_transforms(model);

        let mut chains = Vec::new();
        for chain in &model.spring_chains {
            let mut joints = Vec::new();

            for (i, joint) in chain.joints.iter().enumerate() {
                if joint.node >= model.node_count {
                    tracing::warn!("Spring chain '{}' references missing node {}", chain.name, joint.node);
                    continue;
                }
                let child = match chain.joints.get(i + 1) {
                    Some(next) if next.node < model.node_count => Some(next.node),
                    _ => model.children(joint.node).next(),
                };
                let Some((bone_length, bone_axis)) = tail_axis(model, &rest_world, joint.node, child)
                else {
                    continue;
                };

                let tail = tail_position(&world[joint.node], bone_axis, bone_length);
                joints.push(JointState {
                    node: joint.node,
                    prev_tail: tail,
                    current_tail: tail,
                    bone_length,
                    bone_axis,
                    stiffness: joint.stiffness,
                    gravity_power: joint.gravity_power,
                    gravity_dir: joint.gravity_dir,
                    drag_force: joint.drag_force,
                    hit_radius: joint.hit_radius,
                });
            }

            if !joints.is_empty() {
                chains.push(ChainState {
                    joints,
                    collider_groups: chain.collider_groups.clone(),
                });
            }
        }

        if chains.is_empty() {
            return None;
        }

        tracing::info!(
            "Spring bone simulator: {} chains, {} colliders",
            chains.len(),
            model.spring_colliders.len()
        );

        Some(Self { chains })
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Spring joint rotations are written into `locals`, and `world` is kept in
    /// sync for the joints themselves. Descendants that are not spring joints
    /// need a fresh forward-kinematics pass afterwards.
    pub fn step(
        &mut self,
        model: &VrmModel,
        locals: &mut [LocalTransform],
        world: &mut [Mat4],
        dt: f32,
        gravity_scale: f32,
    ) {
        let dt = dt.min(MAX_STEP);
        if dt < 1e-6 {
            return;
        }

        let colliders = resolve_colliders(model, world);

        for chain in &mut self.chains {
            let chain_colliders: Vec<WorldCollider> = chain
                .collider_groups
                .iter()
                .filter_map(|&gi| model.collider_groups.get(gi))
                .flat_map(|indices| indices.iter())
                .filter_map(|&ci| colliders.get(ci).copied())
                .collect();

            for joint in &mut chain.joints {
                let parent_world = model.parents[joint.node]
                    .map(|p| world[p])
                    .unwrap_or(Mat4::IDENTITY);
                // Pick up motion from spring joints earlier in the chain
                world[joint.node] = parent_world * locals[joint.node].to_mat4();

                let world_pos = world[joint.node].col(3).truncate();
                let parent_rot = quat_from_mat4(&parent_world);
                let rest_local_rot = model.rest_rotations[joint.node];
                let rest_dir = (parent_rot * rest_local_rot * joint.bone_axis).normalize_or_zero();

                let inertia = (joint.current_tail - joint.prev_tail) * (1.0 - joint.drag_force);
                let stiffness = dt * rest_dir * joint.stiffness;
                let gravity = dt * joint.gravity_dir * joint.gravity_power * gravity_scale;

                let mut next_tail = joint.current_tail + inertia + stiffness + gravity;
                next_tail = apply_length_constraint(next_tail, world_pos, joint.bone_length, rest_dir);

                // Several passes for deep interpenetration
                for _ in 0..3 {
                    let mut moved = false;
                    for collider in &chain_colliders {
                        let resolved = resolve_collision(
                            next_tail,
                            joint.hit_radius,
                            collider,
                            world_pos,
                            joint.bone_length,
                        );
                        if resolved != next_tail {
                            next_tail = resolved;
                            moved = true;
                        }
                    }
                    if !moved {
                        break;
                    }
                }

                joint.prev_tail = joint.current_tail;
                joint.current_tail = next_tail;

                let current_dir = (next_tail - world_pos).normalize_or_zero();
                if current_dir.length_squared() > 0.5 && rest_dir.length_squared() > 0.5 {
                    let world_delta = Quat::from_rotation_arc(rest_dir, current_dir);
                    let local_rot =
                        (parent_rot.inverse() * world_delta * parent_rot * rest_local_rot).normalize();
                    locals[joint.node].rotation = local_rot;
                    world[joint.node] = parent_world * locals[joint.node].to_mat4();
                }
            }
        }
    }

    /// Put every tail back where `world` says it hangs at rest.
    pub fn reset(&mut self, world: &[Mat4]) {
        for chain in &mut self.chains {
            for joint in &mut chain.joints {
                let tail = tail_position(&world[joint.node], joint.bone_axis, joint.bone_length);
                joint.prev_tail = tail;
                joint.current_tail = tail;
            }
        }
    }
}

/// Bone length and local tail axis for `node`, from its child or by extending
/// the parent→node direction.
fn tail_axis(
    model: &VrmModel,
    rest_world: &[Mat4],
    node: usize,
    child: Option<usize>,
) -> Option<(f32, Vec3)> {
    let node_pos = rest_world[node].col(3).truncate();
    let node_rot = quat_from_mat4(&rest_world[node]);

    if let Some(child) = child {
        let dir = rest_world[child].col(3).truncate() - node_pos;
        let length = dir.length();
        if length > 1e-6 {
            return Some((length, node_rot.inverse() * (dir / length)));
        }
    }

    let parent = model.parents[node]?;
    let dir = (node_pos - rest_world[parent].col(3).truncate()).normalize_or_zero();
    if dir.length_squared() < 0.5 {
        return None;
    }
    Some((DEFAULT_TAIL_LENGTH, node_rot.inverse() * dir))
}

fn tail_position(joint_world: &Mat4, bone_axis: Vec3, bone_length: f32) -> Vec3 {
    joint_world.col(3).truncate() + quat_from_mat4(joint_world) * bone_axis * bone_length
}

fn resolve_colliders(model: &VrmModel, world: &[Mat4]) -> Vec<WorldCollider> {
    model
        .spring_colliders
        .iter()
        .map(|c| {
            let m = world.get(c.node).copied().unwrap_or(Mat4::IDENTITY);
            match c.shape {
                ColliderShape::Sphere { offset, radius } => WorldCollider::Sphere {
                    center: m.transform_point3(offset),
                    radius,
                },
                ColliderShape::Capsule { offset, tail, radius } => WorldCollider::Capsule {
                    start: m.transform_point3(offset),
                    end: m.transform_point3(tail),
                    radius,
                },
            }
        })
        .collect()
}

/// Constrain `tail` to be exactly `bone_length` from `world_pos`.
fn apply_length_constraint(tail: Vec3, world_pos: Vec3, bone_length: f32, fallback_dir: Vec3) -> Vec3 {
    let to_tail = tail - world_pos;
    let dist = to_tail.length();
    if dist > 1e-6 {
        world_pos + (to_tail / dist) * bone_length
    } else {
        world_pos + fallback_dir * bone_length
    }
}

/// Push a tail out of a collider, then restore the bone length.
fn resolve_collision(
    tail: Vec3,
    hit_radius: f32,
    collider: &WorldCollider,
    world_pos: Vec3,
    bone_length: f32,
) -> Vec3 {
    let (closest, radius) = match *collider {
        WorldCollider::Sphere { center, radius } => (center, radius),
        WorldCollider::Capsule { start, end, radius } => {
            let seg = end - start;
            let seg_len_sq = seg.length_squared();
            let t = if seg_len_sq < 1e-10 {
                0.0
            } else {
                ((tail - start).dot(seg) / seg_len_sq).clamp(0.0, 1.0)
            };
            (start + seg * t, radius)
        }
    };

    let diff = tail - closest;
    let dist = diff.length();
    let min_dist = radius + hit_radius;
    if dist >= min_dist || dist <= 1e-6 {
        return tail;
    }

    let pushed = closest + (diff / dist) * min_dist;
    let to_pushed = pushed - world_pos;
    let d = to_pushed.length();
    if d > 1e-6 {
        world_pos + (to_pushed / d) * bone_length
    } else {
        tail
    }
}

/// Extract the rotation of a transform matrix.
fn quat_from_mat4(m: &Mat4) -> Quat {
    let (_, rotation, _) = m.to_scale_rotation_translation();
    rotation.normalize()
}
