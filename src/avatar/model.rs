//! VRM model loading on top of the `gltf` crate.
//!
//! The glTF document supplies geometry, skins and the node hierarchy. VRM data
//! (humanoid bone map, spring bones) lives in extensions the `gltf` crate does
//! not model, so it is read from the raw JSON chunk.

use glam::{Mat4, Quat, Vec3};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::AvatarError;
use crate::rig::bones::HumanoidBone;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;

/// VRM schema generation. It fixes which way the model faces at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VrmVersion {
    /// `VRM` extension, facing -Z
    #[default]
    V0,
    /// `VRMC_vrm` extension, facing +Z
    V1,
}

/// A loaded VRM model.
pub struct VrmModel {
    pub version: VrmVersion,
    pub meshes: Vec<MeshData>,
    /// Node index → rest-pose local transform
    pub rest_translations: Vec<Vec3>,
    pub rest_rotations: Vec<Quat>,
    pub rest_scales: Vec<Vec3>,
    /// Child node → parent node (None if root)
    pub parents: Vec<Option<usize>>,
    pub node_count: usize,
    pub skins: Vec<SkinData>,
    /// mesh index → skin index
    pub mesh_skin: HashMap<usize, usize>,
    /// mesh index → node that instantiates it
    pub mesh_node: HashMap<usize, usize>,
    /// Humanoid bone → node index
    pub humanoid: HashMap<HumanoidBone, usize>,
    pub spring_chains: Vec<SpringChain>,
    pub spring_colliders: Vec<SpringCollider>,
    pub collider_groups: Vec<Vec<usize>>,
}

pub struct SkinData {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

pub struct MeshData {
    pub primitives: Vec<PrimitiveData>,
}

/// Geometry for a single triangle-list primitive.
pub struct PrimitiveData {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Per-vertex joint indices into the mesh's skin (4 per vertex)
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    /// Linear RGBA: material base colour times the texel under the vertex UV
    pub colors: Vec<[f32; 4]>,
}

/// A spring bone chain, root first.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringChain {
    pub name: String,
    pub joints: Vec<SpringJoint>,
    pub collider_groups: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringJoint {
    pub node: usize,
    pub hit_radius: f32,
    pub stiffness: f32,
    pub gravity_power: f32,
    pub gravity_dir: Vec3,
    pub drag_force: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringCollider {
    pub node: usize,
    pub shape: ColliderShape,
}

/// Collider geometry in the owning node's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Sphere { offset: Vec3, radius: f32 },
    Capsule { offset: Vec3, tail: Vec3, radius: f32 },
}

/// Spring bone data as read from the VRM extension.
#[derive(Debug, Default)]
pub struct SpringBoneData {
    pub chains: Vec<SpringChain>,
    pub colliders: Vec<SpringCollider>,
    pub groups: Vec<Vec<usize>>,
}

impl VrmModel {
    /// Load a VRM (GLB) file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AvatarError> {
        let path = path.as_ref();
        let (document, buffers, images) = gltf::import(path)
            .map_err(|e| AvatarError::Load(format!("{}: {}", path.display(), e)))?;

        let raw = std::fs::read(path)
            .map_err(|e| AvatarError::Load(format!("{}: {}", path.display(), e)))?;
        let root = read_gltf_json(&raw)?;

        let node_count = document.nodes().count();
        let mut parents = vec![None; node_count];
        for node in document.nodes() {
            for child in node.children() {
                parents[child.index()] = Some(node.index());
            }
        }

        let mut rest_translations = Vec::with_capacity(node_count);
        let mut rest_rotations = Vec::with_capacity(node_count);
        let mut rest_scales = Vec::with_capacity(node_count);
        for node in document.nodes() {
            let (t, r, s) = node.transform().decomposed();
            rest_translations.push(Vec3::from(t));
            rest_rotations.push(Quat::from_array(r));
            rest_scales.push(Vec3::from(s));
        }

        let (version, humanoid) = parse_humanoid(&root);
        if humanoid.is_empty() {
            tracing::warn!(
                "{} has no VRM humanoid extension; bones cannot be rigged",
                path.display()
            );
        }
        let springs = parse_spring_bones(&root);

        let mut skins = Vec::new();
        for skin in document.skins() {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
            let inverse_bind_matrices: Vec<Mat4> = reader
                .read_inverse_bind_matrices()
                .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);
            skins.push(SkinData {
                joints,
                inverse_bind_matrices,
            });
        }

        let mut mesh_skin = HashMap::new();
        let mut mesh_node = HashMap::new();
        for node in document.nodes() {
            if let Some(mesh) = node.mesh() {
                mesh_node.insert(mesh.index(), node.index());
                if let Some(skin) = node.skin() {
                    mesh_skin.insert(mesh.index(), skin.index());
                }
            }
        }

        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            let mut primitives = Vec::new();
            for prim in mesh.primitives() {
                if prim.mode() != gltf::mesh::Mode::Triangles {
                    continue;
                }
                let reader = prim.reader(|buffer| Some(&buffers[buffer.index()]));

                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_default();
                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|iter| iter.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());
                let joints: Vec<[u16; 4]> = reader
                    .read_joints(0)
                    .map(|iter| iter.into_u16().collect())
                    .unwrap_or_else(|| vec![[0; 4]; positions.len()]);
                let weights: Vec<[f32; 4]> = reader
                    .read_weights(0)
                    .map(|iter| iter.into_f32().collect())
                    .unwrap_or_else(|| vec![[1.0, 0.0, 0.0, 0.0]; positions.len()]);
                let uvs: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|iter| iter.into_f32().collect())
                    .unwrap_or_else(|| vec![[0.0; 2]; positions.len()]);

                let pbr = prim.material().pbr_metallic_roughness();
                let base_color = pbr.base_color_factor();
                let texture = pbr
                    .base_color_texture()
                    .and_then(|info| images.get(info.texture().source().index()));

                let colors = uvs
                    .iter()
                    .map(|uv| {
                        let texel = texture.map(|img| sample_texel(img, *uv)).unwrap_or([1.0; 4]);
                        [
                            base_color[0] * texel[0],
                            base_color[1] * texel[1],
                            base_color[2] * texel[2],
                            base_color[3] * texel[3],
                        ]
                    })
                    .collect();

                primitives.push(PrimitiveData {
                    positions,
                    indices,
                    joints,
                    weights,
                    colors,
                });
            }
            meshes.push(MeshData { primitives });
        }

        Ok(VrmModel {
            version,
            meshes,
            rest_translations,
            rest_rotations,
            rest_scales,
            parents,
            node_count,
            skins,
            mesh_skin,
            mesh_node,
            humanoid,
            spring_chains: springs.chains,
            spring_colliders: springs.colliders,
            collider_groups: springs.groups,
        })
    }

    /// Node index of a humanoid bone.
    pub fn bone_node(&self, bone: HumanoidBone) -> Option<usize> {
        self.humanoid.get(&bone).copied()
    }

    /// Direct children of a node.
    pub fn children(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(move |(_, p)| **p == Some(node))
            .map(|(i, _)| i)
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|m| m.primitives.iter())
            .map(|p| p.indices.len() / 3)
            .sum()
    }

    /// Compact every skin to the joints that actually carry vertex weight.
    ///
    /// Vertex joint indices are rewritten to the new, shorter joint lists.
    /// Returns the number of joints dropped across all skins.
    pub fn remove_unnecessary_joints(&mut self) -> usize {
        let mut removed = 0;

        for (skin_idx, skin) in self.skins.iter_mut().enumerate() {
            let meshes: Vec<usize> = self
                .mesh_skin
                .iter()
                .filter(|(_, &s)| s == skin_idx)
                .map(|(&m, _)| m)
                .collect();
            if meshes.is_empty() {
                continue;
            }

            let mut used = vec![false; skin.joints.len()];
            for &mesh_idx in &meshes {
                for prim in &self.meshes[mesh_idx].primitives {
                    for (j, w) in prim.joints.iter().zip(prim.weights.iter()) {
                        for k in 0..4 {
                            if w[k] > 0.0 {
                                if let Some(slot) = used.get_mut(j[k] as usize) {
                                    *slot = true;
                                }
                            }
                        }
                    }
                }
            }

            let mut remap = vec![0u16; skin.joints.len()];
            let mut joints = Vec::new();
            let mut ibms = Vec::new();
            for (old, keep) in used.iter().enumerate() {
                if *keep {
                    remap[old] = joints.len() as u16;
                    joints.push(skin.joints[old]);
                    ibms.push(
                        skin.inverse_bind_matrices
                            .get(old)
                            .copied()
                            .unwrap_or(Mat4::IDENTITY),
                    );
                }
            }

            removed += skin.joints.len() - joints.len();
            skin.joints = joints;
            skin.inverse_bind_matrices = ibms;

            for &mesh_idx in &meshes {
                for prim in &mut self.meshes[mesh_idx].primitives {
                    for (j, w) in prim.joints.iter_mut().zip(prim.weights.iter()) {
                        for k in 0..4 {
                            j[k] = if w[k] > 0.0 {
                                remap.get(j[k] as usize).copied().unwrap_or(0)
                            } else {
                                0
                            };
                        }
                    }
                }
            }
        }

        if removed > 0 {
            tracing::debug!("Removed {} unused skin joints", removed);
        }
        removed
    }
}

/// Extract the JSON document from GLB bytes, or parse the bytes as `.gltf` JSON.
pub fn read_gltf_json(data: &[u8]) -> Result<serde_json::Value, AvatarError> {
    if data.len() >= 4 && &data[0..4] == GLB_MAGIC {
        // Header: magic(4) + version(4) + length(4); chunk: length(4) + type(4) + data
        if data.len() < 20 {
            return Err(AvatarError::InvalidGlb("truncated header".to_string()));
        }
        let chunk_len = u32::from_le_bytes([data[12], data[13], data[14], data[15]]) as usize;
        let chunk_type = u32::from_le_bytes([data[16], data[17], data[18], data[19]]);
        if chunk_type != GLB_CHUNK_JSON {
            return Err(AvatarError::InvalidGlb(format!(
                "first chunk is 0x{:08X}, expected JSON",
                chunk_type
            )));
        }
        let json = data
            .get(20..20 + chunk_len)
            .ok_or_else(|| AvatarError::InvalidGlb("JSON chunk runs past end of file".to_string()))?;
        serde_json::from_slice(json).map_err(|e| AvatarError::Json(e.to_string()))
    } else {
        serde_json::from_slice(data).map_err(|e| AvatarError::Json(e.to_string()))
    }
}

/// Read the humanoid bone map and the schema it came from.
/// VRM 1.0 (`VRMC_vrm`) wins over VRM 0.x (`VRM`).
pub fn parse_humanoid(root: &serde_json::Value) -> (VrmVersion, HashMap<HumanoidBone, usize>) {
    let mut map = HashMap::new();
    let extensions = match root.get("extensions") {
        Some(e) => e,
        None => return (VrmVersion::V0, map),
    };

    if let Some(bones) = extensions
        .get("VRMC_vrm")
        .and_then(|v| v.get("humanoid"))
        .and_then(|h| h.get("humanBones"))
        .and_then(|b| b.as_object())
    {
        for (name, data) in bones {
            match (
                HumanoidBone::from_name(name),
                data.get("node").and_then(|n| n.as_u64()),
            ) {
                (Some(bone), Some(node)) => {
                    map.insert(bone, node as usize);
                }
                (None, _) => tracing::debug!("Ignoring unknown VRM 1.0 bone '{}'", name),
                _ => {}
            }
        }
    }

    if !map.is_empty() {
        return (VrmVersion::V1, map);
    }

    if let Some(bones) = extensions
        .get("VRM")
        .and_then(|v| v.get("humanoid"))
        .and_then(|h| h.get("humanBones"))
        .and_then(|b| b.as_array())
    {
        for entry in bones {
            let name = entry.get("bone").and_then(|b| b.as_str());
            let node = entry.get("node").and_then(|n| n.as_i64());
            if let (Some(name), Some(node)) = (name, node) {
                // 0.x writes -1 for unassigned optional bones
                if node < 0 {
                    continue;
                }
                match HumanoidBone::from_vrm0_name(name) {
                    Some(bone) => {
                        map.insert(bone, node as usize);
                    }
                    None => tracing::debug!("Ignoring unknown VRM 0.x bone '{}'", name),
                }
            }
        }
    }

    (VrmVersion::V0, map)
}

/// Read spring bones from `VRMC_springBone` (1.0) or `VRM.secondaryAnimation` (0.x).
pub fn parse_spring_bones(root: &serde_json::Value) -> SpringBoneData {
    let extensions = match root.get("extensions") {
        Some(e) => e,
        None => return SpringBoneData::default(),
    };

    if let Some(ext) = extensions.get("VRMC_springBone") {
        return parse_spring_bones_1_0(ext);
    }

    if let Some(secondary) = extensions
        .get("VRM")
        .and_then(|v| v.get("secondaryAnimation"))
    {
        return parse_spring_bones_0x(secondary, root.get("nodes"));
    }

    SpringBoneData::default()
}

fn parse_spring_bones_1_0(ext: &serde_json::Value) -> SpringBoneData {
    let mut data = SpringBoneData::default();

    for c in array(ext.get("colliders")) {
        let node = c.get("node").and_then(|n| n.as_u64()).unwrap_or(0) as usize;
        let shape = c.get("shape");
        let shape = if let Some(sphere) = shape.and_then(|s| s.get("sphere")) {
            ColliderShape::Sphere {
                offset: parse_vec3(sphere.get("offset")),
                radius: number(sphere.get("radius"), 0.0),
            }
        } else if let Some(capsule) = shape.and_then(|s| s.get("capsule")) {
            ColliderShape::Capsule {
                offset: parse_vec3(capsule.get("offset")),
                tail: parse_vec3(capsule.get("tail")),
                radius: number(capsule.get("radius"), 0.0),
            }
        } else {
            continue;
        };
        data.colliders.push(SpringCollider { node, shape });
    }

    for g in array(ext.get("colliderGroups")) {
        data.groups.push(indices(g.get("colliders")));
    }

    for spring in array(ext.get("springs")) {
        let joints: Vec<SpringJoint> = array(spring.get("joints"))
            .iter()
            .filter_map(|j| {
                let node = j.get("node").and_then(|n| n.as_u64())? as usize;
                Some(SpringJoint {
                    node,
                    hit_radius: number(j.get("hitRadius"), 0.0),
                    stiffness: number(j.get("stiffness"), 1.0),
                    gravity_power: number(j.get("gravityPower"), 0.0),
                    gravity_dir: j
                        .get("gravityDir")
                        .map(|v| parse_vec3(Some(v)))
                        .unwrap_or(Vec3::NEG_Y),
                    drag_force: number(j.get("dragForce"), 0.5),
                })
            })
            .collect();

        if !joints.is_empty() {
            data.chains.push(SpringChain {
                name: spring
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or("")
                    .to_string(),
                joints,
                collider_groups: indices(spring.get("colliderGroups")),
            });
        }
    }

    data
}

/// VRM 0.x lists chain *roots*; every descendant of a root is a spring joint.
/// Each root expands into one chain per branch, following the first child.
fn parse_spring_bones_0x(
    secondary: &serde_json::Value,
    nodes: Option<&serde_json::Value>,
) -> SpringBoneData {
    let mut data = SpringBoneData::default();

    for group in array(secondary.get("colliderGroups")) {
        let node = group.get("node").and_then(|n| n.as_u64()).unwrap_or(0) as usize;
        let mut members = Vec::new();
        for c in array(group.get("colliders")) {
            let offset = parse_vec3(c.get("offset"));
            members.push(data.colliders.len());
            data.colliders.push(SpringCollider {
                node,
                shape: ColliderShape::Sphere {
                    // 0.x offsets are authored in Unity's left-handed space
                    offset: Vec3::new(offset.x, offset.y, -offset.z),
                    radius: number(c.get("radius"), 0.0),
                },
            });
        }
        data.groups.push(members);
    }

    let children = |node: usize| -> Vec<usize> {
        nodes
            .and_then(|n| n.get(node))
            .map(|n| indices(n.get("children")))
            .unwrap_or_default()
    };

    for group in array(secondary.get("boneGroups")) {
        let comment = group.get("comment").and_then(|c| c.as_str()).unwrap_or("");
        // The 0.x schema spells it `stiffiness`
        let stiffness = number(group.get("stiffiness").or_else(|| group.get("stiffness")), 1.0);
        let gravity_power = number(group.get("gravityPower"), 0.0);
        let gravity_dir = group
            .get("gravityDir")
            .map(|v| parse_vec3(Some(v)))
            .unwrap_or(Vec3::NEG_Y);
        let drag_force = number(group.get("dragForce"), 0.4);
        let hit_radius = number(group.get("hitRadius"), 0.02);
        let collider_groups = indices(group.get("colliderGroups"));

        let joint = |node: usize| SpringJoint {
            node,
            hit_radius,
            stiffness,
            gravity_power,
            gravity_dir,
            drag_force,
        };

        let mut pending: Vec<usize> = indices(group.get("bones"));
        let mut visited = HashSet::new();
        while let Some(start) = pending.pop() {
            let mut chain = Vec::new();
            let mut current = Some(start);
            while let Some(node) = current {
                if !visited.insert(node) {
                    break;
                }
                chain.push(joint(node));
                let kids = children(node);
                current = kids.first().copied();
                pending.extend(kids.iter().skip(1).copied());
            }
            if !chain.is_empty() {
                data.chains.push(SpringChain {
                    name: comment.to_string(),
                    joints: chain,
                    collider_groups: collider_groups.clone(),
                });
            }
        }
    }

    data
}

fn array(value: Option<&serde_json::Value>) -> &[serde_json::Value] {
    value
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

fn indices(value: Option<&serde_json::Value>) -> Vec<usize> {
    array(value)
        .iter()
        .filter_map(|v| v.as_u64().map(|n| n as usize))
        .collect()
}

fn number(value: Option<&serde_json::Value>, default: f32) -> f32 {
    value.and_then(|v| v.as_f64()).map(|v| v as f32).unwrap_or(default)
}

/// Vec3 from `[x, y, z]` (1.0) or `{"x":..,"y":..,"z":..}` (0.x).
fn parse_vec3(value: Option<&serde_json::Value>) -> Vec3 {
    match value {
        Some(serde_json::Value::Array(arr)) => Vec3::new(
            number(arr.first(), 0.0),
            number(arr.get(1), 0.0),
            number(arr.get(2), 0.0),
        ),
        Some(v) => Vec3::new(
            number(v.get("x"), 0.0),
            number(v.get("y"), 0.0),
            number(v.get("z"), 0.0),
        ),
        None => Vec3::ZERO,
    }
}

static WHITE_TEXEL: [u8; 4] = [255; 4];

/// Nearest-texel lookup with wrapping UVs. Returns RGBA in 0..1.
fn sample_texel(img: &gltf::image::Data, uv: [f32; 2]) -> [f32; 4] {
    if img.width == 0 || img.height == 0 {
        return [1.0; 4];
    }
    let u = uv[0] - uv[0].floor();
    let v = uv[1] - uv[1].floor();
    let x = ((u * img.width as f32) as u32).min(img.width - 1) as usize;
    let y = ((v * img.height as f32) as u32).min(img.height - 1) as usize;
    let idx = y * img.width as usize + x;
    let to_f = |c: u8| c as f32 / 255.0;

    match img.format {
        gltf::image::Format::R8G8B8A8 => {
            let p = texel(&img.pixels, idx, 4);
            [to_f(p[0]), to_f(p[1]), to_f(p[2]), to_f(p[3])]
        }
        gltf::image::Format::R8G8B8 => {
            let p = texel(&img.pixels, idx, 3);
            [to_f(p[0]), to_f(p[1]), to_f(p[2]), 1.0]
        }
        gltf::image::Format::R8G8 => {
            let p = texel(&img.pixels, idx, 2);
            [to_f(p[0]), to_f(p[1]), 0.0, 1.0]
        }
        gltf::image::Format::R8 => {
            let p = texel(&img.pixels, idx, 1);
            [to_f(p[0]), to_f(p[0]), to_f(p[0]), 1.0]
        }
        _ => [1.0; 4],
    }
}

/// Bytes of pixel `idx`; white when the image data is short.
fn texel(pixels: &[u8], idx: usize, channels: usize) -> &[u8] {
    let start = idx * channels;
    pixels
        .get(start..start + channels)
        .unwrap_or(&WHITE_TEXEL[..channels])
}


#[cfg(test)]
mod tests {
    use super::*;

    fn glb_with_json(json: &serde_json::Value) -> Vec<u8> {
        let mut body = serde_json::to_vec(json).unwrap();
        while body.len() % 4 != 0 {
            body.push(b' ');
        }
        let total = 12 + 8 + body.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn test_read_glb_json() {
        let json = serde_json::json!({"asset": {"version": "2.0"}});
        let glb = glb_with_json(&json);
        let parsed = read_gltf_json(&glb).unwrap();
        assert_eq!(parsed["asset"]["version"], "2.0");
    }

    #[test]
    fn test_read_plain_gltf_json() {
        let parsed = read_gltf_json(br#"{"asset":{"version":"2.0"}}"#).unwrap();
        assert_eq!(parsed["asset"]["version"], "2.0");
    }

    #[test]
    fn test_read_truncated_glb() {
        let result = read_gltf_json(b"glTF\x02\x00\x00\x00");
        assert!(matches!(result, Err(AvatarError::InvalidGlb(_))));
    }

    #[test]
    fn test_read_glb_chunk_overrun() {
        let mut glb = glb_with_json(&serde_json::json!({}));
        // Claim a JSON chunk far longer than the file
        glb[12..16].copy_from_slice(&10_000u32.to_le_bytes());
        assert!(matches!(read_gltf_json(&glb), Err(AvatarError::InvalidGlb(_))));
    }

    #[test]
    fn test_parse_humanoid_vrm1() {
        let root = serde_json::json!({
            "extensions": {
                "VRMC_vrm": {
                    "humanoid": {
                        "humanBones": {
                            "hips": {"node": 3},
                            "leftUpperArm": {"node": 10},
                            "leftThumbMetacarpal": {"node": 20},
                            "notABone": {"node": 99}
                        }
                    }
                }
            }
        });
        let (version, map) = parse_humanoid(&root);
        assert_eq!(version, VrmVersion::V1);
        assert_eq!(map.len(), 3);
        assert_eq!(map[&HumanoidBone::Hips], 3);
        assert_eq!(map[&HumanoidBone::LeftUpperArm], 10);
        assert_eq!(map[&HumanoidBone::LeftThumbMetacarpal], 20);
    }

    #[test]
    fn test_parse_humanoid_vrm0() {
        let root = serde_json::json!({
            "extensions": {
                "VRM": {
                    "humanoid": {
                        "humanBones": [
                            {"bone": "hips", "node": 1},
                            {"bone": "spine", "node": 2},
                            {"bone": "leftThumbProximal", "node": 30},
                            {"bone": "upperChest", "node": -1}
                        ]
                    }
                }
            }
        });
        let (version, map) = parse_humanoid(&root);
        assert_eq!(version, VrmVersion::V0);
        assert_eq!(map[&HumanoidBone::Hips], 1);
        assert_eq!(map[&HumanoidBone::Spine], 2);
        assert_eq!(map[&HumanoidBone::LeftThumbMetacarpal], 30);
        assert!(!map.contains_key(&HumanoidBone::UpperChest));
    }

    #[test]
    fn test_parse_humanoid_missing() {
        let root = serde_json::json!({"asset": {"version": "2.0"}});
        let (version, map) = parse_humanoid(&root);
        assert_eq!(version, VrmVersion::V0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_humanoid_empty_vrm1_falls_back_to_vrm0() {
        let root = serde_json::json!({
            "extensions": {
                "VRMC_vrm": {"humanoid": {"humanBones": {}}},
                "VRM": {"humanoid": {"humanBones": [{"bone": "hips", "node": 0}]}}
            }
        });
        let (version, map) = parse_humanoid(&root);
        assert_eq!(version, VrmVersion::V0);
        assert_eq!(map[&HumanoidBone::Hips], 0);
    }

    #[test]
    fn test_parse_spring_bones_1_0() {
        let root = serde_json::json!({
            "extensions": {
                "VRMC_springBone": {
                    "colliders": [
                        {"node": 5, "shape": {"sphere": {"offset": [0.0, 0.1, 0.0], "radius": 0.08}}},
                        {"node": 6, "shape": {"capsule": {"offset": [0.0, 0.0, 0.0], "tail": [0.0, 0.2, 0.0], "radius": 0.05}}}
                    ],
                    "colliderGroups": [{"name": "head", "colliders": [0, 1]}],
                    "springs": [{
                        "name": "hair",
                        "joints": [
                            {"node": 40, "hitRadius": 0.02, "stiffness": 0.8, "gravityPower": 0.1, "gravityDir": [0, -1, 0], "dragForce": 0.3},
                            {"node": 41}
                        ],
                        "colliderGroups": [0]
                    }]
                }
            }
        });
        let data = parse_spring_bones(&root);
        assert_eq!(data.colliders.len(), 2);
        assert!(matches!(
            data.colliders[1].shape,
            ColliderShape::Capsule { radius, .. } if (radius - 0.05).abs() < 1e-6
        ));
        assert_eq!(data.groups, vec![vec![0, 1]]);
        assert_eq!(data.chains.len(), 1);
        let chain = &data.chains[0];
        assert_eq!(chain.name, "hair");
        assert_eq!(chain.joints.len(), 2);
        assert!((chain.joints[0].stiffness - 0.8).abs() < 1e-6);
        // Second joint falls back to defaults
        assert!((chain.joints[1].stiffness - 1.0).abs() < 1e-6);
        assert_eq!(chain.joints[1].gravity_dir, Vec3::NEG_Y);
    }

    #[test]
    fn test_parse_spring_bones_0x_expands_roots() {
        let root = serde_json::json!({
            "nodes": [
                {"name": "head", "children": [1]},
                {"name": "hair_root", "children": [2, 4]},
                {"name": "hair_a1", "children": [3]},
                {"name": "hair_a2"},
                {"name": "hair_b1"}
            ],
            "extensions": {
                "VRM": {
                    "secondaryAnimation": {
                        "boneGroups": [{
                            "comment": "hair",
                            "stiffiness": 0.6,
                            "gravityPower": 0.2,
                            "gravityDir": {"x": 0, "y": -1, "z": 0},
                            "dragForce": 0.5,
                            "hitRadius": 0.03,
                            "bones": [1],
                            "colliderGroups": [0]
                        }],
                        "colliderGroups": [{
                            "node": 0,
                            "colliders": [{"offset": {"x": 0, "y": 0.1, "z": 0.02}, "radius": 0.1}]
                        }]
                    }
                }
            }
        });
        let data = parse_spring_bones(&root);
        assert_eq!(data.chains.len(), 2);
        let main: Vec<usize> = data.chains[0].joints.iter().map(|j| j.node).collect();
        let branch: Vec<usize> = data.chains[1].joints.iter().map(|j| j.node).collect();
        assert_eq!(main, vec![1, 2, 3]);
        assert_eq!(branch, vec![4]);
        assert!((data.chains[0].joints[0].stiffness - 0.6).abs() < 1e-6);

        // Z is flipped out of Unity space
        match data.colliders[0].shape {
            ColliderShape::Sphere { offset, radius } => {
                assert!((offset.z + 0.02).abs() < 1e-6);
                assert!((radius - 0.1).abs() < 1e-6);
            }
            _ => panic!("expected sphere collider"),
        }
    }

    #[test]
    fn test_parse_vec3_forms() {
        let arr = serde_json::json!([1.0, 2.0, 3.0]);
        let obj = serde_json::json!({"x": 1.0, "y": 2.0, "z": 3.0});
        assert_eq!(parse_vec3(Some(&arr)), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(parse_vec3(Some(&obj)), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(parse_vec3(None), Vec3::ZERO);
    }

    #[test]
    fn test_remove_unnecessary_joints() {
        let mut model = test_support::humanoid_model();
        let before = model.skins[0].joints.len();
        let removed = model.remove_unnecessary_joints();

        // Only leftLowerArm (node 6) carries weight
        assert_eq!(removed, before - 1);
        assert_eq!(model.skins[0].joints, vec![6]);
        assert_eq!(model.skins[0].inverse_bind_matrices.len(), 1);
        assert_eq!(model.meshes[0].primitives[0].joints[0], [0, 0, 0, 0]);
    }

    #[test]
    fn test_children() {
        let model = test_support::humanoid_model();
        let mut kids: Vec<usize> = model.children(2).collect();
        kids.sort_unstable();
        assert_eq!(kids, vec![3, 5, 8]);
    }

    #[test]
    fn test_load_model() {
        let model_path = "models/model1.vrm";
        if !Path::new(model_path).exists() {
            eprintln!("Skipping test: {} not found", model_path);
            return;
        }

        let model = VrmModel::load(model_path).expect("Failed to load model");
        assert!(!model.meshes.is_empty());
        assert!(!model.skins.is_empty());
        assert!(model.bone_node(HumanoidBone::Hips).is_some());
        assert!(model.bone_node(HumanoidBone::LeftUpperArm).is_some());
        assert!(model.triangle_count() > 0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = VrmModel::load("models/does-not-exist.vrm");
        assert!(matches!(result, Err(AvatarError::Load(_))));
    }
}
