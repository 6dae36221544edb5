//! Software scene renderer.
//!
//! Skinned triangles are projected on the CPU, flat-shaded, sorted back to
//! front and handed to egui as a single vertex-coloured mesh.

use eframe::egui;
use glam::{Vec3, Vec3Swizzles, Vec4Swizzles};

use super::camera::{ndc_to_screen, PerspectiveCamera};
use super::light::DirectionalLight;
use crate::avatar::Avatar;

/// Triangles with every colour channel below this alpha are skipped.
const MIN_ALPHA: f32 = 0.01;

struct ScreenTriangle {
    points: [egui::Pos2; 3],
    depth: f32,
    color: egui::Color32,
}

/// Per-frame drawing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub drawn: usize,
    pub culled: usize,
}

pub struct SceneRenderer {
    pub light: DirectionalLight,
}

impl SceneRenderer {
    pub fn new(light: DirectionalLight) -> Self {
        Self { light }
    }

    /// Build the avatar mesh for `rect` as seen from `camera`.
    pub fn render(
        &self,
        avatar: &Avatar,
        camera: &PerspectiveCamera,
        rect: egui::Rect,
    ) -> (egui::Mesh, RenderStats) {
        let model = avatar.model();
        let skinned = avatar.skinned_meshes();
        let view_proj = camera.view_projection();

        let mut stats = RenderStats::default();
        let mut triangles = Vec::new();

        for (mesh, mesh_positions) in model.meshes.iter().zip(skinned.iter()) {
            for (prim, positions) in mesh.primitives.iter().zip(mesh_positions.iter()) {
                for tri in prim.indices.chunks_exact(3) {
                    let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                    let (Some(p0), Some(p1), Some(p2)) = (
                        positions.get(idx[0]),
                        positions.get(idx[1]),
                        positions.get(idx[2]),
                    ) else {
                        stats.culled += 1;
                        continue;
                    };
                    let world = [*p0, *p1, *p2];

                    let clip = world.map(|p| view_proj * p.extend(1.0));
                    // Drop anything touching the near plane rather than clipping it
                    if clip.iter().any(|c| c.w < camera.near) {
                        stats.culled += 1;
                        continue;
                    }
                    let ndc = clip.map(|c| c.xyz() / c.w);
                    if outside_frustum(&ndc) {
                        stats.culled += 1;
                        continue;
                    }

                    let color = average_color(idx.map(|i| prim.colors.get(i).copied()));
                    if color[3] < MIN_ALPHA {
                        stats.culled += 1;
                        continue;
                    }

                    let shade = self.shade(&world, camera.position);
                    triangles.push(ScreenTriangle {
                        points: ndc.map(|n| ndc_to_screen(n.xy(), rect)),
                        depth: (clip[0].w + clip[1].w + clip[2].w) / 3.0,
                        color: to_color32(color, shade),
                    });
                }
            }
        }

        // Painter's algorithm: farthest first
        triangles.sort_by(|a, b| b.depth.total_cmp(&a.depth));

        let mut mesh = egui::Mesh::default();
        mesh.reserve_triangles(triangles.len());
        mesh.reserve_vertices(triangles.len() * 3);
        for tri in &triangles {
            let base = mesh.vertices.len() as u32;
            for p in tri.points {
                mesh.colored_vertex(p, tri.color);
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }

        stats.drawn = triangles.len();
        (mesh, stats)
    }

    /// Flat Lambert shading with the normal turned toward the viewer.
    fn shade(&self, world: &[Vec3; 3], eye: Vec3) -> Vec3 {
        let mut normal = (world[1] - world[0])
            .cross(world[2] - world[0])
            .normalize_or_zero();
        let centroid = (world[0] + world[1] + world[2]) / 3.0;
        if normal.dot(eye - centroid) < 0.0 {
            normal = -normal;
        }
        self.light.irradiance(normal)
    }
}

/// True when all three vertices lie beyond the same clip plane.
fn outside_frustum(ndc: &[Vec3; 3]) -> bool {
    (0..3).any(|axis| ndc.iter().all(|v| v[axis] > 1.0) || ndc.iter().all(|v| v[axis] < -1.0))
}

fn average_color(colors: [Option<[f32; 4]>; 3]) -> [f32; 4] {
    let mut sum = [0.0f32; 4];
    for c in colors {
        let c = c.unwrap_or([1.0; 4]);
        for k in 0..4 {
            sum[k] += c[k] / 3.0;
        }
    }
    sum
}

fn to_color32(color: [f32; 4], shade: Vec3) -> egui::Color32 {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    egui::Color32::from_rgba_unmultiplied(
        channel(color[0] * shade.x),
        channel(color[1] * shade.y),
        channel(color[2] * shade.z),
        channel(color[3]),
    )
}
