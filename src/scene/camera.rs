//! Perspective camera and mouse orbit controls.

use eframe::egui;
use glam::{Mat4, Vec2, Vec3, Vec3Swizzles, Vec4Swizzles};
use std::f32::consts::PI;

use crate::config::SceneConfig;

/// Perspective projection looking from `position` at `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(config: &SceneConfig, aspect: f32) -> Self {
        let mut camera = Self {
            fov_deg: config.fov_deg,
            aspect,
            near: config.near,
            far: config.far,
            position: Vec3::from_array(config.camera_position),
            target: Vec3::from_array(config.camera_target),
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    /// Rebuild the projection after `fov_deg`, `aspect`, `near` or `far` change.
    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov_deg.to_radians(), self.aspect, self.near, self.far);
    }

    /// Match the aspect ratio to a viewport; no-op for degenerate sizes.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let aspect = width / height;
        if (aspect - self.aspect).abs() > f32::EPSILON {
            self.aspect = aspect;
            self.update_projection_matrix();
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    /// Project a world point into `rect`.
    ///
    /// Returns the screen position and the view-space distance, or `None` when
    /// the point is behind the near plane.
    pub fn project(&self, world: Vec3, rect: egui::Rect) -> Option<(egui::Pos2, f32)> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w < self.near {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        Some((ndc_to_screen(ndc.xy(), rect), clip.w))
    }
}

/// Map normalized device coordinates (-1..1, Y up) into `rect`.
pub fn ndc_to_screen(ndc: Vec2, rect: egui::Rect) -> egui::Pos2 {
    egui::pos2(
        rect.left() + (ndc.x + 1.0) * 0.5 * rect.width(),
        rect.top() + (1.0 - ndc.y) * 0.5 * rect.height(),
    )
}

/// Spherical orbit around a target: drag to rotate, secondary drag to pan,
/// scroll to zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub radius: f32,
    /// Azimuth around +Y, measured from +Z
    pub theta: f32,
    /// Polar angle from +Y
    pub phi: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

const PHI_EPSILON: f32 = 1e-4;

impl OrbitControls {
    /// Controls that reproduce the camera's current placement.
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.length().max(1e-3);
        Self {
            target: camera.target,
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            min_distance: 0.05,
            max_distance: 100.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
        }
    }

    /// Rotate by a pointer delta in points over a viewport `height` points tall.
    pub fn rotate(&mut self, delta: Vec2, height: f32) {
        if height <= 0.0 {
            return;
        }
        self.theta -= 2.0 * PI * delta.x / height * self.rotate_speed;
        self.phi = (self.phi - 2.0 * PI * delta.y / height * self.rotate_speed)
            .clamp(PHI_EPSILON, PI - PHI_EPSILON);
    }

    /// Slide target and camera in the view plane so the scene follows the pointer.
    pub fn pan(&mut self, delta: Vec2, height: f32, camera: &PerspectiveCamera) {
        if height <= 0.0 {
            return;
        }
        let view = camera.view_matrix().inverse();
        let right = view.col(0).xyz();
        let up = view.col(1).xyz();
        let units_per_point = 2.0 * self.radius * (camera.fov_deg.to_radians() * 0.5).tan() / height;
        self.target += (-right * delta.x + up * delta.y) * units_per_point;
    }

    /// Dolly in (positive `scroll`) or out.
    pub fn zoom(&mut self, scroll: f32) {
        let scale = 0.95f32.powf(scroll / 50.0 * self.zoom_speed);
        self.radius = (self.radius * scale).clamp(self.min_distance, self.max_distance);
    }

    /// Apply pointer input from the viewport widget.
    pub fn handle_response(
        &mut self,
        response: &egui::Response,
        ui: &egui::Ui,
        camera: &PerspectiveCamera,
    ) {
        let height = response.rect.height();
        let delta = response.drag_delta();
        let delta = Vec2::new(delta.x, delta.y);

        if response.dragged_by(egui::PointerButton::Primary) {
            self.rotate(delta, height);
        } else if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan(delta, height, camera);
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                self.zoom(scroll);
            }
        }
    }

    /// Write the orbit placement into the camera.
    pub fn update(&self, camera: &mut PerspectiveCamera) {
        let sin_phi = self.phi.sin();
        let offset = Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        );
        camera.target = self.target;
        camera.position = self.target + offset;
    }
}
