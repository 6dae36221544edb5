//! Main egui application: pose preview panel and the 3D avatar viewport.

use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui;
use tokio::sync::broadcast::{self, error::TryRecvError};

use super::guides;
use crate::avatar::Avatar;
use crate::config::Config;
use crate::rig::bones::HumanoidBone;
use crate::rig::{animate, RigOutcome, RigProfile};
use crate::scene::{Clock, DirectionalLight, OrbitControls, PerspectiveCamera, RenderStats, SceneRenderer};
use crate::tracking::{PosePacket, VideoSource};
use crate::AppState;

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(0x1e, 0x1e, 0x24);
const PREVIEW_BACKGROUND: egui::Color32 = egui::Color32::from_rgb(0x10, 0x10, 0x14);

/// The native egui application window.
pub struct PosevrmApp {
    state: Arc<AppState>,
    /// Pose packets from the tracking service (sync-safe via try_recv)
    packet_rx: broadcast::Receiver<PosePacket>,
    shutdown_rx: broadcast::Receiver<()>,
    config: Config,
    avatar: Option<Avatar>,
    /// Error message if the model failed to load
    load_error: Option<String>,
    profile: RigProfile,
    camera: PerspectiveCamera,
    orbit: OrbitControls,
    renderer: SceneRenderer,
    clock: Clock,
    show_preview: bool,
    /// Latest camera frame from the tracker helper
    preview_texture: Option<egui::TextureHandle>,
    /// Contents of the video path field
    video_path: String,
    latest: Option<PosePacket>,
    last_outcome: Option<RigOutcome>,
    stats: RenderStats,
}

impl PosevrmApp {
    pub fn new(state: Arc<AppState>, config: Config) -> Self {
        let (avatar, load_error) = match Avatar::load(&config.avatar) {
            Ok(avatar) => (Some(avatar), None),
            Err(e) => {
                let message = format!("Failed to load avatar: {}", e);
                tracing::error!("{}", message);
                (None, Some(message))
            }
        };

        let camera = PerspectiveCamera::new(
            &config.scene,
            config.ui.window_width / config.ui.window_height.max(1.0),
        );
        let orbit = OrbitControls::from_camera(&camera);

        Self {
            packet_rx: state.subscribe_packets(),
            shutdown_rx: state.subscribe_shutdown(),
            state,
            avatar,
            load_error,
            profile: RigProfile::from_config(&config.rig),
            camera,
            orbit,
            renderer: SceneRenderer::new(DirectionalLight::from_config(&config.scene)),
            clock: Clock::new(),
            show_preview: config.ui.show_preview,
            preview_texture: None,
            video_path: config
                .tracker
                .video_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            latest: None,
            last_outcome: None,
            stats: RenderStats::default(),
            config,
        }
    }

    /// Launch the native UI window. Blocks until the window is closed.
    pub fn run(state: Arc<AppState>, config: Config) -> eframe::Result {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title("posevrm")
                .with_inner_size([config.ui.window_width, config.ui.window_height])
                .with_transparent(config.scene.transparent_background),
            ..Default::default()
        };

        eframe::run_native(
            "posevrm",
            options,
            Box::new(move |_cc| Ok(Box::new(Self::new(state, config)))),
        )
    }

    /// Drain the broadcast channel, rigging the avatar once per packet.
    fn drain_packets(&mut self) {
        loop {
            match self.packet_rx.try_recv() {
                Ok(packet) => {
                    let outcome = animate(self.avatar.as_mut(), &packet, &self.profile);
                    self.last_outcome = Some(outcome);
                    self.latest = Some(packet);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(n)) => {
                    tracing::debug!("Pose receiver lagged by {} packets", n);
                }
                Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Upload the newest camera frame, reusing the texture.
    fn refresh_preview_texture(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.state.take_preview_frame() else {
            return;
        };
        let image = egui::ColorImage::from_rgba_unmultiplied(frame.size(), &frame.rgba);
        match &mut self.preview_texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.preview_texture =
                    Some(ctx.load_texture("camera-preview", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    /// Point the orbit at the avatar's head.
    fn focus_head(&mut self) {
        let Some(head) = self
            .avatar
            .as_ref()
            .and_then(|a| a.bone_world_position(HumanoidBone::Head))
        else {
            return;
        };
        self.orbit.target = head;
        self.orbit.update(&mut self.camera);
    }

    fn shutdown_requested(&mut self) -> bool {
        matches!(
            self.shutdown_rx.try_recv(),
            Ok(()) | Err(TryRecvError::Lagged(_))
        )
    }

    fn track_video(&self) {
        let path = self.video_path.trim();
        if path.is_empty() {
            return;
        }
        self.state.request_source(VideoSource::File(PathBuf::from(path)));
    }

    fn menu_bar(&self, ui: &mut egui::Ui) {
        egui::menu::bar(ui, |ui| {
            ui.label(crate::NAME);
            ui.separator();
            if self.state.is_tracker_connected() {
                ui.colored_label(egui::Color32::GREEN, "tracking");
            } else if self.state.is_tracker_running() {
                ui.colored_label(egui::Color32::YELLOW, "waiting for pose");
            } else {
                ui.colored_label(egui::Color32::RED, "tracker stopped");
            }
            ui.separator();
            ui.label(format!("frames: {}", self.state.frame_count()));
            if let Some(packet) = &self.latest {
                ui.separator();
                ui.label(format!("frame #{}", packet.frame));
            }
        });
    }

    fn preview_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Pose");
        ui.separator();

        let (width, height) = match &self.preview_texture {
            Some(texture) => {
                let [w, h] = texture.size();
                (w as u32, h as u32)
            }
            None => self
                .latest
                .as_ref()
                .map_or((0, 0), |p| (p.image_width, p.image_height)),
        };
        let available = ui.available_rect_before_wrap();
        let rect = guides::preview_rect(
            egui::Rect::from_min_size(available.min, egui::vec2(available.width(), available.width())),
            width,
            height,
        );
        ui.allocate_rect(rect, egui::Sense::hover());
        let painter = ui.painter_at(rect);
        match &self.preview_texture {
            Some(texture) => {
                painter.image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
            None => {
                painter.rect_filled(rect, 4.0, PREVIEW_BACKGROUND);
            }
        }
        match &self.latest {
            Some(packet) if packet.has_pose() => {
                guides::draw_guides(&painter, &packet.pose_landmarks, rect);
            }
            _ => {
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "no pose",
                    egui::FontId::proportional(14.0),
                    egui::Color32::GRAY,
                );
            }
        }

        ui.separator();
        self.source_controls(ui);
        ui.separator();
        self.status(ui);
    }

    fn source_controls(&mut self, ui: &mut egui::Ui) {
        ui.label("Video");
        ui.add(
            egui::TextEdit::singleline(&mut self.video_path)
                .hint_text("path/to/video.mp4")
                .desired_width(f32::INFINITY),
        );
        ui.horizontal(|ui| {
            if ui.button("Track video").clicked() {
                self.track_video();
            }
            if ui.button("Use camera").clicked() {
                self.state
                    .request_source(VideoSource::Camera(self.config.tracker.camera_device));
            }
        });
        if let Some(source) = self.state.active_source() {
            ui.label(format!("Source: {}", source));
        }
    }

    fn status(&mut self, ui: &mut egui::Ui) {
        match self.last_outcome {
            Some(RigOutcome::Applied { bones }) => {
                ui.label(format!("Rigged bones: {}", bones));
            }
            Some(RigOutcome::NoWorldLandmarks) => {
                ui.label("No body in frame");
            }
            Some(RigOutcome::NoRig) => {
                ui.label("No solved pose");
            }
            Some(RigOutcome::NoAvatar) | None => {}
        }
        ui.label(format!(
            "Triangles: {} drawn, {} culled",
            self.stats.drawn, self.stats.culled
        ));
        let dropped = self.state.parse_errors.load(std::sync::atomic::Ordering::Relaxed);
        if dropped > 0 {
            ui.label(format!("Dropped packets: {}", dropped));
        }

        let mut focus = false;
        if let Some(avatar) = &mut self.avatar {
            ui.label(format!("Spring chains: {}", avatar.spring_chain_count()));
            ui.horizontal(|ui| {
                if ui.button("Reset pose").clicked() {
                    avatar.reset_pose();
                }
                focus = ui.button("Focus head").clicked();
            });
        }
        if focus {
            self.focus_head();
        }
        if let Some(err) = &self.load_error {
            ui.separator();
            ui.colored_label(egui::Color32::RED, err);
        }
    }

    fn viewport(&mut self, ui: &mut egui::Ui, dt: f32) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());

        if !self.config.scene.transparent_background {
            ui.painter().rect_filled(rect, 0.0, BACKGROUND);
        }

        self.camera.set_viewport(rect.width(), rect.height());
        self.orbit.handle_response(&response, ui, &self.camera);
        self.orbit.update(&mut self.camera);

        let Some(avatar) = &mut self.avatar else {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                self.load_error.as_deref().unwrap_or("No avatar loaded"),
                egui::FontId::proportional(16.0),
                egui::Color32::LIGHT_RED,
            );
            return;
        };

        avatar.update(dt);
        let (mesh, stats) = self.renderer.render(avatar, &self.camera, rect);
        self.stats = stats;
        ui.painter_at(rect).add(egui::Shape::mesh(mesh));
    }
}

impl eframe::App for PosevrmApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.shutdown_requested() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.drain_packets();
        self.refresh_preview_texture(ctx);
        let dt = self.clock.get_delta();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ui);
            let label = if self.show_preview {
                "Hide camera"
            } else {
                "Show camera"
            };
            if ui.button(label).clicked() {
                self.show_preview = !self.show_preview;
            }
        });

        if self.show_preview {
            egui::SidePanel::left("preview")
                .default_width(self.config.ui.preview_width)
                .show(ctx, |ui| self.preview_panel(ui));
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.viewport(ui, dt));

        // Repaint continuously for the render loop
        ctx.request_repaint();
    }

    fn clear_color(&self, visuals: &egui::Visuals) -> [f32; 4] {
        if self.config.scene.transparent_background {
            egui::Rgba::TRANSPARENT.to_array()
        } else {
            visuals.panel_fill.to_normalized_gamma_f32()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::test_support::test_avatar;
    use crate::rig::RiggedPose;
    use crate::tracking::{Landmark, PreviewFrame};

    fn app_without_model() -> (Arc<AppState>, PosevrmApp) {
        let mut config = Config::default();
        config.avatar.model_path = PathBuf::from("/nonexistent/avatar.vrm");
        let state = AppState::new(config.clone());
        let app = PosevrmApp::new(Arc::clone(&state), config);
        (state, app)
    }

    fn rigged_packet(frame: u64) -> PosePacket {
        let landmarks = vec![Landmark::new(0.5, 0.5, 0.0); 33];
        PosePacket {
            frame,
            pose_world_landmarks: Some(landmarks.clone()),
            pose_landmarks: landmarks,
            rig: Some(RiggedPose::default()),
            ..PosePacket::default()
        }
    }

    #[test]
    fn test_missing_model_reports_error() {
        let (_state, app) = app_without_model();
        assert!(app.avatar.is_none());
        assert!(app.load_error.as_deref().unwrap_or("").contains("Failed to load avatar"));
    }

    #[test]
    fn test_drain_without_avatar() {
        let (state, mut app) = app_without_model();
        state.packet_tx.send(rigged_packet(1)).unwrap();
        app.drain_packets();
        assert_eq!(app.last_outcome, Some(RigOutcome::NoAvatar));
        assert_eq!(app.latest.as_ref().map(|p| p.frame), Some(1));
    }

    #[test]
    fn test_drain_rigs_every_packet() {
        let (state, mut app) = app_without_model();
        app.avatar = Some(test_avatar());

        for frame in 1..=3 {
            state.packet_tx.send(rigged_packet(frame)).unwrap();
        }
        app.drain_packets();

        // No hips position in the solved pose, so the position step is skipped
        assert_eq!(app.last_outcome, Some(RigOutcome::Applied { bones: 13 }));
        assert_eq!(app.latest.as_ref().map(|p| p.frame), Some(3));
    }

    #[test]
    fn test_track_video_requests_file_source() {
        let (state, mut app) = app_without_model();
        app.video_path = "  clips/dance.mp4 ".to_string();
        app.track_video();
        assert_eq!(
            state.take_requested_source(),
            Some(VideoSource::File(PathBuf::from("clips/dance.mp4")))
        );

        app.video_path.clear();
        app.track_video();
        assert_eq!(state.take_requested_source(), None);
    }

    #[test]
    fn test_preview_frame_uploaded_once() {
        let (state, mut app) = app_without_model();
        let ctx = egui::Context::default();

        app.refresh_preview_texture(&ctx);
        assert!(app.preview_texture.is_none());

        state.publish_preview_frame(PreviewFrame {
            width: 4,
            height: 3,
            rgba: vec![128; 4 * 3 * 4],
        });
        app.refresh_preview_texture(&ctx);
        assert_eq!(app.preview_texture.as_ref().map(|t| t.size()), Some([4, 3]));

        // A new frame replaces the image in the same texture
        let id = app.preview_texture.as_ref().map(|t| t.id());
        state.publish_preview_frame(PreviewFrame {
            width: 8,
            height: 6,
            rgba: vec![0; 8 * 6 * 4],
        });
        app.refresh_preview_texture(&ctx);
        assert_eq!(app.preview_texture.as_ref().map(|t| t.id()), id);
        assert_eq!(app.preview_texture.as_ref().map(|t| t.size()), Some([8, 6]));
    }

    #[test]
    fn test_focus_head_targets_head_bone() {
        let (_state, mut app) = app_without_model();
        app.focus_head();
        assert_eq!(app.orbit.target, glam::Vec3::new(0.0, 1.4, 0.0));

        let mut avatar = test_avatar();
        avatar.update(0.0);
        app.avatar = Some(avatar);
        app.focus_head();
        // hips 1.0 + spine 0.1 + chest 0.15 + neck 0.2 + head 0.1
        assert!((app.orbit.target - glam::Vec3::new(0.0, 1.55, 0.0)).length() < 1e-5);
        assert_eq!(app.camera.target, app.orbit.target);
    }

    #[test]
    fn test_shutdown_closes_window() {
        let (state, mut app) = app_without_model();
        assert!(!app.shutdown_requested());
        state.shutdown();
        assert!(app.shutdown_requested());
    }
}
