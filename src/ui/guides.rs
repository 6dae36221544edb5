//! Landmark guide overlay for the preview panel.

use eframe::egui::{self, Color32, Pos2, Rect, Stroke};

use crate::tracking::landmark::{Landmark, POSE_CONNECTIONS, VISIBILITY_THRESHOLD};

pub const CONNECTOR_COLOR: Color32 = Color32::from_rgb(0x00, 0xcf, 0xf7);
pub const CONNECTOR_WIDTH: f32 = 4.0;
pub const LANDMARK_COLOR: Color32 = Color32::from_rgb(0xff, 0x03, 0x64);
pub const LANDMARK_WIDTH: f32 = 2.0;
const LANDMARK_RADIUS: f32 = 3.0;

/// Fallback frame size before the first packet reports one.
const DEFAULT_FRAME: (u32, u32) = (640, 480);

/// Largest rect with the frame's aspect ratio centred in `available`.
pub fn preview_rect(available: Rect, image_width: u32, image_height: u32) -> Rect {
    let (w, h) = if image_width == 0 || image_height == 0 {
        DEFAULT_FRAME
    } else {
        (image_width, image_height)
    };
    let aspect = w as f32 / h as f32;
    let mut size = egui::vec2(available.width(), available.width() / aspect);
    if size.y > available.height() {
        size = egui::vec2(available.height() * aspect, available.height());
    }
    Rect::from_center_size(available.center(), size)
}

/// Normalized image coordinates to a point in `rect`.
pub fn to_screen(landmark: &Landmark, rect: Rect) -> Pos2 {
    egui::pos2(
        rect.min.x + landmark.x * rect.width(),
        rect.min.y + landmark.y * rect.height(),
    )
}

/// Connector segments whose endpoints are both visible.
pub fn guide_segments(landmarks: &[Landmark], rect: Rect) -> Vec<[Pos2; 2]> {
    POSE_CONNECTIONS
        .iter()
        .filter_map(|&(a, b)| {
            let a = landmarks.get(a)?;
            let b = landmarks.get(b)?;
            (a.is_visible(VISIBILITY_THRESHOLD) && b.is_visible(VISIBILITY_THRESHOLD))
                .then(|| [to_screen(a, rect), to_screen(b, rect)])
        })
        .collect()
}

pub fn guide_points(landmarks: &[Landmark], rect: Rect) -> Vec<Pos2> {
    landmarks
        .iter()
        .filter(|lm| lm.is_visible(VISIBILITY_THRESHOLD))
        .map(|lm| to_screen(lm, rect))
        .collect()
}

/// Paint connectors then landmarks over `rect`.
pub fn draw_guides(painter: &egui::Painter, landmarks: &[Landmark], rect: Rect) {
    let connector = Stroke::new(CONNECTOR_WIDTH, CONNECTOR_COLOR);
    for segment in guide_segments(landmarks, rect) {
        painter.line_segment(segment, connector);
    }
    let outline = Stroke::new(LANDMARK_WIDTH, LANDMARK_COLOR);
    for point in guide_points(landmarks, rect) {
        painter.circle(point, LANDMARK_RADIUS, LANDMARK_COLOR, outline);
    }
}
