//! Native egui UI for posevrm.
//!
//! Provides a desktop window with:
//! - The posed VRM avatar in an orbitable 3D viewport
//! - A preview panel with the tracked landmark skeleton over the camera frame
//! - Tracker status and video source controls

mod app;
pub mod guides;

pub use app::PosevrmApp;
