//! Tracking module
//!
//! Body pose tracking through a MediaPipe Pose helper process that streams
//! landmarks and solved bone rotations as JSON over UDP, plus optional JPEG
//! preview frames.

pub mod frame;
pub mod landmark;
pub mod packet;
pub mod receiver;
pub mod subprocess;

pub use landmark::{Landmark, PoseLandmark, POSE_CONNECTIONS};
pub use frame::PreviewFrame;
pub use packet::PosePacket;
pub use receiver::{Datagram, PoseReceiver};
pub use subprocess::{check_mediapipe_available, TrackerSubprocess, VideoSource};
