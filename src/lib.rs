//! posevrm - Pose-driven VRM avatar
//!
//! Drives a VRM avatar from full-body pose tracking:
//! - A MediaPipe Pose helper process streams landmarks and solved bone
//!   rotations over UDP
//! - Each frame's solved pose is eased onto the avatar's humanoid bones
//! - A native window renders the skinned avatar with spring bone physics and
//!   draws the tracked skeleton over the camera preview

pub mod avatar;
pub mod config;
pub mod error;
pub mod rig;
pub mod scene;
pub mod tracking;
pub mod ui;

pub use config::Config;
pub use error::{PosevrmError, Result};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify, RwLock};

use tracking::{PosePacket, PreviewFrame, VideoSource};

/// Application state shared between the tracking service and the UI
#[derive(Debug)]
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// Channel for pose packets
    pub packet_tx: broadcast::Sender<PosePacket>,
    /// Shutdown signal
    pub shutdown_tx: broadcast::Sender<()>,
    /// Packets arrived within the last second
    pub tracker_connected: AtomicBool,
    /// Helper subprocess alive
    pub tracker_running: AtomicBool,
    pub frames_received: AtomicU64,
    pub parse_errors: AtomicU64,
    /// Newest camera frame not yet shown by the UI
    preview_frame: Mutex<Option<PreviewFrame>>,
    /// Source the helper is currently reading
    active_source: Mutex<Option<VideoSource>>,
    /// Source the UI asked for, consumed by the tracking service
    requested_source: Mutex<Option<VideoSource>>,
    /// Source change signal
    source_changed: Notify,
}

impl AppState {
    /// Create a new application state with the given configuration
    pub fn new(config: Config) -> Arc<Self> {
        let (packet_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        Arc::new(Self {
            config: RwLock::new(config),
            packet_tx,
            shutdown_tx,
            tracker_connected: AtomicBool::new(false),
            tracker_running: AtomicBool::new(false),
            frames_received: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            preview_frame: Mutex::new(None),
            active_source: Mutex::new(None),
            requested_source: Mutex::new(None),
            source_changed: Notify::new(),
        })
    }

    /// Count a packet and broadcast it
    pub fn publish_packet(&self, packet: PosePacket) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        let _ = self.packet_tx.send(packet);
    }

    /// Replace the pending preview frame; an unshown older one is dropped
    pub fn publish_preview_frame(&self, frame: PreviewFrame) {
        *lock(&self.preview_frame) = Some(frame);
    }

    /// Take the newest preview frame, if one arrived since the last call
    pub fn take_preview_frame(&self) -> Option<PreviewFrame> {
        lock(&self.preview_frame).take()
    }

    /// Subscribe to pose packets
    pub fn subscribe_packets(&self) -> broadcast::Receiver<PosePacket> {
        self.packet_tx.subscribe()
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn set_tracker_connected(&self, connected: bool) {
        self.tracker_connected.store(connected, Ordering::Relaxed);
    }

    pub fn is_tracker_connected(&self) -> bool {
        self.tracker_connected.load(Ordering::Relaxed)
    }

    pub fn set_tracker_running(&self, running: bool) {
        self.tracker_running.store(running, Ordering::Relaxed);
    }

    pub fn is_tracker_running(&self) -> bool {
        self.tracker_running.load(Ordering::Relaxed)
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_count(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn set_active_source(&self, source: VideoSource) {
        *lock(&self.active_source) = Some(source);
    }

    pub fn active_source(&self) -> Option<VideoSource> {
        lock(&self.active_source).clone()
    }

    /// Ask the tracking service to switch the helper to `source`
    pub fn request_source(&self, source: VideoSource) {
        *lock(&self.requested_source) = Some(source);
        self.source_changed.notify_one();
    }

    /// Take the pending source request, if any
    pub fn take_requested_source(&self) -> Option<VideoSource> {
        lock(&self.requested_source).take()
    }

    /// Wait for a source change request
    pub async fn wait_source_changed(&self) {
        self.source_changed.notified().await;
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
