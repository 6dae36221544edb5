//! posevrm - Pose-driven VRM avatar
//!
//! Main entry point for the desktop application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use posevrm::{
    config::Config,
    error::TrackingError,
    tracking::{check_mediapipe_available, Datagram, PoseReceiver, TrackerSubprocess, VideoSource},
    AppState, PosevrmError,
};

/// Without packets for this long the tracker is reported as disconnected
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(1);

/// posevrm - drive a VRM avatar from MediaPipe pose tracking
#[derive(Parser, Debug)]
#[command(name = "posevrm", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// VRM model to load (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Track a video file instead of the camera
    #[arg(long, conflicts_with = "camera")]
    video: Option<PathBuf>,

    /// Camera device index (overrides config)
    #[arg(long)]
    camera: Option<u32>,

    /// UDP port for pose packets (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not launch the tracker helper; listen for an external one
    #[arg(long)]
    no_tracker: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", posevrm::NAME, posevrm::VERSION);

    // Build tokio runtime manually so the main thread stays free for the UI event loop
    let runtime = tokio::runtime::Runtime::new()?;

    let (state, config) = runtime.block_on(async { setup_and_spawn_services(&args).await })?;

    let _guard = runtime.enter();

    // eframe::run_native blocks the main thread (winit requirement)
    if let Err(e) = posevrm::ui::PosevrmApp::run(Arc::clone(&state), config) {
        error!("UI error: {}", e);
    }

    info!("UI window closed, shutting down");
    state.shutdown();

    // Give async tasks a moment to finish (the helper is killed on drop)
    runtime.shutdown_timeout(Duration::from_secs(3));

    info!("posevrm stopped");
    Ok(())
}

/// Load config, create AppState, and spawn the background services.
async fn setup_and_spawn_services(args: &Args) -> anyhow::Result<(Arc<AppState>, Config)> {
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.avatar.model_path = model.clone();
    }
    if let Some(ref video) = args.video {
        config.tracker.video_path = Some(video.clone());
    }
    if let Some(camera) = args.camera {
        config.tracker.camera_device = camera;
        config.tracker.video_path = None;
    }
    if let Some(port) = args.port {
        config.tracker.port = port;
    }
    if args.no_tracker {
        config.tracker.auto_launch = false;
    }

    config.validate()?;

    info!("Avatar model: {}", config.avatar.model_path.display());
    info!("Tracker source: {}", VideoSource::from_config(&config.tracker));
    info!(
        "Tracker receiver: {} (auto_launch: {})",
        config.tracker.enabled, config.tracker.auto_launch
    );

    let state = AppState::new(config.clone());

    // Ctrl+C / SIGTERM close the window the same way the close button does
    let signal_state = Arc::clone(&state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_state.shutdown();
    });

    if config.tracker.enabled {
        let tracking_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_pose_tracking(tracking_state).await {
                error!("Pose tracking error: {}", e);
            }
        });
    } else {
        info!("Pose tracking disabled");
    }

    Ok((state, config))
}

async fn run_pose_tracking(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = state.config.read().await;
    let tracker_config = config.tracker.clone();
    drop(config);

    let mut shutdown_rx = state.subscribe_shutdown();

    // Optionally launch the subprocess
    let mut subprocess = if tracker_config.auto_launch {
        if !check_mediapipe_available(&tracker_config.python).await {
            warn!(
                "Python package 'mediapipe' not importable with '{}'; the pose tracker will likely fail",
                tracker_config.python
            );
        }
        let mut sp = TrackerSubprocess::new(&tracker_config);
        state.set_active_source(sp.source().clone());
        match sp.start() {
            Ok(()) => state.set_tracker_running(true),
            Err(e) => error!("Failed to auto-launch pose tracker: {}", e),
        }
        // Give the tracker a moment to load its model
        tokio::time::sleep(Duration::from_secs(2)).await;
        Some(sp)
    } else {
        info!("Pose tracker auto_launch disabled, waiting for an external helper");
        None
    };

    let mut receiver = PoseReceiver::new(&tracker_config);
    receiver.start()?;

    info!("Pose tracking started (port: {})", tracker_config.port);

    let mut last_packet: Option<Instant> = None;

    loop {
        tokio::select! {
            result = receiver.process() => {
                match result {
                    Ok(Some(Datagram::Pose(packet))) => {
                        last_packet = Some(Instant::now());
                        if !state.is_tracker_connected() {
                            info!("Pose tracker connected");
                            state.set_tracker_connected(true);
                        }
                        state.publish_packet(packet);
                    }
                    Ok(Some(Datagram::Frame(frame))) => state.publish_preview_frame(frame),
                    Ok(None) => {}
                    Err(PosevrmError::Tracking(e @ (TrackingError::Parse(_) | TrackingError::Frame(_)))) => {
                        state.record_parse_error();
                        warn!("Dropped tracker datagram: {}", e);
                    }
                    Err(e) => {
                        error!("Pose receive error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }

                if state.is_tracker_connected()
                    && last_packet.map_or(true, |t| t.elapsed() > CONNECTION_TIMEOUT)
                {
                    info!("Pose tracker stopped sending");
                    state.set_tracker_connected(false);
                }

                // Check subprocess health and auto-restart if needed
                if let Some(ref mut sp) = subprocess {
                    let running = sp.is_running();
                    state.set_tracker_running(running);
                    if !running && !sp.finished() && tracker_config.auto_restart {
                        info!(
                            "Pose tracker subprocess exited, restarting in {}s",
                            tracker_config.restart_delay_secs
                        );
                        tokio::time::sleep(Duration::from_secs(tracker_config.restart_delay_secs)).await;
                        match sp.start() {
                            Ok(()) => state.set_tracker_running(true),
                            Err(e) => error!("Failed to restart pose tracker: {}", e),
                        }
                    }
                }
            }
            _ = state.wait_source_changed() => {
                if let Some(source) = state.take_requested_source() {
                    let sp = subprocess.get_or_insert_with(|| TrackerSubprocess::new(&tracker_config));
                    state.set_active_source(source.clone());
                    match sp.restart(source).await {
                        Ok(()) => state.set_tracker_running(true),
                        Err(e) => {
                            error!("Failed to switch pose tracker source: {}", e);
                            state.set_tracker_running(false);
                        }
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Pose tracking shutting down");
                break;
            }
        }

        // Small yield to avoid busy-spinning when no data arrives
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Cleanup
    receiver.stop();
    if let Some(ref mut sp) = subprocess {
        sp.stop().await;
    }
    state.set_tracker_running(false);
    state.set_tracker_connected(false);

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
