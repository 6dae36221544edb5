//! Pose packet receiver
//!
//! Receives datagrams from the `scripts/pose_tracker.py` helper: JSON pose
//! packets and, optionally, JPEG preview frames.

use std::net::{SocketAddr, UdpSocket};

use super::frame::PreviewFrame;
use super::packet::PosePacket;
use crate::config::TrackerConfig;
use crate::error::{PosevrmError, TrackingError};

/// One decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Datagram {
    Pose(PosePacket),
    Frame(PreviewFrame),
}

/// Non-blocking UDP receiver
pub struct PoseReceiver {
    config: TrackerConfig,
    socket: Option<UdpSocket>,
}

impl PoseReceiver {
    /// Create a new receiver (does not bind yet)
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
        }
    }

    /// Bind the UDP socket and start receiving
    pub fn start(&mut self) -> Result<(), PosevrmError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr)
            .map_err(|e| TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e)))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TrackingError::Receiver(format!("Failed to set non-blocking: {}", e)))?;

        tracing::info!("Pose receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Address the socket is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn is_started(&self) -> bool {
        self.socket.is_some()
    }

    /// Receive at most one datagram (non-blocking).
    ///
    /// A malformed datagram is reported as `TrackingError::Parse` (or `Frame`
    /// for a bad JPEG); the socket stays usable.
    pub async fn process(&self) -> Result<Option<Datagram>, PosevrmError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut buf = [0u8; 65536];

        match socket.recv(&mut buf) {
            Ok(size) if size > 0 => {
                let data = &buf[..size];
                let datagram = if PreviewFrame::is_jpeg(data) {
                    Datagram::Frame(PreviewFrame::decode_jpeg(data)?)
                } else {
                    Datagram::Pose(PosePacket::parse(data)?)
                };
                Ok(Some(datagram))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // No data available
                Ok(None)
            }
            Err(e) => Err(TrackingError::Receiver(format!("Receive error: {}", e)).into()),
        }
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!("Pose receiver stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::frame::test_support::jpeg;
    use std::time::Duration;

    fn test_config() -> TrackerConfig {
        TrackerConfig {
            listen_address: "127.0.0.1".to_string(),
            port: 0,
            ..TrackerConfig::default()
        }
    }

    async fn poll(receiver: &PoseReceiver) -> Result<Option<Datagram>, PosevrmError> {
        for _ in 0..200 {
            match receiver.process().await {
                Ok(None) => tokio::time::sleep(Duration::from_millis(5)).await,
                other => return other,
            }
        }
        Ok(None)
    }

    #[tokio::test]
    async fn test_process_before_start() {
        let receiver = PoseReceiver::new(&test_config());
        assert!(!receiver.is_started());
        assert!(receiver.process().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_receive_packet() {
        let mut receiver = PoseReceiver::new(&test_config());
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let json = serde_json::json!({
            "frame": 7,
            "pose_landmarks": [{"x": 0.5, "y": 0.5, "z": 0.0, "visibility": 1.0}],
            "pose_world_landmarks": null,
            "rig": null
        });
        sender.send_to(json.to_string().as_bytes(), addr).unwrap();

        match poll(&receiver).await.unwrap() {
            Some(Datagram::Pose(packet)) => assert_eq!(packet.frame, 7),
            other => panic!("expected a pose packet, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receive_preview_frame() {
        let mut receiver = PoseReceiver::new(&test_config());
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&jpeg(64, 48, [30, 30, 220]), addr).unwrap();

        match poll(&receiver).await.unwrap() {
            Some(Datagram::Frame(frame)) => {
                assert_eq!((frame.width, frame.height), (64, 48));
                assert_eq!(frame.rgba.len(), 64 * 48 * 4);
            }
            other => panic!("expected a preview frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_packet_reported_and_survives() {
        let mut receiver = PoseReceiver::new(&test_config());
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"{not json", addr).unwrap();
        let result = poll(&receiver).await;
        assert!(matches!(
            result,
            Err(PosevrmError::Tracking(TrackingError::Parse(_)))
        ));

        sender
            .send_to(br#"{"frame": 2, "pose_landmarks": []}"#, addr)
            .unwrap();
        match poll(&receiver).await.unwrap() {
            Some(Datagram::Pose(packet)) => assert_eq!(packet.frame, 2),
            other => panic!("expected a pose packet after the error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop() {
        let mut receiver = PoseReceiver::new(&test_config());
        receiver.start().unwrap();
        receiver.stop();
        assert!(receiver.local_addr().is_none());
        assert!(receiver.process().await.unwrap().is_none());
    }
}
