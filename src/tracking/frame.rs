//! Downscaled camera frames for the preview panel.
//!
//! When asked to (`--preview-width`), the helper sends every processed frame as
//! a bare JPEG datagram right before its pose packet. JPEG data always starts
//! with the SOI marker, which no JSON packet does.

use crate::error::TrackingError;

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// A decoded RGBA8 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major, unpremultiplied RGBA
    pub rgba: Vec<u8>,
}

impl PreviewFrame {
    pub fn is_jpeg(data: &[u8]) -> bool {
        data.starts_with(&JPEG_SOI)
    }

    pub fn decode_jpeg(data: &[u8]) -> Result<Self, TrackingError> {
        let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.into_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            rgba: image.into_raw(),
        })
    }

    /// `[width, height]` as egui sizes images.
    pub fn size(&self) -> [usize; 2] {
        [self.width as usize, self.height as usize]
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::jpeg;
    use super::*;

    #[test]
    fn test_decode_jpeg() {
        let frame = PreviewFrame::decode_jpeg(&jpeg(32, 24, [200, 40, 40])).unwrap();
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!(frame.size(), [32, 24]);
        assert_eq!(frame.rgba.len(), 32 * 24 * 4);

        // Lossy, so only roughly the source colour; alpha is opaque
        let px = &frame.rgba[..4];
        assert!(px[0] > 150 && px[1] < 90 && px[2] < 90);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_is_jpeg() {
        assert!(PreviewFrame::is_jpeg(&jpeg(8, 8, [0, 0, 0])));
        assert!(!PreviewFrame::is_jpeg(br#"{"frame": 1, "pose_landmarks": []}"#));
        assert!(!PreviewFrame::is_jpeg(&[]));
    }

    #[test]
    fn test_headerless_jpeg_is_an_error() {
        let result = PreviewFrame::decode_jpeg(&[0xFF, 0xD8, 0x00, 0x01, 0x02]);
        assert!(matches!(result, Err(TrackingError::Frame(_))));
    }
}
