// SPDX-License-Identifier: GPL-3.0-only

//! Async JPEG encoding of captured frames
//!
//! Raw frames are converted to RGB and compressed on the blocking pool.
//! Frames the camera already delivered as MJPEG are stored as-is.

use crate::backends::camera::{CameraFrame, PixelFormat};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Encoded image data ready for saving
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    quality: u8,
}

impl PhotoEncoder {
    /// Quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a frame in a background task
    pub async fn encode(&self, frame: CameraFrame) -> Result<EncodedImage, String> {
        info!(
            width = frame.width,
            height = frame.height,
            format = ?frame.format,
            quality = self.quality,
            "Starting encoding"
        );

        let quality = self.quality;
        tokio::task::spawn_blocking(move || encode_frame(&frame, quality))
            .await
            .map_err(|e| format!("Encoding task error: {}", e))?
    }
}

/// Encode a frame as JPEG on the calling thread
pub fn encode_frame(frame: &CameraFrame, quality: u8) -> Result<EncodedImage, String> {
    if frame.width == 0 || frame.height == 0 {
        return Err("frame has no pixels".to_string());
    }

    let data = match frame.format {
        PixelFormat::Mjpeg => {
            if !frame.data.starts_with(&JPEG_SOI) {
                return Err("MJPEG frame is missing the JPEG header".to_string());
            }
            frame.data.to_vec()
        }
        PixelFormat::Rgba | PixelFormat::Rgb24 | PixelFormat::Yuyv => {
            encode_jpeg(&to_rgb(frame), frame.width, frame.height, quality)?
        }
    };

    debug!(size = data.len(), "Encoding complete");
    Ok(EncodedImage {
        data,
        width: frame.width,
        height: frame.height,
    })
}

fn to_rgb(frame: &CameraFrame) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((frame.width * frame.height * 3) as usize);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let (r, g, b) = frame.rgb_at(x, y);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}

fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    JpegEncoder::new_with_quality(&mut cursor, quality)
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| format!("JPEG encoding failed: {}", e))?;

    Ok(buffer)
}

/// Decode an MJPEG frame into RGBA for display
pub fn decode_to_rgba(frame: &CameraFrame) -> Option<CameraFrame> {
    let decoded = image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
        .map_err(|e| debug!(error = %e, "Dropping undecodable MJPEG frame"))
        .ok()?
        .to_rgba8();

    let (width, height) = decoded.dimensions();
    Some(CameraFrame {
        width,
        height,
        format: PixelFormat::Rgba,
        stride: width * 4,
        data: Arc::from(decoded.into_raw()),
        sequence: frame.sequence,
        captured_at: frame.captured_at,
    })
}

/// Solid RGBA frame, handy for callers that need a placeholder
pub fn solid_frame(width: u32, height: u32, rgb: (u8, u8, u8)) -> CameraFrame {
    let pixel = [rgb.0, rgb.1, rgb.2, 255];
    let data: Vec<u8> = pixel
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect();

    CameraFrame {
        width,
        height,
        format: PixelFormat::Rgba,
        stride: width * 4,
        data: Arc::from(data),
        sequence: 0,
        captured_at: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_frame_encodes_to_jpeg() {
        let frame = solid_frame(16, 8, (200, 120, 40));
        let encoded = encode_frame(&frame, 90).unwrap();

        assert!(encoded.data.starts_with(&JPEG_SOI));
        assert_eq!((encoded.width, encoded.height), (16, 8));

        let decoded = image::load_from_memory(&encoded.data).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn test_mjpeg_passes_through() {
        let jpeg = encode_frame(&solid_frame(4, 4, (0, 0, 0)), 80).unwrap().data;
        let frame = CameraFrame {
            width: 4,
            height: 4,
            format: PixelFormat::Mjpeg,
            stride: 0,
            data: Arc::from(jpeg.clone()),
            sequence: 3,
            captured_at: Instant::now(),
        };

        assert_eq!(encode_frame(&frame, 50).unwrap().data, jpeg);

        let rgba = decode_to_rgba(&frame).unwrap();
        assert_eq!(rgba.format, PixelFormat::Rgba);
        assert_eq!(rgba.sequence, 3);
        assert_eq!(rgba.data.len(), 4 * 4 * 4);
    }

    #[test]
    fn test_corrupt_mjpeg_rejected() {
        let frame = CameraFrame {
            width: 4,
            height: 4,
            format: PixelFormat::Mjpeg,
            stride: 0,
            data: Arc::from(vec![0u8; 32]),
            sequence: 0,
            captured_at: Instant::now(),
        };

        assert!(encode_frame(&frame, 80).is_err());
        assert!(decode_to_rgba(&frame).is_none());
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(encode_frame(&solid_frame(0, 0, (0, 0, 0)), 80).is_err());
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(PhotoEncoder::new(0).quality(), 1);
        assert_eq!(PhotoEncoder::new(250).quality(), 100);
    }
}
