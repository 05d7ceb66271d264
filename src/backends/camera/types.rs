// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices
    #[default]
    V4l2,
    /// Generated test pattern camera
    Synthetic,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Which way a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DevicePosition {
    /// Faces the user (selfie camera, laptop webcam)
    Front,
    /// Faces away from the user
    Back,
    /// Plugged-in camera with no fixed orientation
    External,
    #[default]
    Unspecified,
}

impl DevicePosition {
    /// Guess the position from a V4L2 card name
    ///
    /// V4L2 has no notion of facing direction. Built-in and USB webcams point
    /// at the user, so only names that say otherwise are treated as rear.
    pub fn from_card_name(card: &str) -> Self {
        let card = card.to_ascii_lowercase();
        if ["rear", "back", "world"].iter().any(|k| card.contains(k)) {
            DevicePosition::Back
        } else {
            DevicePosition::Front
        }
    }
}

impl std::fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DevicePosition::Front => write!(f, "front"),
            DevicePosition::Back => write!(f, "back"),
            DevicePosition::External => write!(f, "external"),
            DevicePosition::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Bus the device hangs off (e.g. "usb-0000:00:14.0-6")
    pub bus: String,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String,
    pub position: DevicePosition,
    pub device_info: Option<DeviceInfo>,
}

/// Capture quality preset applied while configuring a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPreset {
    /// 640x480
    Low,
    /// 1280x720
    Medium,
    /// 1920x1080
    #[default]
    High,
    /// Largest resolution the device offers
    Photo,
}

impl SessionPreset {
    pub const ALL: [SessionPreset; 4] = [
        SessionPreset::Low,
        SessionPreset::Medium,
        SessionPreset::High,
        SessionPreset::Photo,
    ];

    /// Target resolution, `None` for "largest available"
    pub fn resolution(&self) -> Option<(u32, u32)> {
        match self {
            SessionPreset::Low => Some((640, 480)),
            SessionPreset::Medium => Some((1280, 720)),
            SessionPreset::High => Some((1920, 1080)),
            SessionPreset::Photo => None,
        }
    }
}

impl std::fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.resolution() {
            Some((w, h)) => write!(f, "{}x{}", w, h),
            None => write!(f, "max"),
        }
    }
}

/// Sinks a capture session can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Continuous preview frames
    Preview,
    /// One still image per capture request
    Photo,
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit RGBA
    Rgba,
    /// 24-bit RGB, no alpha
    Rgb24,
    /// Packed 4:2:2 (Y0 U Y1 V)
    Yuyv,
    /// Motion JPEG, each frame is a complete JPEG image
    Mjpeg,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, `None` for compressed ones
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            PixelFormat::Rgba => Some(4),
            PixelFormat::Rgb24 => Some(3),
            PixelFormat::Yuyv => Some(2),
            PixelFormat::Mjpeg => None,
        }
    }

    /// Parse a V4L2 FourCC
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"MJPG" | b"JPEG" => Some(PixelFormat::Mjpeg),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"AB24" => Some(PixelFormat::Rgba),
            _ => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row stride in bytes (0 for compressed formats)
    pub stride: u32,
    pub data: Arc<[u8]>,
    /// Per-session frame counter
    pub sequence: u64,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Read one pixel as RGB
    ///
    /// Coordinates are clamped to the frame. Compressed frames read as black;
    /// decode them first.
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.width == 0 || self.height == 0 {
            return (0, 0, 0);
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let data = &self.data;

        match self.format {
            PixelFormat::Rgba | PixelFormat::Rgb24 => {
                let bpp = if self.format == PixelFormat::Rgba { 4 } else { 3 };
                let idx = (y * self.stride + x * bpp) as usize;
                if idx + 2 < data.len() {
                    (data[idx], data[idx + 1], data[idx + 2])
                } else {
                    (0, 0, 0)
                }
            }
            PixelFormat::Yuyv => {
                // Each 4-byte macropixel holds two luma samples sharing chroma
                let pair = (y * self.stride + (x / 2) * 4) as usize;
                if pair + 3 >= data.len() {
                    return (0, 0, 0);
                }
                let luma = if x % 2 == 0 { data[pair] } else { data[pair + 2] };
                yuv_to_rgb(luma, data[pair + 1], data[pair + 3])
            }
            PixelFormat::Mjpeg => (0, 0, 0),
        }
    }
}

/// BT.601 limited-range YUV to RGB
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let c = y as f32 - 16.0;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;

    let r = 1.164 * c + 1.596 * e;
    let g = 1.164 * c - 0.392 * d - 0.813 * e;
    let b = 1.164 * c + 2.017 * d;

    (
        r.clamp(0.0, 255.0) as u8,
        g.clamp(0.0, 255.0) as u8,
        b.clamp(0.0, 255.0) as u8,
    )
}

/// Frame receiver type for preview streams
pub type FrameReceiver = futures::channel::mpsc::Receiver<CameraFrame>;

/// Frame sender type for preview streams
pub type FrameSender = futures::channel::mpsc::Sender<CameraFrame>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to open or bind the device
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Operation needs a configured, running session
    NotRunning,
    /// Configuration change outside a begin/commit bracket
    NotConfiguring,
    /// Timed out waiting for the hardware
    Timeout(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::NotRunning => write!(f, "Session is not running"),
            BackendError::NotConfiguring => {
                write!(f, "Configuration change outside begin/commit")
            }
            BackendError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
