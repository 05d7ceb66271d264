// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Directory name used under the pictures and config directories
pub const APP_DIR_NAME: &str = "fill-light";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

// ===== Fill light =====

/// Dimmest allowed panel brightness
pub const BRIGHTNESS_MIN: f32 = 0.3;

/// Brightest allowed panel brightness
pub const BRIGHTNESS_MAX: f32 = 1.0;

/// Panel brightness on launch
pub const BRIGHTNESS_DEFAULT: f32 = 0.7;

/// Brightness change per key press
pub const BRIGHTNESS_STEP: f32 = 0.05;

/// Custom color change per key press
pub const COLOR_CHANNEL_STEP: f32 = 0.05;

// ===== Capture =====

/// JPEG quality used when encoding raw frames
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// How long `start_running` waits for the first frame
pub const BRING_UP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a still capture waits for a fresh frame
pub const STILL_CAPTURE_TIMEOUT: Duration = Duration::from_secs(3);

/// Consecutive dequeue failures before the capture thread gives up
pub const MAX_CONSECUTIVE_STREAM_ERRORS: u32 = 30;

// ===== Preview =====

/// Preview frames buffered before new ones are dropped
pub const PREVIEW_CHANNEL_CAPACITY: usize = 4;

/// Minimum spacing between preview frames (about 15 fps)
pub const PREVIEW_FRAME_INTERVAL: Duration = Duration::from_millis(66);

/// Resolution of generated preview frames
pub const SYNTHETIC_PREVIEW_SIZE: (u32, u32) = (320, 240);

/// Session events buffered per subscriber
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

// ===== Terminal =====

/// Input poll interval of the terminal loop
pub const TERMINAL_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Share of the screen width taken by the preview box
pub const PREVIEW_WIDTH_RATIO: f32 = 0.5;
