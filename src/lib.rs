// SPDX-License-Identifier: MPL-2.0

//! Fill Light - a selfie camera that turns the screen into a soft light
//!
//! The screen is painted in an adjustable pink-toned color while the front
//! camera preview runs in the middle. Still photos are captured through a
//! single capture session and saved to the pictures directory.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: Capture session lifecycle and still capture
//! - [`backends`]: Camera hardware and camera permission abstraction
//! - [`pipelines`]: Photo encoding
//! - [`storage`]: Photo library
//! - [`app`]: Fill light state (color, brightness, filters)
//! - [`terminal`]: Terminal front end
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! // Full-screen fill light in the terminal:
//! // fill-light
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod session;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::{FillLightSettings, FilterType, PresetLight};
pub use config::Config;
pub use errors::{AppError, AppResult, CaptureError};
pub use session::{CaptureSessionController, SessionEvent, SessionOptions, SessionState};
pub use storage::{DirectoryPhotoLibrary, PhotoLibrary};
