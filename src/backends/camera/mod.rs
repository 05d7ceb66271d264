// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The capture core talks to cameras only through [`CameraBackend`], which
//! models a capture session: one device input, a preview sink and a still
//! photo sink, changed atomically between `begin_configuration` and
//! `commit_configuration`.
//!
//! ```text
//! ┌──────────────────────────┐
//! │ CaptureSessionController │  ← Lifecycle, permission gating, capture
//! └────────────┬─────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐
//! │   CameraBackend Trait    │  ← Session primitive
//! └────────────┬─────────────┘
//!              │
//!        ┌─────┴──────┐
//!        ▼            ▼
//!    ┌──────┐   ┌───────────┐
//!    │ V4L2 │   │ Synthetic │
//!    └──────┘   └───────────┘
//! ```

pub mod graph;
pub mod synthetic;
pub mod types;
pub mod v4l2;

pub use synthetic::{SyntheticBackend, SyntheticProbe};
pub use types::*;
pub use v4l2::V4l2Backend;

/// Capture session primitive implemented by every camera backend
///
/// Methods block on hardware and are called from the blocking thread pool,
/// never from the UI task.
pub trait CameraBackend: Send {
    // ===== Enumeration =====

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Default camera facing the given way
    fn default_device(&self, position: DevicePosition) -> Option<CameraDevice> {
        self.enumerate_cameras()
            .into_iter()
            .find(|device| device.position == position)
    }

    // ===== Configuration =====

    /// Open a configuration bracket
    fn begin_configuration(&mut self);

    /// Close the configuration bracket, applying all changes at once
    fn commit_configuration(&mut self) -> BackendResult<()>;

    /// Bind a camera device as the session input
    ///
    /// Fails if an input is already attached or the device cannot be opened.
    fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()>;

    /// Unbind the session input, if any
    fn remove_input(&mut self);

    /// Currently bound input device
    fn input(&self) -> Option<&CameraDevice>;

    /// Attach an output sink
    fn add_output(&mut self, output: OutputKind) -> BackendResult<()>;

    /// Detach an output sink
    fn remove_output(&mut self, output: OutputKind);

    /// Check whether an output sink is attached
    fn has_output(&self, output: OutputKind) -> bool;

    /// Select the capture quality preset
    fn set_preset(&mut self, preset: SessionPreset);

    // ===== Running =====

    /// Start streaming from the bound input
    ///
    /// Blocks until the hardware delivers frames or fails.
    fn start_running(&mut self) -> BackendResult<()>;

    /// Stop streaming. No-op if not running.
    fn stop_running(&mut self);

    fn is_running(&self) -> bool;

    /// Capture one still frame
    ///
    /// Blocks until a frame newer than the request is available.
    fn capture_still(&mut self) -> BackendResult<CameraFrame>;

    /// Take the preview frame stream of the current run
    fn take_preview_receiver(&mut self) -> Option<FrameReceiver>;

    // ===== Metadata =====

    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;
}

/// Create a backend instance for the given type
pub fn get_backend_for_type(backend_type: CameraBackendType) -> Box<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::V4l2 => Box::new(V4l2Backend::new()),
        CameraBackendType::Synthetic => Box::new(SyntheticBackend::new()),
    }
}
