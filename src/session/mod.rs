// SPDX-License-Identifier: GPL-3.0-only

//! Capture session lifecycle and still capture
//!
//! [`CaptureSessionController`] owns one camera backend and drives it through
//! `Idle → Configuring → Running → Stopped`. It gates start-up on camera
//! authorization, binds the front camera with preview and photo outputs in a
//! single configuration bracket, and hands out single-shot completions for
//! still captures.
//!
//! # Threading
//!
//! State lives behind a mutex and is only changed by the controller. Hardware
//! bring-up, teardown and still capture block, so they run on tokio's
//! blocking pool. The UI task never waits on the camera; it awaits futures
//! or watches [`SessionEvent`]s.
//!
//! Concurrent `start()` calls are served one at a time and share one
//! outcome, so the permission prompt shows once. `stop()` does not wait
//! for them.
//!
//! Every `start()` and `stop()` bumps an epoch. A bring-up that finishes
//! after its epoch moved on was overtaken by `stop()` and releases the
//! hardware instead of reporting `Running`.

pub mod configuration;
pub mod photo;
pub mod state;

pub use configuration::ConfigurationGuard;
pub use photo::{CaptureRequestId, CapturedPhoto, PendingCapture};
pub use state::{SessionEvent, SessionState};

use crate::backends::camera::{
    BackendError, CameraBackend, CameraBackendType, CameraDevice, DevicePosition, FrameReceiver,
    OutputKind, SessionPreset,
};
use crate::backends::permission::{AuthorizationStatus, PermissionProvider};
use crate::config::Config;
use crate::constants::{DEFAULT_JPEG_QUALITY, EVENT_CHANNEL_CAPACITY};
use crate::errors::CaptureError;
use crate::pipelines::photo::PhotoEncoder;
use crate::storage::PhotoLibrary;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

/// Settings applied whenever the session is configured
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub preset: SessionPreset,
    /// Which camera to bind
    pub position: DevicePosition,
    pub jpeg_quality: u8,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            preset: SessionPreset::High,
            position: DevicePosition::Front,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            preset: config.session_preset,
            position: DevicePosition::Front,
            jpeg_quality: config.jpeg_quality(),
        }
    }
}

struct SessionInner {
    state: SessionState,
    epoch: u64,
    /// Effective `stop()` calls so far
    stops: u64,
    /// Completed `start()` calls so far
    starts: u64,
    last_start: Option<StartOutcome>,
    next_request: u64,
    device: Option<CameraDevice>,
    photo_output: bool,
    preview: Option<FrameReceiver>,
}

/// How the most recent `start()` ended
struct StartOutcome {
    /// `stops` when that call was made
    stops_seen: u64,
    result: Result<(), CaptureError>,
}

enum BringUp {
    Running,
    /// `stop()` arrived while the hardware was coming up
    Superseded,
}

struct Shared {
    inner: Mutex<SessionInner>,
    backend: Mutex<Box<dyn CameraBackend>>,
    /// Held for the whole of a `start()`
    start_gate: tokio::sync::Mutex<()>,
    backend_type: CameraBackendType,
    events: broadcast::Sender<SessionEvent>,
    options: SessionOptions,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(err: BackendError) -> CaptureError {
    CaptureError::DeviceUnavailable(err.to_string())
}

/// Bind the configured camera with preview and photo outputs
fn configure<B: CameraBackend + ?Sized>(
    backend: &mut B,
    options: &SessionOptions,
) -> Result<CameraDevice, CaptureError> {
    let device = backend.default_device(options.position).ok_or_else(|| {
        CaptureError::DeviceUnavailable(format!("no {} camera found", options.position))
    })?;

    let mut guard = ConfigurationGuard::begin(backend);
    guard.clear();
    guard.add_input(&device).map_err(unavailable)?;
    guard.add_output(OutputKind::Preview).map_err(unavailable)?;
    guard.add_output(OutputKind::Photo).map_err(unavailable)?;
    guard.set_preset(options.preset);
    guard.commit().map_err(unavailable)?;

    Ok(device)
}

/// Stop streaming and detach everything
fn release<B: CameraBackend + ?Sized>(backend: &mut B) {
    backend.stop_running();
    let mut guard = ConfigurationGuard::begin(backend);
    guard.clear();
    if let Err(e) = guard.commit() {
        warn!(error = %e, "Failed to commit session teardown");
    }
}

impl Shared {
    fn set_state(&self, inner: &mut SessionInner, next: SessionState) {
        if inner.state == next {
            return;
        }
        if !inner.state.can_transition_to(next) {
            warn!(from = %inner.state, to = %next, "Unexpected session transition");
        }
        info!(from = %inner.state, to = %next, "Session state changed");
        inner.state = next;
        self.emit(SessionEvent::StateChanged(next));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Configure and start the hardware. Runs on the blocking pool.
    fn bring_up(&self, epoch: u64) -> Result<BringUp, CaptureError> {
        let mut backend = lock(&self.backend);

        // stop() may have taken the backend first
        if lock(&self.inner).epoch != epoch {
            debug!("Bring-up overtaken by stop before it began");
            return Ok(BringUp::Superseded);
        }

        // Left over from a run whose teardown was skipped
        if backend.is_running() {
            release(&mut **backend);
        }

        let result = configure(&mut **backend, &self.options).and_then(|device| {
            backend.start_running().map_err(unavailable)?;
            Ok(device)
        });

        let mut inner = lock(&self.inner);
        let current = inner.epoch == epoch && inner.state == SessionState::Configuring;

        match result {
            Ok(device) if current => {
                info!(device = %device.name, preset = %self.options.preset, "Camera session running");
                inner.photo_output = backend.has_output(OutputKind::Photo);
                inner.preview = backend.take_preview_receiver();
                inner.device = Some(device);
                self.set_state(&mut inner, SessionState::Running);
                Ok(BringUp::Running)
            }
            Ok(_) => {
                drop(inner);
                debug!("Bring-up overtaken by stop, releasing camera");
                release(&mut **backend);
                Ok(BringUp::Superseded)
            }
            Err(e) => {
                if current {
                    self.set_state(&mut inner, SessionState::Idle);
                }
                drop(inner);
                release(&mut **backend);
                Err(e)
            }
        }
    }

    /// Release the hardware unless a newer `start()` has claimed it
    fn teardown(&self, epoch: u64) {
        let mut backend = lock(&self.backend);
        if lock(&self.inner).epoch != epoch {
            debug!("Skipping teardown, session restarted");
            return;
        }
        release(&mut **backend);
    }

    async fn capture_once(
        self: Arc<Self>,
        request_id: CaptureRequestId,
    ) -> Result<CapturedPhoto, CaptureError> {
        debug!(request = %request_id, "Capturing still");

        let shared = Arc::clone(&self);
        let frame = tokio::task::spawn_blocking(move || lock(&shared.backend).capture_still())
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("capture task failed: {}", e)))?
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let encoded = PhotoEncoder::new(self.options.jpeg_quality)
            .encode(frame)
            .await
            .map_err(CaptureError::CaptureFailed)?;

        info!(
            request = %request_id,
            width = encoded.width,
            height = encoded.height,
            size = encoded.data.len(),
            "Still captured"
        );

        Ok(CapturedPhoto {
            request_id,
            data: Arc::from(encoded.data),
            width: encoded.width,
            height: encoded.height,
        })
    }
}

/// Owns the capture session and mediates still captures
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct CaptureSessionController {
    shared: Arc<Shared>,
    permission: Arc<dyn PermissionProvider>,
    library: Arc<dyn PhotoLibrary>,
}

impl CaptureSessionController {
    pub fn new(
        backend: Box<dyn CameraBackend>,
        permission: Arc<dyn PermissionProvider>,
        library: Arc<dyn PhotoLibrary>,
        options: SessionOptions,
    ) -> Self {
        let backend_type = backend.backend_type();
        info!(backend = %backend_type, preset = %options.preset, "Creating capture session");
        if !backend.is_available() {
            warn!(backend = %backend_type, "Camera backend reports no usable hardware");
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = SessionInner {
            state: SessionState::Idle,
            epoch: 0,
            stops: 0,
            starts: 0,
            last_start: None,
            next_request: 0,
            device: None,
            photo_output: false,
            preview: None,
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                backend: Mutex::new(backend),
                start_gate: tokio::sync::Mutex::new(()),
                backend_type,
                events,
                options,
            }),
            permission,
            library,
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared.inner).state
    }

    /// Receive state changes, permission alerts and save results
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn backend_type(&self) -> CameraBackendType {
        self.shared.backend_type
    }

    /// Device bound by the current run
    pub fn current_device(&self) -> Option<CameraDevice> {
        lock(&self.shared.inner).device.clone()
    }

    /// Take the preview frame stream of the current run
    pub fn take_preview_receiver(&self) -> Option<FrameReceiver> {
        lock(&self.shared.inner).preview.take()
    }

    /// Bring the camera up
    ///
    /// No-op if already running or starting. Fails with `PermissionDenied`
    /// when access is not granted and `DeviceUnavailable` when the camera
    /// cannot be bound; the session is then left `Idle`. Never retries.
    ///
    /// A call that waited on another `start()` gets that call's result, or
    /// `Ok(())` if a `stop()` arrived while it waited.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let (stops_seen, starts_seen) = {
            let inner = lock(&self.shared.inner);
            (inner.stops, inner.starts)
        };
        let _gate = self.shared.start_gate.lock().await;

        {
            let inner = lock(&self.shared.inner);
            if inner.stops != stops_seen {
                debug!("Start overtaken by stop while waiting");
                return Ok(());
            }
            // Share the answer of a start that ran while we waited, unless a
            // stop came between it and us
            if inner.starts != starts_seen
                && let Some(outcome) = &inner.last_start
                && outcome.stops_seen == inner.stops
            {
                debug!("Start settled by a concurrent call");
                return outcome.result.clone();
            }
            let state = inner.state;
            if matches!(state, SessionState::Running | SessionState::Configuring) {
                debug!(%state, "Start ignored");
                return Ok(());
            }
        }

        let result = self.start_gated().await;

        let mut inner = lock(&self.shared.inner);
        inner.starts += 1;
        inner.last_start = Some(StartOutcome {
            stops_seen,
            result: result.clone(),
        });
        result
    }

    async fn start_gated(&self) -> Result<(), CaptureError> {
        self.authorize().await?;

        let epoch = {
            let mut inner = lock(&self.shared.inner);
            let state = inner.state;
            match state {
                SessionState::Running | SessionState::Configuring => return Ok(()),
                SessionState::Stopped => self.shared.set_state(&mut inner, SessionState::Idle),
                SessionState::Idle => {}
            }
            inner.epoch += 1;
            self.shared.set_state(&mut inner, SessionState::Configuring);
            inner.epoch
        };

        let shared = Arc::clone(&self.shared);
        match tokio::task::spawn_blocking(move || shared.bring_up(epoch)).await {
            Ok(Ok(BringUp::Running)) => Ok(()),
            Ok(Ok(BringUp::Superseded)) => {
                info!("Camera start cancelled by stop");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to start camera session");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "Bring-up task failed");
                let mut inner = lock(&self.shared.inner);
                if inner.epoch == epoch && inner.state == SessionState::Configuring {
                    self.shared.set_state(&mut inner, SessionState::Idle);
                }
                Err(CaptureError::DeviceUnavailable(format!(
                    "bring-up task failed: {}",
                    e
                )))
            }
        }
    }

    /// Halt the session
    ///
    /// No new captures are accepted once this is called. Captures issued
    /// earlier still complete once.
    pub async fn stop(&self) {
        let epoch = {
            let mut inner = lock(&self.shared.inner);
            if matches!(inner.state, SessionState::Idle | SessionState::Stopped) {
                debug!(state = %inner.state, "Stop ignored");
                return;
            }
            inner.epoch += 1;
            inner.stops += 1;
            inner.photo_output = false;
            inner.preview = None;
            inner.device = None;
            self.shared.set_state(&mut inner, SessionState::Stopped);
            inner.epoch
        };

        let shared = Arc::clone(&self.shared);
        if let Err(e) = tokio::task::spawn_blocking(move || shared.teardown(epoch)).await {
            error!(error = %e, "Teardown task failed");
        }
    }

    /// Take one still photo
    ///
    /// Fails immediately with `SessionNotReady` unless running with a photo
    /// output. Otherwise the returned future resolves exactly once, and a
    /// successful photo is also handed to the photo library.
    pub fn capture_photo(&self) -> Result<PendingCapture, CaptureError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::CaptureFailed(format!("no async runtime: {}", e)))?;

        let request_id = {
            let mut inner = lock(&self.shared.inner);
            if !inner.state.is_running() || !inner.photo_output {
                debug!(state = %inner.state, "Capture rejected");
                return Err(CaptureError::SessionNotReady);
            }
            inner.next_request += 1;
            CaptureRequestId(inner.next_request)
        };

        let (sender, receiver) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let library = Arc::clone(&self.library);

        runtime.spawn(async move {
            let result = Arc::clone(&shared).capture_once(request_id).await;
            match &result {
                Ok(photo) => {
                    shared.emit(SessionEvent::PhotoCaptured(request_id));
                    persist(library, Arc::clone(&shared), photo.clone());
                }
                Err(e) => warn!(request = %request_id, error = %e, "Capture failed"),
            }
            // The caller may have dropped the completion; the photo is saved anyway
            let _ = sender.send(result);
        });

        Ok(PendingCapture::new(request_id, receiver))
    }

    async fn authorize(&self) -> Result<(), CaptureError> {
        let status = self.permission.authorization_status().await;
        debug!(%status, "Camera authorization");

        match status {
            AuthorizationStatus::Authorized => Ok(()),
            AuthorizationStatus::NotDetermined => {
                info!("Requesting camera access");
                if self.permission.request_access().await {
                    Ok(())
                } else {
                    warn!("Camera access refused");
                    Err(CaptureError::PermissionDenied)
                }
            }
            AuthorizationStatus::Denied
            | AuthorizationStatus::Restricted
            | AuthorizationStatus::Unknown => {
                warn!(%status, "Camera access not granted");
                self.shared.emit(SessionEvent::PermissionAlert);
                Err(CaptureError::PermissionDenied)
            }
        }
    }
}

/// Save in the background; failures are reported, never propagated
fn persist(library: Arc<dyn PhotoLibrary>, shared: Arc<Shared>, photo: CapturedPhoto) {
    let request_id = photo.request_id;
    tokio::spawn(async move {
        match library.save(photo).await {
            Ok(path) => {
                info!(request = %request_id, path = %path.display(), "Photo saved");
                shared.emit(SessionEvent::PhotoSaved { request_id, path });
            }
            Err(e) => {
                warn!(request = %request_id, error = %e, "Failed to save photo");
                shared.emit(SessionEvent::PersistFailed {
                    request_id,
                    reason: e.to_string(),
                });
            }
        }
    });
}

impl std::fmt::Debug for CaptureSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSessionController")
            .field("backend_type", &self.shared.backend_type)
            .field("state", &self.state())
            .finish()
    }
}
