// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the capture session controller

use fill_light::backends::camera::{
    CameraBackendType, SessionPreset, SyntheticBackend, SyntheticProbe,
};
use fill_light::backends::permission::{
    AuthorizationStatus, DeviceNodePermission, PermissionProvider, StaticPermission,
};
use fill_light::session::{CapturedPhoto, PendingCapture};
use fill_light::{
    CaptureError, CaptureSessionController, DirectoryPhotoLibrary, PhotoLibrary, SessionEvent,
    SessionOptions, SessionState,
};
use futures::StreamExt;
use futures::future::{BoxFuture, join_all};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(10);

/// Keeps photos in memory
#[derive(Default)]
struct RecordingLibrary {
    photos: Mutex<Vec<CapturedPhoto>>,
}

impl RecordingLibrary {
    fn saved(&self) -> Vec<CapturedPhoto> {
        self.photos.lock().unwrap().clone()
    }
}

impl PhotoLibrary for RecordingLibrary {
    fn save(&self, photo: CapturedPhoto) -> BoxFuture<'static, Result<PathBuf, CaptureError>> {
        let path = PathBuf::from(format!("memory/{}.jpg", photo.request_id.0));
        self.photos.lock().unwrap().push(photo);
        Box::pin(async move { Ok(path) })
    }
}

/// Refuses every save
struct FullDiskLibrary;

impl PhotoLibrary for FullDiskLibrary {
    fn save(&self, _photo: CapturedPhoto) -> BoxFuture<'static, Result<PathBuf, CaptureError>> {
        Box::pin(async { Err(CaptureError::PersistFailed("no space left on device".into())) })
    }
}

/// Not decided yet; the prompt takes a while to answer
struct SlowPrompt {
    grant: bool,
    requests: AtomicUsize,
}

impl SlowPrompt {
    fn new(grant: bool) -> Self {
        Self {
            grant,
            requests: AtomicUsize::new(0),
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for SlowPrompt {
    fn authorization_status(&self) -> BoxFuture<'_, AuthorizationStatus> {
        Box::pin(async { AuthorizationStatus::NotDetermined })
    }

    fn request_access(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.grant
        })
    }
}

fn options() -> SessionOptions {
    // Small stills keep encoding fast
    SessionOptions {
        preset: SessionPreset::Low,
        ..SessionOptions::default()
    }
}

fn controller_with(
    backend: SyntheticBackend,
    permission: Arc<dyn PermissionProvider>,
    library: Arc<dyn PhotoLibrary>,
) -> (CaptureSessionController, SyntheticProbe) {
    let probe = backend.probe();
    let controller =
        CaptureSessionController::new(Box::new(backend), permission, library, options());
    (controller, probe)
}

fn granted() -> (CaptureSessionController, SyntheticProbe, Arc<RecordingLibrary>) {
    let library = Arc::new(RecordingLibrary::default());
    let (controller, probe) = controller_with(
        SyntheticBackend::new(),
        Arc::new(StaticPermission::granted()),
        library.clone(),
    );
    (controller, probe, library)
}

async fn next_event<F>(events: &mut broadcast::Receiver<SessionEvent>, matches: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("event stream failed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

#[tokio::test]
async fn test_authorized_start_capture_and_save() {
    let (controller, probe, library) = granted();
    let mut events = controller.subscribe();

    tokio::time::timeout(WAIT, controller.start())
        .await
        .expect("start should finish in bounded time")
        .expect("start should succeed");
    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(controller.backend_type(), CameraBackendType::Synthetic);
    assert_eq!(
        controller.current_device().map(|d| d.path),
        Some("synthetic:front".to_string())
    );

    let pending = controller.capture_photo().expect("capture should be accepted");
    let request_id = pending.request_id();
    let photo = tokio::time::timeout(WAIT, pending)
        .await
        .expect("capture should complete")
        .expect("capture should succeed");

    assert_eq!(photo.request_id, request_id);
    assert_eq!((photo.width, photo.height), (640, 480));
    assert!(photo.data.starts_with(&[0xFF, 0xD8]), "photo should be a JPEG");

    let saved = next_event(&mut events, |e| matches!(e, SessionEvent::PhotoSaved { .. })).await;
    assert_eq!(
        saved,
        SessionEvent::PhotoSaved {
            request_id,
            path: PathBuf::from(format!("memory/{}.jpg", request_id.0)),
        }
    );
    assert_eq!(library.saved(), vec![photo]);
    assert_eq!(probe.capture_requests(), 1);

    controller.stop().await;
}

#[tokio::test]
async fn test_state_changes_are_broadcast_in_order() {
    let (controller, _probe, _library) = granted();
    let mut events = controller.subscribe();

    controller.start().await.unwrap();
    controller.stop().await;
    controller.start().await.unwrap();

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::StateChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        vec![
            SessionState::Configuring,
            SessionState::Running,
            SessionState::Stopped,
            SessionState::Idle,
            SessionState::Configuring,
            SessionState::Running,
        ]
    );
}

#[tokio::test]
async fn test_repeated_start_is_idempotent() {
    let (controller, probe, _library) = granted();

    for _ in 0..4 {
        controller.start().await.unwrap();
        assert_eq!(controller.state(), SessionState::Running);
        assert_eq!(probe.attached_inputs(), 1, "exactly one input must stay bound");
    }
    assert_eq!(probe.start_count(), 1, "hardware should be brought up once");
}

#[tokio::test]
async fn test_restart_after_stop() {
    let (controller, probe, _library) = granted();

    for round in 1..=3 {
        controller.start().await.unwrap();
        assert_eq!(controller.state(), SessionState::Running);
        assert!(probe.is_running());

        controller.stop().await;
        assert_eq!(controller.state(), SessionState::Stopped);
        assert!(!probe.is_running());
        assert_eq!(probe.attached_inputs(), 0, "stop should unbind the device");
        assert_eq!(probe.start_count(), round);
    }

    controller.start().await.unwrap();
    assert_eq!(controller.state(), SessionState::Running);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (controller, _probe, _library) = granted();

    // Idle
    controller.stop().await;
    assert_eq!(controller.state(), SessionState::Idle);

    controller.start().await.unwrap();
    controller.stop().await;
    controller.stop().await;
    assert_eq!(controller.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_one_completion_per_capture() {
    for count in [0usize, 1, 5] {
        let (controller, probe, library) = granted();
        let mut events = controller.subscribe();
        controller.start().await.unwrap();

        let pending: Vec<PendingCapture> = (0..count)
            .map(|_| controller.capture_photo().unwrap())
            .collect();
        let mut ids: Vec<_> = pending.iter().map(|p| p.request_id()).collect();
        ids.dedup();
        assert_eq!(ids.len(), count, "request ids must be unique");

        let results = tokio::time::timeout(WAIT, join_all(pending)).await.unwrap();
        assert_eq!(results.len(), count);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(probe.capture_requests(), count);

        for _ in 0..count {
            next_event(&mut events, |e| matches!(e, SessionEvent::PhotoSaved { .. })).await;
        }
        assert_eq!(library.saved().len(), count);

        controller.stop().await;
    }
}

#[tokio::test]
async fn test_capture_rejected_when_not_running() {
    let (controller, probe, library) = granted();

    let idle = controller.capture_photo();
    assert!(matches!(idle, Err(CaptureError::SessionNotReady)));

    controller.start().await.unwrap();
    controller.stop().await;

    let stopped = controller.capture_photo();
    assert!(matches!(stopped, Err(CaptureError::SessionNotReady)));

    assert_eq!(probe.capture_requests(), 0, "no hardware side effect expected");
    assert!(library.saved().is_empty());
}

#[tokio::test]
async fn test_capture_in_flight_during_stop_completes_once() {
    let (controller, _probe, _library) = granted();
    controller.start().await.unwrap();

    let pending = controller.capture_photo().unwrap();
    controller.stop().await;

    let result = tokio::time::timeout(WAIT, pending).await.unwrap();
    assert!(
        matches!(result, Ok(_) | Err(CaptureError::CaptureFailed(_))),
        "unexpected completion: {:?}",
        result
    );
}

#[tokio::test]
async fn test_denied_permission_skips_device_binding() {
    let permission = Arc::new(StaticPermission::denied());
    let (controller, probe) = controller_with(
        SyntheticBackend::new(),
        permission.clone(),
        Arc::new(RecordingLibrary::default()),
    );
    let mut events = controller.subscribe();

    let result = controller.start().await;
    assert_eq!(result, Err(CaptureError::PermissionDenied));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(probe.attached_inputs(), 0);
    assert_eq!(probe.start_count(), 0);
    assert_eq!(permission.requests(), 0, "denied users are not prompted again");

    let alert = next_event(&mut events, |e| *e == SessionEvent::PermissionAlert).await;
    assert_eq!(alert, SessionEvent::PermissionAlert);
}

#[tokio::test]
async fn test_prompt_refused_leaves_session_idle() {
    let permission = Arc::new(StaticPermission::undetermined(false));
    let (controller, probe) = controller_with(
        SyntheticBackend::new(),
        permission.clone(),
        Arc::new(RecordingLibrary::default()),
    );

    let result = controller.start().await;
    assert_eq!(result, Err(CaptureError::PermissionDenied));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(permission.requests(), 1);
    assert_eq!(probe.attached_inputs(), 0);
}

#[tokio::test]
async fn test_prompt_granted_starts_session() {
    let permission = Arc::new(StaticPermission::undetermined(true));
    let (controller, _probe) = controller_with(
        SyntheticBackend::new(),
        permission.clone(),
        Arc::new(RecordingLibrary::default()),
    );

    controller.start().await.unwrap();
    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(permission.requests(), 1);
}

#[tokio::test]
async fn test_missing_front_camera_is_unavailable() {
    let (controller, probe) = controller_with(
        SyntheticBackend::new().without_front_camera(),
        Arc::new(StaticPermission::granted()),
        Arc::new(RecordingLibrary::default()),
    );

    let result = controller.start().await;
    assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(probe.attached_inputs(), 0);
}

#[tokio::test]
async fn test_restricted_or_unknown_status_is_denied() {
    for status in [AuthorizationStatus::Restricted, AuthorizationStatus::Unknown] {
        let permission = Arc::new(StaticPermission::new(status, true));
        let (controller, probe) = controller_with(
            SyntheticBackend::new(),
            permission.clone(),
            Arc::new(RecordingLibrary::default()),
        );
        let mut events = controller.subscribe();

        let result = controller.start().await;
        assert_eq!(result, Err(CaptureError::PermissionDenied), "{}", status);
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(permission.requests(), 0, "{} must not prompt", status);
        assert_eq!(probe.attached_inputs(), 0);

        let alert = next_event(&mut events, |e| *e == SessionEvent::PermissionAlert).await;
        assert_eq!(alert, SessionEvent::PermissionAlert);
    }
}

#[tokio::test]
async fn test_machine_without_cameras_reports_unavailable() {
    let dev = tempfile::tempdir().unwrap();
    std::fs::write(dev.path().join("null"), b"").unwrap();

    let (controller, probe) = controller_with(
        SyntheticBackend::new().without_front_camera(),
        Arc::new(DeviceNodePermission::with_dev_dir(dev.path())),
        Arc::new(RecordingLibrary::default()),
    );
    let mut events = controller.subscribe();

    let result = controller.start().await;
    assert!(
        matches!(result, Err(CaptureError::DeviceUnavailable(_))),
        "got {:?}",
        result
    );
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(probe.attached_inputs(), 0);
    while let Ok(event) = events.try_recv() {
        assert_ne!(
            event,
            SessionEvent::PermissionAlert,
            "missing hardware is not a permission problem"
        );
    }
}

#[tokio::test]
async fn test_concurrent_starts_prompt_once() {
    for grant in [true, false] {
        let permission = Arc::new(SlowPrompt::new(grant));
        let (controller, probe) = controller_with(
            SyntheticBackend::new(),
            permission.clone(),
            Arc::new(RecordingLibrary::default()),
        );

        let results = join_all((0..3).map(|_| {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start().await })
        }))
        .await;

        assert_eq!(permission.requests(), 1, "prompt shown more than once");
        for result in results {
            let result = result.unwrap();
            if grant {
                assert_eq!(result, Ok(()));
            } else {
                assert_eq!(result, Err(CaptureError::PermissionDenied));
            }
        }
        if grant {
            assert_eq!(controller.state(), SessionState::Running);
            assert_eq!(probe.start_count(), 1);
        } else {
            assert_eq!(controller.state(), SessionState::Idle);
            assert_eq!(probe.start_count(), 0);
        }
    }
}

#[tokio::test]
async fn test_start_waiting_behind_stop_does_not_resurrect() {
    let (controller, probe) = controller_with(
        SyntheticBackend::new().with_bring_up_delay(Duration::from_millis(300)),
        Arc::new(StaticPermission::granted()),
        Arc::new(RecordingLibrary::default()),
    );
    let mut events = controller.subscribe();

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start().await }
    });
    next_event(&mut events, |e| {
        *e == SessionEvent::StateChanged(SessionState::Configuring)
    })
    .await;

    // Queued behind the first start, then overtaken by stop
    let second = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start().await }
    });
    tokio::task::yield_now().await;
    controller.stop().await;

    assert_eq!(first.await.unwrap(), Ok(()));
    assert_eq!(second.await.unwrap(), Ok(()));
    assert_eq!(controller.state(), SessionState::Stopped);
    assert!(!probe.is_running());

    // A start issued after the stop brings the camera back
    controller.start().await.unwrap();
    assert_eq!(controller.state(), SessionState::Running);
}

#[tokio::test]
async fn test_failed_input_rolls_back() {
    let (controller, probe) = controller_with(
        SyntheticBackend::new().with_failing_input(),
        Arc::new(StaticPermission::granted()),
        Arc::new(RecordingLibrary::default()),
    );

    let result = controller.start().await;
    assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(probe.attached_inputs(), 0);
    assert!(!probe.is_running());
    assert!(matches!(
        controller.capture_photo(),
        Err(CaptureError::SessionNotReady)
    ));
}

#[tokio::test]
async fn test_stop_during_bring_up() {
    let (controller, probe) = controller_with(
        SyntheticBackend::new().with_bring_up_delay(Duration::from_millis(300)),
        Arc::new(StaticPermission::granted()),
        Arc::new(RecordingLibrary::default()),
    );
    let mut events = controller.subscribe();

    let starter = controller.clone();
    let start = tokio::spawn(async move { starter.start().await });

    next_event(&mut events, |e| {
        *e == SessionEvent::StateChanged(SessionState::Configuring)
    })
    .await;
    controller.stop().await;

    assert_eq!(controller.state(), SessionState::Stopped);
    assert!(!probe.is_running(), "hardware must be released once stop returns");
    assert_eq!(probe.attached_inputs(), 0);

    let started = tokio::time::timeout(WAIT, start).await.unwrap().unwrap();
    assert_eq!(started, Ok(()));
    assert_eq!(controller.state(), SessionState::Stopped);

    // Nothing can complete after stop
    assert!(matches!(
        controller.capture_photo(),
        Err(CaptureError::SessionNotReady)
    ));
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(
                event,
                SessionEvent::PhotoCaptured(_) | SessionEvent::StateChanged(SessionState::Running)
            ),
            "unexpected event after stop: {:?}",
            event
        );
    }
}

#[tokio::test]
async fn test_capture_failure_keeps_session_running() {
    let library = Arc::new(RecordingLibrary::default());
    let (controller, _probe) = controller_with(
        SyntheticBackend::new().with_failing_captures(),
        Arc::new(StaticPermission::granted()),
        library.clone(),
    );
    controller.start().await.unwrap();

    let result = controller.capture_photo().unwrap().await;
    assert!(matches!(result, Err(CaptureError::CaptureFailed(_))));
    assert_eq!(controller.state(), SessionState::Running);
    assert!(library.saved().is_empty(), "failed captures are not saved");
}

#[tokio::test]
async fn test_persist_failure_is_reported_not_propagated() {
    let (controller, _probe) = controller_with(
        SyntheticBackend::new(),
        Arc::new(StaticPermission::granted()),
        Arc::new(FullDiskLibrary),
    );
    let mut events = controller.subscribe();
    controller.start().await.unwrap();

    let pending = controller.capture_photo().unwrap();
    let request_id = pending.request_id();
    assert!(pending.await.is_ok(), "capture succeeds even if saving fails");

    let failed = next_event(&mut events, |e| {
        matches!(e, SessionEvent::PersistFailed { .. })
    })
    .await;
    assert!(matches!(
        failed,
        SessionEvent::PersistFailed { request_id: id, .. } if id == request_id
    ));
    assert_eq!(controller.state(), SessionState::Running);
}

#[tokio::test]
async fn test_preview_frames_flow_while_running() {
    let (controller, _probe, _library) = granted();
    assert!(controller.take_preview_receiver().is_none());

    controller.start().await.unwrap();
    let mut preview = controller
        .take_preview_receiver()
        .expect("running session should offer a preview");
    assert!(controller.take_preview_receiver().is_none(), "preview is taken once");

    let frame = tokio::time::timeout(WAIT, preview.next())
        .await
        .unwrap()
        .expect("preview should deliver a frame");
    assert!(frame.width > 0 && frame.height > 0);

    controller.stop().await;
}

#[tokio::test]
async fn test_photos_written_to_directory() {
    let temp = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller_with(
        SyntheticBackend::new(),
        Arc::new(StaticPermission::granted()),
        Arc::new(DirectoryPhotoLibrary::new(temp.path())),
    );
    let mut events = controller.subscribe();
    controller.start().await.unwrap();

    let photo = controller.capture_photo().unwrap().await.unwrap();
    let SessionEvent::PhotoSaved { path, .. } =
        next_event(&mut events, |e| matches!(e, SessionEvent::PhotoSaved { .. })).await
    else {
        unreachable!()
    };

    assert!(path.starts_with(temp.path()));
    assert_eq!(std::fs::read(&path).unwrap(), photo.data.to_vec());
    assert_eq!(
        fill_light::storage::latest_photo(temp.path().to_path_buf()).await,
        Some(path)
    );

    controller.stop().await;
}
