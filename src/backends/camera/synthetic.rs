// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! Generates a moving gradient instead of reading hardware. Used for demos on
//! machines without a webcam and for exercising the capture session with
//! injected faults (missing front camera, refused input, failing captures,
//! slow bring-up).

use super::graph::SessionGraph;
use super::types::*;
use super::CameraBackend;
use crate::constants::{PREVIEW_CHANNEL_CAPACITY, PREVIEW_FRAME_INTERVAL, SYNTHETIC_PREVIEW_SIZE};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ProbeCounters {
    inputs: AtomicUsize,
    capture_requests: AtomicUsize,
    starts: AtomicUsize,
    running: AtomicBool,
}

/// Read-only view of what the synthetic hardware has been asked to do
#[derive(Debug, Clone, Default)]
pub struct SyntheticProbe(Arc<ProbeCounters>);

impl SyntheticProbe {
    /// Number of device inputs currently bound
    pub fn attached_inputs(&self) -> usize {
        self.0.inputs.load(Ordering::SeqCst)
    }

    /// Number of still captures that reached the hardware
    pub fn capture_requests(&self) -> usize {
        self.0.capture_requests.load(Ordering::SeqCst)
    }

    /// Number of completed hardware bring-ups
    pub fn start_count(&self) -> usize {
        self.0.starts.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.0.running.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
struct SyntheticOptions {
    no_front_camera: bool,
    failing_input: bool,
    failing_captures: bool,
    bring_up_delay: Duration,
}

struct PreviewStream {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

pub struct SyntheticBackend {
    graph: SessionGraph,
    options: SyntheticOptions,
    probe: SyntheticProbe,
    preview: Option<PreviewStream>,
    preview_receiver: Option<FrameReceiver>,
    running: bool,
    sequence: Arc<AtomicU64>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            graph: SessionGraph::new(),
            options: SyntheticOptions::default(),
            probe: SyntheticProbe::default(),
            preview: None,
            preview_receiver: None,
            running: false,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Only offer a rear camera
    pub fn without_front_camera(mut self) -> Self {
        self.options.no_front_camera = true;
        self
    }

    /// Refuse to build a device input
    pub fn with_failing_input(mut self) -> Self {
        self.options.failing_input = true;
        self
    }

    /// Fail every still capture
    pub fn with_failing_captures(mut self) -> Self {
        self.options.failing_captures = true;
        self
    }

    /// Block `start_running` for this long, like slow sensor power-up
    pub fn with_bring_up_delay(mut self, delay: Duration) -> Self {
        self.options.bring_up_delay = delay;
        self
    }

    pub fn probe(&self) -> SyntheticProbe {
        self.probe.clone()
    }

    fn sync_input_count(&self) {
        let count = usize::from(self.graph.input().is_some());
        self.probe.0.inputs.store(count, Ordering::SeqCst);
    }

    fn spawn_preview(&mut self) {
        let (mut sender, receiver) = futures::channel::mpsc::channel(PREVIEW_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let sequence = Arc::clone(&self.sequence);
        let (width, height) = SYNTHETIC_PREVIEW_SIZE;

        let handle = thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                let seq = sequence.fetch_add(1, Ordering::SeqCst);
                // Full channel means the UI is behind; drop the frame
                if let Err(e) = sender.try_send(test_pattern(width, height, seq)) {
                    if e.is_disconnected() {
                        break;
                    }
                }
                thread::sleep(PREVIEW_FRAME_INTERVAL);
            }
            debug!("Synthetic preview thread stopped");
        });

        self.preview = Some(PreviewStream {
            stop,
            handle: Some(handle),
        });
        self.preview_receiver = Some(receiver);
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SyntheticBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let mut cameras = Vec::new();
        if !self.options.no_front_camera {
            cameras.push(CameraDevice {
                name: "Synthetic Front Camera".to_string(),
                path: "synthetic:front".to_string(),
                position: DevicePosition::Front,
                device_info: None,
            });
        }
        cameras.push(CameraDevice {
            name: "Synthetic Rear Camera".to_string(),
            path: "synthetic:back".to_string(),
            position: DevicePosition::Back,
            device_info: None,
        });
        cameras
    }

    fn begin_configuration(&mut self) {
        self.graph.begin();
    }

    fn commit_configuration(&mut self) -> BackendResult<()> {
        self.graph.commit()
    }

    fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()> {
        if self.options.failing_input {
            return Err(BackendError::InitializationFailed(format!(
                "{} refused to open",
                device.name
            )));
        }
        self.graph.add_input(device)?;
        self.sync_input_count();
        Ok(())
    }

    fn remove_input(&mut self) {
        self.graph.remove_input();
        self.sync_input_count();
    }

    fn input(&self) -> Option<&CameraDevice> {
        self.graph.input()
    }

    fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        self.graph.add_output(output)
    }

    fn remove_output(&mut self, output: OutputKind) {
        self.graph.remove_output(output);
    }

    fn has_output(&self, output: OutputKind) -> bool {
        self.graph.has_output(output)
    }

    fn set_preset(&mut self, preset: SessionPreset) {
        self.graph.set_preset(preset);
    }

    fn start_running(&mut self) -> BackendResult<()> {
        if self.running {
            return Ok(());
        }
        if self.graph.is_configuring() {
            return Err(BackendError::Other(
                "cannot start inside a configuration bracket".to_string(),
            ));
        }
        let Some(device) = self.graph.input().cloned() else {
            return Err(BackendError::InitializationFailed("no input bound".to_string()));
        };

        if !self.options.bring_up_delay.is_zero() {
            thread::sleep(self.options.bring_up_delay);
        }

        if self.graph.has_output(OutputKind::Preview) {
            self.spawn_preview();
        }

        self.running = true;
        self.probe.0.running.store(true, Ordering::SeqCst);
        self.probe.0.starts.fetch_add(1, Ordering::SeqCst);
        info!(device = %device.name, preset = %self.graph.preset(), "Synthetic camera running");
        Ok(())
    }

    fn stop_running(&mut self) {
        if let Some(mut preview) = self.preview.take() {
            preview.stop.store(true, Ordering::SeqCst);
            if let Some(handle) = preview.handle.take()
                && handle.join().is_err()
            {
                warn!("Synthetic preview thread panicked");
            }
        }
        self.preview_receiver = None;
        if self.running {
            info!("Synthetic camera stopped");
        }
        self.running = false;
        self.probe.0.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn capture_still(&mut self) -> BackendResult<CameraFrame> {
        if !self.running {
            return Err(BackendError::NotRunning);
        }
        self.probe.0.capture_requests.fetch_add(1, Ordering::SeqCst);

        if self.options.failing_captures {
            return Err(BackendError::Other("synthetic sensor fault".to_string()));
        }

        let (width, height) = self.graph.preset().resolution().unwrap_or((1920, 1080));
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(test_pattern(width, height, seq))
    }

    fn take_preview_receiver(&mut self) -> Option<FrameReceiver> {
        self.preview_receiver.take()
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Synthetic
    }

    fn is_available(&self) -> bool {
        true
    }
}

impl Drop for SyntheticBackend {
    fn drop(&mut self) {
        self.stop_running();
    }
}

/// Diagonal warm gradient that drifts with the frame sequence
fn test_pattern(width: u32, height: u32, sequence: u64) -> CameraFrame {
    let shift = (sequence % 256) as u32;
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = 180 + ((x * 75) / width.max(1)) as u8;
            let g = (((x + y + shift) * 255) / (width + height).max(1)) as u8;
            let b = (((y + shift) * 200) / height.max(1)) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }

    CameraFrame {
        width,
        height,
        format: PixelFormat::Rgba,
        stride: width * 4,
        data: Arc::from(data),
        sequence,
        captured_at: Instant::now(),
    }
}
