// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Talks to `/dev/video*` nodes directly through the `v4l` crate. Streaming
//! runs on a dedicated capture thread over a memory-mapped buffer queue; the
//! thread keeps the newest frame for still capture and forwards a throttled,
//! decoded copy to the preview channel.
//!
//! MJPEG is negotiated first since every frame is then already an encoded
//! still. Cameras without MJPEG fall back to YUYV.

use super::graph::SessionGraph;
use super::types::*;
use super::CameraBackend;
use crate::constants::{
    BRING_UP_TIMEOUT, MAX_CONSECUTIVE_STREAM_ERRORS, PREVIEW_CHANNEL_CAPACITY,
    PREVIEW_FRAME_INTERVAL, STILL_CAPTURE_TIMEOUT,
};
use crate::pipelines::photo::encoding::decode_to_rgba;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Newest frame from the capture thread plus a wakeup for still capture
#[derive(Default)]
struct LatestFrame {
    frame: Mutex<Option<CameraFrame>>,
    fresh: Condvar,
    /// Set when the capture thread exits for any reason
    ended: AtomicBool,
}

struct CaptureThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Format agreed with the driver
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: u32,
}

pub struct V4l2Backend {
    graph: SessionGraph,
    latest: Arc<LatestFrame>,
    capture: Option<CaptureThread>,
    preview_receiver: Option<FrameReceiver>,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            graph: SessionGraph::new(),
            latest: Arc::new(LatestFrame::default()),
            capture: None,
            preview_receiver: None,
        }
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

/// List `/dev/video*` nodes that can capture video
pub fn enumerate_v4l2_cameras() -> Vec<CameraDevice> {
    let mut paths: Vec<_> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("video"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut cameras = Vec::new();
    for path in paths {
        let path_str = path.to_string_lossy().to_string();
        let Ok(dev) = Device::with_path(&path) else {
            debug!(path = %path_str, "Skipping unopenable video node");
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };

        // UVC cameras expose a second, metadata-only node per camera
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            debug!(path = %path_str, card = %caps.card, "Skipping non-capture node");
            continue;
        }

        cameras.push(CameraDevice {
            name: caps.card.clone(),
            path: path_str,
            position: DevicePosition::from_card_name(&caps.card),
            device_info: Some(DeviceInfo {
                card: caps.card,
                driver: caps.driver,
                bus: caps.bus,
            }),
        });
    }

    info!(count = cameras.len(), "Enumerated V4L2 cameras");
    cameras
}

/// Pick a resolution for the preset and set MJPEG, falling back to YUYV
fn negotiate_format(dev: &Device, preset: SessionPreset) -> BackendResult<Negotiated> {
    let candidates = [FourCC::new(b"MJPG"), FourCC::new(b"YUYV")];

    for fourcc in candidates {
        let (width, height) = match preset.resolution() {
            Some(size) => size,
            None => largest_frame_size(dev, fourcc).unwrap_or((1920, 1080)),
        };

        let requested = Format::new(width, height, fourcc);
        let actual = match dev.set_format(&requested) {
            Ok(actual) => actual,
            Err(e) => {
                debug!(fourcc = ?fourcc, error = %e, "Format rejected");
                continue;
            }
        };

        // Drivers answer with their closest match, which may be another FourCC
        let Some(format) = PixelFormat::from_fourcc(&actual.fourcc.repr) else {
            continue;
        };

        info!(
            width = actual.width,
            height = actual.height,
            fourcc = ?actual.fourcc,
            "V4L2 format configured"
        );
        return Ok(Negotiated {
            width: actual.width,
            height: actual.height,
            format,
            stride: actual.stride,
        });
    }

    Err(BackendError::FormatNotSupported(
        "device offers neither MJPEG nor YUYV".to_string(),
    ))
}

fn largest_frame_size(dev: &Device, fourcc: FourCC) -> Option<(u32, u32)> {
    dev.enum_framesizes(fourcc)
        .ok()?
        .into_iter()
        .filter_map(|size| match size.size {
            FrameSizeEnum::Discrete(discrete) => Some((discrete.width, discrete.height)),
            FrameSizeEnum::Stepwise(step) => Some((step.max_width, step.max_height)),
        })
        .max_by_key(|(w, h)| w * h)
}

fn capture_loop(
    dev: Device,
    negotiated: Negotiated,
    stop: Arc<AtomicBool>,
    latest: Arc<LatestFrame>,
    mut preview: Option<FrameSender>,
    ready: std_mpsc::Sender<BackendResult<()>>,
) {
    let mut stream = match Stream::with_buffers(&dev, Type::VideoCapture, 4) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(BackendError::InitializationFailed(format!(
                "Failed to create buffer stream: {}",
                e
            ))));
            return;
        }
    };

    let mut signalled = false;
    let mut consecutive_errors = 0u32;
    let mut sequence = 0u64;
    let mut last_preview: Option<Instant> = None;

    while !stop.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) => {
                consecutive_errors += 1;
                warn!(error = %e, consecutive_errors, "Failed to dequeue frame");
                if consecutive_errors >= MAX_CONSECUTIVE_STREAM_ERRORS {
                    error!("Too many stream errors, stopping capture");
                    if !signalled {
                        let _ = ready.send(Err(BackendError::IoError(e.to_string())));
                    }
                    break;
                }
                continue;
            }
        };
        consecutive_errors = 0;

        let used = (meta.bytesused as usize).min(buf.len());
        let frame = CameraFrame {
            width: negotiated.width,
            height: negotiated.height,
            format: negotiated.format,
            stride: negotiated.stride,
            data: Arc::from(&buf[..used]),
            sequence,
            captured_at: Instant::now(),
        };
        sequence += 1;

        let mut preview_gone = false;
        if let Some(sender) = preview.as_mut() {
            let due = last_preview
                .map(|t| t.elapsed() >= PREVIEW_FRAME_INTERVAL)
                .unwrap_or(true);
            if due {
                last_preview = Some(Instant::now());
                let shown = if frame.format == PixelFormat::Mjpeg {
                    decode_to_rgba(&frame)
                } else {
                    Some(frame.clone())
                };
                // A full channel just drops the frame
                if let Some(shown) = shown
                    && let Err(e) = sender.try_send(shown)
                {
                    preview_gone = e.is_disconnected();
                }
            }
        }
        if preview_gone {
            debug!("Preview receiver dropped");
            preview = None;
        }

        *latest.frame.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        latest.fresh.notify_all();

        if !signalled {
            signalled = true;
            let _ = ready.send(Ok(()));
        }
    }

    latest.ended.store(true, Ordering::SeqCst);
    latest.fresh.notify_all();
    info!("V4L2 capture loop stopped");
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        enumerate_v4l2_cameras()
    }

    fn begin_configuration(&mut self) {
        self.graph.begin();
    }

    fn commit_configuration(&mut self) -> BackendResult<()> {
        self.graph.commit()
    }

    fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()> {
        // Opening proves the node exists and we may use it
        Device::with_path(&device.path).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to open {}: {}", device.path, e))
        })?;
        self.graph.add_input(device)
    }

    fn remove_input(&mut self) {
        self.graph.remove_input();
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
        if self.capture.is_some() {
            return Ok(());
        }
        let Some(device) = self.graph.input().cloned() else {
            return Err(BackendError::InitializationFailed("no input bound".to_string()));
        };

        info!(device = %device.name, path = %device.path, "Starting V4L2 capture");
        let dev = Device::with_path(Path::new(&device.path)).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to open {}: {}", device.path, e))
        })?;
        let negotiated = negotiate_format(&dev, self.graph.preset())?;

        let preview = if self.graph.has_output(OutputKind::Preview) {
            let (sender, receiver) = futures::channel::mpsc::channel(PREVIEW_CHANNEL_CAPACITY);
            self.preview_receiver = Some(receiver);
            Some(sender)
        } else {
            None
        };

        self.latest = Arc::new(LatestFrame::default());
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let thread_stop = Arc::clone(&stop);
        let latest = Arc::clone(&self.latest);
        let handle = thread::spawn(move || {
            capture_loop(dev, negotiated, thread_stop, latest, preview, ready_tx)
        });

        self.capture = Some(CaptureThread {
            stop,
            handle: Some(handle),
        });

        // Wait for the first frame so failures surface from start_running
        let outcome = match ready_rx.recv_timeout(BRING_UP_TIMEOUT) {
            Ok(result) => result,
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(BackendError::Timeout(
                "camera delivered no frames".to_string(),
            )),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(BackendError::InitializationFailed(
                "capture thread exited".to_string(),
            )),
        };

        if let Err(e) = outcome {
            self.stop_running();
            return Err(e);
        }
        Ok(())
    }

    fn stop_running(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop.store(true, Ordering::SeqCst);
            if let Some(handle) = capture.handle.take()
                && handle.join().is_err()
            {
                error!("V4L2 capture thread panicked");
            }
            info!("V4L2 capture stopped");
        }
        self.preview_receiver = None;
    }

    fn is_running(&self) -> bool {
        self.capture.is_some() && !self.latest.ended.load(Ordering::SeqCst)
    }

    fn capture_still(&mut self) -> BackendResult<CameraFrame> {
        if !self.is_running() {
            return Err(BackendError::NotRunning);
        }

        let latest = Arc::clone(&self.latest);
        let guard = latest.frame.lock().unwrap_or_else(PoisonError::into_inner);
        let after = guard.as_ref().map(|f| f.sequence);

        // The still must be exposed after the request, not an old buffer
        let (guard, timeout) = latest
            .fresh
            .wait_timeout_while(guard, STILL_CAPTURE_TIMEOUT, |frame| {
                let newer = match (frame.as_ref(), after) {
                    (Some(f), Some(seq)) => f.sequence > seq,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                !newer && !latest.ended.load(Ordering::SeqCst)
            })
            .unwrap_or_else(PoisonError::into_inner);

        if timeout.timed_out() {
            return Err(BackendError::Timeout("no frame for still capture".to_string()));
        }
        if latest.ended.load(Ordering::SeqCst) {
            return Err(BackendError::NotRunning);
        }
        guard.clone().ok_or(BackendError::NotRunning)
    }

    fn take_preview_receiver(&mut self) -> Option<FrameReceiver> {
        self.preview_receiver.take()
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        !enumerate_v4l2_cameras().is_empty()
    }
}

impl Drop for V4l2Backend {
    fn drop(&mut self) {
        self.stop_running();
    }
}
