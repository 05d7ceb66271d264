// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking photos

use fill_light::backends::camera::{CameraBackendType, get_backend_for_type};
use fill_light::{CaptureSessionController, SessionEvent};
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;

/// How long to wait for a captured photo to reach the disk
const SAVE_TIMEOUT: Duration = Duration::from_secs(10);

/// List all available cameras
pub fn list_cameras(backend_type: CameraBackendType) -> Result<(), Box<dyn std::error::Error>> {
    let cameras = get_backend_for_type(backend_type).enumerate_cameras();
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.name, camera.position);
        println!("      Path: {}", camera.path);
        if let Some(info) = &camera.device_info {
            println!("      Driver: {} ({})", info.driver, info.bus);
        }
        println!();
    }

    Ok(())
}

/// Start the session, take one photo, save it and stop
pub fn take_photo(
    runtime: &Runtime,
    controller: CaptureSessionController,
) -> Result<(), Box<dyn std::error::Error>> {
    runtime.block_on(async {
        let mut events = controller.subscribe();

        controller.start().await?;
        if let Some(device) = controller.current_device() {
            println!("Using camera: {}", device.name);
        }

        let result = capture_and_save(&controller, &mut events).await;
        controller.stop().await;
        result
    })
}

async fn capture_and_save(
    controller: &CaptureSessionController,
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pending = controller.capture_photo()?;
    let request_id = pending.request_id();

    let photo = pending.await?;
    println!("Captured {}x{} ({} bytes)", photo.width, photo.height, photo.data.len());

    let saved = tokio::time::timeout(SAVE_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::PhotoSaved { request_id: id, path }) if id == request_id => {
                    return Ok(path);
                }
                Ok(SessionEvent::PersistFailed { request_id: id, reason }) if id == request_id => {
                    return Err(reason);
                }
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    return Err("session closed".to_string());
                }
            }
        }
    })
    .await
    .map_err(|_| "Timed out waiting for the photo to be saved")?;

    let path: PathBuf = saved.map_err(|reason| format!("Failed to save photo: {}", reason))?;
    println!("Photo saved to: {}", path.display());
    Ok(())
}
