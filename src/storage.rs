// SPDX-License-Identifier: MPL-2.0

//! Storage for captured photos

use crate::errors::CaptureError;
use crate::session::CapturedPhoto;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Destination for captured photos
///
/// Saving is best-effort: the session reports failures but never retries.
pub trait PhotoLibrary: Send + Sync {
    fn save(&self, photo: CapturedPhoto) -> BoxFuture<'static, Result<PathBuf, CaptureError>>;
}

/// Writes JPEG files into a directory
#[derive(Debug, Clone)]
pub struct DirectoryPhotoLibrary {
    directory: PathBuf,
}

impl DirectoryPhotoLibrary {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// File name for a photo, unique per request within one second
pub fn photo_file_name(photo: &CapturedPhoto) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("IMG_{}_{}.jpg", timestamp, photo.request_id.0)
}

impl PhotoLibrary for DirectoryPhotoLibrary {
    fn save(&self, photo: CapturedPhoto) -> BoxFuture<'static, Result<PathBuf, CaptureError>> {
        let filepath = self.directory.join(photo_file_name(&photo));
        let directory = self.directory.clone();

        Box::pin(async move {
            info!(path = %filepath.display(), "Saving photo");

            let target = filepath.clone();
            tokio::task::spawn_blocking(move || {
                std::fs::create_dir_all(&directory)?;
                std::fs::write(&target, &photo.data)
            })
            .await
            .map_err(|e| CaptureError::PersistFailed(format!("save task error: {}", e)))??;

            Ok(filepath)
        })
    }
}

/// Most recently modified JPEG or PNG in `dir`
pub async fn latest_photo(dir: PathBuf) -> Option<PathBuf> {
    tokio::task::spawn_blocking(move || {
        let entries = std::fs::read_dir(&dir).ok()?;
        let latest = entries
            .flatten()
            .filter(|entry| {
                entry.path().extension().is_some_and(|ext| {
                    let ext = ext.to_string_lossy();
                    ext.eq_ignore_ascii_case("jpg")
                        || ext.eq_ignore_ascii_case("jpeg")
                        || ext.eq_ignore_ascii_case("png")
                })
            })
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((modified, entry.path()))
            })
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path);

        debug!(path = ?latest, "Latest photo");
        latest
    })
    .await
    .ok()
    .flatten()
}
