// SPDX-License-Identifier: MPL-2.0

//! Permission check based on V4L2 device node access
//!
//! Outside a sandbox, camera access is decided by the file mode of
//! `/dev/video*` (usually the `video` group). There is nobody to prompt, so
//! a request just looks again. Without any nodes there is nothing to deny;
//! the session reports the missing camera when it resolves the device.

use super::{AuthorizationStatus, PermissionProvider};
use futures::future::BoxFuture;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DeviceNodePermission {
    dev_dir: PathBuf,
}

impl DeviceNodePermission {
    pub fn new() -> Self {
        Self::with_dev_dir("/dev")
    }

    /// Check nodes under another directory
    pub fn with_dev_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dir.into(),
        }
    }

    fn check(&self) -> AuthorizationStatus {
        let Ok(entries) = std::fs::read_dir(&self.dev_dir) else {
            return AuthorizationStatus::Restricted;
        };

        let mut denied = false;
        let mut seen = false;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("video") {
                continue;
            }
            seen = true;

            match OpenOptions::new().read(true).open(entry.path()) {
                Ok(_) => return AuthorizationStatus::Authorized,
                Err(e) if matches!(e.kind(), ErrorKind::PermissionDenied) => {
                    debug!(path = %entry.path().display(), "No access to video node");
                    denied = true;
                }
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "Video node not usable");
                }
            }
        }

        match (seen, denied) {
            (_, true) => AuthorizationStatus::Denied,
            (false, _) => {
                debug!(dir = %self.dev_dir.display(), "No video nodes present");
                AuthorizationStatus::Authorized
            }
            (true, false) => AuthorizationStatus::Restricted,
        }
    }
}

impl Default for DeviceNodePermission {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionProvider for DeviceNodePermission {
    fn authorization_status(&self) -> BoxFuture<'_, AuthorizationStatus> {
        Box::pin(async move { self.check() })
    }

    fn request_access(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.check() == AuthorizationStatus::Authorized })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readable_node_is_authorized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video0"), b"").unwrap();

        let provider = DeviceNodePermission::with_dev_dir(dir.path());
        assert_eq!(
            provider.authorization_status().await,
            AuthorizationStatus::Authorized
        );
        assert!(provider.request_access().await);
    }

    #[tokio::test]
    async fn test_no_nodes_is_not_a_permission_problem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("null"), b"").unwrap();

        let provider = DeviceNodePermission::with_dev_dir(dir.path());
        assert_eq!(
            provider.authorization_status().await,
            AuthorizationStatus::Authorized
        );
        assert!(provider.request_access().await);
    }

    #[tokio::test]
    async fn test_missing_dev_dir_is_restricted() {
        let provider = DeviceNodePermission::with_dev_dir("/nonexistent/fill-light-dev");
        assert_eq!(
            provider.authorization_status().await,
            AuthorizationStatus::Restricted
        );
    }
}
