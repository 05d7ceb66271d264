// SPDX-License-Identifier: MPL-2.0

//! Error types for the fill light application

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture session errors
    Capture(CaptureError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Errors reported by the capture session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No matching camera hardware, or the device input could not be built
    DeviceUnavailable(String),
    /// Camera authorization was not granted
    PermissionDenied,
    /// Capture requested while the session is not running
    SessionNotReady,
    /// Hardware or encoding failure during a still capture
    CaptureFailed(String),
    /// Saving a captured photo failed (logged, never surfaced as a capture failure)
    PersistFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            CaptureError::PermissionDenied => write!(
                f,
                "Camera permission denied. Allow camera access in your system settings"
            ),
            CaptureError::SessionNotReady => write!(f, "Camera session is not running"),
            CaptureError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::PersistFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::PersistFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        assert!(format!("{}", CaptureError::PermissionDenied).contains("permission denied"));

        let err = AppError::from(CaptureError::DeviceUnavailable("no front camera found".into()));
        assert_eq!(
            err.to_string(),
            "Capture error: Camera unavailable: no front camera found"
        );
    }
}
