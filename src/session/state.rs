// SPDX-License-Identifier: GPL-3.0-only

//! Capture session state machine

use super::photo::CaptureRequestId;
use std::path::PathBuf;

/// Lifecycle of a capture session
///
/// ```text
/// Idle ──► Configuring ──► Running ──► Stopped
///  ▲           │  │                      │
///  └───────────┘  └──────► Stopped       │
///  ▲                                     │
///  └─────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Binding the device and outputs, bringing up hardware
    Configuring,
    Running,
    Stopped,
}

impl SessionState {
    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Configuring)
                | (Configuring, Running)
                // bring-up failed
                | (Configuring, Idle)
                // stopped during bring-up
                | (Configuring, Stopped)
                | (Running, Stopped)
                | (Stopped, Idle)
        )
    }

    pub fn is_running(self) -> bool {
        self == SessionState::Running
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Configuring => write!(f, "configuring"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Notifications for whoever draws the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Camera access was refused; tell the user how to grant it
    PermissionAlert,
    PhotoCaptured(CaptureRequestId),
    PhotoSaved {
        request_id: CaptureRequestId,
        path: PathBuf,
    },
    /// Best-effort save failed; the capture itself succeeded
    PersistFailed {
        request_id: CaptureRequestId,
        reason: String,
    },
}
