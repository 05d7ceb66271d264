// SPDX-License-Identifier: MPL-2.0

//! Camera authorization
//!
//! The capture session asks a [`PermissionProvider`] before binding any
//! device. Providers answer asynchronously since a request may put a prompt
//! in front of the user.

pub mod device_node;
pub mod portal;

pub use device_node::DeviceNodePermission;
pub use portal::PortalPermission;

use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Camera authorization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    /// Access granted
    Authorized,
    /// The user has not been asked yet
    NotDetermined,
    /// The user refused access
    Denied,
    /// Access blocked by policy
    Restricted,
    /// The provider returned something we do not understand
    Unknown,
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationStatus::Authorized => write!(f, "authorized"),
            AuthorizationStatus::NotDetermined => write!(f, "not determined"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Restricted => write!(f, "restricted"),
            AuthorizationStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Source of camera authorization decisions
pub trait PermissionProvider: Send + Sync {
    /// Current authorization state, without prompting
    fn authorization_status(&self) -> BoxFuture<'_, AuthorizationStatus>;

    /// Ask for access, possibly prompting the user. Resolves to `true` if granted.
    fn request_access(&self) -> BoxFuture<'_, bool>;
}

/// Provider with a fixed answer
///
/// Backs the `--permission granted|denied` overrides and tests.
#[derive(Debug)]
pub struct StaticPermission {
    status: AuthorizationStatus,
    grant_on_request: bool,
    requests: AtomicUsize,
}

impl StaticPermission {
    pub fn new(status: AuthorizationStatus, grant_on_request: bool) -> Self {
        Self {
            status,
            grant_on_request,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(AuthorizationStatus::Authorized, true)
    }

    pub fn denied() -> Self {
        Self::new(AuthorizationStatus::Denied, false)
    }

    /// Not asked yet; the prompt answers `grant`
    pub fn undetermined(grant: bool) -> Self {
        Self::new(AuthorizationStatus::NotDetermined, grant)
    }

    /// Number of access requests made so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for StaticPermission {
    fn authorization_status(&self) -> BoxFuture<'_, AuthorizationStatus> {
        Box::pin(async move { self.status })
    }

    fn request_access(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.grant_on_request
        })
    }
}

/// Pick a provider for the current environment
///
/// Sandboxed (Flatpak) builds must go through the desktop portal; native
/// builds are governed by device node permissions.
pub fn default_provider() -> Arc<dyn PermissionProvider> {
    if std::path::Path::new("/.flatpak-info").exists() {
        Arc::new(PortalPermission::new())
    } else {
        Arc::new(DeviceNodePermission::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_permission_counts_requests() {
        let provider = StaticPermission::undetermined(true);
        assert_eq!(
            provider.authorization_status().await,
            AuthorizationStatus::NotDetermined
        );
        assert!(provider.request_access().await);
        assert!(provider.request_access().await);
        assert_eq!(provider.requests(), 2);
    }
}
