// SPDX-License-Identifier: MPL-2.0

//! XDG desktop portal camera permission
//!
//! Uses `org.freedesktop.portal.Camera` on the session bus. The portal owns
//! the prompt and remembers the user's answer, so there is no status query:
//! with a camera present we report `NotDetermined` and let `AccessCamera`
//! resolve it (silently when already decided).

use super::{AuthorizationStatus, PermissionProvider};
use futures::StreamExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_SERVICE: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Response code the portal uses for "granted"
const RESPONSE_SUCCESS: u32 = 0;

#[derive(Debug, Default)]
pub struct PortalPermission {
    next_token: AtomicU32,
}

impl PortalPermission {
    pub fn new() -> Self {
        Self::default()
    }

    async fn camera_present(&self) -> Result<bool, zbus::Error> {
        let connection = zbus::Connection::session().await?;
        let proxy =
            zbus::Proxy::new(&connection, PORTAL_SERVICE, PORTAL_PATH, CAMERA_INTERFACE).await?;
        proxy.get_property::<bool>("IsCameraPresent").await
    }

    async fn access_camera(&self) -> Result<bool, zbus::Error> {
        let connection = zbus::Connection::session().await?;

        let token = format!(
            "fill_light_{}_{}",
            std::process::id(),
            self.next_token.fetch_add(1, Ordering::SeqCst)
        );
        let sender = connection
            .unique_name()
            .ok_or_else(|| zbus::Error::Failure("connection has no unique name".to_string()))?
            .as_str()
            .trim_start_matches(':')
            .replace('.', "_");
        let handle_path = format!("{}/request/{}/{}", PORTAL_PATH, sender, token);

        // Subscribe before calling so a fast answer cannot be missed
        let request = zbus::Proxy::new(
            &connection,
            PORTAL_SERVICE,
            handle_path.as_str(),
            REQUEST_INTERFACE,
        )
        .await?;
        let mut responses = request.receive_signal("Response").await?;

        let camera =
            zbus::Proxy::new(&connection, PORTAL_SERVICE, PORTAL_PATH, CAMERA_INTERFACE).await?;
        let mut options: HashMap<&str, Value<'_>> = HashMap::new();
        options.insert("handle_token", Value::from(token.as_str()));
        let handle: OwnedObjectPath = camera.call("AccessCamera", &(options,)).await?;
        debug!(handle = %handle, "Camera access requested");

        let message = responses
            .next()
            .await
            .ok_or_else(|| zbus::Error::Failure("portal request closed".to_string()))?;
        let body = message.body();
        let (response, _results): (u32, HashMap<String, OwnedValue>) = body.deserialize()?;

        info!(response, "Camera portal answered");
        Ok(response == RESPONSE_SUCCESS)
    }
}

impl PermissionProvider for PortalPermission {
    fn authorization_status(&self) -> BoxFuture<'_, AuthorizationStatus> {
        Box::pin(async move {
            match self.camera_present().await {
                Ok(true) => AuthorizationStatus::NotDetermined,
                Ok(false) => {
                    // Nothing to grant; device lookup reports the missing camera
                    debug!("Camera portal reports no camera present");
                    AuthorizationStatus::Authorized
                }
                Err(e) => {
                    warn!(error = %e, "Camera portal unavailable");
                    AuthorizationStatus::Unknown
                }
            }
        })
    }

    fn request_access(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.access_camera().await {
                Ok(granted) => granted,
                Err(e) => {
                    warn!(error = %e, "Camera portal request failed");
                    false
                }
            }
        })
    }
}
