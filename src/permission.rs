// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission
//!
//! Two gates are available. [`DevicePermission`] only checks whether the
//! process can open a V4L2 node. [`PortalPermission`] asks the XDG desktop
//! portal (`org.freedesktop.portal.Camera`) over D-Bus, which is what grants
//! camera access inside a Flatpak sandbox and shows the user a prompt.

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zbus::zvariant::{ObjectPath, OwnedValue, Value};

const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Result of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

/// Which permission gate to use
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionBackend {
    /// XDG desktop portal, falling back to device access outside a sandbox
    #[default]
    Portal,
    /// Device node access only
    Device,
}

/// Checks and requests the camera permission
pub trait PermissionGate: Send + Sync {
    /// Whether capture may start right now
    fn has_permission(&self) -> bool;

    /// Ask for access; resolves once the user (or system) has answered
    fn request_permission(&self) -> BoxFuture<'_, PermissionOutcome>;
}

/// Build the gate selected in the configuration
pub fn gate_for(backend: PermissionBackend) -> Box<dyn PermissionGate> {
    match backend {
        PermissionBackend::Portal => Box::new(PortalPermission::new()),
        PermissionBackend::Device => Box::new(DevicePermission::new()),
    }
}

/// Check the permission and request it when missing
pub async fn ensure_permission(gate: &dyn PermissionGate) -> PermissionOutcome {
    if gate.has_permission() {
        debug!("Camera permission already granted");
        return PermissionOutcome::Granted;
    }

    info!("Requesting camera permission");
    let outcome = gate.request_permission().await;
    match outcome {
        PermissionOutcome::Granted => info!("Camera permission granted"),
        PermissionOutcome::Denied => warn!("Camera permission denied"),
    }
    outcome
}

/// Permission derived from read/write access to `/dev/video*`
#[derive(Debug, Clone)]
pub struct DevicePermission {
    dev_dir: PathBuf,
}

impl Default for DevicePermission {
    fn default() -> Self {
        Self::new()
    }
}

impl DevicePermission {
    pub fn new() -> Self {
        Self::with_dev_dir("/dev")
    }

    /// Look for video nodes in another directory
    pub fn with_dev_dir(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }

    fn video_nodes(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dev_dir) else {
            return Vec::new();
        };
        let mut nodes: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("video"))
            })
            .collect();
        nodes.sort();
        nodes
    }
}

impl PermissionGate for DevicePermission {
    fn has_permission(&self) -> bool {
        let accessible = self.video_nodes().iter().any(|p| can_read_write(p));
        debug!(dir = %self.dev_dir.display(), accessible, "Checked video device access");
        accessible
    }

    fn request_permission(&self) -> BoxFuture<'_, PermissionOutcome> {
        // Device permissions cannot be granted interactively
        let outcome = if self.has_permission() {
            PermissionOutcome::Granted
        } else {
            PermissionOutcome::Denied
        };
        async move { outcome }.boxed()
    }
}

fn can_read_write(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

/// Permission granted through the XDG camera portal
#[derive(Debug, Clone, Default)]
pub struct PortalPermission {
    device: DevicePermission,
}

impl PortalPermission {
    pub fn new() -> Self {
        Self {
            device: DevicePermission::new(),
        }
    }
}

impl PermissionGate for PortalPermission {
    fn has_permission(&self) -> bool {
        self.device.has_permission()
    }

    fn request_permission(&self) -> BoxFuture<'_, PermissionOutcome> {
        async move {
            match access_camera().await {
                Ok(response) => {
                    debug!(response, "Camera portal answered");
                    portal_outcome(response)
                }
                Err(e) => {
                    // No portal outside a desktop session, the device nodes decide
                    warn!(error = %e, "Camera portal unavailable, checking device access");
                    self.device.request_permission().await
                }
            }
        }
        .boxed()
    }
}

/// Map a portal Request response code (0 success, 1 cancelled, 2 other)
pub fn portal_outcome(response: u32) -> PermissionOutcome {
    if response == 0 {
        PermissionOutcome::Granted
    } else {
        PermissionOutcome::Denied
    }
}

/// Object path the portal will use for a request with `token`
fn request_path(unique_name: &str, token: &str) -> String {
    let sender = unique_name.trim_start_matches(':').replace('.', "_");
    format!("{}/request/{}/{}", PORTAL_PATH, sender, token)
}

/// Call `AccessCamera` and wait for the user's answer
async fn access_camera() -> zbus::Result<u32> {
    let connection = zbus::Connection::session().await?;

    let camera = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        PORTAL_PATH,
        CAMERA_INTERFACE,
    )
    .await?;

    let present: bool = camera.get_property("IsCameraPresent").await?;
    if !present {
        info!("Camera portal reports no camera");
        return Ok(2);
    }

    let unique_name = connection
        .unique_name()
        .map(|n| n.to_string())
        .unwrap_or_default();
    let token = format!("qr_reader_{}", std::process::id());

    // Subscribe before calling so the response cannot be missed
    let request = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        ObjectPath::try_from(request_path(&unique_name, &token))?,
        REQUEST_INTERFACE,
    )
    .await?;
    let mut responses = request.receive_signal("Response").await?;

    let mut options: HashMap<&str, Value> = HashMap::new();
    options.insert("handle_token", Value::new(token.as_str()));
    let handle: zbus::zvariant::OwnedObjectPath =
        camera.call("AccessCamera", &(options,)).await?;
    debug!(handle = %handle, "Camera access requested");

    let message = responses
        .next()
        .await
        .ok_or_else(|| zbus::Error::Failure("Portal request closed without response".into()))?;
    let (response, _results): (u32, HashMap<String, OwnedValue>) = message.body().deserialize()?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_outcome() {
        assert_eq!(portal_outcome(0), PermissionOutcome::Granted);
        assert_eq!(portal_outcome(1), PermissionOutcome::Denied);
        assert_eq!(portal_outcome(2), PermissionOutcome::Denied);
    }

    #[test]
    fn test_request_path() {
        assert_eq!(
            request_path(":1.42", "qr_reader_7"),
            "/org/freedesktop/portal/desktop/request/1_42/qr_reader_7"
        );
    }

    #[tokio::test]
    async fn test_device_permission_without_nodes_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let gate = DevicePermission::with_dev_dir(dir.path());

        assert!(!gate.has_permission());
        assert_eq!(ensure_permission(&gate).await, PermissionOutcome::Denied);
    }

    #[tokio::test]
    async fn test_device_permission_with_accessible_node() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video0"), b"").unwrap();
        std::fs::write(dir.path().join("audio0"), b"").unwrap();
        let gate = DevicePermission::with_dev_dir(dir.path());

        assert!(gate.has_permission());
        assert_eq!(ensure_permission(&gate).await, PermissionOutcome::Granted);
    }
}
