pub mod alert_stream;
pub mod digest_auth;
pub mod isapi_client;

pub use alert_stream::{AlertStreamConnector, Backoff, ConnectionState};
pub use isapi_client::{IsapiClient, IsapiError};

use crate::config::{CameraConfig, CameraDirectory};
use crate::services::SnapshotStore;
use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Reachability of one camera
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CameraHealth {
    pub camera_id: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probe every configured camera concurrently
pub async fn probe_cameras(directory: &CameraDirectory, timeout: Duration) -> Vec<CameraHealth> {
    let probes = directory.iter().map(|camera| async move {
        let result = match IsapiClient::new(camera, timeout) {
            Ok(client) => client.probe_device_info(timeout).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => CameraHealth {
                camera_id: camera.id.clone(),
                reachable: true,
                error: None,
            },
            Err(e) => {
                warn!("[{}] Health probe failed: {}", camera.id, e);
                CameraHealth {
                    camera_id: camera.id.clone(),
                    reachable: false,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    join_all(probes).await
}

/// Pull a picture from the camera into the snapshot store
pub async fn capture_snapshot(
    camera: &CameraConfig,
    store: &SnapshotStore,
    timeout: Duration,
) -> Result<PathBuf> {
    let client = IsapiClient::new(camera, timeout)?;
    let bytes = client.fetch_snapshot(timeout).await?;
    let path = store.save(&camera.id, Utc::now(), 0, "jpg", &bytes).await?;
    info!("[{}] Snapshot captured: {}", camera.id, path.display());
    Ok(path)
}
