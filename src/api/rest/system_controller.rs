use crate::api::rest::{ApiResult, AppState};
use crate::device_manager::{self, CameraHealth};
use crate::error::Error;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub database: String,
    pub cameras: Vec<CameraHealth>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub camera_id: String,
    pub snapshot_path: String,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/cameras/:camera_id/snapshot", post(capture_snapshot))
}

/// Database plus camera reachability; any failure degrades the status
pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    let (database_ok, cameras) = tokio::join!(
        state.db.health_check(),
        device_manager::probe_cameras(&state.directory, state.streaming.probe_timeout()),
    );

    let degraded = !database_ok || cameras.iter().any(|camera| !camera.reachable);
    Json(HealthReport {
        status: if degraded { "degraded" } else { "ok" }.to_string(),
        timestamp: Utc::now(),
        database: if database_ok { "ok" } else { "error" }.to_string(),
        cameras,
    })
}

pub async fn capture_snapshot(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Json<SnapshotResponse>> {
    let camera = state
        .directory
        .get(&camera_id)
        .ok_or_else(|| Error::NotFound(format!("Camera '{}' not configured", camera_id)))?;

    let path = device_manager::capture_snapshot(
        camera,
        &state.snapshots,
        state.streaming.snapshot_timeout(),
    )
    .await?;

    Ok(Json(SnapshotResponse {
        camera_id,
        snapshot_path: path.display().to_string(),
    }))
}
