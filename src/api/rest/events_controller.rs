use crate::api::rest::{ApiResult, AppState};
use crate::db::models::{CameraEvent, EventFilter};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info};
use serde_json::json;
use std::net::SocketAddr;

/// Snapshot-carrying multipart bodies run to a few megabytes
const MAX_EVENT_BODY: usize = 16 * 1024 * 1024;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/events/camera",
            post(receive_camera_event).layer(DefaultBodyLimit::max(MAX_EVENT_BODY)),
        )
        .route("/events", get(list_events))
}

/// Camera webhook. Cameras retry anything but 200, so every processed body is acknowledged.
pub async fn receive_camera_event(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "ignored", "reason": "empty body"})),
        )
            .into_response();
    }

    let source = peer
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    info!(
        "Event from {} | {} bytes | {}",
        source,
        body.len(),
        content_type.unwrap_or("-")
    );

    match state
        .pipeline
        .ingest_body(&body, content_type, &source)
        .await
    {
        Ok(ingested) => Json(json!({
            "status": "ok",
            "camera_id": ingested.record.camera_id,
            "event_type": ingested.record.kind.to_string(),
        }))
        .into_response(),
        Err(e) => {
            error!("Event processing error from {}: {:#}", source, e);
            Json(json!({"status": "error", "detail": e.to_string()})).into_response()
        }
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Json<Vec<CameraEvent>>> {
    let mut session = state.session().await?;
    let events = session.list_camera_events(&filter).await?;
    Ok(Json(events))
}
