use crate::api::rest::{ApiResult, AppState};
use crate::db::models::ZoneOccupancyView;
use crate::error::Error;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use log::info;
use serde::{Deserialize, Serialize};

/// Zones created by an operator instead of a camera
const MANUAL_CAMERA: &str = "manual";

#[derive(Debug, Deserialize)]
pub struct CapacityUpdate {
    pub max_capacity: i32,
}

#[derive(Debug, Serialize)]
pub struct ZoneUpdateResponse {
    pub zone_id: String,
    pub current_count: i32,
    pub max_capacity: i32,
    pub status: String,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/occupancy", get(list_occupancy))
        .route("/occupancy/:zone_id", get(get_zone_occupancy))
        .route("/occupancy/:zone_id/capacity", put(set_zone_capacity))
        .route("/occupancy/:zone_id/reset", put(reset_zone_count))
}

pub async fn list_occupancy(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ZoneOccupancyView>>> {
    let mut session = state.session().await?;
    let zones = session.list_zones().await?;
    Ok(Json(zones.into_iter().map(ZoneOccupancyView::from).collect()))
}

pub async fn get_zone_occupancy(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> ApiResult<Json<ZoneOccupancyView>> {
    let mut session = state.session().await?;
    let zone = session
        .find_zone(&zone_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Zone '{}' not found", zone_id)))?;
    Ok(Json(zone.into()))
}

/// Set a zone's capacity, creating the zone when no camera has reported it yet
pub async fn set_zone_capacity(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Json(update): Json<CapacityUpdate>,
) -> ApiResult<Json<ZoneUpdateResponse>> {
    if update.max_capacity <= 0 {
        return Err(Error::Validation("max_capacity must be positive".to_string()).into());
    }

    let mut session = state.session().await?;
    let mut zone = session
        .find_or_create_zone(&zone_id, MANUAL_CAMERA, update.max_capacity)
        .await?;
    zone.max_capacity = update.max_capacity;
    let zone = session.update_zone(&zone).await?;
    session.commit().await?;

    info!("Zone {} capacity set to {}", zone.zone_id, zone.max_capacity);
    Ok(Json(ZoneUpdateResponse {
        zone_id: zone.zone_id,
        current_count: zone.current_count,
        max_capacity: zone.max_capacity,
        status: "updated".to_string(),
    }))
}

pub async fn reset_zone_count(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> ApiResult<Json<ZoneUpdateResponse>> {
    let mut session = state.session().await?;
    let mut zone = session
        .find_zone(&zone_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Zone '{}' not found", zone_id)))?;
    zone.apply_delta(-zone.current_count);
    let zone = session.update_zone(&zone).await?;
    session.commit().await?;

    info!("Zone {} count reset", zone.zone_id);
    Ok(Json(ZoneUpdateResponse {
        zone_id: zone.zone_id,
        current_count: zone.current_count,
        max_capacity: zone.max_capacity,
        status: "reset".to_string(),
    }))
}
