use crate::api::rest::{ApiResult, AppState};
use crate::db::models::{
    DailyStats, EntryExitFilter, EntryExitLog, NewVehicle, Vehicle, VehicleFilter,
};
use crate::error::Error;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use log::info;
use serde::{Deserialize, Serialize};

const VEHICLE_TYPES: [&str; 2] = ["employee", "visitor"];

#[derive(Debug, Serialize)]
pub struct PlateLookup {
    pub plate: String,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DailyStatsQuery {
    /// UTC day, defaults to today
    pub date: Option<NaiveDate>,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/vehicles", get(list_vehicles).post(register_vehicle))
        .route("/vehicles/lookup/:plate", get(lookup_vehicle))
        .route("/entry-exit", get(list_entry_exit))
        .route("/stats/daily", get(daily_stats))
}

pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(filter): Query<VehicleFilter>,
) -> ApiResult<Json<Vec<Vehicle>>> {
    let mut session = state.session().await?;
    let vehicles = session
        .list_vehicles(filter.vehicle_type.as_deref())
        .await?;
    Ok(Json(vehicles))
}

pub async fn register_vehicle(
    State(state): State<AppState>,
    Json(request): Json<NewVehicle>,
) -> ApiResult<(StatusCode, Json<Vehicle>)> {
    if request.plate_number.trim().is_empty() {
        return Err(Error::Validation("plate_number is required".to_string()).into());
    }
    if !VEHICLE_TYPES.contains(&request.vehicle_type.as_str()) {
        return Err(Error::Validation(format!(
            "vehicle_type must be one of {:?}",
            VEHICLE_TYPES
        ))
        .into());
    }

    let mut session = state.session().await?;
    let vehicle = session.insert_vehicle(&Vehicle::from(request)).await?;
    session.commit().await?;

    info!(
        "Registered {} vehicle {} ({})",
        vehicle.vehicle_type, vehicle.plate_number, vehicle.owner_name
    );
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn lookup_vehicle(
    State(state): State<AppState>,
    Path(plate): Path<String>,
) -> ApiResult<Json<PlateLookup>> {
    let mut session = state.session().await?;
    let lookup = match session.find_vehicle(&plate).await? {
        Some(vehicle) => PlateLookup {
            plate,
            registered: true,
            owner: Some(vehicle.owner_name),
            vehicle_type: Some(vehicle.vehicle_type),
        },
        None => PlateLookup {
            plate,
            registered: false,
            owner: None,
            vehicle_type: None,
        },
    };
    Ok(Json(lookup))
}

pub async fn list_entry_exit(
    State(state): State<AppState>,
    Query(filter): Query<EntryExitFilter>,
) -> ApiResult<Json<Vec<EntryExitLog>>> {
    let mut session = state.session().await?;
    let rows = session.list_entry_exit(&filter).await?;
    Ok(Json(rows))
}

/// Entries, exits and mean dwell of matched exits for one UTC day
pub async fn daily_stats(
    State(state): State<AppState>,
    Query(query): Query<DailyStatsQuery>,
) -> ApiResult<Json<DailyStats>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Validation(format!("invalid date {}", date)))?;
    let start = Utc.from_utc_datetime(&midnight);
    let end = start + Duration::days(1);

    let mut session = state.session().await?;
    let counts = session.daily_counts(start, end).await?;
    Ok(Json(DailyStats::new(date, counts)))
}
