use crate::api::rest::{ApiResult, AppState};
use crate::db::models::{Alert, AlertFilter, AlertKind};
use crate::error::Error;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use chrono::Utc;
use log::info;
use std::str::FromStr;
use uuid::Uuid;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/:id/resolve", put(resolve_alert))
}

/// Newest first, filterable by type and resolution
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(filter): Query<AlertFilter>,
) -> ApiResult<Json<Vec<Alert>>> {
    if let Some(alert_type) = &filter.alert_type {
        AlertKind::from_str(alert_type).map_err(Error::Validation)?;
    }

    let mut session = state.session().await?;
    let alerts = session.list_alerts(&filter).await?;
    Ok(Json(alerts))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Alert>> {
    let mut session = state.session().await?;
    let alert = session
        .resolve_alert(id, Utc::now())
        .await?
        .ok_or_else(|| Error::NotFound(format!("Alert {} not found", id)))?;
    session.commit().await?;

    info!("Alert {} ({}) resolved", alert.id, alert.alert_type);
    Ok(Json(alert))
}
