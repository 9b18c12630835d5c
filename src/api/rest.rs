pub mod alerts_controller;
pub mod events_controller;
pub mod occupancy_controller;
pub mod system_controller;
pub mod vehicles_controller;

use crate::config::{ApiConfig, CameraDirectory, StreamingConfig};
use crate::db::{Database, Session};
use crate::device_manager::IsapiError;
use crate::error::Error;
use crate::services::{EventPipeline, SnapshotStore};
use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use log::info;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub pipeline: Arc<EventPipeline>,
    pub directory: Arc<CameraDirectory>,
    pub snapshots: SnapshotStore,
    pub streaming: StreamingConfig,
}

impl AppState {
    /// Open a unit of work for one request
    pub async fn session(&self) -> Result<Box<dyn Session>> {
        self.db.session().await
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::Validation(_) | Error::Parse(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::Transport(_) | Error::Camera(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return (*err).clone().into();
        }
        if let Some(err) = err.downcast_ref::<IsapiError>() {
            return ApiError::new(StatusCode::BAD_GATEWAY, err.to_string());
        }

        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Complete application router
pub fn router(state: AppState) -> Router {
    // Create a CORS layer that allows all origins and preflight requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600));

    let snapshots = ServeDir::new(state.snapshots.dir());

    let api = Router::new()
        .merge(events_controller::create_router())
        .merge(occupancy_controller::create_router())
        .merge(alerts_controller::create_router())
        .merge(vehicles_controller::create_router())
        .merge(system_controller::create_router());

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .nest_service("/snapshots", snapshots)
        .layer(cors)
}

pub struct RestApi {
    config: ApiConfig,
    state: AppState,
}

impl RestApi {
    pub fn new(config: &ApiConfig, state: AppState) -> Self {
        Self {
            config: config.clone(),
            state,
        }
    }

    /// Serve until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let app = router(self.state.clone());

        // Build the server address
        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        info!("API server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        // Peer addresses identify webhook senders
        axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}
