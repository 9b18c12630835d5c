//! Persistence seams.
//!
//! Every unit of work opens one [`Session`], performs its reads and writes through it and commits.
//! Dropping a session without committing discards its writes. Sessions are never shared between
//! tasks or held across a stream's lifetime.

use crate::db::models::{
    Alert, AlertFilter, AlertKind, CameraEvent, DailyCounts, EntryExitFilter, EntryExitLog,
    EventFilter, Vehicle, ZoneOccupancy,
};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

pub mod alerts;
pub mod entry_exit;
pub mod events;
pub mod vehicles;
pub mod zones;

/// Page size when the caller does not ask for one
pub const DEFAULT_LIMIT: i64 = 50;

pub(crate) fn limit_or_default(limit: Option<i64>) -> i64 {
    limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
}

#[async_trait]
pub trait EventsRepository: Send {
    async fn insert_camera_event(&mut self, event: &CameraEvent) -> Result<CameraEvent>;

    /// Most recent first
    async fn list_camera_events(&mut self, filter: &EventFilter) -> Result<Vec<CameraEvent>>;
}

#[async_trait]
pub trait ZonesRepository: Send {
    async fn find_zone(&mut self, zone_id: &str) -> Result<Option<ZoneOccupancy>>;

    /// Fetch the zone, creating it with `default_capacity` on first sight.
    /// The row stays locked until the session ends.
    async fn find_or_create_zone(
        &mut self,
        zone_id: &str,
        camera_id: &str,
        default_capacity: i32,
    ) -> Result<ZoneOccupancy>;

    async fn update_zone(&mut self, zone: &ZoneOccupancy) -> Result<ZoneOccupancy>;

    async fn list_zones(&mut self) -> Result<Vec<ZoneOccupancy>>;
}

#[async_trait]
pub trait AlertsRepository: Send {
    async fn insert_alert(&mut self, alert: &Alert) -> Result<Alert>;

    /// Newest alert of `kind` for exactly `zone_id` triggered at or after `since`
    async fn recent_alert(
        &mut self,
        kind: AlertKind,
        zone_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>>;

    async fn list_alerts(&mut self, filter: &AlertFilter) -> Result<Vec<Alert>>;

    /// Mark resolved; `None` when no such alert exists
    async fn resolve_alert(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Alert>>;
}

#[async_trait]
pub trait VehiclesRepository: Send {
    async fn find_vehicle(&mut self, plate_number: &str) -> Result<Option<Vehicle>>;

    async fn list_vehicles(&mut self, vehicle_type: Option<&str>) -> Result<Vec<Vehicle>>;

    /// Fails with [`Error::AlreadyExists`] for a known plate
    async fn insert_vehicle(&mut self, vehicle: &Vehicle) -> Result<Vehicle>;
}

#[async_trait]
pub trait EntryExitRepository: Send {
    async fn insert_entry_exit(&mut self, log: &EntryExitLog) -> Result<EntryExitLog>;

    /// Newest entry row for the plate that has not been paired yet
    async fn latest_unmatched_entry(&mut self, plate_number: &str)
        -> Result<Option<EntryExitLog>>;

    async fn set_match(&mut self, id: Uuid, matched_id: Uuid) -> Result<()>;

    async fn list_entry_exit(&mut self, filter: &EntryExitFilter) -> Result<Vec<EntryExitLog>>;

    /// Aggregates over crossings with `start <= event_time < end`
    async fn daily_counts(&mut self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<DailyCounts>;
}

/// One isolated unit of work over all five stores
#[async_trait]
pub trait Session:
    EventsRepository + ZonesRepository + AlertsRepository + VehiclesRepository + EntryExitRepository
{
    /// Make every write of this session durable. The session is unusable afterwards.
    async fn commit(&mut self) -> Result<()>;
}

/// Source of sessions
#[async_trait]
pub trait Database: Send + Sync {
    async fn session(&self) -> Result<Box<dyn Session>>;

    async fn health_check(&self) -> bool;
}

/// PostgreSQL-backed database
#[derive(Clone)]
pub struct PgDatabase {
    pool: Arc<PgPool>,
}

impl PgDatabase {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn session(&self) -> Result<Box<dyn Session>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PgSession { tx: Some(tx) }))
    }

    async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&*self.pool).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Database health check failed: {}", e);
                false
            }
        }
    }
}

/// One PostgreSQL transaction
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    pub(crate) fn conn(&mut self) -> Result<&mut PgConnection> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(Error::Database("session already committed".to_string()).into()),
        }
    }
}

#[async_trait]
impl Session for PgSession {
    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Database("session already committed".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }
}
