//! Process-local database for development and tests.
//!
//! A session takes the store's lock for its whole lifetime and writes in place, journaling how
//! to undo each write. Commit forgets the journal; dropping an uncommitted session replays it
//! backwards. Sessions are serializable, and one costs only what it touches. A task must not open
//! a second session while holding one.

use crate::db::models::{
    Alert, AlertFilter, AlertKind, CameraEvent, DailyCounts, EntryExitFilter, EntryExitLog,
    EventFilter, Vehicle, ZoneOccupancy,
};
use crate::db::repositories::{
    limit_or_default, AlertsRepository, Database, EntryExitRepository, EventsRepository, Session,
    VehiclesRepository, ZonesRepository,
};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    events: Vec<CameraEvent>,
    zones: Vec<ZoneOccupancy>,
    alerts: Vec<Alert>,
    vehicles: Vec<Vehicle>,
    entry_exit: Vec<EntryExitLog>,
}

/// Inverse of one session write
#[derive(Debug)]
enum Undo {
    EventInserted,
    ZoneInserted,
    AlertInserted,
    VehicleInserted,
    EntryExitInserted,
    ZoneChanged(usize, ZoneOccupancy),
    AlertChanged(usize, Alert),
    EntryExitChanged(usize, EntryExitLog),
}

impl Undo {
    fn revert(self, state: &mut MemoryState) {
        match self {
            Undo::EventInserted => {
                state.events.pop();
            }
            Undo::ZoneInserted => {
                state.zones.pop();
            }
            Undo::AlertInserted => {
                state.alerts.pop();
            }
            Undo::VehicleInserted => {
                state.vehicles.pop();
            }
            Undo::EntryExitInserted => {
                state.entry_exit.pop();
            }
            Undo::ZoneChanged(index, zone) => state.zones[index] = zone,
            Undo::AlertChanged(index, alert) => state.alerts[index] = alert,
            Undo::EntryExitChanged(index, log) => state.entry_exit[index] = log,
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn session(&self) -> Result<Box<dyn Session>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemorySession {
            guard: Some(guard),
            undo: Vec::new(),
        }))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub struct MemorySession {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    undo: Vec<Undo>,
}

impl MemorySession {
    fn state(&mut self) -> Result<&mut MemoryState> {
        Ok(self.journaled()?.0)
    }

    fn journaled(&mut self) -> Result<(&mut MemoryState, &mut Vec<Undo>)> {
        match self.guard.as_deref_mut() {
            Some(state) => Ok((state, &mut self.undo)),
            None => Err(Error::Database("session already committed".to_string()).into()),
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if let Some(state) = self.guard.as_deref_mut() {
            for undo in self.undo.drain(..).rev() {
                undo.revert(state);
            }
        }
    }
}

fn newest_first<T, F>(rows: &mut Vec<T>, key: F, limit: Option<i64>)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
    rows.truncate(limit_or_default(limit) as usize);
}

#[async_trait]
impl EventsRepository for MemorySession {
    async fn insert_camera_event(&mut self, event: &CameraEvent) -> Result<CameraEvent> {
        let (state, undo) = self.journaled()?;
        state.events.push(event.clone());
        undo.push(Undo::EventInserted);
        Ok(event.clone())
    }

    async fn list_camera_events(&mut self, filter: &EventFilter) -> Result<Vec<CameraEvent>> {
        let mut rows: Vec<CameraEvent> = self
            .state()?
            .events
            .iter()
            .filter(|e| filter.camera_id.as_ref().map_or(true, |c| &e.camera_id == c))
            .filter(|e| filter.event_type.as_ref().map_or(true, |t| &e.event_type == t))
            .cloned()
            .collect();
        newest_first(&mut rows, |e| e.created_at, filter.limit);
        Ok(rows)
    }
}

#[async_trait]
impl ZonesRepository for MemorySession {
    async fn find_zone(&mut self, zone_id: &str) -> Result<Option<ZoneOccupancy>> {
        Ok(self
            .state()?
            .zones
            .iter()
            .find(|z| z.zone_id == zone_id)
            .cloned())
    }

    async fn find_or_create_zone(
        &mut self,
        zone_id: &str,
        camera_id: &str,
        default_capacity: i32,
    ) -> Result<ZoneOccupancy> {
        let (state, undo) = self.journaled()?;
        if let Some(zone) = state.zones.iter().find(|z| z.zone_id == zone_id) {
            return Ok(zone.clone());
        }
        let zone = ZoneOccupancy::new(zone_id, camera_id, default_capacity);
        state.zones.push(zone.clone());
        undo.push(Undo::ZoneInserted);
        Ok(zone)
    }

    async fn update_zone(&mut self, zone: &ZoneOccupancy) -> Result<ZoneOccupancy> {
        let (state, undo) = self.journaled()?;
        let index = state
            .zones
            .iter()
            .position(|z| z.zone_id == zone.zone_id)
            .ok_or_else(|| Error::NotFound(format!("Zone {} not found", zone.zone_id)))?;
        let stored = &mut state.zones[index];
        undo.push(Undo::ZoneChanged(index, stored.clone()));
        stored.current_count = zone.current_count;
        stored.max_capacity = zone.max_capacity;
        stored.last_updated = zone.last_updated;
        Ok(stored.clone())
    }

    async fn list_zones(&mut self) -> Result<Vec<ZoneOccupancy>> {
        let mut zones = self.state()?.zones.clone();
        zones.sort_by(|a, b| a.zone_id.cmp(&b.zone_id));
        Ok(zones)
    }
}

#[async_trait]
impl AlertsRepository for MemorySession {
    async fn insert_alert(&mut self, alert: &Alert) -> Result<Alert> {
        let (state, undo) = self.journaled()?;
        state.alerts.push(alert.clone());
        undo.push(Undo::AlertInserted);
        Ok(alert.clone())
    }

    async fn recent_alert(
        &mut self,
        kind: AlertKind,
        zone_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        Ok(self
            .state()?
            .alerts
            .iter()
            .filter(|a| a.alert_type == kind.as_str())
            .filter(|a| a.zone_id.as_deref() == Some(zone_id))
            .filter(|a| a.triggered_at >= since)
            .max_by_key(|a| a.triggered_at)
            .cloned())
    }

    async fn list_alerts(&mut self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let mut rows: Vec<Alert> = self
            .state()?
            .alerts
            .iter()
            .filter(|a| filter.alert_type.as_ref().map_or(true, |t| &a.alert_type == t))
            .filter(|a| filter.resolved.map_or(true, |r| a.is_resolved == r))
            .cloned()
            .collect();
        newest_first(&mut rows, |a| a.triggered_at, filter.limit);
        Ok(rows)
    }

    async fn resolve_alert(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Alert>> {
        let (state, undo) = self.journaled()?;
        let Some(index) = state.alerts.iter().position(|a| a.id == id) else {
            return Ok(None);
        };
        let alert = &mut state.alerts[index];
        undo.push(Undo::AlertChanged(index, alert.clone()));
        alert.is_resolved = true;
        alert.resolved_at.get_or_insert(at);
        Ok(Some(alert.clone()))
    }
}

#[async_trait]
impl VehiclesRepository for MemorySession {
    async fn find_vehicle(&mut self, plate_number: &str) -> Result<Option<Vehicle>> {
        Ok(self
            .state()?
            .vehicles
            .iter()
            .find(|v| v.plate_number == plate_number)
            .cloned())
    }

    async fn list_vehicles(&mut self, vehicle_type: Option<&str>) -> Result<Vec<Vehicle>> {
        let mut rows: Vec<Vehicle> = self
            .state()?
            .vehicles
            .iter()
            .filter(|v| vehicle_type.map_or(true, |t| v.vehicle_type == t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.plate_number.cmp(&b.plate_number));
        Ok(rows)
    }

    async fn insert_vehicle(&mut self, vehicle: &Vehicle) -> Result<Vehicle> {
        let (state, undo) = self.journaled()?;
        if state
            .vehicles
            .iter()
            .any(|v| v.plate_number == vehicle.plate_number)
        {
            return Err(Error::AlreadyExists(format!(
                "Plate {} already registered",
                vehicle.plate_number
            ))
            .into());
        }
        state.vehicles.push(vehicle.clone());
        undo.push(Undo::VehicleInserted);
        Ok(vehicle.clone())
    }
}

#[async_trait]
impl EntryExitRepository for MemorySession {
    async fn insert_entry_exit(&mut self, log: &EntryExitLog) -> Result<EntryExitLog> {
        let (state, undo) = self.journaled()?;
        state.entry_exit.push(log.clone());
        undo.push(Undo::EntryExitInserted);
        Ok(log.clone())
    }

    async fn latest_unmatched_entry(
        &mut self,
        plate_number: &str,
    ) -> Result<Option<EntryExitLog>> {
        Ok(self
            .state()?
            .entry_exit
            .iter()
            .filter(|l| l.plate_number == plate_number)
            .filter(|l| l.gate == "entry" && l.matched_entry_id.is_none())
            .max_by_key(|l| l.event_time)
            .cloned())
    }

    async fn set_match(&mut self, id: Uuid, matched_id: Uuid) -> Result<()> {
        let (state, undo) = self.journaled()?;
        let index = state
            .entry_exit
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| Error::NotFound(format!("Entry/exit record {} not found", id)))?;
        let log = &mut state.entry_exit[index];
        undo.push(Undo::EntryExitChanged(index, log.clone()));
        log.matched_entry_id = Some(matched_id);
        Ok(())
    }

    async fn list_entry_exit(&mut self, filter: &EntryExitFilter) -> Result<Vec<EntryExitLog>> {
        let mut rows: Vec<EntryExitLog> = self
            .state()?
            .entry_exit
            .iter()
            .filter(|l| filter.plate.as_ref().map_or(true, |p| &l.plate_number == p))
            .filter(|l| filter.gate.as_ref().map_or(true, |g| &l.gate == g))
            .cloned()
            .collect();
        newest_first(&mut rows, |l| l.event_time, filter.limit);
        Ok(rows)
    }

    async fn daily_counts(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DailyCounts> {
        let state = self.state()?;
        let in_range = || {
            state
                .entry_exit
                .iter()
                .filter(|l| l.event_time >= start && l.event_time < end)
        };

        let durations: Vec<i64> = in_range()
            .filter(|l| l.gate == "exit")
            .filter_map(|l| l.parking_duration)
            .collect();

        Ok(DailyCounts {
            total_entries: in_range().filter(|l| l.gate == "entry").count() as i64,
            total_exits: in_range().filter(|l| l.gate == "exit").count() as i64,
            avg_parking_seconds: if durations.is_empty() {
                None
            } else {
                Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
            },
        })
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn commit(&mut self) -> Result<()> {
        if self.guard.take().is_none() {
            return Err(Error::Database("session already committed".to_string()).into());
        }
        self.undo.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() -> Result<()> {
        let db = MemoryDatabase::new();

        {
            let mut session = db.session().await?;
            session.find_or_create_zone("zone-1", "CAM-02", 10).await?;
        }
        let mut session = db.session().await?;
        assert!(session.find_zone("zone-1").await?.is_none());

        session.find_or_create_zone("zone-1", "CAM-02", 10).await?;
        session.commit().await?;
        assert!(session.find_zone("zone-1").await.is_err());

        let mut session = db.session().await?;
        assert!(session.find_zone("zone-1").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_session_restores_committed_rows() -> Result<()> {
        use crate::db::models::NewAlert;
        use crate::event_record::Gate;

        let db = MemoryDatabase::new();
        let alert = Alert::from(NewAlert {
            kind: AlertKind::Violation,
            camera_id: "CAM-02".to_string(),
            zone_id: Some("loading-bay".to_string()),
            event_type: Some("regionEntrance".to_string()),
            description: "Vehicle in restricted zone loading-bay".to_string(),
        });
        let entry = EntryExitLog::new("ABC-1234", Gate::Entry, "CAM-ENTRY", Utc::now());

        let mut session = db.session().await?;
        let mut zone = session.find_or_create_zone("zone-1", "CAM-02", 10).await?;
        zone.apply_delta(3);
        session.update_zone(&zone).await?;
        session.insert_alert(&alert).await?;
        session.insert_entry_exit(&entry).await?;
        session.commit().await?;

        {
            let mut session = db.session().await?;
            let mut zone = session.find_or_create_zone("zone-1", "CAM-02", 10).await?;
            zone.apply_delta(4);
            zone.max_capacity = 2;
            session.update_zone(&zone).await?;
            session.find_or_create_zone("zone-2", "CAM-02", 10).await?;
            session.resolve_alert(alert.id, Utc::now()).await?;
            session.set_match(entry.id, Uuid::new_v4()).await?;
            let repeat = Alert {
                id: Uuid::new_v4(),
                ..alert.clone()
            };
            session.insert_alert(&repeat).await?;
            assert_eq!(session.find_zone("zone-1").await?.map(|z| z.current_count), Some(7));
        }

        let mut session = db.session().await?;
        let zone = session.find_zone("zone-1").await?;
        assert_eq!(zone.as_ref().map(|z| z.current_count), Some(3));
        assert_eq!(zone.map(|z| z.max_capacity), Some(10));
        assert!(session.find_zone("zone-2").await?.is_none());

        let alerts = session.list_alerts(&AlertFilter::default()).await?;
        assert_eq!(alerts.len(), 1);
        assert!(!alerts[0].is_resolved);
        assert!(alerts[0].resolved_at.is_none());

        let unmatched = session.latest_unmatched_entry("ABC-1234").await?;
        assert_eq!(unmatched.map(|l| l.id), Some(entry.id));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_plate_is_rejected() -> Result<()> {
        let db = MemoryDatabase::new();
        let mut session = db.session().await?;
        let vehicle = Vehicle::from(crate::db::models::NewVehicle {
            plate_number: "ABC-1234".to_string(),
            owner_name: "J. Doe".to_string(),
            vehicle_type: "employee".to_string(),
            employee_id: None,
            notes: None,
        });

        session.insert_vehicle(&vehicle).await?;
        let err = session
            .insert_vehicle(&vehicle)
            .await
            .err()
            .and_then(|e| e.downcast::<Error>().ok());
        assert!(matches!(err, Some(Error::AlreadyExists(_))));
        Ok(())
    }
}
