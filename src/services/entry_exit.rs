use crate::db::models::{AlertKind, EntryExitLog, NewAlert};
use crate::db::Database;
use crate::event_record::{EventRecord, Gate};
use crate::services::alerts::AlertService;
use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;

/// Pairs licence-plate reads at the entry and exit gates
pub struct EntryExitCorrelator {
    alerts: Arc<AlertService>,
}

impl EntryExitCorrelator {
    pub fn new(alerts: Arc<AlertService>) -> Self {
        Self { alerts }
    }

    /// Record one gate crossing. Returns the stored row, or `None` when the event was dropped.
    pub async fn handle(
        &self,
        db: &dyn Database,
        record: &EventRecord,
    ) -> Result<Option<EntryExitLog>> {
        let Some(plate) = record.plate_number() else {
            warn!(
                "[{}] Access-control event without plate number, skipped",
                record.camera_id
            );
            return Ok(None);
        };
        let Some(gate) = record.gate() else {
            warn!(
                "[{}] No gate configured for camera, plate {} skipped",
                record.camera_id, plate
            );
            return Ok(None);
        };

        let mut session = db.session().await?;
        let vehicle = session.find_vehicle(plate).await?;

        let mut log = EntryExitLog::new(plate, gate, &record.camera_id, record.trigger_time);
        if let Some(vehicle) = &vehicle {
            log.vehicle_id = Some(vehicle.id);
            log.vehicle_type = vehicle.vehicle_type.clone();
        }

        let owner = vehicle
            .as_ref()
            .map(|v| v.owner_name.as_str())
            .or_else(|| record.access_control().and_then(|acs| acs.person_name.as_deref()))
            .unwrap_or("Unknown");
        info!(
            "[{}] Gate={} Plate={} Type={} Name={}",
            record.camera_id, gate, plate, log.vehicle_type, owner
        );

        let entry = match gate {
            Gate::Entry => None,
            Gate::Exit => match session.latest_unmatched_entry(plate).await? {
                Some(entry) => {
                    let dwell = (log.event_time - entry.event_time).num_seconds();
                    log.parking_duration = Some(dwell);
                    log.matched_entry_id = Some(entry.id);
                    info!("Plate {} parked for {} min", plate, dwell / 60);
                    Some(entry)
                }
                None => {
                    warn!("No matching entry found for plate {} at exit", plate);
                    None
                }
            },
        };

        let log = session.insert_entry_exit(&log).await?;
        if let Some(entry) = entry {
            session.set_match(entry.id, log.id).await?;
        }

        let alert = match vehicle {
            Some(_) => None,
            None => {
                let alert = NewAlert {
                    kind: AlertKind::UnknownVehicle,
                    camera_id: record.camera_id.clone(),
                    zone_id: Some(gate.to_string()),
                    event_type: Some(record.kind.to_string()),
                    description: format!("Unregistered vehicle at {} gate: plate {}", gate, plate),
                };
                Some(self.alerts.stage(&mut *session, alert).await?)
            }
        };

        session.commit().await?;
        if let Some(alert) = &alert {
            self.alerts.notify(alert).await;
        }

        Ok(Some(log))
    }
}
