use crate::config::ZonePolicy;
use crate::db::models::{AlertKind, NewAlert, ZoneOccupancy};
use crate::db::Database;
use crate::event_record::{EventKind, EventRecord};
use crate::services::alerts::AlertService;
use anyhow::Result;
use log::info;
use std::sync::Arc;

/// Keeps per-zone vehicle counts from region entrance/exit events
pub struct OccupancyHandler {
    policy: Arc<ZonePolicy>,
    alerts: Arc<AlertService>,
}

impl OccupancyHandler {
    pub fn new(policy: Arc<ZonePolicy>, alerts: Arc<AlertService>) -> Self {
        Self { policy, alerts }
    }

    /// Apply one entrance or exit. Returns the updated zone, or `None` for other event kinds.
    pub async fn handle(
        &self,
        db: &dyn Database,
        record: &EventRecord,
    ) -> Result<Option<ZoneOccupancy>> {
        let delta = match record.kind {
            EventKind::RegionEntrance => 1,
            EventKind::RegionExit => -1,
            _ => return Ok(None),
        };
        let zone_id = record
            .region_id
            .clone()
            .unwrap_or_else(|| format!("{}-default", record.camera_id));

        let mut session = db.session().await?;
        let mut zone = session
            .find_or_create_zone(
                &zone_id,
                &record.camera_id,
                self.policy.default_zone_capacity,
            )
            .await?;
        zone.apply_delta(delta);
        let zone = session.update_zone(&zone).await?;

        info!(
            "[{}] Zone {}: {}/{}",
            record.camera_id, zone.zone_id, zone.current_count, zone.max_capacity
        );

        // every qualifying event re-alerts, not only the crossing into the threshold
        let alert = match zone.ratio() {
            Some(ratio) if ratio >= self.policy.occupancy_alert_threshold => {
                let alert = NewAlert {
                    kind: AlertKind::OccupancyFull,
                    camera_id: record.camera_id.clone(),
                    zone_id: Some(zone.zone_id.clone()),
                    event_type: Some(record.kind.to_string()),
                    description: format!(
                        "Zone {} at {}% capacity",
                        zone.zone_id,
                        (ratio * 100.0) as i64
                    ),
                };
                Some(self.alerts.stage(&mut *session, alert).await?)
            }
            _ => None,
        };

        session.commit().await?;
        if let Some(alert) = &alert {
            self.alerts.notify(alert).await;
        }

        Ok(Some(zone))
    }
}
