use crate::config::ZonePolicy;
use crate::db::models::{Alert, AlertKind, NewAlert};
use crate::db::Database;
use crate::event_record::{EventKind, EventRecord};
use crate::services::alerts::AlertService;
use anyhow::Result;
use std::sync::Arc;

/// Alerts on vehicles in restricted zones and on any line crossing
pub struct ViolationHandler {
    policy: Arc<ZonePolicy>,
    alerts: Arc<AlertService>,
}

impl ViolationHandler {
    pub fn new(policy: Arc<ZonePolicy>, alerts: Arc<AlertService>) -> Self {
        Self { policy, alerts }
    }

    pub async fn handle(&self, db: &dyn Database, record: &EventRecord) -> Result<Option<Alert>> {
        let zone_id = record
            .region_id
            .clone()
            .unwrap_or_else(|| format!("{}-field", record.camera_id));
        let line_crossing = record.kind == EventKind::LineDetection;

        if !line_crossing && !self.policy.is_restricted(&zone_id) {
            return Ok(None);
        }

        let description = if line_crossing {
            format!("Line crossing in zone {}", zone_id)
        } else {
            format!("Vehicle in restricted zone: {}", zone_id)
        };
        let alert = NewAlert {
            kind: AlertKind::Violation,
            camera_id: record.camera_id.clone(),
            zone_id: Some(zone_id),
            event_type: Some(record.kind.to_string()),
            description,
        };

        self.alerts
            .raise_with_cooldown(db, alert, self.policy.alert_cooldown)
            .await
    }
}
