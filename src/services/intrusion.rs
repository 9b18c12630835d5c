use crate::config::ZonePolicy;
use crate::db::models::{Alert, AlertKind, NewAlert};
use crate::db::Database;
use crate::event_record::EventRecord;
use crate::services::alerts::AlertService;
use anyhow::Result;
use std::sync::Arc;

/// Alerts on vehicles inside monitored perimeter zones.
///
/// A detection without any region is treated as an intrusion.
pub struct IntrusionHandler {
    policy: Arc<ZonePolicy>,
    alerts: Arc<AlertService>,
}

impl IntrusionHandler {
    pub fn new(policy: Arc<ZonePolicy>, alerts: Arc<AlertService>) -> Self {
        Self { policy, alerts }
    }

    pub async fn handle(&self, db: &dyn Database, record: &EventRecord) -> Result<Option<Alert>> {
        let unscoped = record.region_id.is_none();
        let zone_id = record
            .region_id
            .clone()
            .unwrap_or_else(|| format!("{}-field", record.camera_id));

        if !unscoped && !self.policy.is_intrusion_monitored(&zone_id) {
            return Ok(None);
        }

        let alert = NewAlert {
            kind: AlertKind::Intrusion,
            camera_id: record.camera_id.clone(),
            description: format!("Vehicle intrusion in {} ({})", zone_id, record.camera_id),
            zone_id: Some(zone_id),
            event_type: Some(record.kind.to_string()),
        };

        self.alerts
            .raise_with_cooldown(db, alert, self.policy.alert_cooldown)
            .await
    }
}
