//! Alert sink: durable alert rows plus best-effort notification fan-out.

use crate::db::models::{Alert, NewAlert};
use crate::db::{Database, Session};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, error, warn};
use std::sync::Arc;

/// Something that wants to hear about alerts after they are stored
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Writes every alert to the log
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        warn!(
            "[ALERT][{}] {}",
            alert.alert_type.to_uppercase(),
            alert.description
        );
        Ok(())
    }
}

pub struct AlertService {
    notifiers: Vec<Arc<dyn AlertNotifier>>,
}

impl AlertService {
    pub fn new(notifiers: Vec<Arc<dyn AlertNotifier>>) -> Self {
        Self { notifiers }
    }

    /// Log-only sink
    pub fn with_log() -> Self {
        Self::new(vec![Arc::new(LogNotifier)])
    }

    /// Add the alert to `session`. It becomes durable with the caller's other writes on
    /// commit; call [`AlertService::notify`] afterwards.
    pub async fn stage(&self, session: &mut dyn Session, alert: NewAlert) -> Result<Alert> {
        session.insert_alert(&Alert::from(alert)).await
    }

    /// Raise `alert` unless one of the same kind for the same zone was raised within `cooldown`.
    /// Runs in its own session.
    pub async fn raise_with_cooldown(
        &self,
        db: &dyn Database,
        alert: NewAlert,
        cooldown: Duration,
    ) -> Result<Option<Alert>> {
        let zone_id = alert.zone_id.clone().unwrap_or_default();
        let mut session = db.session().await?;

        if let Some(previous) = session
            .recent_alert(alert.kind, &zone_id, Utc::now() - cooldown)
            .await?
        {
            debug!(
                "Suppressed {} alert for zone {}: previous one at {}",
                alert.kind, zone_id, previous.triggered_at
            );
            return Ok(None);
        }

        let alert = self.stage(&mut *session, alert).await?;
        session.commit().await?;
        self.notify(&alert).await;

        Ok(Some(alert))
    }

    /// Fan out to every notifier; failures are logged and never propagated
    pub async fn notify(&self, alert: &Alert) {
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(alert).await {
                error!(
                    "Alert notifier '{}' failed for alert {}: {}",
                    notifier.name(),
                    alert.id,
                    e
                );
            }
        }
    }
}
