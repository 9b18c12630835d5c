use super::{limit_or_default, AlertsRepository, PgSession};
use crate::db::models::{Alert, AlertFilter, AlertKind};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
impl AlertsRepository for PgSession {
    async fn insert_alert(&mut self, alert: &Alert) -> Result<Alert> {
        let result = sqlx::query_as::<_, Alert>(
            r#"
            INSERT INTO alerts (
                id, alert_type, camera_id, zone_id, event_type, description,
                is_resolved, triggered_at, resolved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, alert_type, camera_id, zone_id, event_type, description,
                      is_resolved, triggered_at, resolved_at
            "#,
        )
        .bind(alert.id)
        .bind(&alert.alert_type)
        .bind(&alert.camera_id)
        .bind(&alert.zone_id)
        .bind(&alert.event_type)
        .bind(&alert.description)
        .bind(alert.is_resolved)
        .bind(alert.triggered_at)
        .bind(alert.resolved_at)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to create alert: {}", e)))?;

        Ok(result)
    }

    async fn recent_alert(
        &mut self,
        kind: AlertKind,
        zone_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let result = sqlx::query_as::<_, Alert>(
            r#"
            SELECT id, alert_type, camera_id, zone_id, event_type, description,
                   is_resolved, triggered_at, resolved_at
            FROM alerts
            WHERE alert_type = $1 AND zone_id = $2 AND triggered_at >= $3
            ORDER BY triggered_at DESC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(zone_id)
        .bind(since)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to query recent alerts: {}", e)))?;

        Ok(result)
    }

    async fn list_alerts(&mut self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let result = sqlx::query_as::<_, Alert>(
            r#"
            SELECT id, alert_type, camera_id, zone_id, event_type, description,
                   is_resolved, triggered_at, resolved_at
            FROM alerts
            WHERE ($1::TEXT IS NULL OR alert_type = $1)
              AND ($2::BOOLEAN IS NULL OR is_resolved = $2)
            ORDER BY triggered_at DESC
            LIMIT $3
            "#,
        )
        .bind(&filter.alert_type)
        .bind(filter.resolved)
        .bind(limit_or_default(filter.limit))
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to list alerts: {}", e)))?;

        Ok(result)
    }

    async fn resolve_alert(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Alert>> {
        let result = sqlx::query_as::<_, Alert>(
            r#"
            UPDATE alerts
            SET is_resolved = TRUE, resolved_at = COALESCE(resolved_at, $2)
            WHERE id = $1
            RETURNING id, alert_type, camera_id, zone_id, event_type, description,
                      is_resolved, triggered_at, resolved_at
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to resolve alert: {}", e)))?;

        Ok(result)
    }
}
