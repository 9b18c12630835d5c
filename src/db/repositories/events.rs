use super::{limit_or_default, EventsRepository, PgSession};
use crate::db::models::{CameraEvent, EventFilter};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;

const EVENT_COLUMNS: &str = r#"
    id, camera_id, device_serial, channel_id, event_type, event_state, event_description,
    detection_target, region_id, channel_name, trigger_time, snapshot_path, plate_number,
    raw_payload, created_at
"#;

#[async_trait]
impl EventsRepository for PgSession {
    /// Append to the raw event log
    async fn insert_camera_event(&mut self, event: &CameraEvent) -> Result<CameraEvent> {
        let sql = format!(
            r#"
            INSERT INTO camera_events ({columns})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {columns}
            "#,
            columns = EVENT_COLUMNS
        );

        let result = sqlx::query_as::<_, CameraEvent>(&sql)
            .bind(event.id)
            .bind(&event.camera_id)
            .bind(&event.device_serial)
            .bind(event.channel_id)
            .bind(&event.event_type)
            .bind(&event.event_state)
            .bind(&event.event_description)
            .bind(&event.detection_target)
            .bind(&event.region_id)
            .bind(&event.channel_name)
            .bind(event.trigger_time)
            .bind(&event.snapshot_path)
            .bind(&event.plate_number)
            .bind(&event.raw_payload)
            .bind(event.created_at)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| Error::Database(format!("Failed to create camera event: {}", e)))?;

        Ok(result)
    }

    /// Search the event log with optional equality filters
    async fn list_camera_events(&mut self, filter: &EventFilter) -> Result<Vec<CameraEvent>> {
        let sql = format!(
            r#"
            SELECT {columns}
            FROM camera_events
            WHERE ($1::TEXT IS NULL OR camera_id = $1)
              AND ($2::TEXT IS NULL OR event_type = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            columns = EVENT_COLUMNS
        );

        let result = sqlx::query_as::<_, CameraEvent>(&sql)
            .bind(&filter.camera_id)
            .bind(&filter.event_type)
            .bind(limit_or_default(filter.limit))
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| Error::Database(format!("Failed to list camera events: {}", e)))?;

        Ok(result)
    }
}
