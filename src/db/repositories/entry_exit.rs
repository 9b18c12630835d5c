use super::{limit_or_default, EntryExitRepository, PgSession};
use crate::db::models::{DailyCounts, EntryExitFilter, EntryExitLog};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
impl EntryExitRepository for PgSession {
    async fn insert_entry_exit(&mut self, log: &EntryExitLog) -> Result<EntryExitLog> {
        let result = sqlx::query_as::<_, EntryExitLog>(
            r#"
            INSERT INTO entry_exit_log (
                id, plate_number, vehicle_id, vehicle_type, gate, camera_id, event_time,
                parking_duration, matched_entry_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, plate_number, vehicle_id, vehicle_type, gate, camera_id, event_time,
                      parking_duration, matched_entry_id, created_at
            "#,
        )
        .bind(log.id)
        .bind(&log.plate_number)
        .bind(log.vehicle_id)
        .bind(&log.vehicle_type)
        .bind(&log.gate)
        .bind(&log.camera_id)
        .bind(log.event_time)
        .bind(log.parking_duration)
        .bind(log.matched_entry_id)
        .bind(log.created_at)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to create entry/exit record: {}", e)))?;

        Ok(result)
    }

    async fn latest_unmatched_entry(
        &mut self,
        plate_number: &str,
    ) -> Result<Option<EntryExitLog>> {
        let result = sqlx::query_as::<_, EntryExitLog>(
            r#"
            SELECT id, plate_number, vehicle_id, vehicle_type, gate, camera_id, event_time,
                   parking_duration, matched_entry_id, created_at
            FROM entry_exit_log
            WHERE plate_number = $1 AND gate = 'entry' AND matched_entry_id IS NULL
            ORDER BY event_time DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(plate_number)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to find unmatched entry: {}", e)))?;

        Ok(result)
    }

    async fn set_match(&mut self, id: Uuid, matched_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE entry_exit_log
            SET matched_entry_id = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(matched_id)
        .execute(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to set match reference: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Entry/exit record {} not found", id)).into());
        }

        Ok(())
    }

    async fn list_entry_exit(&mut self, filter: &EntryExitFilter) -> Result<Vec<EntryExitLog>> {
        let result = sqlx::query_as::<_, EntryExitLog>(
            r#"
            SELECT id, plate_number, vehicle_id, vehicle_type, gate, camera_id, event_time,
                   parking_duration, matched_entry_id, created_at
            FROM entry_exit_log
            WHERE ($1::TEXT IS NULL OR plate_number = $1)
              AND ($2::TEXT IS NULL OR gate = $2)
            ORDER BY event_time DESC
            LIMIT $3
            "#,
        )
        .bind(&filter.plate)
        .bind(&filter.gate)
        .bind(limit_or_default(filter.limit))
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to list entry/exit records: {}", e)))?;

        Ok(result)
    }

    async fn daily_counts(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DailyCounts> {
        let result = sqlx::query_as::<_, DailyCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE gate = 'entry') AS total_entries,
                COUNT(*) FILTER (WHERE gate = 'exit') AS total_exits,
                (AVG(parking_duration) FILTER (
                    WHERE gate = 'exit' AND parking_duration IS NOT NULL
                ))::DOUBLE PRECISION AS avg_parking_seconds
            FROM entry_exit_log
            WHERE event_time >= $1 AND event_time < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to compute daily stats: {}", e)))?;

        Ok(result)
    }
}
