use super::{PgSession, ZonesRepository};
use crate::db::models::ZoneOccupancy;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

#[async_trait]
impl ZonesRepository for PgSession {
    async fn find_zone(&mut self, zone_id: &str) -> Result<Option<ZoneOccupancy>> {
        let result = sqlx::query_as::<_, ZoneOccupancy>(
            r#"
            SELECT id, zone_id, camera_id, current_count, max_capacity, last_updated
            FROM zone_occupancy
            WHERE zone_id = $1
            "#,
        )
        .bind(zone_id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to get zone: {}", e)))?;

        Ok(result)
    }

    async fn find_or_create_zone(
        &mut self,
        zone_id: &str,
        camera_id: &str,
        default_capacity: i32,
    ) -> Result<ZoneOccupancy> {
        // concurrent first sightings race on the unique key, not on a read
        sqlx::query(
            r#"
            INSERT INTO zone_occupancy (id, zone_id, camera_id, current_count, max_capacity, last_updated)
            VALUES ($1, $2, $3, 0, $4, $5)
            ON CONFLICT (zone_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(zone_id)
        .bind(camera_id)
        .bind(default_capacity)
        .bind(Utc::now())
        .execute(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to create zone: {}", e)))?;

        let result = sqlx::query_as::<_, ZoneOccupancy>(
            r#"
            SELECT id, zone_id, camera_id, current_count, max_capacity, last_updated
            FROM zone_occupancy
            WHERE zone_id = $1
            FOR UPDATE
            "#,
        )
        .bind(zone_id)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to lock zone: {}", e)))?;

        Ok(result)
    }

    async fn update_zone(&mut self, zone: &ZoneOccupancy) -> Result<ZoneOccupancy> {
        let result = sqlx::query_as::<_, ZoneOccupancy>(
            r#"
            UPDATE zone_occupancy
            SET current_count = $2, max_capacity = $3, last_updated = $4
            WHERE zone_id = $1
            RETURNING id, zone_id, camera_id, current_count, max_capacity, last_updated
            "#,
        )
        .bind(&zone.zone_id)
        .bind(zone.current_count)
        .bind(zone.max_capacity)
        .bind(zone.last_updated)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to update zone: {}", e)))?;

        result.ok_or_else(|| Error::NotFound(format!("Zone {} not found", zone.zone_id)).into())
    }

    async fn list_zones(&mut self) -> Result<Vec<ZoneOccupancy>> {
        let result = sqlx::query_as::<_, ZoneOccupancy>(
            r#"
            SELECT id, zone_id, camera_id, current_count, max_capacity, last_updated
            FROM zone_occupancy
            ORDER BY zone_id
            "#,
        )
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to list zones: {}", e)))?;

        Ok(result)
    }
}
