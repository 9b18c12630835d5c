use super::{PgSession, VehiclesRepository};
use crate::db::models::Vehicle;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
impl VehiclesRepository for PgSession {
    async fn find_vehicle(&mut self, plate_number: &str) -> Result<Option<Vehicle>> {
        let result = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, plate_number, owner_name, vehicle_type, employee_id, registered_at, notes
            FROM vehicles
            WHERE plate_number = $1
            "#,
        )
        .bind(plate_number)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to get vehicle by plate: {}", e)))?;

        Ok(result)
    }

    async fn list_vehicles(&mut self, vehicle_type: Option<&str>) -> Result<Vec<Vehicle>> {
        let result = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, plate_number, owner_name, vehicle_type, employee_id, registered_at, notes
            FROM vehicles
            WHERE ($1::TEXT IS NULL OR vehicle_type = $1)
            ORDER BY plate_number
            "#,
        )
        .bind(vehicle_type)
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| Error::Database(format!("Failed to list vehicles: {}", e)))?;

        Ok(result)
    }

    async fn insert_vehicle(&mut self, vehicle: &Vehicle) -> Result<Vehicle> {
        let result = sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (id, plate_number, owner_name, vehicle_type, employee_id, registered_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, plate_number, owner_name, vehicle_type, employee_id, registered_at, notes
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.plate_number)
        .bind(&vehicle.owner_name)
        .bind(&vehicle.vehicle_type)
        .bind(&vehicle.employee_id)
        .bind(vehicle.registered_at)
        .bind(&vehicle.notes)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::AlreadyExists(
                format!("Plate {} already registered", vehicle.plate_number),
            ),
            e => Error::Database(format!("Failed to create vehicle: {}", e)),
        })?;

        Ok(result)
    }
}
