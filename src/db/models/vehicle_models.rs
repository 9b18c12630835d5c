use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered vehicle, keyed by plate
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub plate_number: String,
    pub owner_name: String,
    /// employee | visitor
    pub vehicle_type: String,
    pub employee_id: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Vehicle registration request
#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub plate_number: String,
    pub owner_name: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<NewVehicle> for Vehicle {
    fn from(vehicle: NewVehicle) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate_number: vehicle.plate_number.trim().to_string(),
            owner_name: vehicle.owner_name,
            vehicle_type: vehicle.vehicle_type,
            employee_id: vehicle.employee_id,
            registered_at: Utc::now(),
            notes: vehicle.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleFilter {
    pub vehicle_type: Option<String>,
}
