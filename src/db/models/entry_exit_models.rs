use crate::event_record::Gate;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One gate crossing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntryExitLog {
    pub id: Uuid,
    pub plate_number: String,
    pub vehicle_id: Option<Uuid>,
    /// employee | visitor | unknown
    pub vehicle_type: String,
    /// entry | exit
    pub gate: String,
    pub camera_id: String,
    pub event_time: DateTime<Utc>,
    /// Seconds parked, exit rows only
    pub parking_duration: Option<i64>,
    /// Counterpart of a matched pair, set on both rows
    pub matched_entry_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EntryExitLog {
    pub fn new(plate_number: &str, gate: Gate, camera_id: &str, event_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate_number: plate_number.to_string(),
            vehicle_id: None,
            vehicle_type: "unknown".to_string(),
            gate: gate.as_str().to_string(),
            camera_id: camera_id.to_string(),
            event_time,
            parking_duration: None,
            matched_entry_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryExitFilter {
    pub plate: Option<String>,
    pub gate: Option<String>,
    pub limit: Option<i64>,
}

/// Raw aggregates for one day
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct DailyCounts {
    pub total_entries: i64,
    pub total_exits: i64,
    pub avg_parking_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_entries: i64,
    pub total_exits: i64,
    pub currently_parked: i64,
    pub avg_parking_seconds: f64,
    pub avg_parking_minutes: f64,
}

impl DailyStats {
    pub fn new(date: NaiveDate, counts: DailyCounts) -> Self {
        let avg_parking_seconds = counts.avg_parking_seconds.unwrap_or(0.0).round();
        Self {
            date,
            total_entries: counts.total_entries,
            total_exits: counts.total_exits,
            currently_parked: (counts.total_entries - counts.total_exits).max(0),
            avg_parking_seconds,
            avg_parking_minutes: (avg_parking_seconds / 6.0).round() / 10.0,
        }
    }
}
