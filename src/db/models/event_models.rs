use crate::event_record::EventRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw camera event log row, one per normalized event
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CameraEvent {
    pub id: Uuid,
    pub camera_id: String,
    pub device_serial: String,
    pub channel_id: i32,
    pub event_type: String,
    pub event_state: Option<String>,
    pub event_description: Option<String>,
    pub detection_target: Option<String>,
    pub region_id: Option<String>,
    pub channel_name: Option<String>,
    pub trigger_time: DateTime<Utc>,
    pub snapshot_path: Option<String>,
    pub plate_number: Option<String>,
    #[serde(skip_serializing)]
    pub raw_payload: String,
    pub created_at: DateTime<Utc>,
}

impl From<&EventRecord> for CameraEvent {
    fn from(record: &EventRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera_id: record.camera_id.clone(),
            device_serial: record.device_serial.clone(),
            channel_id: record.channel_id,
            event_type: record.kind.as_str().to_string(),
            event_state: record.state.clone(),
            event_description: record.description.clone(),
            detection_target: record.target_str().map(str::to_string),
            region_id: record.region_id.clone(),
            channel_name: record.channel_name.clone(),
            trigger_time: record.trigger_time,
            snapshot_path: record.snapshot_path.clone(),
            plate_number: record.plate_number().map(str::to_string),
            raw_payload: record.raw_payload.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Equality filters for listing the event log
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub camera_id: Option<String>,
    pub event_type: Option<String>,
    pub limit: Option<i64>,
}
