use crate::db::models::Alert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert as published on the broker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertMessage {
    /// Unique message ID
    pub id: Uuid,
    /// Stored alert ID
    pub alert_id: Uuid,
    pub alert_type: String,
    pub camera_id: String,
    pub zone_id: Option<String>,
    pub event_type: Option<String>,
    pub description: String,
    pub triggered_at: DateTime<Utc>,
    /// Publish timestamp
    pub timestamp: DateTime<Utc>,
}

impl From<&Alert> for AlertMessage {
    fn from(alert: &Alert) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_id: alert.id,
            alert_type: alert.alert_type.clone(),
            camera_id: alert.camera_id.clone(),
            zone_id: alert.zone_id.clone(),
            event_type: alert.event_type.clone(),
            description: alert.description.clone(),
            triggered_at: alert.triggered_at,
            timestamp: Utc::now(),
        }
    }
}

/// AMQP topic words are dot-separated; keep each id a single word
fn topic_word(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '.' | '*' | '#' | ' ' => '_',
            c => c,
        })
        .collect()
}

impl AlertMessage {
    /// `alert.<kind>.<camera>`
    pub fn routing_key(&self) -> String {
        format!(
            "alert.{}.{}",
            topic_word(&self.alert_type),
            topic_word(&self.camera_id)
        )
    }
}
