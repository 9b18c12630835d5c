use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    OccupancyFull,
    Violation,
    Intrusion,
    UnknownVehicle,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OccupancyFull => "occupancy_full",
            Self::Violation => "violation",
            Self::Intrusion => "intrusion",
            Self::UnknownVehicle => "unknown_vehicle",
        }
    }
}

impl Display for AlertKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "occupancy_full" => Ok(Self::OccupancyFull),
            "violation" => Ok(Self::Violation),
            "intrusion" => Ok(Self::Intrusion),
            "unknown_vehicle" => Ok(Self::UnknownVehicle),
            other => Err(format!("unknown alert type '{}'", other)),
        }
    }
}

/// Alert row; append-only apart from resolution
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: String,
    pub camera_id: String,
    pub zone_id: Option<String>,
    pub event_type: Option<String>,
    pub description: String,
    pub is_resolved: bool,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// What a handler asks the alert sink to raise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub kind: AlertKind,
    pub camera_id: String,
    pub zone_id: Option<String>,
    pub event_type: Option<String>,
    pub description: String,
}

impl From<NewAlert> for Alert {
    fn from(alert: NewAlert) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type: alert.kind.as_str().to_string(),
            camera_id: alert.camera_id,
            zone_id: alert.zone_id,
            event_type: alert.event_type,
            description: alert.description,
            is_resolved: false,
            triggered_at: Utc::now(),
            resolved_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub alert_type: Option<String>,
    pub resolved: Option<bool>,
    pub limit: Option<i64>,
}
