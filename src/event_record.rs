//! The unified, format-independent view of one camera trigger.
//!
//! Every ingestion path (webhook XML, webhook JSON, multipart, alert stream) ends in an
//! [`EventRecord`]. Fields that only exist for licence-plate readers live in the
//! [`EventDetails::AccessControl`] variant so downstream handlers never have to guess.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Camera-declared trigger category
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    FieldDetection,
    LineDetection,
    RegionEntrance,
    RegionExit,
    Motion,
    AccessControl,
    Other(String),
}

impl EventKind {
    /// Wire name as the cameras send it
    pub fn as_str(&self) -> &str {
        match self {
            Self::FieldDetection => "fielddetection",
            Self::LineDetection => "linedetection",
            Self::RegionEntrance => "regionEntrance",
            Self::RegionExit => "regionExiting",
            Self::Motion => "VMD",
            Self::AccessControl => "AccessControllerEvent",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for EventKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();

        Ok(match raw.to_ascii_lowercase().as_str() {
            "fielddetection" => EventKind::FieldDetection,
            "linedetection" => EventKind::LineDetection,
            "regionentrance" => EventKind::RegionEntrance,
            "regionexiting" | "regionexit" => EventKind::RegionExit,
            "vmd" | "motion" | "motiondetection" => EventKind::Motion,
            "accesscontrollerevent" => EventKind::AccessControl,
            "" => EventKind::Other("unknown".to_string()),
            _ => EventKind::Other(raw.to_string()),
        })
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the camera's analytics classified the moving object as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionTarget {
    Vehicle,
    Human,
    Other(String),
}

impl DetectionTarget {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Human => "human",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for DetectionTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        Ok(match raw.to_ascii_lowercase().as_str() {
            "vehicle" => DetectionTarget::Vehicle,
            "human" => DetectionTarget::Human,
            _ => DetectionTarget::Other(raw.to_string()),
        })
    }
}

/// Direction of an access-control crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    Entry,
    Exit,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

impl Display for Gate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(Gate::Entry),
            "exit" => Ok(Gate::Exit),
            other => Err(format!("unknown gate '{}'", other)),
        }
    }
}

/// Licence-plate reader payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControl {
    pub plate_number: Option<String>,
    /// Always taken from camera configuration, never from the payload
    pub gate: Option<Gate>,
    pub person_name: Option<String>,
    pub employee_id: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetails {
    Detection,
    AccessControl(AccessControl),
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub camera_id: String,
    pub source_address: String,
    pub device_serial: String,
    pub channel_id: i32,
    pub kind: EventKind,
    pub target: Option<DetectionTarget>,
    pub region_id: Option<String>,
    pub channel_name: Option<String>,
    pub state: Option<String>,
    pub description: Option<String>,
    pub trigger_time: DateTime<Utc>,
    pub raw_payload: String,
    pub snapshot_path: Option<String>,
    pub details: EventDetails,
}

impl EventRecord {
    /// Vehicle detections and detections that did not classify the target at all
    pub fn is_vehicle_or_unset(&self) -> bool {
        matches!(self.target, None | Some(DetectionTarget::Vehicle))
    }

    pub fn access_control(&self) -> Option<&AccessControl> {
        match &self.details {
            EventDetails::AccessControl(acs) => Some(acs),
            EventDetails::Detection => None,
        }
    }

    /// Plate number, if present and not blank
    pub fn plate_number(&self) -> Option<&str> {
        self.access_control()
            .and_then(|acs| acs.plate_number.as_deref())
            .map(str::trim)
            .filter(|plate| !plate.is_empty())
    }

    pub fn gate(&self) -> Option<Gate> {
        self.access_control().and_then(|acs| acs.gate)
    }

    pub fn target_str(&self) -> Option<&str> {
        self.target.as_ref().map(DetectionTarget::as_str)
    }
}
