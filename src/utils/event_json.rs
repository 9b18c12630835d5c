//! Reader for JSON event documents posted by licence-plate readers.

use crate::error::Error;
use serde_json::{Map, Value};

/// `AccessControllerEvent` sub-object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControllerFields {
    pub card_no: Option<String>,
    pub name: Option<String>,
    pub employee_no: Option<String>,
    pub user_type: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonEventFields {
    pub device_serial: Option<String>,
    pub channel_id: Option<i32>,
    pub event_type: Option<String>,
    pub date_time: Option<String>,
    pub event_state: Option<String>,
    pub event_description: Option<String>,
    pub access_control: Option<AccessControllerFields>,
}

/// Strings as-is, numbers and booleans stringified, blanks dropped
fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    let value = match object.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

fn channel(object: &Map<String, Value>) -> Option<i32> {
    match object.get("channelID")? {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_event(bytes: &[u8]) -> Result<JsonEventFields, Error> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Parse(format!("malformed event JSON: {}", e)))?;
    let Value::Object(object) = value else {
        return Err(Error::Parse(
            "event JSON must be an object at the top level".to_string(),
        ));
    };

    let access_control = match object.get("AccessControllerEvent") {
        Some(Value::Object(acs)) => Some(AccessControllerFields {
            card_no: text(acs, "cardNo"),
            name: text(acs, "name"),
            employee_no: text(acs, "employeeNoString"),
            user_type: text(acs, "userType"),
            device_name: text(acs, "deviceName"),
        }),
        _ => None,
    };

    Ok(JsonEventFields {
        device_serial: text(&object, "deviceSerial").or_else(|| text(&object, "deviceID")),
        channel_id: channel(&object),
        event_type: text(&object, "eventType"),
        date_time: text(&object, "dateTime"),
        event_state: text(&object, "eventState"),
        event_description: text(&object, "eventDescription"),
        access_control,
    })
}
