use crate::config::CameraDirectory;
use crate::error::Error;
use crate::event_record::{AccessControl, DetectionTarget, EventDetails, EventKind, EventRecord};
use crate::utils::event_json::{self, JsonEventFields};
use crate::utils::event_xml::{self, AlertFields};
use crate::utils::frame::MediaKind;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use std::convert::Infallible;

/// Camera timestamps, most to least common. Naive values are taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a camera-supplied timestamp, falling back to `received` on anything unparseable
pub fn parse_trigger_time(value: Option<&str>, received: DateTime<Utc>) -> DateTime<Utc> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return received;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Utc);
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return parsed.and_utc();
        }
    }

    debug!("Unparseable trigger time '{}', using receipt time", value);
    received
}

fn parse_kind(value: Option<&str>) -> EventKind {
    value
        .unwrap_or_default()
        .parse()
        .unwrap_or_else(|never: Infallible| match never {})
}

fn parse_target(value: Option<&str>) -> Option<DetectionTarget> {
    value.and_then(|v| v.parse().ok())
}

/// Convert one document into an [`EventRecord`].
///
/// `media` of `None` sniffs the document. The camera is resolved from `source_address`.
pub fn normalize(
    bytes: &[u8],
    media: Option<MediaKind>,
    source_address: &str,
    directory: &CameraDirectory,
) -> Result<EventRecord, Error> {
    let received = Utc::now();
    let media = media.unwrap_or_else(|| MediaKind::sniff(bytes));
    let camera_id = directory.resolve(source_address);
    let raw_payload = String::from_utf8_lossy(bytes).into_owned();

    match media {
        MediaKind::Xml => {
            let fields = event_xml::parse_alert(bytes)?;
            Ok(from_xml(fields, camera_id, source_address, raw_payload, received))
        }
        MediaKind::Json => {
            let fields = event_json::parse_event(bytes)?;
            Ok(from_json(
                fields,
                camera_id,
                source_address,
                raw_payload,
                received,
                directory,
            ))
        }
    }
}

fn from_xml(
    fields: AlertFields,
    camera_id: String,
    source_address: &str,
    raw_payload: String,
    received: DateTime<Utc>,
) -> EventRecord {
    let trigger = fields.trigger_time.as_deref().or(fields.date_time.as_deref());

    EventRecord {
        camera_id,
        source_address: source_address.to_string(),
        device_serial: fields
            .device_serial
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        channel_id: fields
            .channel_id
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(1),
        kind: parse_kind(fields.event_type.as_deref()),
        target: parse_target(fields.detection_target.as_deref()),
        region_id: fields.region_id,
        channel_name: fields.channel_name,
        state: fields.event_state,
        description: fields.event_description,
        trigger_time: parse_trigger_time(trigger, received),
        raw_payload,
        snapshot_path: None,
        details: EventDetails::Detection,
    }
}

fn from_json(
    fields: JsonEventFields,
    camera_id: String,
    source_address: &str,
    raw_payload: String,
    received: DateTime<Utc>,
    directory: &CameraDirectory,
) -> EventRecord {
    let trigger_time = parse_trigger_time(fields.date_time.as_deref(), received);
    let mut kind = parse_kind(fields.event_type.as_deref());

    let (target, region_id, channel_name, details) = match fields.access_control {
        Some(acs) => {
            // direction comes from where the reader is mounted, not from what it reports
            let gate = directory.gate_for(&camera_id);
            kind = EventKind::AccessControl;
            (
                Some(DetectionTarget::Vehicle),
                gate.map(|g| g.as_str().to_string()),
                acs.device_name,
                EventDetails::AccessControl(AccessControl {
                    plate_number: acs.card_no,
                    gate,
                    person_name: acs.name,
                    employee_id: acs.employee_no,
                    user_type: acs.user_type,
                }),
            )
        }
        None => (None, None, None, EventDetails::Detection),
    };

    EventRecord {
        camera_id,
        source_address: source_address.to_string(),
        device_serial: fields
            .device_serial
            .unwrap_or_else(|| "unknown".to_string()),
        channel_id: fields.channel_id.unwrap_or(1),
        kind,
        target,
        region_id,
        channel_name,
        state: fields.event_state,
        description: fields.event_description,
        trigger_time,
        raw_payload,
        snapshot_path: None,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;
    use crate::event_record::Gate;
    use chrono::TimeZone;

    fn directory() -> anyhow::Result<CameraDirectory> {
        let camera = |id: &str, address: &str, gate: Option<Gate>| CameraConfig {
            id: id.to_string(),
            address: address.to_string(),
            username: None,
            password: None,
            gate,
            stream: false,
        };
        CameraDirectory::new(vec![
            camera("CAM-02", "10.1.13.20", None),
            camera("CAM-ENTRY", "192.168.1.104", Some(Gate::Entry)),
        ])
    }

    #[test]
    fn xml_fields_reach_the_record() -> anyhow::Result<()> {
        let xml = br#"<EventNotificationAlert xmlns="http://www.hikvision.com/ver20/XMLSchema">
            <channelID>4</channelID>
            <dateTime>2024-05-01T08:15:00Z</dateTime>
            <eventType>regionEntrance</eventType>
            <DetectionRegionList><DetectionRegionEntry>
                <regionID>zone-1</regionID><detectionTarget>vehicle</detectionTarget>
            </DetectionRegionEntry></DetectionRegionList>
        </EventNotificationAlert>"#;

        let record = normalize(xml, None, "10.1.13.20", &directory()?)?;

        assert_eq!(record.camera_id, "CAM-02");
        assert_eq!(record.kind, EventKind::RegionEntrance);
        assert_eq!(record.region_id.as_deref(), Some("zone-1"));
        assert_eq!(record.target, Some(DetectionTarget::Vehicle));
        assert_eq!(record.channel_id, 4);
        assert_eq!(record.device_serial, "unknown");
        assert_eq!(
            record.trigger_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap()
        );
        assert!(record.access_control().is_none());
        Ok(())
    }

    #[test]
    fn json_access_control_takes_gate_from_configuration() -> anyhow::Result<()> {
        // the payload claims an exit; the reader is mounted at the entry
        let json = br#"{"deviceID":"ANPR-1","eventType":"AccessControllerEvent",
            "dateTime":"not a time",
            "AccessControllerEvent":{"cardNo":"X","direction":"exit","userType":"visitor"}}"#;

        let before = Utc::now();
        let record = normalize(json, None, "192.168.1.104", &directory()?)?;

        assert_eq!(record.camera_id, "CAM-ENTRY");
        assert_eq!(record.kind, EventKind::AccessControl);
        assert_eq!(record.plate_number(), Some("X"));
        assert_eq!(record.gate(), Some(Gate::Entry));
        assert_eq!(record.region_id.as_deref(), Some("entry"));
        assert_eq!(record.target, Some(DetectionTarget::Vehicle));
        assert_eq!(record.device_serial, "ANPR-1");
        assert!(record.trigger_time >= before);
        Ok(())
    }

    #[test]
    fn unmapped_source_gets_synthetic_identity() -> anyhow::Result<()> {
        let record = normalize(
            b"<EventNotificationAlert><eventType>VMD</eventType></EventNotificationAlert>",
            Some(MediaKind::Xml),
            "10.9.9.9",
            &directory()?,
        )?;
        assert_eq!(record.camera_id, "UNKNOWN-10.9.9.9");
        assert_eq!(record.kind, EventKind::Motion);
        assert_eq!(record.channel_id, 1);
        Ok(())
    }

    #[test]
    fn malformed_documents_are_parse_faults() -> anyhow::Result<()> {
        let directory = directory()?;
        assert!(matches!(
            normalize(b"<EventNotificationAlert>", None, "10.1.13.20", &directory),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            normalize(b"{\"eventType\"", None, "10.1.13.20", &directory),
            Err(Error::Parse(_))
        ));
        Ok(())
    }

    #[test]
    fn trigger_time_formats() {
        let received = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            parse_trigger_time(Some("2024-05-01T10:15:00+02:00"), received),
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap()
        );
        assert_eq!(
            parse_trigger_time(Some("2024-05-01 08:15:00"), received),
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap()
        );
        assert_eq!(parse_trigger_time(Some("yesterday"), received), received);
        assert_eq!(parse_trigger_time(None, received), received);
    }
}
