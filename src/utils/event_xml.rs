//! Namespace-agnostic reader for ISAPI `EventNotificationAlert` documents.
//!
//! Cameras disagree on the schema URI (isapi.org, hikvision.com, none at all), so the root
//! element's namespace is taken from the document itself. Children are matched by local name
//! when they are either unqualified or in the root namespace.

use crate::error::Error;
use xml::reader::{EventReader, ParserConfig, XmlEvent};

/// Raw fields of one alert document, untrimmed values already stripped of whitespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFields {
    /// Namespace declared on the root element
    pub namespace: Option<String>,
    pub root: String,
    pub device_serial: Option<String>,
    pub channel_id: Option<String>,
    pub event_type: Option<String>,
    pub trigger_time: Option<String>,
    pub date_time: Option<String>,
    pub event_state: Option<String>,
    pub event_description: Option<String>,
    pub channel_name: Option<String>,
    pub region_id: Option<String>,
    pub detection_target: Option<String>,
}

struct Element {
    /// Local name, `None` for elements from a foreign namespace
    name: Option<String>,
    text: String,
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse an alert document into its raw fields
pub fn parse_alert(bytes: &[u8]) -> Result<AlertFields, Error> {
    let config = ParserConfig::new()
        .trim_whitespace(false)
        .cdata_to_characters(true)
        .ignore_comments(true);
    let reader = EventReader::new_with_config(bytes, config);

    let mut fields = AlertFields::default();
    let mut stack: Vec<Element> = Vec::new();
    let mut region_entries = 0usize;
    let mut seen_root = false;

    for event in reader {
        let event = event.map_err(|e| Error::Parse(format!("malformed event XML: {}", e)))?;

        match event {
            XmlEvent::StartElement { name, .. } => {
                if !seen_root {
                    seen_root = true;
                    fields.namespace = name.namespace.clone();
                    fields.root = name.local_name.clone();
                    stack.push(Element {
                        name: Some(name.local_name),
                        text: String::new(),
                    });
                    continue;
                }

                let in_scope = match (&name.namespace, &fields.namespace) {
                    (None, _) => true,
                    (Some(ns), Some(root_ns)) => ns == root_ns,
                    (Some(_), None) => false,
                };
                let local = in_scope.then_some(name.local_name);

                if stack.len() == 2
                    && local.as_deref() == Some("DetectionRegionEntry")
                    && stack[1].name.as_deref() == Some("DetectionRegionList")
                {
                    region_entries += 1;
                }

                stack.push(Element {
                    name: local,
                    text: String::new(),
                });
            }
            XmlEvent::Characters(text) | XmlEvent::Whitespace(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            XmlEvent::EndElement { .. } => {
                let depth = stack.len();
                let Some(element) = stack.pop() else {
                    continue;
                };
                let Some(local) = element.name else {
                    continue;
                };

                match depth {
                    2 => {
                        let slot = match local.as_str() {
                            "deviceSerial" | "deviceID" => &mut fields.device_serial,
                            "channelID" => &mut fields.channel_id,
                            "eventType" => &mut fields.event_type,
                            "triggerTime" => &mut fields.trigger_time,
                            "dateTime" => &mut fields.date_time,
                            "eventState" => &mut fields.event_state,
                            "eventDescription" => &mut fields.event_description,
                            "channelName" => &mut fields.channel_name,
                            _ => continue,
                        };
                        if slot.is_none() {
                            *slot = non_empty(element.text);
                        }
                    }
                    4 if region_entries == 1
                        && stack[1].name.as_deref() == Some("DetectionRegionList")
                        && stack[2].name.as_deref() == Some("DetectionRegionEntry") =>
                    {
                        match local.as_str() {
                            "regionID" => fields.region_id = non_empty(element.text),
                            "detectionTarget" => fields.detection_target = non_empty(element.text),
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    if !seen_root {
        return Err(Error::Parse("event XML has no root element".to_string()));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION_ENTRANCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<EventNotificationAlert version="2.0" xmlns="http://www.isapi.org/ver20/XMLSchema">
    <ipAddress>10.1.13.20</ipAddress>
    <channelID>2</channelID>
    <dateTime>2024-05-01T08:15:00+08:00</dateTime>
    <activePostCount>1</activePostCount>
    <eventType>regionEntrance</eventType>
    <eventState>active</eventState>
    <eventDescription>Region Entrance</eventDescription>
    <channelName>North Lot</channelName>
    <DetectionRegionList>
        <DetectionRegionEntry>
            <regionID>zone-1</regionID>
            <sensitivityLevel>50</sensitivityLevel>
            <detectionTarget>vehicle</detectionTarget>
        </DetectionRegionEntry>
        <DetectionRegionEntry>
            <regionID>zone-2</regionID>
            <detectionTarget>human</detectionTarget>
        </DetectionRegionEntry>
    </DetectionRegionList>
</EventNotificationAlert>"#;

    #[test]
    fn reads_default_namespace_document() -> anyhow::Result<()> {
        let fields = parse_alert(REGION_ENTRANCE.as_bytes())?;

        assert_eq!(
            fields.namespace.as_deref(),
            Some("http://www.isapi.org/ver20/XMLSchema")
        );
        assert_eq!(fields.root, "EventNotificationAlert");
        assert_eq!(fields.channel_id.as_deref(), Some("2"));
        assert_eq!(fields.event_type.as_deref(), Some("regionEntrance"));
        assert_eq!(fields.date_time.as_deref(), Some("2024-05-01T08:15:00+08:00"));
        assert_eq!(fields.event_state.as_deref(), Some("active"));
        assert_eq!(fields.channel_name.as_deref(), Some("North Lot"));
        assert_eq!(fields.region_id.as_deref(), Some("zone-1"));
        assert_eq!(fields.detection_target.as_deref(), Some("vehicle"));
        assert_eq!(fields.device_serial, None);
        Ok(())
    }

    #[test]
    fn reads_prefixed_and_bare_documents() -> anyhow::Result<()> {
        let prefixed = r#"<hk:EventNotificationAlert xmlns:hk="http://www.hikvision.com/ver20/XMLSchema">
            <hk:eventType>linedetection</hk:eventType>
            <hk:deviceSerial>DS-2CD1</hk:deviceSerial>
            <hk:DetectionRegionList><hk:DetectionRegionEntry>
                <hk:regionID>gate-line</hk:regionID>
            </hk:DetectionRegionEntry></hk:DetectionRegionList>
        </hk:EventNotificationAlert>"#;
        let fields = parse_alert(prefixed.as_bytes())?;
        assert_eq!(fields.event_type.as_deref(), Some("linedetection"));
        assert_eq!(fields.device_serial.as_deref(), Some("DS-2CD1"));
        assert_eq!(fields.region_id.as_deref(), Some("gate-line"));
        assert_eq!(fields.detection_target, None);

        let bare = "<EventNotificationAlert><eventType>VMD</eventType><triggerTime>2024-01-01T00:00:00Z</triggerTime></EventNotificationAlert>";
        let fields = parse_alert(bare.as_bytes())?;
        assert_eq!(fields.namespace, None);
        assert_eq!(fields.event_type.as_deref(), Some("VMD"));
        assert_eq!(fields.trigger_time.as_deref(), Some("2024-01-01T00:00:00Z"));
        Ok(())
    }

    #[test]
    fn ignores_foreign_namespace_elements() -> anyhow::Result<()> {
        let doc = r#"<EventNotificationAlert xmlns="urn:a" xmlns:x="urn:b">
            <x:eventType>spoofed</x:eventType>
            <eventType>fielddetection</eventType>
        </EventNotificationAlert>"#;
        let fields = parse_alert(doc.as_bytes())?;
        assert_eq!(fields.event_type.as_deref(), Some("fielddetection"));
        Ok(())
    }

    #[test]
    fn truncated_document_is_a_parse_fault() {
        let result = parse_alert(b"<EventNotificationAlert><eventType>regionEnt");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
