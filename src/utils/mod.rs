pub mod event_json;
pub mod event_xml;
pub mod frame;
