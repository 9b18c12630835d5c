pub mod api;
pub mod config;
pub mod db;
pub mod device_manager;
pub mod error;
pub mod event_record;
pub mod messaging;
pub mod services;
pub mod utils;

// Re-export main components for easier use
pub use error::Error;
pub use event_record::{EventKind, EventRecord};
