pub mod alert_models;
pub mod entry_exit_models;
pub mod event_models;
pub mod vehicle_models;
pub mod zone_models;

pub use alert_models::{Alert, AlertFilter, AlertKind, NewAlert};
pub use entry_exit_models::{DailyCounts, DailyStats, EntryExitFilter, EntryExitLog};
pub use event_models::{CameraEvent, EventFilter};
pub use vehicle_models::{NewVehicle, Vehicle, VehicleFilter};
pub use zone_models::{ZoneOccupancy, ZoneOccupancyView};
