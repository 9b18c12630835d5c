pub mod alerts;
pub mod dispatcher;
pub mod entry_exit;
pub mod intrusion;
pub mod normalizer;
pub mod occupancy;
pub mod pipeline;
pub mod snapshot_store;
pub mod violation;

pub use alerts::{AlertNotifier, AlertService, LogNotifier};
pub use dispatcher::Dispatcher;
pub use pipeline::EventPipeline;
pub use snapshot_store::SnapshotStore;
