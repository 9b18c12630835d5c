pub mod broker;
pub mod event;
#[cfg(test)]
mod tests;

pub use broker::{create_message_broker, MessageBroker};
pub use event::AlertMessage;
