pub mod rest;
#[cfg(test)]
mod tests;

pub use rest::{router, ApiError, AppState, RestApi};
