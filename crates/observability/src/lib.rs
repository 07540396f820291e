//! Logging for processes that embed the authorization engine.
//!
//! The engine only emits `tracing` events. This crate installs the JSON
//! subscriber that turns them into log lines.

pub mod subscriber;

pub use subscriber::{DEFAULT_FILTER, init};
