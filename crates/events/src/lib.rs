//! Change-notification infrastructure for the live telemetry core.
//!
//! - [`ChangeFeed`] - in-process fan-out hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DeviceChange`] - the event emitted whenever a device's live record
//!   changes.

pub mod bus;

pub use bus::{ChangeFeed, ChangeKind, DeviceChange};
