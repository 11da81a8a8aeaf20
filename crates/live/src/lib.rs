//! Live telemetry subscriptions for welding controllers.
//!
//! This crate owns the stream side of the aggregation core:
//!
//! - [`transport`] / [`client`]: the pluggable pub/sub seam and its
//!   WebSocket implementation.
//! - [`messages`]: decoding inbound frames into raw samples.
//! - [`store`]: the authoritative per-device live records.
//! - [`manager`]: one long-lived worker that keeps the desired set of
//!   device channels subscribed across reconnects.
//! - [`facade`]: [`LiveTelemetry`], the single entry point used by the
//!   HTTP layer.
//! - `testing`: an in-memory transport, behind the `test-support` feature.

pub mod client;
pub mod config;
pub mod counters;
pub mod error;
pub mod facade;
pub mod manager;
pub mod messages;
pub mod reconnect;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod transport;

pub use client::WsTransport;
pub use config::{LiveConfig, StalePolicy};
pub use counters::{CounterSnapshot, LiveCounters};
pub use error::LiveError;
pub use facade::LiveTelemetry;
pub use manager::{ConnectionStatus, Retention, SubscriptionManager};
pub use store::{ApplyOutcome, LiveStore, UpsertOutcome};
pub use transport::{Transport, TransportConnection, TransportError, TransportEvent};
