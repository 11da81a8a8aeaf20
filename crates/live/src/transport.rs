//! Pluggable pub/sub transport seam.
//!
//! The subscription worker only talks to these traits. [`WsTransport`]
//! is the production implementation; tests substitute an in-memory fake.
//!
//! [`WsTransport`]: crate::client::WsTransport

use async_trait::async_trait;
use weldwatch_core::types::DeviceId;

/// Errors raised by a transport. The worker absorbs them, counts them and
/// reconnects; they never reach callers of the live API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed")]
    Closed,
}

/// One inbound item from an established connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A message on a device channel. The payload is decoded by the worker.
    Message {
        channel: DeviceId,
        payload: serde_json::Value,
    },
    /// A frame that could not be attributed to any channel.
    Malformed { reason: String },
}

/// Factory for connections to the telemetry stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String;

    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError>;
}

/// A single multiplexed connection. Each device is a logical channel.
#[async_trait]
pub trait TransportConnection: Send {
    async fn subscribe(&mut self, channel: &DeviceId) -> Result<(), TransportError>;

    async fn unsubscribe(&mut self, channel: &DeviceId) -> Result<(), TransportError>;

    /// Wait for the next inbound event. `None` once the connection is gone.
    ///
    /// Must be cancel-safe: the worker races it against commands and
    /// shutdown inside `tokio::select!`.
    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>>;

    /// Best-effort graceful close.
    async fn close(&mut self);
}
