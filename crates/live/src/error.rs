use weldwatch_core::error::CoreError;
use weldwatch_core::types::DeviceId;

/// Errors surfaced by the live subscription layer.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    /// The transport did not confirm the subscription in time. The devices
    /// stay in the desired set and are subscribed once the link recovers.
    #[error("Subscription not confirmed within timeout ({pending} device(s) pending)")]
    SubscriptionTimeout { pending: usize },

    #[error("Invalid threshold configuration: {0}")]
    InvalidConfig(#[from] CoreError),

    #[error("Device is not tracked: {0}")]
    UnknownDevice(DeviceId),

    /// The subscription worker has shut down.
    #[error("Live telemetry is shut down")]
    Closed,
}
