//! In-process change feed backed by a `tokio::sync::broadcast` channel.
//!
//! [`ChangeFeed`] is the publish/subscribe hub for [`DeviceChange`]s. It is
//! designed to be shared via `Arc<ChangeFeed>` between the subscription
//! worker (publisher) and any number of UI-facing consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use weldwatch_core::types::DeviceId;

// ---------------------------------------------------------------------------
// DeviceChange
// ---------------------------------------------------------------------------

/// What happened to the device's live record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A new sample was classified and applied.
    Sample,
    /// The threshold configuration was replaced.
    Config,
    /// The reading was forced back to NO_STATUS after a transport outage.
    Cleared,
    /// The record was removed on unsubscribe.
    Removed,
}

/// Notification that one device's live record changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChange {
    pub device_id: DeviceId,
    pub kind: ChangeKind,
    /// When the change was published (UTC).
    pub at: DateTime<Utc>,
}

impl DeviceChange {
    pub fn new(device_id: DeviceId, kind: ChangeKind) -> Self {
        Self {
            device_id,
            kind,
            at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeFeed
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out feed of device changes.
///
/// Every receiver obtained from [`subscribe`](Self::subscribe) sees every
/// change published after it subscribed. Dropping a receiver unregisters it
/// without affecting the others.
///
/// # Usage
///
/// ```rust
/// use weldwatch_core::types::DeviceId;
/// use weldwatch_events::{ChangeFeed, ChangeKind, DeviceChange};
///
/// let feed = ChangeFeed::default();
/// let mut rx = feed.subscribe();
///
/// feed.publish(DeviceChange::new(DeviceId::new("hw-1"), ChangeKind::Sample));
/// ```
pub struct ChangeFeed {
    sender: broadcast::Sender<DeviceChange>,
}

impl ChangeFeed {
    /// Create a feed with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed changes are dropped
    /// and slow receivers observe `RecvError::Lagged`; they should fall back
    /// to a full snapshot read.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change to all current subscribers.
    ///
    /// With no subscribers the change is silently dropped.
    pub fn publish(&self, change: DeviceChange) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(change);
    }

    /// Register a new consumer.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.sender.subscribe()
    }

    /// Number of currently registered consumers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
