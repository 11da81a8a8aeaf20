//! JSON frames exchanged with dashboard clients.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use weldwatch_core::telemetry::DeviceLiveRecord;
use weldwatch_core::types::DeviceId;
use weldwatch_events::ChangeKind;
use weldwatch_live::ConnectionStatus;

/// Frames pushed to dashboard clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    /// Every tracked record plus the stream status. Sent on connect and
    /// whenever the client asks for a resync.
    Snapshot {
        devices: Vec<DeviceLiveRecord>,
        connection: ConnectionStatus,
    },
    DeviceChanged {
        device_id: DeviceId,
        kind: ChangeKind,
        /// Current record; `null` once the device was removed.
        record: Option<DeviceLiveRecord>,
    },
    ConnectionChanged {
        status: ConnectionStatus,
    },
    /// Frames this client missed. It should send a `resync` command.
    Lagged {
        skipped: u64,
    },
}

impl LiveMessage {
    pub fn to_frame(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize live message");
                None
            }
        }
    }
}

/// Commands a dashboard client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Ask for a fresh [`LiveMessage::Snapshot`].
    Resync,
}
