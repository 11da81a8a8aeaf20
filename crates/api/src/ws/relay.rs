//! Change-feed relay: live telemetry -> dashboard WebSockets.
//!
//! One task per process subscribes to the [`LiveTelemetry`] change feed and
//! the connection watch, and pushes each event to every dashboard. Device
//! frames carry the full record so clients never need a follow-up read.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use weldwatch_live::LiveTelemetry;

use crate::ws::frames::LiveMessage;
use crate::ws::hub::DashboardHub;

/// Spawn the relay task. It runs until `cancel` fires or the change feed
/// closes.
pub fn start_relay(
    telemetry: Arc<LiveTelemetry>,
    dashboards: Arc<DashboardHub>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut changes = telemetry.change_feed();
    let mut connection = telemetry.watch_connection();

    tokio::spawn(async move {
        let mut watching_connection = true;
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(change) => LiveMessage::DeviceChanged {
                        record: telemetry.device_snapshot(&change.device_id),
                        device_id: change.device_id,
                        kind: change.kind,
                    },
                    // Every client missed these frames.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Relay lagged behind the change feed");
                        LiveMessage::Lagged { skipped }
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = connection.changed(), if watching_connection => {
                    if changed.is_err() {
                        // Worker gone; keep relaying device changes.
                        watching_connection = false;
                        continue;
                    }
                    LiveMessage::ConnectionChanged {
                        status: connection.borrow_and_update().clone(),
                    }
                },
            };

            dashboards.push(&message);
        }
        tracing::info!("Live relay stopped");
    })
}
