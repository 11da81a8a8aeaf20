use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::frames::{ClientCommand, LiveMessage};

/// Ping period that keeps idle dashboard sockets open through proxies.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/v1/ws -- upgrade to the live push channel.
///
/// The client first receives a full snapshot, then incremental frames from
/// the relay. Sending `{"type":"resync"}` requests a fresh snapshot, which
/// is what a client does after a `lagged` frame.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_dashboard(socket, state))
}

async fn serve_dashboard(socket: WebSocket, state: AppState) {
    let (client_id, mut outbound) = state.dashboards.register();
    tracing::info!(
        client_id = %client_id,
        clients = state.dashboards.client_count(),
        "Dashboard connected",
    );

    send_snapshot(&state, &client_id);

    let (mut sink, mut inbound) = socket.split();
    let writer = tokio::spawn(async move {
        let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
        keepalive.tick().await;
        loop {
            let frame = tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = keepalive.tick() => Message::Ping(Bytes::new()),
            };
            let closing = matches!(frame, Message::Close(_));
            if sink.send(frame).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(result) = inbound.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                Ok(ClientCommand::Resync) => {
                    tracing::debug!(client_id = %client_id, "Dashboard requested resync");
                    send_snapshot(&state, &client_id);
                }
                Err(e) => {
                    tracing::debug!(
                        client_id = %client_id,
                        error = %e,
                        "Unknown dashboard command",
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "Dashboard receive error");
                break;
            }
        }
    }

    state.dashboards.unregister(&client_id);
    writer.abort();
    tracing::info!(client_id = %client_id, "Dashboard disconnected");
}

fn send_snapshot(state: &AppState, client_id: &Uuid) {
    let snapshot = LiveMessage::Snapshot {
        devices: state.telemetry.devices(),
        connection: state.telemetry.connection_status(),
    };
    if !state.dashboards.send_to(client_id, &snapshot) {
        tracing::warn!(client_id = %client_id, "Snapshot not queued, dashboard is lagging");
    }
}
