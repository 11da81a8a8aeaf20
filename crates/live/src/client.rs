//! WebSocket implementation of the telemetry [`Transport`].
//!
//! One connection carries every device: subscribing sends a command frame
//! naming the device channel, and inbound frames are tagged with the
//! channel they belong to.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use weldwatch_core::types::DeviceId;

use crate::messages::{encode_command, parse_frame, Action};
use crate::transport::{Transport, TransportConnection, TransportError, TransportEvent};

/// Connection factory for a telemetry WebSocket endpoint.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    /// * `url` - WebSocket endpoint, e.g. `ws://host:8080/telemetry`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError> {
        let (ws_stream, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            TransportError::Connection(format!("Failed to connect to {}: {e}", self.url))
        })?;

        tracing::info!(url = %self.url, "Connected to telemetry stream");
        Ok(Box::new(WsConnection { ws_stream }))
    }
}

/// A live WebSocket connection to the telemetry stream.
pub struct WsConnection {
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsConnection {
    async fn send_command(
        &mut self,
        action: Action,
        channel: &DeviceId,
    ) -> Result<(), TransportError> {
        self.ws_stream
            .send(Message::Text(encode_command(action, channel)))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn subscribe(&mut self, channel: &DeviceId) -> Result<(), TransportError> {
        self.send_command(Action::Subscribe, channel).await
    }

    async fn unsubscribe(&mut self, channel: &DeviceId) -> Result<(), TransportError> {
        self.send_command(Action::Unsubscribe, channel).await
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>> {
        while let Some(msg_result) = self.ws_stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let event = match parse_frame(&text) {
                        Ok(frame) => TransportEvent::Message {
                            channel: DeviceId::new(frame.channel),
                            payload: frame.data,
                        },
                        Err(e) => TransportEvent::Malformed {
                            reason: e.to_string(),
                        },
                    };
                    return Some(Ok(event));
                }
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(TransportEvent::Malformed {
                        reason: format!("unexpected binary frame ({} bytes)", bytes.len()),
                    }));
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Answered by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "Telemetry stream closed by server");
                    return None;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws_stream.close(None).await {
            tracing::debug!(error = %e, "Error while closing telemetry stream");
        }
    }
}
