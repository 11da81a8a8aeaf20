//! In-memory transport and helpers for tests of code built on
//! [`LiveTelemetry`](crate::LiveTelemetry).
//!
//! Compiled for this crate's own tests and for dependents that enable the
//! `test-support` feature. [`MockTransport`] stands in for the telemetry
//! WebSocket: tests push samples into it, break the connection, make
//! connecting fail, and inspect which channels the worker subscribed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use weldwatch_core::types::DeviceId;

use crate::config::LiveConfig;
use crate::reconnect::ReconnectConfig;
use crate::transport::{Transport, TransportConnection, TransportError, TransportEvent};

enum MockFrame {
    Event(TransportEvent),
    Drop,
}

#[derive(Default)]
struct MockState {
    fail_connect: AtomicBool,
    hang_unsubscribe: AtomicBool,
    connects: AtomicUsize,
    subscribed: Mutex<BTreeSet<DeviceId>>,
    subscribe_log: Mutex<Vec<DeviceId>>,
    current: Mutex<Option<mpsc::UnboundedSender<MockFrame>>>,
}

/// In-memory transport. Clones share the same state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connection attempt fails while set.
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// While set, `unsubscribe` on any connection never completes.
    pub fn set_hang_unsubscribe(&self, hang: bool) {
        self.state.hang_unsubscribe.store(hang, Ordering::SeqCst);
    }

    /// Successful and failed connection attempts so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Live handles on the shared state: every transport clone plus every
    /// open connection.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state.current.lock().is_some()
    }

    /// Channels subscribed on the current connection.
    pub fn subscribed(&self) -> BTreeSet<DeviceId> {
        self.state.subscribed.lock().clone()
    }

    /// Every subscribe command received, across connections.
    pub fn subscribe_log(&self) -> Vec<DeviceId> {
        self.state.subscribe_log.lock().clone()
    }

    /// Deliver a sample the way the broker would: only to subscribed channels.
    pub fn push_sample(&self, device: &str, payload: Value) -> bool {
        let channel = DeviceId::new(device);
        if !self.state.subscribed.lock().contains(&channel) {
            return false;
        }
        self.push_event(TransportEvent::Message { channel, payload })
    }

    /// Deliver an event regardless of subscriptions.
    pub fn push_event(&self, event: TransportEvent) -> bool {
        match self.state.current.lock().as_ref() {
            Some(tx) => tx.send(MockFrame::Event(event)).is_ok(),
            None => false,
        }
    }

    /// Sever the current connection as if the network dropped.
    pub fn drop_connection(&self) {
        if let Some(tx) = self.state.current.lock().take() {
            let _ = tx.send(MockFrame::Drop);
        }
        self.state.subscribed.lock().clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn endpoint(&self) -> String {
        "mock://telemetry".into()
    }

    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("mock refused".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.state.subscribed.lock().clear();
        *self.state.current.lock() = Some(tx);
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            rx,
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    rx: mpsc::UnboundedReceiver<MockFrame>,
}

#[async_trait]
impl TransportConnection for MockConnection {
    async fn subscribe(&mut self, channel: &DeviceId) -> Result<(), TransportError> {
        self.state.subscribed.lock().insert(channel.clone());
        self.state.subscribe_log.lock().push(channel.clone());
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &DeviceId) -> Result<(), TransportError> {
        if self.state.hang_unsubscribe.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.state.subscribed.lock().remove(channel);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>> {
        match self.rx.recv().await {
            Some(MockFrame::Event(event)) => Some(Ok(event)),
            Some(MockFrame::Drop) | None => None,
        }
    }

    async fn close(&mut self) {
        self.state.current.lock().take();
    }
}

/// Fast timings so reconnect and timeout paths finish in milliseconds.
pub fn test_config() -> LiveConfig {
    LiveConfig {
        transport_url: "mock://telemetry".into(),
        subscribe_timeout: Duration::from_millis(300),
        connect_timeout: Duration::from_secs(1),
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            multiplier: 2.0,
        },
        ..LiveConfig::default()
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
