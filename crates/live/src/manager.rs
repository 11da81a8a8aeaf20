//! Subscription manager and its connection worker.
//!
//! [`SubscriptionManager`] keeps the *desired* set of device channels and a
//! single background worker that owns the transport connection. The worker
//! loops through connect -> subscribe everything desired -> dispatch
//! samples, and falls back to exponential backoff whenever the link drops.
//! While offline it keeps accepting commands; subscribe acknowledgements
//! are deferred until the next successful (re)subscription.
//!
//! Connection state is published through a [`tokio::sync::watch`] channel.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use weldwatch_core::telemetry::ThresholdConfig;
use weldwatch_core::types::{DeviceId, Timestamp};

use crate::config::{LiveConfig, StalePolicy};
use crate::counters::LiveCounters;
use crate::error::LiveError;
use crate::messages::decode_sample;
use crate::reconnect::{next_delay, ReconnectConfig};
use crate::store::{ApplyOutcome, LiveStore};
use crate::transport::{Transport, TransportConnection, TransportError, TransportEvent};

/// How long [`SubscriptionManager::stop_all`] waits for the worker to exit
/// before aborting it.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for each shutdown step on the connection (releasing the
/// channels, then closing). Kept well under [`WORKER_JOIN_TIMEOUT`].
const TEARDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(2);

/// What [`SubscriptionManager::stop`] does with the device records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Leave the last reading in the store (pause).
    KeepSnapshot,
    /// Delete the records.
    Remove,
}

/// Health of the telemetry stream as seen by the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub last_disconnect_at: Option<Timestamp>,
    pub last_reconnect_at: Option<Timestamp>,
    /// Failed attempts during the current outage. Reset on reconnect.
    pub reconnect_attempts: u32,
}

enum Command {
    Subscribe {
        devices: Vec<DeviceId>,
        ack: oneshot::Sender<()>,
    },
    Unsubscribe {
        devices: Vec<DeviceId>,
        ack: oneshot::Sender<()>,
    },
}

/// Owns the desired subscription set and the connection worker.
pub struct SubscriptionManager {
    store: Arc<LiveStore>,
    desired: Arc<Mutex<BTreeSet<DeviceId>>>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    subscribe_timeout: Duration,
    cancel: CancellationToken,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionManager {
    /// Spawn the connection worker. Must be called within a Tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        store: Arc<LiveStore>,
        counters: Arc<LiveCounters>,
        config: &LiveConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let desired = Arc::new(Mutex::new(BTreeSet::new()));
        let cancel = CancellationToken::new();

        let worker = Worker {
            transport,
            store: Arc::clone(&store),
            counters,
            desired: Arc::clone(&desired),
            status: status_tx,
            commands: command_rx,
            reconnect: config.reconnect.clone(),
            connect_timeout: config.connect_timeout,
            stale_policy: config.stale_policy,
            cancel: cancel.child_token(),
            live: HashSet::new(),
            pending_acks: Vec::new(),
            stale_deadline: None,
            ever_connected: false,
        };

        let handle = tokio::spawn(async move {
            tracing::info!(endpoint = %worker.transport.endpoint(), "Starting telemetry worker");
            worker.run().await;
            tracing::info!("Telemetry worker exited");
        });

        Self {
            store,
            desired,
            commands: command_tx,
            status: status_rx,
            subscribe_timeout: config.subscribe_timeout,
            cancel,
            worker: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// Begin streaming the given devices.
    ///
    /// Every supplied config is validated before anything changes. Devices
    /// without an entry in `configs` keep their existing config, or get
    /// unbounded thresholds if they are new. Idempotent.
    ///
    /// On [`LiveError::SubscriptionTimeout`] the devices remain desired and
    /// the worker subscribes them as soon as the stream is reachable.
    pub async fn start(
        &self,
        devices: &[DeviceId],
        configs: &HashMap<DeviceId, ThresholdConfig>,
    ) -> Result<(), LiveError> {
        if self.cancel.is_cancelled() {
            return Err(LiveError::Closed);
        }
        for device in devices {
            if let Some(config) = configs.get(device) {
                config.validate()?;
            }
        }

        for device in devices {
            match configs.get(device) {
                Some(config) => self.store.upsert(device.clone(), config.clone())?,
                None => self.store.ensure(device.clone(), ThresholdConfig::unbounded())?,
            };
        }
        self.desired.lock().extend(devices.iter().cloned());

        let (ack, ack_rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                devices: devices.to_vec(),
                ack,
            })
            .map_err(|_| LiveError::Closed)?;

        tracing::debug!(count = devices.len(), "Subscription requested");
        self.await_ack(ack_rx, devices.len()).await
    }

    /// Stop streaming the given devices.
    pub async fn stop(&self, devices: &[DeviceId], retention: Retention) -> Result<(), LiveError> {
        if self.cancel.is_cancelled() {
            return Err(LiveError::Closed);
        }
        {
            let mut desired = self.desired.lock();
            for device in devices {
                desired.remove(device);
            }
        }
        if retention == Retention::Remove {
            for device in devices {
                self.store.remove(device);
            }
        }

        let (ack, ack_rx) = oneshot::channel();
        self.commands
            .send(Command::Unsubscribe {
                devices: devices.to_vec(),
                ack,
            })
            .map_err(|_| LiveError::Closed)?;

        tracing::debug!(count = devices.len(), ?retention, "Unsubscription requested");
        self.await_ack(ack_rx, devices.len()).await
    }

    /// Unsubscribe everything, release the connection and join the worker.
    ///
    /// Records stay readable; further `start`/`stop` calls fail with
    /// [`LiveError::Closed`].
    pub async fn stop_all(&self) {
        tracing::info!("Stopping all telemetry subscriptions");
        self.desired.lock().clear();
        self.cancel.cancel();

        if let Some(mut handle) = self.worker.lock().await.take() {
            if tokio::time::timeout(WORKER_JOIN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("Telemetry worker did not exit in time, aborting it");
                handle.abort();
                // Resolves once the task and everything it owns are dropped.
                let _ = handle.await;
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().connected
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that wakes on every connection state change.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Devices currently in the desired set, in id order.
    pub fn active_devices(&self) -> Vec<DeviceId> {
        self.desired.lock().iter().cloned().collect()
    }

    async fn await_ack(&self, ack: oneshot::Receiver<()>, pending: usize) -> Result<(), LiveError> {
        match tokio::time::timeout(self.subscribe_timeout, ack).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(LiveError::Closed),
            Err(_) => {
                tracing::warn!(
                    pending,
                    timeout_ms = self.subscribe_timeout.as_millis() as u64,
                    "Telemetry worker did not confirm in time",
                );
                Err(LiveError::SubscriptionTimeout { pending })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

type Connection = Box<dyn TransportConnection>;

/// Why a connected session ended.
enum SessionEnd {
    Disconnected,
    Shutdown,
}

struct Worker {
    transport: Arc<dyn Transport>,
    store: Arc<LiveStore>,
    counters: Arc<LiveCounters>,
    desired: Arc<Mutex<BTreeSet<DeviceId>>>,
    status: watch::Sender<ConnectionStatus>,
    commands: mpsc::UnboundedReceiver<Command>,
    reconnect: ReconnectConfig,
    connect_timeout: Duration,
    stale_policy: StalePolicy,
    cancel: CancellationToken,
    /// Channels subscribed on the current connection.
    live: HashSet<DeviceId>,
    /// Subscribe acks waiting for the next successful resubscription.
    pending_acks: Vec<oneshot::Sender<()>>,
    /// When the current outage should clear the live readings.
    stale_deadline: Option<Instant>,
    ever_connected: bool,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let Some(mut conn) = self.establish().await else {
                break;
            };
            match self.run_session(&mut conn).await {
                SessionEnd::Shutdown => {
                    self.teardown(conn).await;
                    break;
                }
                SessionEnd::Disconnected => self.mark_disconnected(),
            }
        }
        // Dropping the remaining acks makes pending callers see `Closed`.
        self.pending_acks.clear();
        self.status.send_modify(|status| status.connected = false);
    }

    /// Connect and subscribe the desired set, retrying with backoff.
    /// Returns `None` on shutdown.
    async fn establish(&mut self) -> Option<Connection> {
        let mut delay = self.reconnect.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let transport = Arc::clone(&self.transport);
            let connect = tokio::time::timeout(self.connect_timeout, transport.connect());
            tokio::pin!(connect);

            let result = loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return None,
                    cmd = self.commands.recv() => match cmd {
                        Some(cmd) => self.handle_offline(cmd),
                        None => return None,
                    },
                    _ = wait_until(self.stale_deadline) => self.clear_stale(),
                    result = &mut connect => break result,
                }
            };

            let failure = match result {
                Ok(Ok(mut conn)) => match self.resubscribe(&mut conn).await {
                    Ok(()) => {
                        self.mark_connected(attempt);
                        return Some(conn);
                    }
                    Err(e) => e,
                },
                Ok(Err(e)) => e,
                Err(_) => TransportError::Connection("connect timed out".into()),
            };

            self.counters.record_transport_error();
            self.status.send_modify(|status| status.reconnect_attempts = attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Telemetry connection attempt failed",
            );

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return None,
                    cmd = self.commands.recv() => match cmd {
                        Some(cmd) => self.handle_offline(cmd),
                        None => return None,
                    },
                    _ = wait_until(self.stale_deadline) => self.clear_stale(),
                    _ = &mut sleep => break,
                }
            }
            delay = next_delay(delay, &self.reconnect);
        }
    }

    /// Dispatch inbound events in arrival order until the link drops.
    async fn run_session(&mut self, conn: &mut Connection) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEnd::Shutdown,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if let Err(e) = self.handle_online(conn, cmd).await {
                            self.counters.record_transport_error();
                            tracing::warn!(error = %e, "Telemetry command failed");
                            return SessionEnd::Disconnected;
                        }
                    }
                    None => return SessionEnd::Shutdown,
                },
                event = conn.next_event() => match event {
                    Some(Ok(event)) => self.dispatch(event),
                    Some(Err(e)) => {
                        self.counters.record_transport_error();
                        tracing::warn!(error = %e, "Telemetry stream error");
                        return SessionEnd::Disconnected;
                    }
                    None => {
                        tracing::info!("Telemetry stream ended");
                        return SessionEnd::Disconnected;
                    }
                },
            }
        }
    }

    fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message { channel, payload } => {
                if !self.desired.lock().contains(&channel) {
                    self.counters.record_unknown_device();
                    tracing::debug!(device_id = %channel, "Dropping sample for inactive channel");
                    return;
                }
                match decode_sample(channel.clone(), payload, Utc::now()) {
                    Ok(raw) => {
                        if self.store.apply_sample(raw) == ApplyOutcome::UnknownDevice {
                            tracing::debug!(
                                device_id = %channel,
                                "Sample for device without record",
                            );
                        }
                    }
                    Err(e) => {
                        self.counters.record_malformed_frame();
                        tracing::warn!(device_id = %channel, error = %e, "Undecodable sample");
                    }
                }
            }
            TransportEvent::Malformed { reason } => {
                self.counters.record_malformed_frame();
                tracing::warn!(reason = %reason, "Malformed telemetry frame");
            }
        }
    }

    fn handle_offline(&mut self, cmd: Command) {
        match cmd {
            // Subscribed on the next resubscription, which covers the
            // whole desired set.
            Command::Subscribe { ack, .. } => self.pending_acks.push(ack),
            // Nothing is subscribed while offline.
            Command::Unsubscribe { ack, .. } => {
                let _ = ack.send(());
            }
        }
    }

    async fn handle_online(
        &mut self,
        conn: &mut Connection,
        cmd: Command,
    ) -> Result<(), TransportError> {
        match cmd {
            Command::Subscribe { devices, ack } => {
                let wanted: Vec<DeviceId> = {
                    let desired = self.desired.lock();
                    devices
                        .into_iter()
                        .filter(|device| desired.contains(device) && !self.live.contains(device))
                        .collect()
                };
                for device in wanted {
                    if let Err(e) = conn.subscribe(&device).await {
                        self.pending_acks.push(ack);
                        return Err(e);
                    }
                    tracing::debug!(device_id = %device, "Subscribed");
                    self.live.insert(device);
                }
                let _ = ack.send(());
            }
            Command::Unsubscribe { devices, ack } => {
                let unwanted: Vec<DeviceId> = {
                    let desired = self.desired.lock();
                    devices
                        .into_iter()
                        .filter(|device| !desired.contains(device) && self.live.contains(device))
                        .collect()
                };
                for device in unwanted {
                    self.live.remove(&device);
                    if let Err(e) = conn.unsubscribe(&device).await {
                        // The connection is reset anyway, which drops the channel.
                        let _ = ack.send(());
                        return Err(e);
                    }
                    tracing::debug!(device_id = %device, "Unsubscribed");
                }
                let _ = ack.send(());
            }
        }
        Ok(())
    }

    /// Subscribe every desired device on a fresh connection.
    async fn resubscribe(&mut self, conn: &mut Connection) -> Result<(), TransportError> {
        self.live.clear();
        let desired: Vec<DeviceId> = self.desired.lock().iter().cloned().collect();
        for device in desired {
            conn.subscribe(&device).await?;
            self.live.insert(device);
        }
        tracing::debug!(count = self.live.len(), "Subscriptions registered");
        Ok(())
    }

    fn mark_connected(&mut self, attempt: u32) {
        let reconnected = self.ever_connected;
        self.ever_connected = true;
        self.stale_deadline = None;

        self.status.send_modify(|status| {
            status.connected = true;
            status.reconnect_attempts = 0;
            if reconnected {
                status.last_reconnect_at = Some(Utc::now());
            }
        });
        if reconnected {
            self.counters.record_reconnect();
            tracing::info!(attempt, "Reconnected to telemetry stream");
        }

        for ack in self.pending_acks.drain(..) {
            let _ = ack.send(());
        }
    }

    fn mark_disconnected(&mut self) {
        self.live.clear();
        self.status.send_modify(|status| {
            status.connected = false;
            status.last_disconnect_at = Some(Utc::now());
        });
        if let StalePolicy::ClearAfter(after) = self.stale_policy {
            self.stale_deadline = Some(Instant::now() + after);
        }
        tracing::warn!("Disconnected from telemetry stream");
    }

    fn clear_stale(&mut self) {
        self.stale_deadline = None;
        let cleared = self.store.clear_readings();
        tracing::warn!(
            count = cleared.len(),
            "Telemetry outage exceeded limit, cleared live readings",
        );
    }

    async fn teardown(&mut self, mut conn: Connection) {
        let channels: Vec<DeviceId> = self.live.drain().collect();
        let release = async {
            for device in &channels {
                if let Err(e) = conn.unsubscribe(device).await {
                    tracing::debug!(
                        device_id = %device,
                        error = %e,
                        "Unsubscribe during shutdown failed",
                    );
                    break;
                }
            }
        };
        if tokio::time::timeout(TEARDOWN_STEP_TIMEOUT, release).await.is_err() {
            tracing::warn!(count = channels.len(), "Releasing channels timed out during shutdown");
        }
        if tokio::time::timeout(TEARDOWN_STEP_TIMEOUT, conn.close()).await.is_err() {
            tracing::warn!("Closing the telemetry connection timed out");
        }
    }
}

/// Resolves at `deadline`, or never when there is none.
fn wait_until(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
