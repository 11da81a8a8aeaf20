//! Single entry point for UI-facing reads and subscription control.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use weldwatch_core::telemetry::aggregation::{
    machine_type_summaries, machine_type_summary, station_summaries, station_summary,
};
use weldwatch_core::telemetry::{
    DeviceLiveRecord, GroupSummary, HistoricalMetricsBook, ThresholdConfig, Topology,
};
use weldwatch_core::types::DeviceId;
use weldwatch_events::{ChangeFeed, DeviceChange};

use crate::config::LiveConfig;
use crate::counters::{CounterSnapshot, LiveCounters};
use crate::error::LiveError;
use crate::manager::{ConnectionStatus, Retention, SubscriptionManager};
use crate::store::{LiveStore, UpsertOutcome};
use crate::transport::Transport;

/// Live telemetry for the dashboards.
///
/// Created once at startup via [`LiveTelemetry::start`]; the returned `Arc`
/// is cheap to clone into request handlers. All reads return owned copies.
pub struct LiveTelemetry {
    store: Arc<LiveStore>,
    manager: SubscriptionManager,
    feed: Arc<ChangeFeed>,
    counters: Arc<LiveCounters>,
    topology: RwLock<Arc<Topology>>,
    history: RwLock<Arc<HistoricalMetricsBook>>,
}

impl LiveTelemetry {
    /// Spawn the connection worker and return a shared handle.
    pub fn start(transport: Arc<dyn Transport>, config: LiveConfig) -> Arc<Self> {
        let feed = Arc::new(ChangeFeed::new(config.change_feed_capacity));
        let counters = Arc::new(LiveCounters::default());
        let store = Arc::new(LiveStore::new(
            config.default_noise_floor,
            Arc::clone(&feed),
            Arc::clone(&counters),
        ));
        let manager = SubscriptionManager::spawn(
            transport,
            Arc::clone(&store),
            Arc::clone(&counters),
            &config,
        );

        Arc::new(Self {
            store,
            manager,
            feed,
            counters,
            topology: RwLock::new(Arc::new(Topology::new())),
            history: RwLock::new(Arc::new(HistoricalMetricsBook::default())),
        })
    }

    // ---- subscription control ----

    /// Start streaming `devices`.
    ///
    /// Thresholds come from `configs` first, then from the current topology.
    /// A device with neither keeps its existing config, or is tracked with
    /// unbounded thresholds.
    pub async fn subscribe(
        &self,
        devices: &[DeviceId],
        configs: HashMap<DeviceId, ThresholdConfig>,
    ) -> Result<(), LiveError> {
        let topology = self.topology();
        let mut merged = configs;
        for device in devices {
            if merged.contains_key(device) {
                continue;
            }
            if let Some(config) = topology.thresholds_for(device) {
                merged.insert(device.clone(), config.clone());
            }
        }
        self.manager.start(devices, &merged).await
    }

    /// Stop streaming `devices` and drop their records.
    pub async fn unsubscribe(&self, devices: &[DeviceId]) -> Result<(), LiveError> {
        self.manager.stop(devices, Retention::Remove).await
    }

    /// Stop streaming `devices` but keep their last reading readable.
    pub async fn pause(&self, devices: &[DeviceId]) -> Result<(), LiveError> {
        self.manager.stop(devices, Retention::KeepSnapshot).await
    }

    /// Replace the thresholds of a tracked device. An untracked device is
    /// never created here.
    pub fn upsert_thresholds(
        &self,
        device_id: &DeviceId,
        config: ThresholdConfig,
    ) -> Result<DeviceLiveRecord, LiveError> {
        self.store
            .update_config(device_id, config)?
            .and_then(|_| self.store.snapshot(device_id))
            .ok_or_else(|| LiveError::UnknownDevice(device_id.clone()))
    }

    /// Unsubscribe everything and stop the worker.
    pub async fn shutdown(&self) {
        self.manager.stop_all().await;
    }

    // ---- reads ----

    pub fn device_snapshot(&self, device_id: &DeviceId) -> Option<DeviceLiveRecord> {
        self.store.snapshot(device_id)
    }

    pub fn snapshot_all(&self) -> HashMap<DeviceId, DeviceLiveRecord> {
        self.store.snapshot_all()
    }

    /// Every tracked record, ordered by device id.
    pub fn devices(&self) -> Vec<DeviceLiveRecord> {
        let mut records: Vec<DeviceLiveRecord> =
            self.store.snapshot_all().into_values().collect();
        records.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        records
    }

    pub fn station_summary(&self, station: &str) -> Option<GroupSummary> {
        station_summary(station, &self.store.snapshot_all(), &self.topology(), &self.history())
    }

    pub fn machine_type_summary(&self, machine_type: &str) -> Option<GroupSummary> {
        machine_type_summary(
            machine_type,
            &self.store.snapshot_all(),
            &self.topology(),
            &self.history(),
        )
    }

    pub fn station_summaries(&self) -> Vec<GroupSummary> {
        station_summaries(&self.store.snapshot_all(), &self.topology(), &self.history())
    }

    pub fn machine_type_summaries(&self) -> Vec<GroupSummary> {
        machine_type_summaries(&self.store.snapshot_all(), &self.topology(), &self.history())
    }

    /// Register a consumer of per-device change notifications.
    pub fn change_feed(&self) -> broadcast::Receiver<DeviceChange> {
        self.feed.subscribe()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.manager.connection_status()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.watch_connection()
    }

    pub fn active_devices(&self) -> Vec<DeviceId> {
        self.manager.active_devices()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    // ---- backend feeds ----

    /// Swap in a new topology.
    ///
    /// Thresholds carried by the topology are pushed into tracked records;
    /// invalid ones are logged and skipped. Returns how many records took a
    /// new config.
    pub fn replace_topology(&self, topology: Topology) -> usize {
        let topology = Arc::new(topology);
        *self.topology.write() = Arc::clone(&topology);

        let mut updated = 0;
        for device_id in self.store.device_ids() {
            let Some(config) = topology.thresholds_for(&device_id) else {
                continue;
            };
            match self.store.update_config(&device_id, config.clone()) {
                Ok(Some(UpsertOutcome::Updated)) => updated += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        device_id = %device_id,
                        error = %e,
                        "Skipping invalid topology thresholds",
                    );
                }
            }
        }

        tracing::info!(devices = topology.len(), updated, "Topology replaced");
        updated
    }

    pub fn replace_historical_metrics(&self, book: HistoricalMetricsBook) {
        tracing::info!(
            stations = book.stations.len(),
            machine_types = book.machine_types.len(),
            "Historical metrics replaced",
        );
        *self.history.write() = Arc::new(book);
    }

    pub fn topology(&self) -> Arc<Topology> {
        Arc::clone(&self.topology.read())
    }

    fn history(&self) -> Arc<HistoricalMetricsBook> {
        Arc::clone(&self.history.read())
    }
}
