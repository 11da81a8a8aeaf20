//! Authoritative in-memory live state, one record per subscribed device.
//!
//! The outer map is only write-locked to insert or remove a device; sample
//! application takes the per-device lock, so devices never contend with each
//! other. Every mutation that changes a record is announced on the
//! [`ChangeFeed`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use weldwatch_core::error::CoreError;
use weldwatch_core::telemetry::{
    classify, ClassifiedReading, DeviceLiveRecord, NoiseFloor, RawSample, ThresholdConfig,
};
use weldwatch_core::types::DeviceId;
use weldwatch_events::{ChangeFeed, ChangeKind, DeviceChange};

use crate::counters::LiveCounters;

/// Result of [`LiveStore::apply_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// No record exists for the sample's device; the sample was dropped.
    UnknownDevice,
}

/// Result of [`LiveStore::upsert`], [`LiveStore::update_config`] and
/// [`LiveStore::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

struct Slot {
    record: DeviceLiveRecord,
    /// Last applied raw sample, kept so a config change can re-derive health.
    last_sample: Option<RawSample>,
}

impl Slot {
    fn new(device_id: DeviceId, config: ThresholdConfig) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            record: DeviceLiveRecord::new(device_id, config),
            last_sample: None,
        }))
    }

    /// Swap in `config` and re-derive the reading. Returns `false` when the
    /// config is unchanged.
    fn replace_config(&mut self, config: ThresholdConfig) -> bool {
        if self.record.config == config {
            return false;
        }
        if let Some(raw) = &self.last_sample {
            self.record.reading = classify(raw, &config);
        }
        self.record.config = config;
        true
    }
}

/// Per-device live records.
///
/// Change notifications are published while the map lock is still held, so
/// a device's `Removed` change is always the last one published for it.
pub struct LiveStore {
    records: RwLock<HashMap<DeviceId, Arc<Mutex<Slot>>>>,
    default_noise_floor: NoiseFloor,
    feed: Arc<ChangeFeed>,
    counters: Arc<LiveCounters>,
}

impl LiveStore {
    pub fn new(
        default_noise_floor: NoiseFloor,
        feed: Arc<ChangeFeed>,
        counters: Arc<LiveCounters>,
    ) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            default_noise_floor,
            feed,
            counters,
        }
    }

    /// Create the record if absent, otherwise replace its configuration.
    ///
    /// The current reading is kept and its health colour re-derived from the
    /// last raw sample under the new bands. An invalid configuration is
    /// rejected and the previous one stays in effect.
    pub fn upsert(
        &self,
        device_id: DeviceId,
        config: ThresholdConfig,
    ) -> Result<UpsertOutcome, CoreError> {
        let config = self.normalize(config)?;

        let mut records = self.records.write();
        let outcome = match records.entry(device_id.clone()) {
            Entry::Occupied(entry) => {
                if !entry.get().lock().replace_config(config) {
                    return Ok(UpsertOutcome::Unchanged);
                }
                tracing::debug!(device_id = %device_id, "Threshold config replaced");
                UpsertOutcome::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot::new(device_id.clone(), config));
                tracing::debug!(device_id = %device_id, "Live record created");
                UpsertOutcome::Created
            }
        };
        self.feed.publish(DeviceChange::new(device_id, ChangeKind::Config));
        Ok(outcome)
    }

    /// Replace the configuration of a tracked device. Never creates a
    /// record: `Ok(None)` when the device is not tracked.
    pub fn update_config(
        &self,
        device_id: &DeviceId,
        config: ThresholdConfig,
    ) -> Result<Option<UpsertOutcome>, CoreError> {
        let config = self.normalize(config)?;

        let records = self.records.read();
        let Some(slot) = records.get(device_id) else {
            return Ok(None);
        };
        if !slot.lock().replace_config(config) {
            return Ok(Some(UpsertOutcome::Unchanged));
        }
        tracing::debug!(device_id = %device_id, "Threshold config replaced");
        self.feed.publish(DeviceChange::new(device_id.clone(), ChangeKind::Config));
        Ok(Some(UpsertOutcome::Updated))
    }

    /// Create the record with `fallback` only when the device is not tracked
    /// yet. An existing configuration is never overwritten.
    pub fn ensure(
        &self,
        device_id: DeviceId,
        fallback: ThresholdConfig,
    ) -> Result<UpsertOutcome, CoreError> {
        if self.contains(&device_id) {
            return Ok(UpsertOutcome::Unchanged);
        }
        let config = self.normalize(fallback)?;

        let mut records = self.records.write();
        let Entry::Vacant(entry) = records.entry(device_id.clone()) else {
            return Ok(UpsertOutcome::Unchanged);
        };
        entry.insert(Slot::new(device_id.clone(), config));
        tracing::debug!(device_id = %device_id, "Live record created");
        self.feed.publish(DeviceChange::new(device_id, ChangeKind::Config));
        Ok(UpsertOutcome::Created)
    }

    /// Classify `raw` against the device's current configuration and replace
    /// its reading. Samples for untracked devices are counted and dropped.
    pub fn apply_sample(&self, raw: RawSample) -> ApplyOutcome {
        let records = self.records.read();
        let Some(slot) = records.get(&raw.device_id) else {
            drop(records);
            self.counters.record_unknown_device();
            tracing::debug!(device_id = %raw.device_id, "Dropping sample for untracked device");
            return ApplyOutcome::UnknownDevice;
        };

        let device_id = raw.device_id.clone();
        {
            let mut guard = slot.lock();
            let slot = &mut *guard;
            slot.record.reading = classify(&raw, &slot.record.config);
            slot.record.updated_at = Some(raw.received_at);
            slot.last_sample = Some(raw);
        }

        self.counters.record_sample_applied();
        self.feed.publish(DeviceChange::new(device_id, ChangeKind::Sample));
        ApplyOutcome::Applied
    }

    /// Delete the record. Later samples for the device are dropped.
    pub fn remove(&self, device_id: &DeviceId) -> bool {
        let mut records = self.records.write();
        if records.remove(device_id).is_none() {
            return false;
        }
        tracing::debug!(device_id = %device_id, "Live record removed");
        self.feed.publish(DeviceChange::new(device_id.clone(), ChangeKind::Removed));
        true
    }

    /// Force every record back to NO_STATUS/GREY and forget the last raw
    /// samples. Returns the devices whose reading actually changed.
    pub fn clear_readings(&self) -> Vec<DeviceId> {
        let records = self.records.read();
        let blank = ClassifiedReading::default();

        let mut cleared = Vec::new();
        for slot in records.values() {
            let mut slot = slot.lock();
            slot.last_sample = None;
            if slot.record.reading != blank {
                slot.record.reading = blank.clone();
                cleared.push(slot.record.device_id.clone());
            }
        }

        for device_id in &cleared {
            self.feed.publish(DeviceChange::new(device_id.clone(), ChangeKind::Cleared));
        }
        cleared
    }

    pub fn snapshot(&self, device_id: &DeviceId) -> Option<DeviceLiveRecord> {
        let slot = self.records.read().get(device_id).cloned()?;
        let record = slot.lock().record.clone();
        Some(record)
    }

    /// Copy of every record. Each record is internally consistent; the set
    /// as a whole is not a single atomic cut.
    pub fn snapshot_all(&self) -> HashMap<DeviceId, DeviceLiveRecord> {
        let slots: Vec<(DeviceId, Arc<Mutex<Slot>>)> = self
            .records
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        slots
            .into_iter()
            .map(|(id, slot)| {
                let record = slot.lock().record.clone();
                (id, record)
            })
            .collect()
    }

    pub fn contains(&self, device_id: &DeviceId) -> bool {
        self.records.read().contains_key(device_id)
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Samples dropped because their device had no record.
    pub fn dropped_unknown(&self) -> u64 {
        self.counters.snapshot().unknown_device_drops
    }

    fn normalize(&self, config: ThresholdConfig) -> Result<ThresholdConfig, CoreError> {
        let mut config = config.normalized();
        config.noise_floor.get_or_insert(self.default_noise_floor);
        config.validate()?;
        Ok(config)
    }
}
