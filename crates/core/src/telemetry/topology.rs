//! Static plant topology and backend-computed historical metrics.
//!
//! Both are pushed by the backend and replaced wholesale; the core never
//! edits them in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::telemetry::thresholds::ThresholdConfig;
use crate::types::{DeviceId, Timestamp};

/// Group name for devices with no (or an empty) station / machine type.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Where a device sits in the plant and how it should be judged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default, alias = "machineType")]
    pub machine_type: Option<String>,
    #[serde(default)]
    pub thresholds: Option<ThresholdConfig>,
}

/// Device → placement mapping supplied by the backend.
///
/// A device absent from the mapping is still trackable; it reports under
/// [`UNCATEGORIZED`] with unbounded thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    placements: HashMap<DeviceId, Placement>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly used by tests and fixtures.
    pub fn with_device(mut self, device_id: impl Into<DeviceId>, placement: Placement) -> Self {
        self.placements.insert(device_id.into(), placement);
        self
    }

    pub fn insert(&mut self, device_id: DeviceId, placement: Placement) {
        self.placements.insert(device_id, placement);
    }

    pub fn placement(&self, device_id: &DeviceId) -> Option<&Placement> {
        self.placements.get(device_id)
    }

    pub fn thresholds_for(&self, device_id: &DeviceId) -> Option<&ThresholdConfig> {
        self.placement(device_id)
            .and_then(|placement| placement.thresholds.as_ref())
    }

    /// Station the device belongs to, or [`UNCATEGORIZED`].
    pub fn station_of(&self, device_id: &DeviceId) -> &str {
        group_name(
            self.placement(device_id)
                .and_then(|placement| placement.station.as_deref()),
        )
    }

    /// Machine type of the device, or [`UNCATEGORIZED`].
    pub fn machine_type_of(&self, device_id: &DeviceId) -> &str {
        group_name(
            self.placement(device_id)
                .and_then(|placement| placement.machine_type.as_deref()),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &Placement)> {
        self.placements.iter()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

fn group_name(name: Option<&str>) -> &str {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => UNCATEGORIZED,
    }
}

/// Pre-computed historical aggregates for one station or machine type.
///
/// The core merges these into summaries verbatim; it never derives them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalMetrics {
    pub availability: f64,
    pub productivity: f64,
    pub oee: f64,
    #[serde(alias = "totalJobs")]
    pub total_jobs: u64,
    /// Accumulated arc-on time in seconds.
    #[serde(alias = "arcTime")]
    pub arc_time: f64,
    #[serde(alias = "wireConsumed")]
    pub wire_consumed: f64,
    #[serde(alias = "gasConsumed")]
    pub gas_consumed: f64,
    #[serde(alias = "lastRun")]
    pub last_run: Option<Timestamp>,
}

/// Historical metrics keyed separately by station and by machine type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalMetricsBook {
    pub stations: HashMap<String, HistoricalMetrics>,
    #[serde(alias = "machineTypes")]
    pub machine_types: HashMap<String, HistoricalMetrics>,
}
