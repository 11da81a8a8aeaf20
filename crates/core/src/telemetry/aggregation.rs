//! Station and machine-type rollups over live device records.
//!
//! Pure and pull-based: every call groups the snapshot it is handed and
//! returns owned summaries. The caller decides when to recompute.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::telemetry::classifier::{DeviceStatus, HealthColor};
use crate::telemetry::record::DeviceLiveRecord;
use crate::telemetry::topology::{HistoricalMetrics, HistoricalMetricsBook, Topology, UNCATEGORIZED};
use crate::types::DeviceId;

/// Device counts per health colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
    pub grey: usize,
}

impl HealthCounts {
    fn record(&mut self, color: HealthColor) {
        match color {
            HealthColor::Green => self.green += 1,
            HealthColor::Yellow => self.yellow += 1,
            HealthColor::Red => self.red += 1,
            HealthColor::Grey => self.grey += 1,
        }
    }
}

/// Device counts per operating status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub running: usize,
    pub stop: usize,
    pub error: usize,
    pub no_status: usize,
}

impl StatusCounts {
    fn record(&mut self, status: DeviceStatus) {
        match status {
            DeviceStatus::Running => self.running += 1,
            DeviceStatus::Stop => self.stop += 1,
            DeviceStatus::Error => self.error += 1,
            DeviceStatus::NoStatus => self.no_status += 1,
        }
    }
}

/// Rollup of every live device sharing a station or machine type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub device_count: usize,
    /// Member records ordered by device id.
    pub devices: Vec<DeviceLiveRecord>,
    pub health_counts: HealthCounts,
    pub status_counts: StatusCounts,
    /// Backend-supplied aggregates for this group, merged as-is.
    pub historical: Option<HistoricalMetrics>,
}

/// Which topology dimension to group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Station,
    MachineType,
}

impl GroupBy {
    fn group_of<'a>(&self, topology: &'a Topology, device_id: &DeviceId) -> &'a str {
        match self {
            Self::Station => topology.station_of(device_id),
            Self::MachineType => topology.machine_type_of(device_id),
        }
    }

    fn historical<'a>(
        &self,
        book: &'a HistoricalMetricsBook,
    ) -> &'a HashMap<String, HistoricalMetrics> {
        match self {
            Self::Station => &book.stations,
            Self::MachineType => &book.machine_types,
        }
    }
}

/// Listing order: lexicographic by group name, [`UNCATEGORIZED`] last.
pub fn compare_groups(a: &str, b: &str) -> Ordering {
    match (a == UNCATEGORIZED, b == UNCATEGORIZED) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// Summary of a single station. `None` when the station has neither live
/// devices nor historical metrics.
pub fn station_summary(
    station: &str,
    records: &HashMap<DeviceId, DeviceLiveRecord>,
    topology: &Topology,
    history: &HistoricalMetricsBook,
) -> Option<GroupSummary> {
    summarize_group(GroupBy::Station, station, records, topology, history)
}

/// Summary of a single machine type. `None` when the type has neither live
/// devices nor historical metrics.
pub fn machine_type_summary(
    machine_type: &str,
    records: &HashMap<DeviceId, DeviceLiveRecord>,
    topology: &Topology,
    history: &HistoricalMetricsBook,
) -> Option<GroupSummary> {
    summarize_group(GroupBy::MachineType, machine_type, records, topology, history)
}

/// Every station with live devices or historical metrics, in listing order.
pub fn station_summaries(
    records: &HashMap<DeviceId, DeviceLiveRecord>,
    topology: &Topology,
    history: &HistoricalMetricsBook,
) -> Vec<GroupSummary> {
    summarize_all(GroupBy::Station, records, topology, history)
}

/// Every machine type with live devices or historical metrics, in listing order.
pub fn machine_type_summaries(
    records: &HashMap<DeviceId, DeviceLiveRecord>,
    topology: &Topology,
    history: &HistoricalMetricsBook,
) -> Vec<GroupSummary> {
    summarize_all(GroupBy::MachineType, records, topology, history)
}

fn summarize_group(
    by: GroupBy,
    group: &str,
    records: &HashMap<DeviceId, DeviceLiveRecord>,
    topology: &Topology,
    history: &HistoricalMetricsBook,
) -> Option<GroupSummary> {
    let members: Vec<&DeviceLiveRecord> = records
        .values()
        .filter(|record| by.group_of(topology, &record.device_id) == group)
        .collect();
    let historical = by.historical(history).get(group).cloned();

    if members.is_empty() && historical.is_none() {
        return None;
    }
    Some(build_summary(group, members, historical))
}

fn summarize_all(
    by: GroupBy,
    records: &HashMap<DeviceId, DeviceLiveRecord>,
    topology: &Topology,
    history: &HistoricalMetricsBook,
) -> Vec<GroupSummary> {
    let mut groups: HashMap<&str, Vec<&DeviceLiveRecord>> = HashMap::new();
    for record in records.values() {
        groups
            .entry(by.group_of(topology, &record.device_id))
            .or_default()
            .push(record);
    }
    let historical = by.historical(history);
    for name in historical.keys() {
        groups.entry(name.as_str()).or_default();
    }

    let mut summaries: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(name, members)| build_summary(name, members, historical.get(name).cloned()))
        .collect();
    summaries.sort_by(|a, b| compare_groups(&a.group, &b.group));
    summaries
}

fn build_summary(
    group: &str,
    members: Vec<&DeviceLiveRecord>,
    historical: Option<HistoricalMetrics>,
) -> GroupSummary {
    let mut health_counts = HealthCounts::default();
    let mut status_counts = StatusCounts::default();
    let ordered: BTreeMap<&DeviceId, &DeviceLiveRecord> = members
        .into_iter()
        .map(|record| (&record.device_id, record))
        .collect();

    let devices: Vec<DeviceLiveRecord> = ordered
        .into_values()
        .map(|record| {
            health_counts.record(record.reading.health_color);
            status_counts.record(record.reading.status);
            record.clone()
        })
        .collect();

    GroupSummary {
        group: group.to_string(),
        device_count: devices.len(),
        devices,
        health_counts,
        status_counts,
        historical,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
