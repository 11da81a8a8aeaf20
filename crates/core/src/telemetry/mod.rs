//! Live welding telemetry: threshold classification and group rollups.
//!
//! All logic in this module is pure. The live crate owns the shared state
//! and calls into these functions.

pub mod aggregation;
pub mod classifier;
pub mod record;
pub mod thresholds;
pub mod topology;

pub use aggregation::{GroupSummary, HealthCounts, StatusCounts};
pub use classifier::{classify, ClassifiedReading, DeviceStatus, HealthColor, RawSample};
pub use record::DeviceLiveRecord;
pub use thresholds::{Bound, NoiseFloor, ThresholdConfig};
pub use topology::{HistoricalMetrics, HistoricalMetricsBook, Placement, Topology, UNCATEGORIZED};
