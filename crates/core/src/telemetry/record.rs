use serde::{Deserialize, Serialize};

use crate::telemetry::classifier::ClassifiedReading;
use crate::telemetry::thresholds::ThresholdConfig;
use crate::types::{DeviceId, Timestamp};

/// Authoritative live state of one subscribed device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLiveRecord {
    pub device_id: DeviceId,
    pub reading: ClassifiedReading,
    /// When the last sample was applied. `None` until the device first reports.
    pub updated_at: Option<Timestamp>,
    pub config: ThresholdConfig,
}

impl DeviceLiveRecord {
    /// A freshly subscribed device: NO_STATUS, zeroed channels, GREY.
    pub fn new(device_id: DeviceId, config: ThresholdConfig) -> Self {
        Self {
            device_id,
            reading: ClassifiedReading::default(),
            updated_at: None,
            config,
        }
    }
}
