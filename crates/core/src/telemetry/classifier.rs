//! Threshold classifier for raw welding telemetry.
//!
//! Pure logic: no I/O, no clocks, no shared state. The live store calls
//! [`classify`] for every inbound sample against the configuration in
//! effect for that device.

use serde::{Deserialize, Serialize};

use crate::telemetry::thresholds::ThresholdConfig;
use crate::types::{DeviceId, Timestamp};

/// Identity tag reported when the sample carries no operator/RFID tag.
pub const NO_IDENTITY_TAG: &str = "NA";

/// Normalised operating status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Running,
    Stop,
    Error,
    #[default]
    NoStatus,
}

impl DeviceStatus {
    /// Parse the free-text status field sent by the controller.
    ///
    /// Case-insensitive and whitespace-tolerant; anything unrecognised maps
    /// to [`DeviceStatus::NoStatus`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Self::Running,
            "STOP" => Self::Stop,
            "ERROR" => Self::Error,
            _ => Self::NoStatus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stop => "STOP",
            Self::Error => "ERROR",
            Self::NoStatus => "NO_STATUS",
        }
    }
}

/// Colour-coded health signal consumed by the dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthColor {
    Green,
    Yellow,
    Red,
    #[default]
    Grey,
}

/// One decoded telemetry event as received from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub device_id: DeviceId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub gas_flow: Option<f64>,
    #[serde(default)]
    pub identity_tag: Option<String>,
    pub received_at: Timestamp,
}

/// A raw sample after noise filtering and health evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReading {
    pub status: DeviceStatus,
    pub filtered_current: f64,
    pub filtered_voltage: f64,
    pub filtered_gas_flow: f64,
    pub health_color: HealthColor,
    pub identity_tag: String,
}

impl Default for ClassifiedReading {
    fn default() -> Self {
        Self {
            status: DeviceStatus::NoStatus,
            filtered_current: 0.0,
            filtered_voltage: 0.0,
            filtered_gas_flow: 0.0,
            health_color: HealthColor::Grey,
            identity_tag: NO_IDENTITY_TAG.to_string(),
        }
    }
}

/// Classify a raw sample against a device's threshold configuration.
pub fn classify(raw: &RawSample, cfg: &ThresholdConfig) -> ClassifiedReading {
    let floor = cfg.effective_noise_floor();
    let status = DeviceStatus::parse(&raw.status);

    let filtered_current = filter_noise(raw.current, floor.current);
    let filtered_voltage = filter_noise(raw.voltage, floor.voltage);
    let filtered_gas_flow = filter_noise(raw.gas_flow, floor.gas_flow);

    let health_color = match status {
        DeviceStatus::Error => HealthColor::Red,
        DeviceStatus::Stop => HealthColor::Yellow,
        DeviceStatus::NoStatus => HealthColor::Grey,
        DeviceStatus::Running => {
            let within = cfg.current.contains(filtered_current)
                && cfg.voltage.contains(filtered_voltage)
                && cfg.gas_flow.contains(filtered_gas_flow);
            if within {
                HealthColor::Green
            } else {
                HealthColor::Red
            }
        }
    };

    ClassifiedReading {
        status,
        filtered_current,
        filtered_voltage,
        filtered_gas_flow,
        health_color,
        identity_tag: normalize_identity_tag(raw.identity_tag.as_deref()),
    }
}

/// Zero out values at or below the noise floor. Absent and non-finite
/// values read as zero.
fn filter_noise(value: Option<f64>, floor: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > floor => v,
        _ => 0.0,
    }
}

fn normalize_identity_tag(tag: Option<&str>) -> String {
    match tag.map(str::trim) {
        None | Some("") | Some("0") => NO_IDENTITY_TAG.to_string(),
        Some(tag) => tag.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
