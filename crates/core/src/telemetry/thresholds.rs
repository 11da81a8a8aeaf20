//! Per-device threshold configuration and its validation.
//!
//! Configurations arrive from the backend whenever a job or machine
//! configuration changes. They are validated before they reach the live
//! store so a malformed push never replaces a working configuration.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default noise floor for welding current (amps).
pub const DEFAULT_CURRENT_NOISE_FLOOR: f64 = 5.0;
/// Default noise floor for arc voltage (volts).
pub const DEFAULT_VOLTAGE_NOISE_FLOOR: f64 = 5.0;
/// Default noise floor for shielding gas flow (l/min).
pub const DEFAULT_GAS_FLOW_NOISE_FLOOR: f64 = 1.0;

/// Inclusive `[low, high]` band for one sensor channel.
///
/// `high == None` means the channel has no upper limit. A high of `+inf`
/// means the same and is folded into `None` by [`Bound::new`] and
/// [`ThresholdConfig::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub high: Option<f64>,
}

impl Bound {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high: Some(high),
        }
        .normalized()
    }

    fn normalized(self) -> Self {
        Self {
            low: self.low,
            high: self.high.filter(|high| *high != f64::INFINITY),
        }
    }

    /// A band that accepts every non-negative value.
    pub fn unbounded() -> Self {
        Self {
            low: 0.0,
            high: None,
        }
    }

    /// Whether `value` lies inside the band (both ends inclusive).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && self.high.map_or(true, |high| value <= high)
    }

    fn validate(&self, channel: &str) -> Result<(), CoreError> {
        if !self.low.is_finite() {
            return Err(CoreError::Validation(format!(
                "{channel}.low must be a finite number, got {}",
                self.low
            )));
        }
        if let Some(high) = self.high.filter(|high| *high != f64::INFINITY) {
            if !high.is_finite() {
                return Err(CoreError::Validation(format!(
                    "{channel}.high must be a number, +inf or omitted, got {high}"
                )));
            }
            if self.low > high {
                return Err(CoreError::Validation(format!(
                    "{channel}.low ({}) must not exceed {channel}.high ({high})",
                    self.low
                )));
            }
        }
        Ok(())
    }
}

impl Default for Bound {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Values at or below these floors are treated as sensor noise and zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseFloor {
    pub current: f64,
    pub voltage: f64,
    pub gas_flow: f64,
}

impl NoiseFloor {
    pub fn validate(&self) -> Result<(), CoreError> {
        for (channel, floor) in [
            ("noise_floor.current", self.current),
            ("noise_floor.voltage", self.voltage),
            ("noise_floor.gas_flow", self.gas_flow),
        ] {
            if !floor.is_finite() || floor < 0.0 {
                return Err(CoreError::Validation(format!(
                    "{channel} must be a non-negative number, got {floor}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for NoiseFloor {
    fn default() -> Self {
        Self {
            current: DEFAULT_CURRENT_NOISE_FLOOR,
            voltage: DEFAULT_VOLTAGE_NOISE_FLOOR,
            gas_flow: DEFAULT_GAS_FLOW_NOISE_FLOOR,
        }
    }
}

/// Threshold configuration for one device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub current: Bound,
    #[serde(default)]
    pub voltage: Bound,
    #[serde(default, alias = "gasFlow")]
    pub gas_flow: Bound,
    /// Informational only; never threshold-checked.
    #[serde(default, alias = "wireThicknessNominal")]
    pub wire_thickness_nominal: Option<f64>,
    /// Device-specific noise floors. The live store fills in the process
    /// default when a pushed configuration leaves this out.
    #[serde(default, alias = "noiseFloor")]
    pub noise_floor: Option<NoiseFloor>,
}

impl ThresholdConfig {
    /// Configuration used for devices the topology feed knows nothing about.
    ///
    /// No channel excursion can turn such a device RED.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_current(mut self, low: f64, high: f64) -> Self {
        self.current = Bound::new(low, high);
        self
    }

    pub fn with_voltage(mut self, low: f64, high: f64) -> Self {
        self.voltage = Bound::new(low, high);
        self
    }

    pub fn with_gas_flow(mut self, low: f64, high: f64) -> Self {
        self.gas_flow = Bound::new(low, high);
        self
    }

    pub fn with_noise_floor(mut self, floor: NoiseFloor) -> Self {
        self.noise_floor = Some(floor);
        self
    }

    /// Noise floor the classifier applies for this device.
    pub fn effective_noise_floor(&self) -> NoiseFloor {
        self.noise_floor.unwrap_or_default()
    }

    /// Fold `+inf` upper bounds into "no upper limit".
    pub fn normalized(self) -> Self {
        Self {
            current: self.current.normalized(),
            voltage: self.voltage.normalized(),
            gas_flow: self.gas_flow.normalized(),
            ..self
        }
    }

    /// Reject configurations the classifier cannot evaluate meaningfully.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.current.validate("current")?;
        self.voltage.validate("voltage")?;
        self.gas_flow.validate("gas_flow")?;
        if let Some(floor) = &self.noise_floor {
            floor.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn bound_is_inclusive_on_both_ends() {
        let bound = Bound::new(50.0, 150.0);
        assert!(bound.contains(50.0));
        assert!(bound.contains(150.0));
        assert!(!bound.contains(49.99));
        assert!(!bound.contains(150.01));
    }

    #[test]
    fn missing_high_means_no_upper_limit() {
        let bound = Bound {
            low: 10.0,
            high: None,
        };
        assert!(bound.contains(1.0e9));
        assert!(!bound.contains(9.0));
    }

    #[test]
    fn unbounded_config_validates() {
        assert!(ThresholdConfig::unbounded().validate().is_ok());
    }

    #[test]
    fn rejects_low_above_high() {
        let cfg = ThresholdConfig::unbounded().with_voltage(30.0, 20.0);
        assert_matches!(cfg.validate(), Err(CoreError::Validation(msg)) if msg.contains("voltage"));
    }

    #[test]
    fn rejects_nan_and_negative_infinity() {
        let cfg = ThresholdConfig::unbounded().with_current(f64::NAN, 100.0);
        assert!(cfg.validate().is_err());

        let cfg = ThresholdConfig::unbounded().with_voltage(0.0, f64::NAN);
        assert!(cfg.validate().is_err());

        let cfg = ThresholdConfig::unbounded().with_gas_flow(0.0, f64::NEG_INFINITY);
        assert!(cfg.validate().is_err());

        let cfg = ThresholdConfig::unbounded().with_gas_flow(f64::INFINITY, 10.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn infinite_high_means_no_upper_limit() {
        let cfg = ThresholdConfig::unbounded().with_current(50.0, f64::INFINITY);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.current.high, None);
        assert!(cfg.current.contains(1.0e12));

        let raw = ThresholdConfig {
            gas_flow: Bound {
                low: 2.0,
                high: Some(f64::INFINITY),
            },
            ..ThresholdConfig::unbounded()
        };
        assert!(raw.validate().is_ok());
        let expected = Bound {
            low: 2.0,
            high: None,
        };
        assert_eq!(raw.normalized().gas_flow, expected);
    }

    #[test]
    fn rejects_negative_noise_floor() {
        let cfg = ThresholdConfig::unbounded().with_noise_floor(NoiseFloor {
            current: -1.0,
            ..NoiseFloor::default()
        });
        assert_matches!(cfg.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn effective_floor_defaults_when_unset() {
        let floor = ThresholdConfig::unbounded().effective_noise_floor();
        assert_eq!(floor.current, 5.0);
        assert_eq!(floor.voltage, 5.0);
        assert_eq!(floor.gas_flow, 1.0);
    }

    #[test]
    fn deserializes_backend_shape() {
        let cfg: ThresholdConfig = serde_json::from_value(serde_json::json!({
            "current": {"low": 50, "high": 150},
            "voltage": {"low": 18, "high": null},
            "gasFlow": {"low": 8, "high": 20},
            "wireThicknessNominal": 1.2
        }))
        .expect("backend config should deserialize");

        assert_eq!(cfg.current, Bound::new(50.0, 150.0));
        assert_eq!(cfg.voltage.high, None);
        assert_eq!(cfg.gas_flow, Bound::new(8.0, 20.0));
        assert_eq!(cfg.wire_thickness_nominal, Some(1.2));
        assert!(cfg.noise_floor.is_none());
    }
}
