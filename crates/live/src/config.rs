use std::str::FromStr;
use std::time::Duration;

use weldwatch_core::telemetry::NoiseFloor;
use weldwatch_events::bus::DEFAULT_CAPACITY;

use crate::reconnect::ReconnectConfig;

/// What happens to live readings while the telemetry stream is down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Keep showing the last known reading until the stream recovers.
    #[default]
    RetainLastKnown,
    /// Force every record back to NO_STATUS once an outage has lasted longer
    /// than the given duration.
    ClearAfter(Duration),
}

/// Rejected environment value.
#[derive(Debug, thiserror::Error)]
#[error("{var} has an invalid value {value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Live telemetry configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Telemetry WebSocket endpoint.
    pub transport_url: String,
    /// Upper bound on how long `start`/`stop` wait for the worker.
    pub subscribe_timeout: Duration,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub stale_policy: StalePolicy,
    /// Noise floor applied to devices whose config does not carry one.
    pub default_noise_floor: NoiseFloor,
    pub change_feed_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            transport_url: "ws://127.0.0.1:8080/telemetry".into(),
            subscribe_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            stale_policy: StalePolicy::RetainLastKnown,
            default_noise_floor: NoiseFloor::default(),
            change_feed_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl LiveConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                          |
    /// |----------------------------------|----------------------------------|
    /// | `TELEMETRY_WS_URL`               | `ws://127.0.0.1:8080/telemetry`  |
    /// | `SUBSCRIBE_TIMEOUT_SECS`         | `5`                              |
    /// | `CONNECT_TIMEOUT_SECS`           | `10`                             |
    /// | `RECONNECT_INITIAL_MS`           | `1000`                           |
    /// | `RECONNECT_MAX_MS`               | `30000`                          |
    /// | `RECONNECT_MULTIPLIER`           | `2.0`                            |
    /// | `STALE_CLEAR_AFTER_SECS`         | unset (retain last known)        |
    /// | `WELDWATCH_NOISE_FLOOR_CURRENT`  | `5`                              |
    /// | `WELDWATCH_NOISE_FLOOR_VOLTAGE`  | `5`                              |
    /// | `WELDWATCH_NOISE_FLOOR_GAS`      | `1`                              |
    /// | `CHANGE_FEED_CAPACITY`           | `1024`                           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let floor = defaults.default_noise_floor;

        let transport_url = lookup("TELEMETRY_WS_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.transport_url);
        if !(transport_url.starts_with("ws://") || transport_url.starts_with("wss://")) {
            return Err(ConfigError {
                var: "TELEMETRY_WS_URL",
                value: transport_url,
                reason: "expected a ws:// or wss:// URL".into(),
            });
        }

        let subscribe_timeout =
            Duration::from_secs(parse(&lookup, "SUBSCRIBE_TIMEOUT_SECS", 5u64)?);
        let connect_timeout = Duration::from_secs(parse(&lookup, "CONNECT_TIMEOUT_SECS", 10u64)?);

        let reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(parse(&lookup, "RECONNECT_INITIAL_MS", 1000u64)?),
            max_delay: Duration::from_millis(parse(&lookup, "RECONNECT_MAX_MS", 30_000u64)?),
            multiplier: parse(&lookup, "RECONNECT_MULTIPLIER", 2.0f64)?,
        };
        if !(reconnect.multiplier.is_finite() && reconnect.multiplier >= 1.0) {
            return Err(ConfigError {
                var: "RECONNECT_MULTIPLIER",
                value: reconnect.multiplier.to_string(),
                reason: "must be a finite number >= 1".into(),
            });
        }
        if reconnect.initial_delay.is_zero() || reconnect.initial_delay > reconnect.max_delay {
            return Err(ConfigError {
                var: "RECONNECT_INITIAL_MS",
                value: reconnect.initial_delay.as_millis().to_string(),
                reason: "must be positive and not exceed RECONNECT_MAX_MS".into(),
            });
        }

        let stale_policy = match lookup("STALE_CLEAR_AFTER_SECS").filter(|v| !v.trim().is_empty()) {
            None => StalePolicy::RetainLastKnown,
            Some(_) => StalePolicy::ClearAfter(Duration::from_secs(parse(
                &lookup,
                "STALE_CLEAR_AFTER_SECS",
                0u64,
            )?)),
        };

        let default_noise_floor = NoiseFloor {
            current: parse(&lookup, "WELDWATCH_NOISE_FLOOR_CURRENT", floor.current)?,
            voltage: parse(&lookup, "WELDWATCH_NOISE_FLOOR_VOLTAGE", floor.voltage)?,
            gas_flow: parse(&lookup, "WELDWATCH_NOISE_FLOOR_GAS", floor.gas_flow)?,
        };
        default_noise_floor.validate().map_err(|e| ConfigError {
            var: "WELDWATCH_NOISE_FLOOR_*",
            value: format!("{default_noise_floor:?}"),
            reason: e.to_string(),
        })?;

        let change_feed_capacity = parse(&lookup, "CHANGE_FEED_CAPACITY", DEFAULT_CAPACITY)?;
        if change_feed_capacity == 0 {
            return Err(ConfigError {
                var: "CHANGE_FEED_CAPACITY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            transport_url,
            subscribe_timeout,
            connect_timeout,
            reconnect,
            stale_policy,
            default_noise_floor,
            change_feed_capacity,
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
