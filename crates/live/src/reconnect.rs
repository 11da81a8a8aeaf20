//! Exponential-backoff parameters for the telemetry stream.
//!
//! The subscription worker retries the transport forever while it is
//! running; these values only shape how long it waits between attempts.

use std::time::Duration;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the second connection attempt. The first retry after a
    /// drop happens immediately.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(next_delay(Duration::from_secs(1), &config), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(8), &config), Duration::from_secs(10));
        assert_eq!(next_delay(Duration::from_secs(10), &config), Duration::from_secs(10));
    }

    #[test]
    fn sub_second_delays_grow() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 1.5,
        };
        let mut delay = config.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(delay.as_millis());
            delay = next_delay(delay, &config);
        }
        assert_eq!(seen, vec![10, 15, 22, 33, 49, 50]);
    }

    #[test]
    fn full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }
}
