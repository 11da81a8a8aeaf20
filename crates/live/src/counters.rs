use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for the live pipeline.
///
/// Incremented from the worker and the store without locking; read through
/// [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct LiveCounters {
    samples_applied: AtomicU64,
    unknown_device_drops: AtomicU64,
    malformed_frames: AtomicU64,
    transport_errors: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of [`LiveCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub samples_applied: u64,
    pub unknown_device_drops: u64,
    pub malformed_frames: u64,
    pub transport_errors: u64,
    pub reconnects: u64,
}

impl LiveCounters {
    pub fn record_sample_applied(&self) {
        self.samples_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_device(&self) {
        self.unknown_device_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            samples_applied: self.samples_applied.load(Ordering::Relaxed),
            unknown_device_drops: self.unknown_device_drops.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
