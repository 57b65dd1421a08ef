//! Compensation of a fixed upstream processing delay.

use crate::observer::{DriverEvent, DriverObserver};
use crate::types::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Nanoseconds per millisecond.
const NS_PER_MS: f64 = 1_000_000.0;

/// Holds the latency offset subtracted from every poll anchor.
///
/// Written from any thread through a [`LatencyHandle`], read by the
/// acquisition thread once per iteration.
#[derive(Debug, Default)]
pub struct LatencyCompensator {
    offset_ns: AtomicI64,
}

impl LatencyCompensator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a latency report given in milliseconds, replacing the previous one.
    pub fn set_latency(&self, distance_measurement_ms: f64) {
        let ns = (NS_PER_MS * distance_measurement_ms) as i64;
        self.offset_ns.store(ns, Ordering::Release);
    }

    /// Current offset in nanoseconds.
    pub fn offset(&self) -> i64 {
        self.offset_ns.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.offset_ns.store(0, Ordering::Release);
    }

    /// `now` shifted back by the current offset.
    pub fn anchor(&self, now: Timestamp) -> Timestamp {
        let offset = self.offset();
        if offset >= 0 {
            now.saturating_sub(offset as u64)
        } else {
            now.saturating_add(offset.unsigned_abs())
        }
    }
}

/// Cloneable input for latency reports.
#[derive(Clone)]
pub struct LatencyHandle {
    compensator: Arc<LatencyCompensator>,
    observer: Arc<dyn DriverObserver>,
}

impl LatencyHandle {
    pub(crate) fn new(compensator: Arc<LatencyCompensator>, observer: Arc<dyn DriverObserver>) -> Self {
        Self {
            compensator,
            observer,
        }
    }

    /// Deliver a latency measurement in milliseconds.
    pub fn set_latency(&self, distance_measurement_ms: f64) {
        self.observer.on_event(&DriverEvent::LatencyChanged {
            ms: distance_measurement_ms,
        });
        self.compensator.set_latency(distance_measurement_ms);
    }

    pub fn offset(&self) -> i64 {
        self.compensator.offset()
    }
}
