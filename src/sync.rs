//! Mapping of the arm's sample clock onto the host clock.
//!
//! Each sample pairs a native tick with a host anchor taken just before the
//! poll. The anchor is late by an unknown, varying delay, so the smallest
//! observed `anchor - native` difference is the best offset estimate. The
//! offset follows lower observations immediately and is allowed to creep
//! upward by a small step per sample so clock drift is tracked without
//! letting single delayed anchors pull timestamps forward. A rise of several
//! periods is a host clock step and is adopted at once.

use crate::config::DriverConfig;
use crate::types::{NativeTick, Timestamp};

/// Upward offset correction per sample, as a fraction of the sample period.
const DRIFT_STEP_DIVISOR: i128 = 1000;

/// Offset rise, in sample periods, treated as a host clock step.
const STEP_RESEED_PERIODS: i128 = 4;

#[derive(Debug, Clone, Copy)]
struct SyncState {
    offset_ns: i128,
    last_native: NativeTick,
    last_output: Timestamp,
}

/// Converts native ticks to host timestamps. One instance per acquisition run.
#[derive(Debug, Clone)]
pub struct TimestampSynchronizer {
    tick_ns: i128,
    period_ns: i128,
    state: Option<SyncState>,
}

impl TimestampSynchronizer {
    pub fn new(frequency: f64, tick_ns: u64) -> Self {
        let period_ns = (1e9 / frequency).round() as i128;
        Self {
            tick_ns: tick_ns.max(1) as i128,
            period_ns: period_ns.max(1),
            state: None,
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        let tick_ns = u64::try_from(config.native_tick.as_nanos()).unwrap_or(u64::MAX);
        Self::new(config.frequency, tick_ns)
    }

    /// Assumed sample period in nanoseconds.
    pub fn period_ns(&self) -> u64 {
        self.period_ns as u64
    }

    /// Map `native` onto the host clock using `local_anchor` as this sample's
    /// host observation. Output never decreases between calls.
    pub fn convert_native_to_local(&mut self, native: NativeTick, local_anchor: Timestamp) -> Timestamp {
        let native_ns = native as i128 * self.tick_ns;
        let observed = local_anchor as i128 - native_ns;

        let (offset_ns, floor) = match self.state {
            None => (observed, 0),
            Some(s) if native < s.last_native => {
                // Device clock restarted or wrapped; reseed.
                (observed, s.last_output)
            }
            Some(s) if observed < s.offset_ns => (observed, s.last_output),
            Some(s) if observed - s.offset_ns > self.period_ns * STEP_RESEED_PERIODS => {
                (observed, s.last_output)
            }
            Some(s) => {
                let step = (observed - s.offset_ns).min(self.period_ns / DRIFT_STEP_DIVISOR);
                (s.offset_ns + step, s.last_output)
            }
        };

        let mapped = (native_ns + offset_ns).clamp(0, u64::MAX as i128) as Timestamp;
        let output = mapped.max(floor);

        self.state = Some(SyncState {
            offset_ns,
            last_native: native,
            last_output: output,
        });
        output
    }
}

/// Source of host timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock, nanoseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}
