use crate::types::ButtonCode;
use crate::{FaroArmError, Result};
use std::time::Duration;

/// Driver settings fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Assumed sample rate of the arm in Hz. Seeds timestamp synchronization;
    /// polling itself is never throttled.
    pub frequency: f64,
    /// Duration of one device-native clock tick.
    pub native_tick: Duration,
    /// Code carried by front and back button events.
    pub button_code: ButtonCode,
    /// Capacity of output channels created by the C API.
    pub channel_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            frequency: 50.0,
            native_tick: Duration::from_millis(1),
            button_code: ButtonCode::SPACE,
            channel_capacity: 256,
        }
    }
}

impl DriverConfig {
    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_native_tick(mut self, native_tick: Duration) -> Self {
        self.native_tick = native_tick;
        self
    }

    /// Defaults overlaid with `FAROARM_*` environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let tick_us = defaults.native_tick.as_micros() as u64;
        Self {
            frequency: read_env("FAROARM_FREQUENCY", defaults.frequency),
            native_tick: Duration::from_micros(read_env("FAROARM_NATIVE_TICK_US", tick_us)),
            button_code: ButtonCode(read_env("FAROARM_BUTTON_CODE", defaults.button_code.0)),
            channel_capacity: read_env("FAROARM_CHANNEL_CAPACITY", defaults.channel_capacity),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(FaroArmError::InvalidConfig(format!(
                "frequency must be a positive number of Hz, got {}",
                self.frequency
            )));
        }
        if self.native_tick.is_zero() {
            return Err(FaroArmError::InvalidConfig(
                "native tick duration must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Expected time between two samples. Falls back to the default rate
    /// when `frequency` is not a positive number.
    pub fn sample_period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frequency)
            .ok()
            .filter(|p| !p.is_zero())
            .unwrap_or_else(|| Self::default().sample_period())
    }
}

fn read_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
