//! Diagnostics reported by the driver components.
//!
//! Components receive an observer at construction instead of logging
//! through a global. [`LogObserver`] forwards to the `log` facade.

use crate::types::Timestamp;

/// Something worth reporting happened inside the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Acquisition thread is running and about to open the device.
    ThreadStarted,
    /// Device opened and position updates registered.
    Connected,
    /// Device handle released.
    Disconnected,
    /// The arm reported a communication timeout.
    Timeout,
    /// The arm reported an error.
    DeviceError,
    /// The arm flagged a sample as inaccurate; it was not sent.
    InaccurateData,
    /// A pose identical to the previous one was suppressed.
    DuplicatePose { timestamp: Timestamp },
    /// A new latency report was received.
    LatencyChanged { ms: f64 },
    /// An output channel was full and a measurement was dropped.
    OutputFull { output: &'static str },
    /// An output's receiver went away; the output is now disconnected.
    OutputClosed { output: &'static str },
}

/// Receiver of driver diagnostics. Called from the acquisition thread and
/// from whichever thread delivers latency reports.
pub trait DriverObserver: Send + Sync {
    fn on_event(&self, event: &DriverEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl DriverObserver for LogObserver {
    fn on_event(&self, event: &DriverEvent) {
        match event {
            DriverEvent::ThreadStarted => log::debug!("FaroArm thread started"),
            DriverEvent::Connected => log::info!("FaroArm connected"),
            DriverEvent::Disconnected => log::info!("FaroArm disconnected"),
            DriverEvent::Timeout => {
                log::warn!("FaroArm: timeout occurred in communication with arm")
            }
            DriverEvent::DeviceError => log::error!("FaroArm: error reported by arm"),
            DriverEvent::InaccurateData => {
                log::warn!("FaroArm: inaccurate data detected by arm, not sending")
            }
            DriverEvent::DuplicatePose { timestamp } => {
                log::warn!("FaroArm: duplicate pose at {} skipped", timestamp)
            }
            DriverEvent::LatencyChanged { ms } => {
                log::debug!("FaroArm received new latency measurement in ms: {}", ms)
            }
            DriverEvent::OutputFull { output } => {
                log::trace!("{} channel full, dropping measurement", output)
            }
            DriverEvent::OutputClosed { output } => {
                log::info!("{} receiver dropped, output disconnected", output)
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DriverObserver for NoopObserver {
    fn on_event(&self, _event: &DriverEvent) {}
}

/// Keeps every event for inspection in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: std::sync::Mutex<Vec<DriverEvent>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub fn events(&self) -> Vec<DriverEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&DriverEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

#[cfg(test)]
impl DriverObserver for RecordingObserver {
    fn on_event(&self, event: &DriverEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
