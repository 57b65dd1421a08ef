//! # faroarm - acquisition driver for FARO coordinate-measuring arms
//!
//! Polls a FARO arm through a pluggable [`DeviceBackend`] and republishes
//! each sample as a time-stamped [`Pose`] plus front/back button events.
//! Provides:
//! - Euler (heading/attitude/bank, degrees) to quaternion conversion, mm to m
//! - Device clock to host clock timestamp synchronization
//! - Latency compensation driven by an asynchronous upstream input
//! - Duplicate pose suppression and edge/level triggered buttons
//! - C FFI for hosts that load the vendor library themselves
//!
//! ## Quick Start
//! ```no_run
//! use faroarm::{DriverConfig, FaroArmDriver, Outputs, ReplayBackend};
//! use std::time::Duration;
//!
//! let (pose_tx, pose_rx) = crossbeam_channel::bounded(256);
//! let outputs = Outputs::new().with_pose(pose_tx);
//! let backend = ReplayBackend::new(Vec::new());
//!
//! let mut driver = FaroArmDriver::new(backend, DriverConfig::default(), outputs);
//! driver.start().unwrap();
//! if let Ok(m) = pose_rx.recv_timeout(Duration::from_secs(1)) {
//!     println!("{} {:?}", m.timestamp, m.value.position);
//! }
//! driver.stop();
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod convert;
pub mod sync;
pub mod latency;
pub mod observer;
pub mod emit;
pub mod backend;
pub mod driver;
pub mod ffi;

pub use backend::{DeviceBackend, NullBackend, ReplayBackend};
pub use config::DriverConfig;
pub use driver::FaroArmDriver;
pub use emit::{Outputs, Sink};
pub use error::FaroArmError;
pub use latency::LatencyHandle;
pub use observer::{DriverEvent, DriverObserver, LogObserver, NoopObserver};
pub use sync::{Clock, SystemClock, TimestampSynchronizer};
pub use types::*;

/// Result type alias for faroarm operations.
pub type Result<T> = std::result::Result<T, FaroArmError>;
