use std::fmt;

/// Errors that can occur while driving the arm.
#[derive(Debug, thiserror::Error)]
pub enum FaroArmError {
    #[error("Could not find arm (device open failed)")]
    DeviceNotFound,

    #[error("Could not register position updates with the arm")]
    RegisterFailed,

    #[error("Device backend unavailable (vendor entry point missing)")]
    BackendUnavailable,

    #[error("Failed to spawn acquisition thread: {0}")]
    ThreadSpawn(String),

    #[error("Acquisition thread exited before the device was ready")]
    AcquisitionAborted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Output stream stopped")]
    StreamStopped,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &FaroArmError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
