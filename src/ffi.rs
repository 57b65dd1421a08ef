//! C FFI layer for faroarm.
//!
//! The host loads the vendor library itself and hands its entry points in as
//! an [`FaBackend`] table of callbacks. Poses and button events are read back
//! through opaque driver handles.
//! The generated C header is written to `include/faroarm.h` by cbindgen.

use crate::backend::DeviceBackend;
use crate::config::DriverConfig;
use crate::driver::FaroArmDriver;
use crate::emit::Outputs;
use crate::error::LastError;
use crate::latency::LatencyHandle;
use crate::types::{Buttons, ButtonCode, Measurement, Pose, RawFrame, UpdateStatus};
use crate::{FaroArmError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::ffi::{c_char, c_int, c_void};
use std::sync::Mutex;
use std::time::Duration;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Callback returning nonzero on success.
pub type FaStatusFn = unsafe extern "C" fn(user_data: *mut c_void) -> c_int;

/// Callback filling one frame.
pub type FaPollFn = unsafe extern "C" fn(user_data: *mut c_void, frame: *mut FaRawFrame);

/// Callback releasing the device.
pub type FaCloseFn = unsafe extern "C" fn(user_data: *mut c_void);

/// Raw frame in C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FaRawFrame {
    /// Position [x, y, z] in millimeters.
    pub position: [f64; 3],
    /// Heading, attitude, bank in degrees.
    pub orientation: [f64; 3],
    /// Nonzero while the front button is pressed.
    pub front_button: u8,
    /// Nonzero while the back button is pressed.
    pub back_button: u8,
    /// Device sample clock.
    pub native_timestamp: u64,
    /// 0 = none, 1 = data ready, 2 = timeout, 3 = error, 4 = inaccurate data.
    pub status: c_int,
}

impl From<&FaRawFrame> for RawFrame {
    fn from(raw: &FaRawFrame) -> Self {
        let mut buttons = Buttons::empty();
        buttons.set(Buttons::FRONT, raw.front_button != 0);
        buttons.set(Buttons::BACK, raw.back_button != 0);
        RawFrame {
            position: raw.position,
            orientation: raw.orientation,
            buttons,
            native_timestamp: raw.native_timestamp,
            status: UpdateStatus::from(raw.status),
        }
    }
}

/// Vendor entry points supplied by the host. `open` and `poll` are required;
/// a table without them behaves like a missing vendor library.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FaBackend {
    pub user_data: *mut c_void,
    pub open: Option<FaStatusFn>,
    pub register_updates: Option<FaStatusFn>,
    pub poll: Option<FaPollFn>,
    pub close: Option<FaCloseFn>,
}

/// [`DeviceBackend`] driving host callbacks.
///
/// The frame buffer persists between polls like the vendor's update struct;
/// its status is cleared after every read.
pub struct ForeignBackend {
    table: FaBackend,
    frame: FaRawFrame,
}

// The host guarantees `user_data` may be used from the acquisition thread.
unsafe impl Send for ForeignBackend {}

impl ForeignBackend {
    pub fn new(table: FaBackend) -> Self {
        Self {
            table,
            frame: FaRawFrame::default(),
        }
    }
}

impl DeviceBackend for ForeignBackend {
    type Handle = ();

    fn open(&mut self) -> Result<()> {
        let (Some(open), Some(_)) = (self.table.open, self.table.poll) else {
            return Err(FaroArmError::BackendUnavailable);
        };
        if unsafe { open(self.table.user_data) } == 0 {
            return Err(FaroArmError::DeviceNotFound);
        }
        self.frame = FaRawFrame::default();
        Ok(())
    }

    fn register_updates(&mut self, _handle: &mut ()) -> Result<()> {
        match self.table.register_updates {
            Some(register) if unsafe { register(self.table.user_data) } == 0 => {
                Err(FaroArmError::RegisterFailed)
            }
            _ => Ok(()),
        }
    }

    fn poll(&mut self, _handle: &mut ()) -> RawFrame {
        if let Some(poll) = self.table.poll {
            unsafe { poll(self.table.user_data, &mut self.frame) };
        }
        let frame = RawFrame::from(&self.frame);
        self.frame.status = 0;
        frame
    }

    fn close(&mut self, _handle: ()) {
        if let Some(close) = self.table.close {
            unsafe { close(self.table.user_data) };
        }
    }
}

/// Pose in C-compatible layout.
#[repr(C)]
pub struct FaPose {
    /// Quaternion [qx, qy, qz, qw].
    pub quaternion: [f64; 4],
    /// Position [x, y, z] in meters.
    pub position: [f64; 3],
    /// Host timestamp, nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
}

/// Button event in C-compatible layout.
#[repr(C)]
pub struct FaButtonEvent {
    pub code: i32,
    /// Host timestamp, nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
}

/// Opaque driver handle for C consumers.
pub struct FaDriver {
    driver: Mutex<FaroArmDriver<ForeignBackend>>,
    latency: LatencyHandle,
    poses: Receiver<Measurement<Pose>>,
    front: Receiver<Measurement<ButtonCode>>,
    back: Receiver<Measurement<ButtonCode>>,
}

fn recv_with_timeout<T>(rx: &Receiver<T>, timeout_ms: c_int) -> Result<T> {
    if timeout_ms == 0 {
        rx.try_recv().map_err(|_| FaroArmError::Timeout)
    } else if timeout_ms < 0 {
        rx.recv().map_err(|_| FaroArmError::StreamStopped)
    } else {
        rx.recv_timeout(Duration::from_millis(timeout_ms as u64))
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => FaroArmError::Timeout,
                RecvTimeoutError::Disconnected => FaroArmError::StreamStopped,
            })
    }
}

/// Create a driver around host callbacks.
/// `frequency`: assumed sample rate in Hz, or <= 0 for the configured default.
/// Returns NULL on error (check fa_last_error()).
#[no_mangle]
pub extern "C" fn fa_driver_new(backend: FaBackend, frequency: f64) -> *mut FaDriver {
    let mut config = DriverConfig::from_env();
    if frequency > 0.0 {
        config.frequency = frequency;
    }
    if let Err(e) = config.validate() {
        LAST_ERROR.set(&e);
        return std::ptr::null_mut();
    }

    let capacity = config.channel_capacity.max(1);
    let (pose_tx, poses) = crossbeam_channel::bounded(capacity);
    let (front_tx, front) = crossbeam_channel::bounded(capacity);
    let (back_tx, back) = crossbeam_channel::bounded(capacity);
    let outputs = Outputs::new()
        .with_pose(pose_tx)
        .with_front_button(front_tx)
        .with_back_button(back_tx);

    let driver = FaroArmDriver::new(ForeignBackend::new(backend), config, outputs);
    let latency = driver.latency_handle();
    Box::into_raw(Box::new(FaDriver {
        driver: Mutex::new(driver),
        latency,
        poses,
        front,
        back,
    }))
}

/// Stop a driver and free it.
///
/// # Safety
/// `drv` must be a pointer returned by `fa_driver_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn fa_driver_free(drv: *mut FaDriver) {
    if !drv.is_null() {
        drop(Box::from_raw(drv));
    }
}

/// Open the arm and start acquisition. Returns 0 on success, -1 on error.
///
/// # Safety
/// `drv` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn fa_driver_start(drv: *const FaDriver) -> c_int {
    if drv.is_null() {
        return -1;
    }
    let drv = &*drv;
    let Ok(mut driver) = drv.driver.lock() else {
        return -1;
    };
    match driver.start() {
        Ok(()) => {
            LAST_ERROR.clear();
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Stop acquisition and wait until the arm has been released.
///
/// # Safety
/// `drv` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn fa_driver_stop(drv: *const FaDriver) {
    if drv.is_null() {
        return;
    }
    let drv = &*drv;
    if let Ok(mut driver) = drv.driver.lock() {
        driver.stop();
    }
}

/// Check if acquisition is running.
///
/// # Safety
/// `drv` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn fa_driver_is_running(drv: *const FaDriver) -> bool {
    if drv.is_null() {
        return false;
    }
    let drv = &*drv;
    drv.driver.lock().map(|d| d.is_running()).unwrap_or(false)
}

/// Deliver a latency measurement in milliseconds. Callable from any thread.
///
/// # Safety
/// `drv` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn fa_driver_set_latency(drv: *const FaDriver, latency_ms: f64) {
    if drv.is_null() {
        return;
    }
    let drv = &*drv;
    drv.latency.set_latency(latency_ms);
}

/// Receive the next pose with timeout.
/// `timeout_ms`: timeout in milliseconds (0 = try without blocking, -1 = block forever).
/// Returns 0 on success, -1 on error/timeout.
///
/// # Safety
/// `drv` and `pose` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn fa_driver_recv_pose(
    drv: *const FaDriver,
    pose: *mut FaPose,
    timeout_ms: c_int,
) -> c_int {
    if drv.is_null() || pose.is_null() {
        return -1;
    }
    let drv = &*drv;

    match recv_with_timeout(&drv.poses, timeout_ms) {
        Ok(m) => {
            pose.write(FaPose {
                quaternion: m.value.orientation.to_array(),
                position: m.value.position,
                timestamp_ns: m.timestamp,
            });
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Receive the next button event with timeout.
/// `button`: 0 = front (fires once per press), 1 = back (fires every frame held).
/// `timeout_ms`: as for `fa_driver_recv_pose`.
/// Returns 0 on success, -1 on error/timeout.
///
/// # Safety
/// `drv` and `event` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn fa_driver_recv_button(
    drv: *const FaDriver,
    button: c_int,
    event: *mut FaButtonEvent,
    timeout_ms: c_int,
) -> c_int {
    if drv.is_null() || event.is_null() {
        return -1;
    }
    let drv = &*drv;
    let rx = match button {
        0 => &drv.front,
        1 => &drv.back,
        _ => return -1,
    };

    match recv_with_timeout(rx, timeout_ms) {
        Ok(m) => {
            event.write(FaButtonEvent {
                code: m.value.0,
                timestamp_ns: m.timestamp,
            });
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next faroarm API call.
#[no_mangle]
pub extern "C" fn fa_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeArm {
        opens: AtomicUsize,
        closes: AtomicUsize,
        polls: AtomicUsize,
    }

    unsafe extern "C" fn arm_open(user_data: *mut c_void) -> c_int {
        let arm = &*(user_data as *const FakeArm);
        arm.opens.fetch_add(1, Ordering::SeqCst);
        1
    }

    unsafe extern "C" fn arm_register(_user_data: *mut c_void) -> c_int {
        1
    }

    unsafe extern "C" fn arm_poll(user_data: *mut c_void, frame: *mut FaRawFrame) {
        let arm = &*(user_data as *const FakeArm);
        let n = arm.polls.fetch_add(1, Ordering::SeqCst);
        // First poll delivers one sample, later polls leave the buffer alone.
        if n == 0 {
            let frame = &mut *frame;
            frame.position = [500.0, 0.0, -250.0];
            frame.orientation = [0.0, 0.0, 0.0];
            frame.back_button = 1;
            frame.native_timestamp = 42;
            frame.status = 1;
        } else {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    unsafe extern "C" fn arm_close(user_data: *mut c_void) {
        let arm = &*(user_data as *const FakeArm);
        arm.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn table(arm: &FakeArm) -> FaBackend {
        FaBackend {
            user_data: arm as *const FakeArm as *mut c_void,
            open: Some(arm_open),
            register_updates: Some(arm_register),
            poll: Some(arm_poll),
            close: Some(arm_close),
        }
    }

    #[test]
    fn test_status_cleared_after_read() {
        let arm = FakeArm::default();
        let mut backend = ForeignBackend::new(table(&arm));
        backend.open().unwrap();
        assert_eq!(backend.poll(&mut ()).status, UpdateStatus::DataReady);
        // Buffer keeps the sample but the status is not reported twice.
        let second = backend.poll(&mut ());
        assert_eq!(second.status, UpdateStatus::None);
        assert_eq!(second.native_timestamp, 42);
    }

    #[test]
    fn test_missing_entry_point_is_unavailable() {
        let arm = FakeArm::default();
        let mut t = table(&arm);
        t.open = None;
        let mut backend = ForeignBackend::new(t);
        assert!(matches!(backend.open(), Err(FaroArmError::BackendUnavailable)));
    }

    #[test]
    fn test_driver_through_c_api() {
        let arm = FakeArm::default();
        unsafe {
            let drv = fa_driver_new(table(&arm), 50.0);
            assert!(!drv.is_null());
            assert_eq!(fa_driver_start(drv), 0);
            assert!(fa_driver_is_running(drv));
            fa_driver_set_latency(drv, 19.0);

            let mut pose = std::mem::MaybeUninit::<FaPose>::uninit();
            assert_eq!(fa_driver_recv_pose(drv, pose.as_mut_ptr(), 2000), 0);
            let pose = pose.assume_init();
            assert_eq!(pose.position, [0.5, 0.0, -0.25]);
            assert_eq!(pose.quaternion, [0.0, 0.0, 0.0, 1.0]);

            let mut event = std::mem::MaybeUninit::<FaButtonEvent>::uninit();
            assert_eq!(fa_driver_recv_button(drv, 1, event.as_mut_ptr(), 2000), 0);
            assert_eq!(event.assume_init_ref().code, 32);
            assert_eq!(fa_driver_recv_button(drv, 0, event.as_mut_ptr(), 0), -1);

            fa_driver_stop(drv);
            assert!(!fa_driver_is_running(drv));
            fa_driver_free(drv);
        }
        assert_eq!(arm.opens.load(Ordering::SeqCst), 1);
        assert_eq!(arm.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_open_reports_error() {
        unsafe extern "C" fn no_arm(_user_data: *mut c_void) -> c_int {
            0
        }
        let arm = FakeArm::default();
        let mut t = table(&arm);
        t.open = Some(no_arm);
        unsafe {
            let drv = fa_driver_new(t, 0.0);
            assert_eq!(fa_driver_start(drv), -1);
            assert!(!fa_driver_is_running(drv));
            fa_driver_free(drv);
        }
        assert_eq!(arm.closes.load(Ordering::SeqCst), 0);
    }
}
