//! Device access capability consumed by the poll loop.

use crate::types::RawFrame;
use crate::{FaroArmError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Open/register/poll/close contract of an arm.
///
/// The driver moves the backend into its acquisition thread and hands it back
/// after the thread exits, so one backend serves any number of start/stop
/// cycles.
pub trait DeviceBackend: Send + 'static {
    /// Open device handle, valid until passed to [`close`](Self::close).
    type Handle: Send;

    fn open(&mut self) -> Result<Self::Handle>;

    /// Ask the device to start reporting position updates.
    fn register_updates(&mut self, handle: &mut Self::Handle) -> Result<()>;

    /// Read one frame. May block up to the device's own timeout.
    fn poll(&mut self, handle: &mut Self::Handle) -> RawFrame;

    fn close(&mut self, handle: Self::Handle);
}

/// An open, registered device. Closes the handle exactly once on drop.
pub struct Session<'a, B: DeviceBackend> {
    backend: &'a mut B,
    handle: Option<B::Handle>,
}

impl<'a, B: DeviceBackend> Session<'a, B> {
    /// Open the device and register for updates. If registration fails the
    /// handle is closed before the error is returned.
    pub fn open(backend: &'a mut B) -> Result<Self> {
        let handle = backend.open()?;
        let mut session = Session {
            backend,
            handle: Some(handle),
        };
        if let Some(handle) = session.handle.as_mut() {
            session.backend.register_updates(handle)?;
        }
        Ok(session)
    }

    pub fn poll(&mut self) -> RawFrame {
        match self.handle.as_mut() {
            Some(handle) => self.backend.poll(handle),
            None => RawFrame::default(),
        }
    }
}

impl<B: DeviceBackend> Drop for Session<'_, B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.close(handle);
        }
    }
}

/// Backend used when no vendor entry point is available. Every open fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl DeviceBackend for NullBackend {
    type Handle = ();

    fn open(&mut self) -> Result<()> {
        Err(FaroArmError::BackendUnavailable)
    }

    fn register_updates(&mut self, _handle: &mut ()) -> Result<()> {
        Err(FaroArmError::BackendUnavailable)
    }

    fn poll(&mut self, _handle: &mut ()) -> RawFrame {
        RawFrame::default()
    }

    fn close(&mut self, _handle: ()) {}
}

/// Shared call counters of a [`ReplayBackend`].
#[derive(Debug, Default, Clone)]
pub struct ReplayStats {
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
}

impl ReplayStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

/// Handle returned by [`ReplayBackend::open`].
#[derive(Debug)]
pub struct ReplayHandle {
    _private: (),
}

/// Replays scripted frames, then idles.
///
/// Once the script is exhausted every poll sleeps for `idle` and reports
/// [`UpdateStatus::None`](crate::UpdateStatus::None).
#[derive(Debug)]
pub struct ReplayBackend {
    frames: VecDeque<RawFrame>,
    idle: Duration,
    fail_open: bool,
    fail_register: bool,
    stats: ReplayStats,
}

impl ReplayBackend {
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            idle: Duration::from_millis(1),
            fail_open: false,
            fail_register: false,
            stats: ReplayStats::default(),
        }
    }

    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Make `open` fail like an unplugged arm.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make update registration fail after a successful open.
    pub fn failing_register(mut self) -> Self {
        self.fail_register = true;
        self
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats.clone()
    }
}

impl DeviceBackend for ReplayBackend {
    type Handle = ReplayHandle;

    fn open(&mut self) -> Result<ReplayHandle> {
        if self.fail_open {
            return Err(FaroArmError::DeviceNotFound);
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(ReplayHandle { _private: () })
    }

    fn register_updates(&mut self, _handle: &mut ReplayHandle) -> Result<()> {
        if self.fail_register {
            return Err(FaroArmError::RegisterFailed);
        }
        Ok(())
    }

    fn poll(&mut self, _handle: &mut ReplayHandle) -> RawFrame {
        self.stats.polls.fetch_add(1, Ordering::SeqCst);
        match self.frames.pop_front() {
            Some(frame) => frame,
            None => {
                std::thread::sleep(self.idle);
                RawFrame::default()
            }
        }
    }

    fn close(&mut self, _handle: ReplayHandle) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}
