use crate::backend::{DeviceBackend, Session};
use crate::config::DriverConfig;
use crate::convert;
use crate::emit::{ButtonEventEmitter, Outputs, PoseStream};
use crate::latency::{LatencyCompensator, LatencyHandle};
use crate::observer::{DriverEvent, DriverObserver, LogObserver};
use crate::sync::{Clock, SystemClock, TimestampSynchronizer};
use crate::types::UpdateStatus;
use crate::{FaroArmError, Result};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Acquisition driver for one arm.
///
/// [`start`](Self::start) opens the device on a dedicated thread and polls it
/// until [`stop`](Self::stop). Both are idempotent; dropping the driver stops it.
pub struct FaroArmDriver<B: DeviceBackend> {
    config: DriverConfig,
    outputs: Outputs,
    observer: Arc<dyn DriverObserver>,
    clock: Arc<dyn Clock>,
    latency: Arc<LatencyCompensator>,
    backend: Option<B>,
    worker: Option<Worker<B>>,
}

struct Worker<B> {
    stop_flag: Arc<AtomicBool>,
    thread: JoinHandle<B>,
}

impl<B: DeviceBackend> FaroArmDriver<B> {
    pub fn new(backend: B, config: DriverConfig, outputs: Outputs) -> Self {
        Self {
            config,
            outputs,
            observer: Arc::new(LogObserver),
            clock: Arc::new(SystemClock),
            latency: Arc::new(LatencyCompensator::new()),
            backend: Some(backend),
            worker: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DriverObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Input for latency reports, usable from any thread.
    pub fn latency_handle(&self) -> LatencyHandle {
        LatencyHandle::new(self.latency.clone(), self.observer.clone())
    }

    pub fn set_latency(&self, distance_measurement_ms: f64) {
        self.latency_handle().set_latency(distance_measurement_ms);
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Open the device and start polling.
    ///
    /// Returns once the device is open and registered. Open or registration
    /// failures are returned here and leave the driver stopped.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let backend = self
            .backend
            .take()
            .ok_or(FaroArmError::BackendUnavailable)?;

        self.latency.reset();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let poll_loop = PollLoop::new(
            &self.config,
            self.outputs.clone(),
            self.latency.clone(),
            self.observer.clone(),
            self.clock.clone(),
            stop_flag.clone(),
        );
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let thread = std::thread::Builder::new()
            .name("faroarm-poll".into())
            .spawn(move || poll_loop.run(backend, ready_tx))
            .map_err(|e| FaroArmError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker { stop_flag, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                self.backend = thread.join().ok();
                Err(e)
            }
            Err(_) => {
                self.backend = thread.join().ok();
                Err(FaroArmError::AcquisitionAborted)
            }
        }
    }

    /// Stop polling and wait until the device has been closed.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop_flag.store(true, Ordering::Release);
            match worker.thread.join() {
                Ok(backend) => self.backend = Some(backend),
                Err(_) => log::error!("FaroArm acquisition thread panicked"),
            }
        }
    }
}

impl<B: DeviceBackend> Drop for FaroArmDriver<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State of one acquisition run, owned by the acquisition thread.
struct PollLoop {
    synchronizer: TimestampSynchronizer,
    poses: PoseStream,
    buttons: ButtonEventEmitter,
    latency: Arc<LatencyCompensator>,
    observer: Arc<dyn DriverObserver>,
    clock: Arc<dyn Clock>,
    stop_flag: Arc<AtomicBool>,
}

impl PollLoop {
    fn new(
        config: &DriverConfig,
        outputs: Outputs,
        latency: Arc<LatencyCompensator>,
        observer: Arc<dyn DriverObserver>,
        clock: Arc<dyn Clock>,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        let Outputs {
            pose,
            front_button,
            back_button,
        } = outputs;
        Self {
            synchronizer: TimestampSynchronizer::from_config(config),
            poses: PoseStream::new(pose, observer.clone()),
            buttons: ButtonEventEmitter::new(
                front_button,
                back_button,
                config.button_code,
                observer.clone(),
            ),
            latency,
            observer,
            clock,
            stop_flag,
        }
    }

    /// Thread body. Reports open/registration outcome on `ready`, polls
    /// until stopped and hands the backend back.
    fn run<B: DeviceBackend>(mut self, mut backend: B, ready: Sender<Result<()>>) -> B {
        self.observer.on_event(&DriverEvent::ThreadStarted);

        match Session::open(&mut backend) {
            Ok(mut session) => {
                self.observer.on_event(&DriverEvent::Connected);
                let _ = ready.send(Ok(()));

                while !self.stop_flag.load(Ordering::Acquire) {
                    self.iterate(&mut session);
                }

                drop(session);
                self.observer.on_event(&DriverEvent::Disconnected);
            }
            Err(e) => {
                let _ = ready.send(Err(e));
            }
        }

        backend
    }

    fn iterate<B: DeviceBackend>(&mut self, session: &mut Session<'_, B>) {
        let anchor = self.latency.anchor(self.clock.now());
        let mut frame = session.poll();

        match frame.take_status() {
            UpdateStatus::DataReady => {
                let timestamp = self
                    .synchronizer
                    .convert_native_to_local(frame.native_timestamp, anchor);
                self.poses.submit(timestamp, convert::to_pose(&frame));
                self.buttons.process(timestamp, &frame);
            }
            UpdateStatus::Timeout => self.observer.on_event(&DriverEvent::Timeout),
            UpdateStatus::Error => self.observer.on_event(&DriverEvent::DeviceError),
            UpdateStatus::InaccurateData => {
                self.observer.on_event(&DriverEvent::InaccurateData)
            }
            UpdateStatus::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ReplayBackend;
    use crate::observer::{NoopObserver, RecordingObserver};
    use crate::types::{Buttons, ButtonCode, Measurement, Pose, RawFrame, Timestamp};
    use crossbeam_channel::{bounded, Receiver};
    use std::time::Duration;

    const NOW: Timestamp = 1_700_000_000_000_000_000;

    struct FixedClock(Timestamp);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            self.0
        }
    }

    struct Harness {
        poses: Receiver<Measurement<Pose>>,
        front: Receiver<Measurement<ButtonCode>>,
        back: Receiver<Measurement<ButtonCode>>,
        outputs: Outputs,
    }

    fn harness() -> Harness {
        let (pose_tx, poses) = bounded(64);
        let (front_tx, front) = bounded(64);
        let (back_tx, back) = bounded(64);
        Harness {
            poses,
            front,
            back,
            outputs: Outputs::new()
                .with_pose(pose_tx)
                .with_front_button(front_tx)
                .with_back_button(back_tx),
        }
    }

    fn frame(native: u64) -> RawFrame {
        RawFrame::data([1000.0, 0.0, 0.0], [90.0, 0.0, 0.0], native)
    }

    #[test]
    fn test_single_frame_end_to_end() {
        let h = harness();
        let backend = ReplayBackend::new([frame(10).with_buttons(Buttons::FRONT)]);
        let stats = backend.stats();
        let mut driver = FaroArmDriver::new(backend, DriverConfig::default(), h.outputs)
            .with_observer(Arc::new(NoopObserver));

        driver.start().unwrap();
        let pose = h.poses.recv_timeout(Duration::from_secs(2)).unwrap().value;
        driver.stop();

        assert_eq!(pose.position, [1.0, 0.0, 0.0]);
        let half = std::f64::consts::FRAC_PI_4;
        assert!(pose.orientation.x.abs() < 1e-12);
        assert!(pose.orientation.y.abs() < 1e-12);
        assert!((pose.orientation.z - half.sin()).abs() < 1e-12);
        assert!((pose.orientation.w - half.cos()).abs() < 1e-12);

        assert!(h.poses.try_recv().is_err());
        assert_eq!(h.front.try_iter().count(), 1);
        assert_eq!(h.back.try_iter().count(), 0);
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_identical_frames_emit_once() {
        let h = harness();
        let observer = Arc::new(RecordingObserver::default());
        let backend = ReplayBackend::new([frame(10), frame(10), RawFrame::status(UpdateStatus::Timeout)]);
        let stats = backend.stats();
        let mut driver = FaroArmDriver::new(backend, DriverConfig::default(), h.outputs)
            .with_observer(observer.clone());

        driver.start().unwrap();
        while stats.polls() < 3 {
            std::thread::sleep(Duration::from_millis(1));
        }
        driver.stop();

        assert_eq!(h.poses.try_iter().count(), 1);
        assert_eq!(
            observer.count(|e| matches!(e, DriverEvent::DuplicatePose { .. })),
            1
        );
        assert_eq!(observer.count(|e| *e == DriverEvent::Timeout), 1);
    }

    #[test]
    fn test_start_twice_runs_one_loop() {
        let backend = ReplayBackend::new(Vec::new());
        let stats = backend.stats();
        let mut driver = FaroArmDriver::new(backend, DriverConfig::default(), Outputs::new())
            .with_observer(Arc::new(NoopObserver));

        driver.start().unwrap();
        driver.start().unwrap();
        assert!(driver.is_running());
        assert_eq!(stats.opens(), 1);

        driver.stop();
        assert!(!driver.is_running());
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_stop_when_stopped_is_noop() {
        let mut driver = FaroArmDriver::new(
            ReplayBackend::new(Vec::new()),
            DriverConfig::default(),
            Outputs::new(),
        );
        driver.stop();
        driver.stop();
        assert!(!driver.is_running());
    }

    #[test]
    fn test_restart_reuses_backend() {
        let backend = ReplayBackend::new(Vec::new());
        let stats = backend.stats();
        let mut driver = FaroArmDriver::new(backend, DriverConfig::default(), Outputs::new())
            .with_observer(Arc::new(NoopObserver));

        driver.start().unwrap();
        driver.stop();
        driver.start().unwrap();
        drop(driver);

        assert_eq!(stats.opens(), 2);
        assert_eq!(stats.closes(), 2);
    }

    #[test]
    fn test_open_failure_keeps_driver_stopped() {
        let backend = ReplayBackend::new(Vec::new()).failing_open();
        let stats = backend.stats();
        let mut driver = FaroArmDriver::new(backend, DriverConfig::default(), Outputs::new())
            .with_observer(Arc::new(NoopObserver));

        assert!(matches!(driver.start(), Err(FaroArmError::DeviceNotFound)));
        assert!(!driver.is_running());
        // Caller may retry; the backend is still there.
        assert!(matches!(driver.start(), Err(FaroArmError::DeviceNotFound)));
        assert_eq!(stats.closes(), 0);
    }

    #[test]
    fn test_register_failure_closes_device() {
        let backend = ReplayBackend::new(Vec::new()).failing_register();
        let stats = backend.stats();
        let mut driver = FaroArmDriver::new(backend, DriverConfig::default(), Outputs::new())
            .with_observer(Arc::new(NoopObserver));

        assert!(matches!(driver.start(), Err(FaroArmError::RegisterFailed)));
        assert!(!driver.is_running());
        assert_eq!(stats.opens(), 1);
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut driver = FaroArmDriver::new(
            ReplayBackend::new(Vec::new()),
            DriverConfig::default().with_frequency(-1.0),
            Outputs::new(),
        );
        assert_eq!(driver.config().frequency, -1.0);
        assert!(matches!(driver.start(), Err(FaroArmError::InvalidConfig(_))));
    }

    fn poll_once(latency_ms: f64, frames: Vec<RawFrame>) -> (Vec<Measurement<Pose>>, Arc<RecordingObserver>) {
        let h = harness();
        let observer = Arc::new(RecordingObserver::default());
        let latency = Arc::new(LatencyCompensator::new());
        latency.set_latency(latency_ms);
        let count = frames.len();
        let mut poll_loop = PollLoop::new(
            &DriverConfig::default(),
            h.outputs,
            latency,
            observer.clone(),
            Arc::new(FixedClock(NOW)),
            Arc::new(AtomicBool::new(false)),
        );
        let mut backend = ReplayBackend::new(frames);
        let mut session = Session::open(&mut backend).unwrap();
        for _ in 0..count {
            poll_loop.iterate(&mut session);
        }
        (h.poses.try_iter().collect(), observer)
    }

    #[test]
    fn test_latency_shifts_timestamp() {
        let (zero, _) = poll_once(0.0, vec![frame(0)]);
        let (five, _) = poll_once(5.0, vec![frame(0)]);
        assert_eq!(zero[0].timestamp, NOW);
        assert_eq!(zero[0].timestamp - five[0].timestamp, 5_000_000);
    }

    #[test]
    fn test_transient_statuses_are_skipped() {
        let (poses, observer) = poll_once(
            0.0,
            vec![
                RawFrame::status(UpdateStatus::Timeout),
                RawFrame::status(UpdateStatus::Error),
                RawFrame::status(UpdateStatus::InaccurateData),
                RawFrame::status(UpdateStatus::None),
                frame(0),
            ],
        );
        assert_eq!(poses.len(), 1);
        assert_eq!(
            observer.events(),
            vec![
                DriverEvent::Timeout,
                DriverEvent::DeviceError,
                DriverEvent::InaccurateData,
            ]
        );
    }
}
