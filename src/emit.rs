//! Output side of the driver: channel sinks, duplicate pose suppression and
//! button event generation.

use crate::observer::{DriverEvent, DriverObserver};
use crate::types::{ButtonCode, Measurement, Pose, RawFrame, Timestamp};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;

/// A named, optionally connected output channel.
///
/// Sending never blocks: a full channel drops the measurement, a channel
/// whose receiver is gone disconnects the sink.
#[derive(Debug, Clone)]
pub struct Sink<T> {
    name: &'static str,
    sender: Option<Sender<Measurement<T>>>,
}

impl<T> Sink<T> {
    pub fn disconnected(name: &'static str) -> Self {
        Self { name, sender: None }
    }

    pub fn connected(name: &'static str, sender: Sender<Measurement<T>>) -> Self {
        Self {
            name,
            sender: Some(sender),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    /// Returns true if the measurement was queued.
    pub fn send(&mut self, measurement: Measurement<T>, observer: &dyn DriverObserver) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(measurement) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                observer.on_event(&DriverEvent::OutputFull { output: self.name() });
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                observer.on_event(&DriverEvent::OutputClosed { output: self.name() });
                self.sender = None;
                false
            }
        }
    }
}

/// The three outputs of a driver. Unset outputs stay disconnected.
#[derive(Debug, Clone)]
pub struct Outputs {
    pub pose: Sink<Pose>,
    /// Front button, edge triggered.
    pub front_button: Sink<ButtonCode>,
    /// Back button, level triggered.
    pub back_button: Sink<ButtonCode>,
}

impl Default for Outputs {
    fn default() -> Self {
        Self::new()
    }
}

impl Outputs {
    pub fn new() -> Self {
        Self {
            pose: Sink::disconnected("Output"),
            front_button: Sink::disconnected("Button1"),
            back_button: Sink::disconnected("Button2"),
        }
    }

    pub fn with_pose(mut self, sender: Sender<Measurement<Pose>>) -> Self {
        self.pose = Sink::connected("Output", sender);
        self
    }

    pub fn with_front_button(mut self, sender: Sender<Measurement<ButtonCode>>) -> Self {
        self.front_button = Sink::connected("Button1", sender);
        self
    }

    pub fn with_back_button(mut self, sender: Sender<Measurement<ButtonCode>>) -> Self {
        self.back_button = Sink::connected("Button2", sender);
        self
    }
}

/// What [`PoseStream::submit`] did with a pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Emitted,
    Suppressed,
}

/// Forwards poses, skipping exact repeats of the last one emitted.
pub struct PoseStream {
    sink: Sink<Pose>,
    last: Option<Pose>,
    observer: Arc<dyn DriverObserver>,
}

impl PoseStream {
    pub fn new(sink: Sink<Pose>, observer: Arc<dyn DriverObserver>) -> Self {
        Self {
            sink,
            last: None,
            observer,
        }
    }

    pub fn submit(&mut self, timestamp: Timestamp, pose: Pose) -> Submission {
        if self.last == Some(pose) {
            self.observer
                .on_event(&DriverEvent::DuplicatePose { timestamp });
            return Submission::Suppressed;
        }
        self.sink
            .send(Measurement::new(timestamp, pose), self.observer.as_ref());
        self.last = Some(pose);
        Submission::Emitted
    }

    pub fn last(&self) -> Option<&Pose> {
        self.last.as_ref()
    }
}

/// Turns button states into events.
///
/// The front button fires once per press (rising edge), the back button
/// fires on every frame it is held.
pub struct ButtonEventEmitter {
    front: Sink<ButtonCode>,
    back: Sink<ButtonCode>,
    code: ButtonCode,
    front_was_active: bool,
    observer: Arc<dyn DriverObserver>,
}

/// Which buttons produced an event for a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonEvents {
    pub front: bool,
    pub back: bool,
}

impl ButtonEventEmitter {
    pub fn new(
        front: Sink<ButtonCode>,
        back: Sink<ButtonCode>,
        code: ButtonCode,
        observer: Arc<dyn DriverObserver>,
    ) -> Self {
        Self {
            front,
            back,
            code,
            front_was_active: false,
            observer,
        }
    }

    pub fn process(&mut self, timestamp: Timestamp, frame: &RawFrame) -> ButtonEvents {
        let mut events = ButtonEvents::default();

        if self.front.is_connected() {
            if frame.front_pressed() {
                if !self.front_was_active {
                    self.front
                        .send(Measurement::new(timestamp, self.code), self.observer.as_ref());
                    self.front_was_active = true;
                    events.front = true;
                }
            } else {
                self.front_was_active = false;
            }
        }

        if frame.back_pressed() && self.back.is_connected() {
            self.back
                .send(Measurement::new(timestamp, self.code), self.observer.as_ref());
            events.back = true;
        }

        events
    }
}
