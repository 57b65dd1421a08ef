use std::ops::Mul;

/// Host timestamp in nanoseconds since the Unix epoch.
pub type Timestamp = u64;

/// Device-native sample clock value. Its unit is `DriverConfig::native_tick`.
pub type NativeTick = u64;

/// Outcome reported by the arm for one poll.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStatus {
    /// Nothing pending this cycle.
    #[default]
    None = 0,
    /// A new measurement is available.
    DataReady = 1,
    /// Communication with the arm timed out.
    Timeout = 2,
    /// The arm reported an error.
    Error = 3,
    /// The arm flagged the measurement as inaccurate.
    InaccurateData = 4,
}

impl From<i32> for UpdateStatus {
    fn from(value: i32) -> Self {
        match value {
            1 => UpdateStatus::DataReady,
            2 => UpdateStatus::Timeout,
            3 => UpdateStatus::Error,
            4 => UpdateStatus::InaccurateData,
            _ => UpdateStatus::None,
        }
    }
}

bitflags::bitflags! {
    /// Arm buttons held down in a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct Buttons: u8 {
        const FRONT = 1 << 0;
        const BACK  = 1 << 1;
    }
}

impl Default for Buttons {
    fn default() -> Self {
        Buttons::empty()
    }
}

/// One sample as read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawFrame {
    /// Tip position in millimeters, device frame.
    pub position: [f64; 3],
    /// Heading, attitude, bank in degrees.
    pub orientation: [f64; 3],
    pub buttons: Buttons,
    pub native_timestamp: NativeTick,
    pub status: UpdateStatus,
}

impl RawFrame {
    /// A data-ready frame with no buttons pressed.
    pub fn data(position: [f64; 3], orientation: [f64; 3], native_timestamp: NativeTick) -> Self {
        Self {
            position,
            orientation,
            buttons: Buttons::empty(),
            native_timestamp,
            status: UpdateStatus::DataReady,
        }
    }

    /// A frame carrying only a status.
    pub fn status(status: UpdateStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Buttons) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn front_pressed(&self) -> bool {
        self.buttons.contains(Buttons::FRONT)
    }

    pub fn back_pressed(&self) -> bool {
        self.buttons.contains(Buttons::BACK)
    }

    /// Take the status, leaving `UpdateStatus::None` so it is never handled twice.
    pub fn take_status(&mut self) -> UpdateStatus {
        std::mem::take(&mut self.status)
    }
}

/// Rotation quaternion in (x, y, z, w) order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about the X axis.
    pub fn about_x(angle: f64) -> Self {
        let (s, c) = (angle / 2.0).sin_cos();
        Self::new(s, 0.0, 0.0, c)
    }

    /// Rotation of `angle` radians about the Z axis.
    pub fn about_z(angle: f64) -> Self {
        let (s, c) = (angle / 2.0).sin_cos();
        Self::new(0.0, 0.0, s, c)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Components as `[x, y, z, w]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

/// Hamilton product.
impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Quaternion) -> Quaternion {
        let (a, b) = (self, rhs);
        Quaternion {
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        }
    }
}

/// 6DOF pose of the arm tip. Compared exactly, without tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub orientation: Quaternion,
    /// Position in meters [x, y, z].
    pub position: [f64; 3],
}

/// Code carried by a button event.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonCode(pub i32);

impl ButtonCode {
    pub const SPACE: ButtonCode = ButtonCode(b' ' as i32);
}

impl Default for ButtonCode {
    fn default() -> Self {
        ButtonCode::SPACE
    }
}

/// A value stamped with the host time it refers to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement<T> {
    pub timestamp: Timestamp,
    pub value: T,
}

impl<T> Measurement<T> {
    pub fn new(timestamp: Timestamp, value: T) -> Self {
        Self { timestamp, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamilton_product_identity() {
        let q = Quaternion::new(0.1, 0.2, 0.3, 0.9);
        assert_eq!(Quaternion::IDENTITY * q, q);
        assert_eq!(q * Quaternion::IDENTITY, q);
    }

    #[test]
    fn test_hamilton_product_basis() {
        // i * j = k
        let i = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        let j = Quaternion::new(0.0, 1.0, 0.0, 0.0);
        assert_eq!(i * j, Quaternion::new(0.0, 0.0, 1.0, 0.0));
        assert_eq!(j * i, Quaternion::new(0.0, 0.0, -1.0, 0.0));
    }

    #[test]
    fn test_take_status_resets() {
        let mut frame = RawFrame::status(UpdateStatus::Timeout);
        assert_eq!(frame.take_status(), UpdateStatus::Timeout);
        assert_eq!(frame.status, UpdateStatus::None);
    }

    #[test]
    fn test_status_from_raw() {
        assert_eq!(UpdateStatus::from(1), UpdateStatus::DataReady);
        assert_eq!(UpdateStatus::from(4), UpdateStatus::InaccurateData);
        assert_eq!(UpdateStatus::from(77), UpdateStatus::None);
    }

    #[test]
    fn test_button_flags() {
        let frame = RawFrame::default().with_buttons(Buttons::BACK);
        assert!(!frame.front_pressed());
        assert!(frame.back_pressed());
        assert_eq!(ButtonCode::default().0, 32);
    }
}
