//! Conversion of raw arm samples into poses.
//!
//! The arm reports its tip orientation as three sequential rotations:
//! bank about Z, then attitude about X, then heading about Z again.

use crate::types::{Pose, Quaternion, RawFrame};

/// Millimeters per meter.
pub const MM_PER_M: f64 = 1000.0;

/// Convert heading/attitude/bank (radians) to a unit quaternion.
///
/// Composes `heading * attitude * bank`, so bank is applied first.
pub fn euler_to_quat(heading: f64, attitude: f64, bank: f64) -> Quaternion {
    let q_bank = Quaternion::about_z(bank);
    let q_attitude = Quaternion::about_x(attitude);
    let q_heading = Quaternion::about_z(heading);

    q_heading * q_attitude * q_bank
}

/// Convert a raw frame (degrees, millimeters) into a pose (quaternion, meters).
pub fn to_pose(frame: &RawFrame) -> Pose {
    let [heading, attitude, bank] = frame.orientation;
    let orientation = euler_to_quat(
        heading.to_radians(),
        attitude.to_radians(),
        bank.to_radians(),
    );

    let [x, y, z] = frame.position;
    Pose {
        orientation,
        position: [x / MM_PER_M, y / MM_PER_M, z / MM_PER_M],
    }
}
