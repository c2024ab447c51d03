#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library of planar robot motion types."]
#![doc = ""]
#![doc = "This crate provides the pose, velocity command and transport twist types"]
#![doc = "shared by the fieldnav controller, plus unicycle odometry for simulation."]

use core::f64::consts::{PI, TAU};
use core::fmt;
use libm::{cos, fmod, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::KinematicsError;

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis in the world frame).
///
/// The heading is stored as reported by the pose provider and may be any real
/// value; use [`Pose::wrapped_heading`] when a `[0, 2π)` reading is required.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World‑frame x position (m).
    pub x: f64,
    /// World‑frame y position (m).
    pub y: f64,
    /// Heading (rad), not normalized.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Heading mapped into `[0, 2π)`.
    pub fn wrapped_heading(&self) -> f64 {
        wrap_two_pi(self.theta)
    }

    /// Normalize an angle to be within `[-PI, PI)`.
    ///
    /// Angles at `PI` will be normalized to `-PI`.
    pub fn normalize_angle(angle: f64) -> f64 {
        let a = fmod(angle, TAU);
        if a >= PI {
            a - TAU
        } else if a < -PI {
            a + TAU
        } else {
            a
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2} rad)", self.x, self.y, self.theta)
    }
}

/// Map any angle into `[0, 2π)`.
pub fn wrap_two_pi(angle: f64) -> f64 {
    let a = fmod(angle, TAU);
    let a = if a < 0.0 { a + TAU } else { a };
    // fmod of a tiny negative value can round up to exactly TAU
    if a >= TAU { 0.0 } else { a }
}

/// A planar velocity command: forward speed and turn rate in the robot base frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    /// Forward speed (m/s).
    pub linear: f64,
    /// Turn rate (rad/s), counter-clockwise positive.
    pub angular: f64,
}

impl VelocityCommand {
    /// The all-zero command used to hold the robot still.
    pub const ZERO: VelocityCommand = VelocityCommand::new(0.0, 0.0);

    /// Construct a new command.
    pub const fn new(linear: f64, angular: f64) -> Self {
        VelocityCommand { linear, angular }
    }

    /// Clamp both components independently into `[-limit, limit]`.
    ///
    /// A non-finite component saturates to zero so that a NaN can never reach
    /// the output channel.
    pub fn saturate(self, limit: f64) -> Self {
        VelocityCommand {
            linear: saturate_component(self.linear, limit),
            angular: saturate_component(self.angular, limit),
        }
    }

    /// Whether both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

fn saturate_component(value: f64, limit: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-limit, limit)
    }
}

impl fmt::Display for VelocityCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.3} m/s, ω: {:.3} rad/s)", self.linear, self.angular)
    }
}

/// Three-component vector used by [`TwistMsg`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
}

/// Full 3+3 axis twist as expected by velocity transports.
///
/// Only `linear.x` and `angular.z` carry data for a ground robot; the other
/// axes are always zero.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwistMsg {
    /// Linear velocity (m/s).
    pub linear: Vector3,
    /// Angular velocity (rad/s).
    pub angular: Vector3,
}

impl From<VelocityCommand> for TwistMsg {
    fn from(cmd: VelocityCommand) -> Self {
        TwistMsg {
            linear: Vector3 { x: cmd.linear, ..Vector3::default() },
            angular: Vector3 { z: cmd.angular, ..Vector3::default() },
        }
    }
}

impl From<TwistMsg> for VelocityCommand {
    fn from(msg: TwistMsg) -> Self {
        VelocityCommand::new(msg.linear.x, msg.angular.z)
    }
}

/// Unicycle odometry: integrates a velocity command into a pose.
///
/// Unlike a wheel-level model this keeps the heading unwrapped, which is what
/// an odometry-based pose provider reports after a full turn in place.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unicycle {
    /// Speed limit applied to incoming commands before integration.
    limit: f64,
}

impl Unicycle {
    /// Construct an integrator that saturates commands at `limit`.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidLimit)` if `limit` is negative or not finite.
    pub fn new(limit: f64) -> Result<Self, KinematicsError> {
        if !limit.is_finite() || limit < 0.0 {
            return Err(KinematicsError::InvalidLimit("must be finite and non-negative"));
        }
        Ok(Unicycle { limit })
    }

    /// Returns the saturation limit.
    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Advance `pose` by `cmd` held constant for `dt` seconds.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose(
        &self,
        pose: Pose,
        cmd: VelocityCommand,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }
        let cmd = cmd.saturate(self.limit);

        Ok(Pose {
            x: pose.x + cmd.linear * cos(pose.theta) * dt,
            y: pose.y + cmd.linear * sin(pose.theta) * dt,
            theta: pose.theta + cmd.angular * dt,
        })
    }
}

impl fmt::Display for Unicycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unicycle (limit: {:.2})", self.limit)
    }
}
