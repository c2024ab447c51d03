//! This module defines the error types used by the `fieldnav-avoidance` crate.

#![warn(missing_docs)]

/// Error type for avoidance configuration.
///
/// Every variant is a startup-time fault. Per-tick numeric problems such as
/// non-positive ranges or empty frames are recovered inside the tick and never
/// surface as an `AvoidanceError`.
#[derive(Debug, Clone, PartialEq)]
pub enum AvoidanceError {
    /// Returned when the sonar mask enables no sensor, leaving the field undefined.
    NoActiveSonar(&'static str),
    /// Returned when the control period is zero.
    InvalidPeriod(&'static str),
    /// Returned when a sonar mounting angle is not finite.
    InvalidMountingAngles(&'static str),
    /// Returned when a minimum-range floor is not a positive finite number.
    InvalidFloor(&'static str),
}

impl core::fmt::Display for AvoidanceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AvoidanceError::NoActiveSonar(msg) => write!(f, "Invalid sonar mask: {}", msg),
            AvoidanceError::InvalidPeriod(msg) => write!(f, "Invalid control period: {}", msg),
            AvoidanceError::InvalidMountingAngles(msg) => {
                write!(f, "Invalid sonar mounting angles: {}", msg)
            }
            AvoidanceError::InvalidFloor(msg) => write!(f, "Invalid minimum range: {}", msg),
        }
    }
}

impl core::error::Error for AvoidanceError {}
