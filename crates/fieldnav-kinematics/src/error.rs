#![warn(missing_docs)]

//! Error types for the kinematics library.

use core::fmt;

/// Errors that can occur when building or integrating motion types.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Returned when a saturation limit is negative or not finite.
    InvalidLimit(&'static str),
    /// Returned when a negative time delta is used for pose updates.
    NegativeTimeDelta(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidLimit(msg) => write!(f, "Invalid saturation limit: {}", msg),
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
