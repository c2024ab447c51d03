//! Inverse-square repulsion from the scanning range sensor.

use fieldnav_kinematics::VelocityCommand;
use tracing::{debug, warn};

use crate::error::AvoidanceError;
use crate::frames::RangeScanFrame;

/// Default minimum range (m) substituted for non-positive or too-short readings.
pub const DEFAULT_LASER_FLOOR: f64 = 0.05;

/// Converts a [`RangeScanFrame`] into a repulsion vector.
///
/// Every reading pushes along the bearing opposite to it with strength
/// `1 / r²`, averaged over the whole sweep:
///
/// ```text
/// linear  = -(1/N) Σ cos(θᵢ) / rᵢ²
/// angular = -(1/N) Σ sin(θᵢ) / rᵢ²
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserRepulsionField {
    min_range: f64,
}

impl LaserRepulsionField {
    /// # Errors
    ///
    /// Returns `Err(AvoidanceError::InvalidFloor)` if `min_range` is not a positive finite number.
    pub fn new(min_range: f64) -> Result<Self, AvoidanceError> {
        if !min_range.is_finite() || min_range <= 0.0 {
            return Err(AvoidanceError::InvalidFloor("laser floor must be positive and finite"));
        }
        Ok(LaserRepulsionField { min_range })
    }

    pub fn min_range(&self) -> f64 {
        self.min_range
    }

    /// Repulsion vector for one sweep.
    ///
    /// An empty sweep contributes nothing. Readings at or below the floor are
    /// raised to it; NaN readings count towards `N` but push nothing.
    pub fn compute(&self, frame: &RangeScanFrame) -> VelocityCommand {
        if frame.is_empty() {
            debug!("Empty laser frame, skipping laser field this tick");
            return VelocityCommand::ZERO;
        }

        let mut floored = 0usize;
        let (mut sum_cos, mut sum_sin) = (0.0, 0.0);
        for (theta, range) in frame.readings() {
            if range.is_nan() {
                continue;
            }
            let r = if range < self.min_range {
                floored += 1;
                self.min_range
            } else {
                range
            };
            let weight = 1.0 / (r * r);
            sum_cos += theta.cos() * weight;
            sum_sin += theta.sin() * weight;
        }
        if floored > 0 {
            warn!(floored, floor = self.min_range, "Laser readings below floor were clamped");
        }

        let n = frame.len() as f64;
        VelocityCommand::new(-sum_cos / n, -sum_sin / n)
    }
}

impl Default for LaserRepulsionField {
    fn default() -> Self {
        LaserRepulsionField { min_range: DEFAULT_LASER_FLOOR }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_constructor_rejects_bad_floor() {
        assert!(LaserRepulsionField::new(0.0).is_err());
        assert!(LaserRepulsionField::new(-0.1).is_err());
        assert!(LaserRepulsionField::new(f64::INFINITY).is_err());
        assert_eq!(LaserRepulsionField::new(0.1).unwrap().min_range(), 0.1);
    }

    #[test]
    fn test_obstacle_ahead_pushes_backward() {
        let field = LaserRepulsionField::default();
        // one reading straight ahead at 2 m
        let frame = RangeScanFrame::new(vec![2.0], 0.0, 0.0);
        let out = field.compute(&frame);
        assert!((out.linear - (-0.25)).abs() < EPSILON);
        assert!(out.angular.abs() < EPSILON);
    }

    #[test]
    fn test_obstacle_on_left_turns_right() {
        let field = LaserRepulsionField::default();
        let frame = RangeScanFrame::new(vec![1.0], PI / 2.0, PI / 2.0);
        let out = field.compute(&frame);
        assert!(out.linear.abs() < EPSILON);
        assert!((out.angular - (-1.0)).abs() < EPSILON);
    }

    #[test]
    fn test_average_over_all_readings() {
        let field = LaserRepulsionField::default();
        // readings at -π/2, 0, π/2
        let frame = RangeScanFrame::new(vec![f64::INFINITY, 1.0, f64::INFINITY], -PI / 2.0, PI / 2.0);
        let out = field.compute(&frame);
        assert!((out.linear - (-1.0 / 3.0)).abs() < EPSILON);
        assert!(out.angular.abs() < EPSILON);
    }

    #[test]
    fn test_empty_frame_contributes_nothing() {
        let field = LaserRepulsionField::default();
        let frame = RangeScanFrame::new(Vec::new(), -1.0, 1.0);
        assert_eq!(field.compute(&frame), VelocityCommand::ZERO);
    }

    #[test]
    fn test_zero_and_negative_ranges_are_floored() {
        let field = LaserRepulsionField::new(0.1).unwrap();
        let zero = field.compute(&RangeScanFrame::new(vec![0.0], 0.0, 0.0));
        let negative = field.compute(&RangeScanFrame::new(vec![-3.0], 0.0, 0.0));
        assert!(zero.is_finite());
        assert!((zero.linear - (-100.0)).abs() < 1e-6);
        assert_eq!(zero, negative);
    }

    #[test]
    fn test_nan_reading_pushes_nothing() {
        let field = LaserRepulsionField::default();
        let frame = RangeScanFrame::new(vec![f64::NAN, 1.0], 0.0, 0.0);
        let out = field.compute(&frame);
        assert!((out.linear - (-0.5)).abs() < EPSILON);
    }
}
