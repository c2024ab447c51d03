//! Repulsion from the five point range sensors.

use fieldnav_kinematics::VelocityCommand;
use tracing::warn;

use crate::error::AvoidanceError;
use crate::frames::{PointSensorFrame, SonarId};

/// Output scale of the sonar field, matching the robot's speed limit.
pub const SONAR_GAIN: f64 = 0.3;

/// Default minimum range (m) substituted for non-positive readings.
pub const DEFAULT_SONAR_FLOOR: f64 = 0.05;

// drop from 1.0 to 0.3 across 0.15 m
const NEAR_SLOPE: f64 = 0.7 / 0.15;

/// Map a raw sonar range (m) to a repulsion magnitude in `[0, 1]`.
///
/// Piecewise linear and non-increasing: saturated at 1 up to 0.15 m, falling
/// to 0.3 at 0.3 m and to 0 at 0.5 m, zero beyond. NaN maps to 0.
///
/// The middle segment joins `(0.15, 1.0)` to `(0.3, 0.3)` so the curve stays
/// continuous where the outer segment takes over.
pub fn sonar_normalization(r: f64) -> f64 {
    if r <= 0.15 {
        1.0
    } else if r <= 0.3 {
        1.0 - (r - 0.15) * NEAR_SLOPE
    } else if r <= 0.5 {
        -1.5 * (r - 0.5)
    } else {
        0.0
    }
}

/// Which of the five sonars feed the field. At least one must be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SonarMask([bool; 5]);

impl SonarMask {
    /// # Errors
    ///
    /// Returns `Err(AvoidanceError::NoActiveSonar)` if every entry is disabled.
    pub fn new(enabled: [bool; 5]) -> Result<Self, AvoidanceError> {
        if !enabled.iter().any(|e| *e) {
            return Err(AvoidanceError::NoActiveSonar("at least one sonar must be enabled"));
        }
        Ok(SonarMask(enabled))
    }

    /// Only the two rear sonars.
    pub const fn rear_only() -> Self {
        SonarMask([false, false, false, true, true])
    }

    /// Exactly one sonar.
    pub fn only(id: SonarId) -> Self {
        let mut enabled = [false; 5];
        enabled[id.index()] = true;
        SonarMask(enabled)
    }

    pub fn is_enabled(&self, id: SonarId) -> bool {
        self.0[id.index()]
    }

    /// Number of enabled sonars, `K` in the field average. Never zero.
    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|e| **e).count()
    }
}

impl Default for SonarMask {
    fn default() -> Self {
        SonarMask::rear_only()
    }
}

/// Converts a [`PointSensorFrame`] into a repulsion vector.
///
/// ```text
/// linear  = 0.3 · -(1/K) Σ cos(θᵢ) · m(rᵢ) · maskᵢ
/// angular = 0.3 · -(1/K) Σ sin(θᵢ) · m(rᵢ) · maskᵢ
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SonarRepulsionField {
    mask: SonarMask,
    min_range: f64,
}

impl SonarRepulsionField {
    /// # Errors
    ///
    /// Returns `Err(AvoidanceError::InvalidFloor)` if `min_range` is not a positive finite number.
    pub fn new(mask: SonarMask, min_range: f64) -> Result<Self, AvoidanceError> {
        if !min_range.is_finite() || min_range <= 0.0 {
            return Err(AvoidanceError::InvalidFloor("sonar floor must be positive and finite"));
        }
        Ok(SonarRepulsionField { mask, min_range })
    }

    pub fn mask(&self) -> SonarMask {
        self.mask
    }

    pub fn compute(&self, frame: &PointSensorFrame) -> VelocityCommand {
        let mut floored = 0usize;
        let (mut sum_cos, mut sum_sin) = (0.0, 0.0);

        for id in SonarId::ALL.into_iter().filter(|id| self.mask.is_enabled(*id)) {
            let mut range = frame.range(id);
            if range <= 0.0 {
                floored += 1;
                range = self.min_range;
            }
            let magnitude = sonar_normalization(range);
            let theta = frame.angle(id);
            sum_cos += theta.cos() * magnitude;
            sum_sin += theta.sin() * magnitude;
        }
        if floored > 0 {
            warn!(floored, floor = self.min_range, "Non-positive sonar readings were clamped");
        }

        let k = self.mask.active_count() as f64;
        VelocityCommand::new(SONAR_GAIN * (-sum_cos / k), SONAR_GAIN * (-sum_sin / k))
    }
}

impl Default for SonarRepulsionField {
    fn default() -> Self {
        SonarRepulsionField { mask: SonarMask::default(), min_range: DEFAULT_SONAR_FLOOR }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::MountingAngles;
    const EPSILON: f64 = 1e-4;

    #[test]
    fn test_normalization_breakpoints() {
        assert!((sonar_normalization(0.0) - 1.0).abs() < EPSILON);
        assert!((sonar_normalization(0.15) - 1.0).abs() < EPSILON);
        assert!((sonar_normalization(0.3) - 0.3).abs() < EPSILON);
        assert!((sonar_normalization(0.5) - 0.0).abs() < EPSILON);
        assert!((sonar_normalization(0.6) - 0.0).abs() < EPSILON);
        assert_eq!(sonar_normalization(f64::NAN), 0.0);
        assert_eq!(sonar_normalization(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_normalization_is_continuous_at_breakpoints() {
        for r in [0.15, 0.3, 0.5] {
            let left = sonar_normalization(r - 1e-9);
            let right = sonar_normalization(r + 1e-9);
            assert!((left - right).abs() < 1e-6, "jump at {r}: {left} vs {right}");
        }
    }

    #[test]
    fn test_normalization_is_non_increasing() {
        let mut previous = sonar_normalization(0.0);
        for step in 1..=1000 {
            let r = step as f64 * 0.001;
            let m = sonar_normalization(r);
            assert!(m <= previous + 1e-5, "m({r}) = {m} rose above {previous}");
            assert!((0.0..=1.0).contains(&m));
            previous = m;
        }
    }

    #[test]
    fn test_mask_requires_one_sonar() {
        assert!(matches!(SonarMask::new([false; 5]), Err(AvoidanceError::NoActiveSonar(_))));
        assert_eq!(SonarMask::new([true, false, false, false, false]).unwrap().active_count(), 1);
        assert_eq!(SonarMask::default().active_count(), 2);
        assert!(SonarMask::default().is_enabled(SonarId::RearRight));
        assert!(!SonarMask::default().is_enabled(SonarId::Front));
    }

    #[test]
    fn test_rear_obstacle_pushes_forward() {
        let field = SonarRepulsionField::default();
        let frame = PointSensorFrame::new(MountingAngles::default())
            .with_range(SonarId::RearLeft, 0.1)
            .with_range(SonarId::RearRight, 0.1);
        let out = field.compute(&frame);
        // both rear sonars at ±135°, full magnitude: 0.3 * -(2 cos 135°)/2
        let expected = 0.3 * -(0.75 * std::f64::consts::PI).cos();
        assert!((out.linear - expected).abs() < 1e-9);
        assert!(out.angular.abs() < 1e-9);
    }

    #[test]
    fn test_masked_out_sonar_is_ignored() {
        let field = SonarRepulsionField::default();
        let frame = PointSensorFrame::new(MountingAngles::default()).with_range(SonarId::Front, 0.0);
        assert_eq!(field.compute(&frame), VelocityCommand::ZERO);
    }

    #[test]
    fn test_single_sonar_mask_uses_only_that_sonar() {
        let field = SonarRepulsionField::new(SonarMask::only(SonarId::Left), DEFAULT_SONAR_FLOOR).unwrap();
        let frame = PointSensorFrame::new(MountingAngles::default())
            .with_range(SonarId::Left, 0.3)
            .with_range(SonarId::RearLeft, 0.1)
            .with_range(SonarId::Front, 0.1);
        let out = field.compute(&frame);
        let m = sonar_normalization(0.3);
        let theta = std::f64::consts::FRAC_PI_2;
        assert!((out.linear - 0.3 * -(theta.cos() * m)).abs() < 1e-12);
        assert!((out.angular - 0.3 * -(theta.sin() * m)).abs() < 1e-12);
    }

    #[test]
    fn test_negative_reading_is_floored() {
        let field = SonarRepulsionField::default();
        let frame = PointSensorFrame::new(MountingAngles::default()).with_range(SonarId::RearLeft, -1.0);
        let out = field.compute(&frame);
        assert!(out.is_finite());
        assert!(out.linear > 0.0);
    }
}
