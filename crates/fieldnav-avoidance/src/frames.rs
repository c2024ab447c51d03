//! Sensor frames consumed by the repulsion fields.
//!
//! Frames are immutable once built. Providers publish a new frame by swapping
//! an `Arc` in shared storage, and a control tick reads all of them through a
//! single [`SensorSnapshot`].

use std::sync::Arc;

use fieldnav_kinematics::Pose;

use crate::error::AvoidanceError;

/// One wide-angle sweep from the scanning range sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeScanFrame {
    /// Range readings (m), ordered from `angle_min` to `angle_max`.
    pub ranges: Vec<f64>,
    /// Bearing of the first reading (rad).
    pub angle_min: f64,
    /// Bearing of the last reading (rad).
    pub angle_max: f64,
}

impl RangeScanFrame {
    pub fn new(ranges: Vec<f64>, angle_min: f64, angle_max: f64) -> Self {
        RangeScanFrame { ranges, angle_min, angle_max }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Bearing of reading `i`, spaced evenly over `[angle_min, angle_max]`
    /// with both endpoints included. A single reading sits at `angle_min`.
    pub fn angle_of(&self, i: usize) -> f64 {
        let n = self.ranges.len();
        if n <= 1 {
            return self.angle_min;
        }
        let step = (self.angle_max - self.angle_min) / (n - 1) as f64;
        self.angle_min + step * i as f64
    }

    /// Iterator over `(bearing, range)` pairs.
    pub fn readings(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ranges.iter().enumerate().map(|(i, r)| (self.angle_of(i), *r))
    }
}

/// Positions of the five point range sensors, in mask order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SonarId {
    Front,
    Left,
    Right,
    RearLeft,
    RearRight,
}

impl SonarId {
    pub const ALL: [SonarId; 5] = [
        SonarId::Front,
        SonarId::Left,
        SonarId::Right,
        SonarId::RearLeft,
        SonarId::RearRight,
    ];

    pub const fn index(self) -> usize {
        match self {
            SonarId::Front => 0,
            SonarId::Left => 1,
            SonarId::Right => 2,
            SonarId::RearLeft => 3,
            SonarId::RearRight => 4,
        }
    }
}

/// Fixed mounting bearings (rad) of the five sonars, indexed by [`SonarId::index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MountingAngles([f64; 5]);

impl MountingAngles {
    /// # Errors
    ///
    /// Returns `Err(AvoidanceError::InvalidMountingAngles)` if any angle is not finite.
    pub fn new(angles: [f64; 5]) -> Result<Self, AvoidanceError> {
        if angles.iter().any(|a| !a.is_finite()) {
            return Err(AvoidanceError::InvalidMountingAngles("every angle must be finite"));
        }
        Ok(MountingAngles(angles))
    }

    pub fn get(&self, id: SonarId) -> f64 {
        self.0[id.index()]
    }

    pub fn as_array(&self) -> &[f64; 5] {
        &self.0
    }
}

impl Default for MountingAngles {
    /// Front, ±90° sides and ±135° rear corners.
    fn default() -> Self {
        use std::f64::consts::{FRAC_PI_2, PI};
        MountingAngles([0.0, FRAC_PI_2, -FRAC_PI_2, 0.75 * PI, -0.75 * PI])
    }
}

/// One reading from each of the five point range sensors.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSensorFrame {
    ranges: [f64; 5],
    angles: MountingAngles,
}

impl PointSensorFrame {
    pub fn new(angles: MountingAngles) -> Self {
        PointSensorFrame { ranges: [f64::INFINITY; 5], angles }
    }

    /// Builder-style setter for one reading.
    pub fn with_range(mut self, id: SonarId, range: f64) -> Self {
        self.ranges[id.index()] = range;
        self
    }

    pub fn set_range(&mut self, id: SonarId, range: f64) {
        self.ranges[id.index()] = range;
    }

    pub fn range(&self, id: SonarId) -> f64 {
        self.ranges[id.index()]
    }

    pub fn angle(&self, id: SonarId) -> f64 {
        self.angles.get(id)
    }

    pub fn angles(&self) -> &MountingAngles {
        &self.angles
    }
}

/// Everything a control tick reads, captured at one instant.
#[derive(Debug, Clone, Default)]
pub struct SensorSnapshot {
    pub laser: Option<Arc<RangeScanFrame>>,
    pub sonar: Option<Arc<PointSensorFrame>>,
    pub pose: Pose,
}

/// Source of consistent per-tick snapshots.
pub trait SnapshotSource {
    fn snapshot(&self) -> SensorSnapshot;
}

impl<F> SnapshotSource for F
where
    F: Fn() -> SensorSnapshot,
{
    fn snapshot(&self) -> SensorSnapshot {
        self()
    }
}
