//! Standalone world for running the controller without hardware: a
//! rectangular room with round pillars, a unicycle robot, a scanning range
//! sensor and five sonars.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use fieldnav_avoidance::{MountingAngles, PointSensorFrame, RangeScanFrame, SonarId};
use fieldnav_kinematics::{Pose, TwistMsg, Unicycle, VelocityCommand};
use spin_sleep::SpinSleeper;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::blackboard::{self, Blackboard};
use crate::bus::Topic;
use crate::config::SimSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pillar {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Debug, Clone)]
pub struct Room {
    half_width: f64,
    half_height: f64,
    pillars: Vec<Pillar>,
}

impl Room {
    pub fn new(half_width: f64, half_height: f64, pillars: Vec<Pillar>) -> Self {
        Room { half_width, half_height, pillars }
    }

    /// Distance from `(x, y)` along world bearing `phi` to the first surface.
    pub fn cast(&self, x: f64, y: f64, phi: f64) -> f64 {
        let (dx, dy) = (phi.cos(), phi.sin());
        let mut nearest = f64::INFINITY;

        if dx > 0.0 {
            nearest = nearest.min((self.half_width - x) / dx);
        } else if dx < 0.0 {
            nearest = nearest.min((-self.half_width - x) / dx);
        }
        if dy > 0.0 {
            nearest = nearest.min((self.half_height - y) / dy);
        } else if dy < 0.0 {
            nearest = nearest.min((-self.half_height - y) / dy);
        }

        for p in &self.pillars {
            // |o + t·d - c|² = r² with |d| = 1
            let (ox, oy) = (x - p.x, y - p.y);
            let b = ox * dx + oy * dy;
            let c = ox * ox + oy * oy - p.radius * p.radius;
            let disc = b * b - c;
            if disc < 0.0 {
                continue;
            }
            let t = -b - disc.sqrt();
            if t >= 0.0 {
                nearest = nearest.min(t);
            } else if c < 0.0 {
                // inside the pillar
                nearest = 0.0;
            }
        }

        nearest.max(0.0)
    }
}

/// Synthesizes sensor frames for a robot pose inside a [`Room`].
#[derive(Debug, Clone)]
pub struct SensorModel {
    room: Room,
    beams: usize,
    fov: f64,
    laser_max_range: f64,
    sonar_max_range: f64,
    sonar_angles: MountingAngles,
}

impl SensorModel {
    pub fn new(settings: &SimSettings, sonar_angles: MountingAngles) -> Self {
        let pillars = settings
            .obstacles
            .iter()
            .map(|[x, y, radius]| Pillar { x: *x, y: *y, radius: *radius })
            .collect();
        SensorModel {
            room: Room::new(settings.half_width, settings.half_height, pillars),
            beams: settings.laser_beams,
            fov: settings.laser_fov,
            laser_max_range: settings.laser_max_range,
            sonar_max_range: settings.sonar_max_range,
            sonar_angles,
        }
    }

    /// Readings beyond the sensor's reach come back as infinity.
    fn reading(&self, pose: &Pose, bearing: f64, max_range: f64) -> f64 {
        let r = self.room.cast(pose.x, pose.y, pose.theta + bearing);
        if r > max_range { f64::INFINITY } else { r }
    }

    pub fn laser(&self, pose: &Pose) -> RangeScanFrame {
        let (angle_min, angle_max) = (-self.fov / 2.0, self.fov / 2.0);
        let mut frame = RangeScanFrame::new(vec![0.0; self.beams], angle_min, angle_max);
        for i in 0..self.beams {
            let bearing = frame.angle_of(i);
            frame.ranges[i] = self.reading(pose, bearing, self.laser_max_range);
        }
        frame
    }

    pub fn sonar(&self, pose: &Pose) -> PointSensorFrame {
        let mut frame = PointSensorFrame::new(self.sonar_angles);
        for id in SonarId::ALL {
            frame.set_range(id, self.reading(pose, self.sonar_angles.get(id), self.sonar_max_range));
        }
        frame
    }
}

/// Spawn the two simulation threads.
///
/// `actuator` drains the command topic into the blackboard; `sensor`
/// integrates the applied command and publishes fresh pose and frames.
pub fn spawn(
    bb: &Blackboard,
    cmd_topic: &Topic<TwistMsg>,
    settings: &SimSettings,
    sonar_angles: MountingAngles,
    speed_limit: f64,
) -> anyhow::Result<()> {
    let model = SensorModel::new(settings, sonar_angles);
    let unicycle = Unicycle::new(speed_limit).context("building simulated drive")?;
    let step = Duration::from_millis(settings.step_ms.max(1));
    let start = settings.start_pose;

    info!("Spawning actuator thread...");
    std::thread::Builder::new()
        .name("actuator".into())
        .spawn({
            let bb = Arc::clone(bb);
            let mut cmd_rx = cmd_topic.subscribe();
            let topic = cmd_topic.name().to_string();
            move || {
                info!(%topic, "Actuator thread started.");
                let sleeper = SpinSleeper::new(1_000);
                loop {
                    match cmd_rx.try_recv() {
                        Ok(msg) => blackboard::apply_cmd(&bb, VelocityCommand::from(*msg)),
                        Err(broadcast::error::TryRecvError::Lagged(n)) => {
                            warn!("Actuator lagged by {} commands.", n);
                        }
                        Err(broadcast::error::TryRecvError::Closed) => {
                            info!("Command topic closed, actuator stopping.");
                            return;
                        }
                        Err(broadcast::error::TryRecvError::Empty) => {
                            sleeper.sleep(Duration::from_millis(1));
                        }
                    }
                }
            }
        })?;

    info!("Spawning sensor thread...");
    std::thread::Builder::new()
        .name("sensor".into())
        .spawn({
            let bb = Arc::clone(bb);
            move || {
                info!(start = %start, "Sensor thread started.");
                let sleeper = SpinSleeper::new(10_000);
                let dt = step.as_secs_f64();
                let mut pose = start;
                loop {
                    let applied = blackboard::snapshot(&bb).applied;
                    match unicycle.update_pose(pose, applied, dt) {
                        Ok(next) => pose = next,
                        Err(e) => warn!("Pose integration failed: {}", e),
                    }
                    blackboard::publish_sensors(&bb, pose, model.laser(&pose), model.sonar(&pose));
                    debug!(%pose, "Published simulated sensors");
                    sleeper.sleep(step);
                }
            }
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};
    const EPSILON: f64 = 1e-9;

    fn room() -> Room {
        Room::new(2.0, 1.0, vec![Pillar { x: 1.0, y: 0.0, radius: 0.25 }])
    }

    #[test]
    fn test_cast_hits_walls() {
        let room = Room::new(2.0, 1.0, Vec::new());
        assert!((room.cast(0.0, 0.0, 0.0) - 2.0).abs() < EPSILON);
        assert!((room.cast(0.0, 0.0, PI) - 2.0).abs() < EPSILON);
        assert!((room.cast(0.0, 0.0, FRAC_PI_2) - 1.0).abs() < EPSILON);
        assert!((room.cast(0.5, -0.5, -FRAC_PI_2) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_cast_hits_pillar_first() {
        assert!((room().cast(0.0, 0.0, 0.0) - 0.75).abs() < EPSILON);
        // beam passing above the pillar reaches the ceiling
        assert!((room().cast(0.0, 0.5, 0.0) - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_cast_inside_pillar_is_zero() {
        assert_eq!(room().cast(1.0, 0.1, 0.3), 0.0);
    }

    #[test]
    fn test_laser_frame_covers_field_of_view() {
        let settings = SimSettings {
            half_width: 2.0,
            half_height: 1.0,
            laser_beams: 3,
            laser_fov: PI,
            laser_max_range: 1.5,
            ..SimSettings::default()
        };
        let model = SensorModel::new(&settings, MountingAngles::default());
        let frame = model.laser(&Pose::default());
        assert_eq!(frame.len(), 3);
        assert!((frame.angle_min + FRAC_PI_2).abs() < EPSILON);
        // side walls at 1 m, front wall at 2 m beyond reach
        assert!((frame.ranges[0] - 1.0).abs() < EPSILON);
        assert!(frame.ranges[1].is_infinite());
        assert!((frame.ranges[2] - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_sonar_frame_follows_heading() {
        let settings = SimSettings { half_width: 2.0, half_height: 1.0, ..SimSettings::default() };
        let model = SensorModel::new(&settings, MountingAngles::default());
        // facing +y: the front sonar sees the ceiling at 1 m
        let frame = model.sonar(&Pose::new(0.0, 0.0, FRAC_PI_2));
        assert!((frame.range(SonarId::Front) - 1.0).abs() < EPSILON);
        assert!((frame.range(SonarId::Right) - 2.0).abs() < EPSILON);
    }
}
