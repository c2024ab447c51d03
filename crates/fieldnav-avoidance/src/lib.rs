//! Reactive obstacle avoidance by motor-schema fusion.
//!
//! Two repulsive potential fields, one from a scanning range sensor and one
//! from a ring of five point range sensors, are blended with an optional
//! goal-seeking velocity and saturated into a single planar command. The
//! [`scheduler`] drives the blend at a fixed rate.

pub mod controller;
pub mod error;
pub mod frames;
pub mod goal;
pub mod laser;
pub mod scheduler;
pub mod sonar;

pub use controller::{
    ArbitrationController, CommandSink, ControllerState, FusionMode, HaltSwitch, SPEED_LIMIT,
};
pub use error::AvoidanceError;
pub use frames::{
    MountingAngles, PointSensorFrame, RangeScanFrame, SensorSnapshot, SnapshotSource, SonarId,
};
pub use goal::{GoalVelocity, NoGoal, SteeringGains, WaypointNavigator};
pub use laser::LaserRepulsionField;
pub use scheduler::{ControlLoopConfig, run_control_task};
pub use sonar::{SonarMask, SonarRepulsionField, sonar_normalization};
