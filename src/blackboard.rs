use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use fieldnav_avoidance::{PointSensorFrame, RangeScanFrame, SensorSnapshot};
use fieldnav_kinematics::{Pose, VelocityCommand};

/// Latest world state shared between the simulator, the actuator and the
/// control task. Frames are held behind `Arc` and replaced whole, never
/// mutated in place.
#[derive(Clone)]
pub struct State {
    pub pose: Pose,
    pub laser: Option<Arc<RangeScanFrame>>,
    pub sonar: Option<Arc<PointSensorFrame>>,
    /// Last command the actuator applied.
    pub applied: VelocityCommand,
    pub last_cmd_ts: Instant,
    pub last_sensor_ts: Instant,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            pose: Pose::default(),
            laser: None,
            sonar: None,
            applied: VelocityCommand::ZERO,
            last_cmd_ts: Instant::now(),
            last_sensor_ts: Instant::now(),
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

/// Frames and pose for one control tick, taken under a single read lock.
pub fn sensor_snapshot(bb: &Blackboard) -> SensorSnapshot {
    let g = bb.read();
    SensorSnapshot {
        laser: g.laser.clone(),
        sonar: g.sonar.clone(),
        pose: g.pose,
    }
}

/// Swap in a new pose and sensor frames as one update.
pub fn publish_sensors(bb: &Blackboard, pose: Pose, laser: RangeScanFrame, sonar: PointSensorFrame) {
    let laser = Arc::new(laser);
    let sonar = Arc::new(sonar);
    let mut g = bb.write();
    g.pose = pose;
    g.laser = Some(laser);
    g.sonar = Some(sonar);
    g.last_sensor_ts = Instant::now();
}

pub fn apply_cmd(bb: &Blackboard, cmd: VelocityCommand) {
    let mut g = bb.write();
    g.applied = cmd;
    g.last_cmd_ts = Instant::now();
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn clear_fault(bb: &Blackboard, msg: &str) {
    bb.write().faults.retain(|s| s != msg);
}
