//! Arbitration between the repulsion fields and the goal-seeking velocity.
//!
//! The controller is a plain value: each [`ArbitrationController::tick`] is a
//! transform of one [`SensorSnapshot`] into one saturated command, with the
//! [`ControllerState`] as the only state carried from tick to tick. Timing
//! lives in [`crate::scheduler`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fieldnav_kinematics::VelocityCommand;
use tracing::{debug, info, warn};

use crate::frames::SensorSnapshot;
use crate::goal::GoalVelocity;
use crate::laser::LaserRepulsionField;
use crate::sonar::SonarRepulsionField;

/// Bound applied to both command components.
pub const SPEED_LIMIT: f64 = 0.3;
/// Gain on the laser field's linear component.
pub const LASER_LINEAR_GAIN: f64 = 0.1;
/// Gain on the laser field's angular component.
pub const LASER_ANGULAR_GAIN: f64 = 0.25;
/// Forward bias used when wandering without a goal.
pub const CRUISE_SPEED: f64 = 0.3;
/// Spin rate during the initial turn.
pub const INITIAL_TURN_RATE: f64 = 0.3;
/// Wrapped heading (rad, about 340°) past which the initial turn counts as complete.
pub const INITIAL_TURN_EXIT: f64 = 5.9341;

/// Startup phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Spinning in place so the scanner sees the surroundings. Initial state.
    InitialTurn,
    /// Regular fusion. Entered once from `InitialTurn`, never left.
    Normal,
}

/// How the fields are combined, fixed for the controller's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMode {
    /// Goal velocity plus weighted laser field plus sonar field.
    GoalSeeking,
    /// Constant forward bias plus weighted laser field. The sonar field is
    /// computed but not used in this mode.
    PureAvoidance,
}

impl FusionMode {
    pub fn from_calculate_target(calculate_target: bool) -> Self {
        if calculate_target {
            FusionMode::GoalSeeking
        } else {
            FusionMode::PureAvoidance
        }
    }
}

/// Shared stop/resume switch. While stopped every tick emits a zero command.
#[derive(Debug, Clone, Default)]
pub struct HaltSwitch(Arc<AtomicBool>);

impl HaltSwitch {
    pub fn new() -> Self {
        HaltSwitch::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One-way, best-effort output for velocity commands.
pub trait CommandSink {
    fn send(&self, cmd: VelocityCommand);
}

/// Combines the laser field, the sonar field and a goal velocity into one
/// bounded command per tick.
#[derive(Debug, Clone)]
pub struct ArbitrationController {
    state: ControllerState,
    mode: FusionMode,
    laser: LaserRepulsionField,
    sonar: SonarRepulsionField,
    halt: HaltSwitch,
    awaiting_target: bool,
}

impl ArbitrationController {
    pub fn new(mode: FusionMode, laser: LaserRepulsionField, sonar: SonarRepulsionField) -> Self {
        ArbitrationController {
            state: ControllerState::InitialTurn,
            mode,
            laser,
            sonar,
            halt: HaltSwitch::new(),
            awaiting_target: false,
        }
    }

    /// Use an externally owned halt switch.
    pub fn with_halt_switch(mut self, halt: HaltSwitch) -> Self {
        self.halt = halt;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether the last goal-seeking tick found no target to steer towards.
    pub fn awaiting_target(&self) -> bool {
        self.awaiting_target
    }

    pub fn mode(&self) -> FusionMode {
        self.mode
    }

    pub fn halt_switch(&self) -> HaltSwitch {
        self.halt.clone()
    }

    /// Run one control step and return the command to publish.
    ///
    /// In goal-seeking mode with no active target, a zero command goes to
    /// `sink` before the goal collaborator is asked to select one. If it still
    /// has none, the tick returns a zero command.
    pub fn tick(
        &mut self,
        snapshot: &SensorSnapshot,
        goal: &mut dyn GoalVelocity,
        sink: &dyn CommandSink,
    ) -> VelocityCommand {
        if self.halt.is_stopped() {
            debug!("Halted, holding zero command");
            return VelocityCommand::ZERO;
        }

        if self.state == ControllerState::InitialTurn {
            let heading = snapshot.pose.wrapped_heading();
            if heading > INITIAL_TURN_EXIT {
                info!(heading, "Initial turn complete");
                self.state = ControllerState::Normal;
            } else {
                return VelocityCommand::new(0.0, INITIAL_TURN_RATE);
            }
        }

        if self.mode == FusionMode::GoalSeeking && !goal.target_exists() {
            sink.send(VelocityCommand::ZERO);
            goal.select_target(&snapshot.pose);
            if !goal.target_exists() {
                if self.awaiting_target {
                    debug!("Still no target, holding position");
                } else {
                    warn!("No target available, holding position");
                    self.awaiting_target = true;
                }
                return VelocityCommand::ZERO;
            }
            if self.awaiting_target {
                info!("Target acquired");
                self.awaiting_target = false;
            }
        }

        let laser = snapshot
            .laser
            .as_deref()
            .map_or(VelocityCommand::ZERO, |frame| self.laser.compute(frame));
        let sonar = snapshot
            .sonar
            .as_deref()
            .map_or(VelocityCommand::ZERO, |frame| self.sonar.compute(frame));
        debug!(
            l_laser = laser.linear,
            a_laser = laser.angular,
            l_sonar = sonar.linear,
            a_sonar = sonar.angular,
            "Field contributions"
        );

        let fused = match self.mode {
            FusionMode::GoalSeeking => {
                let to_goal = goal.velocity_to_next_subtarget(&snapshot.pose);
                fuse_goal_seeking(to_goal, laser, sonar)
            }
            FusionMode::PureAvoidance => fuse_pure_avoidance(laser),
        };

        fused.saturate(SPEED_LIMIT)
    }
}

/// Goal velocity plus the weighted laser field plus the sonar field, unsaturated.
pub fn fuse_goal_seeking(
    to_goal: VelocityCommand,
    laser: VelocityCommand,
    sonar: VelocityCommand,
) -> VelocityCommand {
    VelocityCommand::new(
        to_goal.linear + LASER_LINEAR_GAIN * laser.linear + sonar.linear,
        to_goal.angular + LASER_ANGULAR_GAIN * laser.angular + sonar.angular,
    )
}

/// Forward bias plus the weighted laser field, unsaturated.
pub fn fuse_pure_avoidance(laser: VelocityCommand) -> VelocityCommand {
    VelocityCommand::new(
        CRUISE_SPEED + LASER_LINEAR_GAIN * laser.linear,
        LASER_ANGULAR_GAIN * laser.angular,
    )
}
