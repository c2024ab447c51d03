//! Goal-seeking collaborators.

use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_2;

use fieldnav_kinematics::{Pose, VelocityCommand};
use tracing::{debug, info};

/// A source of goal-directed velocity.
///
/// The controller calls [`select_target`](GoalVelocity::select_target) only
/// while the robot is being held still, and asks for a velocity only when
/// [`target_exists`](GoalVelocity::target_exists) is true.
pub trait GoalVelocity {
    fn target_exists(&self) -> bool;

    /// Designate a new subtarget if none is active.
    fn select_target(&mut self, pose: &Pose);

    /// Velocity steering from `pose` toward the active subtarget.
    fn velocity_to_next_subtarget(&mut self, pose: &Pose) -> VelocityCommand;
}

/// Stand-in collaborator for pure-avoidance operation. Never has a target.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGoal;

impl GoalVelocity for NoGoal {
    fn target_exists(&self) -> bool {
        false
    }

    fn select_target(&mut self, _pose: &Pose) {}

    fn velocity_to_next_subtarget(&mut self, _pose: &Pose) -> VelocityCommand {
        VelocityCommand::ZERO
    }
}

/// Gains and limits for [`WaypointNavigator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringGains {
    /// Proportional gain on distance to the subtarget.
    pub kp_linear: f64,
    /// Proportional gain on bearing error.
    pub kp_angular: f64,
    pub max_linear: f64,
    pub max_angular: f64,
    /// Distance (m) at which a subtarget counts as reached.
    pub tolerance: f64,
}

impl Default for SteeringGains {
    fn default() -> Self {
        SteeringGains {
            kp_linear: 0.5,
            kp_angular: 1.0,
            max_linear: 0.3,
            max_angular: 0.3,
            tolerance: 0.2,
        }
    }
}

/// Visits a fixed list of waypoints in order, one subtarget at a time.
#[derive(Debug, Clone)]
pub struct WaypointNavigator {
    pending: VecDeque<(f64, f64)>,
    active: Option<(f64, f64)>,
    gains: SteeringGains,
    repeat: bool,
    visited: Vec<(f64, f64)>,
}

impl WaypointNavigator {
    pub fn new(waypoints: impl IntoIterator<Item = (f64, f64)>, gains: SteeringGains) -> Self {
        WaypointNavigator {
            pending: waypoints.into_iter().collect(),
            active: None,
            gains,
            repeat: false,
            visited: Vec::new(),
        }
    }

    /// Start over from the first waypoint once the list is exhausted.
    pub fn repeating(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn active_target(&self) -> Option<(f64, f64)> {
        self.active
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl GoalVelocity for WaypointNavigator {
    fn target_exists(&self) -> bool {
        self.active.is_some()
    }

    fn select_target(&mut self, pose: &Pose) {
        if self.active.is_some() {
            return;
        }
        if self.pending.is_empty() && self.repeat {
            self.pending.extend(self.visited.drain(..));
        }
        self.active = self.pending.pop_front();
        match self.active {
            Some((x, y)) => info!(x, y, from = %pose, "Selected subtarget"),
            None => debug!("No waypoints left to select"),
        }
    }

    fn velocity_to_next_subtarget(&mut self, pose: &Pose) -> VelocityCommand {
        let Some((tx, ty)) = self.active else {
            return VelocityCommand::ZERO;
        };

        let dx = tx - pose.x;
        let dy = ty - pose.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < self.gains.tolerance {
            info!(x = tx, y = ty, "Subtarget reached");
            self.visited.push((tx, ty));
            self.active = None;
            return VelocityCommand::ZERO;
        }

        let bearing_error = Pose::normalize_angle(dy.atan2(dx) - pose.theta);
        let mut linear = (self.gains.kp_linear * distance).clamp(0.0, self.gains.max_linear);
        let angular = (self.gains.kp_angular * bearing_error)
            .clamp(-self.gains.max_angular, self.gains.max_angular);

        // turn in place while the subtarget is behind
        if bearing_error.abs() > FRAC_PI_2 {
            linear = 0.0;
        }

        VelocityCommand::new(linear, angular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_no_goal_never_has_target() {
        let mut goal = NoGoal;
        goal.select_target(&Pose::default());
        assert!(!goal.target_exists());
    }

    #[test]
    fn test_select_target_takes_next_waypoint() {
        let mut nav = WaypointNavigator::new([(1.0, 0.0), (2.0, 0.0)], SteeringGains::default());
        assert!(!nav.target_exists());
        nav.select_target(&Pose::default());
        assert_eq!(nav.active_target(), Some((1.0, 0.0)));
        // selecting again keeps the active target
        nav.select_target(&Pose::default());
        assert_eq!(nav.active_target(), Some((1.0, 0.0)));
        assert_eq!(nav.remaining(), 1);
    }

    #[test]
    fn test_velocity_points_at_target() {
        let mut nav = WaypointNavigator::new([(2.0, 0.0)], SteeringGains::default());
        nav.select_target(&Pose::default());
        let cmd = nav.velocity_to_next_subtarget(&Pose::default());
        assert!((cmd.linear - 0.3).abs() < EPSILON);
        assert!(cmd.angular.abs() < EPSILON);

        let cmd = nav.velocity_to_next_subtarget(&Pose::new(0.0, 0.0, 0.1));
        assert!((cmd.angular - (-0.1)).abs() < EPSILON);
    }

    #[test]
    fn test_target_behind_turns_in_place() {
        let mut nav = WaypointNavigator::new([(-2.0, 0.1)], SteeringGains::default());
        nav.select_target(&Pose::default());
        let cmd = nav.velocity_to_next_subtarget(&Pose::default());
        assert_eq!(cmd.linear, 0.0);
        assert!((cmd.angular - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_reaching_target_clears_it() {
        let mut nav = WaypointNavigator::new([(1.0, 1.0)], SteeringGains::default());
        nav.select_target(&Pose::default());
        let cmd = nav.velocity_to_next_subtarget(&Pose::new(1.05, 1.0, PI));
        assert_eq!(cmd, VelocityCommand::ZERO);
        assert!(!nav.target_exists());
        nav.select_target(&Pose::default());
        assert!(!nav.target_exists());
    }

    #[test]
    fn test_repeating_navigator_cycles() {
        let mut nav = WaypointNavigator::new([(1.0, 0.0)], SteeringGains::default()).repeating(true);
        nav.select_target(&Pose::default());
        nav.velocity_to_next_subtarget(&Pose::new(1.0, 0.0, 0.0));
        assert!(!nav.target_exists());
        nav.select_target(&Pose::default());
        assert_eq!(nav.active_target(), Some((1.0, 0.0)));
    }
}
