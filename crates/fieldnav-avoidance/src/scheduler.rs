//! Fixed-rate control task driving the controller from sensor snapshots.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::controller::{ArbitrationController, CommandSink};
use crate::error::AvoidanceError;
use crate::frames::SnapshotSource;
use crate::goal::GoalVelocity;

/// Default control period, about 9 Hz.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(110);

/// Timing and logging options for [`run_control_task`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLoopConfig {
    period: Duration,
    print_velocities: bool,
}

impl ControlLoopConfig {
    /// # Errors
    ///
    /// Returns `Err(AvoidanceError::InvalidPeriod)` if `period` is zero.
    pub fn new(period: Duration, print_velocities: bool) -> Result<Self, AvoidanceError> {
        if period.is_zero() {
            return Err(AvoidanceError::InvalidPeriod("must be greater than zero"));
        }
        Ok(ControlLoopConfig { period, print_velocities })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        ControlLoopConfig { period: DEFAULT_PERIOD, print_velocities: false }
    }
}

/// Fixed-rate control task.
///
/// Every period takes one snapshot from `source`, runs one controller tick
/// and sends the result to `sink` without waiting on it. Ticks that fall
/// behind are skipped rather than queued. Returns when `shutdown` flips to
/// `true` or its sender is dropped.
///
/// # Arguments
/// * `controller` - The arbitration controller, owned by the task.
/// * `source` - Provider of per-tick sensor snapshots.
/// * `goal` - Goal-seeking collaborator.
/// * `sink` - Output channel for velocity commands.
/// * `config` - Period and verbose logging.
/// * `shutdown` - Stop signal.
pub async fn run_control_task<S, G, K>(
    mut controller: ArbitrationController,
    source: S,
    mut goal: G,
    sink: K,
    config: ControlLoopConfig,
    mut shutdown: watch::Receiver<bool>,
) -> ArbitrationController
where
    S: SnapshotSource,
    G: GoalVelocity,
    K: CommandSink,
{
    info!(period = ?config.period, mode = ?controller.mode(), "Control task started.");
    let mut ticker = time::interval(config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = source.snapshot();
                let cmd = controller.tick(&snapshot, &mut goal, &sink);
                sink.send(cmd);

                if config.print_velocities {
                    info!(linear = cmd.linear, angular = cmd.angular, "[L,R] = [{} , {}]", cmd.linear, cmd.angular);
                } else {
                    debug!(linear = cmd.linear, angular = cmd.angular, state = ?controller.state(), "Published command");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Control task stopping.");
                    return controller;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use fieldnav_kinematics::{Pose, VelocityCommand};

    use crate::controller::{ControllerState, FusionMode};
    use crate::frames::SensorSnapshot;
    use crate::goal::NoGoal;
    use crate::laser::LaserRepulsionField;
    use crate::sonar::SonarRepulsionField;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<VelocityCommand>>>);

    impl CommandSink for SharedSink {
        fn send(&self, cmd: VelocityCommand) {
            self.0.lock().unwrap().push(cmd);
        }
    }

    fn controller() -> ArbitrationController {
        ArbitrationController::new(
            FusionMode::PureAvoidance,
            LaserRepulsionField::default(),
            SonarRepulsionField::default(),
        )
    }

    #[test]
    fn test_zero_period_is_rejected() {
        assert!(matches!(
            ControlLoopConfig::new(Duration::ZERO, false),
            Err(AvoidanceError::InvalidPeriod(_))
        ));
        assert_eq!(ControlLoopConfig::default().period(), Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_once_per_period() {
        let sink = SharedSink::default();
        let (stop_tx, stop_rx) = watch::channel(false);
        let source = || SensorSnapshot::default();
        let task = tokio::spawn(run_control_task(
            controller(),
            source,
            NoGoal,
            sink.clone(),
            ControlLoopConfig::new(DEFAULT_PERIOD, true).unwrap(),
            stop_rx,
        ));

        // ticks at 0, 110, ..., 990 ms
        time::sleep(Duration::from_millis(1045)).await;
        stop_tx.send(true).unwrap();
        let controller = task.await.unwrap();

        let sent = sink.0.lock().unwrap().clone();
        assert_eq!(sent.len(), 10);
        assert!(sent.iter().all(|c| *c == VelocityCommand::new(0.0, 0.3)));
        assert_eq!(controller.state(), ControllerState::InitialTurn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_fresh_snapshot_each_tick() {
        let sink = SharedSink::default();
        let heading = Arc::new(Mutex::new(0.0_f64));
        let source = {
            let heading = Arc::clone(&heading);
            move || SensorSnapshot {
                pose: Pose::new(0.0, 0.0, *heading.lock().unwrap()),
                ..SensorSnapshot::default()
            }
        };
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_control_task(
            controller(),
            source,
            NoGoal,
            sink.clone(),
            ControlLoopConfig::default(),
            stop_rx,
        ));

        time::sleep(Duration::from_millis(50)).await;
        *heading.lock().unwrap() = 6.0;
        time::sleep(Duration::from_millis(110)).await;
        drop(stop_tx);
        let controller = task.await.unwrap();

        let sent = sink.0.lock().unwrap().clone();
        assert_eq!(sent, vec![VelocityCommand::new(0.0, 0.3), VelocityCommand::new(0.3, 0.0)]);
        assert_eq!(controller.state(), ControllerState::Normal);
    }
}
