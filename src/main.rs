mod blackboard; // shared world state
mod bus; // named broadcast topics
mod config; // startup settings
mod sim; // simulated room, drive and sensors

use std::time::{Duration, Instant};

use anyhow::Context;
use blackboard::{Blackboard, clear_fault, raise_fault, snapshot};
use bus::Topic;
use fieldnav_avoidance::{
    ArbitrationController, ControlLoopConfig, FusionMode, GoalVelocity, HaltSwitch, NoGoal,
    SPEED_LIMIT, run_control_task,
};
use fieldnav_kinematics::TwistMsg;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

const CMD_TIMEOUT_FAULT: &str = "cmd_vel timeout";
const SENSOR_TIMEOUT_FAULT: &str = "sensor timeout";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("fieldnav starting.");

    let settings = config::load_settings().context("loading configuration")?;
    settings.validate().context("validating configuration")?;
    let controller = settings.build_controller()?;
    let loop_config = settings.loop_config()?;
    let halt = controller.halt_switch();

    let bb: Blackboard = Blackboard::default();
    let cmd_topic: Topic<TwistMsg> = Topic::new(&settings.control.speeds_pub_topic, 16);
    info!(topic = cmd_topic.name(), mode = ?controller.mode(), "Publishing velocity commands");

    sim::spawn(&bb, &cmd_topic, &settings.sim, settings.mounting_angles()?, SPEED_LIMIT)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let control = match controller.mode() {
        FusionMode::GoalSeeking => {
            spawn_control(controller, &bb, settings.navigator(), &cmd_topic, loop_config, stop_rx)
        }
        FusionMode::PureAvoidance => {
            spawn_control(controller, &bb, NoGoal, &cmd_topic, loop_config, stop_rx)
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for ctrl-c")?;
            info!("Interrupt received, shutting down.");
        }
        result = watchdog(bb.clone(), halt, settings.watchdog_timeout()) => {
            if let Err(e) = &result {
                error!("Watchdog failed: {:?}", e);
            }
            result?;
        }
    }

    let _ = stop_tx.send(true);
    let controller = control.await.context("joining control task")?;
    info!(
        state = ?controller.state(),
        awaiting_target = controller.awaiting_target(),
        faults = ?snapshot(&bb).faults,
        "fieldnav stopped."
    );
    Ok(())
}

fn spawn_control<G>(
    controller: ArbitrationController,
    bb: &Blackboard,
    goal: G,
    cmd_topic: &Topic<TwistMsg>,
    loop_config: ControlLoopConfig,
    stop_rx: watch::Receiver<bool>,
) -> JoinHandle<ArbitrationController>
where
    G: GoalVelocity + Send + 'static,
{
    let bb = bb.clone();
    let source = move || blackboard::sensor_snapshot(&bb);
    tokio::spawn(run_control_task(controller, source, goal, cmd_topic.clone(), loop_config, stop_rx))
}

/// Halts the controller while sensor data is stale and flags commands that
/// stop reaching the actuator.
async fn watchdog(bb: Blackboard, halt: HaltSwitch, timeout: Duration) -> anyhow::Result<()> {
    info!(?timeout, "Watchdog task started.");
    let mut tick = tokio::time::interval(timeout / 4);
    loop {
        tick.tick().await;
        check_freshness(&bb, &halt, timeout, Instant::now());
    }
}

/// One watchdog pass over the blackboard timestamps as seen at `now`.
fn check_freshness(bb: &Blackboard, halt: &HaltSwitch, timeout: Duration, now: Instant) {
    let state = snapshot(bb);

    let cmd_age = now.saturating_duration_since(state.last_cmd_ts);
    if cmd_age > timeout {
        warn!(?cmd_age, "Command velocity timeout!");
        raise_fault(bb, CMD_TIMEOUT_FAULT);
    } else {
        clear_fault(bb, CMD_TIMEOUT_FAULT);
    }

    let sensor_age = now.saturating_duration_since(state.last_sensor_ts);
    if sensor_age > timeout {
        if !halt.is_stopped() {
            warn!(?sensor_age, "Sensor data stale, halting robot.");
            halt.stop();
        }
        raise_fault(bb, SENSOR_TIMEOUT_FAULT);
    } else {
        if halt.is_stopped() {
            info!("Sensor data fresh again, resuming.");
            halt.resume();
        }
        clear_fault(bb, SENSOR_TIMEOUT_FAULT);
    }
}
