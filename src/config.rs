use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use fieldnav_avoidance::{
    ArbitrationController, AvoidanceError, ControlLoopConfig, FusionMode, LaserRepulsionField,
    MountingAngles, SonarMask, SonarRepulsionField, SteeringGains, WaypointNavigator,
};
use fieldnav_kinematics::Pose;
use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const OVERRIDE_PATH_VAR: &str = "FIELDNAV_CONFIG";

/// Startup configuration. Resolved once, immutable afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub control: ControlSettings,
    #[serde(default)]
    pub laser: LaserSettings,
    #[serde(default)]
    pub sonar: SonarSettings,
    #[serde(default)]
    pub navigation: NavigationSettings,
    #[serde(default)]
    pub sim: SimSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub period_ms: u64,
    /// Log every published command at INFO.
    pub print_velocities: bool,
    /// Goal-seeking when true, pure avoidance when false.
    pub calculate_target: bool,
    /// Name of the output channel.
    pub speeds_pub_topic: String,
    pub watchdog_timeout_ms: u64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        ControlSettings {
            period_ms: 110,
            print_velocities: false,
            calculate_target: false,
            speeds_pub_topic: "/robot0/cmd_vel".to_string(),
            watchdog_timeout_ms: 330,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LaserSettings {
    pub min_range: f64,
}

impl Default for LaserSettings {
    fn default() -> Self {
        LaserSettings { min_range: fieldnav_avoidance::laser::DEFAULT_LASER_FLOOR }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SonarSettings {
    /// Front, left, right, rear-left, rear-right.
    pub mask: [bool; 5],
    pub angles: [f64; 5],
    pub min_range: f64,
}

impl Default for SonarSettings {
    fn default() -> Self {
        SonarSettings {
            mask: [false, false, false, true, true],
            angles: *MountingAngles::default().as_array(),
            min_range: fieldnav_avoidance::sonar::DEFAULT_SONAR_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    pub waypoints: Vec<[f64; 2]>,
    pub repeat: bool,
    pub goal_tolerance: f64,
    pub kp_linear: f64,
    pub kp_angular: f64,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        let gains = SteeringGains::default();
        NavigationSettings {
            waypoints: Vec::new(),
            repeat: false,
            goal_tolerance: gains.tolerance,
            kp_linear: gains.kp_linear,
            kp_angular: gains.kp_angular,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    pub half_width: f64,
    pub half_height: f64,
    /// Round pillars as `[x, y, radius]`.
    pub obstacles: Vec<[f64; 3]>,
    pub laser_beams: usize,
    pub laser_fov: f64,
    pub laser_max_range: f64,
    pub sonar_max_range: f64,
    pub step_ms: u64,
    pub start_pose: Pose,
}

impl Default for SimSettings {
    fn default() -> Self {
        SimSettings {
            half_width: 4.0,
            half_height: 3.0,
            obstacles: Vec::new(),
            laser_beams: 667,
            laser_fov: 4.1888,
            laser_max_range: 5.6,
            sonar_max_range: 2.0,
            step_ms: 10,
            start_pose: Pose::default(),
        }
    }
}

impl Settings {
    pub fn mode(&self) -> FusionMode {
        FusionMode::from_calculate_target(self.control.calculate_target)
    }

    /// Build the controller, rejecting a bad mask, angle set or floor.
    pub fn build_controller(&self) -> Result<ArbitrationController, AvoidanceError> {
        let laser = LaserRepulsionField::new(self.laser.min_range)?;
        let mask = SonarMask::new(self.sonar.mask)?;
        let sonar = SonarRepulsionField::new(mask, self.sonar.min_range)?;
        Ok(ArbitrationController::new(self.mode(), laser, sonar))
    }

    pub fn mounting_angles(&self) -> Result<MountingAngles, AvoidanceError> {
        MountingAngles::new(self.sonar.angles)
    }

    pub fn loop_config(&self) -> Result<ControlLoopConfig, AvoidanceError> {
        ControlLoopConfig::new(Duration::from_millis(self.control.period_ms), self.control.print_velocities)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.control.watchdog_timeout_ms.max(1))
    }

    pub fn navigator(&self) -> WaypointNavigator {
        let gains = SteeringGains {
            kp_linear: self.navigation.kp_linear,
            kp_angular: self.navigation.kp_angular,
            tolerance: self.navigation.goal_tolerance,
            ..SteeringGains::default()
        };
        WaypointNavigator::new(self.navigation.waypoints.iter().map(|[x, y]| (*x, *y)), gains)
            .repeating(self.navigation.repeat)
    }

    /// Run every startup check without keeping the results.
    pub fn validate(&self) -> Result<(), AvoidanceError> {
        self.build_controller()?;
        self.mounting_angles()?;
        self.loop_config()?;
        Ok(())
    }
}

fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Settings, ConfigError> {
    builder
        .add_source(Environment::with_prefix("FIELDNAV").separator("__").try_parsing(true))
        .build()?
        .try_deserialize()
}

/// Load `config/default.toml`, an optional override file named by
/// `FIELDNAV_CONFIG`, then `FIELDNAV__*` environment variables.
pub fn load_settings() -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let mut builder =
        Config::builder().add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true));
    if let Ok(path) = std::env::var(OVERRIDE_PATH_VAR) {
        info!(%path, "Adding configuration override");
        builder = builder.add_source(File::new(&path, FileFormat::Toml).required(true));
    }

    match build(builder) {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
