//! Robot configuration loaded from `robot.toml`
//!
//! Every section falls back to its defaults, so a partial file (or none at all) still yields a
//! usable configuration. On first start a default file is written to the platform config
//! directory so the values can be tuned without recompiling.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_DIR: &str = "reefbot";
const CONFIG_FILE: &str = "robot.toml";
const CONFIG_ENV: &str = "REEFBOT_CONFIG";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub controller: ControllerConfig,
    pub drive: DriveConfig,
    pub elevator: ElevatorConfig,
    pub coral_algae: CoralAlgaeConfig,
    pub autonomous: AutonomousConfig,
    pub timeline: TimelineConfig,
}

/// Gamepad ports and input sampling.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub driver_port: usize,
    pub operator_port: usize,
    /// How often the processor publishes a fresh snapshot per port
    pub poll_interval_ms: u64,
    /// Analog trigger travel that counts as "pressed"
    pub trigger_threshold: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            driver_port: 0,
            operator_port: 1,
            poll_interval_ms: 10,
            trigger_threshold: 0.5,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    /// Top translational speed at 12 V, in m/s
    pub speed_at_12_volts: f64,
    /// Top angular rate in rotations per second
    pub max_angular_rotations_per_sec: f64,
    /// Translation dead-band as a fraction of the top speed
    pub translation_deadband: f64,
    /// Rotation dead-band as a fraction of the top angular rate
    pub rotational_deadband: f64,
    /// Robot-centric speed used by the POV nudge bindings, in m/s
    pub nudge_speed: f64,
    pub sysid: SysIdConfig,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            speed_at_12_volts: 4.73,
            max_angular_rotations_per_sec: 0.75,
            translation_deadband: 0.2,
            rotational_deadband: 0.1,
            nudge_speed: 0.5,
            sysid: SysIdConfig::default(),
        }
    }
}

/// Voltage sweep used by the characterization routines.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SysIdConfig {
    /// Quasistatic ramp rate in volts per second
    pub ramp_rate: f64,
    /// Dynamic step voltage
    pub step_voltage: f64,
    pub timeout_secs: f64,
}

impl Default for SysIdConfig {
    fn default() -> Self {
        Self {
            ramp_rate: 1.0,
            step_voltage: 7.0,
            timeout_secs: 10.0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ElevatorConfig {
    pub min_position: f64,
    pub max_position: f64,
    pub manual_control_deadband: f64,
    /// Carriage speed at full output, position units per second
    pub max_speed: f64,
    pub kp: f64,
}

impl Default for ElevatorConfig {
    fn default() -> Self {
        Self {
            min_position: 0.0,
            max_position: 1.2,
            manual_control_deadband: 0.1,
            max_speed: 1.0,
            kp: 4.0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CoralAlgaeConfig {
    /// Pivot angles in degrees
    pub pivot_min_angle: f64,
    pub pivot_max_angle: f64,
    pub manual_control_deadband: f64,
    /// Pivot speed at full output, degrees per second
    pub pivot_max_speed: f64,
    pub pivot_kp: f64,
    /// Roller outputs per intake mode, in [-1, 1]
    pub coral_intake_speed: f64,
    pub algae_intake_speed: f64,
}

impl Default for CoralAlgaeConfig {
    fn default() -> Self {
        Self {
            pivot_min_angle: 0.0,
            pivot_max_angle: 90.0,
            manual_control_deadband: 0.1,
            pivot_max_speed: 180.0,
            pivot_kp: 0.05,
            coral_intake_speed: 0.6,
            algae_intake_speed: -0.6,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AutonomousConfig {
    /// Routine the chooser starts on
    pub default_routine: String,
    /// Routine picked on the dashboard before the match, if any
    pub selected: Option<String>,
    pub routines: Vec<AutoRoutineConfig>,
}

impl Default for AutonomousConfig {
    fn default() -> Self {
        Self {
            default_routine: "Example Auto".to_string(),
            selected: None,
            routines: vec![AutoRoutineConfig {
                name: "Example Auto".to_string(),
                segments: vec![DriveSegment {
                    velocity_x: 1.0,
                    velocity_y: 0.0,
                    rotational_rate: 0.0,
                    seconds: 2.0,
                }],
            }],
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AutoRoutineConfig {
    pub name: String,
    #[serde(default)]
    pub segments: Vec<DriveSegment>,
}

/// One robot-centric drive leg of an autonomous routine.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DriveSegment {
    #[serde(default)]
    pub velocity_x: f64,
    #[serde(default)]
    pub velocity_y: f64,
    #[serde(default)]
    pub rotational_rate: f64,
    pub seconds: f64,
}

/// Match phases the robot loop steps through.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TimelineConfig {
    pub period_ms: u64,
    pub disabled_secs: f64,
    pub autonomous_secs: f64,
    pub teleop_secs: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            disabled_secs: 3.0,
            autonomous_secs: 15.0,
            teleop_secs: 135.0,
        }
    }
}

impl RobotConfig {
    /// `$REEFBOT_CONFIG` if set, else `<config dir>/reefbot/robot.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir().ok_or_else(|| eyre!("No config directory available"))?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Writes the default configuration if nothing exists at `path` yet.
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            debug!("Config file present at {}", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(&RobotConfig::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write default config file: {}", e))?;

        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config: RobotConfig = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
        config
            .validate()
            .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Rejects durations that are negative, not finite, or too long to represent.
    pub fn validate(&self) -> Result<()> {
        let timeline = &self.timeline;
        let phases = [
            checked_duration("timeline.disabled_secs", timeline.disabled_secs)?,
            checked_duration("timeline.autonomous_secs", timeline.autonomous_secs)?,
            checked_duration("timeline.teleop_secs", timeline.teleop_secs)?,
        ];
        phases
            .iter()
            .try_fold(Duration::ZERO, |total, phase| total.checked_add(*phase))
            .ok_or_else(|| eyre!("Match timeline is too long"))?;

        checked_duration("drive.sysid.timeout_secs", self.drive.sysid.timeout_secs)?;
        for routine in &self.autonomous.routines {
            for segment in &routine.segments {
                checked_duration(&format!("segment of {}", routine.name), segment.seconds)?;
            }
        }
        Ok(())
    }
}

fn checked_duration(name: &str, secs: f64) -> Result<Duration> {
    if secs < 0.0 {
        return Err(eyre!("{} must not be negative, got {}", name, secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| eyre!("{} = {} is not a duration: {}", name, secs, e))
}

/// Seconds from configuration as a `Duration`. Negative and NaN become zero, anything too long
/// to represent saturates.
pub fn saturating_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
