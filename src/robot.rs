//! Periodic robot loop stepping through the match phases.

use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{saturating_duration, TimelineConfig};
use crate::container::RobotContainer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RobotMode {
    Disabled,
    Autonomous,
    Teleop,
}

impl fmt::Display for RobotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RobotMode::Disabled => "disabled",
            RobotMode::Autonomous => "autonomous",
            RobotMode::Teleop => "teleop",
        };
        f.write_str(name)
    }
}

/// Phase lengths: disabled, then autonomous, then teleop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchTimeline {
    disabled: Duration,
    autonomous: Duration,
    teleop: Duration,
}

impl MatchTimeline {
    pub fn new(disabled: Duration, autonomous: Duration, teleop: Duration) -> Self {
        Self {
            disabled,
            autonomous,
            teleop,
        }
    }

    pub fn from_config(config: &TimelineConfig) -> Self {
        Self::new(
            saturating_duration(config.disabled_secs),
            saturating_duration(config.autonomous_secs),
            saturating_duration(config.teleop_secs),
        )
    }

    pub fn total(&self) -> Duration {
        self.disabled
            .saturating_add(self.autonomous)
            .saturating_add(self.teleop)
    }

    /// Phase at `elapsed` since start, `None` once the match is over.
    pub fn mode_at(&self, elapsed: Duration) -> Option<RobotMode> {
        if elapsed < self.disabled {
            Some(RobotMode::Disabled)
        } else if elapsed < self.disabled.saturating_add(self.autonomous) {
            Some(RobotMode::Autonomous)
        } else if elapsed < self.total() {
            Some(RobotMode::Teleop)
        } else {
            None
        }
    }
}

pub struct Robot {
    container: RobotContainer,
    timeline: MatchTimeline,
    mode: Option<RobotMode>,
}

impl Robot {
    pub fn new(container: RobotContainer, timeline: MatchTimeline) -> Self {
        Self {
            container,
            timeline,
            mode: None,
        }
    }

    pub fn mode(&self) -> Option<RobotMode> {
        self.mode
    }

    pub fn container(&self) -> &RobotContainer {
        &self.container
    }

    /// One loop iteration at `elapsed` into the match. Returns false once the match is over.
    pub fn step(&mut self, elapsed: Duration) -> bool {
        let Some(mode) = self.timeline.mode_at(elapsed) else {
            self.enter(RobotMode::Disabled);
            return false;
        };
        self.enter(mode);
        self.container.run();
        true
    }

    fn enter(&mut self, mode: RobotMode) {
        if self.mode == Some(mode) {
            return;
        }
        info!(
            "Robot {} -> {}",
            self.mode.map(|mode| mode.to_string()).unwrap_or_else(|| "off".to_string()),
            mode
        );

        match mode {
            RobotMode::Disabled => self.container.set_enabled(false),
            RobotMode::Autonomous => {
                self.container.set_enabled(true);
                if let Err(e) = self.container.start_autonomous() {
                    error!("Failed to start autonomous: {}", e);
                }
            }
            RobotMode::Teleop => {
                self.container.stop_autonomous();
                self.container.set_enabled(true);
            }
        }
        self.mode = Some(mode);
    }

    /// Ticks every `period` until the match is over or `shutdown` is cancelled, then disables.
    pub async fn run(&mut self, period: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started = Instant::now();
        info!(
            "Robot loop running every {} ms for {:.1} s",
            period.as_millis(),
            self.timeline.total().as_secs_f64()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Robot loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if !self.step(started.elapsed()) {
                        info!("Match over");
                        break;
                    }
                }
            }
        }

        self.enter(RobotMode::Disabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotConfig;
    use crate::controller::{ControllerState, XboxController};
    use crate::subsystems::DRIVETRAIN;
    use tokio::sync::watch;

    const PERIOD: Duration = Duration::from_millis(10);

    fn timeline() -> MatchTimeline {
        MatchTimeline::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3),
        )
    }

    fn robot() -> Robot {
        let (_, driver) = watch::channel(ControllerState::default());
        let (_, operator) = watch::channel(ControllerState::default());
        let container = RobotContainer::new(
            &RobotConfig::default(),
            XboxController::new(0, driver, 0.5),
            XboxController::new(1, operator, 0.5),
            PERIOD,
        )
        .unwrap();
        Robot::new(container, timeline())
    }

    fn drive_command(robot: &Robot) -> Option<String> {
        let scheduler = robot.container().scheduler();
        scheduler
            .requiring(DRIVETRAIN)
            .and_then(|id| scheduler.command_name(id))
            .map(str::to_string)
    }

    #[test]
    fn timeline_phases() {
        let timeline = timeline();
        assert_eq!(timeline.mode_at(Duration::ZERO), Some(RobotMode::Disabled));
        assert_eq!(timeline.mode_at(Duration::from_secs(1)), Some(RobotMode::Autonomous));
        assert_eq!(timeline.mode_at(Duration::from_millis(2999)), Some(RobotMode::Autonomous));
        assert_eq!(timeline.mode_at(Duration::from_secs(3)), Some(RobotMode::Teleop));
        assert_eq!(timeline.mode_at(Duration::from_secs(6)), None);
    }

    #[test]
    fn timeline_from_default_config() {
        let timeline = MatchTimeline::from_config(&TimelineConfig::default());
        assert_eq!(timeline.total(), Duration::from_secs(153));
        assert_eq!(timeline.mode_at(Duration::from_secs(10)), Some(RobotMode::Autonomous));
    }

    #[test]
    fn unbounded_teleop_saturates() {
        let config: TimelineConfig = toml::from_str("teleop_secs = inf").unwrap();
        let timeline = MatchTimeline::from_config(&config);

        assert_eq!(timeline.total(), Duration::MAX);
        assert_eq!(
            timeline.mode_at(Duration::from_secs(1_000_000)),
            Some(RobotMode::Teleop)
        );
    }

    #[test]
    fn autonomous_runs_only_during_autonomous() {
        let mut robot = robot();

        assert!(robot.step(Duration::ZERO));
        assert_eq!(robot.mode(), Some(RobotMode::Disabled));
        assert_eq!(drive_command(&robot), None);

        assert!(robot.step(Duration::from_millis(1500)));
        assert_eq!(robot.mode(), Some(RobotMode::Autonomous));
        assert_eq!(drive_command(&robot).as_deref(), Some("Example Auto"));

        assert!(robot.step(Duration::from_millis(3500)));
        assert_eq!(robot.mode(), Some(RobotMode::Teleop));
        assert_eq!(drive_command(&robot).as_deref(), Some("Field Centric Drive"));

        assert!(!robot.step(Duration::from_secs(7)));
        assert_eq!(robot.mode(), Some(RobotMode::Disabled));
        assert!(!robot.container().scheduler().is_enabled());
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let mut robot = robot();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        robot.run(PERIOD, shutdown).await;
        assert_eq!(robot.mode(), Some(RobotMode::Disabled));
    }

    #[tokio::test]
    async fn run_stops_at_end_of_match() {
        let mut robot = robot();
        robot.timeline = MatchTimeline::new(
            Duration::ZERO,
            Duration::from_millis(30),
            Duration::from_millis(30),
        );

        robot.run(PERIOD, CancellationToken::new()).await;
        assert_eq!(robot.mode(), Some(RobotMode::Disabled));
        assert!(!robot.container().scheduler().is_enabled());
    }
}
