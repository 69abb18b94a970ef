//! Autonomous routine selection
//!
//! Routines are defined in configuration as timed robot-centric drive legs and offered through
//! an [`AutoChooser`] that the [`Dashboard`] can change before the match starts.

pub mod chooser;
pub mod dashboard;

pub use chooser::AutoChooser;
pub use dashboard::Dashboard;

use std::time::Duration;
use tracing::warn;

use crate::command::commands::{none, run, sequence, with_timeout};
use crate::command::Command;
use crate::config::{saturating_duration, AutoRoutineConfig, AutonomousConfig};
use crate::subsystems::swerve::{RobotCentric, SwerveRequest};
use crate::subsystems::{Mechanisms, DRIVETRAIN};

pub const NO_AUTO: &str = "None";

/// Chooser holding the no-op routine plus every configured routine.
///
/// The configured default applies when it names a known routine, otherwise the default is
/// [`NO_AUTO`].
pub fn build_auto_chooser(config: &AutonomousConfig) -> AutoChooser<Mechanisms> {
    let mut chooser = AutoChooser::new();
    chooser.set_default_option(NO_AUTO, || Box::new(none::<Mechanisms>()));

    for routine in &config.routines {
        let routine = routine.clone();
        chooser.add_option(routine.name.clone(), move || routine_command(&routine));
    }

    if !chooser.set_default(&config.default_routine) {
        warn!(
            "Default auto {} is not defined, falling back to {}",
            config.default_routine, NO_AUTO
        );
    }
    chooser
}

fn routine_command(routine: &AutoRoutineConfig) -> Box<dyn Command<Mechanisms>> {
    let legs: Vec<Box<dyn Command<Mechanisms>>> = routine
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let request = SwerveRequest::RobotCentric(
                RobotCentric::default()
                    .with_velocity_x(segment.velocity_x)
                    .with_velocity_y(segment.velocity_y)
                    .with_rotational_rate(segment.rotational_rate),
            );
            let leg = run(
                format!("{} leg {}", routine.name, index + 1),
                &[DRIVETRAIN],
                move |mechanisms: &mut Mechanisms| mechanisms.drivetrain.set_control(request),
            )
            .on_end(|mechanisms: &mut Mechanisms, _| {
                mechanisms.drivetrain.set_control(SwerveRequest::Idle)
            });
            let timeout = saturating_duration(segment.seconds);
            Box::new(with_timeout(leg, timeout)) as Box<dyn Command<Mechanisms>>
        })
        .collect();

    Box::new(sequence(routine.name.clone(), legs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriveSegment, RobotConfig};

    fn mechanisms() -> Mechanisms {
        Mechanisms::new(&RobotConfig::default(), Duration::from_millis(20))
    }

    #[test]
    fn default_config_offers_example_auto() {
        let chooser = build_auto_chooser(&AutonomousConfig::default());
        assert_eq!(chooser.option_names(), vec!["None", "Example Auto"]);
        assert_eq!(chooser.selected_name().as_deref(), Some("Example Auto"));
    }

    #[test]
    fn missing_default_falls_back_to_none() {
        let config = AutonomousConfig {
            default_routine: "Three Piece".to_string(),
            selected: None,
            routines: Vec::new(),
        };
        let chooser = build_auto_chooser(&config);
        let mut command = chooser.selected().unwrap();

        let mut mechanisms = mechanisms();
        command.initialize(&mut mechanisms);
        assert_eq!(command.name(), NO_AUTO);
        assert!(command.is_finished(&mechanisms));
        assert!(command.runs_when_disabled());
    }

    #[test]
    fn routine_drives_robot_centric_then_idles() {
        let config = AutonomousConfig {
            default_routine: "Creep".to_string(),
            selected: None,
            routines: vec![AutoRoutineConfig {
                name: "Creep".to_string(),
                segments: vec![DriveSegment {
                    velocity_x: 0.5,
                    velocity_y: 0.0,
                    rotational_rate: 0.0,
                    seconds: 0.0,
                }],
            }],
        };
        let chooser = build_auto_chooser(&config);
        let mut command = chooser.selected().unwrap();
        assert_eq!(command.requirements(), &[DRIVETRAIN]);

        let mut mechanisms = mechanisms();
        command.initialize(&mut mechanisms);
        command.execute(&mut mechanisms);
        assert!(command.is_finished(&mechanisms));
        assert_eq!(mechanisms.drivetrain.request(), &SwerveRequest::Idle);
    }
}
