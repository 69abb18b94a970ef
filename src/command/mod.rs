//! Command-based control
//!
//! A [`Command`] claims one or more subsystems while it runs. The [`CommandScheduler`] owns every
//! registered command, polls [`Trigger`] bindings once per tick, and falls back to each
//! subsystem's default command whenever nothing else claims it.
//!
//! Commands are generic over a context `C` that owns the subsystems. The scheduler passes
//! `&mut C` into every command callback, so no command holds a reference to a subsystem.

pub mod commands;
pub mod scheduler;
pub mod trigger;

use std::fmt;

pub use commands::FunctionalCommand;
pub use scheduler::{CommandScheduler, SchedulerError};
pub use trigger::Trigger;

/// Names a subsystem in command requirements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubsystemId(pub &'static str);

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Handle to a command registered with a [`CommandScheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Context the scheduler ticks before running commands.
pub trait Periodic {
    /// `enabled` is false while the robot is disabled; no actuator may move then.
    fn periodic(&mut self, enabled: bool);
}

pub trait Command<C>: Send {
    fn name(&self) -> &str;

    /// Subsystems this command claims exclusively while scheduled.
    fn requirements(&self) -> &[SubsystemId];

    /// Called once when the command is scheduled.
    fn initialize(&mut self, _ctx: &mut C) {}

    /// Called every tick while scheduled.
    fn execute(&mut self, _ctx: &mut C) {}

    /// Called once when the command finishes or is interrupted.
    fn end(&mut self, _ctx: &mut C, _interrupted: bool) {}

    fn is_finished(&mut self, _ctx: &C) -> bool {
        false
    }

    /// Whether the command may be scheduled and keep running while the robot is disabled.
    fn runs_when_disabled(&self) -> bool {
        false
    }
}

impl<C> fmt::Debug for dyn Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name())
            .field("requirements", &self.requirements())
            .finish()
    }
}
