use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{Command, CommandId, Periodic, SubsystemId, Trigger};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Subsystem {0} is not registered")]
    SubsystemNotRegistered(SubsystemId),

    #[error("Default command {command} must require subsystem {subsystem}")]
    MissingRequirement {
        command: String,
        subsystem: SubsystemId,
    },

    #[error("Unknown command {0}")]
    UnknownCommand(CommandId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    /// Schedule on the rising edge
    OnTrue,
    /// Schedule on the falling edge
    OnFalse,
    /// Schedule on the rising edge, cancel on the falling edge
    WhileTrue,
}

struct Binding {
    trigger: Trigger,
    kind: BindingKind,
    command: CommandId,
    previous: bool,
}

enum BindingAction {
    Schedule(CommandId),
    Cancel(CommandId),
}

/// Runs commands against a context `C` once per tick.
///
/// Owns every registered command. A subsystem is claimed by at most one scheduled command;
/// scheduling a command interrupts whatever currently holds any of its requirements.
pub struct CommandScheduler<C> {
    commands: HashMap<CommandId, Box<dyn Command<C>>>,
    next_id: u64,
    subsystems: Vec<SubsystemId>,
    default_commands: HashMap<SubsystemId, CommandId>,
    scheduled: Vec<CommandId>,
    claims: HashMap<SubsystemId, CommandId>,
    bindings: Vec<Binding>,
    enabled: bool,
}

impl<C: Periodic> Default for CommandScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Periodic> CommandScheduler<C> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            next_id: 0,
            subsystems: Vec::new(),
            default_commands: HashMap::new(),
            scheduled: Vec::new(),
            claims: HashMap::new(),
            bindings: Vec::new(),
            enabled: false,
        }
    }

    pub fn register_subsystem(&mut self, subsystem: SubsystemId) {
        if !self.subsystems.contains(&subsystem) {
            debug!("Registered subsystem {}", subsystem);
            self.subsystems.push(subsystem);
        }
    }

    /// Takes ownership of `command` so it can be scheduled by id.
    pub fn register(&mut self, command: impl Command<C> + 'static) -> CommandId {
        self.register_boxed(Box::new(command))
    }

    pub fn register_boxed(&mut self, command: Box<dyn Command<C>>) -> CommandId {
        let id = CommandId(self.next_id);
        self.next_id += 1;
        debug!("Registered command {} {}", command.name(), id);
        self.commands.insert(id, command);
        id
    }

    /// Removes a command, interrupting it first if it is running.
    pub fn unregister(&mut self, ctx: &mut C, id: CommandId) -> Option<Box<dyn Command<C>>> {
        self.cancel(ctx, id);
        self.bindings.retain(|binding| binding.command != id);
        self.default_commands.retain(|_, command| *command != id);
        self.commands.remove(&id)
    }

    pub fn set_default_command(
        &mut self,
        subsystem: SubsystemId,
        command: impl Command<C> + 'static,
    ) -> Result<CommandId, SchedulerError> {
        if !self.subsystems.contains(&subsystem) {
            return Err(SchedulerError::SubsystemNotRegistered(subsystem));
        }
        if !command.requirements().contains(&subsystem) {
            return Err(SchedulerError::MissingRequirement {
                command: command.name().to_string(),
                subsystem,
            });
        }
        for requirement in command.requirements() {
            if !self.subsystems.contains(requirement) {
                return Err(SchedulerError::SubsystemNotRegistered(*requirement));
            }
        }

        info!("Default command for {} is {}", subsystem, command.name());
        let id = self.register(command);
        self.default_commands.insert(subsystem, id);
        Ok(id)
    }

    pub fn default_command(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.default_commands.get(&subsystem).copied()
    }

    pub fn on_true(&mut self, trigger: Trigger, command: impl Command<C> + 'static) -> CommandId {
        self.bind(trigger, BindingKind::OnTrue, command)
    }

    pub fn on_false(&mut self, trigger: Trigger, command: impl Command<C> + 'static) -> CommandId {
        self.bind(trigger, BindingKind::OnFalse, command)
    }

    pub fn while_true(&mut self, trigger: Trigger, command: impl Command<C> + 'static) -> CommandId {
        self.bind(trigger, BindingKind::WhileTrue, command)
    }

    // The edge baseline is the trigger's value at bind time, so a button held during
    // startup does not fire.
    fn bind(&mut self, trigger: Trigger, kind: BindingKind, command: impl Command<C> + 'static) -> CommandId {
        let id = self.register(command);
        let previous = trigger.get();
        self.bindings.push(Binding {
            trigger,
            kind,
            command: id,
            previous,
        });
        id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling cancels every running command that may not run while disabled.
    pub fn set_enabled(&mut self, ctx: &mut C, enabled: bool) {
        if self.enabled != enabled {
            info!("Scheduler {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        if !enabled {
            self.cancel_disabled_incompatible(ctx);
        }
    }

    /// Returns `Ok(true)` if the command was newly scheduled.
    pub fn schedule(&mut self, ctx: &mut C, id: CommandId) -> Result<bool, SchedulerError> {
        if self.scheduled.contains(&id) {
            return Ok(false);
        }

        let (requirements, runs_when_disabled) = {
            let command = self
                .commands
                .get(&id)
                .ok_or(SchedulerError::UnknownCommand(id))?;
            (command.requirements().to_vec(), command.runs_when_disabled())
        };

        if !self.enabled && !runs_when_disabled {
            debug!("Not scheduling {} while disabled", id);
            return Ok(false);
        }

        let mut interrupted: Vec<CommandId> = requirements
            .iter()
            .filter_map(|requirement| self.claims.get(requirement).copied())
            .collect();
        interrupted.dedup();
        for other in interrupted {
            self.cancel(ctx, other);
        }

        if let Some(command) = self.commands.get_mut(&id) {
            debug!("Scheduling {} {}", command.name(), id);
            command.initialize(ctx);
        }
        for requirement in requirements {
            self.claims.insert(requirement, id);
        }
        self.scheduled.push(id);
        Ok(true)
    }

    pub fn cancel(&mut self, ctx: &mut C, id: CommandId) {
        if self.finish(ctx, id, true) {
            debug!("Cancelled {}", id);
        }
    }

    pub fn cancel_all(&mut self, ctx: &mut C) {
        for id in self.scheduled.clone() {
            self.cancel(ctx, id);
        }
    }

    pub fn is_scheduled(&self, id: CommandId) -> bool {
        self.scheduled.contains(&id)
    }

    /// The command currently claiming `subsystem`.
    pub fn requiring(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.claims.get(&subsystem).copied()
    }

    pub fn command_name(&self, id: CommandId) -> Option<&str> {
        self.commands.get(&id).map(|command| command.name())
    }

    /// One scheduler tick: subsystem periodic, trigger bindings, running commands, then
    /// default commands for every unclaimed subsystem.
    pub fn run(&mut self, ctx: &mut C) {
        ctx.periodic(self.enabled);

        for action in self.poll_bindings() {
            match action {
                BindingAction::Schedule(id) => {
                    if let Err(e) = self.schedule(ctx, id) {
                        warn!("Binding could not schedule {}: {}", id, e);
                    }
                }
                BindingAction::Cancel(id) => self.cancel(ctx, id),
            }
        }

        if !self.enabled {
            self.cancel_disabled_incompatible(ctx);
        }

        for id in self.scheduled.clone() {
            let finished = match self.commands.get_mut(&id) {
                Some(command) => {
                    command.execute(ctx);
                    command.is_finished(ctx)
                }
                None => true,
            };
            if finished {
                self.finish(ctx, id, false);
            }
        }

        self.schedule_defaults(ctx);
    }

    fn poll_bindings(&mut self) -> Vec<BindingAction> {
        let mut actions = Vec::new();
        for binding in &mut self.bindings {
            let current = binding.trigger.get();
            let rising = current && !binding.previous;
            let falling = !current && binding.previous;
            binding.previous = current;

            match binding.kind {
                BindingKind::OnTrue if rising => actions.push(BindingAction::Schedule(binding.command)),
                BindingKind::OnFalse if falling => actions.push(BindingAction::Schedule(binding.command)),
                BindingKind::WhileTrue if rising => actions.push(BindingAction::Schedule(binding.command)),
                BindingKind::WhileTrue if falling => actions.push(BindingAction::Cancel(binding.command)),
                _ => {}
            }
        }
        actions
    }

    fn schedule_defaults(&mut self, ctx: &mut C) {
        for subsystem in self.subsystems.clone() {
            if self.claims.contains_key(&subsystem) {
                continue;
            }
            if let Some(id) = self.default_commands.get(&subsystem).copied() {
                if let Err(e) = self.schedule(ctx, id) {
                    warn!("Default command for {} could not be scheduled: {}", subsystem, e);
                }
            }
        }
    }

    fn cancel_disabled_incompatible(&mut self, ctx: &mut C) {
        let incompatible: Vec<CommandId> = self
            .scheduled
            .iter()
            .copied()
            .filter(|id| {
                self.commands
                    .get(id)
                    .is_some_and(|command| !command.runs_when_disabled())
            })
            .collect();
        for id in incompatible {
            self.cancel(ctx, id);
        }
    }

    // Ends a scheduled command and releases its claims. Returns false if it was not running.
    fn finish(&mut self, ctx: &mut C, id: CommandId, interrupted: bool) -> bool {
        let Some(position) = self.scheduled.iter().position(|scheduled| *scheduled == id) else {
            return false;
        };
        self.scheduled.remove(position);
        self.claims.retain(|_, claimant| *claimant != id);

        if let Some(command) = self.commands.get_mut(&id) {
            command.end(ctx, interrupted);
            debug!(
                "{} {} {}",
                command.name(),
                id,
                if interrupted { "interrupted" } else { "finished" }
            );
        }
        true
    }
}
