//! Command factories built from closures
//!
//! Most bindings only need [`run_once`] (do something once when a trigger fires) or [`run`]
//! (keep doing something every tick until interrupted).

use std::time::{Duration, Instant};

use super::{Command, SubsystemId};

type Callback<C> = Box<dyn FnMut(&mut C) + Send>;
type EndCallback<C> = Box<dyn FnMut(&mut C, bool) + Send>;
type FinishedCallback<C> = Box<dyn FnMut(&C) -> bool + Send>;

/// Command assembled from optional lifecycle closures.
pub struct FunctionalCommand<C> {
    name: String,
    requirements: Vec<SubsystemId>,
    on_initialize: Option<Callback<C>>,
    on_execute: Option<Callback<C>>,
    on_end: Option<EndCallback<C>>,
    is_finished: Option<FinishedCallback<C>>,
    runs_when_disabled: bool,
}

impl<C> FunctionalCommand<C> {
    pub fn new(name: impl Into<String>, requirements: &[SubsystemId]) -> Self {
        Self {
            name: name.into(),
            requirements: requirements.to_vec(),
            on_initialize: None,
            on_execute: None,
            on_end: None,
            is_finished: None,
            runs_when_disabled: false,
        }
    }

    pub fn on_initialize<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut C) + Send + 'static,
    {
        self.on_initialize = Some(Box::new(f));
        self
    }

    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut C) + Send + 'static,
    {
        self.on_execute = Some(Box::new(f));
        self
    }

    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut C, bool) + Send + 'static,
    {
        self.on_end = Some(Box::new(f));
        self
    }

    pub fn until<F>(mut self, f: F) -> Self
    where
        F: FnMut(&C) -> bool + Send + 'static,
    {
        self.is_finished = Some(Box::new(f));
        self
    }

    pub fn ignoring_disable(mut self, runs_when_disabled: bool) -> Self {
        self.runs_when_disabled = runs_when_disabled;
        self
    }
}

impl<C> Command<C> for FunctionalCommand<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> &[SubsystemId] {
        &self.requirements
    }

    fn initialize(&mut self, ctx: &mut C) {
        if let Some(f) = self.on_initialize.as_mut() {
            f(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut C) {
        if let Some(f) = self.on_execute.as_mut() {
            f(ctx);
        }
    }

    fn end(&mut self, ctx: &mut C, interrupted: bool) {
        if let Some(f) = self.on_end.as_mut() {
            f(ctx, interrupted);
        }
    }

    fn is_finished(&mut self, ctx: &C) -> bool {
        self.is_finished.as_mut().is_some_and(|f| f(ctx))
    }

    fn runs_when_disabled(&self) -> bool {
        self.runs_when_disabled
    }
}

/// Runs `action` once when scheduled and finishes immediately.
pub fn run_once<C, F>(name: impl Into<String>, requirements: &[SubsystemId], action: F) -> FunctionalCommand<C>
where
    F: FnMut(&mut C) + Send + 'static,
{
    FunctionalCommand::new(name, requirements)
        .on_initialize(action)
        .until(|_| true)
}

/// Runs `action` every tick until interrupted.
pub fn run<C, F>(name: impl Into<String>, requirements: &[SubsystemId], action: F) -> FunctionalCommand<C>
where
    F: FnMut(&mut C) + Send + 'static,
{
    FunctionalCommand::new(name, requirements).on_execute(action)
}

/// Does nothing and finishes immediately.
pub fn none<C>() -> FunctionalCommand<C> {
    FunctionalCommand::new("None", &[])
        .until(|_| true)
        .ignoring_disable(true)
}

/// Ends `inner` once `timeout` has elapsed since it was scheduled.
pub struct WithTimeout<C> {
    inner: Box<dyn Command<C>>,
    timeout: Duration,
    started: Option<Instant>,
}

pub fn with_timeout<C>(inner: impl Command<C> + 'static, timeout: Duration) -> WithTimeout<C> {
    WithTimeout {
        inner: Box::new(inner),
        timeout,
        started: None,
    }
}

impl<C> Command<C> for WithTimeout<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn requirements(&self) -> &[SubsystemId] {
        self.inner.requirements()
    }

    fn initialize(&mut self, ctx: &mut C) {
        self.started = Some(Instant::now());
        self.inner.initialize(ctx);
    }

    fn execute(&mut self, ctx: &mut C) {
        self.inner.execute(ctx);
    }

    fn end(&mut self, ctx: &mut C, interrupted: bool) {
        self.started = None;
        self.inner.end(ctx, interrupted);
    }

    fn is_finished(&mut self, ctx: &C) -> bool {
        let timed_out = self
            .started
            .is_some_and(|started| started.elapsed() >= self.timeout);
        timed_out || self.inner.is_finished(ctx)
    }

    fn runs_when_disabled(&self) -> bool {
        self.inner.runs_when_disabled()
    }
}

/// Runs commands one after another, claiming the union of their requirements throughout.
pub struct Sequence<C> {
    name: String,
    commands: Vec<Box<dyn Command<C>>>,
    requirements: Vec<SubsystemId>,
    index: usize,
}

pub fn sequence<C>(name: impl Into<String>, commands: Vec<Box<dyn Command<C>>>) -> Sequence<C> {
    let mut requirements: Vec<SubsystemId> = commands
        .iter()
        .flat_map(|command| command.requirements().iter().copied())
        .collect();
    requirements.sort();
    requirements.dedup();

    Sequence {
        name: name.into(),
        commands,
        requirements,
        index: 0,
    }
}

impl<C> Command<C> for Sequence<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> &[SubsystemId] {
        &self.requirements
    }

    fn initialize(&mut self, ctx: &mut C) {
        self.index = 0;
        if let Some(first) = self.commands.first_mut() {
            first.initialize(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut C) {
        let Some(current) = self.commands.get_mut(self.index) else {
            return;
        };

        current.execute(ctx);
        if current.is_finished(ctx) {
            current.end(ctx, false);
            self.index += 1;
            if let Some(next) = self.commands.get_mut(self.index) {
                next.initialize(ctx);
            }
        }
    }

    fn end(&mut self, ctx: &mut C, interrupted: bool) {
        if interrupted {
            if let Some(current) = self.commands.get_mut(self.index) {
                current.end(ctx, true);
            }
        }
    }

    fn is_finished(&mut self, _ctx: &C) -> bool {
        self.index >= self.commands.len()
    }

    fn runs_when_disabled(&self) -> bool {
        self.commands.iter().all(|command| command.runs_when_disabled())
    }
}
