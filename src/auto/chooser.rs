use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::Command;

pub type RoutineFactory<C> = Box<dyn Fn() -> Box<dyn Command<C>> + Send + Sync>;

/// Name -> routine mapping with a designated default.
///
/// The selection lives in a watch channel so a [`Dashboard`](super::dashboard::Dashboard) can
/// change it after the chooser has been handed to its owner.
pub struct AutoChooser<C> {
    options: Vec<(String, RoutineFactory<C>)>,
    default: Option<String>,
    selection: Arc<watch::Sender<Option<String>>>,
}

impl<C> Default for AutoChooser<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> AutoChooser<C> {
    pub fn new() -> Self {
        Self {
            options: Vec::new(),
            default: None,
            selection: Arc::new(watch::Sender::new(None)),
        }
    }

    pub fn add_option<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Command<C>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Auto option {}", name);
        self.options.retain(|(existing, _)| *existing != name);
        self.options.push((name, Box::new(factory)));
    }

    pub fn set_default_option<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Command<C>> + Send + Sync + 'static,
    {
        let name = name.into();
        self.add_option(name.clone(), factory);
        self.default = Some(name);
    }

    /// Makes an already added option the default. Returns false if there is no such option.
    pub fn set_default(&mut self, name: &str) -> bool {
        if self.contains(name) {
            self.default = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.options.iter().any(|(existing, _)| existing == name)
    }

    pub fn option_names(&self) -> Vec<String> {
        self.options.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Handle through which the selection can be changed from elsewhere.
    pub fn selection_handle(&self) -> Arc<watch::Sender<Option<String>>> {
        self.selection.clone()
    }

    /// Unknown names leave the current selection unchanged.
    pub fn select(&self, name: &str) -> bool {
        if !self.contains(name) {
            warn!("Ignoring selection of unknown auto {}", name);
            return false;
        }
        info!("Auto {} selected", name);
        self.selection.send_replace(Some(name.to_string()));
        true
    }

    /// The explicit selection if it still names an option, else the default.
    pub fn selected_name(&self) -> Option<String> {
        let selected = self.selection.borrow().clone();
        selected
            .filter(|name| self.contains(name))
            .or_else(|| self.default.clone())
    }

    /// A fresh instance of the selected routine, `None` if nothing is selected and there is
    /// no default.
    pub fn selected(&self) -> Option<Box<dyn Command<C>>> {
        let name = self.selected_name()?;
        self.options
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, factory)| factory())
    }
}
