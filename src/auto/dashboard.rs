use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::chooser::AutoChooser;

struct Published {
    options: Vec<String>,
    selection: Arc<watch::Sender<Option<String>>>,
}

/// Key -> chooser table standing in for the driver station dashboard.
///
/// Publishing never fails; selecting on an unknown key or with an unknown option only warns.
#[derive(Default)]
pub struct Dashboard {
    entries: HashMap<String, Published>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `chooser` under `key`, replacing anything already there.
    pub fn put_data<C>(&mut self, key: &str, chooser: &AutoChooser<C>) {
        let options = chooser.option_names();
        info!(
            "Dashboard {}: [{}] default {}",
            key,
            options.join(", "),
            chooser.default_name().unwrap_or("-")
        );
        self.entries.insert(
            key.to_string(),
            Published {
                options,
                selection: chooser.selection_handle(),
            },
        );
    }

    pub fn options(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(|entry| entry.options.as_slice())
    }

    pub fn select(&self, key: &str, option: &str) -> bool {
        let Some(entry) = self.entries.get(key) else {
            warn!("Nothing published under {}", key);
            return false;
        };
        if !entry.options.iter().any(|name| name == option) {
            warn!("{} has no option {}", key, option);
            return false;
        }
        info!("Dashboard {} -> {}", key, option);
        entry.selection.send_replace(Some(option.to_string()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::commands::{none, run_once};

    struct Nothing;

    #[test]
    fn selection_reaches_chooser() {
        let mut chooser: AutoChooser<Nothing> = AutoChooser::new();
        chooser.set_default_option("None", || Box::new(none::<Nothing>()));
        chooser.add_option("Taxi", || Box::new(run_once("Taxi", &[], |_: &mut Nothing| {})));

        let mut dashboard = Dashboard::new();
        dashboard.put_data("Auto Mode", &chooser);
        assert_eq!(
            dashboard.options("Auto Mode"),
            Some(&["None".to_string(), "Taxi".to_string()][..])
        );

        assert!(!dashboard.select("Auto Mode", "Nope"));
        assert!(!dashboard.select("Other", "Taxi"));
        assert_eq!(chooser.selected_name().as_deref(), Some("None"));

        assert!(dashboard.select("Auto Mode", "Taxi"));
        assert_eq!(chooser.selected_name().as_deref(), Some("Taxi"));
    }
}
