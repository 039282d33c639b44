use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::state::alerts::AlertRegistry;
use crate::state::watchlist::Watchlist;
use crate::error::Result;

/// The part of the dashboard state that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub watchlist: Watchlist,
    #[serde(default)]
    pub alerts: AlertRegistry,
}

/// A missing file yields an empty state. So does an unreadable one, after
/// a warning, so a bad file never keeps the dashboard from starting.
pub fn load(path: &Path) -> PersistedState {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No state file at {}", path.display());
            return PersistedState::default();
        }
        Err(e) => {
            warn!("Failed to read state file {}: {}", path.display(), e);
            return PersistedState::default();
        }
    };

    match serde_json::from_str(&text) {
        Ok(state) => state,
        Err(e) => {
            warn!("Ignoring corrupt state file {}: {}", path.display(), e);
            PersistedState::default()
        }
    }
}

pub fn save(path: &Path, state: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
    fs::rename(&tmp, path)?;

    debug!(
        "Saved {} watched assets and {} alerts to {}",
        state.watchlist.len(),
        state.alerts.len(),
        path.display()
    );
    Ok(())
}
