use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::library::{ALL_CHANNELS, PREFERRED_CHANNEL};
use crate::scheduler::UpdateCadence;

const TOOL_SEPARATOR: char = ';';

/// Everything StarTrad remembers between runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library_folder: Option<PathBuf>,
    pub launcher_folder: Option<PathBuf>,
    /// A channel directory name, or `ALL`.
    pub channel: String,
    pub update_method: UpdateCadence,
    pub last_update: Option<DateTime<Local>>,
    /// `;`-separated executables started alongside the RSI Launcher.
    pub external_tools: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            library_folder: None,
            launcher_folder: None,
            channel: PREFERRED_CHANNEL.to_owned(),
            update_method: UpdateCadence::default(),
            last_update: None,
            external_tools: String::new(),
        }
    }
}

impl Settings {
    pub fn all_channels(&self) -> bool {
        self.channel == ALL_CHANNELS
    }

    pub fn external_tools(&self) -> Vec<String> {
        self.external_tools
            .split(TOOL_SEPARATOR)
            .map(str::trim)
            .filter(|tool| !tool.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Shared, persisted settings. Cloning shares the same state.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    inner: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    /// Load from `path`, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match read_settings(&path) {
            Ok(Some(settings)) => {
                debug!("settings: loaded {}", path.display());
                settings
            }
            Ok(None) => {
                info!("settings: no settings file yet, using defaults");
                Settings::default()
            }
            Err(err) => {
                warn!("settings: {err}; using defaults");
                Settings::default()
            }
        };

        Self {
            path: Some(path),
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Settings that are never written to disk.
    #[cfg(test)]
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> Settings {
        match self.inner.read() {
            Ok(settings) => settings.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Apply `change` and persist the result.
    pub fn update(&self, change: impl FnOnce(&mut Settings)) {
        let updated = {
            let mut settings = match self.inner.write() {
                Ok(settings) => settings,
                Err(poisoned) => poisoned.into_inner(),
            };
            change(&mut settings);
            settings.clone()
        };

        if let Err(err) = self.persist(&updated) {
            error!("settings: {err}");
        }
    }

    /// Pick up edits made to the settings file by hand. Returns whether
    /// anything changed.
    pub fn reload(&self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        let fresh = match read_settings(path) {
            Ok(Some(settings)) => settings,
            Ok(None) => return false,
            Err(err) => {
                warn!("settings: {err}; keeping current settings");
                return false;
            }
        };

        let mut settings = match self.inner.write() {
            Ok(settings) => settings,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *settings == fresh {
            return false;
        }
        *settings = fresh;
        true
    }

    fn persist(&self, settings: &Settings) -> Result<(), String> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("unable to create settings dir: {e}"))?;
        }
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| format!("unable to serialize settings: {e}"))?;
        fs::write(path, json).map_err(|e| format!("unable to save settings: {e}"))
    }
}

fn read_settings(path: &Path) -> Result<Option<Settings>, String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(format!("unable to read {}: {err}", path.display())),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| format!("invalid settings file {}: {e}", path.display()))
}
