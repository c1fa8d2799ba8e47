use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use log::{debug, error, info, warn};

use crate::discovery::PathDiscovery;
use crate::download::{DownloadBatch, DownloadCoordinator, ProgressSnapshot};
use crate::error::InstallError;
use crate::library::{ChannelFolder, LibraryFolder, seek_library_folder};
use crate::networking::ContentSource;
use crate::process;
use crate::storage::SettingsStore;
use crate::ui::{ChannelAction, Collaborators, Severity};
use crate::version::VersionToken;

pub mod state;
pub mod user_cfg;

pub use state::{ActionResult, InstallGuard, InstallState};

pub const VERSION_ROUTE: &str = "/download/version.html";
pub const PRIMARY_TRANSLATION_ROUTE: &str = "/download/global.ini";
pub const SECONDARY_TRANSLATION_ROUTE: &str = "/download/global_ptu.ini";

/// Route of the translation file a channel installs.
pub fn translation_route(channel: &ChannelFolder) -> &'static str {
    if channel.has_checkable_version() {
        PRIMARY_TRANSLATION_ROUTE
    } else {
        SECONDARY_TRANSLATION_ROUTE
    }
}

/// Installs, refreshes and removes the translation.
pub struct InstallationEngine {
    settings: SettingsStore,
    discovery: PathDiscovery,
    source: Arc<dyn ContentSource>,
    ui: Collaborators,
    work_dir: PathBuf,
    guard: InstallGuard,
    state: Mutex<InstallState>,
}

impl InstallationEngine {
    pub fn new(
        settings: SettingsStore,
        discovery: PathDiscovery,
        source: Arc<dyn ContentSource>,
        ui: Collaborators,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings,
            discovery,
            source,
            ui,
            work_dir: work_dir.into(),
            guard: InstallGuard::default(),
            state: Mutex::new(InstallState::Idle),
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(InstallState::Idle)
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_running()
    }

    fn set_state(&self, next: InstallState) {
        debug!("engine: state -> {next:?}");
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Bring the translation of every relevant channel up to date. A call
    /// made while another installation runs returns `Aborted` untouched.
    pub async fn install(&self, silent: bool) -> ActionResult {
        let Some(_ticket) = self.guard.try_begin() else {
            info!("install: another installation is already running");
            return ActionResult::Aborted;
        };
        info!("install: starting (silent: {silent})");

        let result = match self.run_install(silent).await {
            Ok(result) => result,
            Err(err) => {
                let severity = if err.is_transient() {
                    warn!("install: {err}");
                    Severity::Warning
                } else {
                    error!("install: {err}");
                    Severity::Error
                };
                self.notify(silent, severity, &format!("Translation not installed: {err}"));
                ActionResult::Failure
            }
        };

        match result {
            ActionResult::Successful => {
                self.settings
                    .update(|settings| settings.last_update = Some(Local::now()));
            }
            ActionResult::UserCanceled => {
                self.notify(silent, Severity::Info, "Installation canceled.");
            }
            ActionResult::Failure | ActionResult::Aborted => {}
        }

        self.set_state(InstallState::Done(result));
        info!("install: finished ({})", result.label());
        result
    }

    async fn run_install(&self, silent: bool) -> Result<ActionResult, InstallError> {
        let library = self
            .resolve_library(silent)
            .await
            .ok_or(InstallError::Discovery("library folder"))?;

        self.set_state(InstallState::QueryingVersion);
        let latest = self
            .latest_version()
            .await
            .ok_or(InstallError::RemoteUnavailable)?;
        info!("install: latest translation is {latest}");

        self.set_state(InstallState::DecidingChannels);
        let settings = self.settings.snapshot();
        if settings.all_channels() {
            debug!("install: considering every channel");
        }
        let configured = settings.channel;
        let channels: Vec<ChannelFolder> = library
            .enumerate_channels(&configured, true, false)
            .collect();
        if channels.is_empty() {
            return Err(InstallError::NoChannel(library.root().display().to_string()));
        }

        let mut needing = Vec::new();
        for channel in channels {
            let installed = channel.installed_version();
            let stale = !channel.has_checkable_version()
                || installed
                    .as_ref()
                    .is_none_or(|installed| latest.is_newer_than(installed));
            if stale {
                info!(
                    "install: {} needs the translation (installed: {})",
                    channel.name(),
                    installed.map_or_else(|| "none".to_owned(), |v| v.to_string())
                );
                needing.push(channel);
            } else {
                info!("install: {} is up to date", channel.name());
                if let Err(err) = user_cfg::patch_user_cfg(&channel.user_cfg_file()) {
                    warn!("install: cannot patch {}: {err}", channel.user_cfg_file().display());
                }
            }
        }

        if needing.is_empty() {
            self.notify(silent, Severity::Info, "The translation is already up to date.");
            return Ok(ActionResult::Successful);
        }

        let selected = if needing.len() > 1 && !silent {
            self.set_state(InstallState::AwaitingChannelSelection);
            let selected = self.select_channels(needing, ChannelAction::Install).await;
            if selected.is_empty() {
                info!("install: no channel selected");
                return Ok(ActionResult::UserCanceled);
            }
            selected
        } else {
            needing
        };

        self.set_state(InstallState::Downloading);
        let mut coordinator = DownloadCoordinator::new(&self.work_dir);
        for channel in selected {
            let url = self.source.absolute_url(translation_route(&channel));
            coordinator.add_job(channel, &url);
        }

        let reporter = self.ui.progress.clone();
        let on_progress = move |snapshot: ProgressSnapshot| {
            if !silent {
                reporter.on_progress(snapshot);
            }
        };
        let batch = coordinator.start(self.source.clone(), &on_progress).await;
        self.ui.progress.finish();

        let result = if batch.result() == ActionResult::Successful {
            self.set_state(InstallState::Installing);
            self.install_batch(&batch)
        } else {
            for job in batch.jobs() {
                if let Some(err) = job.error() {
                    error!("install: download of {} failed: {err}", job.url());
                }
            }
            Err(InstallError::Download)
        };
        batch.cleanup();

        result?;
        self.notify(
            silent,
            Severity::Info,
            &format!(
                "Translation {} for Star Citizen {} installed.",
                latest.version_number(),
                latest.targeted_game_version()
            ),
        );
        Ok(ActionResult::Successful)
    }

    fn install_batch(&self, batch: &DownloadBatch) -> Result<(), InstallError> {
        let mut failed = Vec::new();
        let mut corrupt = None;
        for job in batch.jobs() {
            if let Err(err) = verify_artifact(job.local_path()) {
                error!("install: artifact of {} rejected: {err}", job.url());
                failed.extend(job.channels().iter().map(|c| c.name().to_owned()));
                corrupt = Some(err);
                continue;
            }
            for channel in job.channels() {
                if let Err(err) = install_into_channel(job.local_path(), channel) {
                    error!("install: {} failed: {err}", channel.name());
                    failed.push(channel.name().to_owned());
                } else {
                    info!("install: {} updated", channel.name());
                }
            }
        }

        let channel_count: usize = batch.jobs().iter().map(|job| job.channels().len()).sum();
        match corrupt {
            _ if failed.is_empty() => Ok(()),
            Some(err) if failed.len() == channel_count => Err(err),
            _ => Err(InstallError::Channels(failed.join(", "))),
        }
    }

    /// Remove the translation and the language override from the channels
    /// the user picks.
    pub async fn uninstall(&self, silent: bool) -> ActionResult {
        let Some(_ticket) = self.guard.try_begin() else {
            info!("uninstall: an installation is running");
            return ActionResult::Aborted;
        };
        self.set_state(InstallState::Uninstalling);

        let result = match self.run_uninstall(silent).await {
            Ok(result) => result,
            Err(err) => {
                error!("uninstall: {err}");
                self.notify(silent, Severity::Error, &format!("Translation not removed: {err}"));
                ActionResult::Failure
            }
        };

        self.set_state(InstallState::Done(result));
        info!("uninstall: finished ({})", result.label());
        result
    }

    async fn run_uninstall(&self, silent: bool) -> Result<ActionResult, InstallError> {
        let library = self
            .resolve_library(silent)
            .await
            .ok_or(InstallError::Discovery("library folder"))?;
        let configured = self.settings.snapshot().channel;
        let candidates: Vec<ChannelFolder> = library
            .enumerate_channels(&configured, true, true)
            .collect();
        if candidates.is_empty() {
            self.notify(silent, Severity::Info, "No installed translation to remove.");
            return Ok(ActionResult::Successful);
        }

        let selected = if candidates.len() > 1 && !silent {
            let selected = self
                .select_channels(candidates, ChannelAction::Uninstall)
                .await;
            if selected.is_empty() {
                return Ok(ActionResult::UserCanceled);
            }
            selected
        } else {
            candidates
        };

        let mut failed = Vec::new();
        for channel in &selected {
            let mut ok = true;
            for path in [channel.localization_file(), channel.user_cfg_file()] {
                match fs::remove_file(&path) {
                    Ok(()) => debug!("uninstall: removed {}", path.display()),
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => {
                        error!("uninstall: cannot remove {}: {err}", path.display());
                        ok = false;
                    }
                }
            }
            if ok {
                info!("uninstall: {} cleaned", channel.name());
            } else {
                failed.push(channel.name().to_owned());
            }
        }

        if !failed.is_empty() {
            return Err(InstallError::Channels(failed.join(", ")));
        }
        self.notify(silent, Severity::Info, "Translation removed.");
        Ok(ActionResult::Successful)
    }

    /// Every channel of the library with the translation version it carries.
    pub async fn installed_versions(&self) -> Vec<(ChannelFolder, Option<VersionToken>)> {
        let Some(library) = self.resolve_library(true).await else {
            return Vec::new();
        };
        library
            .enumerate_channels(crate::library::ALL_CHANNELS, false, false)
            .map(|channel| {
                let version = channel.installed_version();
                (channel, version)
            })
            .collect()
    }

    /// Start the RSI Launcher.
    pub async fn launch_launcher(&self) -> Result<(), String> {
        let settings = self.settings.snapshot();
        let discovery = self.discovery.clone();
        let cached = settings.launcher_folder.clone();
        let library = settings.library_folder.clone();
        let folder = tokio::task::spawn_blocking(move || {
            discovery.launcher_folder(cached.as_deref(), library.as_deref())
        })
        .await
        .map_err(|e| format!("launcher lookup failed: {e}"))?
        .ok_or("unable to locate the RSI Launcher")?;

        if settings.launcher_folder.as_ref() != Some(&folder) {
            let cached = folder.clone();
            self.settings
                .update(move |settings| settings.launcher_folder = Some(cached));
        }
        process::launch_rsi_launcher(&folder)
    }

    async fn resolve_library(&self, silent: bool) -> Option<LibraryFolder> {
        let cached = self.settings.snapshot().library_folder;
        let discovery = self.discovery.clone();
        let lookup = cached.clone();
        let found = tokio::task::spawn_blocking(move || discovery.library_folder(lookup.as_deref()))
            .await
            .unwrap_or_else(|err| {
                error!("engine: library lookup failed: {err}");
                None
            });

        let library = match found {
            Some(path) => LibraryFolder::open(path),
            None if !silent => self.prompt_library_folder().await,
            None => None,
        }?;

        if cached.as_deref() != Some(library.root()) {
            let root = library.root().to_path_buf();
            info!("engine: library folder is {}", root.display());
            self.settings
                .update(move |settings| settings.library_folder = Some(root));
        }
        Some(library)
    }

    async fn prompt_library_folder(&self) -> Option<LibraryFolder> {
        let prompt = self.ui.folder_prompt.clone();
        let picked = tokio::task::spawn_blocking(move || prompt.ask_library_folder())
            .await
            .ok()
            .flatten()?;
        let library = seek_library_folder(&picked);
        if library.is_none() {
            warn!("engine: {} is not a library folder", picked.display());
        }
        library
    }

    async fn latest_version(&self) -> Option<VersionToken> {
        let body = self.source.get(VERSION_ROUTE).await?;
        let version = VersionToken::parse(&body);
        if version.is_none() {
            debug!("engine: unexpected version body {body:?}");
        }
        version
    }

    async fn select_channels(
        &self,
        candidates: Vec<ChannelFolder>,
        action: ChannelAction,
    ) -> Vec<ChannelFolder> {
        let selector = self.ui.selector.clone();
        tokio::task::spawn_blocking(move || selector.select(&candidates, action))
            .await
            .unwrap_or_else(|err| {
                error!("engine: channel selection failed: {err}");
                Vec::new()
            })
    }

    fn notify(&self, silent: bool, severity: Severity, message: &str) {
        if silent {
            debug!("engine: {message}");
        } else {
            self.ui.notifier.notify(severity, message);
        }
    }
}

fn verify_artifact(path: &Path) -> Result<(), InstallError> {
    let metadata = fs::metadata(path)
        .map_err(|e| InstallError::CorruptArtifact(format!("{}: {e}", path.display())))?;
    if metadata.len() == 0 {
        return Err(InstallError::CorruptArtifact(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(())
}

fn install_into_channel(artifact: &Path, channel: &ChannelFolder) -> Result<(), InstallError> {
    fs::create_dir_all(channel.localization_dir())?;
    fs::copy(artifact, channel.localization_file())?;
    let outcome = user_cfg::patch_user_cfg(&channel.user_cfg_file())?;
    debug!("install: {} user.cfg {outcome:?}", channel.name());
    Ok(())
}
