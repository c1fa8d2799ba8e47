use std::path::PathBuf;
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{error, info, warn};

use crate::download::ProgressSnapshot;
use crate::library::ChannelFolder;
use crate::util::format_size;

use super::{ChannelAction, ChannelSelector, LibraryFolderPrompt, Notifier, ProgressReporter, Severity};

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!("notify: {message}"),
            Severity::Warning => warn!("notify: {message}"),
            Severity::Error => error!("notify: {message}"),
        }
    }
}

pub struct AcceptAllChannels;

impl ChannelSelector for AcceptAllChannels {
    fn select(&self, candidates: &[ChannelFolder], _action: ChannelAction) -> Vec<ChannelFolder> {
        candidates.to_vec()
    }
}

pub struct NoFolderPrompt;

impl LibraryFolderPrompt for NoFolderPrompt {
    fn ask_library_folder(&self) -> Option<PathBuf> {
        None
    }
}

/// Download progress as a terminal progress bar.
pub struct ConsoleProgress {
    hidden: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            hidden: false,
            bar: Mutex::new(None),
        }
    }

    pub fn hidden() -> Self {
        Self {
            hidden: true,
            bar: Mutex::new(None),
        }
    }

    fn create_bar(&self) -> ProgressBar {
        let bar = ProgressBar::new(100);
        if self.hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        let style = ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(|| self.create_bar());
        bar.set_position(snapshot.percent().clamp(0.0, 100.0) as u64);
        bar.set_message(format!(
            "{} / {}",
            format_size(snapshot.received),
            format_size(snapshot.total)
        ));
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock()
            && let Some(bar) = slot.take()
        {
            bar.finish_and_clear();
        }
    }
}
