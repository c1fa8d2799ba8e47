//! The engine never talks to a window directly. It asks these collaborators
//! to notify the user, pick channels, ask for a folder and show progress.

mod console;
mod dialogs;

use std::path::PathBuf;
use std::sync::Arc;

use crate::download::ProgressSnapshot;
use crate::library::ChannelFolder;

pub use console::{AcceptAllChannels, ConsoleProgress, LogNotifier, NoFolderPrompt};
pub use dialogs::{DialogChannelSelector, DialogFolderPrompt, DialogNotifier};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// What the user is choosing channels for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelAction {
    Install,
    Uninstall,
}

impl ChannelAction {
    pub fn verb(self) -> &'static str {
        match self {
            ChannelAction::Install => "install",
            ChannelAction::Uninstall => "remove",
        }
    }
}

pub trait ChannelSelector: Send + Sync {
    /// Subset of `candidates` the user picked. Empty means canceled.
    fn select(&self, candidates: &[ChannelFolder], action: ChannelAction) -> Vec<ChannelFolder>;
}

pub trait LibraryFolderPrompt: Send + Sync {
    fn ask_library_folder(&self) -> Option<PathBuf>;
}

pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);
    fn finish(&self);
}

/// The set of collaborators handed to the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub selector: Arc<dyn ChannelSelector>,
    pub folder_prompt: Arc<dyn LibraryFolderPrompt>,
    pub progress: Arc<dyn ProgressReporter>,
}

impl Collaborators {
    /// Never blocks on the user: logs notifications and accepts every channel.
    pub fn headless() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
            selector: Arc::new(AcceptAllChannels),
            folder_prompt: Arc::new(NoFolderPrompt),
            progress: Arc::new(ConsoleProgress::hidden()),
        }
    }

    /// Native message boxes and folder picker, console progress bar.
    pub fn desktop() -> Self {
        Self {
            notifier: Arc::new(DialogNotifier),
            selector: Arc::new(DialogChannelSelector),
            folder_prompt: Arc::new(DialogFolderPrompt),
            progress: Arc::new(ConsoleProgress::new()),
        }
    }
}
