use std::path::{Path, PathBuf};

use log::{error, info, warn};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

use crate::discovery::DEFAULT_LIBRARY_FOLDER;
use crate::library::ChannelFolder;

use super::{ChannelAction, ChannelSelector, LibraryFolderPrompt, Notifier, Severity};

const TITLE: &str = "StarTrad";

/// Native message boxes. The box is shown from its own thread so a
/// notification never holds up the caller.
pub struct DialogNotifier;

impl Notifier for DialogNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        let level = match severity {
            Severity::Info => {
                info!("notify: {message}");
                MessageLevel::Info
            }
            Severity::Warning => {
                warn!("notify: {message}");
                MessageLevel::Warning
            }
            Severity::Error => {
                error!("notify: {message}");
                MessageLevel::Error
            }
        };

        let message = message.to_owned();
        std::thread::spawn(move || {
            MessageDialog::new()
                .set_level(level)
                .set_title(TITLE)
                .set_description(message)
                .set_buttons(MessageButtons::Ok)
                .show();
        });
    }
}

/// Asks about each candidate channel with a Yes/No box.
pub struct DialogChannelSelector;

impl ChannelSelector for DialogChannelSelector {
    fn select(&self, candidates: &[ChannelFolder], action: ChannelAction) -> Vec<ChannelFolder> {
        candidates
            .iter()
            .filter(|channel| {
                let answer = MessageDialog::new()
                    .set_level(MessageLevel::Info)
                    .set_title(TITLE)
                    .set_description(format!(
                        "Do you want to {} the translation for {}?",
                        action.verb(),
                        channel.label()
                    ))
                    .set_buttons(MessageButtons::YesNo)
                    .show();
                matches!(answer, MessageDialogResult::Yes)
            })
            .cloned()
            .collect()
    }
}

pub struct DialogFolderPrompt;

impl LibraryFolderPrompt for DialogFolderPrompt {
    fn ask_library_folder(&self) -> Option<PathBuf> {
        let mut dialog = FileDialog::new().set_title(
            "Select the Roberts Space Industries library folder (the one holding StarCitizen)",
        );
        let default = Path::new(DEFAULT_LIBRARY_FOLDER);
        if default.is_dir() {
            dialog = dialog.set_directory(default);
        }
        dialog.pick_folder()
    }
}
