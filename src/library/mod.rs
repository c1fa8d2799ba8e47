mod channel;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

pub use channel::{ChannelFolder, LOCALIZATION_LANGUAGE};

pub const GAME_DIR_NAME: &str = "StarCitizen";
pub const GAME_MARKER_FILE: &str = "Data.p4k";
pub const PREFERRED_CHANNEL: &str = "LIVE";
/// Channel setting value meaning "every installed channel".
pub const ALL_CHANNELS: &str = "ALL";

/// The directory the RSI Launcher installs games into, e.g.
/// `C:\Program Files\Roberts Space Industries`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryFolder {
    root: Arc<Path>,
}

impl LibraryFolder {
    /// Wraps `root` if it holds at least one valid channel.
    pub fn open(root: impl Into<PathBuf>) -> Option<Self> {
        let root = root.into();
        Self::is_valid_path(&root).then(|| Self {
            root: Arc::from(root),
        })
    }

    pub fn is_valid_path(path: &Path) -> bool {
        let Ok(entries) = fs::read_dir(path.join(GAME_DIR_NAME)) else {
            return false;
        };
        entries
            .filter_map(Result::ok)
            .any(|entry| ChannelFolder::is_valid_path(&entry.path()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn game_dir(&self) -> PathBuf {
        self.root.join(GAME_DIR_NAME)
    }

    /// The named channel, if it is installed.
    pub fn channel(&self, name: &str) -> Option<ChannelFolder> {
        let channel = ChannelFolder::new(self.root.clone(), name);
        channel.is_valid().then_some(channel)
    }

    /// Channels of this library. With `filter_to_configured` and a concrete
    /// `configured` channel only that one is yielded; otherwise every valid
    /// channel, the preferred one first and the rest by name.
    pub fn enumerate_channels(
        &self,
        configured: &str,
        filter_to_configured: bool,
        require_installed_translation: bool,
    ) -> impl Iterator<Item = ChannelFolder> + use<> {
        let channels = if filter_to_configured && configured != ALL_CHANNELS {
            self.channel(configured).into_iter().collect()
        } else {
            self.all_channels()
        };

        channels.into_iter().filter(move |channel| {
            !require_installed_translation || channel.installed_version().is_some()
        })
    }

    fn all_channels(&self) -> Vec<ChannelFolder> {
        let entries = match fs::read_dir(self.game_dir()) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("library: cannot list {}: {err}", self.game_dir().display());
                return Vec::new();
            }
        };

        let mut channels: Vec<ChannelFolder> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .map(|name| ChannelFolder::new(self.root.clone(), name))
            .filter(ChannelFolder::is_valid)
            .collect();

        channels.sort_by(|a, b| {
            (!a.is_primary())
                .cmp(&!b.is_primary())
                .then_with(|| a.name().cmp(b.name()))
        });
        channels
    }
}

/// Walk up from `path` until a valid library folder is found.
pub fn seek_library_folder(path: &Path) -> Option<LibraryFolder> {
    path.ancestors().find_map(|candidate| LibraryFolder::open(candidate))
}
