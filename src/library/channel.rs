use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::version::VersionToken;

use super::{GAME_DIR_NAME, GAME_MARKER_FILE, PREFERRED_CHANNEL};

pub const LOCALIZATION_LANGUAGE: &str = "french_(france)";
pub const LOCALIZATION_FILE_NAME: &str = "global.ini";
pub const USER_CFG_FILE_NAME: &str = "user.cfg";

const VERSION_COMMENT_TOKEN: &str = "; Version :";
const BOM: char = '\u{feff}';

/// Release tracks the launcher is known to install.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownChannel {
    Live,
    Ptu,
    Eptu,
    TechPreview,
}

const KNOWN_CHANNELS: [(KnownChannel, &str, &str); 4] = [
    (KnownChannel::Live, "LIVE", "LIVE (release)"),
    (KnownChannel::Ptu, "PTU", "PTU (public test)"),
    (KnownChannel::Eptu, "EPTU", "EPTU (experimental test)"),
    (KnownChannel::TechPreview, "TECH-PREVIEW", "Tech preview"),
];

impl KnownChannel {
    pub fn from_dir_name(name: &str) -> Option<Self> {
        KNOWN_CHANNELS
            .iter()
            .find(|(_, dir, _)| *dir == name)
            .map(|(channel, _, _)| *channel)
    }

    pub fn label(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (KnownChannel, &'static str, &'static str) {
        KNOWN_CHANNELS
            .iter()
            .find(|(channel, _, _)| *channel == self)
            .unwrap_or(&KNOWN_CHANNELS[0])
    }
}

/// One release track inside the game directory, e.g. `StarCitizen/LIVE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelFolder {
    library: Arc<Path>,
    name: String,
}

impl ChannelFolder {
    pub(crate) fn new(library: Arc<Path>, name: impl Into<String>) -> Self {
        Self {
            library,
            name: name.into(),
        }
    }

    pub fn is_valid_path(path: &Path) -> bool {
        path.is_dir() && path.join(GAME_MARKER_FILE).is_file()
    }

    pub fn is_valid(&self) -> bool {
        Self::is_valid_path(&self.path())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        KnownChannel::from_dir_name(&self.name)
            .map(KnownChannel::label)
            .unwrap_or(self.name.as_str())
    }

    pub fn path(&self) -> PathBuf {
        self.library.join(GAME_DIR_NAME).join(&self.name)
    }

    pub fn localization_dir(&self) -> PathBuf {
        self.path()
            .join("data")
            .join("Localization")
            .join(LOCALIZATION_LANGUAGE)
    }

    pub fn localization_file(&self) -> PathBuf {
        self.localization_dir().join(LOCALIZATION_FILE_NAME)
    }

    pub fn user_cfg_file(&self) -> PathBuf {
        self.path().join(USER_CFG_FILE_NAME)
    }

    pub fn is_primary(&self) -> bool {
        self.name == PREFERRED_CHANNEL
    }

    /// Only the release track publishes a version the server can be asked
    /// about; every other track is treated as stale.
    pub fn has_checkable_version(&self) -> bool {
        self.is_primary()
    }

    pub fn installed_version(&self) -> Option<VersionToken> {
        read_installed_version(&self.localization_file())
    }
}

/// Scan a localization file for its `; Version :` comment.
pub fn read_installed_version(path: &Path) -> Option<VersionToken> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);

    for (index, line) in reader.split(b'\n').enumerate() {
        let Ok(bytes) = line else {
            return None;
        };
        let text = String::from_utf8_lossy(&bytes);
        let mut text = text.trim_end_matches('\r');
        if index == 0 {
            text = text.trim_start_matches(BOM);
        }
        if let Some(rest) = text.strip_prefix(VERSION_COMMENT_TOKEN)
            && let Some(version) = VersionToken::parse(rest)
        {
            return Some(version);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn channel_in(root: &Path, name: &str) -> ChannelFolder {
        let channel = ChannelFolder::new(Arc::from(root), name);
        fs::create_dir_all(channel.path()).expect("channel dir");
        fs::write(channel.path().join(GAME_MARKER_FILE), b"").expect("marker");
        channel
    }

    #[test]
    fn derives_channel_paths() {
        let channel = ChannelFolder::new(Arc::from(Path::new("lib")), "PTU");
        assert_eq!(channel.path(), Path::new("lib").join("StarCitizen").join("PTU"));
        assert_eq!(
            channel.localization_file(),
            channel
                .path()
                .join("data")
                .join("Localization")
                .join("french_(france)")
                .join("global.ini")
        );
        assert_eq!(channel.user_cfg_file(), channel.path().join("user.cfg"));
        assert_eq!(channel.label(), "PTU (public test)");
        assert!(!channel.has_checkable_version());
    }

    #[test]
    fn unknown_channels_use_their_directory_name() {
        let channel = ChannelFolder::new(Arc::from(Path::new("lib")), "HOTFIX");
        assert_eq!(channel.label(), "HOTFIX");
        assert_eq!(KnownChannel::from_dir_name("EPTU"), Some(KnownChannel::Eptu));
        assert_eq!(KnownChannel::TechPreview.label(), "Tech preview");
    }

    #[test]
    fn validity_requires_marker_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let valid = channel_in(dir.path(), "LIVE");
        let invalid = ChannelFolder::new(Arc::from(dir.path()), "PTU");
        fs::create_dir_all(invalid.path()).expect("dir");

        assert!(valid.is_valid());
        assert!(!invalid.is_valid());
    }

    #[test]
    fn reads_version_comment_after_bom() {
        let dir = tempfile::tempdir().expect("tempdir");
        let channel = channel_in(dir.path(), "LIVE");
        fs::create_dir_all(channel.localization_dir()).expect("loc dir");
        fs::write(
            channel.localization_file(),
            "\u{feff}; Version :3.22.0-1.0-20240101\r\nkey=value\r\n",
        )
        .expect("write");

        let version = channel.installed_version().expect("version");
        assert_eq!(version.to_string(), "3.22.0-1.0-20240101");
    }

    #[test]
    fn skips_unparseable_version_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("global.ini");
        fs::write(
            &path,
            "; Version :garbage\nfoo=bar\n; Version : 3.21.0-2.0-7\n",
        )
        .expect("write");

        let version = read_installed_version(&path).expect("version");
        assert_eq!(version.build_number(), "7");
    }

    #[test]
    fn missing_file_has_no_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_installed_version(&dir.path().join("absent.ini")).is_none());
    }
}
