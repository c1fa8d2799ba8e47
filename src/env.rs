use std::env;
use std::fs;
use std::path::PathBuf;

const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "startrad.log";

/// Returns the root directory StarTrad keeps its own files in.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share")),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("startrad")
}

/// Downloaded translation files wait here until they are copied into a channel.
pub fn cache_dir() -> PathBuf {
    default_app_dir().join("cache")
}

pub fn logs_dir() -> PathBuf {
    default_app_dir().join("logs")
}

pub fn log_file() -> PathBuf {
    logs_dir().join(LOG_FILE)
}

pub fn settings_path() -> PathBuf {
    default_app_dir().join(SETTINGS_FILE)
}

/// Create the on-disk folder layout expected by StarTrad.
pub fn ensure_base_dirs() -> std::io::Result<()> {
    for dir in [default_app_dir(), cache_dir(), logs_dir()] {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// The user's profile directory, e.g. `C:\Users\<name>`.
pub fn user_profile_dir() -> Option<PathBuf> {
    env::var_os("USERPROFILE")
        .or_else(|| env::var_os("HOME"))
        .map(PathBuf::from)
}

/// The roaming application data directory the RSI Launcher writes its
/// local storage and logs into.
pub fn roaming_app_data_dir() -> Option<PathBuf> {
    env::var_os("APPDATA")
        .map(PathBuf::from)
        .or_else(|| user_profile_dir().map(|home| home.join("AppData").join("Roaming")))
}

/// Folders that may hold an "RSI Launcher" shortcut: the per-user and
/// all-users Start Menu, then both desktops.
pub fn shortcut_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let start_menu_roots = [
        roaming_app_data_dir(),
        env::var_os("PROGRAMDATA").map(PathBuf::from),
    ];
    for root in start_menu_roots.into_iter().flatten() {
        let programs = root
            .join("Microsoft")
            .join("Windows")
            .join("Start Menu")
            .join("Programs");
        dirs.push(programs.join("Roberts Space Industries"));
        dirs.push(programs);
    }
    if let Some(home) = user_profile_dir() {
        dirs.push(home.join("Desktop"));
    }
    if let Some(public) = env::var_os("PUBLIC") {
        dirs.push(PathBuf::from(public).join("Desktop"));
    }
    dirs
}
