use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

pub const LAUNCHER_SHORTCUT: &str = "RSI Launcher.lnk";

pub trait ShortcutResolver: Send + Sync {
    /// Target path of a `.lnk` file.
    fn resolve_target(&self, shortcut: &Path) -> Option<PathBuf>;
}

/// Resolves shortcuts through the `WScript.Shell` COM object.
pub struct PowerShellResolver;

impl ShortcutResolver for PowerShellResolver {
    fn resolve_target(&self, shortcut: &Path) -> Option<PathBuf> {
        let script = format!(
            "(New-Object -ComObject WScript.Shell).CreateShortcut('{}').TargetPath",
            shortcut.display().to_string().replace('\'', "''")
        );

        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            // CREATE_NO_WINDOW
            cmd.creation_flags(0x08000000);
        }

        let output = match cmd.output() {
            Ok(output) => output,
            Err(err) => {
                debug!("discovery: powershell unavailable: {err}");
                return None;
            }
        };
        if !output.status.success() {
            return None;
        }

        let target = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        (!target.is_empty()).then(|| PathBuf::from(target))
    }
}

/// First launcher shortcut target, looked up in `dirs` in order, for which
/// `accept` holds.
pub fn shortcut_target(
    dirs: &[PathBuf],
    resolver: &dyn ShortcutResolver,
    accept: impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(LAUNCHER_SHORTCUT))
        .filter(|shortcut| shortcut.is_file())
        .filter_map(|shortcut| resolver.resolve_target(&shortcut))
        .find(|target| accept(target))
}
