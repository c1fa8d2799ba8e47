use std::path::{Path, PathBuf};

use log::debug;

/// Product code the RSI Launcher installer registers itself under.
pub const LAUNCHER_PRODUCT_KEY: &str = "81bfc699-f883-50c7-b674-2483b6baae23";

const INSTALL_LOCATION: &str = "InstallLocation";
const UNINSTALL_VALUES: [&str; 3] = ["DisplayIcon", "QuietUninstallString", "UninstallString"];

/// Read-only access to `HKEY_LOCAL_MACHINE` string values.
pub trait RegistryReader: Send + Sync {
    fn read_string(&self, key_path: &str, value_name: &str) -> Option<String>;
}

/// Reader for platforms without a registry.
pub struct NoRegistry;

impl RegistryReader for NoRegistry {
    fn read_string(&self, _key_path: &str, _value_name: &str) -> Option<String> {
        None
    }
}

#[cfg(windows)]
pub struct WindowsRegistry;

#[cfg(windows)]
impl RegistryReader for WindowsRegistry {
    fn read_string(&self, key_path: &str, value_name: &str) -> Option<String> {
        use winreg::RegKey;
        use winreg::enums::HKEY_LOCAL_MACHINE;

        let key = RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey(key_path)
            .ok()?;
        key.get_value::<String, _>(value_name).ok()
    }
}

pub fn platform_reader() -> std::sync::Arc<dyn RegistryReader> {
    #[cfg(windows)]
    {
        std::sync::Arc::new(WindowsRegistry)
    }
    #[cfg(not(windows))]
    {
        std::sync::Arc::new(NoRegistry)
    }
}

/// Launcher folder candidates found in the registry, most reliable first.
pub fn launcher_folder_candidates(reader: &dyn RegistryReader) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    let product_key = format!(r"SOFTWARE\{LAUNCHER_PRODUCT_KEY}");
    if let Some(location) = reader.read_string(&product_key, INSTALL_LOCATION) {
        let location = location.trim().trim_matches('"');
        if !location.is_empty() {
            candidates.push(PathBuf::from(location));
        }
    }

    let uninstall_key =
        format!(r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\{LAUNCHER_PRODUCT_KEY}");
    for value_name in UNINSTALL_VALUES {
        let Some(value) = reader.read_string(&uninstall_key, value_name) else {
            continue;
        };
        match executable_from_command(&value)
            .as_deref()
            .and_then(Path::parent)
        {
            Some(folder) if !folder.as_os_str().is_empty() => candidates.push(folder.to_path_buf()),
            _ => debug!("discovery: registry value {value_name} unusable: {value}"),
        }
    }

    candidates
}

/// Extract the executable from a command line or icon reference such as
/// `"C:\RSI Launcher\Uninstall RSI Launcher.exe" /currentuser /S` or
/// `C:\RSI Launcher\RSI Launcher.exe,0`.
pub fn executable_from_command(command: &str) -> Option<PathBuf> {
    let command = command.trim();
    let executable = if let Some(rest) = command.strip_prefix('"') {
        match rest.find('"') {
            Some(end) => &rest[..end],
            None => rest,
        }
    } else {
        let end = command.find(" /").unwrap_or(command.len());
        let path = &command[..end];
        match path.rfind(',') {
            Some(comma) if path[comma + 1..].trim().parse::<i32>().is_ok() => &path[..comma],
            _ => path,
        }
    };

    let executable = executable.trim();
    (!executable.is_empty()).then(|| PathBuf::from(executable))
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeRegistry;
    use super::*;

    fn uninstall_key() -> String {
        format!(r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\{LAUNCHER_PRODUCT_KEY}")
    }

    #[test]
    fn parses_quoted_commands() {
        assert_eq!(
            executable_from_command(r#""C:\RSI Launcher\Uninstall RSI Launcher.exe" /currentuser /S"#),
            Some(PathBuf::from(r"C:\RSI Launcher\Uninstall RSI Launcher.exe"))
        );
        assert_eq!(
            executable_from_command(r#""C:\RSI Launcher\RSI Launcher.exe"#),
            Some(PathBuf::from(r"C:\RSI Launcher\RSI Launcher.exe"))
        );
    }

    #[test]
    fn parses_unquoted_commands_and_icons() {
        assert_eq!(
            executable_from_command(r"C:\RSI\Uninstall.exe /S"),
            Some(PathBuf::from(r"C:\RSI\Uninstall.exe"))
        );
        assert_eq!(
            executable_from_command(r"C:\RSI\RSI Launcher.exe,0"),
            Some(PathBuf::from(r"C:\RSI\RSI Launcher.exe"))
        );
        assert_eq!(executable_from_command("   "), None);
        assert_eq!(executable_from_command(r#""""#), None);
    }

    #[test]
    fn collects_candidates_in_priority_order() {
        let base = std::env::temp_dir().join("rsi-registry-test");
        let exe = base.join("Uninstall RSI Launcher.exe");
        let registry = FakeRegistry::default()
            .with(
                &format!(r"SOFTWARE\{LAUNCHER_PRODUCT_KEY}"),
                "InstallLocation",
                &format!("\"{}\"", base.join("primary").display()),
            )
            .with(
                &uninstall_key(),
                "UninstallString",
                &format!("\"{}\" /currentuser", exe.display()),
            );

        let candidates = launcher_folder_candidates(&registry);
        assert_eq!(candidates, vec![base.join("primary"), base.clone()]);
    }

    #[test]
    fn missing_keys_yield_nothing() {
        assert!(launcher_folder_candidates(&NoRegistry).is_empty());
    }
}
