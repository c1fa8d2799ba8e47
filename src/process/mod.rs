use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use log::{debug, info, warn};
use sysinfo::{ProcessesToUpdate, System};

use crate::discovery::LAUNCHER_EXECUTABLE;

pub const LAUNCHER_PROCESS_NAME: &str = "RSI Launcher";

/// Answers whether a process with a given name is running.
pub trait ProcessProbe: Send + Sync {
    fn is_running(&self, name: &str) -> bool;
}

pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SystemProbe {
    fn is_running(&self, name: &str) -> bool {
        let Ok(mut system) = self.system.lock() else {
            return false;
        };
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes()
            .values()
            .any(|process| process_name_matches(&process.name().to_string_lossy(), name))
    }
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

pub fn process_name_matches(actual: &str, expected: &str) -> bool {
    strip_exe(actual).eq_ignore_ascii_case(strip_exe(expected))
}

/// Process name of a tool configured by path, e.g. `C:\Tools\Overlay.exe`
/// gives `Overlay`.
pub fn tool_process_name(path: &str) -> &str {
    let file_name = path.rsplit(['\\', '/']).next().unwrap_or(path);
    strip_exe(file_name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LauncherEvent {
    Started,
    Stopped,
}

/// Turns repeated running/not-running observations into edge events.
#[derive(Debug, Default)]
pub struct LaunchDebouncer {
    running: bool,
}

impl LaunchDebouncer {
    pub fn observe(&mut self, running: bool) -> Option<LauncherEvent> {
        if running == self.running {
            return None;
        }
        self.running = running;
        Some(if running {
            LauncherEvent::Started
        } else {
            LauncherEvent::Stopped
        })
    }
}

/// Start every tool that is not already running. Returns the tools that
/// were started.
pub fn start_external_tools(tools: &[String], probe: &dyn ProcessProbe) -> Vec<String> {
    let mut started = Vec::new();
    for tool in tools {
        let name = tool_process_name(tool);
        if probe.is_running(name) {
            debug!("process: {name} already running");
            continue;
        }
        match open::that_detached(tool) {
            Ok(()) => {
                info!("process: started external tool {tool}");
                started.push(tool.clone());
            }
            Err(err) => warn!("process: cannot start {tool}: {err}"),
        }
    }
    started
}

/// Start `RSI Launcher.exe` from `launcher_folder`.
pub fn launch_rsi_launcher(launcher_folder: &Path) -> Result<(), String> {
    let executable = launcher_folder.join(LAUNCHER_EXECUTABLE);
    if !executable.is_file() {
        warn!("launch: launcher not found at {}", executable.display());
        return Err(format!("RSI Launcher not found at {}", executable.display()));
    }

    let mut cmd = Command::new(&executable);
    cmd.current_dir(launcher_folder);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // DETACHED_PROCESS
        cmd.creation_flags(0x00000008);
    }

    cmd.spawn()
        .map_err(|e| format!("failed to start the RSI Launcher: {e}"))?;
    info!("launch: RSI Launcher started");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeProbe;
    use super::*;

    #[test]
    fn names_match_without_extension_or_case() {
        assert!(process_name_matches("RSI Launcher.exe", "RSI Launcher"));
        assert!(process_name_matches("rsi launcher", "RSI Launcher.EXE"));
        assert!(!process_name_matches("RSI Launcher Helper", "RSI Launcher"));
    }

    #[test]
    fn tool_names_come_from_the_file_name() {
        assert_eq!(tool_process_name(r"C:\Tools\Overlay.exe"), "Overlay");
        assert_eq!(tool_process_name("/opt/tool"), "tool");
        assert_eq!(tool_process_name("plain.EXE"), "plain");
    }

    #[test]
    fn debouncer_reports_edges_only() {
        let mut debouncer = LaunchDebouncer::default();
        assert_eq!(debouncer.observe(false), None);
        assert_eq!(debouncer.observe(true), Some(LauncherEvent::Started));
        assert_eq!(debouncer.observe(true), None);
        assert_eq!(debouncer.observe(true), None);
        assert_eq!(debouncer.observe(false), Some(LauncherEvent::Stopped));
        assert_eq!(debouncer.observe(true), Some(LauncherEvent::Started));
    }

    #[test]
    fn running_tools_are_not_started_again() {
        let probe = FakeProbe::default();
        probe.set_running("Overlay.exe", true);

        let started = start_external_tools(&[r"C:\Tools\Overlay.exe".to_owned()], &probe);
        assert!(started.is_empty());
    }

    #[test]
    fn missing_launcher_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(launch_rsi_launcher(dir.path()).is_err());
    }

    #[test]
    fn system_probe_does_not_find_nonsense() {
        let probe = SystemProbe::new();
        assert!(!probe.is_running("startrad-no-such-process-4f1c"));
    }
}
