pub mod launcher_log;
pub mod local_storage;
pub mod registry;
pub mod shortcut;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::env;
use crate::library::LibraryFolder;

use registry::RegistryReader;
use shortcut::{PowerShellResolver, ShortcutResolver};

pub const DEFAULT_LIBRARY_FOLDER: &str = r"C:\Program Files\Roberts Space Industries";
pub const LAUNCHER_DIR_NAME: &str = "RSI Launcher";
pub const LAUNCHER_EXECUTABLE: &str = "RSI Launcher.exe";

/// A named way of guessing a folder.
pub struct Strategy {
    pub name: &'static str,
    pub find: fn(&PathDiscovery) -> Option<PathBuf>,
}

const LIBRARY_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "settings",
        find: |ctx| ctx.cached_library_folder.clone(),
    },
    Strategy {
        name: "default location",
        find: |ctx| Some(ctx.default_library_folder.clone()),
    },
    Strategy {
        name: "registry",
        find: |ctx| {
            registry::launcher_folder_candidates(ctx.registry.as_ref())
                .into_iter()
                .find(|folder| is_valid_launcher_folder(folder))
                .and_then(|folder| folder.parent().map(Path::to_path_buf))
        },
    },
    Strategy {
        name: "launcher local storage",
        find: |ctx| {
            let roaming = ctx.roaming_app_data.as_deref()?;
            local_storage::library_folder_from_local_storage(roaming, &ctx.default_library_folder)
        },
    },
    Strategy {
        name: "launcher log",
        find: |ctx| {
            let roaming = ctx.roaming_app_data.as_deref()?;
            launcher_log::library_folder_from_log(&launcher_log::launcher_log_file(roaming))
        },
    },
    Strategy {
        name: "shortcut",
        find: |ctx| {
            launcher_from_shortcut(ctx).and_then(|folder| folder.parent().map(Path::to_path_buf))
        },
    },
];

const LAUNCHER_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "settings",
        find: |ctx| ctx.cached_launcher_folder.clone(),
    },
    Strategy {
        name: "default location",
        find: |ctx| Some(ctx.default_library_folder.join(LAUNCHER_DIR_NAME)),
    },
    Strategy {
        name: "library folder",
        find: |ctx| {
            ctx.library_folder
                .as_ref()
                .map(|library| library.join(LAUNCHER_DIR_NAME))
        },
    },
    Strategy {
        name: "registry",
        find: |ctx| {
            registry::launcher_folder_candidates(ctx.registry.as_ref())
                .into_iter()
                .find(|folder| is_valid_launcher_folder(folder))
        },
    },
    Strategy {
        name: "shortcut",
        find: launcher_from_shortcut,
    },
];

fn launcher_from_shortcut(ctx: &PathDiscovery) -> Option<PathBuf> {
    shortcut::shortcut_target(&ctx.shortcut_dirs, ctx.shortcuts.as_ref(), |target| {
        target.parent().is_some_and(is_valid_launcher_folder)
    })
    .and_then(|target| target.parent().map(Path::to_path_buf))
}

pub fn is_valid_launcher_folder(path: &Path) -> bool {
    path.join(LAUNCHER_EXECUTABLE).is_file()
}

/// Evaluate `strategies` in order and return the first candidate `is_valid`
/// accepts.
pub fn first_valid(
    ctx: &PathDiscovery,
    target: &str,
    strategies: &[Strategy],
    is_valid: fn(&Path) -> bool,
) -> Option<PathBuf> {
    for strategy in strategies {
        let Some(candidate) = (strategy.find)(ctx) else {
            debug!("discovery: {target} not found via {}", strategy.name);
            continue;
        };
        if is_valid(&candidate) {
            info!(
                "discovery: {target} found via {}: {}",
                strategy.name,
                candidate.display()
            );
            return Some(candidate);
        }
        debug!(
            "discovery: {target} candidate from {} rejected: {}",
            strategy.name,
            candidate.display()
        );
    }

    warn!("discovery: unable to locate the {target}");
    None
}

/// Locates the game library and the launcher on this machine.
#[derive(Clone)]
pub struct PathDiscovery {
    default_library_folder: PathBuf,
    roaming_app_data: Option<PathBuf>,
    shortcut_dirs: Vec<PathBuf>,
    registry: Arc<dyn RegistryReader>,
    shortcuts: Arc<dyn ShortcutResolver>,
    cached_library_folder: Option<PathBuf>,
    cached_launcher_folder: Option<PathBuf>,
    library_folder: Option<PathBuf>,
}

impl PathDiscovery {
    pub fn new(
        default_library_folder: PathBuf,
        roaming_app_data: Option<PathBuf>,
        shortcut_dirs: Vec<PathBuf>,
        registry: Arc<dyn RegistryReader>,
        shortcuts: Arc<dyn ShortcutResolver>,
    ) -> Self {
        Self {
            default_library_folder,
            roaming_app_data,
            shortcut_dirs,
            registry,
            shortcuts,
            cached_library_folder: None,
            cached_launcher_folder: None,
            library_folder: None,
        }
    }

    /// Discovery against the real machine.
    pub fn system() -> Self {
        Self::new(
            PathBuf::from(DEFAULT_LIBRARY_FOLDER),
            env::roaming_app_data_dir(),
            env::shortcut_dirs(),
            registry::platform_reader(),
            Arc::new(PowerShellResolver),
        )
    }

    pub fn library_folder(&self, cached: Option<&Path>) -> Option<PathBuf> {
        let ctx = Self {
            cached_library_folder: cached.map(Path::to_path_buf),
            ..self.clone()
        };
        first_valid(
            &ctx,
            "library folder",
            LIBRARY_STRATEGIES,
            LibraryFolder::is_valid_path,
        )
    }

    pub fn launcher_folder(&self, cached: Option<&Path>, library: Option<&Path>) -> Option<PathBuf> {
        let ctx = Self {
            cached_launcher_folder: cached.map(Path::to_path_buf),
            library_folder: library.map(Path::to_path_buf),
            ..self.clone()
        };
        first_valid(
            &ctx,
            "launcher folder",
            LAUNCHER_STRATEGIES,
            is_valid_launcher_folder,
        )
    }
}


#[cfg(test)]
mod tests {
    use std::fs;

    use super::registry::fakes::FakeRegistry;
    use super::registry::{LAUNCHER_PRODUCT_KEY, NoRegistry};
    use super::shortcut::LAUNCHER_SHORTCUT;
    use super::shortcut::fakes::FixedTarget;
    use super::*;
    use crate::library::fixtures::make_library;

    fn make_launcher(folder: &Path) {
        fs::create_dir_all(folder).expect("launcher dir");
        fs::write(folder.join(LAUNCHER_EXECUTABLE), b"exe").expect("exe");
    }

    fn discovery(
        default: &Path,
        roaming: Option<&Path>,
        shortcut_dirs: Vec<PathBuf>,
        registry: Arc<dyn RegistryReader>,
        target: Option<PathBuf>,
    ) -> PathDiscovery {
        PathDiscovery::new(
            default.to_path_buf(),
            roaming.map(Path::to_path_buf),
            shortcut_dirs,
            registry,
            Arc::new(FixedTarget(target)),
        )
    }

    #[test]
    fn cached_folder_wins_when_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cached = dir.path().join("cached");
        let default = dir.path().join("default");
        make_library(&cached, &["LIVE"]);
        make_library(&default, &["LIVE"]);

        let discovery = discovery(&default, None, vec![], Arc::new(NoRegistry), None);
        assert_eq!(discovery.library_folder(Some(&cached)), Some(cached));
    }

    #[test]
    fn stale_cache_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default = dir.path().join("default");
        make_library(&default, &["PTU"]);

        let discovery = discovery(&default, None, vec![], Arc::new(NoRegistry), None);
        assert_eq!(
            discovery.library_folder(Some(&dir.path().join("gone"))),
            Some(default)
        );
    }

    #[test]
    fn registry_install_location_gives_library_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("Games");
        let launcher = library.join(LAUNCHER_DIR_NAME);
        make_library(&library, &["LIVE"]);
        make_launcher(&launcher);

        let registry = FakeRegistry::default().with(
            &format!(r"SOFTWARE\{LAUNCHER_PRODUCT_KEY}"),
            "InstallLocation",
            &launcher.display().to_string(),
        );
        let discovery = discovery(
            &dir.path().join("missing"),
            None,
            vec![],
            Arc::new(registry),
            None,
        );

        assert_eq!(discovery.library_folder(None), Some(library.clone()));
        assert_eq!(discovery.launcher_folder(None, None), Some(launcher));
    }

    #[test]
    fn launcher_log_strategy_is_consulted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("Elsewhere");
        make_library(&library, &["LIVE"]);
        let roaming = dir.path().join("roaming");
        let log = launcher_log::launcher_log_file(&roaming);
        fs::create_dir_all(log.parent().expect("parent")).expect("logs");
        fs::write(
            &log,
            format!("CHANGE_LIBRARY_FOLDER\n{{\n\"f\":\n\"{}\"\n", library.display()),
        )
        .expect("log");

        let discovery = discovery(
            &dir.path().join("missing"),
            Some(&roaming),
            vec![],
            Arc::new(NoRegistry),
            None,
        );
        assert_eq!(discovery.library_folder(None), Some(library));
    }

    #[test]
    fn unreadable_local_storage_falls_through_to_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("FromLog");
        make_library(&library, &["LIVE"]);
        let roaming = dir.path().join("roaming");

        let db_dir = local_storage::local_storage_dir(&roaming);
        fs::create_dir_all(&db_dir).expect("db dir");
        fs::write(db_dir.join("CURRENT"), "MANIFEST-000042\n").expect("current");
        fs::write(db_dir.join("000003.log"), b"\xde\xad\xbe\xef").expect("garbage");

        let log = launcher_log::launcher_log_file(&roaming);
        fs::create_dir_all(log.parent().expect("parent")).expect("logs");
        fs::write(
            &log,
            format!("CHANGE_LIBRARY_FOLDER\n{{\n\"f\":\n\"{}\"\n", library.display()),
        )
        .expect("log");

        let discovery = discovery(
            &dir.path().join("missing"),
            Some(&roaming),
            vec![],
            Arc::new(NoRegistry),
            None,
        );
        assert_eq!(discovery.library_folder(None), Some(library));
    }

    #[test]
    fn shortcut_target_resolves_both_folders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("SC");
        let launcher = library.join(LAUNCHER_DIR_NAME);
        make_library(&library, &["LIVE"]);
        make_launcher(&launcher);
        let desktop = dir.path().join("Desktop");
        fs::create_dir_all(&desktop).expect("desktop");
        fs::write(desktop.join(LAUNCHER_SHORTCUT), b"lnk").expect("lnk");

        let discovery = discovery(
            &dir.path().join("missing"),
            None,
            vec![desktop],
            Arc::new(NoRegistry),
            Some(launcher.join(LAUNCHER_EXECUTABLE)),
        );

        assert_eq!(discovery.library_folder(None), Some(library));
        assert_eq!(discovery.launcher_folder(None, None), Some(launcher));
    }

    #[test]
    fn launcher_found_relative_to_library() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("lib");
        let launcher = library.join(LAUNCHER_DIR_NAME);
        make_launcher(&launcher);

        let discovery = discovery(
            &dir.path().join("missing"),
            None,
            vec![],
            Arc::new(NoRegistry),
            None,
        );
        assert_eq!(discovery.launcher_folder(None, Some(&library)), Some(launcher));
    }

    #[test]
    fn all_strategies_failing_yields_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let discovery = discovery(dir.path(), None, vec![], Arc::new(NoRegistry), None);

        assert!(discovery.library_folder(None).is_none());
        assert!(discovery.launcher_folder(None, None).is_none());
    }
}
