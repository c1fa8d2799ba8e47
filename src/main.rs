use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

mod discovery;
mod download;
mod engine;
mod env;
mod error;
mod library;
mod networking;
mod process;
mod scheduler;
mod storage;
mod ui;
mod util;
mod version;

use engine::{ActionResult, InstallationEngine};
use scheduler::AutoUpdateScheduler;

const SETTINGS_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(
    name = "StarTrad",
    author,
    version,
    about = "Keeps the French translation of Star Citizen up to date"
)]
struct Cli {
    /// Print the version and exit.
    #[arg(long)]
    version_only: bool,
    /// Install or update the translation once, then exit.
    #[arg(long)]
    install: bool,
    /// Remove the translation once, then exit.
    #[arg(long, conflicts_with = "install")]
    uninstall: bool,
    /// List the translation installed in each channel, then exit.
    #[arg(long)]
    list: bool,
    /// Start the RSI Launcher (after the installation when combined with --install).
    #[arg(long)]
    launch: bool,
    /// Never show dialogs; only write to the log.
    #[arg(long)]
    silent: bool,
}

fn init_logging() {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    let log_file = env::log_file();
    let opened = env::ensure_base_dirs().and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
    });
    match opened {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(err) => eprintln!("StarTrad: logging to stderr, cannot open {}: {err}", log_file.display()),
    }
    builder.init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version_only {
        println!("StarTrad {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    init_logging();
    info!("StarTrad {} starting", env!("CARGO_PKG_VERSION"));

    let settings = storage::SettingsStore::load(env::settings_path());
    let collaborators = if cli.silent {
        ui::Collaborators::headless()
    } else {
        ui::Collaborators::desktop()
    };
    let engine = Arc::new(InstallationEngine::new(
        settings.clone(),
        discovery::PathDiscovery::system(),
        Arc::new(networking::RemoteContentClient::new()),
        collaborators,
        env::cache_dir(),
    ));

    if cli.list {
        for (channel, version) in engine.installed_versions().await {
            let version = version.map_or_else(|| "not installed".to_owned(), |v| v.to_string());
            println!("{:<28} {version}", channel.label());
        }
        return ExitCode::SUCCESS;
    }

    if cli.install || cli.uninstall {
        let result = if cli.install {
            engine.install(cli.silent).await
        } else {
            engine.uninstall(cli.silent).await
        };
        if cli.launch && result == ActionResult::Successful {
            launch(&engine).await;
        }
        return match result {
            ActionResult::Successful | ActionResult::UserCanceled => ExitCode::SUCCESS,
            ActionResult::Failure | ActionResult::Aborted => ExitCode::FAILURE,
        };
    }

    if cli.launch {
        launch(&engine).await;
    }
    run_resident(engine, settings).await;
    ExitCode::SUCCESS
}

async fn launch(engine: &InstallationEngine) {
    if let Err(err) = engine.launch_launcher().await {
        error!("launch: {err}");
    }
}

/// Stay in the background and install whenever the scheduler says so.
async fn run_resident(engine: Arc<InstallationEngine>, settings: storage::SettingsStore) {
    let (mut scheduler, mut triggers) =
        AutoUpdateScheduler::new(settings.clone(), Arc::new(process::SystemProbe::new()));
    scheduler.start();
    let mut settings_poll = tokio::time::interval(SETTINGS_POLL_INTERVAL);
    settings_poll.tick().await;
    info!("StarTrad running in the background; press Ctrl+C to quit");

    loop {
        tokio::select! {
            trigger = triggers.recv() => {
                let Some(trigger) = trigger else {
                    warn!("scheduler: trigger channel closed");
                    break;
                };
                if engine.is_busy() {
                    info!(
                        "scheduler: {trigger:?} ignored, installation in progress ({:?})",
                        engine.state()
                    );
                } else {
                    info!("scheduler: update triggered by {trigger:?}");
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        let result = engine.install(true).await;
                        info!("scheduler: automatic update {}", result.label());
                    });
                }
            }
            _ = settings_poll.tick() => {
                if settings.reload() {
                    info!("settings: file changed, rescheduling");
                    scheduler.reload();
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    error!("StarTrad: cannot listen for Ctrl+C: {err}");
                }
                break;
            }
        }
    }

    scheduler.stop();
    info!("StarTrad stopped");
}
