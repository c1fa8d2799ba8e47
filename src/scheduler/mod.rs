use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::process::{
    LAUNCHER_PROCESS_NAME, LaunchDebouncer, LauncherEvent, ProcessProbe, start_external_tools,
};
use crate::storage::SettingsStore;

const HOUR: u64 = 60 * 60;
const PROCESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How often the translation is refreshed automatically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCadence {
    Never,
    #[default]
    StartRsiLauncher,
    EverySixHours,
    EveryTwelveHours,
    EveryTwentyFourHours,
    EveryFortyEightHours,
    EverySevenDays,
}

impl UpdateCadence {
    #[cfg(test)]
    pub const ALL: [UpdateCadence; 7] = [
        UpdateCadence::Never,
        UpdateCadence::StartRsiLauncher,
        UpdateCadence::EverySixHours,
        UpdateCadence::EveryTwelveHours,
        UpdateCadence::EveryTwentyFourHours,
        UpdateCadence::EveryFortyEightHours,
        UpdateCadence::EverySevenDays,
    ];

    pub fn label(self) -> &'static str {
        match self {
            UpdateCadence::Never => "Never",
            UpdateCadence::StartRsiLauncher => "When the RSI Launcher starts",
            UpdateCadence::EverySixHours => "Every 6 hours",
            UpdateCadence::EveryTwelveHours => "Every 12 hours",
            UpdateCadence::EveryTwentyFourHours => "Every 24 hours",
            UpdateCadence::EveryFortyEightHours => "Every 48 hours",
            UpdateCadence::EverySevenDays => "Every 7 days",
        }
    }

    /// Timer period for interval cadences.
    pub fn period(self) -> Option<Duration> {
        let hours = match self {
            UpdateCadence::Never | UpdateCadence::StartRsiLauncher => return None,
            UpdateCadence::EverySixHours => 6,
            UpdateCadence::EveryTwelveHours => 12,
            UpdateCadence::EveryTwentyFourHours => 24,
            UpdateCadence::EveryFortyEightHours => 48,
            UpdateCadence::EverySevenDays => 7 * 24,
        };
        Some(Duration::from_secs(hours * HOUR))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateTrigger {
    Timer,
    LauncherStarted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerPlan {
    /// The update is overdue and should run right away.
    pub fire_now: bool,
    /// Delay before the next timed update.
    pub first_delay: Duration,
    /// Steady-state period after that.
    pub period: Duration,
}

/// Work out the timer for an interval cadence. `None` for cadences that are
/// not timer driven.
pub fn plan_timer(
    cadence: UpdateCadence,
    last_update: Option<DateTime<Local>>,
    now: DateTime<Local>,
) -> Option<TimerPlan> {
    let period = cadence.period()?;
    let overdue = TimerPlan {
        fire_now: true,
        first_delay: period,
        period,
    };

    let Some(last_update) = last_update else {
        return Some(overdue);
    };
    let Some(due) = TimeDelta::from_std(period)
        .ok()
        .and_then(|delta| last_update.checked_add_signed(delta))
    else {
        return Some(overdue);
    };

    if due <= now {
        return Some(overdue);
    }
    let remaining = (due - now).to_std().unwrap_or(period);
    Some(TimerPlan {
        fire_now: false,
        first_delay: remaining.min(period),
        period,
    })
}

/// Emits [`UpdateTrigger`]s according to the configured cadence.
pub struct AutoUpdateScheduler {
    settings: SettingsStore,
    probe: Arc<dyn ProcessProbe>,
    triggers: mpsc::UnboundedSender<UpdateTrigger>,
    poll_interval: Duration,
    /// Outlives individual watch tasks so a reload does not report a launcher
    /// that is already running as freshly started.
    debouncer: Arc<Mutex<LaunchDebouncer>>,
    timer: Option<JoinHandle<()>>,
    watch: Option<JoinHandle<()>>,
}

impl AutoUpdateScheduler {
    pub fn new(
        settings: SettingsStore,
        probe: Arc<dyn ProcessProbe>,
    ) -> (Self, mpsc::UnboundedReceiver<UpdateTrigger>) {
        let (triggers, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            settings,
            probe,
            triggers,
            poll_interval: PROCESS_POLL_INTERVAL,
            debouncer: Arc::new(Mutex::new(LaunchDebouncer::default())),
            timer: None,
            watch: None,
        };
        (scheduler, receiver)
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start the timer and/or process watch for the current settings. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self) {
        let settings = self.settings.snapshot();
        let cadence = settings.update_method;
        info!("scheduler: automatic update: {}", cadence.label());

        let wants_watch = cadence == UpdateCadence::StartRsiLauncher
            || !settings.external_tools().is_empty();
        if wants_watch && self.watch.is_none() {
            debug!("scheduler: watching for {LAUNCHER_PROCESS_NAME}");
            self.watch = Some(tokio::spawn(watch_launcher(
                self.probe.clone(),
                self.settings.clone(),
                self.triggers.clone(),
                self.debouncer.clone(),
                self.poll_interval,
            )));
        }

        if self.timer.is_none()
            && let Some(plan) = plan_timer(cadence, settings.last_update, Local::now())
        {
            info!(
                "scheduler: next update in {}s (overdue: {})",
                plan.first_delay.as_secs(),
                plan.fire_now
            );
            self.timer = Some(tokio::spawn(run_timer(plan, self.triggers.clone())));
        }
    }

    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(watch) = self.watch.take() {
            watch.abort();
        }
    }

    /// Restart from the current settings.
    pub fn reload(&mut self) {
        info!("scheduler: reloading");
        self.stop();
        self.start();
    }

    #[cfg(test)]
    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    #[cfg(test)]
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }
}

impl Drop for AutoUpdateScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(plan: TimerPlan, triggers: mpsc::UnboundedSender<UpdateTrigger>) {
    if plan.fire_now && triggers.send(UpdateTrigger::Timer).is_err() {
        return;
    }

    let mut delay = plan.first_delay;
    loop {
        tokio::time::sleep(delay).await;
        debug!("scheduler: timer elapsed");
        if triggers.send(UpdateTrigger::Timer).is_err() {
            return;
        }
        delay = plan.period;
    }
}

async fn watch_launcher(
    probe: Arc<dyn ProcessProbe>,
    settings: SettingsStore,
    triggers: mpsc::UnboundedSender<UpdateTrigger>,
    debouncer: Arc<Mutex<LaunchDebouncer>>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let running = {
            let probe = probe.clone();
            tokio::task::spawn_blocking(move || probe.is_running(LAUNCHER_PROCESS_NAME))
                .await
                .unwrap_or_else(|err| {
                    warn!("scheduler: process probe failed: {err}");
                    false
                })
        };

        let event = match debouncer.lock() {
            Ok(mut debouncer) => debouncer.observe(running),
            Err(poisoned) => poisoned.into_inner().observe(running),
        };
        match event {
            Some(LauncherEvent::Started) => {
                info!("scheduler: {LAUNCHER_PROCESS_NAME} started");
                let current = settings.snapshot();
                if current.update_method == UpdateCadence::StartRsiLauncher
                    && triggers.send(UpdateTrigger::LauncherStarted).is_err()
                {
                    return;
                }
                let tools = current.external_tools();
                if !tools.is_empty() {
                    let probe = probe.clone();
                    match tokio::task::spawn_blocking(move || {
                        start_external_tools(&tools, probe.as_ref())
                    })
                    .await
                    {
                        Ok(started) => debug!("scheduler: started {} external tool(s)", started.len()),
                        Err(err) => warn!("scheduler: starting external tools failed: {err}"),
                    }
                }
            }
            Some(LauncherEvent::Stopped) => info!("scheduler: {LAUNCHER_PROCESS_NAME} stopped"),
            None => {}
        }
    }
}
