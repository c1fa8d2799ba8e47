use std::sync::atomic::{AtomicBool, Ordering};

/// Terminal outcome of an install or uninstall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionResult {
    Successful,
    Failure,
    /// Another installation was already running.
    Aborted,
    /// The user selected no channel.
    UserCanceled,
}

impl ActionResult {
    pub fn label(self) -> &'static str {
        match self {
            ActionResult::Successful => "successful",
            ActionResult::Failure => "failure",
            ActionResult::Aborted => "aborted",
            ActionResult::UserCanceled => "canceled by user",
        }
    }
}

/// Where the engine currently is in an installation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    QueryingVersion,
    DecidingChannels,
    AwaitingChannelSelection,
    Downloading,
    Installing,
    Uninstalling,
    Done(ActionResult),
}

/// At most one installation at a time.
#[derive(Debug, Default)]
pub struct InstallGuard {
    running: AtomicBool,
}

impl InstallGuard {
    /// Claims the guard, or `None` if an installation is already running.
    /// The guard is released when the returned ticket is dropped.
    pub fn try_begin(&self) -> Option<InstallTicket<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InstallTicket { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn end(&self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct InstallTicket<'a> {
    guard: &'a InstallGuard,
}

impl Drop for InstallTicket<'_> {
    fn drop(&mut self) {
        self.guard.end();
    }
}
