use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::engine::state::ActionResult;
use crate::library::ChannelFolder;
use crate::networking::ContentSource;
use crate::util::progress_percent;

/// One remote file, downloaded once and installed into every channel that
/// needs it.
#[derive(Debug)]
pub struct TranslationDownloadJob {
    url: String,
    local_path: PathBuf,
    channels: Vec<ChannelFolder>,
    received: u64,
    total: u64,
    completed: bool,
    error: Option<String>,
}

impl TranslationDownloadJob {
    fn new(url: &str, work_dir: &Path) -> Self {
        Self {
            url: url.to_owned(),
            local_path: work_dir.join(format!("{}.ini", Uuid::new_v4())),
            channels: Vec::new(),
            received: 0,
            total: 0,
            completed: false,
            error: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn channels(&self) -> &[ChannelFolder] {
        &self.channels
    }

    #[cfg(test)]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Bytes received over all jobs of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub received: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f32 {
        progress_percent(self.received, Some(self.total))
    }
}

#[derive(Debug)]
pub enum JobEvent {
    Progress {
        job: usize,
        received: u64,
        total: Option<u64>,
    },
    Finished {
        job: usize,
        error: Option<String>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum BatchUpdate {
    Progress(ProgressSnapshot),
    /// Every job has completed. Emitted once per batch.
    Finished(ActionResult),
    Ignored,
}

/// Collects the jobs to download. Consumed by [`DownloadCoordinator::start`].
pub struct DownloadCoordinator {
    work_dir: PathBuf,
    jobs: Vec<TranslationDownloadJob>,
}

impl DownloadCoordinator {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            jobs: Vec::new(),
        }
    }

    /// Attach `channel` to the job for `url`, creating the job on first use.
    pub fn add_job(&mut self, channel: ChannelFolder, url: &str) {
        match self.jobs.iter_mut().find(|job| job.url == url) {
            Some(job) => job.channels.push(channel),
            None => {
                let mut job = TranslationDownloadJob::new(url, &self.work_dir);
                job.channels.push(channel);
                self.jobs.push(job);
            }
        }
    }

    #[cfg(test)]
    pub fn jobs(&self) -> &[TranslationDownloadJob] {
        &self.jobs
    }

    /// Download every job concurrently and wait for all of them.
    pub async fn start(
        self,
        source: Arc<dyn ContentSource>,
        progress: &(dyn Fn(ProgressSnapshot) + Send + Sync),
    ) -> DownloadBatch {
        let mut batch = DownloadBatch::new(self.jobs);
        if batch.jobs.is_empty() {
            batch.result = Some(ActionResult::Successful);
            return batch;
        }

        if let Err(err) = fs::create_dir_all(&self.work_dir) {
            error!(
                "download: cannot create {}: {err}",
                self.work_dir.display()
            );
            batch.result = Some(ActionResult::Failure);
            return batch;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (index, job) in batch.jobs.iter().enumerate() {
            remove_file_if_present(&job.local_path);
            info!("download: fetching {} for {} channel(s)", job.url, job.channels.len());

            let source = source.clone();
            let url = job.url.clone();
            let dest = job.local_path.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let progress_tx = tx.clone();
                let on_progress = move |received, total| {
                    let _ = progress_tx.send(JobEvent::Progress {
                        job: index,
                        received,
                        total,
                    });
                };
                let error = source.download(&url, &dest, &on_progress).await.err();
                let _ = tx.send(JobEvent::Finished { job: index, error });
            });
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            match batch.record(event) {
                BatchUpdate::Progress(snapshot) => progress(snapshot),
                BatchUpdate::Finished(_) => break,
                BatchUpdate::Ignored => {}
            }
        }

        if batch.result.is_none() {
            error!("download: a download task stopped without reporting");
            batch.result = Some(ActionResult::Failure);
        }
        batch
    }
}

/// The jobs of a started coordinator and their aggregate outcome.
#[derive(Debug)]
pub struct DownloadBatch {
    jobs: Vec<TranslationDownloadJob>,
    result: Option<ActionResult>,
}

impl DownloadBatch {
    fn new(jobs: Vec<TranslationDownloadJob>) -> Self {
        Self { jobs, result: None }
    }

    pub fn jobs(&self) -> &[TranslationDownloadJob] {
        &self.jobs
    }

    pub fn result(&self) -> ActionResult {
        self.result.unwrap_or(ActionResult::Failure)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.jobs.iter().fold(
            ProgressSnapshot {
                received: 0,
                total: 0,
            },
            |acc, job| ProgressSnapshot {
                received: acc.received + job.received,
                total: acc.total + job.total,
            },
        )
    }

    /// Apply one job event. The terminal update is produced exactly once,
    /// after every job has finished, whatever order events arrive in.
    pub fn record(&mut self, event: JobEvent) -> BatchUpdate {
        if self.result.is_some() {
            return BatchUpdate::Ignored;
        }

        match event {
            JobEvent::Progress {
                job,
                received,
                total,
            } => {
                let Some(job) = self.jobs.get_mut(job) else {
                    return BatchUpdate::Ignored;
                };
                if job.completed {
                    return BatchUpdate::Ignored;
                }
                job.received = received;
                if let Some(total) = total {
                    job.total = total;
                }
                BatchUpdate::Progress(self.snapshot())
            }
            JobEvent::Finished { job, error } => {
                let Some(entry) = self.jobs.get_mut(job) else {
                    return BatchUpdate::Ignored;
                };
                if entry.completed {
                    return BatchUpdate::Ignored;
                }
                entry.completed = true;
                if let Some(err) = &error {
                    warn!("download: {} failed: {err}", entry.url);
                } else {
                    debug!("download: {} complete", entry.url);
                }
                entry.error = error;

                if !self.jobs.iter().all(|job| job.completed) {
                    return BatchUpdate::Ignored;
                }
                let result = if self.jobs.iter().any(|job| job.error.is_some()) {
                    ActionResult::Failure
                } else {
                    ActionResult::Successful
                };
                self.result = Some(result);
                BatchUpdate::Finished(result)
            }
        }
    }

    /// Delete every temporary download of this batch.
    pub fn cleanup(&self) {
        for job in &self.jobs {
            remove_file_if_present(&job.local_path);
        }
    }
}

fn remove_file_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("download: removed {}", path.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("download: cannot remove {}: {err}", path.display()),
    }
}
