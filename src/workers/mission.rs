use crate::infrastructure::media::TransformError;
use crate::infrastructure::process::ProcessRegistry;
use crate::modules::jobs::executor::{self, TransformExecutor};
use crate::modules::jobs::model::{Job, JobKind, JobStatus};
use crate::modules::jobs::repository::CatalogStore;
use crate::state::AppState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Idle polls are chatty at one line a minute; only every Nth goes to info.
const IDLE_LOG_EVERY: u64 = 30;

/// What one scheduler pass did. Surfaced for tests and logging.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    AlreadyRunning(i64),
    ExternalBusy,
    Completed(i64),
    JobFailed(i64),
    StoreUnavailable,
}

/// Serializes all cut/transcode jobs: one loop, one job in flight, ever.
/// Assumes a single scheduler instance per store; the claim is a plain
/// status update with no optimistic lock.
pub struct MissionScheduler {
    store: Arc<dyn CatalogStore>,
    executor: TransformExecutor,
    registry: Arc<ProcessRegistry>,
    interval: Duration,
}

impl MissionScheduler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        executor: TransformExecutor,
        registry: Arc<ProcessRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            executor,
            registry,
            interval,
        }
    }

    /// Runs until the token fires. Every error is contained to its tick; the
    /// loop itself only ends on cancellation.
    pub async fn run(self, token: CancellationToken) {
        info!("🎬 Starting mission loop...");
        let mut cycle: u64 = 0;
        loop {
            if token.is_cancelled() {
                break;
            }
            let outcome = self.tick().await;
            cycle += 1;
            match outcome {
                TickOutcome::Idle => {
                    if cycle % IDLE_LOG_EVERY == 1 {
                        info!("No task, waiting for the next check...");
                    } else {
                        debug!("No task, waiting for the next check...");
                    }
                    self.pause(&token).await;
                }
                TickOutcome::AlreadyRunning(_)
                | TickOutcome::ExternalBusy
                | TickOutcome::StoreUnavailable => {
                    self.pause(&token).await;
                }
                // Go straight back for the next queued job.
                TickOutcome::Completed(_) | TickOutcome::JobFailed(_) => {}
            }
        }
        info!("Mission loop cancelled, exiting.");
    }

    async fn pause(&self, token: &CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(self.interval) => {}
        }
    }

    /// One pass: Peek → Claim → Execute → Finalize.
    pub async fn tick(&self) -> TickOutcome {
        let job = match self.store.fetch_next_pending_job().await {
            Ok(job) => job,
            Err(e) => {
                error!("Error fetching next mission: {}", e);
                return TickOutcome::StoreUnavailable;
            }
        };
        let Some(job) = job else {
            return TickOutcome::Idle;
        };

        // Owned by an earlier iteration or a previous process run; never
        // re-claimed here.
        if job.status() == JobStatus::Running {
            info!("Mission {} is running", job.id);
            return TickOutcome::AlreadyRunning(job.id);
        }

        if self.registry.has_external_transform_running().await {
            info!("Transform process exists on host, backing off");
            return TickOutcome::ExternalBusy;
        }

        if let Err(e) = self.store.update_job_status(job.id, JobStatus::Running).await {
            error!("Error claiming mission {}: {}", job.id, e);
            return TickOutcome::StoreUnavailable;
        }

        info!(
            "Mission {} {} is starting - {}",
            job.id,
            kind_label(&job),
            job.source_path().display()
        );

        match self.execute(&job).await {
            Ok(()) => {
                if let Err(e) = self.store.update_job_status(job.id, JobStatus::Done).await {
                    error!("Error finalizing mission {}: {}", job.id, e);
                }
                info!("Mission {} {} completed", job.id, kind_label(&job));
                TickOutcome::Completed(job.id)
            }
            Err(e) => {
                error!("Mission {} failed: {}", job.id, e);
                if let Err(e) = self.store.update_job_status(job.id, JobStatus::Failed).await {
                    error!("Error marking mission {} failed: {}", job.id, e);
                }
                TickOutcome::JobFailed(job.id)
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<(), TransformError> {
        let source = job.source_path();
        match job.kind() {
            Some(JobKind::Cut) => self.executor.cut(&source, job.start_sec, job.end_sec).await,
            Some(JobKind::Transcode) => {
                let output = self.executor.transcode(&source).await?;
                self.finalize_transcode(job, &output).await;
                Ok(())
            }
            None => Err(TransformError::UnknownJobKind(job.kind)),
        }
    }

    /// Repoints the catalog file record at the transcoded output. Failures
    /// here are logged only; the transform itself already succeeded on disk.
    async fn finalize_transcode(&self, job: &Job, output: &Path) {
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return;
        }
        let Some(filename) = output.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let size_mb = match executor::file_size_mb(output).await {
            Ok(size) => size,
            Err(e) => {
                error!("Error reading transcode output size: {}", e);
                return;
            }
        };
        let created = match executor::file_created_at(output).await {
            Ok(created) => created,
            Err(e) => {
                error!("Error reading transcode output time: {}", e);
                return;
            }
        };
        debug!("file: {} / size: {} MB / created: {}", filename, size_mb, created);
        if let Err(e) = self
            .store
            .update_file_record(&job.local_id, filename, size_mb, created)
            .await
        {
            error!("Error updating file record for mission {}: {}", job.id, e);
        }
    }
}

fn kind_label(job: &Job) -> &'static str {
    match job.kind() {
        Some(JobKind::Cut) => "cut",
        Some(JobKind::Transcode) => "transcode",
        None => "unknown",
    }
}

pub async fn start_mission_worker(state: AppState, token: CancellationToken) {
    let executor = TransformExecutor::new(
        state.transcoder.clone(),
        state.config.thumbnail_dir.clone(),
    );
    let scheduler = MissionScheduler::new(
        state.store.clone(),
        executor,
        state.registry.clone(),
        Duration::from_secs(state.config.mission_interval_secs),
    );
    scheduler.run(token).await;
}
