//! Stage dispatch: maps each job to its stage procedure and turns the
//! outcome into status changes, retries or follow-up jobs.

mod analyze;
mod dedup;
mod embed;
mod ingest;
pub mod organize;
pub mod routing;
pub mod tags;
mod text;
mod thumbnail;

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::models::{FileStatus, Job, Stage};
use crate::services::adapters::{Adapters, ServiceError};
use crate::services::metadata_store::{MetadataStore, StoreError};
use crate::services::queue::{EnqueueOutcome, JobQueue};
use crate::services::worker::JobHandler;
use crate::utils::backoff::exponential_delay;

const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(300);

/// Wait before re-running a stage whose input is not written yet.
pub const NOT_READY_DELAY: Duration = Duration::from_secs(15);
/// Give up waiting after this many deferrals (about an hour).
pub const MAX_DEFERRALS: u32 = 240;

/// How a stage failed.
#[derive(Debug, Error)]
pub enum StageError {
    /// Worth trying again later.
    #[error("{0}")]
    Retryable(String),

    /// Trying again will not help; the file is marked failed.
    #[error("{0}")]
    Fatal(String),

    /// An earlier stage has not written this stage's input yet. The job
    /// waits without using up its retries and never fails the file.
    #[error("{0}")]
    NotReady(String),

    /// The file record was deleted; the job is dropped.
    #[error("file {0} no longer exists")]
    Gone(String),
}

impl From<StoreError> for StageError {
    fn from(e: StoreError) -> Self {
        StageError::Retryable(e.to_string())
    }
}

impl From<ServiceError> for StageError {
    fn from(e: ServiceError) -> Self {
        if e.is_retryable() {
            StageError::Retryable(e.to_string())
        } else {
            StageError::Fatal(e.to_string())
        }
    }
}

pub type StageResult = Result<(), StageError>;

/// Delay before retry number `retry_count` (1-based) may run.
pub fn retry_delay(retry_count: u32) -> Duration {
    exponential_delay(
        retry_count.saturating_sub(1),
        RETRY_BASE_DELAY,
        RETRY_MAX_DELAY,
    )
}

#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) store: MetadataStore,
    pub(crate) queue: JobQueue,
    pub(crate) adapters: Adapters,
}

impl Dispatcher {
    pub fn new(store: MetadataStore, queue: JobQueue, adapters: Adapters) -> Self {
        Self {
            store,
            queue,
            adapters,
        }
    }

    /// Run one job to completion, including its bookkeeping.
    pub async fn dispatch(&self, job: Job) {
        let span = info_span!("stage", file_id = %job.file_id, stage = job.stage.tag());
        async move {
            match self.run_stage(&job).await {
                Ok(()) => self.on_success(&job).await,
                Err(StageError::Gone(id)) => debug!("File {} was deleted; dropping job", id),
                Err(StageError::Retryable(reason)) => self.on_retryable(job, reason).await,
                Err(StageError::NotReady(reason)) => self.on_not_ready(job, reason).await,
                Err(StageError::Fatal(reason)) => self.mark_failed(&job, &reason).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stage(&self, job: &Job) -> StageResult {
        let file = self
            .store
            .get_file(&job.file_id)
            .await?
            .ok_or_else(|| StageError::Gone(job.file_id.clone()))?;

        match job.stage {
            Stage::Ingest => ingest::run(self, &file).await,
            Stage::AnalyzeImage => analyze::run(self, &file).await,
            Stage::ExtractText => text::extract(self, &file).await,
            Stage::SummarizeDoc => text::summarize(self, &file).await,
            Stage::Thumbnail => thumbnail::run(self, &file).await,
            Stage::Embed => embed::run(self, &file).await,
            Stage::Dedup => dedup::run(self, &file).await,
            Stage::Organize { strategy } => organize::run(self, &file, strategy).await,
        }
    }

    /// Record the stage and complete the file once every result its
    /// category requires has been written.
    async fn on_success(&self, job: &Job) {
        let tag = job.stage.tag();
        let outcome: Result<(), StoreError> = async {
            let Some(file) = self.store.get_file(&job.file_id).await? else {
                return Ok(());
            };
            if file.status != FileStatus::Processing {
                return Ok(());
            }
            if file.category.mandatory_results_written(&file) {
                if self
                    .store
                    .update_status(&file.id, FileStatus::Completed, Some(tag))
                    .await?
                {
                    info!("✅ File {} completed", file.id);
                }
            } else {
                self.store.update_stage(&file.id, tag).await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = outcome {
            warn!("Stage succeeded but bookkeeping failed: {}", e);
        }
    }

    async fn on_retryable(&self, mut job: Job, reason: String) {
        job.retry_count += 1;
        if job.retry_count >= job.max_retries {
            let reason = format!("{} (gave up after {} attempts)", reason, job.retry_count);
            self.mark_failed(&job, &reason).await;
            return;
        }

        let delay = retry_delay(job.retry_count);
        job.not_before = chrono::Duration::from_std(delay)
            .ok()
            .map(|d| Utc::now() + d);
        warn!(
            retry = job.retry_count,
            max_retries = job.max_retries,
            "Stage failed, retrying in {:?}: {}",
            delay,
            reason
        );

        if self.queue.defer(job).await == EnqueueOutcome::Dropped {
            error!("Retry could not be parked; job lost");
        }
    }

    async fn on_not_ready(&self, mut job: Job, reason: String) {
        job.deferrals += 1;
        if job.deferrals > MAX_DEFERRALS {
            warn!(deferrals = job.deferrals, "Input never arrived, dropping job: {}", reason);
            return;
        }

        job.not_before = chrono::Duration::from_std(NOT_READY_DELAY)
            .ok()
            .map(|d| Utc::now() + d);
        debug!(deferrals = job.deferrals, "Stage not ready, parking: {}", reason);

        if self.queue.defer(job).await == EnqueueOutcome::Dropped {
            error!("Deferred job could not be parked; job lost");
        }
    }

    async fn mark_failed(&self, job: &Job, reason: &str) {
        error!("❌ Stage failed: {}", reason);
        match self
            .store
            .update_status(&job.file_id, FileStatus::Failed, Some(job.stage.tag()))
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!("File not in a failable state; status unchanged"),
            Err(e) => error!("Failed to record failure: {}", e),
        }
    }
}

#[async_trait]
impl JobHandler for Dispatcher {
    async fn handle(&self, job: Job) {
        self.dispatch(job).await
    }
}
