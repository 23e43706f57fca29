use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error};

use crate::models::{Job, Stage};
use crate::services::overflow::OverflowQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Accepted by the in-memory channel.
    Queued,
    /// Written to the durable overflow.
    Overflowed,
    /// Neither accepted the job; it is lost.
    Dropped,
}

/// Producer side of the bounded in-memory job channel. A full (or closed)
/// channel is not an error: the job goes to the overflow queue instead.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    overflow: Arc<dyn OverflowQueue>,
    max_retries: u32,
}

impl JobQueue {
    pub fn new(
        capacity: usize,
        overflow: Arc<dyn OverflowQueue>,
        max_retries: u32,
    ) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                overflow,
                max_retries,
            },
            rx,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn overflow(&self) -> &Arc<dyn OverflowQueue> {
        &self.overflow
    }

    /// Fresh job for `stage` on `file_id`.
    pub async fn submit(&self, file_id: &str, stage: Stage) -> EnqueueOutcome {
        self.enqueue(Job::new(file_id, stage, self.max_retries)).await
    }

    pub async fn enqueue(&self, job: Job) -> EnqueueOutcome {
        // Jobs waiting out a backoff wait in the overflow; the pump
        // releases them once due.
        if !job.is_due(Utc::now()) {
            return self.defer(job).await;
        }

        match self.tx.try_send(job) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(job)) | Err(TrySendError::Closed(job)) => {
                debug!("Job queue full, overflowing {} {}", job.stage.tag(), job.file_id);
                self.defer(job).await
            }
        }
    }

    /// Write the job to the durable overflow.
    pub async fn defer(&self, job: Job) -> EnqueueOutcome {
        let raw = match job.to_wire() {
            Ok(raw) => raw,
            Err(e) => {
                error!(file_id = %job.file_id, stage = job.stage.tag(), "Failed to serialize job: {}", e);
                return EnqueueOutcome::Dropped;
            }
        };

        match self.overflow.push(raw).await {
            Ok(()) => EnqueueOutcome::Overflowed,
            Err(e) => {
                error!(file_id = %job.file_id, stage = job.stage.tag(), "Overflow push failed, job lost: {:#}", e);
                EnqueueOutcome::Dropped
            }
        }
    }

    /// Whether the in-memory channel currently has room.
    pub fn has_slack(&self) -> bool {
        self.tx.capacity() > 0
    }

    /// Offer a job to the in-memory channel only; hands it back if refused.
    pub fn try_offer(&self, job: Job) -> Result<(), Job> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) | TrySendError::Closed(job) => job,
        })
    }
}
