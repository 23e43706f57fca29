use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::models::Job;
use crate::services::overflow::OverflowQueue;
use crate::services::queue::JobQueue;
use crate::services::worker::wait_for_shutdown;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries handed to the in-memory queue.
    pub moved: usize,
    /// Entries still backing off, returned to the tail.
    pub deferred: usize,
    /// Entries that did not parse as a job.
    pub discarded: usize,
    /// An entry was returned to the head because the channel refused it.
    pub returned: bool,
}

impl DrainReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Moves parked jobs from the overflow queue back into the in-memory queue
/// on a fixed tick.
pub struct OverflowPump {
    queue: JobQueue,
    overflow: Arc<dyn OverflowQueue>,
    interval: Duration,
}

impl OverflowPump {
    pub fn new(queue: JobQueue, interval: Duration) -> Self {
        let overflow = queue.overflow().clone();
        Self {
            queue,
            overflow,
            interval,
        }
    }

    /// One tick. Looks at no more entries than the overflow held when the
    /// tick started, so entries it re-parks are not seen twice.
    pub async fn drain_once(&self) -> DrainReport {
        let mut report = DrainReport::default();

        let budget = match self.overflow.len().await {
            Ok(len) => len,
            Err(e) => {
                warn!("Overflow queue unavailable: {:#}", e);
                return report;
            }
        };

        let now = Utc::now();
        for _ in 0..budget {
            if !self.queue.has_slack() {
                break;
            }

            let raw = match self.overflow.pop().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    warn!("Overflow pop failed: {:#}", e);
                    break;
                }
            };

            let job = match Job::from_wire(&raw) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Discarding malformed overflow entry ({}): {}", e, raw);
                    report.discarded += 1;
                    continue;
                }
            };

            if !job.is_due(now) {
                if let Err(e) = self.overflow.push(raw).await {
                    warn!(file_id = %job.file_id, "Failed to re-park deferred job: {:#}", e);
                }
                report.deferred += 1;
                continue;
            }

            if self.queue.try_offer(job).is_err() {
                // Raced full: put the original bytes back at the head.
                if let Err(e) = self.overflow.push_front(raw).await {
                    warn!("Failed to return job to overflow head: {:#}", e);
                }
                report.returned = true;
                break;
            }
            report.moved += 1;
        }

        report
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("🔁 Overflow pump running every {:?}", self.interval);
        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {
                    let report = self.drain_once().await;
                    if !report.is_idle() {
                        info!(
                            moved = report.moved,
                            deferred = report.deferred,
                            discarded = report.discarded,
                            "📤 Overflow pump tick"
                        );
                    }
                }
            }
        }
        info!("Overflow pump stopped");
    }
}
