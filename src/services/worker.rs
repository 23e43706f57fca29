use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::models::Job;

/// Executes one job. Failures are the handler's business: it records them
/// and decides about retries, so nothing is returned to the worker.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job);
}

/// Resolves once the root shutdown flag is raised or its sender is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers sharing one receiver.
    pub fn spawn(
        count: usize,
        receiver: mpsc::Receiver<Job>,
        handler: Arc<dyn JobHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let handles = (0..count)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let handler = handler.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(run_worker(worker_id, receiver, handler, shutdown))
            })
            .collect();

        info!("👷 Started {} workers", count);
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to finish its current job and exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task ended abnormally: {}", e);
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    handler: Arc<dyn JobHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        // Waiting (for the lock or for a job) is cancellable; running a job
        // that was received is not.
        let job = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = job else {
            debug!(worker_id, "Job channel closed");
            break;
        };

        debug!(worker_id, file_id = %job.file_id, stage = job.stage.tag(), "Running job");
        let file_id = job.file_id.clone();
        let stage = job.stage.tag();
        if AssertUnwindSafe(handler.handle(job))
            .catch_unwind()
            .await
            .is_err()
        {
            error!(worker_id, file_id = %file_id, stage, "Job handler panicked");
        }
    }

    debug!(worker_id, "Worker stopped");
}
