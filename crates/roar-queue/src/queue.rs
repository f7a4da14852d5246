//! Claimed-job delivery.
//!
//! `subscribe` bridges the store's notification stream into an ordered
//! stream of exclusively claimed jobs. The claim task is the sole consumer
//! of the notification channel and the sole producer of the delivery
//! channel; the consumer's dequeue is the suspension point. Both channels
//! are unbounded, matching the push-notification source; acceptable while
//! notification volume stays at one document per submitted job.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use roar_models::{Job, JobType};

use crate::error::QueueResult;
use crate::store::{ClaimOutcome, JobStore};

/// Job claim queue over the shared document store.
pub struct JobQueue<S: JobStore> {
    store: Arc<S>,
    owner: String,
}

impl<S: JobStore> JobQueue<S> {
    /// Create a queue claiming on behalf of `owner`.
    pub fn new(store: Arc<S>, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into(),
        }
    }

    /// The processor identity used for claims.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Subscribe to claimed jobs of one type.
    ///
    /// The returned stream is lazy, infinite, and non-restartable; dropping
    /// it stops the claim task. Lost claims are logged at debug level and
    /// never delivered.
    pub async fn subscribe(&self, job_type: JobType) -> QueueResult<ClaimedJobs> {
        let mut notifications = self.store.watch_requested(job_type).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        let store = Arc::clone(&self.store);
        let owner = self.owner.clone();

        tokio::spawn(async move {
            while let Some(candidate) = notifications.recv().await {
                match store.try_claim(&candidate, &owner).await {
                    Ok(ClaimOutcome::Claimed(job)) => {
                        info!("Claimed job {} ({})", job.id, job_type);
                        if tx.send(job).is_err() {
                            break;
                        }
                    }
                    Ok(ClaimOutcome::Lost) => {
                        debug!("Lost claim on job {} ({})", candidate.id, job_type);
                    }
                    Err(e) => {
                        warn!("Claim attempt for job {} failed: {}", candidate.id, e);
                    }
                }
            }

            debug!("Claim task for {} finished", job_type);
        });

        Ok(ClaimedJobs { rx })
    }
}

/// Ordered stream of jobs this processor has exclusively claimed.
pub struct ClaimedJobs {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl ClaimedJobs {
    /// Next claimed job; `None` once the claim task has stopped.
    pub async fn next(&mut self) -> Option<Job> {
        self.rx.recv().await
    }
}
