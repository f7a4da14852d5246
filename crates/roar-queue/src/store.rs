//! The job store seam.
//!
//! The shared document store is an external collaborator; the queue and the
//! supervisor only rely on this trait. The production implementation is
//! backed by Firestore; tests use in-memory fakes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use roar_models::{Job, JobId, JobStatus, JobType};

use crate::error::QueueResult;

/// Outcome of an exclusive claim attempt.
///
/// `Lost` is the expected result of racing another processor and is never
/// surfaced as an error.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// This processor now owns the job; it is `processing` in the store.
    Claimed(Job),
    /// Another processor won, or the job already left `requested`.
    Lost,
}

/// Store operations the claim protocol and supervisor are built on.
///
/// `try_claim` must be backed by a serializable read-then-write on the
/// single job document; that compare-and-set is the only synchronization
/// primitive between concurrently running processors.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Notification stream of jobs observed in `requested` state for one
    /// type. Duplicates and stale entries are allowed; the claim arbitrates.
    async fn watch_requested(&self, job_type: JobType) -> QueueResult<mpsc::UnboundedReceiver<Job>>;

    /// Attempt to exclusively transition a job from `requested` to
    /// `processing`.
    async fn try_claim(&self, job: &Job, owner: &str) -> QueueResult<ClaimOutcome>;

    /// Write a job's terminal or progress status.
    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        owner: &str,
        message: Option<String>,
    ) -> QueueResult<()>;

    /// Create a new job document.
    async fn create(&self, job: &Job) -> QueueResult<()>;

    /// Fetch a job document.
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<Job>>;
}
