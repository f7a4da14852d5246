//! Worker supervisor.
//!
//! Consumes the claimed-job stream for one job type and runs every claimed
//! job as its own concurrent execution. Outcomes are written back to the
//! store; a failed execution never stops the loop or other in-flight work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use roar_models::{Job, JobStatus, JobType};
use roar_queue::{JobQueue, JobStore};

use crate::error::{WorkerError, WorkerResult};
use crate::handler::JobHandler;
use crate::logging::JobLogger;

/// Supervises all executions of one job type.
pub struct Supervisor<S: JobStore> {
    store: Arc<S>,
    queue: JobQueue<S>,
    owner: String,
    shutdown_timeout: Duration,
}

impl<S: JobStore> Supervisor<S> {
    /// Create a supervisor claiming and reporting as `owner`.
    pub fn new(store: Arc<S>, owner: impl Into<String>, shutdown_timeout: Duration) -> Self {
        let owner = owner.into();
        Self {
            queue: JobQueue::new(Arc::clone(&store), owner.clone()),
            store,
            owner,
            shutdown_timeout,
        }
    }

    /// Consume claimed jobs of `job_type` until shutdown, dispatching each
    /// to `handler` without waiting for it.
    pub async fn run(
        &self,
        job_type: JobType,
        handler: Arc<dyn JobHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> WorkerResult<()> {
        info!("Supervisor for {} starting as {}", job_type, self.owner);

        let mut claimed = self.queue.subscribe(job_type).await?;
        let mut in_flight: JoinSet<(Job, WorkerResult<()>)> = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, Job> = HashMap::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Supervisor for {} shutting down", job_type);
                        break;
                    }
                }
                maybe_job = claimed.next() => {
                    let Some(job) = maybe_job else {
                        warn!("Claim stream for {} ended", job_type);
                        break;
                    };

                    let logger = JobLogger::new(&job.id, job.job_type);
                    logger.log_start();

                    let handler = Arc::clone(&handler);
                    let spawned = job.clone();
                    let abort = in_flight.spawn(async move {
                        let result = handler.process(&spawned).await;
                        (spawned, result)
                    });
                    running.insert(abort.id(), job);
                }
                Some(finished) = in_flight.join_next_with_id(), if !in_flight.is_empty() => {
                    self.report(finished, &mut running).await;
                }
            }
        }

        // Let in-flight executions finish, bounded by the shutdown timeout.
        if !in_flight.is_empty() {
            info!(
                "Waiting up to {:?} for {} in-flight {} executions",
                self.shutdown_timeout,
                in_flight.len(),
                job_type
            );

            let drain = async {
                while let Some(finished) = in_flight.join_next_with_id().await {
                    self.report(finished, &mut running).await;
                }
            };

            if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
                warn!("Shutdown timeout expired with {} executions still running", job_type);
            }
        }

        Ok(())
    }

    /// Record one finished execution's outcome in the store.
    async fn report(
        &self,
        finished: Result<(tokio::task::Id, (Job, WorkerResult<()>)), tokio::task::JoinError>,
        running: &mut HashMap<tokio::task::Id, Job>,
    ) {
        let (job, outcome) = match finished {
            Ok((task_id, (job, result))) => {
                running.remove(&task_id);
                (job, result)
            }
            Err(join_err) => {
                let Some(job) = running.remove(&join_err.id()) else {
                    error!("Untracked job execution ended: {}", join_err);
                    return;
                };
                (
                    job,
                    Err(WorkerError::config_error(format!(
                        "Execution panicked: {}",
                        join_err
                    ))),
                )
            }
        };

        let logger = JobLogger::new(&job.id, job.job_type);

        match outcome {
            Ok(()) => {
                logger.log_completion();
                if let Err(e) = self
                    .store
                    .update_status(&job.id, JobStatus::Completed, &self.owner, None)
                    .await
                {
                    error!("Failed to mark job {} completed: {}", job.id, e);
                }
            }
            Err(handler_err) => {
                logger.log_error(&handler_err.to_string());
                if let Err(e) = self
                    .store
                    .update_status(
                        &job.id,
                        JobStatus::Failed,
                        &self.owner,
                        Some(handler_err.to_string()),
                    )
                    .await
                {
                    error!("Failed to mark job {} failed: {}", job.id, e);
                }
            }
        }
    }
}
