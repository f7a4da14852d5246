//! Structured job logging utilities.

use tracing::{error, info, Span};

use roar_models::{JobId, JobType};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    job_type: JobType,
}

impl JobLogger {
    /// Create a new job logger for one job execution.
    pub fn new(job_id: &JobId, job_type: JobType) -> Self {
        Self {
            job_id: job_id.to_string(),
            job_type,
        }
    }

    /// Log the start of a job execution.
    pub fn log_start(&self) {
        info!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            "Job started"
        );
    }

    /// Log a progress update during job execution.
    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            "Job progress: {}", message
        );
    }

    /// Log an error during job execution.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            "Job error: {}", message
        );
    }

    /// Log the completion of a job execution.
    pub fn log_completion(&self) {
        info!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            "Job completed"
        );
    }

    /// Create a tracing span for this job execution.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            job_type = %self.job_type
        )
    }
}
