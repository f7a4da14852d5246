//! Job handler contract and dispatch registry.

use std::sync::Arc;

use async_trait::async_trait;

use roar_models::{Job, JobType};

use crate::error::WorkerResult;

/// The polymorphic unit of work bound to one job type.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Process one claimed job to completion or error.
    async fn process(&self, job: &Job) -> WorkerResult<()>;
}

/// Closed dispatch registry: one handler per job type.
///
/// Every `JobType` variant is a named field, so a missing handler is a
/// compile error rather than a startup surprise, and `handler_for` is
/// total.
pub struct HandlerRegistry {
    detect_facial_expressions: Arc<dyn JobHandler>,
    start_camera: Arc<dyn JobHandler>,
    stop_camera: Arc<dyn JobHandler>,
}

impl HandlerRegistry {
    /// Build the registry with all handlers bound.
    pub fn new(
        detect_facial_expressions: Arc<dyn JobHandler>,
        start_camera: Arc<dyn JobHandler>,
        stop_camera: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            detect_facial_expressions,
            start_camera,
            stop_camera,
        }
    }

    /// Handler bound to the given job type.
    pub fn handler_for(&self, job_type: JobType) -> Arc<dyn JobHandler> {
        match job_type {
            JobType::DetectFacialExpressions => Arc::clone(&self.detect_facial_expressions),
            JobType::StartCamera => Arc::clone(&self.start_camera),
            JobType::StopCamera => Arc::clone(&self.stop_camera),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;

    struct Named(&'static str);

    #[async_trait]
    impl JobHandler for Named {
        async fn process(&self, _job: &Job) -> WorkerResult<()> {
            Err(WorkerError::config_error(self.0))
        }
    }

    #[tokio::test]
    async fn test_every_job_type_dispatches_to_its_handler() {
        let registry = HandlerRegistry::new(
            Arc::new(Named("expressions")),
            Arc::new(Named("start")),
            Arc::new(Named("stop")),
        );

        let expected = ["expressions", "start", "stop"];
        for (job_type, name) in JobType::ALL.into_iter().zip(expected) {
            let job = Job::requested(job_type, "x", "y");
            let err = registry
                .handler_for(job_type)
                .process(&job)
                .await
                .unwrap_err();
            assert!(err.to_string().contains(name));
        }
    }
}
