//! Worker error types.
//!
//! Every error raised inside a handler's `process` reaches the supervisor
//! as one of these; the supervisor marks the job failed with the error's
//! description and keeps all other in-flight work running.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Scene {0} not found")]
    SceneNotFound(String),

    #[error("Camera {0} not found")]
    CameraNotFound(String),

    #[error("Camera {0} is already running")]
    CameraAlreadyRunning(String),

    #[error("Camera {0} is not capturing")]
    CameraNotCapturing(String),

    #[error("Expression job failed: {0}")]
    ExternalJobFailed(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Capture error: {0}")]
    Capture(#[from] roar_capture::CaptureError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] roar_firestore::FirestoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] roar_storage::StorageError),

    #[error("Emotion API error: {0}")]
    Emotion(#[from] roar_emotion_client::EmotionError),

    #[error("Queue error: {0}")]
    Queue(#[from] roar_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn external_job_failed(msg: impl Into<String>) -> Self {
        Self::ExternalJobFailed(msg.into())
    }

    pub fn empty_result(msg: impl Into<String>) -> Self {
        Self::EmptyResult(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
