//! Error types for capture operations.

use thiserror::Error;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors that can occur while running the capture subprocess.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture binary not found in PATH")]
    BinaryNotFound,

    #[error("Capture process exited with code {code:?}")]
    ProcessExit { code: Option<i32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
