//! Capture command builder.

use std::path::{Path, PathBuf};

use crate::error::{CaptureError, CaptureResult};

/// Name of the capture binary.
pub const CAPTURE_BINARY: &str = "ffmpeg";

/// Builder for the segmented RTSP capture invocation.
///
/// The invocation surface is fixed: TCP transport, stream copy, segmented
/// output rotated on a time boundary with strftime-expanded filenames
/// `{prefix}-%Y%m%d-%H%M%S.mp4`, overwrite allowed, per-segment timestamp
/// reset.
#[derive(Debug, Clone)]
pub struct CaptureCommand {
    program: String,
    rtsp_url: String,
    output_dir: PathBuf,
    prefix: String,
    segment_seconds: u32,
}

impl CaptureCommand {
    /// Create a capture command for one camera feed.
    pub fn new(rtsp_url: impl Into<String>, output_dir: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            program: CAPTURE_BINARY.to_string(),
            rtsp_url: rtsp_url.into(),
            output_dir: output_dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
            segment_seconds: 60,
        }
    }

    /// Override the segment rotation interval.
    pub fn segment_seconds(mut self, seconds: u32) -> Self {
        self.segment_seconds = seconds;
        self
    }

    /// Override the program to spawn.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Program to spawn.
    pub fn program_name(&self) -> &str {
        &self.program
    }

    /// Output filename pattern handed to the subprocess.
    pub fn output_pattern(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}-%Y%m%d-%H%M%S.mp4", self.prefix))
    }

    /// Build the argument vector.
    pub fn build_args(&self) -> Vec<String> {
        vec![
            "-rtsp_transport".to_string(),
            "tcp".to_string(),
            "-i".to_string(),
            self.rtsp_url.clone(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-f".to_string(),
            "segment".to_string(),
            "-segment_time".to_string(),
            self.segment_seconds.to_string(),
            "-reset_timestamps".to_string(),
            "1".to_string(),
            "-nostats".to_string(),
            "-y".to_string(),
            "-strftime".to_string(),
            "1".to_string(),
            self.output_pattern().to_string_lossy().to_string(),
        ]
    }
}

/// Check that the capture binary is available.
pub fn check_capture_binary() -> CaptureResult<PathBuf> {
    which::which(CAPTURE_BINARY).map_err(|_| CaptureError::BinaryNotFound)
}
