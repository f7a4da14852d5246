//! Capture subprocess wrapper for RTSP segment recording.
//!
//! This crate provides:
//! - The fixed capture invocation builder
//! - A controller owning the spawned process with a merged output-line
//!   stream and cooperative stop negotiation
//! - Segment-open marker parsing

pub mod command;
pub mod controller;
pub mod error;
pub mod output;

pub use command::{check_capture_binary, CaptureCommand, CAPTURE_BINARY};
pub use controller::CaptureController;
pub use error::{CaptureError, CaptureResult};
pub use output::segment_filename;
