//! Job processing worker.
//!
//! This crate provides:
//! - The supervisor loop driving claimed jobs per type
//! - The handler registry and the three job handlers
//! - Store adapters binding the seam traits to Firestore
//! - Worker configuration and structured job logging

pub mod camera;
pub mod config;
pub mod context;
pub mod error;
pub mod expressions;
pub mod handler;
pub mod logging;
pub mod stores;
pub mod supervisor;

pub use camera::{CameraStartHandler, CameraStopHandler};
pub use config::WorkerConfig;
pub use context::{CameraSignals, WorkerContext};
pub use error::{WorkerError, WorkerResult};
pub use expressions::VideoExpressionHandler;
pub use handler::{HandlerRegistry, JobHandler};
pub use logging::JobLogger;
pub use stores::{CameraDirectory, FirestoreCameraDirectory, FirestoreJobBoard};
pub use supervisor::Supervisor;
