//! S3-compatible media bucket client.
//!
//! This crate provides:
//! - File and byte upload/download
//! - Scene asset key helpers (`scenes/{id}/audience.mp4`,
//!   `scenes/{id}/results.json`)
//! - Object deletion

pub mod client;
pub mod error;
pub mod operations;

pub use client::{BlobClient, BlobConfig};
pub use error::{StorageError, StorageResult};
pub use operations::{scene_audience_key, scene_results_key};
