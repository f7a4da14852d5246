//! Firestore REST API client and typed repositories.
//!
//! This crate provides:
//! - The REST client with service account authentication via gcp_auth
//! - Token caching, merge updates, precondition (compare-and-set) updates
//! - Retry with exponential backoff for transport-level failures
//! - Typed repositories for jobs, cameras, video segments, and scenes
//! - A polling watch over requested jobs

pub mod client;
pub mod error;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod watch;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use repos::{
    collections, CameraRepository, JobRepository, SceneRepository, VideoSegmentRepository,
};
pub use retry::RetryConfig;
pub use token_cache::{AccessTokenSource, GcpTokenSource, StaticTokenSource, TokenCache};
pub use types::{Document, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};
pub use watch::watch_requested;
