//! Client for the hosted expression measurement API.
//!
//! The engine is an external collaborator exposed through three operations:
//! submit a media file as a batch job, poll the job's state, and fetch its
//! raw predictions once it completes.

pub mod client;
pub mod error;
pub mod types;

pub use client::{EmotionClient, EmotionConfig};
pub use error::{EmotionError, EmotionResult};
pub use types::{
    EngineJobId, EngineStatus, FacePredictions, FramePrediction, GroupedPrediction, JobDetails,
    PredictionEnvelope, RawEmotion,
};
