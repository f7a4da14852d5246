//! Job documents and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of job. The set is closed: every variant has exactly one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Run expression measurement over a scene's audience video
    DetectFacialExpressions,
    /// Start a camera's capture subprocess
    StartCamera,
    /// Request a graceful stop of a camera's capture
    StopCamera,
}

impl JobType {
    /// All job types, in dispatch order.
    pub const ALL: [JobType; 3] = [
        JobType::DetectFacialExpressions,
        JobType::StartCamera,
        JobType::StopCamera,
    ];

    /// Document-field spelling of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::DetectFacialExpressions => "DetectFacialExpressions",
            JobType::StartCamera => "StartCamera",
            JobType::StopCamera => "StopCamera",
        }
    }

    /// Parse the document-field spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DetectFacialExpressions" => Some(JobType::DetectFacialExpressions),
            "StartCamera" => Some(JobType::StartCamera),
            "StopCamera" => Some(JobType::StopCamera),
            _ => None,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job processing status.
///
/// Exactly one processor ever transitions a job out of `Requested` (the
/// claim), and no job is ever moved out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting to be claimed
    #[default]
    Requested,
    /// Job has been claimed and is being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed; it stays failed
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Requested => "requested",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the document-field spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(JobStatus::Requested),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job document from the shared store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Job type
    #[serde(rename = "type")]
    pub job_type: JobType,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Kind of entity this job refers to (e.g. "scene", "camera")
    #[serde(rename = "refType")]
    pub ref_type: String,

    /// ID of the referenced entity
    #[serde(rename = "refId")]
    pub ref_id: String,

    /// Human-readable progress/outcome message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Processor that claimed the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,
}

impl Job {
    /// Create a freshly requested job for the given reference.
    pub fn requested(
        job_type: JobType,
        ref_type: impl Into<String>,
        ref_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type,
            status: JobStatus::Requested,
            ref_type: ref_type.into(),
            ref_id: ref_id.into(),
            message: None,
            owner: None,
            created: now,
            updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_round_trip() {
        for jt in JobType::ALL {
            assert_eq!(JobType::parse(jt.as_str()), Some(jt));
        }
        assert_eq!(JobType::parse("RewindTape"), None);
    }

    #[test]
    fn test_job_status_terminality() {
        assert!(!JobStatus::Requested.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_requested_job_defaults() {
        let job = Job::requested(JobType::StartCamera, "camera", "cam-1");
        assert_eq!(job.status, JobStatus::Requested);
        assert_eq!(job.ref_type, "camera");
        assert_eq!(job.ref_id, "cam-1");
        assert!(job.owner.is_none());
        assert!(job.message.is_none());
    }
}
