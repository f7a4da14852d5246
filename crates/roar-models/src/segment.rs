//! Video segment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::CameraId;

/// Unique identifier for a video segment record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    /// Generate a new random segment ID.
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

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded output file of a camera capture.
///
/// Records are append-only: one is written per segment rotation and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSegment {
    /// Unique record ID
    pub id: SegmentId,

    /// Camera the segment was recorded from
    #[serde(rename = "cameraId")]
    pub camera_id: CameraId,

    /// Segment filename as reported by the capture subprocess
    pub filename: String,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,
}

impl VideoSegment {
    /// Create a record for a freshly opened segment file.
    pub fn opened(camera_id: CameraId, filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SegmentId::new(),
            camera_id,
            filename: filename.into(),
            created: now,
            updated: now,
        }
    }
}
