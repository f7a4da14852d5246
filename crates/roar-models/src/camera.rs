//! Camera documents and capture state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a camera document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(pub String);

impl CameraId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capture state of a camera.
///
/// Legal transitions: `Stopped -> Starting -> Capturing -> Stopped`, plus
/// `Starting -> Stopped` on failure. The worker never leaves a camera in
/// `Starting` or `Capturing` after the capture subprocess is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    /// No capture subprocess is active
    #[default]
    Stopped,
    /// A capture subprocess is being launched
    Starting,
    /// The subprocess has opened at least one output segment
    Capturing,
}

impl CameraStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Stopped => "stopped",
            CameraStatus::Starting => "starting",
            CameraStatus::Capturing => "capturing",
        }
    }

    /// Parse the document-field spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stopped" => Some(CameraStatus::Stopped),
            "starting" => Some(CameraStatus::Starting),
            "capturing" => Some(CameraStatus::Capturing),
            _ => None,
        }
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A camera document from the shared store.
///
/// At most one active capture subprocess exists per camera at a time;
/// `stop_requested` is a transient flag consumed by the active capture and
/// cleared on the next `starting`/`stopped` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Unique camera ID
    pub id: CameraId,

    /// RTSP stream URL of the camera feed
    #[serde(rename = "rtspUrl")]
    pub rtsp_url: String,

    /// Filename prefix for recorded segments
    pub prefix: String,

    /// Current capture state
    #[serde(default)]
    pub status: CameraStatus,

    /// Processor that owns the active capture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// PID of the active capture subprocess
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Filename of the segment currently being written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Set by a stop request; cleared on the next status transition
    #[serde(rename = "stopRequested", default)]
    pub stop_requested: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_status_round_trip() {
        for st in [
            CameraStatus::Stopped,
            CameraStatus::Starting,
            CameraStatus::Capturing,
        ] {
            assert_eq!(CameraStatus::parse(st.as_str()), Some(st));
        }
        assert_eq!(CameraStatus::parse("rebooting"), None);
    }

    #[test]
    fn test_camera_json_field_names() {
        let camera = Camera {
            id: CameraId::from_string("cam-1"),
            rtsp_url: "rtsp://example/stream".to_string(),
            prefix: "cam1".to_string(),
            status: CameraStatus::Stopped,
            owner: None,
            pid: None,
            filename: None,
            stop_requested: false,
        };

        let json = serde_json::to_value(&camera).unwrap();
        assert_eq!(json["rtspUrl"], "rtsp://example/stream");
        assert_eq!(json["stopRequested"], false);
    }
}
