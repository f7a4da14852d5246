//! Scene documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a scene document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The slice of a scene document the worker reads and writes.
///
/// Scenes are owned elsewhere; the expression handler only fills in
/// `results` with the blob path of the uploaded measurement output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Unique scene ID
    pub id: SceneId,

    /// Blob path of the expression measurement results, once produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
}
