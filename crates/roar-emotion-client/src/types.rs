//! Expression measurement API request/response types.

use serde::{Deserialize, Serialize};
use std::fmt;

use roar_models::BoundingBox;

/// Identifier of a submitted inference job on the engine side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineJobId(pub String);

impl EngineJobId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Response to a job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: EngineJobId,
}

/// Terminal and non-terminal engine job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl EngineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineStatus::Completed | EngineStatus::Failed)
    }
}

/// State block of a job details response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineJobState {
    pub status: EngineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Details of a submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetails {
    pub state: EngineJobState,
}

/// One element of the predictions response array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionEnvelope {
    pub results: PredictionResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResults {
    #[serde(default)]
    pub predictions: Vec<SourcePrediction>,
}

/// Predictions for one submitted media source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePrediction {
    pub models: ModelPredictions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPredictions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<FacePredictions>,
}

/// Face model output: predictions grouped per tracked face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacePredictions {
    #[serde(default)]
    pub grouped_predictions: Vec<GroupedPrediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedPrediction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub predictions: Vec<FramePrediction>,
}

/// Raw per-frame prediction from the face model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePrediction {
    pub time: f64,
    pub frame: u64,
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub emotions: Vec<RawEmotion>,
}

/// A raw scored emotion from the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEmotion {
    pub name: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_status_parses_wire_spelling() {
        let status: EngineStatus = serde_json::from_str("\"IN_PROGRESS\"").unwrap();
        assert_eq!(status, EngineStatus::InProgress);
        assert!(!status.is_terminal());

        let status: EngineStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert!(status.is_terminal());
    }

    #[test]
    fn test_prediction_envelope_parses_nested_body() {
        let body = serde_json::json!([{
            "results": {
                "predictions": [{
                    "models": {
                        "face": {
                            "grouped_predictions": [{
                                "id": "face_0",
                                "predictions": [{
                                    "time": 0.5,
                                    "frame": 15,
                                    "box": { "x": 10.0, "y": 20.0, "w": 64.0, "h": 64.0 },
                                    "emotions": [
                                        { "name": "anger", "score": 0.9 }
                                    ]
                                }]
                            }]
                        }
                    }
                }]
            }
        }]);

        let envelopes: Vec<PredictionEnvelope> = serde_json::from_value(body).unwrap();
        let face = envelopes[0].results.predictions[0]
            .models
            .face
            .as_ref()
            .unwrap();
        let pred = &face.grouped_predictions[0].predictions[0];
        assert_eq!(pred.frame, 15);
        assert_eq!(pred.emotions[0].name, "anger");
    }
}
