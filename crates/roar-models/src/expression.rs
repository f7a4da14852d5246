//! Expression measurement output rows.
//!
//! These are the rows serialized into `scenes/{sceneId}/results.json`: one
//! entry per analyzed frame, emotions sorted by confidence descending and
//! truncated at the first entry below the configured threshold.

use serde::{Deserialize, Serialize};

/// Face bounding box within a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// A single scored emotion.
///
/// `confidence` mirrors `score`; downstream consumers read either name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub name: String,
    pub score: f64,
    pub confidence: f64,
}

impl EmotionScore {
    /// Build a score entry, mirroring the score into `confidence`.
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            confidence: score,
        }
    }
}

/// Surviving emotions for one analyzed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionFrame {
    /// Media time of the frame, in seconds
    pub time: f64,

    /// Frame index
    pub frame: u64,

    /// Face bounding box
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,

    /// Emotions at or above the confidence threshold, sorted descending
    pub emotions: Vec<EmotionScore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_score_mirrors_confidence() {
        let e = EmotionScore::new("joy", 0.42);
        assert_eq!(e.score, e.confidence);
    }

    #[test]
    fn test_frame_serializes_box_field() {
        let frame = ExpressionFrame {
            time: 1.5,
            frame: 45,
            bounding_box: BoundingBox {
                x: 0.0,
                y: 0.0,
                w: 64.0,
                h: 64.0,
            },
            emotions: vec![EmotionScore::new("anger", 0.9)],
        };

        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("box").is_some());
        assert_eq!(json["emotions"][0]["name"], "anger");
    }
}
