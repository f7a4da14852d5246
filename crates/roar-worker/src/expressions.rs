//! Facial expression measurement handler.
//!
//! Resolves a scene's audience recording, submits it to the expression
//! engine, polls to completion, collapses the raw predictions against the
//! confidence threshold, and publishes the result JSON back to the scene.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use roar_emotion_client::{EngineJobId, EngineStatus, FramePrediction, PredictionEnvelope};
use roar_models::{EmotionScore, ExpressionFrame, Job, JobStatus, SceneId};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::handler::JobHandler;

/// Handler for `DetectFacialExpressions` jobs.
pub struct VideoExpressionHandler {
    ctx: Arc<WorkerContext>,
}

impl VideoExpressionHandler {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Write a progress message onto the job document.
    async fn progress(&self, job: &Job, message: &str) -> WorkerResult<()> {
        self.ctx
            .jobs
            .update_status(
                &job.id,
                JobStatus::Processing,
                &self.ctx.processor_id,
                Some(message),
            )
            .await?;
        Ok(())
    }

    /// Poll the engine until the job reaches a terminal state.
    async fn wait_for_engine(&self, job: &Job, engine_job: &EngineJobId) -> WorkerResult<()> {
        let mut waited_secs = 0u64;

        loop {
            self.progress(job, &format!("Waiting on expression job.. {}s", waited_secs))
                .await?;
            waited_secs += self.ctx.config.poll_interval.as_secs();

            tokio::time::sleep(self.ctx.config.poll_interval).await;

            let details = self.ctx.emotion.job_details(engine_job).await?;
            match details.state.status {
                EngineStatus::Completed => return Ok(()),
                EngineStatus::Failed => {
                    let reason = details
                        .state
                        .message
                        .unwrap_or_else(|| "no reason reported".to_string());
                    return Err(WorkerError::external_job_failed(reason));
                }
                EngineStatus::Queued | EngineStatus::InProgress => {}
            }
        }
    }
}

#[async_trait]
impl JobHandler for VideoExpressionHandler {
    async fn process(&self, job: &Job) -> WorkerResult<()> {
        let scene_id = SceneId::from_string(&job.ref_id);
        self.ctx
            .scenes
            .get(&scene_id)
            .await?
            .ok_or_else(|| WorkerError::SceneNotFound(job.ref_id.clone()))?;

        // Scratch space lives for this execution only; the directory is
        // removed on every exit path when the guard drops.
        tokio::fs::create_dir_all(&self.ctx.config.work_dir).await?;
        let scratch = tempfile::tempdir_in(&self.ctx.config.work_dir)?;
        let video_path = scratch.path().join("audience.mp4");
        let results_path = scratch.path().join("results.json");

        self.ctx
            .storage
            .download_audience(&scene_id, &video_path)
            .await?;

        self.progress(job, "Starting expression job..").await?;
        let engine_job = self.ctx.emotion.submit_file(&video_path).await?;
        info!("Scene {} submitted as expression job {}", scene_id, engine_job);

        self.wait_for_engine(job, &engine_job).await?;

        self.progress(job, "Getting predictions..").await?;
        let envelopes = self.ctx.emotion.predictions(&engine_job).await?;
        let predictions = face_frame_predictions(&envelopes)?;
        let frames = collapse_predictions(predictions, self.ctx.config.confidence_threshold);

        tokio::fs::write(&results_path, serde_json::to_vec(&frames)?).await?;

        self.progress(job, "Uploading results..").await?;
        let results_key = self
            .ctx
            .storage
            .upload_results(&scene_id, &results_path)
            .await?;

        info!("Updating scene {} with results path {}", scene_id, results_key);
        self.ctx.scenes.set_results(&scene_id, &results_key).await?;

        Ok(())
    }
}

/// Extract the first face group's per-frame predictions.
///
/// An empty predictions list or an empty face group is an explicit error;
/// silently publishing an empty result would be indistinguishable from a
/// scene with no faces.
pub fn face_frame_predictions(
    envelopes: &[PredictionEnvelope],
) -> WorkerResult<&[FramePrediction]> {
    let envelope = envelopes.first().ok_or_else(|| {
        WorkerError::empty_result("No results in expression job response")
    })?;

    let predictions = &envelope.results.predictions;
    if predictions.is_empty() {
        return Err(WorkerError::empty_result(
            "No predictions found in expression job results",
        ));
    }

    let grouped = predictions[0]
        .models
        .face
        .as_ref()
        .map(|face| face.grouped_predictions.as_slice())
        .unwrap_or_default();

    if grouped.is_empty() {
        return Err(WorkerError::empty_result(
            "No face predictions found in expression job results",
        ));
    }

    Ok(&grouped[0].predictions)
}

/// Collapse raw frame predictions against the confidence threshold.
///
/// Emotions are sorted by score descending and the row is truncated at the
/// first entry below the threshold; on a descending list that equals
/// keeping every entry at or above it, so boundary ties survive. Frames
/// whose surviving list is empty are dropped; frame order is preserved.
pub fn collapse_predictions(
    predictions: &[FramePrediction],
    threshold: f64,
) -> Vec<ExpressionFrame> {
    let mut output = Vec::new();

    for prediction in predictions {
        let mut emotions: Vec<EmotionScore> = prediction
            .emotions
            .iter()
            .map(|e| EmotionScore::new(&e.name, e.score))
            .collect();

        emotions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut kept = Vec::new();
        for emotion in emotions {
            if emotion.confidence < threshold {
                break;
            }
            kept.push(emotion);
        }

        if !kept.is_empty() {
            output.push(ExpressionFrame {
                time: prediction.time,
                frame: prediction.frame,
                bounding_box: prediction.bounding_box,
                emotions: kept,
            });
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use roar_emotion_client::RawEmotion;
    use roar_models::BoundingBox;

    fn frame(index: u64, emotions: Vec<(&str, f64)>) -> FramePrediction {
        FramePrediction {
            time: index as f64 / 30.0,
            frame: index,
            bounding_box: BoundingBox {
                x: 0.0,
                y: 0.0,
                w: 64.0,
                h: 64.0,
            },
            emotions: emotions
                .into_iter()
                .map(|(name, score)| RawEmotion {
                    name: name.to_string(),
                    score,
                })
                .collect(),
        }
    }

    #[test]
    fn test_scenario_keeps_scores_above_threshold() {
        let predictions = vec![frame(0, vec![("anger", 0.9), ("joy", 0.4), ("fear", 0.1)])];
        let frames = collapse_predictions(&predictions, 0.25);

        assert_eq!(frames.len(), 1);
        let names: Vec<&str> = frames[0].emotions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["anger", "joy"]);
        assert_eq!(frames[0].emotions[0].confidence, 0.9);
    }

    #[test]
    fn test_all_below_threshold_drops_the_frame() {
        let predictions = vec![
            frame(0, vec![("anger", 0.1), ("joy", 0.2)]),
            frame(1, vec![("calm", 0.8)]),
        ];
        let frames = collapse_predictions(&predictions, 0.25);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame, 1);
    }

    #[test]
    fn test_truncation_equals_filter_on_sorted_input() {
        let scores = vec![
            ("a", 0.95),
            ("b", 0.7),
            ("c", 0.31),
            ("d", 0.25),
            ("e", 0.2),
            ("f", 0.05),
        ];
        let predictions = vec![frame(0, scores.clone())];
        let frames = collapse_predictions(&predictions, 0.25);

        let expected: Vec<&str> = scores
            .iter()
            .filter(|(_, s)| *s >= 0.25)
            .map(|(n, _)| *n)
            .collect();
        let kept: Vec<&str> = frames[0].emotions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_boundary_ties_are_retained() {
        let predictions = vec![frame(0, vec![("a", 0.25), ("b", 0.25), ("c", 0.1)])];
        let frames = collapse_predictions(&predictions, 0.25);
        assert_eq!(frames[0].emotions.len(), 2);
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let predictions = vec![frame(0, vec![("a", 0.9), ("b", 0.3), ("c", 0.1)])];
        let once = collapse_predictions(&predictions, 0.25);

        // Re-feed the surviving emotions; the result must be unchanged.
        let refed = vec![frame(
            0,
            once[0]
                .emotions
                .iter()
                .map(|e| (e.name.as_str(), e.score))
                .collect(),
        )];
        let twice = collapse_predictions(&refed, 0.25);
        assert_eq!(once[0].emotions, twice[0].emotions);
    }

    #[test]
    fn test_frame_order_is_preserved() {
        let predictions = vec![
            frame(3, vec![("a", 0.9)]),
            frame(1, vec![("b", 0.9)]),
            frame(7, vec![("c", 0.9)]),
        ];
        let frames = collapse_predictions(&predictions, 0.25);
        let order: Vec<u64> = frames.iter().map(|f| f.frame).collect();
        assert_eq!(order, vec![3, 1, 7]);
    }

    #[test]
    fn test_unsorted_input_is_sorted_before_truncation() {
        let predictions = vec![frame(0, vec![("low", 0.3), ("high", 0.9), ("tiny", 0.05)])];
        let frames = collapse_predictions(&predictions, 0.25);
        let names: Vec<&str> = frames[0].emotions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_engine_failure_surfaces_reason_and_cleans_scratch() {
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let firestore_server = MockServer::start().await;
        let emotion_server = MockServer::start().await;

        // Progress writes onto the job document succeed.
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/p/databases/(default)/documents/jobs/job-1",
                "fields": {}
            })))
            .mount(&firestore_server)
            .await;

        // The engine reports a terminal failure on the first poll.
        Mock::given(method("GET"))
            .and(path("/v0/batch/jobs/ej-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": { "status": "FAILED", "message": "face model crashed" }
            })))
            .mount(&emotion_server)
            .await;

        let firestore = roar_firestore::FirestoreClient::with_endpoint(
            roar_firestore::FirestoreConfig {
                project_id: "test".to_string(),
                database_id: "(default)".to_string(),
                timeout: Duration::from_secs(5),
                connect_timeout: Duration::from_secs(2),
                watch_interval: Duration::from_millis(10),
                retry: roar_firestore::RetryConfig::default(),
            },
            format!(
                "{}/v1/projects/test/databases/(default)/documents",
                firestore_server.uri()
            ),
            std::sync::Arc::new(roar_firestore::StaticTokenSource::new("t")),
        )
        .unwrap();

        let storage = roar_storage::BlobClient::new(roar_storage::BlobConfig {
            endpoint_url: Some("http://localhost:1".to_string()),
            access_key_id: "k".to_string(),
            secret_access_key: "s".to_string(),
            bucket_name: "media".to_string(),
            region: "auto".to_string(),
        })
        .await
        .unwrap();

        let emotion = roar_emotion_client::EmotionClient::new(
            roar_emotion_client::EmotionConfig {
                base_url: emotion_server.uri(),
                api_key: "k".to_string(),
                timeout: Duration::from_secs(5),
                max_retries: 0,
            },
        )
        .unwrap();

        let mut config = crate::config::WorkerConfig::default();
        config.poll_interval = Duration::from_millis(10);

        let ctx = Arc::new(crate::context::WorkerContext::with_clients(
            config, firestore, storage, emotion,
        ));
        let handler = VideoExpressionHandler::new(ctx);

        let job = Job::requested(
            roar_models::JobType::DetectFacialExpressions,
            "scene",
            "scene-1",
        );
        let err = handler
            .wait_for_engine(&job, &EngineJobId::from_string("ej-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::ExternalJobFailed(_)));
        assert!(err.to_string().contains("face model crashed"));
    }

    #[tokio::test]
    async fn test_scratch_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir_in(root.path()).unwrap();
        let artifact = scratch.path().join("results.json");
        tokio::fs::write(&artifact, b"[]").await.unwrap();

        let path = scratch.path().to_path_buf();
        drop(scratch);

        assert!(!path.exists());
        assert!(!artifact.exists());
    }

    #[test]
    fn test_empty_predictions_guard() {
        let envelopes = vec![PredictionEnvelope {
            results: roar_emotion_client::types::PredictionResults { predictions: vec![] },
        }];

        let err = face_frame_predictions(&envelopes).unwrap_err();
        assert!(matches!(err, WorkerError::EmptyResult(_)));
        assert!(err.to_string().contains("No predictions"));
    }

    #[test]
    fn test_missing_face_group_guard() {
        let envelopes = vec![PredictionEnvelope {
            results: roar_emotion_client::types::PredictionResults {
                predictions: vec![roar_emotion_client::types::SourcePrediction {
                    models: roar_emotion_client::types::ModelPredictions { face: None },
                }],
            },
        }];

        let err = face_frame_predictions(&envelopes).unwrap_err();
        assert!(err.to_string().contains("No face predictions"));
    }
}
