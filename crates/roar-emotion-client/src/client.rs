//! Expression measurement HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{EmotionError, EmotionResult};
use crate::types::{EngineJobId, JobDetails, PredictionEnvelope, SubmitResponse};

/// Configuration for the emotion client.
#[derive(Debug, Clone)]
pub struct EmotionConfig {
    /// Base URL of the expression measurement API
    pub base_url: String,
    /// API key sent with every request
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max transport retries
    pub max_retries: u32,
}

impl EmotionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> EmotionResult<Self> {
        Ok(Self {
            base_url: std::env::var("EMOTION_API_URL")
                .unwrap_or_else(|_| "http://localhost:8010".to_string()),
            api_key: std::env::var("EMOTION_API_KEY")
                .map_err(|_| EmotionError::config_error("EMOTION_API_KEY not set"))?,
            timeout: Duration::from_secs(
                std::env::var("EMOTION_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_retries: std::env::var("EMOTION_API_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        })
    }
}

/// Client for the hosted expression measurement API.
///
/// The surface is submit / poll / fetch: media goes up as one batch job,
/// status is polled until a terminal state, predictions are fetched once
/// the job completes.
pub struct EmotionClient {
    http: Client,
    config: EmotionConfig,
}

impl EmotionClient {
    /// Create a new client.
    pub fn new(config: EmotionConfig) -> EmotionResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EmotionError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> EmotionResult<Self> {
        Self::new(EmotionConfig::from_env()?)
    }

    fn jobs_url(&self) -> String {
        format!("{}/v0/batch/jobs", self.config.base_url)
    }

    /// Submit a local media file for face expression measurement.
    pub async fn submit_file(&self, path: impl AsRef<Path>) -> EmotionResult<EngineJobId> {
        let path = path.as_ref();
        let url = self.jobs_url();

        debug!("Submitting {} to {}", path.display(), url);

        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.mp4".to_string());

        // Select the face model with default settings.
        let models = serde_json::json!({ "models": { "face": {} } });

        let form = Form::new()
            .part("json", Part::text(models.to_string()))
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str("video/mp4")
                    .map_err(|e| EmotionError::request_failed(e.to_string()))?,
            );

        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", &self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmotionError::request_failed(format!(
                "Submit returned {}: {}",
                status, body
            )));
        }

        let submitted: SubmitResponse = response.json().await?;
        info!("Expression job is {}", submitted.job_id);
        Ok(submitted.job_id)
    }

    /// Fetch the current state of a submitted job.
    pub async fn job_details(&self, job_id: &EngineJobId) -> EmotionResult<JobDetails> {
        let url = format!("{}/{}", self.jobs_url(), job_id);

        let response = self
            .with_retry(|| async {
                self.http
                    .get(&url)
                    .header("X-Api-Key", &self.config.api_key)
                    .send()
                    .await
                    .map_err(EmotionError::Network)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmotionError::request_failed(format!(
                "Job details returned {}: {}",
                status, body
            )));
        }

        let details: JobDetails = response.json().await?;
        Ok(details)
    }

    /// Fetch raw predictions for a completed job.
    pub async fn predictions(
        &self,
        job_id: &EngineJobId,
    ) -> EmotionResult<Vec<PredictionEnvelope>> {
        let url = format!("{}/{}/predictions", self.jobs_url(), job_id);

        let response = self
            .with_retry(|| async {
                self.http
                    .get(&url)
                    .header("X-Api-Key", &self.config.api_key)
                    .send()
                    .await
                    .map_err(EmotionError::Network)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmotionError::request_failed(format!(
                "Predictions returned {}: {}",
                status, body
            )));
        }

        let envelopes: Vec<PredictionEnvelope> = response.json().await?;
        Ok(envelopes)
    }

    /// Execute with retry logic for transport-level failures.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> EmotionResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = EmotionResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Emotion API request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| EmotionError::request_failed("Unknown error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngineStatus;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> EmotionClient {
        EmotionClient::new(EmotionConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_file_returns_job_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v0/batch/jobs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "job_id": "ej-1" })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("audience.mp4");
        std::fs::write(&media, b"not really video").unwrap();

        let client = test_client(&server);
        let job_id = client.submit_file(&media).await.unwrap();
        assert_eq!(job_id.as_str(), "ej-1");
    }

    #[tokio::test]
    async fn test_job_details_reports_failure_reason() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v0/batch/jobs/ej-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": { "status": "FAILED", "message": "face model crashed" }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let details = client
            .job_details(&EngineJobId::from_string("ej-1"))
            .await
            .unwrap();

        assert_eq!(details.state.status, EngineStatus::Failed);
        assert_eq!(details.state.message.as_deref(), Some("face model crashed"));
    }

    #[tokio::test]
    async fn test_predictions_parses_empty_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v0/batch/jobs/ej-1/predictions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "results": { "predictions": [] } }
            ])))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let envelopes = client
            .predictions(&EngineJobId::from_string("ej-1"))
            .await
            .unwrap();

        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].results.predictions.is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure_surfaces_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v0/batch/jobs"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad media"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("audience.mp4");
        std::fs::write(&media, b"x").unwrap();

        let client = test_client(&server);
        let err = client.submit_file(&media).await.unwrap_err();
        assert!(err.to_string().contains("bad media"));
    }
}
