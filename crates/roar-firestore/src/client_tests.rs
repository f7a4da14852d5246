//! Tests for Firestore client functionality.

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roar_models::{JobId, JobStatus, JobType};

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::FirestoreError;
use crate::repos::JobRepository;
use crate::retry::RetryConfig;
use crate::token_cache::StaticTokenSource;

// =============================================================================
// Test Helpers
// =============================================================================

fn test_config() -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        watch_interval: Duration::from_millis(10),
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        },
    }
}

fn test_client(server: &MockServer) -> FirestoreClient {
    FirestoreClient::with_endpoint(
        test_config(),
        format!(
            "{}/v1/projects/test-project/databases/(default)/documents",
            server.uri()
        ),
        Arc::new(StaticTokenSource::new("test-token")),
    )
    .unwrap()
}

fn job_document_body(doc_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "name": format!(
            "projects/test-project/databases/(default)/documents/jobs/{}", doc_id
        ),
        "fields": {
            "id": { "stringValue": doc_id },
            "type": { "stringValue": "StartCamera" },
            "status": { "stringValue": status },
            "refType": { "stringValue": "camera" },
            "refId": { "stringValue": "cam-1" },
            "created": { "timestampValue": "2024-01-01T12:00:00Z" },
            "updated": { "timestampValue": "2024-01-01T12:00:00Z" }
        },
        "createTime": "2024-01-01T12:00:00.000000Z",
        "updateTime": "2024-01-01T12:00:00.000000Z"
    })
}

const JOB_PATH: &str = "/v1/projects/test-project/databases/(default)/documents/jobs/job-1";

// =============================================================================
// Error Type Tests
// =============================================================================

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_500() {
    let err = FirestoreError::from_http_status(500, "internal error");
    assert!(matches!(err, FirestoreError::ServerError(500, _)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_404() {
    let err = FirestoreError::from_http_status(404, "not found");
    assert!(matches!(err, FirestoreError::NotFound(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_from_http_status_412() {
    let err = FirestoreError::from_http_status(412, "precondition");
    assert!(err.is_precondition_failed());
    assert!(!err.is_retryable());
}

#[test]
fn test_error_http_status_getter() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(
        FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
        Some(502)
    );
    assert_eq!(
        FirestoreError::NotFound("doc".into()).http_status(),
        Some(404)
    );
}

#[test]
fn test_error_retry_after_ms() {
    assert_eq!(FirestoreError::RateLimited(5000).retry_after_ms(), Some(5000));
    assert_eq!(
        FirestoreError::ServerError(500, "error".into()).retry_after_ms(),
        None
    );
}

// =============================================================================
// Client Tests (wiremock)
// =============================================================================

#[tokio::test]
async fn test_get_document_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_document_body("job-1", "requested")))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let doc = client.get_document("jobs", "job-1").await.unwrap();
    assert!(doc.is_some());
    assert_eq!(doc.unwrap().doc_id(), Some("job-1"));
}

#[tokio::test]
async fn test_get_document_missing_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let doc = client.get_document("jobs", "job-1").await.unwrap();
    assert!(doc.is_none());
}

#[tokio::test]
async fn test_claim_succeeds_when_requested() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_document_body("job-1", "requested")))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_document_body("job-1", "processing")))
        .mount(&server)
        .await;

    let repo = JobRepository::new(test_client(&server));
    let claimed = repo
        .try_claim(&JobId::from_string("job-1"), "worker-a")
        .await
        .unwrap();

    let job = claimed.expect("claim should succeed");
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.owner.as_deref(), Some("worker-a"));
    assert_eq!(job.job_type, JobType::StartCamera);
}

#[tokio::test]
async fn test_claim_lost_on_precondition_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_document_body("job-1", "requested")))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let repo = JobRepository::new(test_client(&server));
    let claimed = repo
        .try_claim(&JobId::from_string("job-1"), "worker-a")
        .await
        .unwrap();

    assert!(claimed.is_none(), "a lost race is not an error");
}

#[tokio::test]
async fn test_claim_lost_when_already_processing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_document_body("job-1", "processing")))
        .mount(&server)
        .await;

    let repo = JobRepository::new(test_client(&server));
    let claimed = repo
        .try_claim(&JobId::from_string("job-1"), "worker-a")
        .await
        .unwrap();

    assert!(claimed.is_none());
}

#[tokio::test]
async fn test_run_query_parses_document_array() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/test-project/databases/(default)/documents:runQuery",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "document": job_document_body("job-1", "requested") },
            { "readTime": "2024-01-01T12:00:01Z" }
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let query = crate::types::StructuredQuery::collection_where_eq(
        "jobs",
        [("status", crate::types::ToFirestoreValue::to_firestore_value(&"requested"))],
    );
    let docs = client.run_query(query).await.unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].doc_id(), Some("job-1"));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
#[serial]
fn test_config_from_env_requires_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    let result = FirestoreConfig::from_env();
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_config_accepts_firebase_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "firebase-project");
    std::env::remove_var("FIREBASE_PROJECT_ID");
}

#[test]
#[serial]
fn test_config_default_values() {
    std::env::set_var("GCP_PROJECT_ID", "test-project");
    std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
    std::env::remove_var("FIRESTORE_WATCH_INTERVAL_SECS");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.watch_interval, Duration::from_secs(2));
    std::env::remove_var("GCP_PROJECT_ID");
}

#[test]
#[serial]
fn test_config_handles_invalid_env_values() {
    std::env::set_var("GCP_PROJECT_ID", "test-project");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
}
