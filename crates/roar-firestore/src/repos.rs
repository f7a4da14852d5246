//! Typed repositories for jobs, cameras, video segments, and scenes.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use roar_models::{
    Camera, CameraId, CameraStatus, Job, JobId, JobStatus, JobType, Scene, SceneId, VideoSegment,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_claim_lost;
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

/// Collection names in the shared store.
pub mod collections {
    pub const JOBS: &str = "jobs";
    pub const CAMERAS: &str = "cameras";
    pub const VIDEOS: &str = "videos";
    pub const SCENES: &str = "scenes";
}

// =============================================================================
// Jobs
// =============================================================================

/// Repository for job documents.
#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// The underlying client (shared by the watch task).
    pub fn client(&self) -> &FirestoreClient {
        &self.client
    }

    /// Create a new job document in `requested` state.
    pub async fn create(&self, job: &Job) -> FirestoreResult<()> {
        let fields = job_to_fields(job);
        self.client
            .create_document(collections::JOBS, job.id.as_str(), fields)
            .await?;
        info!("Created job {} ({})", job.id, job.job_type);
        Ok(())
    }

    /// Get a job by ID.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<Job>> {
        let doc = self
            .client
            .get_document(collections::JOBS, job_id.as_str())
            .await?;

        doc.map(|d| document_to_job(&d)).transpose()
    }

    /// Attempt an exclusive claim of a requested job.
    ///
    /// Re-reads the document, verifies it is still `requested`, then writes
    /// `{status: processing, owner, updated}` preconditioned on the
    /// document's `updateTime`. Returns `Ok(None)` when the claim is lost:
    /// the job vanished, was already past `requested`, or another processor
    /// won the compare-and-set. A lost claim is the expected race outcome,
    /// never an error.
    pub async fn try_claim(&self, job_id: &JobId, owner: &str) -> FirestoreResult<Option<Job>> {
        let doc = match self
            .client
            .get_document(collections::JOBS, job_id.as_str())
            .await?
        {
            Some(doc) => doc,
            None => {
                debug!("Claim lost: job {} no longer exists", job_id);
                return Ok(None);
            }
        };

        let mut job = document_to_job(&doc)?;
        if job.status != JobStatus::Requested {
            debug!("Claim lost: job {} already {}", job_id, job.status);
            record_claim_lost(job.job_type.as_str());
            return Ok(None);
        }

        let now = Utc::now();
        let mut fields = HashMap::new();
        fields.insert(
            "status".to_string(),
            JobStatus::Processing.as_str().to_firestore_value(),
        );
        fields.insert("owner".to_string(), owner.to_firestore_value());
        fields.insert("updated".to_string(), now.to_firestore_value());

        let mask = vec![
            "status".to_string(),
            "owner".to_string(),
            "updated".to_string(),
        ];

        match self
            .client
            .update_document_with_precondition(
                collections::JOBS,
                job_id.as_str(),
                fields,
                Some(mask),
                doc.update_time.as_deref(),
            )
            .await
        {
            Ok(_) => {
                job.status = JobStatus::Processing;
                job.owner = Some(owner.to_string());
                job.updated = now;
                Ok(Some(job))
            }
            Err(e) if e.is_precondition_failed() => {
                debug!("Claim lost: job {} taken by a concurrent processor", job_id);
                record_claim_lost(job.job_type.as_str());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write a job's status, owner, and message.
    pub async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        owner: &str,
        message: Option<&str>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("owner".to_string(), owner.to_firestore_value());
        fields.insert("updated".to_string(), Utc::now().to_firestore_value());
        fields.insert("message".to_string(), message.to_firestore_value());

        self.client
            .update_document(
                collections::JOBS,
                job_id.as_str(),
                fields,
                Some(vec![
                    "status".to_string(),
                    "owner".to_string(),
                    "updated".to_string(),
                    "message".to_string(),
                ]),
            )
            .await?;
        Ok(())
    }
}

// =============================================================================
// Cameras
// =============================================================================

/// Repository for camera documents.
#[derive(Clone)]
pub struct CameraRepository {
    client: FirestoreClient,
}

impl CameraRepository {
    /// Create a new camera repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get a camera by ID.
    pub async fn get(&self, camera_id: &CameraId) -> FirestoreResult<Option<Camera>> {
        let doc = self
            .client
            .get_document(collections::CAMERAS, camera_id.as_str())
            .await?;

        doc.map(|d| document_to_camera(&d)).transpose()
    }

    /// Write the camera's capture status.
    ///
    /// Transitions to `starting` or `stopped` clear the transient
    /// `stopRequested` flag: the field is named in the update mask without a
    /// value, which deletes it from the document.
    pub async fn set_status(
        &self,
        camera_id: &CameraId,
        status: CameraStatus,
        owner: &str,
        pid: Option<u32>,
        filename: Option<&str>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("owner".to_string(), owner.to_firestore_value());
        fields.insert("updated".to_string(), Utc::now().to_firestore_value());

        let mut mask = vec![
            "status".to_string(),
            "owner".to_string(),
            "updated".to_string(),
        ];

        if let Some(pid) = pid {
            fields.insert("pid".to_string(), pid.to_firestore_value());
            mask.push("pid".to_string());
        }
        if let Some(filename) = filename {
            fields.insert("filename".to_string(), filename.to_firestore_value());
            mask.push("filename".to_string());
        }
        if matches!(status, CameraStatus::Starting | CameraStatus::Stopped) {
            mask.push("stopRequested".to_string());
        }

        self.client
            .update_document(collections::CAMERAS, camera_id.as_str(), fields, Some(mask))
            .await?;
        Ok(())
    }

    /// Raise the transient stop request flag.
    pub async fn request_stop(&self, camera_id: &CameraId) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("stopRequested".to_string(), true.to_firestore_value());
        fields.insert("updated".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                collections::CAMERAS,
                camera_id.as_str(),
                fields,
                Some(vec!["stopRequested".to_string(), "updated".to_string()]),
            )
            .await?;
        Ok(())
    }

    /// Probe the stop request flag.
    pub async fn stop_requested(&self, camera_id: &CameraId) -> FirestoreResult<bool> {
        let doc = self
            .client
            .get_document(collections::CAMERAS, camera_id.as_str())
            .await?;

        Ok(doc
            .and_then(|d| d.get::<bool>("stopRequested"))
            .unwrap_or(false))
    }
}

// =============================================================================
// Video segments
// =============================================================================

/// Repository for video segment records. Append-only.
#[derive(Clone)]
pub struct VideoSegmentRepository {
    client: FirestoreClient,
}

impl VideoSegmentRepository {
    /// Create a new segment repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Append one record for a freshly opened segment file.
    pub async fn append(&self, segment: &VideoSegment) -> FirestoreResult<()> {
        let fields = segment_to_fields(segment);
        self.client
            .create_document(collections::VIDEOS, segment.id.as_str(), fields)
            .await?;
        info!(
            "Recorded segment {} for camera {}",
            segment.filename, segment.camera_id
        );
        Ok(())
    }
}

// =============================================================================
// Scenes
// =============================================================================

/// Repository for scene documents. The worker only reads scenes and writes
/// their `results` path.
#[derive(Clone)]
pub struct SceneRepository {
    client: FirestoreClient,
}

impl SceneRepository {
    /// Create a new scene repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get a scene by ID.
    pub async fn get(&self, scene_id: &SceneId) -> FirestoreResult<Option<Scene>> {
        let doc = self
            .client
            .get_document(collections::SCENES, scene_id.as_str())
            .await?;

        Ok(doc.map(|d| Scene {
            id: scene_id.clone(),
            results: d.get::<String>("results"),
        }))
    }

    /// Set the scene's results blob path.
    pub async fn set_results(&self, scene_id: &SceneId, results_path: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("results".to_string(), results_path.to_firestore_value());

        self.client
            .update_document(
                collections::SCENES,
                scene_id.as_str(),
                fields,
                Some(vec!["results".to_string()]),
            )
            .await?;
        Ok(())
    }
}

// =============================================================================
// Document conversions
// =============================================================================

fn job_to_fields(job: &Job) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), job.id.as_str().to_firestore_value());
    fields.insert("type".to_string(), job.job_type.as_str().to_firestore_value());
    fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
    fields.insert("refType".to_string(), job.ref_type.to_firestore_value());
    fields.insert("refId".to_string(), job.ref_id.to_firestore_value());
    fields.insert("message".to_string(), job.message.to_firestore_value());
    fields.insert("owner".to_string(), job.owner.to_firestore_value());
    fields.insert("created".to_string(), job.created.to_firestore_value());
    fields.insert("updated".to_string(), job.updated.to_firestore_value());
    fields
}

/// Convert a job document into a model. Fails on missing or unknown
/// type/status fields; everything else degrades gracefully.
pub fn document_to_job(doc: &Document) -> FirestoreResult<Job> {
    let id = doc
        .get::<String>("id")
        .or_else(|| doc.doc_id().map(str::to_string))
        .ok_or_else(|| FirestoreError::invalid_response("job document has no id"))?;

    let job_type = doc
        .get::<String>("type")
        .and_then(|s| JobType::parse(&s))
        .ok_or_else(|| {
            FirestoreError::invalid_response(format!("job {} has an unknown type", id))
        })?;

    let status = doc
        .get::<String>("status")
        .and_then(|s| JobStatus::parse(&s))
        .ok_or_else(|| {
            FirestoreError::invalid_response(format!("job {} has an unknown status", id))
        })?;

    let fallback_created = doc
        .create_time
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.into())
        .unwrap_or_else(Utc::now);

    Ok(Job {
        id: JobId::from_string(id),
        job_type,
        status,
        ref_type: doc.get::<String>("refType").unwrap_or_default(),
        ref_id: doc.get::<String>("refId").unwrap_or_default(),
        message: doc.get::<String>("message"),
        owner: doc.get::<String>("owner"),
        created: doc.get("created").unwrap_or(fallback_created),
        updated: doc.get("updated").unwrap_or(fallback_created),
    })
}

/// Convert a camera document into a model.
pub fn document_to_camera(doc: &Document) -> FirestoreResult<Camera> {
    let id = doc
        .get::<String>("id")
        .or_else(|| doc.doc_id().map(str::to_string))
        .ok_or_else(|| FirestoreError::invalid_response("camera document has no id"))?;

    let status = doc
        .get::<String>("status")
        .and_then(|s| CameraStatus::parse(&s))
        .unwrap_or_default();

    Ok(Camera {
        id: CameraId::from_string(id),
        rtsp_url: doc.get::<String>("rtspUrl").unwrap_or_default(),
        prefix: doc.get::<String>("prefix").unwrap_or_default(),
        status,
        owner: doc.get::<String>("owner"),
        pid: doc.get::<u32>("pid"),
        filename: doc.get::<String>("filename"),
        stop_requested: doc.get::<bool>("stopRequested").unwrap_or(false),
    })
}

fn segment_to_fields(segment: &VideoSegment) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), segment.id.as_str().to_firestore_value());
    fields.insert(
        "cameraId".to_string(),
        segment.camera_id.as_str().to_firestore_value(),
    );
    fields.insert("filename".to_string(), segment.filename.to_firestore_value());
    fields.insert("created".to_string(), segment.created.to_firestore_value());
    fields.insert("updated".to_string(), segment.updated.to_firestore_value());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(fields: Vec<(&str, Value)>) -> Document {
        Document {
            name: Some("projects/p/databases/(default)/documents/jobs/job-1".to_string()),
            fields: Some(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            create_time: Some("2024-01-01T12:00:00Z".to_string()),
            update_time: Some("2024-01-01T12:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_job_document_round_trip() {
        let job = Job::requested(JobType::DetectFacialExpressions, "scene", "scene-1");
        let fields = job_to_fields(&job);
        let doc = Document::new(fields);

        let back = document_to_job(&doc).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.job_type, job.job_type);
        assert_eq!(back.status, JobStatus::Requested);
        assert_eq!(back.ref_id, "scene-1");
    }

    #[test]
    fn test_job_document_unknown_type_rejected() {
        let doc = doc_with(vec![
            ("id", "job-1".to_firestore_value()),
            ("type", "MakeCoffee".to_firestore_value()),
            ("status", "requested".to_firestore_value()),
        ]);

        assert!(document_to_job(&doc).is_err());
    }

    #[test]
    fn test_job_id_falls_back_to_resource_name() {
        let doc = doc_with(vec![
            ("type", "StartCamera".to_firestore_value()),
            ("status", "requested".to_firestore_value()),
            ("refType", "camera".to_firestore_value()),
            ("refId", "cam-1".to_firestore_value()),
        ]);

        let job = document_to_job(&doc).unwrap();
        assert_eq!(job.id.as_str(), "job-1");
    }

    #[test]
    fn test_camera_document_defaults() {
        let doc = doc_with(vec![
            ("id", "cam-1".to_firestore_value()),
            ("rtspUrl", "rtsp://x".to_firestore_value()),
            ("prefix", "cam1".to_firestore_value()),
        ]);

        let camera = document_to_camera(&doc).unwrap();
        assert_eq!(camera.status, CameraStatus::Stopped);
        assert!(!camera.stop_requested);
        assert!(camera.pid.is_none());
    }

    #[test]
    fn test_segment_fields_are_complete() {
        let segment = VideoSegment::opened(
            CameraId::from_string("cam-1"),
            "cam1-20240101-120000.mp4",
        );
        let fields = segment_to_fields(&segment);

        for key in ["id", "cameraId", "filename", "created", "updated"] {
            assert!(fields.contains_key(key), "missing field {}", key);
        }
        assert!(!segment.id.as_str().is_empty());
    }
}
