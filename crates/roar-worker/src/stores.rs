//! Store adapters over the Firestore repositories.
//!
//! The queue and the handlers are written against seam traits; these
//! adapters bind them to the shared Firestore-backed store.

use async_trait::async_trait;
use tokio::sync::mpsc;

use roar_firestore::{
    watch_requested as firestore_watch_requested, CameraRepository, FirestoreClient, JobRepository,
    VideoSegmentRepository,
};
use roar_models::{Camera, CameraId, CameraStatus, Job, JobId, JobStatus, JobType, VideoSegment};
use roar_queue::{ClaimOutcome, JobStore, QueueError, QueueResult};

use crate::error::{WorkerError, WorkerResult};

// =============================================================================
// Jobs
// =============================================================================

/// `JobStore` implementation over the Firestore job repository.
pub struct FirestoreJobBoard {
    jobs: JobRepository,
    client: FirestoreClient,
}

impl FirestoreJobBoard {
    pub fn new(jobs: JobRepository, client: FirestoreClient) -> Self {
        Self { jobs, client }
    }
}

#[async_trait]
impl JobStore for FirestoreJobBoard {
    async fn watch_requested(
        &self,
        job_type: JobType,
    ) -> QueueResult<mpsc::UnboundedReceiver<Job>> {
        Ok(firestore_watch_requested(self.client.clone(), job_type))
    }

    async fn try_claim(&self, job: &Job, owner: &str) -> QueueResult<ClaimOutcome> {
        match self.jobs.try_claim(&job.id, owner).await {
            Ok(Some(claimed)) => Ok(ClaimOutcome::Claimed(claimed)),
            Ok(None) => Ok(ClaimOutcome::Lost),
            Err(e) => Err(QueueError::store(e)),
        }
    }

    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        owner: &str,
        message: Option<String>,
    ) -> QueueResult<()> {
        self.jobs
            .update_status(job_id, status, owner, message.as_deref())
            .await
            .map_err(QueueError::store)
    }

    async fn create(&self, job: &Job) -> QueueResult<()> {
        self.jobs.create(job).await.map_err(QueueError::store)
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        self.jobs.get(job_id).await.map_err(QueueError::store)
    }
}

// =============================================================================
// Cameras
// =============================================================================

/// Camera document and segment-record operations the capture state machine
/// depends on.
#[async_trait]
pub trait CameraDirectory: Send + Sync + 'static {
    /// Fetch a camera document.
    async fn get(&self, camera_id: &CameraId) -> WorkerResult<Option<Camera>>;

    /// Write the camera's capture status, optionally recording the
    /// subprocess pid and current segment filename. Transitions to
    /// `starting`/`stopped` clear the transient stop request flag.
    async fn set_status(
        &self,
        camera_id: &CameraId,
        status: CameraStatus,
        pid: Option<u32>,
        filename: Option<&str>,
    ) -> WorkerResult<()>;

    /// Raise the stop request flag.
    async fn request_stop(&self, camera_id: &CameraId) -> WorkerResult<()>;

    /// Probe the stop request flag.
    async fn stop_requested(&self, camera_id: &CameraId) -> WorkerResult<bool>;

    /// Append one segment record. Append-only, one per rotation.
    async fn append_segment(&self, segment: &VideoSegment) -> WorkerResult<()>;
}

/// `CameraDirectory` implementation over the Firestore repositories.
pub struct FirestoreCameraDirectory {
    cameras: CameraRepository,
    segments: VideoSegmentRepository,
    owner: String,
}

impl FirestoreCameraDirectory {
    pub fn new(cameras: CameraRepository, segments: VideoSegmentRepository, owner: String) -> Self {
        Self {
            cameras,
            segments,
            owner,
        }
    }
}

#[async_trait]
impl CameraDirectory for FirestoreCameraDirectory {
    async fn get(&self, camera_id: &CameraId) -> WorkerResult<Option<Camera>> {
        self.cameras.get(camera_id).await.map_err(WorkerError::from)
    }

    async fn set_status(
        &self,
        camera_id: &CameraId,
        status: CameraStatus,
        pid: Option<u32>,
        filename: Option<&str>,
    ) -> WorkerResult<()> {
        self.cameras
            .set_status(camera_id, status, &self.owner, pid, filename)
            .await
            .map_err(WorkerError::from)
    }

    async fn request_stop(&self, camera_id: &CameraId) -> WorkerResult<()> {
        self.cameras
            .request_stop(camera_id)
            .await
            .map_err(WorkerError::from)
    }

    async fn stop_requested(&self, camera_id: &CameraId) -> WorkerResult<bool> {
        self.cameras
            .stop_requested(camera_id)
            .await
            .map_err(WorkerError::from)
    }

    async fn append_segment(&self, segment: &VideoSegment) -> WorkerResult<()> {
        self.segments
            .append(segment)
            .await
            .map_err(WorkerError::from)
    }
}
