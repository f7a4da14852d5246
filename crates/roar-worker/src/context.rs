//! Shared worker context.
//!
//! All ambient handles are bundled here explicitly and passed to every
//! component at construction time; nothing reaches for globals.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use roar_emotion_client::EmotionClient;
use roar_firestore::{
    CameraRepository, FirestoreClient, JobRepository, SceneRepository, VideoSegmentRepository,
};
use roar_models::CameraId;
use roar_storage::BlobClient;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::stores::{FirestoreCameraDirectory, FirestoreJobBoard};

/// In-process stop flags for active captures.
///
/// A `CameraStartHandler` registers its camera here for the lifetime of the
/// capture; a co-located `CameraStopHandler` flips the flag without a store
/// round-trip. The document's `stopRequested` flag covers the cross-process
/// case.
#[derive(Clone, Default)]
pub struct CameraSignals {
    inner: Arc<Mutex<HashMap<CameraId, watch::Sender<bool>>>>,
}

impl CameraSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a camera's stop flag; returns the receiver the capture
    /// races against.
    pub fn register(&self, camera_id: &CameraId) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.inner
            .lock()
            .expect("camera signals lock poisoned")
            .insert(camera_id.clone(), tx);
        rx
    }

    /// Flip a registered camera's stop flag. Returns whether a local
    /// capture was signalled.
    pub fn signal_stop(&self, camera_id: &CameraId) -> bool {
        let inner = self.inner.lock().expect("camera signals lock poisoned");
        match inner.get(camera_id) {
            Some(tx) => {
                debug!("Set in-process stop flag for camera {}", camera_id);
                tx.send(true).is_ok()
            }
            None => false,
        }
    }

    /// Remove a camera's stop flag after its capture ended.
    pub fn deregister(&self, camera_id: &CameraId) {
        self.inner
            .lock()
            .expect("camera signals lock poisoned")
            .remove(camera_id);
    }
}

/// Explicit dependency bundle shared by all handlers and supervisors.
pub struct WorkerContext {
    pub config: WorkerConfig,
    /// Identity written as `owner` on claimed jobs and cameras
    pub processor_id: String,
    pub firestore: FirestoreClient,
    pub jobs: JobRepository,
    pub cameras: CameraRepository,
    pub segments: VideoSegmentRepository,
    pub scenes: SceneRepository,
    pub storage: BlobClient,
    pub emotion: EmotionClient,
    pub camera_signals: CameraSignals,
}

impl WorkerContext {
    /// Construct the full context from the environment.
    pub async fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let firestore = FirestoreClient::from_env().await?;
        let storage = BlobClient::from_env().await?;
        let emotion = EmotionClient::from_env()?;

        Ok(Self::with_clients(config, firestore, storage, emotion))
    }

    /// Construct from already-built clients.
    pub fn with_clients(
        config: WorkerConfig,
        firestore: FirestoreClient,
        storage: BlobClient,
        emotion: EmotionClient,
    ) -> Self {
        let processor_id = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            processor_id,
            jobs: JobRepository::new(firestore.clone()),
            cameras: CameraRepository::new(firestore.clone()),
            segments: VideoSegmentRepository::new(firestore.clone()),
            scenes: SceneRepository::new(firestore.clone()),
            firestore,
            storage,
            emotion,
            camera_signals: CameraSignals::new(),
        }
    }

    /// The job store seam backed by Firestore.
    pub fn job_board(&self) -> FirestoreJobBoard {
        FirestoreJobBoard::new(self.jobs.clone(), self.firestore.clone())
    }

    /// The camera store seam backed by Firestore.
    pub fn camera_directory(&self) -> FirestoreCameraDirectory {
        FirestoreCameraDirectory::new(
            self.cameras.clone(),
            self.segments.clone(),
            self.processor_id.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_stop_requires_registration() {
        let signals = CameraSignals::new();
        let camera = CameraId::from_string("cam-1");

        assert!(!signals.signal_stop(&camera));

        let mut rx = signals.register(&camera);
        assert!(!*rx.borrow_and_update());
        assert!(signals.signal_stop(&camera));
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn test_deregister_clears_flag() {
        let signals = CameraSignals::new();
        let camera = CameraId::from_string("cam-1");

        let _rx = signals.register(&camera);
        signals.deregister(&camera);
        assert!(!signals.signal_stop(&camera));
    }
}
