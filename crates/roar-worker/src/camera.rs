//! Camera capture handlers.
//!
//! `CameraStartHandler` owns the capture subprocess for the lifetime of one
//! job execution and drives the camera's state machine:
//! `stopped -> starting -> capturing -> stopped`, with any failure during
//! `starting`/`capturing` still ending at `stopped`. `CameraStopHandler`
//! raises the stop request and returns; completion of the stop is observed
//! through the camera's later transition, never awaited.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use roar_capture::{segment_filename, CaptureCommand, CaptureController, CAPTURE_BINARY};
use roar_models::{Camera, CameraId, CameraStatus, Job, VideoSegment};

use crate::context::CameraSignals;
use crate::error::{WorkerError, WorkerResult};
use crate::handler::JobHandler;
use crate::stores::CameraDirectory;

/// Stop-signal watch owned by one capture invocation.
///
/// Merges the two stop sources into one flag: the in-process signal set by
/// a co-located stop handler, and the document's `stopRequested` flag
/// observed by a poll task. Both are opened here and closed on drop, on
/// every exit path of the capture.
struct StopWatch {
    rx: watch::Receiver<bool>,
    poll_task: tokio::task::JoinHandle<()>,
    signals: CameraSignals,
    camera_id: CameraId,
}

impl StopWatch {
    fn open<D: CameraDirectory>(
        directory: Arc<D>,
        signals: CameraSignals,
        camera_id: CameraId,
        poll_interval: Duration,
    ) -> Self {
        let rx = signals.register(&camera_id);

        let poll_signals = signals.clone();
        let poll_camera = camera_id.clone();
        let poll_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                match directory.stop_requested(&poll_camera).await {
                    Ok(true) => {
                        poll_signals.signal_stop(&poll_camera);
                        return;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Stop flag probe for camera {} failed: {}", poll_camera, e);
                    }
                }
            }
        });

        Self {
            rx,
            poll_task,
            signals,
            camera_id,
        }
    }

    fn receiver(&mut self) -> &mut watch::Receiver<bool> {
        &mut self.rx
    }
}

impl Drop for StopWatch {
    fn drop(&mut self) {
        self.poll_task.abort();
        self.signals.deregister(&self.camera_id);
    }
}

/// Handler for `StartCamera` jobs.
pub struct CameraStartHandler<D: CameraDirectory> {
    directory: Arc<D>,
    signals: CameraSignals,
    work_dir: PathBuf,
    stop_poll_interval: Duration,
    capture_program: String,
}

impl<D: CameraDirectory> CameraStartHandler<D> {
    pub fn new(
        directory: Arc<D>,
        signals: CameraSignals,
        work_dir: impl Into<PathBuf>,
        stop_poll_interval: Duration,
    ) -> Self {
        Self {
            directory,
            signals,
            work_dir: work_dir.into(),
            stop_poll_interval,
            capture_program: CAPTURE_BINARY.to_string(),
        }
    }

    /// Substitute the spawned program (tests use shell stand-ins).
    pub fn with_capture_program(mut self, program: impl Into<String>) -> Self {
        self.capture_program = program.into();
        self
    }

    /// Run the capture subprocess to completion or stop.
    async fn capture(&self, camera: &Camera) -> WorkerResult<()> {
        let dest = self.work_dir.join(camera.id.as_str());
        tokio::fs::create_dir_all(&dest).await?;

        let cmd = CaptureCommand::new(&camera.rtsp_url, &dest, &camera.prefix)
            .program(&self.capture_program);

        let mut stop_watch = StopWatch::open(
            Arc::clone(&self.directory),
            self.signals.clone(),
            camera.id.clone(),
            self.stop_poll_interval,
        );

        let mut controller = CaptureController::spawn(&cmd)?;
        let pid = controller.pid();
        info!("Capture for camera {} running as pid {:?}", camera.id, pid);

        let mut stop_armed = true;
        loop {
            tokio::select! {
                changed = stop_watch.receiver().changed(), if stop_armed => {
                    match changed {
                        Ok(()) if *stop_watch.receiver().borrow_and_update() => {
                            info!("Stopping camera {}", camera.id);
                            controller.request_stop().await?;
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => {
                            stop_armed = false;
                        }
                    }
                }
                line = controller.next_line() => {
                    let Some(line) = line else { break };
                    info!("[capture] {}", line);

                    if let Some(filename) = segment_filename(&line) {
                        // Segment rotation: status update first, then the
                        // append-only record. The pair is two writes, not
                        // one transaction.
                        self.directory
                            .set_status(&camera.id, CameraStatus::Capturing, pid, Some(filename))
                            .await?;
                        self.directory
                            .append_segment(&VideoSegment::opened(camera.id.clone(), filename))
                            .await?;
                    }
                }
            }
        }

        controller.wait().await?;
        info!("Camera {} capture completed", camera.id);
        Ok(())
    }
}

#[async_trait]
impl<D: CameraDirectory> JobHandler for CameraStartHandler<D> {
    async fn process(&self, job: &Job) -> WorkerResult<()> {
        let camera_id = CameraId::from_string(&job.ref_id);
        let camera = self
            .directory
            .get(&camera_id)
            .await?
            .ok_or_else(|| WorkerError::CameraNotFound(job.ref_id.clone()))?;

        if camera.status != CameraStatus::Stopped {
            return Err(WorkerError::CameraAlreadyRunning(job.ref_id.clone()));
        }

        self.directory
            .set_status(&camera_id, CameraStatus::Starting, None, None)
            .await?;

        let result = self.capture(&camera).await;

        // Last action on every exit path: the camera never stays in
        // `starting` or `capturing` once the subprocess is gone.
        let restore = self
            .directory
            .set_status(&camera_id, CameraStatus::Stopped, None, None)
            .await;

        result?;
        restore
    }
}

/// Handler for `StopCamera` jobs.
pub struct CameraStopHandler<D: CameraDirectory> {
    directory: Arc<D>,
    signals: CameraSignals,
}

impl<D: CameraDirectory> CameraStopHandler<D> {
    pub fn new(directory: Arc<D>, signals: CameraSignals) -> Self {
        Self { directory, signals }
    }
}

#[async_trait]
impl<D: CameraDirectory> JobHandler for CameraStopHandler<D> {
    async fn process(&self, job: &Job) -> WorkerResult<()> {
        let camera_id = CameraId::from_string(&job.ref_id);
        let camera = self
            .directory
            .get(&camera_id)
            .await?
            .ok_or_else(|| WorkerError::CameraNotFound(job.ref_id.clone()))?;

        if camera.status != CameraStatus::Capturing {
            return Err(WorkerError::CameraNotCapturing(job.ref_id.clone()));
        }

        if self.signals.signal_stop(&camera_id) {
            info!("Signalled co-located capture for camera {}", camera_id);
        }
        self.directory.request_stop(&camera_id).await?;

        // The stop completes asynchronously; the camera's own transition to
        // `stopped` is the observable completion.
        Ok(())
    }
}
