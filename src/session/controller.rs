//! Session controller: the operations exposed to the service layer.

use std::sync::Arc;

use nalgebra::Point2;
use tracing::{error, info};

use super::source::{FrameSource, VideoMetadata};
use super::state::{Progress, SessionId, SessionStatus};
use super::store::{SessionHandle, SessionStore};
use super::task::{ProcessingTask, TaskParams};
use crate::calibration::CalibrationTransform;
use crate::config::Settings;
use crate::statistics::{MatchStatistics, StatisticsEngine};
use crate::tracker::Tracker;
use crate::trajectory::TrajectorySnapshot;
use crate::{Error, Result};

/// Orchestrates calibration, processing and result retrieval of sessions.
///
/// Owns its [`SessionStore`]; independent controllers share nothing.
#[derive(Debug)]
pub struct SessionController {
    settings: Settings,
    engine: StatisticsEngine,
    store: SessionStore,
}

impl SessionController {
    /// Create a controller. Fails on invalid settings.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            engine: settings.statistics_engine()?,
            store: SessionStore::new(settings.sessions.max_sessions),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn handle(&self, id: &SessionId) -> Result<Arc<SessionHandle>> {
        self.store.get(id)
    }

    /// Open a new idle session, evicting the oldest ones above capacity.
    pub fn open_session(&self) -> SessionId {
        let (handle, evicted) = self.store.create();
        info!(session = %handle.id, evicted = evicted.len(), "session_opened");
        handle.id
    }

    /// Calibrate from 4 pixel points matched to the surface corners.
    ///
    /// # Errors
    /// * `CalibrationRequired` unless exactly 4 points are supplied
    /// * `DegenerateCalibration` for duplicate or collinear points
    /// * `InvalidSession` for unknown ids
    pub fn set_calibration(&self, id: &SessionId, points: &[Point2<f64>]) -> Result<()> {
        let handle = self.handle(id)?;
        let transform = CalibrationTransform::build(points, self.settings.field.length, self.settings.field.width)?;
        handle.write().set_calibration(transform)?;
        info!(session = %id, "calibration_set");
        Ok(())
    }

    /// Start background processing of `source`.
    ///
    /// # Errors
    /// * `CalibrationRequired` if no calibration was set; the session stays idle
    /// * `AlreadyRunning` if the session is processing
    /// * `AlreadyFinished` if the session is completed or failed
    pub fn start_processing(&self, id: &SessionId, source: Box<dyn FrameSource>) -> Result<()> {
        let handle = self.handle(id)?;
        let metadata = source.metadata();
        metadata.validate()?;
        let tracker = Tracker::new(self.settings.tracker_config())?;

        let transform = handle.write().begin(metadata)?;

        let params = TaskParams {
            confidence_threshold: self.settings.tracking.confidence_threshold,
            frame_stride: self.settings.tracking.frame_stride,
        };
        let task = ProcessingTask::new(Arc::clone(&handle), source, transform, tracker, metadata, params);

        match task.spawn() {
            Ok(worker) => {
                handle.set_worker(worker);
                Ok(())
            }
            Err(e) => {
                handle.write().fail(format!("failed to spawn processing task: {}", e));
                error!(session = %id, error = %e, "processing_spawn_failed");
                Err(Error::ProcessingFailed(e.to_string()))
            }
        }
    }

    pub fn get_progress(&self, id: &SessionId) -> Result<Progress> {
        Ok(self.handle(id)?.read().progress())
    }

    /// Statistics of a completed session.
    ///
    /// # Errors
    /// * `NotReady` while idle or processing
    /// * `SessionFailed` with the recorded cause once failed
    pub fn get_results(&self, id: &SessionId) -> Result<MatchStatistics> {
        let handle = self.handle(id)?;
        let (snapshot, fps) = {
            let state = handle.read();
            match state.status() {
                SessionStatus::Completed => {}
                SessionStatus::Failed => {
                    return Err(Error::SessionFailed {
                        id: *id,
                        cause: state.error().unwrap_or("unknown").to_string(),
                    });
                }
                SessionStatus::Idle | SessionStatus::Processing => return Err(Error::NotReady(*id)),
            }
            let fps = state.metadata().map(|m| m.fps).ok_or(Error::NotReady(*id))?;
            (state.trajectories.snapshot(), fps)
        };
        self.engine.compute(&snapshot, fps)
    }

    /// Current trajectories in any state, including a failed session's partial data.
    pub fn trajectories(&self, id: &SessionId) -> Result<TrajectorySnapshot> {
        Ok(self.handle(id)?.read().trajectories.snapshot())
    }

    pub fn metadata(&self, id: &SessionId) -> Result<Option<VideoMetadata>> {
        Ok(self.handle(id)?.read().metadata().copied())
    }

    /// Ask a processing session to stop at its next frame boundary.
    ///
    /// # Returns
    /// Whether the session was processing when the request was made.
    pub fn cancel(&self, id: &SessionId) -> Result<bool> {
        let handle = self.handle(id)?;
        if handle.status() != SessionStatus::Processing {
            return Ok(false);
        }
        handle.request_cancel();
        info!(session = %id, "cancel_requested");
        Ok(true)
    }

    /// Block until the session's processing task has finished.
    pub fn wait(&self, id: &SessionId) -> Result<Progress> {
        let handle = self.handle(id)?;
        if let Some(worker) = handle.take_worker() {
            if worker.join().is_err() {
                handle.write().fail("processing task panicked");
                error!(session = %id, "processing_panicked");
            }
        }
        let progress = handle.read().progress();
        Ok(progress)
    }

    /// Remove a session. Refused while processing.
    pub fn evict_session(&self, id: &SessionId) -> Result<()> {
        self.store.evict(id)
    }

    /// Retained session ids, oldest first.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.store.ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Detection, FrameBatch};
    use crate::session::VecFrameSource;

    fn rect() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 50.0),
            Point2::new(0.0, 50.0),
        ]
    }

    fn source(frames: u64) -> Box<dyn FrameSource> {
        // One player walking along x, 2.5 px (1 m) per frame
        let batches = (0..frames)
            .map(|i| {
                let det = Detection::new(Point2::new(10.0 + 2.5 * i as f64, 25.0), 0.9).unwrap();
                FrameBatch::at_rate(i, 10.0, vec![det])
            })
            .collect();
        Box::new(VecFrameSource::new(VideoMetadata::new(10.0, frames), batches))
    }

    #[test]
    fn test_start_requires_calibration() {
        let controller = SessionController::new(Settings::default()).unwrap();
        let id = controller.open_session();

        assert!(matches!(
            controller.start_processing(&id, source(3)),
            Err(Error::CalibrationRequired)
        ));
        assert_eq!(controller.get_progress(&id).unwrap().status, SessionStatus::Idle);
    }

    #[test]
    fn test_set_calibration_point_count() {
        let controller = SessionController::new(Settings::default()).unwrap();
        let id = controller.open_session();

        assert!(matches!(
            controller.set_calibration(&id, &rect()[..2]),
            Err(Error::CalibrationRequired)
        ));
        assert!(controller.set_calibration(&id, &rect()).is_ok());
    }

    #[test]
    fn test_full_run() {
        let controller = SessionController::new(Settings::default()).unwrap();
        let id = controller.open_session();
        controller.set_calibration(&id, &rect()).unwrap();
        controller.start_processing(&id, source(5)).unwrap();

        let progress = controller.wait(&id).unwrap();
        assert_eq!(progress, Progress { status: SessionStatus::Completed, progress: 100 });

        let results = controller.get_results(&id).unwrap();
        assert_eq!(results.players.len(), 1);
        assert!((results.players[0].distance_total - 4.0).abs() < 1e-9);

        assert!(matches!(
            controller.start_processing(&id, source(1)),
            Err(Error::AlreadyFinished(_))
        ));
    }

    #[test]
    fn test_results_not_ready_before_start() {
        let controller = SessionController::new(Settings::default()).unwrap();
        let id = controller.open_session();
        assert!(matches!(controller.get_results(&id), Err(Error::NotReady(_))));
    }

    #[test]
    fn test_unknown_session() {
        let controller = SessionController::new(Settings::default()).unwrap();
        let id = SessionId::new();
        assert!(matches!(controller.get_progress(&id), Err(Error::InvalidSession(_))));
        assert!(matches!(controller.evict_session(&id), Err(Error::InvalidSession(_))));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.sessions.max_sessions = 0;
        assert!(SessionController::new(settings).is_err());
    }
}
