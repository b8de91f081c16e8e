//! # Futsal Tracker - Calibrated Player Tracking
//!
//! Turns per-frame player detections (pixel-space ground-contact points) into
//! calibrated per-player trajectories on the playing surface, then reduces
//! those trajectories into distance, speed and role statistics.
//!
//! ## Features
//!
//! - Four-point perspective calibration from pixels to surface meters
//! - Greedy nearest-neighbor identity association (optimal matching optional)
//! - Append-only trajectories with snapshot reads during processing
//! - Deterministic per-player and team statistics
//! - Session lifecycle with background processing, progress and eviction
//! - CSV and JSON export
//!
//! ## Example
//!
//! ```rust,ignore
//! use futsal_tracker::{SessionController, Settings, VecFrameSource};
//! use nalgebra::Point2;
//!
//! let controller = SessionController::new(Settings::default())?;
//! let id = controller.open_session();
//! controller.set_calibration(&id, &[
//!     Point2::new(0.0, 0.0), Point2::new(100.0, 0.0),
//!     Point2::new(100.0, 50.0), Point2::new(0.0, 50.0),
//! ])?;
//! controller.start_processing(&id, Box::new(source))?;
//! controller.wait(&id)?;
//! let results = controller.get_results(&id)?;
//! ```

pub(crate) mod internal;

pub mod calibration;
pub mod config;
pub mod detection;
pub mod export;
pub mod logger;
pub mod matching;
pub mod session;
pub mod statistics;
pub mod tracker;
pub mod trajectory;
pub mod utils;

// Re-exports for convenience
pub use calibration::{map_to_world, CalibrationTransform, CoordinateTransformation};
pub use config::Settings;
pub use detection::{Detection, FrameBatch};
pub use export::ExportFormat;
pub use matching::MatchingStrategy;
pub use session::{
    ChannelFrameSource, FrameSource, Progress, SessionController, SessionId, SessionStatus,
    VecFrameSource, VideoMetadata,
};
pub use statistics::{MatchStatistics, PlayerStatistics, Role, StatisticsEngine, TeamStatistics};
pub use tracker::{Assignment, Tracker, TrackerConfig};
pub use trajectory::{EntityId, PositionSample, TrackedEntity, TrajectorySnapshot, TrajectoryStore};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use crate::session::SessionId;
    use crate::trajectory::EntityId;
    use thiserror::Error;

    /// Errors that can occur in the tracking pipeline
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Calibration required: exactly 4 reference points must be set before processing")]
        CalibrationRequired,

        #[error("Degenerate calibration: {0}")]
        DegenerateCalibration(String),

        #[error("Invalid session: {0}")]
        InvalidSession(SessionId),

        #[error("Session {0} is already processing")]
        AlreadyRunning(SessionId),

        #[error("Session {0} has already finished; open a new session to reprocess")]
        AlreadyFinished(SessionId),

        #[error("Session {0} has no results yet")]
        NotReady(SessionId),

        #[error("Session {id} failed: {cause}")]
        SessionFailed { id: SessionId, cause: String },

        #[error("Processing failed: {0}")]
        ProcessingFailed(String),

        #[error("Processing cancelled")]
        Cancelled,

        #[error("Session {0} is processing and cannot be evicted")]
        EvictionRefused(SessionId),

        #[error("Trajectory order violated for entity {entity}: frame {got} after frame {last}")]
        TrajectoryOrder { entity: EntityId, last: u64, got: u64 },

        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid detection: {0}")]
        InvalidDetection(String),

        #[error("Unsupported export format: {0}")]
        UnsupportedFormat(String),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
    }

    /// Result type for tracking operations
    pub type Result<T> = std::result::Result<T, Error>;
}
