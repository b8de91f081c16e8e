//! Session identity, status and the per-session state machine.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::source::VideoMetadata;
use crate::calibration::CalibrationTransform;
use crate::trajectory::TrajectoryStore;
use crate::utils::clamp;
use crate::{Error, Result};

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    /// `Completed` and `Failed` accept no further processing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to a progress query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub status: SessionStatus,
    /// Percentage in `[0, 100]`; 100 only once completed.
    pub progress: u8,
}

/// Mutable state of one session.
///
/// Only the session's own processing task mutates it while `Processing`.
/// Transitions are methods so every change goes through the same checks.
#[derive(Debug)]
pub struct SessionState {
    id: SessionId,
    status: SessionStatus,
    progress: u8,
    calibration: Option<Arc<CalibrationTransform>>,
    metadata: Option<VideoMetadata>,
    error: Option<String>,
    evicted: bool,
    frames_tracked: u64,
    /// Trajectories built so far; partial after a failure.
    pub trajectories: TrajectoryStore,
}

impl SessionState {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            status: SessionStatus::Idle,
            progress: 0,
            calibration: None,
            metadata: None,
            error: None,
            evicted: false,
            frames_tracked: 0,
            trajectories: TrajectoryStore::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn progress(&self) -> Progress {
        Progress {
            status: self.status,
            progress: self.progress,
        }
    }

    pub fn calibration(&self) -> Option<&Arc<CalibrationTransform>> {
        self.calibration.as_ref()
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    /// Cause recorded when the session failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn frames_tracked(&self) -> u64 {
        self.frames_tracked
    }

    fn ensure_present(&self) -> Result<()> {
        if self.evicted {
            return Err(Error::InvalidSession(self.id));
        }
        Ok(())
    }

    /// Store a calibration. Only allowed before processing starts.
    pub fn set_calibration(&mut self, transform: CalibrationTransform) -> Result<()> {
        self.ensure_present()?;
        match self.status {
            SessionStatus::Idle => {
                self.calibration = Some(Arc::new(transform));
                Ok(())
            }
            SessionStatus::Processing => Err(Error::AlreadyRunning(self.id)),
            SessionStatus::Completed | SessionStatus::Failed => Err(Error::AlreadyFinished(self.id)),
        }
    }

    /// `idle -> processing`.
    ///
    /// Leaves the state untouched on error.
    pub fn begin(&mut self, metadata: VideoMetadata) -> Result<Arc<CalibrationTransform>> {
        self.ensure_present()?;
        match self.status {
            SessionStatus::Idle => {}
            SessionStatus::Processing => return Err(Error::AlreadyRunning(self.id)),
            SessionStatus::Completed | SessionStatus::Failed => return Err(Error::AlreadyFinished(self.id)),
        }
        let transform = self.calibration.clone().ok_or(Error::CalibrationRequired)?;

        self.status = SessionStatus::Processing;
        self.progress = 0;
        self.metadata = Some(metadata);
        Ok(transform)
    }

    /// Raise progress while processing. Never decreases and stays below 100.
    pub fn advance(&mut self, percent: u8) {
        if self.status == SessionStatus::Processing {
            self.progress = self.progress.max(clamp(percent, 0, 99));
        }
    }

    pub(crate) fn record_tracked_frame(&mut self) {
        self.frames_tracked += 1;
    }

    /// `processing -> completed`.
    pub fn complete(&mut self) {
        if self.status == SessionStatus::Processing {
            self.status = SessionStatus::Completed;
            self.progress = 100;
        }
    }

    /// `processing -> failed`, keeping the partial trajectories.
    pub fn fail(&mut self, cause: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = SessionStatus::Failed;
            self.error = Some(cause.into());
        }
    }

    /// Mark as removed from the registry. Refused while processing.
    pub(crate) fn mark_evicted(&mut self) -> Result<()> {
        if self.status == SessionStatus::Processing {
            return Err(Error::EvictionRefused(self.id));
        }
        self.evicted = true;
        Ok(())
    }
}
