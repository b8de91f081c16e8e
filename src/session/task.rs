//! Background processing of one session.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nalgebra::Point2;
use tracing::{debug, error, info, warn};

use super::source::{FrameSource, VideoMetadata};
use super::store::SessionHandle;
use crate::calibration::{CalibrationTransform, CoordinateTransformation};
use crate::detection::FrameBatch;
use crate::tracker::Tracker;
use crate::utils::warn_once;
use crate::{Error, Result};

/// Per-task tracking parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaskParams {
    pub confidence_threshold: f64,
    pub frame_stride: u64,
}

/// The single writer of a session while it is processing.
pub(crate) struct ProcessingTask {
    handle: Arc<SessionHandle>,
    source: Box<dyn FrameSource>,
    transform: Arc<CalibrationTransform>,
    tracker: Tracker,
    metadata: VideoMetadata,
    params: TaskParams,
}

impl ProcessingTask {
    pub fn new(
        handle: Arc<SessionHandle>,
        source: Box<dyn FrameSource>,
        transform: Arc<CalibrationTransform>,
        tracker: Tracker,
        metadata: VideoMetadata,
        params: TaskParams,
    ) -> Self {
        Self {
            handle,
            source,
            transform,
            tracker,
            metadata,
            params,
        }
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("session-{}", self.handle.id))
            .spawn(move || self.run())
    }

    /// Drive the session to a terminal state.
    ///
    /// A panic inside the pipeline fails the session instead of leaving it
    /// processing.
    pub fn run(mut self) {
        let id = self.handle.id;
        info!(
            session = %id,
            strategy = %self.tracker.config.strategy,
            frame_count = self.metadata.frame_count,
            fps = self.metadata.fps,
            "processing_started"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process()))
            .unwrap_or_else(|payload| Err(Error::ProcessingFailed(panic_message(payload.as_ref()))));

        match outcome {
            Ok(frames) => {
                self.handle.write().complete();
                info!(
                    session = %id,
                    frames,
                    entities = self.tracker.total_entity_count(),
                    "processing_completed"
                );
            }
            Err(Error::Cancelled) => {
                self.handle.write().fail(Error::Cancelled.to_string());
                warn!(session = %id, "processing_cancelled");
            }
            Err(e) => {
                self.handle.write().fail(e.to_string());
                error!(session = %id, error = %e, "processing_failed");
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.handle.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Consume the source, returning the number of batches read.
    fn process(&mut self) -> Result<u64> {
        let mut consumed = 0u64;
        let mut last_frame: Option<u64> = None;

        loop {
            self.check_cancelled()?;
            let next = self
                .source
                .next_batch()
                .map_err(|e| Error::ProcessingFailed(e.to_string()))?;
            // The source may have blocked; re-check before acting on its answer
            self.check_cancelled()?;

            let Some(batch) = next else { break };

            if let Some(last) = last_frame {
                if batch.frame_index <= last {
                    return Err(Error::ProcessingFailed(format!(
                        "frame {} received after frame {}",
                        batch.frame_index, last
                    )));
                }
            }
            if !batch.timestamp.is_finite() {
                return Err(Error::ProcessingFailed(format!(
                    "frame {} has a non-finite timestamp",
                    batch.frame_index
                )));
            }
            last_frame = Some(batch.frame_index);
            consumed += 1;

            let percent = self.percent_done(consumed);
            if batch.frame_index % self.params.frame_stride == 0 {
                self.track(batch, percent)?;
            } else {
                self.handle.write().advance(percent);
            }
        }

        Ok(consumed)
    }

    /// Batches consumed over the announced frame count, capped at 99.
    fn percent_done(&self, consumed: u64) -> u8 {
        if self.metadata.frame_count == 0 {
            return 0;
        }
        let ratio = consumed as f64 / self.metadata.frame_count as f64;
        (ratio * 100.0).clamp(0.0, 99.0) as u8
    }

    fn track(&mut self, mut batch: FrameBatch, percent: u8) -> Result<()> {
        batch.retain_confident(self.params.confidence_threshold);

        let mut world: Vec<Point2<f64>> = Vec::with_capacity(batch.detections.len());
        for pixel in batch.ground_points() {
            let point = self.transform.pixel_to_world(&pixel);
            if point.x.is_finite() && point.y.is_finite() {
                world.push(point);
            } else {
                warn_once("dropping detection that maps to a non-finite surface position");
            }
        }

        let assignments = self.tracker.assign(&world, batch.frame_index, batch.timestamp);

        let mut state = self.handle.write();
        state
            .trajectories
            .record_frame(batch.frame_index, batch.timestamp, &assignments)?;
        state.record_tracked_frame();
        state.advance(percent);
        drop(state);

        debug!(
            session = %self.handle.id,
            frame = batch.frame_index,
            detections = assignments.len(),
            progress = percent,
            "frame_tracked"
        );
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("processing task panicked: {}", detail)
}
