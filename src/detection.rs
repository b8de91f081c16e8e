//! Detection and per-frame batch structs for input to the tracker.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single per-frame observation of a player.
///
/// Carries the ground-contact point in pixel space and the detector
/// confidence. Detections are not retained past the frame they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Ground-contact point in pixels.
    pub ground_point: Point2<f64>,

    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Detection {
    /// Create a new detection from a ground-contact point.
    pub fn new(ground_point: Point2<f64>, confidence: f64) -> Result<Self> {
        if !ground_point.x.is_finite() || !ground_point.y.is_finite() {
            return Err(Error::InvalidDetection(format!(
                "ground point must be finite, got ({}, {})",
                ground_point.x, ground_point.y
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidDetection(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }

        Ok(Self {
            ground_point,
            confidence,
        })
    }

    /// Create a detection from a bounding box `(x1, y1, x2, y2)`.
    ///
    /// The ground-contact point is the bottom-center of the box.
    pub fn from_bbox(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> Result<Self> {
        let ground = Point2::new((x1 + x2) / 2.0, y1.max(y2));
        Self::new(ground, confidence)
    }

    /// Whether the detection passes the confidence threshold.
    #[inline]
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// All detections of one video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameBatch {
    /// Index of the frame in the video.
    pub frame_index: u64,

    /// Frame timestamp in seconds.
    pub timestamp: f64,

    /// Detections in detector output order.
    pub detections: Vec<Detection>,
}

impl FrameBatch {
    /// Create a new frame batch.
    pub fn new(frame_index: u64, timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            frame_index,
            timestamp,
            detections,
        }
    }

    /// Create a batch whose timestamp is derived from the frame rate.
    pub fn at_rate(frame_index: u64, fps: f64, detections: Vec<Detection>) -> Self {
        Self::new(frame_index, frame_index as f64 / fps, detections)
    }

    /// Drop detections below the confidence threshold, keeping the order of the rest.
    pub fn retain_confident(&mut self, threshold: f64) {
        self.detections.retain(|d| d.is_confident(threshold));
    }

    /// Ground-contact points of all detections, in order.
    pub fn ground_points(&self) -> Vec<Point2<f64>> {
        self.detections.iter().map(|d| d.ground_point).collect()
    }
}
