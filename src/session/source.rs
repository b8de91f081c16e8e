//! Frame sources feeding a processing task.
//!
//! Video decoding and detection run outside this crate; a `FrameSource` is
//! the seam through which their per-frame output arrives.

use std::collections::VecDeque;
use std::io::Read;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, FrameBatch};
use crate::{Error, Result};

/// Properties of the source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Frames per second.
    pub fps: f64,
    /// Total number of frames, used for progress.
    pub frame_count: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl VideoMetadata {
    pub fn new(fps: f64, frame_count: u64) -> Self {
        Self {
            fps,
            frame_count,
            width: 0,
            height: 0,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(Error::InvalidConfig(format!("fps must be positive, got {}", self.fps)));
        }
        Ok(())
    }
}

/// Supplier of frame batches in increasing frame order.
pub trait FrameSource: Send {
    fn metadata(&self) -> VideoMetadata;

    /// Next batch, `Ok(None)` once the source is exhausted.
    ///
    /// May block; this is the only point where processing waits.
    fn next_batch(&mut self) -> Result<Option<FrameBatch>>;
}

/// In-memory frame source.
#[derive(Debug, Clone)]
pub struct VecFrameSource {
    metadata: VideoMetadata,
    batches: VecDeque<FrameBatch>,
}

/// JSON layout read by [`VecFrameSource::from_json`].
#[derive(Debug, Serialize, Deserialize)]
pub struct FramesDocument {
    pub metadata: VideoMetadata,
    pub frames: Vec<FrameBatch>,
}

impl VecFrameSource {
    pub fn new(metadata: VideoMetadata, batches: Vec<FrameBatch>) -> Self {
        Self {
            metadata,
            batches: batches.into(),
        }
    }

    /// Read `{"metadata": {...}, "frames": [{"frame_index", "timestamp", "detections": [...]}]}`.
    ///
    /// Every detection goes through `Detection::new`, so malformed input is
    /// rejected here rather than mid-processing.
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let doc: FramesDocument = serde_json::from_reader(reader)?;
        doc.metadata.validate()?;

        let mut frames = Vec::with_capacity(doc.frames.len());
        for frame in doc.frames {
            let detections = frame
                .detections
                .into_iter()
                .map(|d| Detection::new(d.ground_point, d.confidence))
                .collect::<Result<Vec<_>>>()?;
            frames.push(FrameBatch::new(frame.frame_index, frame.timestamp, detections));
        }

        Ok(Self::new(doc.metadata, frames))
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl FrameSource for VecFrameSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn next_batch(&mut self) -> Result<Option<FrameBatch>> {
        Ok(self.batches.pop_front())
    }
}

/// Sending half of a [`ChannelFrameSource`].
///
/// Send `Err` to report a collaborator fault; drop every sender to signal
/// the end of the video.
pub type FrameSender = Sender<Result<FrameBatch>>;

/// Streaming frame source fed by another thread.
#[derive(Debug)]
pub struct ChannelFrameSource {
    metadata: VideoMetadata,
    rx: Receiver<Result<FrameBatch>>,
}

impl ChannelFrameSource {
    /// Create a bounded channel source.
    ///
    /// # Arguments
    /// * `metadata` - Properties of the video being streamed
    /// * `capacity` - Number of batches buffered before the producer blocks
    pub fn bounded(metadata: VideoMetadata, capacity: usize) -> (FrameSender, Self) {
        let (tx, rx) = bounded(capacity);
        (tx, Self { metadata, rx })
    }
}

impl FrameSource for ChannelFrameSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn next_batch(&mut self) -> Result<Option<FrameBatch>> {
        match self.rx.recv() {
            Ok(message) => message.map(Some),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;
    use std::thread;

    #[test]
    fn test_metadata_duration() {
        let meta = VideoMetadata::new(25.0, 750).with_resolution(1920, 1080);
        assert_relative_eq!(meta.duration_seconds(), 30.0);
        assert_eq!(meta.width, 1920);
        assert!(meta.validate().is_ok());
        assert!(VideoMetadata::new(0.0, 10).validate().is_err());
    }

    #[test]
    fn test_vec_source_drains_in_order() {
        let mut source = VecFrameSource::new(
            VideoMetadata::new(10.0, 2),
            vec![
                FrameBatch::at_rate(0, 10.0, Vec::new()),
                FrameBatch::at_rate(1, 10.0, Vec::new()),
            ],
        );

        assert_eq!(source.next_batch().unwrap().unwrap().frame_index, 0);
        assert_eq!(source.next_batch().unwrap().unwrap().frame_index, 1);
        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_vec_source_from_json() {
        let json = r#"{
            "metadata": {"fps": 10.0, "frame_count": 2},
            "frames": [
                {"frame_index": 0, "timestamp": 0.0, "detections": [{"ground_point": [50.0, 25.0], "confidence": 0.9}]},
                {"frame_index": 1, "timestamp": 0.1, "detections": []}
            ]
        }"#;
        let mut source = VecFrameSource::from_json(json.as_bytes()).unwrap();

        assert_eq!(source.remaining(), 2);
        let first = source.next_batch().unwrap().unwrap();
        assert_eq!(first.detections[0].ground_point, Point2::new(50.0, 25.0));
    }

    #[test]
    fn test_vec_source_from_json_rejects_bad_confidence() {
        let json = r#"{
            "metadata": {"fps": 10.0, "frame_count": 1},
            "frames": [{"frame_index": 0, "timestamp": 0.0, "detections": [{"ground_point": [1.0, 1.0], "confidence": 3.0}]}]
        }"#;
        assert!(matches!(
            VecFrameSource::from_json(json.as_bytes()),
            Err(Error::InvalidDetection(_))
        ));
    }

    #[test]
    fn test_channel_source_ends_when_senders_dropped() {
        let (tx, mut source) = ChannelFrameSource::bounded(VideoMetadata::new(10.0, 3), 1);

        let producer = thread::spawn(move || {
            for i in 0..3 {
                tx.send(Ok(FrameBatch::at_rate(i, 10.0, Vec::new()))).unwrap();
            }
        });

        let mut seen = Vec::new();
        while let Some(batch) = source.next_batch().unwrap() {
            seen.push(batch.frame_index);
        }
        producer.join().unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_channel_source_forwards_errors() {
        let (tx, mut source) = ChannelFrameSource::bounded(VideoMetadata::new(10.0, 3), 1);
        tx.send(Err(Error::ProcessingFailed("corrupt frame".to_string()))).unwrap();

        assert!(matches!(source.next_batch(), Err(Error::ProcessingFailed(_))));
    }
}
