//! Identity tracker.
//!
//! Keeps the last known world position of every entity seen in a session and
//! associates each frame's detections with those entities, minting a new id
//! when a detection cannot be matched. Entities are never retired: an entity
//! missing from a frame keeps its last position and is matchable again later.

use std::collections::BTreeMap;

use nalgebra::Point2;
use serde::Serialize;
use tracing::trace;

use crate::matching::MatchingStrategy;
use crate::trajectory::EntityId;
use crate::{Error, Result};

/// Default `MAX_TRACKING_DISTANCE` in world units.
pub const DEFAULT_MAX_TRACKING_DISTANCE: f64 = 2.0;

/// Configuration for the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Exclusive upper bound on the distance between a detection and an
    /// entity's last position for the two to be associated.
    pub max_tracking_distance: f64,

    /// Association policy.
    pub strategy: MatchingStrategy,
}

impl TrackerConfig {
    /// Create a new tracker configuration.
    ///
    /// # Arguments
    /// * `max_tracking_distance` - Maximum match distance in world units
    /// * `strategy` - Association strategy
    pub fn new(max_tracking_distance: f64, strategy: MatchingStrategy) -> Self {
        Self {
            max_tracking_distance,
            strategy,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_tracking_distance.is_finite() && self.max_tracking_distance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_tracking_distance must be positive, got {}",
                self.max_tracking_distance
            )));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACKING_DISTANCE, MatchingStrategy::default())
    }
}

/// One detection resolved to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assignment {
    pub entity_id: EntityId,
    pub position: Point2<f64>,
}

/// Per-session identity tracker.
#[derive(Debug, Clone)]
pub struct Tracker {
    /// Tracker configuration.
    pub config: TrackerConfig,

    /// Last known position of every entity, keyed in ascending id order.
    positions: BTreeMap<EntityId, Point2<f64>>,

    /// Id handed to the next minted entity.
    next_id: EntityId,

    /// Number of entities that received a position in the last frame.
    last_frame_count: usize,
}

impl Tracker {
    /// Create a new tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            positions: BTreeMap::new(),
            next_id: 0,
            last_frame_count: 0,
        })
    }

    /// Associate one frame of detections with entities.
    ///
    /// # Arguments
    /// * `detections` - World-space ground points, in detector output order
    /// * `frame_index` - Index of the frame being processed
    /// * `timestamp` - Frame timestamp in seconds
    ///
    /// # Returns
    /// One assignment per detection, in input order. No entity id appears
    /// twice in the result.
    pub fn assign(&mut self, detections: &[Point2<f64>], frame_index: u64, timestamp: f64) -> Vec<Assignment> {
        // Candidates are the entities that existed before this frame; columns
        // follow ascending id so ties resolve to the oldest entity.
        let (ids, last_known): (Vec<EntityId>, Vec<Point2<f64>>) =
            self.positions.iter().map(|(&id, &p)| (id, p)).unzip();

        let matches = self
            .config
            .strategy
            .match_positions(detections, &last_known, self.config.max_tracking_distance);

        let mut assignments = Vec::with_capacity(detections.len());
        for (position, matched) in detections.iter().zip(matches) {
            let entity_id = match matched {
                Some(col) => ids[col],
                None => self.mint(frame_index, timestamp, position),
            };
            self.positions.insert(entity_id, *position);
            assignments.push(Assignment {
                entity_id,
                position: *position,
            });
        }

        self.last_frame_count = assignments.len();
        assignments
    }

    fn mint(&mut self, frame_index: u64, timestamp: f64, position: &Point2<f64>) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        trace!(entity = id, frame = frame_index, timestamp, x = position.x, y = position.y, "entity_minted");
        id
    }

    /// Last known position of an entity.
    pub fn last_position(&self, entity_id: EntityId) -> Option<Point2<f64>> {
        self.positions.get(&entity_id).copied()
    }

    /// Get the total number of entities minted so far.
    pub fn total_entity_count(&self) -> usize {
        self.next_id as usize
    }

    /// Get the number of entities observed in the most recent frame.
    pub fn current_entity_count(&self) -> usize {
        self.last_frame_count
    }
}
