//! Append-only per-entity trajectories.

use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::Point2;
use serde::Serialize;

use crate::tracker::Assignment;
use crate::{Error, Result};

/// Identifier of a tracked entity, assigned monotonically from 0 within a session.
pub type EntityId = u32;

/// One recorded world position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSample {
    /// Video frame the position was observed in.
    pub frame_index: u64,
    /// Timestamp of that frame in seconds.
    pub timestamp: f64,
    /// Surface x in meters (along the length).
    pub x: f64,
    /// Surface y in meters (along the width).
    pub y: f64,
}

impl PositionSample {
    pub fn new(frame_index: u64, timestamp: f64, position: Point2<f64>) -> Self {
        Self {
            frame_index,
            timestamp,
            x: position.x,
            y: position.y,
        }
    }

    #[inline]
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// A tracked identity and its ordered samples.
///
/// Samples have strictly increasing `frame_index`; gaps are allowed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEntity {
    pub id: EntityId,
    samples: Vec<PositionSample>,
}

impl TrackedEntity {
    fn new(id: EntityId) -> Self {
        Self {
            id,
            samples: Vec::new(),
        }
    }

    /// Samples in frame order.
    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    pub fn last_sample(&self) -> Option<&PositionSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Append-only store of all entity trajectories of a session.
///
/// Entities are kept in ascending id order so every iteration over the store
/// is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryStore {
    entities: BTreeMap<EntityId, TrackedEntity>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample to an entity, creating the entity on first use.
    ///
    /// # Errors
    /// `TrajectoryOrder` if `sample.frame_index` does not exceed the entity's
    /// last stored frame index. The tracker processes frames in order, so this
    /// only fires on a pipeline bug.
    pub fn append(&mut self, entity_id: EntityId, sample: PositionSample) -> Result<()> {
        let entity = self
            .entities
            .entry(entity_id)
            .or_insert_with(|| TrackedEntity::new(entity_id));

        if let Some(last) = entity.last_sample() {
            if sample.frame_index <= last.frame_index {
                return Err(Error::TrajectoryOrder {
                    entity: entity_id,
                    last: last.frame_index,
                    got: sample.frame_index,
                });
            }
        }

        entity.samples.push(sample);
        Ok(())
    }

    /// Append one frame's worth of tracker assignments.
    pub fn record_frame(&mut self, frame_index: u64, timestamp: f64, assignments: &[Assignment]) -> Result<()> {
        for a in assignments {
            self.append(a.entity_id, PositionSample::new(frame_index, timestamp, a.position))?;
        }
        Ok(())
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&TrackedEntity> {
        self.entities.get(&entity_id)
    }

    /// Entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn sample_count(&self) -> usize {
        self.entities.values().map(|e| e.samples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Immutable view of the current content.
    ///
    /// The snapshot owns its data, so it stays valid while processing keeps
    /// appending to the store.
    pub fn snapshot(&self) -> TrajectorySnapshot {
        TrajectorySnapshot {
            entities: Arc::new(self.entities.clone()),
        }
    }
}

/// Read-only, cheaply clonable view of a `TrajectoryStore`.
#[derive(Debug, Clone, Default)]
pub struct TrajectorySnapshot {
    entities: Arc<BTreeMap<EntityId, TrackedEntity>>,
}

impl TrajectorySnapshot {
    /// Entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&TrackedEntity> {
        self.entities.get(&entity_id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn sample_count(&self) -> usize {
        self.entities.values().map(|e| e.len()).sum()
    }

    /// Latest timestamp over every sample of every entity.
    pub fn max_timestamp(&self) -> Option<f64> {
        self.entities
            .values()
            .filter_map(|e| e.last_sample())
            .map(|s| s.timestamp)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
    }
}
