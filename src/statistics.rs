//! Kinematic statistics derived from trajectories.
//!
//! Everything here is a pure function of a [`TrajectorySnapshot`]. Entities
//! are visited in ascending id order and every floating sum is accumulated in
//! that order, so identical input always gives bit-identical output.

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::trajectory::{EntityId, TrackedEntity, TrajectorySnapshot};
use crate::utils::get_bounding_box;
use crate::{Error, Result};

/// m/s to km/h.
const MS_TO_KMH: f64 = 3.6;

/// Coarse positional role derived from the mean x position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Defender,
    Midfielder,
    Attacker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Defender => "defender",
            Role::Midfielder => "midfielder",
            Role::Attacker => "attacker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned box enclosing every recorded position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingZone {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Per-entity statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatistics {
    pub id: EntityId,
    pub name: String,
    /// Sum of straight-line step distances, meters.
    pub distance_total: f64,
    /// Mean of per-step speeds, km/h.
    pub avg_speed: f64,
    /// Largest per-step speed, km/h.
    pub max_speed: f64,
    pub role: Role,
    pub bounding_zone: BoundingZone,
    /// `(last_frame - first_frame) / fps`, seconds.
    pub tracked_time: f64,
    pub sample_count: usize,
}

/// Aggregates over all reported entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStatistics {
    pub total_distance: f64,
    /// Straight mean of the per-player average speeds.
    pub avg_speed: f64,
    /// Latest timestamp over every sample, seconds.
    pub duration: f64,
    pub player_count: usize,
}

/// Full result of a statistics pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub players: Vec<PlayerStatistics>,
    pub team: TeamStatistics,
}

/// Display name of an entity.
pub fn player_name(id: EntityId) -> String {
    format!("Player {}", id + 1)
}

/// Reduces trajectories into statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsEngine {
    /// Surface length L in meters, used for role classification.
    pub surface_length: f64,
    /// Mean x below `defender_ratio * L` classifies as defender.
    pub defender_ratio: f64,
    /// Mean x above `attacker_ratio * L` classifies as attacker.
    pub attacker_ratio: f64,
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self {
            surface_length: 40.0,
            defender_ratio: 0.35,
            attacker_ratio: 0.65,
        }
    }
}

impl StatisticsEngine {
    pub fn new(surface_length: f64, defender_ratio: f64, attacker_ratio: f64) -> Result<Self> {
        if !(surface_length.is_finite() && surface_length > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "surface length must be positive, got {}",
                surface_length
            )));
        }
        if !(0.0..=1.0).contains(&defender_ratio)
            || !(0.0..=1.0).contains(&attacker_ratio)
            || defender_ratio >= attacker_ratio
        {
            return Err(Error::InvalidConfig(format!(
                "role ratios must satisfy 0 <= defender < attacker <= 1, got {} / {}",
                defender_ratio, attacker_ratio
            )));
        }
        Ok(Self {
            surface_length,
            defender_ratio,
            attacker_ratio,
        })
    }

    /// Compute per-player and team statistics.
    ///
    /// # Arguments
    /// * `trajectories` - Snapshot of the session's trajectories
    /// * `fps` - Video frame rate, used for tracked time
    ///
    /// Entities with fewer than 2 samples are left out of `players` but still
    /// count toward the team duration.
    pub fn compute(&self, trajectories: &TrajectorySnapshot, fps: f64) -> Result<MatchStatistics> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::InvalidConfig(format!("fps must be positive, got {}", fps)));
        }

        let players: Vec<PlayerStatistics> = trajectories
            .entities()
            .filter_map(|entity| self.player_statistics(entity, fps))
            .collect();

        let total_distance = players.iter().fold(0.0, |acc, p| acc + p.distance_total);
        let avg_speed = if players.is_empty() {
            0.0
        } else {
            players.iter().fold(0.0, |acc, p| acc + p.avg_speed) / players.len() as f64
        };

        let team = TeamStatistics {
            total_distance,
            avg_speed,
            duration: trajectories.max_timestamp().unwrap_or(0.0),
            player_count: players.len(),
        };

        Ok(MatchStatistics { players, team })
    }

    /// Statistics of one entity, `None` when it has fewer than 2 samples.
    pub fn player_statistics(&self, entity: &TrackedEntity, fps: f64) -> Option<PlayerStatistics> {
        let samples = entity.samples();
        if samples.len() < 2 {
            return None;
        }

        let mut distance_total = 0.0;
        let mut speed_sum = 0.0;
        let mut speed_count = 0usize;
        let mut max_speed = 0.0f64;

        for pair in samples.windows(2) {
            let step = (pair[1].position() - pair[0].position()).norm();
            distance_total += step;

            let dt = pair[1].timestamp - pair[0].timestamp;
            if dt > 0.0 {
                let speed = step / dt * MS_TO_KMH;
                speed_sum += speed;
                speed_count += 1;
                max_speed = max_speed.max(speed);
            }
        }

        let avg_speed = if speed_count > 0 {
            speed_sum / speed_count as f64
        } else {
            0.0
        };

        let positions: Vec<Point2<f64>> = samples.iter().map(|s| s.position()).collect();
        let (min_x, min_y, max_x, max_y) = get_bounding_box(&positions)?;
        let mean_x = positions.iter().fold(0.0, |acc, p| acc + p.x) / positions.len() as f64;

        let first = samples.first()?;
        let last = samples.last()?;

        Some(PlayerStatistics {
            id: entity.id,
            name: player_name(entity.id),
            distance_total,
            avg_speed,
            max_speed,
            role: self.classify(mean_x),
            bounding_zone: BoundingZone {
                min_x,
                min_y,
                max_x,
                max_y,
            },
            tracked_time: (last.frame_index - first.frame_index) as f64 / fps,
            sample_count: samples.len(),
        })
    }

    /// Role from a mean x position.
    pub fn classify(&self, mean_x: f64) -> Role {
        if mean_x < self.defender_ratio * self.surface_length {
            Role::Defender
        } else if mean_x > self.attacker_ratio * self.surface_length {
            Role::Attacker
        } else {
            Role::Midfielder
        }
    }
}
