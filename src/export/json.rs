//! JSON results payload.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::statistics::{BoundingZone, MatchStatistics, Role};
use crate::trajectory::EntityId;
use crate::Result;

/// One entry of `players`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPayload {
    pub id: EntityId,
    pub name: String,
    pub distance: f64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub role: Role,
    pub tracked_time: f64,
    pub zone: BoundingZone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPayload {
    pub total_distance: f64,
    pub avg_speed: f64,
    pub duration: f64,
}

/// `{"players": [...], "team_stats": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsPayload {
    pub players: Vec<PlayerPayload>,
    pub team_stats: TeamPayload,
}

impl From<&MatchStatistics> for ResultsPayload {
    fn from(stats: &MatchStatistics) -> Self {
        Self {
            players: stats
                .players
                .iter()
                .map(|p| PlayerPayload {
                    id: p.id,
                    name: p.name.clone(),
                    distance: p.distance_total,
                    avg_speed: p.avg_speed,
                    max_speed: p.max_speed,
                    role: p.role,
                    tracked_time: p.tracked_time,
                    zone: p.bounding_zone,
                })
                .collect(),
            team_stats: TeamPayload {
                total_distance: stats.team.total_distance,
                avg_speed: stats.team.avg_speed,
                duration: stats.team.duration,
            },
        }
    }
}

/// Serialize results to a pretty-printed JSON string.
pub fn results_json(stats: &MatchStatistics) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ResultsPayload::from(stats))?)
}

/// Write the results payload to a writer.
pub fn write_results_json<W: Write>(mut writer: W, stats: &MatchStatistics) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, &ResultsPayload::from(stats))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::StatisticsEngine;
    use crate::trajectory::{PositionSample, TrajectoryStore};
    use nalgebra::Point2;

    #[test]
    fn test_results_json_shape() {
        let mut store = TrajectoryStore::new();
        store.append(0, PositionSample::new(0, 0.0, Point2::new(30.0, 1.0))).unwrap();
        store.append(0, PositionSample::new(1, 0.1, Point2::new(30.5, 1.0))).unwrap();
        let stats = StatisticsEngine::default().compute(&store.snapshot(), 10.0).unwrap();

        let value: serde_json::Value = serde_json::from_str(&results_json(&stats).unwrap()).unwrap();
        let player = &value["players"][0];
        assert_eq!(player["id"], 0);
        assert_eq!(player["name"], "Player 1");
        assert_eq!(player["role"], "attacker");
        assert!((player["distance"].as_f64().unwrap() - 0.5).abs() < 1e-9);
        assert!(value["team_stats"]["total_distance"].is_number());
        assert!(value["team_stats"]["avg_speed"].is_number());
        assert!((value["team_stats"]["duration"].as_f64().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_payload_roundtrip_via_writer() {
        let stats = StatisticsEngine::default()
            .compute(&TrajectoryStore::new().snapshot(), 10.0)
            .unwrap();
        let mut out = Vec::new();
        write_results_json(&mut out, &stats).unwrap();

        let payload: ResultsPayload = serde_json::from_slice(&out).unwrap();
        assert!(payload.players.is_empty());
        assert_eq!(payload.team_stats.total_distance, 0.0);
    }
}
