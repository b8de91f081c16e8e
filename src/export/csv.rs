//! Tabular CSV export.

use std::io::Write;

use crate::statistics::{player_name, MatchStatistics};
use crate::trajectory::TrajectorySnapshot;
use crate::Result;

/// Header of the per-player summary table.
pub const SUMMARY_HEADER: &str = "player_id,player_name,distance,avg_speed,max_speed,role";

/// Header of the per-sample table.
pub const SAMPLES_HEADER: &str = "player_id,player_name,time,x,y";

/// Write one row per reported player.
///
/// Distances are meters and speeds km/h, both with 2 decimals.
pub fn write_summary_csv<W: Write>(mut writer: W, stats: &MatchStatistics) -> Result<()> {
    writeln!(writer, "{}", SUMMARY_HEADER)?;
    for p in &stats.players {
        writeln!(
            writer,
            "{},{},{:.2},{:.2},{:.2},{}",
            p.id, p.name, p.distance_total, p.avg_speed, p.max_speed, p.role
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one row per recorded position sample, entities in id order.
///
/// Unlike the summary, entities with a single sample are included.
pub fn write_samples_csv<W: Write>(mut writer: W, trajectories: &TrajectorySnapshot) -> Result<()> {
    writeln!(writer, "{}", SAMPLES_HEADER)?;
    for entity in trajectories.entities() {
        let name = player_name(entity.id);
        for s in entity.samples() {
            writeln!(writer, "{},{},{:.3},{:.3},{:.3}", entity.id, name, s.timestamp, s.x, s.y)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::StatisticsEngine;
    use crate::trajectory::{PositionSample, TrajectoryStore};
    use nalgebra::Point2;

    fn store() -> TrajectoryStore {
        let mut store = TrajectoryStore::new();
        store.append(0, PositionSample::new(0, 0.0, Point2::new(1.0, 1.0))).unwrap();
        store.append(0, PositionSample::new(1, 0.1, Point2::new(1.5, 1.0))).unwrap();
        store.append(1, PositionSample::new(1, 0.1, Point2::new(30.0, 5.0))).unwrap();
        store
    }

    #[test]
    fn test_summary_csv() {
        let stats = StatisticsEngine::default().compute(&store().snapshot(), 10.0).unwrap();
        let mut out = Vec::new();
        write_summary_csv(&mut out, &stats).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![SUMMARY_HEADER, "0,Player 1,0.50,18.00,18.00,defender"]);
    }

    #[test]
    fn test_samples_csv_includes_every_sample() {
        let mut out = Vec::new();
        write_samples_csv(&mut out, &store().snapshot()).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], SAMPLES_HEADER);
        assert_eq!(lines[1], "0,Player 1,0.000,1.000,1.000");
        assert_eq!(lines[3], "1,Player 2,0.100,30.000,5.000");
        assert_eq!(lines.len(), 4);
    }
}
