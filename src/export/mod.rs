//! Result export.
//!
//! - `csv` - per-player summary and per-sample tables
//! - `json` - `{"players": [...], "team_stats": {...}}` payload
//!
//! Column order and header names are consumed by downstream tools and must
//! not change.

mod csv;
mod json;

pub use self::csv::{write_samples_csv, write_summary_csv, SAMPLES_HEADER, SUMMARY_HEADER};
pub use self::json::{results_json, write_results_json, PlayerPayload, ResultsPayload, TeamPayload};

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use crate::session::SessionId;
use crate::statistics::MatchStatistics;
use crate::trajectory::TrajectorySnapshot;
use crate::{Error, Result};

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// File name offered for download, e.g. `futsal_tracking_<id>.csv`.
pub fn download_name(id: &SessionId, format: ExportFormat) -> String {
    format!("futsal_tracking_{}.{}", id, format.extension())
}

/// Write results in the given format.
///
/// With `samples` set, CSV output is the per-sample table instead of the
/// summary; JSON always carries the summary payload.
pub fn write_results<W: std::io::Write>(
    writer: W,
    format: ExportFormat,
    stats: &MatchStatistics,
    trajectories: &TrajectorySnapshot,
    samples: bool,
) -> Result<()> {
    match (format, samples) {
        (ExportFormat::Csv, false) => write_summary_csv(writer, stats),
        (ExportFormat::Csv, true) => write_samples_csv(writer, trajectories),
        (ExportFormat::Json, _) => write_results_json(writer, stats),
    }
}

/// Write results to a file, creating or truncating it.
pub fn save_results<P: AsRef<Path>>(
    path: P,
    format: ExportFormat,
    stats: &MatchStatistics,
    trajectories: &TrajectorySnapshot,
    samples: bool,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        Error::IoError(std::io::Error::new(
            e.kind(),
            format!("failed to create output file '{}': {}", path.display(), e),
        ))
    })?;
    write_results(BufWriter::new(file), format, stats, trajectories, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::StatisticsEngine;
    use crate::trajectory::TrajectoryStore;

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!("xlsx".parse::<ExportFormat>(), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_download_name() {
        let id: SessionId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        assert_eq!(
            download_name(&id, ExportFormat::Csv),
            "futsal_tracking_67e55044-10b1-426f-9247-bb680e5fe0c8.csv"
        );
    }

    #[test]
    fn test_save_results_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let snapshot = TrajectoryStore::new().snapshot();
        let stats = StatisticsEngine::default().compute(&snapshot, 10.0).unwrap();

        save_results(&path, ExportFormat::Csv, &stats, &snapshot, false).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), SUMMARY_HEADER);
    }
}
