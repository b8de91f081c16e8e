//! Run one tracking session end to end from a JSON detections file.
//!
//! ```text
//! futsal-track --frames frames.json --calibration "312,208;1611,221;1903,1012;17,990"
//! ```

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::Point2;
use tracing::info;

use futsal_tracker::export::{self, download_name, ExportFormat};
use futsal_tracker::session::VecFrameSource;
use futsal_tracker::{logger, MatchingStrategy, SessionController, SessionStatus, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Calibrated futsal player tracking", long_about = None)]
struct Args {
    /// Detections file: {"metadata": {...}, "frames": [...]}
    #[arg(short, long)]
    frames: PathBuf,

    /// Four pixel points "x,y;x,y;x,y;x,y" matching corners (0,0) (L,0) (L,W) (0,W)
    #[arg(short, long)]
    calibration: String,

    /// Settings file ([field], [tracking], [statistics], [sessions])
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Association strategy, overrides the settings (greedy or optimal)
    #[arg(long)]
    strategy: Option<MatchingStrategy>,

    /// Output format: csv or json
    #[arg(long, default_value = "json")]
    format: ExportFormat,

    /// Export one row per position sample instead of the per-player summary (csv only)
    #[arg(long, default_value_t = false)]
    samples: bool,

    /// Output file or directory; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn parse_calibration(text: &str) -> Result<Vec<Point2<f64>>> {
    text.split(';')
        .filter(|p| !p.trim().is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("calibration point '{}' is not 'x,y'", pair))?;
            let x: f64 = x.trim().parse().with_context(|| format!("bad x in '{}'", pair))?;
            let y: f64 = y.trim().parse().with_context(|| format!("bad y in '{}'", pair))?;
            Ok(Point2::new(x, y))
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with_verbosity(args.verbose);

    let mut settings = Settings::load(args.settings.as_deref()).context("loading settings")?;
    if let Some(strategy) = args.strategy {
        settings.tracking.strategy = strategy;
    }

    let points = parse_calibration(&args.calibration)?;
    let file = File::open(&args.frames).with_context(|| format!("opening {}", args.frames.display()))?;
    let source = VecFrameSource::from_json(BufReader::new(file)).context("reading detections")?;

    let controller = SessionController::new(settings)?;
    let id = controller.open_session();
    controller.set_calibration(&id, &points)?;
    controller.start_processing(&id, Box::new(source))?;

    let progress = controller.wait(&id)?;
    if progress.status != SessionStatus::Completed {
        // Surfaces the recorded failure cause
        controller.get_results(&id)?;
        bail!("session {} ended as {}", id, progress.status);
    }

    let stats = controller.get_results(&id)?;
    let trajectories = controller.trajectories(&id)?;
    info!(
        session = %id,
        players = stats.players.len(),
        total_distance = stats.team.total_distance,
        "results_ready"
    );

    match args.output {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(download_name(&id, args.format))
            } else {
                path
            };
            export::save_results(&path, args.format, &stats, &trajectories, args.samples)?;
            info!(path = %path.display(), "results_written");
        }
        None => {
            export::write_results(io::stdout().lock(), args.format, &stats, &trajectories, args.samples)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calibration() {
        let points = parse_calibration("0,0; 100,0;100, 50;0,50").unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[2], Point2::new(100.0, 50.0));
    }

    #[test]
    fn test_parse_calibration_skips_empty_segments() {
        let points = parse_calibration(";0,0;;100,0;100,50;0,50;").unwrap();
        assert_eq!(points.len(), 4);
        assert!(parse_calibration("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_calibration_malformed_pairs() {
        assert!(parse_calibration("0,0;100;100,50;0,50").is_err());
        assert!(parse_calibration("0,0;abc,0").is_err());
        assert!(parse_calibration("0,0;100,y").is_err());
        assert!(parse_calibration("0,0,1;100,0").is_err());
    }
}
