//! Tracking pipeline benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Point2;

use futsal_tracker::matching::euclidean_distances;
use futsal_tracker::{
    CalibrationTransform, CoordinateTransformation, MatchingStrategy, StatisticsEngine, Tracker, TrackerConfig,
    TrajectoryStore,
};

/// `n` players spread over a 40x20 m surface, nudged by `frame`.
fn create_positions(n: usize, frame: u64) -> Vec<Point2<f64>> {
    (0..n)
        .map(|i| {
            let x = 1.0 + (i % 10) as f64 * 3.8 + frame as f64 * 0.05;
            let y = 1.0 + (i / 10) as f64 * 3.0;
            Point2::new(x, y)
        })
        .collect()
}

fn benchmark_tracker_assign(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_assign");
    for strategy in [MatchingStrategy::Greedy, MatchingStrategy::Optimal] {
        for n in [10usize, 50] {
            let frames: Vec<Vec<Point2<f64>>> = (0..100).map(|f| create_positions(n, f)).collect();
            group.bench_with_input(BenchmarkId::new(strategy.name(), n), &frames, |b, frames| {
                b.iter(|| {
                    let mut tracker =
                        Tracker::new(TrackerConfig::new(2.0, strategy)).expect("valid tracker config");
                    for (f, positions) in frames.iter().enumerate() {
                        black_box(tracker.assign(positions, f as u64, f as f64 / 25.0));
                    }
                })
            });
        }
    }
    group.finish();
}

fn benchmark_association(c: &mut Criterion) {
    let detections = create_positions(50, 1);
    let previous = create_positions(50, 0);
    let distances = euclidean_distances(&detections, &previous);

    c.bench_function("associate_greedy_50", |b| {
        b.iter(|| MatchingStrategy::Greedy.associate(black_box(&distances), 2.0))
    });
    c.bench_function("associate_optimal_50", |b| {
        b.iter(|| MatchingStrategy::Optimal.associate(black_box(&distances), 2.0))
    });
}

fn benchmark_calibration_mapping(c: &mut Criterion) {
    let corners = [
        Point2::new(312.0, 208.0),
        Point2::new(1611.0, 221.0),
        Point2::new(1903.0, 1012.0),
        Point2::new(17.0, 990.0),
    ];
    let transform = CalibrationTransform::build(&corners, 40.0, 20.0).expect("valid calibration");
    let pixels: Vec<Point2<f64>> = (0..1000)
        .map(|i| Point2::new(400.0 + (i % 100) as f64 * 12.0, 300.0 + (i / 100) as f64 * 60.0))
        .collect();

    c.bench_function("pixels_to_world_1000", |b| {
        b.iter(|| transform.pixels_to_world(black_box(&pixels)))
    });
}

fn benchmark_statistics(c: &mut Criterion) {
    let mut tracker = Tracker::new(TrackerConfig::default()).expect("valid tracker config");
    let mut store = TrajectoryStore::new();
    for f in 0..1500u64 {
        let t = f as f64 / 25.0;
        let assignments = tracker.assign(&create_positions(10, f % 200), f, t);
        store.record_frame(f, t, &assignments).expect("increasing frames");
    }
    let snapshot = store.snapshot();
    let engine = StatisticsEngine::default();

    c.bench_function("statistics_10_players_1500_frames", |b| {
        b.iter(|| engine.compute(black_box(&snapshot), 25.0))
    });
}

criterion_group!(
    benches,
    benchmark_tracker_assign,
    benchmark_association,
    benchmark_calibration_mapping,
    benchmark_statistics,
);
criterion_main!(benches);
