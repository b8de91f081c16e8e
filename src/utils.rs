//! Utility functions for futsal-tracker.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock, PoisonError};

use nalgebra::Point2;
use tracing::warn;

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Log a warning message only once.
///
/// Subsequent calls with the same message are ignored.
pub fn warn_once(message: &str) {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    let mut guard = warned.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.insert(message.to_string()) {
        warn!("{}", message);
    }
}

/// Get bounds of a set of points.
///
/// Returns (x1, y1, x2, y2) bounding box of the points, or `None` when empty.
pub fn get_bounding_box(points: &[Point2<f64>]) -> Option<(f64, f64, f64, f64)> {
    let first = points.first()?;

    let mut min_x = first.x;
    let mut max_x = first.x;
    let mut min_y = first.y;
    let mut max_y = first.y;

    for p in &points[1..] {
        if p.x < min_x { min_x = p.x; }
        if p.x > max_x { max_x = p.x; }
        if p.y < min_y { min_y = p.y; }
        if p.y > max_y { max_y = p.y; }
    }

    Some((min_x, min_y, max_x, max_y))
}

/// Clamp a value to a range.
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bounding_box() {
        let points = vec![
            Point2::new(1.0, 2.0),
            Point2::new(5.0, 8.0),
            Point2::new(3.0, 4.0),
        ];

        let bbox = get_bounding_box(&points).unwrap();
        assert_eq!(bbox, (1.0, 2.0, 5.0, 8.0));
    }

    #[test]
    fn test_get_bounding_box_empty() {
        assert_eq!(get_bounding_box(&[]), None);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5, 0, 10), 5);
        assert_eq!(clamp(-5, 0, 10), 0);
        assert_eq!(clamp(15, 0, 10), 10);
    }

    #[test]
    fn test_warn_once_does_not_panic_on_repeat() {
        warn_once("utils test message");
        warn_once("utils test message");
    }
}
