//! Surface calibration module.
//!
//! This module maps image pixels onto the playing surface:
//!
//! - `CoordinateTransformation` - pixel <-> world point mapping trait
//! - `CalibrationTransform` - perspective transform built from 4 picked points
//! - Homography estimation with point normalization and degeneracy checks

mod homography;
mod transformations;

pub use homography::{check_quadrilateral, solve_homography};
pub use transformations::{map_to_world, surface_corners, CalibrationTransform, CoordinateTransformation};
