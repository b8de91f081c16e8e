//! Pixel to surface coordinate transformations.

use nalgebra::{Matrix3, Point2};

use super::homography::solve_homography;
use crate::{Error, Result};

/// Trait for mapping between image pixels and surface (world) coordinates.
///
/// Points can be interpreted in 2 references:
/// - Pixel: their position on the video frame, (0, 0) is top left
/// - World: their position on the playing surface in meters, (0, 0) is the first calibration corner
pub trait CoordinateTransformation: Send + Sync + std::fmt::Debug {
    /// Transform a point from pixel to world coordinates.
    fn pixel_to_world(&self, point: &Point2<f64>) -> Point2<f64>;

    /// Transform a point from world to pixel coordinates.
    fn world_to_pixel(&self, point: &Point2<f64>) -> Point2<f64>;

    /// Transform a batch of pixel points, preserving order.
    fn pixels_to_world(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        points.iter().map(|p| self.pixel_to_world(p)).collect()
    }
}

/// Destination rectangle `(0,0), (L,0), (L,W), (0,W)` for a surface of the
/// given length and width.
pub fn surface_corners(length: f64, width: f64) -> [Point2<f64>; 4] {
    [
        Point2::new(0.0, 0.0),
        Point2::new(length, 0.0),
        Point2::new(length, width),
        Point2::new(0.0, width),
    ]
}

/// Immutable perspective transform from the image to the playing surface.
///
/// Built from 4 picked pixel points matched, in order, to the surface corners
/// `(0,0), (L,0), (L,W), (0,W)`.
#[derive(Debug, Clone)]
pub struct CalibrationTransform {
    /// 3x3 pixel -> world homography.
    pub homography_matrix: Matrix3<f64>,
    /// Pre-computed inverse (world -> pixel).
    pub inverse_homography_matrix: Matrix3<f64>,
    /// The picked pixel points, in corner order.
    pub source_points: [Point2<f64>; 4],
    /// Surface length L (meters).
    pub surface_length: f64,
    /// Surface width W (meters).
    pub surface_width: f64,
}

impl CalibrationTransform {
    /// Build a transform from 4 pixel points and the surface dimensions.
    ///
    /// # Arguments
    /// * `source_points` - Exactly 4 pixel points, in the same order as the surface corners
    /// * `surface_length` - Surface length L in meters
    /// * `surface_width` - Surface width W in meters
    ///
    /// # Errors
    /// * `CalibrationRequired` if anything other than 4 points is supplied
    /// * `DegenerateCalibration` if the points do not span a valid quadrilateral
    /// * `InvalidConfig` for non-positive surface dimensions
    pub fn build(source_points: &[Point2<f64>], surface_length: f64, surface_width: f64) -> Result<Self> {
        let source_points: [Point2<f64>; 4] = source_points
            .try_into()
            .map_err(|_| Error::CalibrationRequired)?;

        if !(surface_length.is_finite() && surface_length > 0.0)
            || !(surface_width.is_finite() && surface_width > 0.0)
        {
            return Err(Error::InvalidConfig(format!(
                "surface dimensions must be positive, got {}x{}",
                surface_length, surface_width
            )));
        }

        let corners = surface_corners(surface_length, surface_width);
        let homography_matrix = solve_homography(&source_points, &corners)?;

        let inverse_homography_matrix = homography_matrix.try_inverse().ok_or_else(|| {
            Error::DegenerateCalibration("cannot invert calibration homography".to_string())
        })?;

        Ok(Self {
            homography_matrix,
            inverse_homography_matrix,
            source_points,
            surface_length,
            surface_width,
        })
    }

    /// Apply a homography to a single 2D point.
    fn transform_point(point: &Point2<f64>, transform_matrix: &Matrix3<f64>) -> Point2<f64> {
        let (x, y) = (point.x, point.y);

        // [x', y', w'] = H * [x, y, 1]^T
        let x_prime = transform_matrix[(0, 0)] * x + transform_matrix[(0, 1)] * y + transform_matrix[(0, 2)];
        let y_prime = transform_matrix[(1, 0)] * x + transform_matrix[(1, 1)] * y + transform_matrix[(1, 2)];
        let w_prime = transform_matrix[(2, 0)] * x + transform_matrix[(2, 1)] * y + transform_matrix[(2, 2)];

        // Perspective division
        let w = if w_prime == 0.0 { 0.0000001 } else { w_prime };
        Point2::new(x_prime / w, y_prime / w)
    }
}

impl CoordinateTransformation for CalibrationTransform {
    fn pixel_to_world(&self, point: &Point2<f64>) -> Point2<f64> {
        Self::transform_point(point, &self.homography_matrix)
    }

    fn world_to_pixel(&self, point: &Point2<f64>) -> Point2<f64> {
        Self::transform_point(point, &self.inverse_homography_matrix)
    }
}

/// Map a pixel point to surface coordinates.
///
/// Pure and deterministic: the same transform and point always give the same result.
pub fn map_to_world(transform: &CalibrationTransform, pixel_point: &Point2<f64>) -> Point2<f64> {
    transform.pixel_to_world(pixel_point)
}
