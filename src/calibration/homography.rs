//! Four-point homography estimation.
//!
//! Points are normalized (centroid at the origin, mean distance sqrt(2)) before
//! solving the 8x8 direct linear system, and the normalization is undone on
//! the resulting matrix. The composed matrix is what gets stored, so mapping a
//! point never has to re-apply any scale factor.

use nalgebra::{Matrix3, Point2, SMatrix, SVector};

use crate::{Error, Result};

/// Relative tolerance for coincident or collinear calibration points.
const DEGENERACY_TOLERANCE: f64 = 1e-9;

/// Check that four points span a valid quadrilateral.
///
/// Rejects non-finite coordinates, coincident points and any three collinear
/// points. Tolerances are relative to the extent of the point set so that the
/// check behaves the same for pixel and meter inputs.
pub fn check_quadrilateral(points: &[Point2<f64>; 4]) -> Result<()> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::DegenerateCalibration(
            "calibration points must be finite".to_string(),
        ));
    }

    let mut extent: f64 = 0.0;
    for i in 0..4 {
        for j in (i + 1)..4 {
            extent = extent.max((points[i] - points[j]).norm());
        }
    }

    if extent == 0.0 {
        return Err(Error::DegenerateCalibration(
            "all calibration points coincide".to_string(),
        ));
    }

    for i in 0..4 {
        for j in (i + 1)..4 {
            if (points[i] - points[j]).norm() <= DEGENERACY_TOLERANCE * extent {
                return Err(Error::DegenerateCalibration(format!(
                    "points {} and {} coincide",
                    i, j
                )));
            }
        }
    }

    // Every triple of the four points
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    for (a, b, c) in TRIPLES {
        let ab = points[b] - points[a];
        let ac = points[c] - points[a];
        let twice_area = (ab.x * ac.y - ab.y * ac.x).abs();
        if twice_area <= DEGENERACY_TOLERANCE * extent * extent {
            return Err(Error::DegenerateCalibration(format!(
                "points {}, {} and {} are collinear",
                a, b, c
            )));
        }
    }

    Ok(())
}

/// Similarity transform moving the centroid to the origin and scaling the mean
/// distance from it to sqrt(2). Returns the matrix and its inverse.
fn normalizing_transform(points: &[Point2<f64>; 4]) -> (Matrix3<f64>, Matrix3<f64>) {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;

    let scale = if mean_dist > 0.0 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let forward = Matrix3::new(
        scale, 0.0, -scale * cx,
        0.0, scale, -scale * cy,
        0.0, 0.0, 1.0,
    );
    let inverse = Matrix3::new(
        1.0 / scale, 0.0, cx,
        0.0, 1.0 / scale, cy,
        0.0, 0.0, 1.0,
    );

    (forward, inverse)
}

fn apply(m: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let x = m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)];
    let y = m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)];
    let w = m[(2, 0)] * p.x + m[(2, 1)] * p.y + m[(2, 2)];
    Point2::new(x / w, y / w)
}

/// Solve for the homography `H` with `dst ~ H * src` from four correspondences.
///
/// # Arguments
/// * `src` - Source points (e.g. pixels picked on the image)
/// * `dst` - Destination points (e.g. surface corners in meters)
///
/// # Returns
/// The 3x3 homography, scaled so that `H[(2, 2)] == 1` whenever possible.
pub fn solve_homography(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Result<Matrix3<f64>> {
    check_quadrilateral(src)?;
    check_quadrilateral(dst)?;

    let (t_src, _) = normalizing_transform(src);
    let (t_dst, t_dst_inv) = normalizing_transform(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let s = apply(&t_src, &src[i]);
        let d = apply(&t_dst, &dst[i]);
        let (u, v) = (s.x, s.y);
        let (x, y) = (d.x, d.y);

        let r = 2 * i;
        a[(r, 0)] = u;
        a[(r, 1)] = v;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -v * x;
        b[r] = x;

        a[(r + 1, 3)] = u;
        a[(r + 1, 4)] = v;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -u * y;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = y;
    }

    let h = a.lu().solve(&b).ok_or_else(|| {
        Error::DegenerateCalibration("calibration system is singular".to_string())
    })?;

    if h.iter().any(|v| !v.is_finite()) {
        return Err(Error::DegenerateCalibration(
            "calibration system is ill-conditioned".to_string(),
        ));
    }

    let h_norm = Matrix3::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], 1.0,
    );

    let mut homography = t_dst_inv * h_norm * t_src;
    let w = homography[(2, 2)];
    if w.abs() > f64::EPSILON {
        homography /= w;
    }

    Ok(homography)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(pts: [(f64, f64); 4]) -> [Point2<f64>; 4] {
        pts.map(|(x, y)| Point2::new(x, y))
    }

    #[test]
    fn test_check_quadrilateral_valid() {
        let pts = quad([(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)]);
        assert!(check_quadrilateral(&pts).is_ok());
    }

    #[test]
    fn test_check_quadrilateral_duplicate() {
        let pts = quad([(0.0, 0.0), (100.0, 0.0), (100.0, 0.0), (0.0, 50.0)]);
        let err = check_quadrilateral(&pts).unwrap_err();
        assert!(matches!(err, Error::DegenerateCalibration(_)));
    }

    #[test]
    fn test_check_quadrilateral_collinear() {
        let pts = quad([(0.0, 0.0), (50.0, 0.0), (100.0, 0.0), (0.0, 50.0)]);
        assert!(matches!(
            check_quadrilateral(&pts),
            Err(Error::DegenerateCalibration(_))
        ));
    }

    #[test]
    fn test_check_quadrilateral_all_same() {
        let pts = quad([(3.0, 3.0); 4]);
        assert!(check_quadrilateral(&pts).is_err());
    }

    #[test]
    fn test_check_quadrilateral_non_finite() {
        let pts = quad([(0.0, 0.0), (f64::NAN, 0.0), (100.0, 50.0), (0.0, 50.0)]);
        assert!(check_quadrilateral(&pts).is_err());
    }

    #[test]
    fn test_solve_homography_pure_scale() {
        let src = quad([(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)]);
        let dst = quad([(0.0, 0.0), (40.0, 0.0), (40.0, 20.0), (0.0, 20.0)]);
        let h = solve_homography(&src, &dst).unwrap();

        assert_relative_eq!(h[(0, 0)], 0.4, epsilon = 1e-10);
        assert_relative_eq!(h[(1, 1)], 0.4, epsilon = 1e-10);
        assert_relative_eq!(h[(2, 2)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(h[(0, 1)], 0.0, epsilon = 1e-10);
        assert_relative_eq!(h[(2, 0)], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_solve_homography_perspective_maps_corners() {
        // A trapezoid, as seen by a camera looking down the pitch
        let src = quad([(420.0, 310.0), (1500.0, 300.0), (1880.0, 1020.0), (60.0, 1040.0)]);
        let dst = quad([(0.0, 0.0), (40.0, 0.0), (40.0, 20.0), (0.0, 20.0)]);
        let h = solve_homography(&src, &dst).unwrap();

        for (s, d) in src.iter().zip(dst.iter()) {
            let mapped = apply(&h, s);
            assert_relative_eq!(mapped.x, d.x, epsilon = 1e-8);
            assert_relative_eq!(mapped.y, d.y, epsilon = 1e-8);
        }
    }
}
