//! Detection-to-entity matching algorithms.
//!
//! Every strategy consumes a distance matrix of shape (n_detections x n_entities)
//! and yields, for each detection in input order, the column of the entity it
//! continues or `None` when a new entity has to be minted.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, Point2};
use serde::{Deserialize, Serialize};

use crate::internal::hungarian::linear_sum_assignment;
use crate::{Error, Result};

/// Euclidean distances between detections (rows) and last known positions (columns).
pub fn euclidean_distances(detections: &[Point2<f64>], positions: &[Point2<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(detections.len(), positions.len(), |i, j| {
        (detections[i] - positions[j]).norm()
    })
}

/// Greedy nearest-neighbor matching in detection input order.
///
/// Each detection, in row order, takes the closest entity not yet used this
/// frame. Equal distances resolve to the lowest column. The match is kept only
/// if the distance is strictly below `threshold`; otherwise the detection is
/// left unmatched and the entity stays available for later detections.
/// Single pass, no backtracking.
pub fn greedy_nearest_neighbor(distance_matrix: &DMatrix<f64>, threshold: f64) -> Vec<Option<usize>> {
    let n_detections = distance_matrix.nrows();
    let n_entities = distance_matrix.ncols();

    let mut used = vec![false; n_entities];
    let mut result = Vec::with_capacity(n_detections);

    for det_idx in 0..n_detections {
        let mut best: Option<(usize, f64)> = None;
        for ent_idx in 0..n_entities {
            if used[ent_idx] {
                continue;
            }
            let dist = distance_matrix[(det_idx, ent_idx)];
            if !dist.is_finite() {
                continue;
            }
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((ent_idx, dist)),
            }
        }

        match best {
            Some((ent_idx, dist)) if dist < threshold => {
                used[ent_idx] = true;
                result.push(Some(ent_idx));
            }
            _ => result.push(None),
        }
    }

    result
}

/// Globally optimal one-to-one matching (minimum total distance among the
/// assignments with the most pairs strictly below `threshold`).
pub fn optimal_assignment(distance_matrix: &DMatrix<f64>, threshold: f64) -> Vec<Option<usize>> {
    let solution = linear_sum_assignment(distance_matrix, threshold);
    let mut result = vec![None; distance_matrix.nrows()];
    for a in solution.assignments {
        result[a.row_idx] = Some(a.col_idx);
    }
    result
}

/// Association policy used by the tracker.
///
/// `Greedy` is the reference behavior and the default. `Optimal` replaces it
/// with bipartite matching; switching strategies changes which identities
/// continue when detections compete for the same entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    #[default]
    Greedy,
    Optimal,
}

impl MatchingStrategy {
    /// Match detections against last known positions.
    ///
    /// # Arguments
    /// * `detections` - Detection points in world units, in input order
    /// * `last_known` - Last known entity positions, in ascending entity order
    /// * `threshold` - Exclusive maximum match distance
    ///
    /// # Returns
    /// For each detection, the index into `last_known` it continues, or `None`.
    pub fn match_positions(
        &self,
        detections: &[Point2<f64>],
        last_known: &[Point2<f64>],
        threshold: f64,
    ) -> Vec<Option<usize>> {
        let distance_matrix = euclidean_distances(detections, last_known);
        self.associate(&distance_matrix, threshold)
    }

    /// Apply the strategy to a precomputed distance matrix.
    #[inline]
    pub fn associate(&self, distance_matrix: &DMatrix<f64>, threshold: f64) -> Vec<Option<usize>> {
        match self {
            MatchingStrategy::Greedy => greedy_nearest_neighbor(distance_matrix, threshold),
            MatchingStrategy::Optimal => optimal_assignment(distance_matrix, threshold),
        }
    }

    /// Name used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            MatchingStrategy::Greedy => "greedy",
            MatchingStrategy::Optimal => "optimal",
        }
    }
}

impl fmt::Display for MatchingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MatchingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" | "nearest" => Ok(MatchingStrategy::Greedy),
            "optimal" | "hungarian" => Ok(MatchingStrategy::Optimal),
            other => Err(Error::InvalidConfig(format!("unknown matching strategy: {}", other))),
        }
    }
}
