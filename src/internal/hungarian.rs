//! Rectangular minimum-cost assignment.
//!
//! Kuhn-Munkres with row/column potentials, O(n^2 m) for an n x m matrix with
//! n <= m. Taller matrices are solved on their transpose.

use nalgebra::DMatrix;

/// Represents a match between a row index and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub row_idx: usize,
    pub col_idx: usize,
}

/// Result of linear sum assignment.
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// Valid assignments, sorted by row index
    pub assignments: Vec<Assignment>,
    /// Indices of rows that were not matched
    pub unmatched_rows: Vec<usize>,
    /// Indices of columns that were not matched
    pub unmatched_cols: Vec<usize>,
}

/// Solve the linear sum assignment problem with a gating threshold.
///
/// Only entries that are finite and strictly below `threshold` may be
/// assigned. Among all assignments the solver first maximizes the number of
/// admissible pairs, then minimizes their total cost.
///
/// # Arguments
/// * `cost_matrix` - Cost matrix, entry (i, j) is the cost of assigning row i to column j
/// * `threshold` - Exclusive upper bound on an admissible cost
pub fn linear_sum_assignment(cost_matrix: &DMatrix<f64>, threshold: f64) -> AssignmentResult {
    let (n_rows, n_cols) = cost_matrix.shape();

    if n_rows == 0 || n_cols == 0 {
        return AssignmentResult {
            assignments: Vec::new(),
            unmatched_rows: (0..n_rows).collect(),
            unmatched_cols: (0..n_cols).collect(),
        };
    }

    let admissible = |v: f64| v.is_finite() && v < threshold;

    // Any single forbidden pair must cost more than every admissible pair combined
    let forbidden = cost_matrix
        .iter()
        .filter(|&&v| admissible(v))
        .map(|v| v.abs())
        .sum::<f64>()
        + 1.0;

    let gated = DMatrix::from_fn(n_rows, n_cols, |i, j| {
        let v = cost_matrix[(i, j)];
        if admissible(v) { v } else { forbidden }
    });

    let transposed = n_rows > n_cols;
    let work = if transposed { gated.transpose() } else { gated };
    let work_assignment = solve_wide(&work);

    let mut assignments: Vec<Assignment> = work_assignment
        .iter()
        .enumerate()
        .filter_map(|(r, c)| c.map(|c| (r, c)))
        .map(|(r, c)| {
            if transposed {
                Assignment { row_idx: c, col_idx: r }
            } else {
                Assignment { row_idx: r, col_idx: c }
            }
        })
        .filter(|a| admissible(cost_matrix[(a.row_idx, a.col_idx)]))
        .collect();
    assignments.sort_by_key(|a| a.row_idx);

    let mut matched_rows = vec![false; n_rows];
    let mut matched_cols = vec![false; n_cols];
    for a in &assignments {
        matched_rows[a.row_idx] = true;
        matched_cols[a.col_idx] = true;
    }

    AssignmentResult {
        assignments,
        unmatched_rows: (0..n_rows).filter(|&i| !matched_rows[i]).collect(),
        unmatched_cols: (0..n_cols).filter(|&j| !matched_cols[j]).collect(),
    }
}

/// Potentials-based Hungarian algorithm for n <= m.
///
/// Returns `result[i] = Some(j)` when row i is assigned to column j. Every row
/// gets a column.
fn solve_wide(cost: &DMatrix<f64>) -> Vec<Option<usize>> {
    let n = cost.nrows();
    let m = cost.ncols();
    debug_assert!(n <= m);

    // 1-indexed; index 0 is a virtual column
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost[(i0 - 1, j - 1)] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment along the alternating path
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![None; n];
    for j in 1..=m {
        if p[j] != 0 {
            row_to_col[p[j] - 1] = Some(j - 1);
        }
    }
    row_to_col
}
