//! Panel primitives shared by the blocked LU and Gauss solvers.
//!
//! Matrices are row-major `n × n` slices. A panel is the vertical block of
//! columns `[i, i + ib)` being factored; `U12` are the panel rows right of
//! it, `L21` the rows below it within the panel columns, and `A22` the
//! trailing sub-matrix.

use crate::error::SolverError;

/// Pivots below this magnitude count as singular.
pub const EPSILON: f64 = 1e-12;

/// Search column `col` from the diagonal down for the largest absolute
/// pivot and swap that row (columns `[col, n)`) and its right-hand side up.
pub fn partial_pivot(
    a: &mut [f64],
    b: &mut [f64],
    n: usize,
    col: usize,
) -> Result<(), SolverError> {
    let mut pivot = col;
    let mut max_val = a[col * n + col].abs();

    for row in col + 1..n {
        let val = a[row * n + col].abs();
        if val > max_val {
            max_val = val;
            pivot = row;
        }
    }

    if max_val < EPSILON {
        return Err(SolverError::SingularMatrix);
    }

    if pivot != col {
        for j in col..n {
            a.swap(col * n + j, pivot * n + j);
        }
        b.swap(col, pivot);
    }
    Ok(())
}

/// Store the multipliers for pivot row `k` in place and update the panel
/// columns `[k + 1, i + ib)` of every row below.
pub fn eliminate_panel_column(a: &mut [f64], n: usize, k: usize, i: usize, ib: usize) {
    for row in k + 1..n {
        let multiplier = a[row * n + k] / a[k * n + k];
        a[row * n + k] = multiplier;
        for col in k + 1..i + ib {
            a[row * n + col] -= multiplier * a[k * n + col];
        }
    }
}

/// Subtract the already-computed `L·U` contributions from the panel rows
/// right of the panel.
pub fn update_u12(a: &mut [f64], n: usize, i: usize, ib: usize) {
    for r in i..i + ib {
        for c in i + ib..n {
            let mut sum = 0.0;
            for k in i..r {
                sum += a[r * n + k] * a[k * n + c];
            }
            a[r * n + c] -= sum;
        }
    }
}

/// Subtract contributions and divide by the `U` diagonal for the rows
/// below the panel, within the panel columns.
pub fn update_l21(a: &mut [f64], n: usize, i: usize, ib: usize) {
    for r in i + ib..n {
        for c in i..i + ib {
            let mut sum = 0.0;
            for k in i..c {
                sum += a[r * n + k] * a[k * n + c];
            }
            a[r * n + c] = (a[r * n + c] - sum) / a[c * n + c];
        }
    }
}

/// Trailing update `A22 ← A22 − L21 · U12` for a single row `r`. The
/// parallel solver fans this out one task per row.
pub fn update_a22_row(a: &mut [f64], n: usize, r: usize, i: usize, ib: usize) {
    for k in i..i + ib {
        let l = a[r * n + k];
        for c in i + ib..n {
            a[r * n + c] -= l * a[k * n + c];
        }
    }
}

/// Serial trailing update over all rows below the panel.
pub fn update_a22(a: &mut [f64], n: usize, i: usize, ib: usize) {
    for r in i + ib..n {
        update_a22_row(a, n, r, i, ib);
    }
}

/// Solve `L y = b` for unit-lower-triangular `L` stored in the strictly
/// lower part of `a`.
pub fn forward_substitution(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= a[i * n + j] * y[j];
        }
        y[i] = sum;
    }
    y
}

/// Solve `U x = b` for upper-triangular `U` stored in the upper part of
/// `a`.
pub fn back_substitution(a: &[f64], b: &[f64], n: usize) -> Result<Vec<f64>, SolverError> {
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in i + 1..n {
            sum -= a[i * n + j] * x[j];
        }
        let pivot = a[i * n + i];
        if pivot.abs() < EPSILON {
            return Err(SolverError::SingularMatrix);
        }
        x[i] = sum / pivot;
    }
    Ok(x)
}
