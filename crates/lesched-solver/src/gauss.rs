//! Gaussian elimination baseline. Unblocked, serial, and the accuracy
//! reference for the LU variants.

use crate::equation::LinearEquation;
use crate::error::SolverError;
use crate::kernel::{back_substitution, partial_pivot};

pub fn solve(mut le: LinearEquation) -> Result<Vec<f64>, SolverError> {
    let n = le.n;
    let a = le.a.as_mut_slice();
    let b = le.b.as_mut_slice();

    // Forward elimination with partial pivoting.
    for i in 0..n {
        partial_pivot(a, b, n, i)?;

        for row in i + 1..n {
            let factor = a[row * n + i] / a[i * n + i];
            b[row] -= factor * b[i];
            for col in i..n {
                a[row * n + col] -= factor * a[i * n + col];
            }
        }
    }

    back_substitution(a, b, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_fixed_system() {
        let le = LinearEquation::new(
            3,
            vec![2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 2.0],
            vec![1.0, 0.0, 1.0],
            0.0,
        );
        let x = solve(le).unwrap();
        for value in x {
            assert!((value - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn pivots_through_a_leading_zero() {
        // [[0, 1], [1, 0]] requires the row swap to proceed at all.
        let le = LinearEquation::new(2, vec![0.0, 1.0, 1.0, 0.0], vec![3.0, 4.0], 0.0);
        let x = solve(le).unwrap();
        assert!((x[0] - 4.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn detects_singular_matrix() {
        let le = LinearEquation::new(2, vec![1.0, 1.0, 1.0, 1.0], vec![1.0, 2.0], 0.0);
        assert_eq!(solve(le), Err(SolverError::SingularMatrix));
    }
}
