use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolverError {
    /// A pivot fell below the numerical tolerance during factorization or
    /// substitution.
    #[error("singular matrix")]
    SingularMatrix,
}
