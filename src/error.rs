//! Error taxonomy for the guess-and-determine engine

use thiserror::Error;

/// Errors raised by model construction, solving and decoding.
///
/// Unsatisfiable and inconclusive solver verdicts are not errors; they are
/// reported through [`crate::sat::SolveStatus`].
#[derive(Debug, Error)]
pub enum GdError {
    /// The relation model is malformed (unknown names, overlapping sets, ...)
    #[error("invalid relation model: {0}")]
    InvalidRelation(String),

    /// An internal encoding invariant was violated
    #[error("encoding invariant violated: {0}")]
    Encoding(String),

    /// The solver backend reported a failure
    #[error("solver error: {0}")]
    Solver(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GdResult<T> = std::result::Result<T, GdError>;
