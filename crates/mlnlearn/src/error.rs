//! Error types for mlnlearn

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MlnError {
    /// Invalid term, domain or predicate construction. Rejected at the
    /// construction site, never coerced.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The numeric solver could not make progress. Fatal to the search
    /// branch (or run) that issued the optimization; never retried here.
    #[error("optimizer failed during {step}: {reason}")]
    Convergence { step: String, reason: String },

    /// A weight vector does not match the tracked formula count.
    #[error("weight vector has length {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, MlnError>;
