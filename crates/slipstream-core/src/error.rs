//! Unified error types for the slipstream ecosystem
//!
//! This module provides a common error type [`SlipstreamError`] that can
//! represent errors from any part of the system. Domain-specific error types
//! (tail metrics, objective builders, the portfolio generator) convert into
//! `SlipstreamError` for uniform handling at API boundaries, and each error
//! maps onto a handling [`ErrorKind`] so the job layer can pick a response
//! class without string matching.

use thiserror::Error;

/// Unified error type for all slipstream operations.
#[derive(Error, Debug)]
pub enum SlipstreamError {
    /// I/O errors (file access, export, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request or data validation errors (fail fast, no retry)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Quantile level outside (0, 1)
    #[error("invalid tail quantile alpha={0}; must lie in (0, 1)")]
    InvalidAlpha(f64),

    /// Empty scenario vector or matrix where tail selection was requested
    #[error("empty scenario input: {0}")]
    EmptyScenarios(String),

    /// The MILP reported an unbounded objective; the bounded upper-tail
    /// formulation must prevent this, so it indicates a missing bound
    #[error("unbounded MILP: {0}")]
    Unbounded(String),

    /// No roster-valid lineup exists for the first solve of a request
    #[error("no feasible lineup: {0}")]
    NoFeasibleLineup(String),

    /// Solver hit its time limit with no incumbent on the first lineup
    #[error("solver time limit: {0}")]
    SolverTimeout(String),

    /// Payout curve fit did not converge
    #[error("payout curve fit failed: {0}")]
    CurveFit(String),

    /// Payout curve prediction requested before a successful fit
    #[error("payout curve not fitted")]
    NotFitted,

    /// Generic solver/backend failure
    #[error("Solver error: {0}")]
    Solver(String),

    /// An optional pipeline step failed; carried as a warning, never fatal
    #[error("optional step '{step}' skipped: {reason}")]
    OptionalStep { step: String, reason: String },

    /// Caller cancelled the request
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Handling class for an error, matching the response-policy table:
/// validation → 4xx, fatal → 5xx, degenerate → truncation, optional →
/// warn-and-omit, cancellation → partial result with `cancelled` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Resource,
    Degenerate,
    Fatal,
    OptionalPipeline,
    Cancellation,
}

impl SlipstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SlipstreamError::Validation(_)
            | SlipstreamError::InvalidAlpha(_)
            | SlipstreamError::EmptyScenarios(_)
            | SlipstreamError::Parse(_) => ErrorKind::Validation,
            SlipstreamError::SolverTimeout(_) => ErrorKind::Resource,
            SlipstreamError::NoFeasibleLineup(_)
            | SlipstreamError::Unbounded(_)
            | SlipstreamError::CurveFit(_)
            | SlipstreamError::NotFitted
            | SlipstreamError::Solver(_)
            | SlipstreamError::Io(_)
            | SlipstreamError::Other(_) => ErrorKind::Fatal,
            SlipstreamError::OptionalStep { .. } => ErrorKind::OptionalPipeline,
            SlipstreamError::Cancelled(_) => ErrorKind::Cancellation,
        }
    }
}

/// Convenience type alias for Results using SlipstreamError.
pub type SlipResult<T> = Result<T, SlipstreamError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for SlipstreamError {
    fn from(err: anyhow::Error) -> Self {
        SlipstreamError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for SlipstreamError {
    fn from(s: String) -> Self {
        SlipstreamError::Other(s)
    }
}

impl From<&str> for SlipstreamError {
    fn from(s: &str) -> Self {
        SlipstreamError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for SlipstreamError {
    fn from(err: serde_json::Error) -> Self {
        SlipstreamError::Parse(err.to_string())
    }
}
