//! Tail-objective validation: CVaR portfolio against a real mean baseline.
//!
//! The baseline is produced by actually running the generator with the mean
//! objective on the same matrix — never by scaling the tail portfolio with a
//! synthetic multiplier. Comparison statistic: mean per-lineup CVaR at the
//! primary quantile.

use serde::{Deserialize, Serialize};
use slipstream_core::{SlipResult, SlipstreamError};

use crate::portfolio::Portfolio;

/// Outcome of the CVaR-vs-mean harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailValidation {
    pub alpha: f64,
    /// Mean per-lineup CVaR of the tail-optimized portfolio.
    pub cvar_portfolio: f64,
    /// Mean per-lineup CVaR of the mean-optimized baseline.
    pub mean_baseline: f64,
    /// Relative lift: `(cvar_portfolio - mean_baseline) / |mean_baseline|`.
    pub tail_improvement: f64,
    /// True when the lift clears the 5% acceptance bar.
    pub improved: bool,
}

/// Acceptance bar for the tail lift.
const MIN_IMPROVEMENT: f64 = 0.05;

/// Compare a tail-optimized portfolio with its mean-optimized baseline at
/// one quantile. Both portfolios must carry tail metrics for `alpha`.
pub fn validate_tail_objective(
    tail_portfolio: &Portfolio,
    mean_baseline: &Portfolio,
    alpha: f64,
) -> SlipResult<TailValidation> {
    let cvar_portfolio = tail_portfolio.mean_cvar(alpha).ok_or_else(|| {
        SlipstreamError::Validation(format!(
            "tail portfolio carries no CVaR metrics at alpha {alpha}"
        ))
    })?;
    let baseline = mean_baseline.mean_cvar(alpha).ok_or_else(|| {
        SlipstreamError::Validation(format!(
            "mean baseline carries no CVaR metrics at alpha {alpha}"
        ))
    })?;

    let tail_improvement = if baseline.abs() < f64::EPSILON {
        0.0
    } else {
        (cvar_portfolio - baseline) / baseline.abs()
    };

    Ok(TailValidation {
        alpha,
        cvar_portfolio,
        mean_baseline: baseline,
        tail_improvement,
        improved: tail_improvement > MIN_IMPROVEMENT,
    })
}
