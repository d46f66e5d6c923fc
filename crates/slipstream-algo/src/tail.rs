//! Tail metrics over a length-S point vector.
//!
//! All selection goes through one top-k partition (`select_nth_unstable_by`,
//! an introselect): a full sort of the scenario vector is never performed.
//! For maximization-side tail metrics at level α the tail is the k = ⌈(1−α)·S⌉
//! **largest** outcomes:
//!
//! - `cvar`  — mean of the top-k (tournament-equity proxy)
//! - `var_q` — minimum of the top-k (the α-quantile threshold)
//! - `top_x_pct` — maximum of the top-k (best tail outcome)
//! - `conditional_upside` — cvar minus the overall mean
//!
//! NaN inputs propagate: `f64::total_cmp` sorts NaN above every finite value,
//! so a NaN lands in the tail and poisons the mean, which is the documented
//! contract. Callers that want filtering do it before calling in.

use serde::{Deserialize, Serialize};
use slipstream_core::SlipstreamError;
use thiserror::Error;
use tracing::warn;

/// Tail-selection errors; fail-fast, no retries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TailError {
    #[error("invalid tail quantile alpha={0}; must lie in (0, 1)")]
    InvalidAlpha(f64),
    #[error("empty scenario vector")]
    EmptyScenarios,
}

impl From<TailError> for SlipstreamError {
    fn from(err: TailError) -> Self {
        match err {
            TailError::InvalidAlpha(a) => SlipstreamError::InvalidAlpha(a),
            TailError::EmptyScenarios => {
                SlipstreamError::EmptyScenarios("tail selection".into())
            }
        }
    }
}

/// Tail metrics for one quantile level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailMetrics {
    pub alpha: f64,
    /// Human label, e.g. "top_1pct" for α = 0.99. Derived with integer
    /// rounding so 0.99 never drifts to "top_0pct".
    pub label: String,
    pub cvar: f64,
    pub var: f64,
    pub top: f64,
    pub conditional_upside: f64,
}

/// One partition, all tail statistics.
struct TailSelection {
    k: usize,
    var: f64,
    cvar: f64,
    top: f64,
}

fn select_tail(x: &[f64], alpha: f64) -> Result<TailSelection, TailError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(TailError::InvalidAlpha(alpha));
    }
    let s = x.len();
    if s == 0 {
        return Err(TailError::EmptyScenarios);
    }
    let mut k = ((1.0 - alpha) * s as f64).ceil() as usize;
    if k == 0 {
        k = 1;
    }
    if k > s {
        warn!(
            alpha,
            n_scenarios = s,
            "tail wider than sample; falling back to the full vector"
        );
        k = s;
    }
    let mut scratch = x.to_vec();
    let pivot = s - k;
    scratch.select_nth_unstable_by(pivot, f64::total_cmp);
    let tail = &scratch[pivot..];
    // The pivot element is the smallest of the top-k under the total order.
    let var = tail[0];
    let cvar = tail.iter().sum::<f64>() / k as f64;
    let top = tail
        .iter()
        .copied()
        .max_by(f64::total_cmp)
        .expect("tail is non-empty");
    Ok(TailSelection { k, var, cvar, top })
}

/// Conditional value at risk at level α: the mean of the k = ⌈(1−α)·S⌉
/// largest outcomes.
pub fn cvar(x: &[f64], alpha: f64) -> Result<f64, TailError> {
    Ok(select_tail(x, alpha)?.cvar)
}

/// Value at risk at level α: the smallest outcome inside the top tail
/// (the α-quantile threshold).
pub fn var_q(x: &[f64], alpha: f64) -> Result<f64, TailError> {
    Ok(select_tail(x, alpha)?.var)
}

/// Best outcome among the top-k scenarios.
pub fn top_x_pct(x: &[f64], alpha: f64) -> Result<f64, TailError> {
    Ok(select_tail(x, alpha)?.top)
}

/// CVaR minus the overall mean: the expected excess given a tail event.
pub fn conditional_upside(x: &[f64], alpha: f64) -> Result<f64, TailError> {
    let tail = select_tail(x, alpha)?;
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    Ok(tail.cvar - mean)
}

/// Integer-rounded percent label for a tail level, e.g. `tail_percent_label(0.99) == 1`.
/// Truncation here produced off-by-one labels in the past; always round.
pub fn tail_percent_label(alpha: f64) -> u32 {
    ((1.0 - alpha) * 100.0).round() as u32
}

/// All tail metrics for each quantile in `alphas`, sharing one partition per
/// quantile.
pub fn tail_metrics(x: &[f64], alphas: &[f64]) -> Result<Vec<TailMetrics>, TailError> {
    if x.is_empty() {
        return Err(TailError::EmptyScenarios);
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    let mut out = Vec::with_capacity(alphas.len());
    for &alpha in alphas {
        let sel = select_tail(x, alpha)?;
        out.push(TailMetrics {
            alpha,
            label: format!("top_{}pct", tail_percent_label(alpha)),
            cvar: sel.cvar,
            var: sel.var,
            top: sel.top,
            conditional_upside: sel.cvar - mean,
        });
    }
    Ok(out)
}

/// Scenario count needed for a stable tail estimate at level α: at least
/// `min_tail_samples` outcomes must land in the tail, with hard floors per
/// quantile tier.
pub fn adaptive_scenario_count(alpha: f64, min_tail_samples: usize) -> Result<usize, TailError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(TailError::InvalidAlpha(alpha));
    }
    let from_tail = (min_tail_samples as f64 / (1.0 - alpha)).ceil() as usize;
    let tier_floor = if alpha >= 0.99 {
        10_000
    } else if alpha >= 0.95 {
        2_000
    } else {
        1_000
    };
    Ok(from_tail.max(tier_floor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn cvar_is_mean_of_top_k() {
        // S=100, alpha=0.95 -> k=5 -> top values 96..=100, mean 98.
        let x = ramp(100);
        assert_relative_eq!(cvar(&x, 0.95).unwrap(), 98.0);
        assert_relative_eq!(var_q(&x, 0.95).unwrap(), 96.0);
        assert_relative_eq!(top_x_pct(&x, 0.95).unwrap(), 100.0);
    }

    #[test]
    fn ordering_chain_holds() {
        let x = vec![3.0, -1.0, 4.5, 9.0, 2.2, 7.7, 0.1, 5.5];
        for alpha in [0.5, 0.75, 0.9, 0.99] {
            let v = var_q(&x, alpha).unwrap();
            let c = cvar(&x, alpha).unwrap();
            let t = top_x_pct(&x, alpha).unwrap();
            let min = x.iter().copied().fold(f64::INFINITY, f64::min);
            let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(min <= v && v <= c && c <= t && t <= max, "alpha={alpha}");
        }
    }

    #[test]
    fn cvar_monotone_in_alpha() {
        let x = ramp(1000);
        let c90 = cvar(&x, 0.90).unwrap();
        let c95 = cvar(&x, 0.95).unwrap();
        let c99 = cvar(&x, 0.99).unwrap();
        assert!(c90 <= c95 && c95 <= c99);
    }

    #[test]
    fn constant_vector_collapses() {
        let x = vec![7.5; 64];
        assert_relative_eq!(cvar(&x, 0.9).unwrap(), 7.5);
        assert_relative_eq!(var_q(&x, 0.9).unwrap(), 7.5);
        assert_relative_eq!(top_x_pct(&x, 0.9).unwrap(), 7.5);
        assert_relative_eq!(conditional_upside(&x, 0.9).unwrap(), 0.0);
    }

    #[test]
    fn single_element_returns_it() {
        assert_relative_eq!(cvar(&[42.0], 0.99).unwrap(), 42.0);
        assert_relative_eq!(var_q(&[42.0], 0.99).unwrap(), 42.0);
    }

    #[test]
    fn invalid_alpha_and_empty_fail_fast() {
        assert_eq!(cvar(&[1.0], 0.0), Err(TailError::InvalidAlpha(0.0)));
        assert_eq!(cvar(&[1.0], 1.0), Err(TailError::InvalidAlpha(1.0)));
        assert_eq!(cvar(&[1.0], -0.5), Err(TailError::InvalidAlpha(-0.5)));
        assert_eq!(cvar(&[], 0.9), Err(TailError::EmptyScenarios));
    }

    #[test]
    fn nan_propagates() {
        let x = vec![1.0, f64::NAN, 3.0, 4.0];
        assert!(cvar(&x, 0.75).unwrap().is_nan());
    }

    #[test]
    fn adaptive_count_floors() {
        assert!(adaptive_scenario_count(0.99, 100).unwrap() >= 10_000);
        assert!(adaptive_scenario_count(0.95, 100).unwrap() >= 2_000);
        assert!(adaptive_scenario_count(0.90, 100).unwrap() >= 1_000);
        // 100 tail samples at alpha=0.999 needs 100k scenarios, above the floor.
        assert_eq!(adaptive_scenario_count(0.999, 100).unwrap(), 100_000);
    }

    #[test]
    fn labels_round_not_truncate() {
        assert_eq!(tail_percent_label(0.99), 1);
        assert_eq!(tail_percent_label(0.95), 5);
        assert_eq!(tail_percent_label(0.90), 10);
    }

    #[test]
    fn tail_metrics_bundle() {
        let x = ramp(1000);
        let metrics = tail_metrics(&x, &[0.99, 0.95]).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].label, "top_1pct");
        assert_eq!(metrics[1].label, "top_5pct");
        assert!(metrics[0].cvar > metrics[1].cvar);
    }
}
