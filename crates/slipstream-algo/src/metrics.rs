//! Contest-equity metrics with bootstrap confidence intervals.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use slipstream_core::{SlipResult, SlipstreamError};

use crate::contest::ContestResult;

const BOOTSTRAP_DRAWS: usize = 200;

/// Aggregates over a set of contest results (one lineup, or a whole
/// portfolio when results are pooled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestMetrics {
    /// Return on investment in percent.
    pub roi_pct: f64,
    /// 5th/95th percentile bootstrap interval on `roi_pct`. Zero-width when
    /// only a single result is available.
    pub roi_ci: (f64, f64),
    /// Probability of cashing, with its standard error.
    pub cash_rate: f64,
    pub cash_se: f64,
    /// Probability of a top-1% finish, with its standard error.
    pub win_rate: f64,
    pub win_se: f64,
    /// Expected payout in dollars.
    pub ev: f64,
    pub avg_rank: f64,
    pub n_results: usize,
}

/// Compute per-lineup (or pooled) contest metrics. Bootstrap draws are
/// seeded, so the interval is reproducible.
pub fn compute_contest_metrics(
    results: &[ContestResult],
    buyin: f64,
    seed: u64,
) -> SlipResult<ContestMetrics> {
    if results.is_empty() {
        return Err(SlipstreamError::Validation(
            "contest metrics need at least one result".into(),
        ));
    }
    if buyin <= 0.0 {
        return Err(SlipstreamError::Validation(format!(
            "buyin {buyin} must be positive"
        )));
    }

    let n = results.len();
    let payouts: Vec<f64> = results.iter().map(|r| r.payout).collect();
    let ev = payouts.iter().sum::<f64>() / n as f64;
    let roi_pct = (ev - buyin) / buyin * 100.0;

    let roi_ci = if n == 1 {
        (roi_pct, roi_pct)
    } else {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut means = Vec::with_capacity(BOOTSTRAP_DRAWS);
        for _ in 0..BOOTSTRAP_DRAWS {
            let sum: f64 = (0..n).map(|_| payouts[rng.gen_range(0..n)]).sum();
            means.push(sum / n as f64);
        }
        means.sort_by(f64::total_cmp);
        let lo = means[(BOOTSTRAP_DRAWS as f64 * 0.05) as usize];
        let hi = means[((BOOTSTRAP_DRAWS as f64 * 0.95) as usize).min(BOOTSTRAP_DRAWS - 1)];
        (
            (lo - buyin) / buyin * 100.0,
            (hi - buyin) / buyin * 100.0,
        )
    };

    let cash_rate = results.iter().filter(|r| r.cashed).count() as f64 / n as f64;
    let win_rate = results.iter().filter(|r| r.top_1pct).count() as f64 / n as f64;
    let avg_rank = results.iter().map(|r| r.rank as f64).sum::<f64>() / n as f64;

    Ok(ContestMetrics {
        roi_pct,
        roi_ci,
        cash_rate,
        cash_se: proportion_se(cash_rate, n),
        win_rate,
        win_se: proportion_se(win_rate, n),
        ev,
        avg_rank,
        n_results: n,
    })
}

fn proportion_se(p: f64, n: usize) -> f64 {
    (p * (1.0 - p) / n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(payout: f64, rank: usize, cashed: bool, top: bool) -> ContestResult {
        ContestResult {
            rank,
            payout,
            score: 100.0,
            winning_score: 150.0,
            field_size: 100,
            cashed,
            top_1pct: top,
        }
    }

    #[test]
    fn rates_are_probabilities_and_ci_straddles() {
        let results: Vec<ContestResult> = (0..100)
            .map(|i| result(if i < 30 { 40.0 } else { 0.0 }, i + 1, i < 25, i == 0))
            .collect();
        let m = compute_contest_metrics(&results, 20.0, 7).unwrap();
        assert!((0.0..=1.0).contains(&m.cash_rate));
        assert!((0.0..=1.0).contains(&m.win_rate));
        assert!(m.roi_ci.0 <= m.roi_pct && m.roi_pct <= m.roi_ci.1);
        assert!(m.cash_se > 0.0);
        assert!((m.ev - 12.0).abs() < 1e-9);
        assert!((m.roi_pct - (-40.0)).abs() < 1e-9);
    }

    #[test]
    fn single_sample_ci_is_zero_width() {
        let m = compute_contest_metrics(&[result(50.0, 3, true, false)], 20.0, 7).unwrap();
        assert_eq!(m.roi_ci.0, m.roi_ci.1);
        assert_eq!(m.cash_se, 0.0);
        assert_eq!(m.n_results, 1);
    }

    #[test]
    fn empty_results_rejected() {
        assert!(compute_contest_metrics(&[], 20.0, 7).is_err());
    }
}
