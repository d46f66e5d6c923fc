//! Bootstrap validation of tail stability.
//!
//! A tail-optimized lineup is only trustworthy if it survives resampling:
//! if re-optimizing on bootstrap resamples of the scenario vector moves the
//! CVaR a lot or swaps the roster wholesale, the tail estimate is noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use slipstream_core::{DriverId, SlipResult, SlipstreamError};
use std::collections::BTreeSet;

/// What the caller's optimizer produced on one bootstrap resample.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub cvar: f64,
    pub lineup: Vec<DriverId>,
}

/// Bootstrap stability verdict.
#[derive(Debug, Clone)]
pub struct StabilityReport {
    /// Coefficient of variation of the bootstrap CVaRs.
    pub cv: f64,
    /// Mean pairwise Jaccard similarity of the bootstrap lineups.
    pub lineup_consistency: f64,
    pub stable: bool,
    pub n_bootstrap: usize,
}

/// Thresholds: CV below 0.2 and consistency above 0.7.
const MAX_CV: f64 = 0.2;
const MIN_CONSISTENCY: f64 = 0.7;

/// Resample `x` with replacement `n_bootstrap` times, re-optimize on each
/// resample, and measure how much the CVaR and the chosen lineup move.
///
/// `optimize_fn` receives the resampled vector and returns the re-optimized
/// lineup plus its CVaR. Resamples are seeded `seed + i` so the report is
/// reproducible.
pub fn validate_tail_stability<F>(
    x: &[f64],
    optimize_fn: F,
    n_bootstrap: usize,
    seed: u64,
) -> SlipResult<StabilityReport>
where
    F: Fn(&[f64]) -> SlipResult<BootstrapOutcome> + Sync,
{
    if x.is_empty() {
        return Err(SlipstreamError::EmptyScenarios(
            "tail stability bootstrap".into(),
        ));
    }
    if n_bootstrap < 2 {
        return Err(SlipstreamError::Validation(
            "tail stability needs at least 2 bootstrap draws".into(),
        ));
    }

    let outcomes: Vec<BootstrapOutcome> = (0..n_bootstrap)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let resample: Vec<f64> = (0..x.len()).map(|_| x[rng.gen_range(0..x.len())]).collect();
            optimize_fn(&resample)
        })
        .collect::<SlipResult<Vec<_>>>()?;

    let cvars: Vec<f64> = outcomes.iter().map(|o| o.cvar).collect();
    let mean = cvars.iter().sum::<f64>() / cvars.len() as f64;
    let variance =
        cvars.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (cvars.len() - 1) as f64;
    let cv = if mean.abs() < f64::EPSILON {
        0.0
    } else {
        variance.sqrt() / mean.abs()
    };

    let lineup_consistency = mean_pairwise_jaccard(&outcomes);

    Ok(StabilityReport {
        cv,
        lineup_consistency,
        stable: cv < MAX_CV && lineup_consistency > MIN_CONSISTENCY,
        n_bootstrap,
    })
}

fn mean_pairwise_jaccard(outcomes: &[BootstrapOutcome]) -> f64 {
    let sets: Vec<BTreeSet<DriverId>> = outcomes
        .iter()
        .map(|o| o.lineup.iter().copied().collect())
        .collect();
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            let inter = sets[i].intersection(&sets[j]).count();
            let union = sets[i].union(&sets[j]).count();
            if union > 0 {
                total += inter as f64 / union as f64;
            }
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tail::cvar;

    #[test]
    fn identical_outcomes_are_stable() {
        let x: Vec<f64> = (0..500).map(|i| i as f64).collect();
        let report = validate_tail_stability(
            &x,
            |resample| {
                Ok(BootstrapOutcome {
                    cvar: cvar(resample, 0.9).map_err(SlipstreamError::from)?,
                    lineup: vec![DriverId::new(1), DriverId::new(2), DriverId::new(3)],
                })
            },
            16,
            7,
        )
        .unwrap();
        assert!(report.lineup_consistency > 0.99);
        assert!(report.cv < MAX_CV);
        assert!(report.stable);
    }

    #[test]
    fn disjoint_lineups_are_unstable() {
        let x: Vec<f64> = (0..500).map(|i| i as f64).collect();
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let report = validate_tail_stability(
            &x,
            |resample| {
                let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(BootstrapOutcome {
                    cvar: cvar(resample, 0.9).map_err(SlipstreamError::from)?,
                    // Every draw picks a disjoint roster.
                    lineup: vec![DriverId::new(3 * n), DriverId::new(3 * n + 1)],
                })
            },
            8,
            7,
        )
        .unwrap();
        assert!(report.lineup_consistency < 0.1);
        assert!(!report.stable);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let ok = |_: &[f64]| {
            Ok(BootstrapOutcome {
                cvar: 1.0,
                lineup: vec![],
            })
        };
        assert!(validate_tail_stability(&[], ok, 8, 1).is_err());
        assert!(validate_tail_stability(&[1.0], ok, 1, 1).is_err());
    }
}
