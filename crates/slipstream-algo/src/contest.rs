//! Monte-Carlo contest simulation: rank → payout under a fitted curve.
//!
//! Each simulation samples a field for one scenario's driver points, inserts
//! our score, computes the 1-indexed descending rank with a declared tie
//! policy, and looks up the payout. Ranking is a single count pass over the
//! field scores; there is no per-opponent inner loop beyond it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slipstream_core::{CancelToken, SlipResult, SlipstreamError};
use slipstream_scenarios::ScenarioMatrix;
use tracing::info;

use crate::field::FieldSampler;
use crate::payout::PayoutCurve;

/// Who wins an exact score tie. The default is pessimistic: ties rank us
/// below the opponent, so equity is never overstated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    #[default]
    MeLosesTies,
    MeWinsTies,
}

/// Contest-simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestConfig {
    pub field_size: usize,
    pub n_contest_sims: usize,
    pub buyin: f64,
    /// Fraction of the field that cashes.
    pub cash_fraction: f64,
    pub tie_policy: TiePolicy,
    /// Resource bound: at most this many scenario rows drive contest sims.
    /// Rows are taken at an even stride; the truncation is logged.
    pub max_scenarios: Option<usize>,
}

impl Default for ContestConfig {
    fn default() -> Self {
        Self {
            field_size: 1_000,
            n_contest_sims: 20,
            buyin: 20.0,
            cash_fraction: 0.25,
            tie_policy: TiePolicy::default(),
            max_scenarios: Some(200),
        }
    }
}

/// Outcome of one simulated contest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestResult {
    pub rank: usize,
    pub payout: f64,
    pub score: f64,
    pub winning_score: f64,
    pub field_size: usize,
    pub cashed: bool,
    pub top_1pct: bool,
}

/// Rank and score one entry against a field under one scenario.
pub fn simulate_contest(
    my_score: f64,
    field_scores: &[f64],
    curve: &PayoutCurve,
    config: &ContestConfig,
) -> SlipResult<ContestResult> {
    let field_size = field_scores.len() + 1;
    let beaten_by = match config.tie_policy {
        TiePolicy::MeLosesTies => field_scores.iter().filter(|s| **s >= my_score).count(),
        TiePolicy::MeWinsTies => field_scores.iter().filter(|s| **s > my_score).count(),
    };
    let rank = 1 + beaten_by;
    let payout = curve.predict(rank)?;
    let winning_score = field_scores
        .iter()
        .copied()
        .fold(my_score, f64::max);
    let cash_line = ((field_size as f64) * config.cash_fraction).ceil() as usize;
    let top_line = ((field_size as f64) * 0.01).ceil() as usize;
    Ok(ContestResult {
        rank,
        payout,
        score: my_score,
        winning_score,
        field_size,
        cashed: rank <= cash_line,
        top_1pct: rank <= top_line,
    })
}

/// Run contests for every portfolio lineup across scenarios × sims.
///
/// `series` holds each lineup's per-scenario points (full scenario order,
/// as produced by `ScenarioMatrix::lineup_series`). One field is sampled per
/// (scenario, sim) and shared by all lineups, which both matches reality
/// (everyone faces the same field) and keeps the hot path to one field
/// sampling plus one count pass per lineup.
///
/// Returns per-lineup result arrays. Results are commutative across
/// scenarios; no ordering is guaranteed beyond grouping by lineup.
pub fn simulate_portfolio(
    series: &[Vec<f64>],
    matrix: &ScenarioMatrix,
    sampler: &FieldSampler,
    curve: &PayoutCurve,
    config: &ContestConfig,
    seed: u64,
    token: &CancelToken,
) -> SlipResult<Vec<Vec<ContestResult>>> {
    if series.is_empty() {
        return Err(SlipstreamError::Validation(
            "contest simulation needs at least one lineup".into(),
        ));
    }
    if config.field_size < 2 || config.n_contest_sims == 0 {
        return Err(SlipstreamError::Validation(format!(
            "degenerate contest: field_size {}, sims {}",
            config.field_size, config.n_contest_sims
        )));
    }
    for s in series {
        if s.len() != matrix.n_scenarios() {
            return Err(SlipstreamError::Validation(format!(
                "lineup series length {} != scenario count {}",
                s.len(),
                matrix.n_scenarios()
            )));
        }
    }

    let scenario_rows = select_rows(matrix.n_scenarios(), config.max_scenarios);
    let opponents = config.field_size - 1;

    let per_scenario: Vec<Vec<Vec<ContestResult>>> = scenario_rows
        .par_iter()
        .map(|&k| -> SlipResult<Vec<Vec<ContestResult>>> {
            token.check("contest simulation")?;
            let row = matrix.row(k);
            let mut rng = StdRng::seed_from_u64(seed ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let mut per_lineup: Vec<Vec<ContestResult>> =
                vec![Vec::with_capacity(config.n_contest_sims); series.len()];
            for _sim in 0..config.n_contest_sims {
                let field = sampler.sample_field(opponents, &mut rng);
                let field_scores: Vec<f64> = field.iter().map(|l| l.score(row)).collect();
                for (l, lineup_series) in series.iter().enumerate() {
                    per_lineup[l].push(simulate_contest(
                        lineup_series[k],
                        &field_scores,
                        curve,
                        config,
                    )?);
                }
            }
            Ok(per_lineup)
        })
        .collect::<SlipResult<Vec<_>>>()?;

    // Merge scenario blocks into per-lineup arrays.
    let mut merged: Vec<Vec<ContestResult>> =
        vec![Vec::with_capacity(scenario_rows.len() * config.n_contest_sims); series.len()];
    for block in per_scenario {
        for (l, results) in block.into_iter().enumerate() {
            merged[l].extend(results);
        }
    }
    Ok(merged)
}

/// Evenly-strided scenario selection under the resource bound.
fn select_rows(n_scenarios: usize, max_scenarios: Option<usize>) -> Vec<usize> {
    match max_scenarios {
        Some(max) if max > 0 && n_scenarios > max => {
            info!(
                n_scenarios,
                used = max,
                "contest sims bounded; sampling scenarios at an even stride"
            );
            let stride = n_scenarios as f64 / max as f64;
            (0..max).map(|i| (i as f64 * stride) as usize).collect()
        }
        _ => (0..n_scenarios).collect(),
    }
}
