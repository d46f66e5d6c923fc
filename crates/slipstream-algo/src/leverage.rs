//! Ownership-aware leverage: penalties, constraints, and per-lineup metrics.
//!
//! Tournament equity comes from being right where the field is absent, so
//! the leverage-aware mode pays a quadratic price for chalk: each driver
//! contributes `−λ·(o_i/100)²·x_i` to the objective, the lineup's summed
//! ownership is capped, and a minimum number of low-owned drivers is
//! required.

use good_lp::{constraint, Constraint, Expression, Variable};
use serde::{Deserialize, Serialize};
use slipstream_core::{Lineup, OwnershipVector, SlipResult, SlipstreamError};

/// Leverage-mode settings plus the ownership estimates they act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageSettings {
    /// Chalk-penalty strength λ.
    pub lambda: f64,
    /// Cap on mean lineup ownership, as a fraction (0.25 = 25% average).
    pub max_total_ownership: f64,
    /// Required count of drivers under `low_ownership_threshold`.
    pub min_low_ownership_drivers: usize,
    /// Low-ownership threshold in percent.
    pub low_ownership_threshold: f64,
    pub ownership: OwnershipVector,
}

impl LeverageSettings {
    pub fn new(ownership: OwnershipVector) -> Self {
        Self {
            lambda: 1.0,
            max_total_ownership: 0.25,
            min_low_ownership_drivers: 2,
            low_ownership_threshold: 10.0,
            ownership,
        }
    }
}

/// Per-lineup ownership aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageMetrics {
    pub avg_ownership: f64,
    pub max_ownership: f64,
    pub total_ownership: f64,
    /// `total_points − λ·mean(ownership²)/100`.
    pub leverage_score: f64,
}

/// Build the objective penalty `λ·Σ (o_i/100)²·x_i` and the hard ownership
/// constraints for one solve.
pub fn apply_leverage(
    selection: &[Variable],
    settings: &LeverageSettings,
    n_roster: usize,
) -> SlipResult<(Expression, Vec<Constraint>)> {
    if settings.ownership.len() != selection.len() {
        return Err(SlipstreamError::Validation(format!(
            "ownership length {} != selection length {}",
            settings.ownership.len(),
            selection.len()
        )));
    }
    if settings.lambda < 0.0 {
        return Err(SlipstreamError::Validation(
            "leverage lambda must be non-negative".into(),
        ));
    }

    let mut penalty = Expression::from(0.0);
    let mut total_ownership = Expression::from(0.0);
    let mut low_owned = Expression::from(0.0);
    let mut low_available = 0usize;
    for (i, xv) in selection.iter().enumerate() {
        let pct = settings.ownership.as_slice()[i];
        let frac = pct / 100.0;
        penalty += settings.lambda * frac * frac * *xv;
        total_ownership += frac * *xv;
        if pct < settings.low_ownership_threshold {
            low_owned += *xv;
            low_available += 1;
        }
    }

    let mut constraints = vec![constraint!(
        total_ownership <= settings.max_total_ownership * n_roster as f64
    )];
    // An over-demanding floor would make every solve infeasible; clamp to
    // what the slate actually offers.
    let floor = settings.min_low_ownership_drivers.min(low_available);
    if floor > 0 {
        constraints.push(constraint!(low_owned >= floor as f64));
    }
    Ok((penalty, constraints))
}

/// Measure leverage aggregates for an emitted lineup. `series` is the
/// lineup's per-scenario points; its mean stands in for total points in the
/// leverage score.
pub fn leverage_metrics(
    lineup: &Lineup,
    settings: &LeverageSettings,
    series: &[f64],
) -> LeverageMetrics {
    let ownerships: Vec<f64> = lineup
        .drivers
        .iter()
        .map(|id| settings.ownership.get(*id))
        .collect();
    let total: f64 = ownerships.iter().sum();
    let avg = if ownerships.is_empty() {
        0.0
    } else {
        total / ownerships.len() as f64
    };
    let max = ownerships.iter().copied().fold(0.0, f64::max);
    let mean_sq = if ownerships.is_empty() {
        0.0
    } else {
        ownerships.iter().map(|o| o * o).sum::<f64>() / ownerships.len() as f64
    };
    let total_points = if series.is_empty() {
        0.0
    } else {
        series.iter().sum::<f64>() / series.len() as f64
    };
    LeverageMetrics {
        avg_ownership: avg,
        max_ownership: max,
        total_ownership: total,
        leverage_score: total_points - settings.lambda * mean_sq / 100.0,
    }
}
