//! Race-flow regime classification and per-regime lineup budgets.
//!
//! Scenario rows cluster into qualitatively different races: one driver
//! dominating laps led, caution-riddled chaos, or a fuel-mileage parade.
//! Building some lineups against each regime diversifies the portfolio in a
//! way the correlation penalty alone does not. The classifier is a
//! variance/dominance heuristic and explicitly pluggable; the allocation
//! policy is fixed.

use serde::{Deserialize, Serialize};
use slipstream_core::{CancelToken, ConstraintSpec, Slate, SlipResult, SlipstreamError};
use slipstream_scenarios::ScenarioMatrix;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::portfolio::{GeneratorConfig, Portfolio, PortfolioGenerator};

/// Qualitative race-flow class for one scenario row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// One driver's outcome towers over the field.
    Dominator,
    /// High dispersion without a standout.
    Chaos,
    /// Compressed outcomes.
    FuelMileage,
}

/// Pluggable per-row classifier. Implementations must be cheap: they run
/// once per scenario row.
pub trait RegimeClassifier: Send + Sync {
    fn classify(&self, row: &[f64]) -> Regime;
}

/// Default heuristic: dominance when the top score takes an outsized share
/// of the row total, chaos when the row's coefficient of variation is high,
/// fuel-mileage otherwise.
#[derive(Debug, Clone)]
pub struct VarianceDominanceClassifier {
    /// Top-score share of the row total that flags a dominator race.
    pub dominance_share: f64,
    /// Row coefficient of variation that flags chaos.
    pub chaos_cv: f64,
}

impl Default for VarianceDominanceClassifier {
    fn default() -> Self {
        Self {
            dominance_share: 0.18,
            chaos_cv: 0.55,
        }
    }
}

impl RegimeClassifier for VarianceDominanceClassifier {
    fn classify(&self, row: &[f64]) -> Regime {
        if row.is_empty() {
            return Regime::FuelMileage;
        }
        let total: f64 = row.iter().sum();
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if total > 0.0 && max / total >= self.dominance_share {
            return Regime::Dominator;
        }
        let mean = total / row.len() as f64;
        let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / row.len() as f64;
        let cv = if mean.abs() < f64::EPSILON {
            0.0
        } else {
            var.sqrt() / mean.abs()
        };
        if cv >= self.chaos_cv {
            Regime::Chaos
        } else {
            Regime::FuelMileage
        }
    }
}

/// Scenario-row indices grouped by regime.
pub fn partition_by_regime(
    matrix: &ScenarioMatrix,
    classifier: &dyn RegimeClassifier,
) -> HashMap<Regime, Vec<usize>> {
    let mut partition: HashMap<Regime, Vec<usize>> = HashMap::new();
    for k in 0..matrix.n_scenarios() {
        partition
            .entry(classifier.classify(matrix.row(k)))
            .or_default()
            .push(k);
    }
    partition
}

/// Per-regime lineup weights.
pub type RegimeWeights = Vec<(Regime, f64)>;

/// Integer allocation of `total` lineups proportional to regime weights,
/// with the rounding remainder going to the highest-weight regime.
pub fn allocate_budgets(total: usize, weights: &RegimeWeights) -> SlipResult<Vec<(Regime, usize)>> {
    if weights.is_empty() {
        return Err(SlipstreamError::Validation(
            "regime allocation needs at least one weight".into(),
        ));
    }
    let weight_sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if weight_sum <= 0.0 || weights.iter().any(|(_, w)| *w < 0.0) {
        return Err(SlipstreamError::Validation(
            "regime weights must be non-negative with a positive sum".into(),
        ));
    }

    let mut budgets: Vec<(Regime, usize)> = weights
        .iter()
        .map(|(regime, w)| (*regime, ((total as f64) * w / weight_sum).floor() as usize))
        .collect();
    let assigned: usize = budgets.iter().map(|(_, n)| n).sum();
    let remainder = total - assigned;
    if remainder > 0 {
        let top = weights
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .expect("weights are non-empty");
        budgets[top].1 += remainder;
    }
    Ok(budgets)
}

/// Run portfolio generation per regime: classify every scenario row, split
/// the lineup budget by the given weights, and solve each regime's budget
/// against only that regime's scenario rows. Regimes with no scenarios (or
/// a zero budget) are skipped with a log line; the returned portfolios keep
/// the budget order.
pub fn generate_regime_portfolios(
    slate: &Slate,
    spec: &ConstraintSpec,
    base_config: &GeneratorConfig,
    matrix: &ScenarioMatrix,
    classifier: &dyn RegimeClassifier,
    weights: &RegimeWeights,
    token: &CancelToken,
) -> SlipResult<Vec<(Regime, Portfolio)>> {
    let partition = partition_by_regime(matrix, classifier);
    let budgets = allocate_budgets(base_config.n_lineups, weights)?;

    let mut portfolios = Vec::new();
    for (regime, budget) in budgets {
        if budget == 0 {
            continue;
        }
        let Some(rows) = partition.get(&regime) else {
            warn!(?regime, budget, "no scenarios classified; budget dropped");
            continue;
        };
        let subset = matrix.subset(rows)?;
        info!(
            ?regime,
            budget,
            scenarios = rows.len(),
            "generating regime portfolio"
        );
        let mut config = base_config.clone();
        config.n_lineups = budget;
        let portfolio = PortfolioGenerator::new(slate, spec, config).generate(&subset, token)?;
        portfolios.push((regime, portfolio));
    }
    Ok(portfolios)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_flags_dominator() {
        let classifier = VarianceDominanceClassifier::default();
        // One driver with an outsized share of the row total.
        let row = vec![90.0, 20.0, 22.0, 21.0, 19.0, 23.0, 18.0, 20.0, 21.0, 20.0];
        assert_eq!(classifier.classify(&row), Regime::Dominator);
    }

    #[test]
    fn classifier_flags_compressed_rows_as_fuel_mileage() {
        let classifier = VarianceDominanceClassifier::default();
        let row = vec![20.0, 21.0, 19.0, 20.5, 20.2, 19.8, 20.1, 19.9, 20.3, 20.0];
        assert_eq!(classifier.classify(&row), Regime::FuelMileage);
    }

    #[test]
    fn partition_covers_every_row() {
        let matrix = ScenarioMatrix::from_rows(
            vec![
                90.0, 20.0, 21.0, 19.0, //
                20.0, 21.0, 19.0, 20.0, //
                20.0, 21.0, 19.0, 20.5, //
            ],
            3,
            4,
        )
        .unwrap();
        let partition = partition_by_regime(&matrix, &VarianceDominanceClassifier::default());
        let total: usize = partition.values().map(Vec::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn budgets_sum_to_total_with_remainder_on_top_weight() {
        let weights: RegimeWeights = vec![
            (Regime::Dominator, 0.5),
            (Regime::Chaos, 0.3),
            (Regime::FuelMileage, 0.2),
        ];
        let budgets = allocate_budgets(17, &weights).unwrap();
        let total: usize = budgets.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 17);
        // floor allocations: 8 / 5 / 3, remainder 1 -> Dominator gets 9.
        assert_eq!(budgets[0], (Regime::Dominator, 9));
        assert_eq!(budgets[1], (Regime::Chaos, 5));
        assert_eq!(budgets[2], (Regime::FuelMileage, 3));
    }

    #[test]
    fn bad_weights_rejected() {
        assert!(allocate_budgets(10, &Vec::new()).is_err());
        assert!(allocate_budgets(10, &vec![(Regime::Chaos, -1.0)]).is_err());
        assert!(allocate_budgets(10, &vec![(Regime::Chaos, 0.0)]).is_err());
    }
}
