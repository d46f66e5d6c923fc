//! Parametric rank → payout curves.
//!
//! GPP payout tables are published as a handful of (rank, payout) steps; the
//! contest simulator needs a payout at *every* rank, so we fit a parametric
//! curve and predict from it. Four model families:
//!
//! - `PowerLaw`:    `a·r^(−b)` — the usual GPP shape
//! - `Exponential`: `a·e^(−b·r)` — steeper decay for top-heavy structures
//! - `PiecewiseLinear`: exact interpolation with endpoint extrapolation
//! - `Hybrid`: power-law up to a fitted cutoff rank `c`, then the tangent
//!   line at `c` (continuous and differentiable at the joint by
//!   construction)
//!
//! Parametric fits are nonlinear least squares via Nelder-Mead over
//! **log-parameters**, which enforces the positivity bounds without a
//! constrained solver. The initial guess is deterministic, derived from
//! `payouts[0]` and a typical exponent near one, so fits are reproducible.

use argmin::core::{CostFunction, Executor, State};
use argmin::solver::neldermead::NelderMead;
use serde::{Deserialize, Serialize};
use slipstream_core::{SlipResult, SlipstreamError};

/// Model family for a payout curve.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutModel {
    #[default]
    PowerLaw,
    Exponential,
    PiecewiseLinear,
    Hybrid,
}

/// Fitted state: positive parameters plus fit diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Fitted {
    /// Model parameters. Power-law/exponential: `[a, b]`; hybrid:
    /// `[a, b, c]`; piecewise: empty (points are stored separately).
    params: Vec<f64>,
    /// Sorted (rank, payout) support for the piecewise model.
    points: Vec<(f64, f64)>,
    rmse: f64,
    r2: f64,
}

/// A fitted rank → payout function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutCurve {
    pub model: PayoutModel,
    fitted: Option<Fitted>,
}

impl PayoutCurve {
    pub fn new(model: PayoutModel) -> Self {
        Self {
            model,
            fitted: None,
        }
    }

    /// Fit the curve to observed (rank, payout) pairs.
    pub fn fit(&mut self, ranks: &[f64], payouts: &[f64]) -> SlipResult<()> {
        if ranks.len() != payouts.len() {
            return Err(SlipstreamError::Validation(format!(
                "rank/payout length mismatch: {} vs {}",
                ranks.len(),
                payouts.len()
            )));
        }
        if ranks.len() < 2 {
            return Err(SlipstreamError::Validation(
                "payout fit needs at least two observations".into(),
            ));
        }
        for (r, p) in ranks.iter().zip(payouts) {
            if *r < 1.0 || !r.is_finite() || !p.is_finite() || *p < 0.0 {
                return Err(SlipstreamError::Validation(format!(
                    "invalid payout observation (rank {r}, payout {p})"
                )));
            }
        }

        let fitted = match self.model {
            PayoutModel::PiecewiseLinear => fit_piecewise(ranks, payouts),
            parametric => fit_parametric(parametric, ranks, payouts)?,
        };
        self.fitted = Some(fitted);
        Ok(())
    }

    /// Payout at an integer rank, clamped to be non-negative.
    pub fn predict(&self, rank: usize) -> SlipResult<f64> {
        let fitted = self.fitted.as_ref().ok_or(SlipstreamError::NotFitted)?;
        let r = rank.max(1) as f64;
        let value = match self.model {
            PayoutModel::PowerLaw => eval_power_law(&fitted.params, r),
            PayoutModel::Exponential => eval_exponential(&fitted.params, r),
            PayoutModel::Hybrid => eval_hybrid(&fitted.params, r),
            PayoutModel::PiecewiseLinear => eval_piecewise(&fitted.points, r),
        };
        Ok(value.max(0.0))
    }

    pub fn rmse(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.rmse)
    }

    pub fn r2(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.r2)
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn eval_power_law(params: &[f64], r: f64) -> f64 {
    params[0] * r.powf(-params[1])
}

fn eval_exponential(params: &[f64], r: f64) -> f64 {
    params[0] * (-params[1] * r).exp()
}

/// Power-law for `r ≤ c`; tangent-matched linear extension beyond.
fn eval_hybrid(params: &[f64], r: f64) -> f64 {
    let (a, b, c) = (params[0], params[1], params[2]);
    if r <= c {
        a * r.powf(-b)
    } else {
        let at_c = a * c.powf(-b);
        let slope = -a * b * c.powf(-b - 1.0);
        at_c + slope * (r - c)
    }
}

fn eval_piecewise(points: &[(f64, f64)], r: f64) -> f64 {
    debug_assert!(!points.is_empty());
    if points.len() == 1 {
        return points[0].1;
    }
    // Find the bracketing segment; extrapolate with the end segments.
    let (lo, hi) = match points.iter().position(|(rank, _)| *rank >= r) {
        Some(0) => (points[0], points[1]),
        Some(i) => (points[i - 1], points[i]),
        None => (points[points.len() - 2], points[points.len() - 1]),
    };
    let (r0, p0) = lo;
    let (r1, p1) = hi;
    if (r1 - r0).abs() < f64::EPSILON {
        return p0;
    }
    p0 + (p1 - p0) * (r - r0) / (r1 - r0)
}

fn fit_piecewise(ranks: &[f64], payouts: &[f64]) -> Fitted {
    let mut points: Vec<(f64, f64)> = ranks.iter().copied().zip(payouts.iter().copied()).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    // The interpolant passes through every observation.
    Fitted {
        params: Vec::new(),
        points,
        rmse: 0.0,
        r2: 1.0,
    }
}

/// Sum-of-squares residual over log-parameters; exponentiation enforces the
/// positivity bounds.
struct CurveFitProblem<'a> {
    model: PayoutModel,
    ranks: &'a [f64],
    payouts: &'a [f64],
}

impl CurveFitProblem<'_> {
    fn residual_sse(&self, params: &[f64]) -> f64 {
        self.ranks
            .iter()
            .zip(self.payouts)
            .map(|(r, p)| {
                let predicted = match self.model {
                    PayoutModel::PowerLaw => eval_power_law(params, *r),
                    PayoutModel::Exponential => eval_exponential(params, *r),
                    PayoutModel::Hybrid => eval_hybrid(params, *r),
                    PayoutModel::PiecewiseLinear => unreachable!("piecewise is not parametric"),
                };
                (predicted - p).powi(2)
            })
            .sum()
    }
}

impl CostFunction for CurveFitProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, log_params: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let params: Vec<f64> = log_params.iter().map(|p| p.exp()).collect();
        let sse = self.residual_sse(&params);
        if sse.is_finite() {
            Ok(sse)
        } else {
            Ok(f64::MAX)
        }
    }
}

fn fit_parametric(model: PayoutModel, ranks: &[f64], payouts: &[f64]) -> SlipResult<Fitted> {
    // Deterministic seeded guess: a from the top payout, exponent near 1.
    let a0 = payouts[0].max(1e-6);
    let max_rank = ranks.iter().copied().fold(1.0, f64::max);
    let initial: Vec<f64> = match model {
        PayoutModel::PowerLaw => vec![a0.ln(), 0.0],
        // Exponential decay rates live well below 1 for realistic fields.
        PayoutModel::Exponential => vec![a0.ln(), (1.0 / max_rank.max(2.0)).ln()],
        PayoutModel::Hybrid => vec![a0.ln(), 0.0, (max_rank * 0.25).max(2.0).ln()],
        PayoutModel::PiecewiseLinear => unreachable!("piecewise is not parametric"),
    };

    // Initial simplex: the guess plus one 0.5-step perturbation per axis.
    let mut simplex = vec![initial.clone()];
    for i in 0..initial.len() {
        let mut vertex = initial.clone();
        vertex[i] += 0.5;
        simplex.push(vertex);
    }

    let problem = CurveFitProblem {
        model,
        ranks,
        payouts,
    };
    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex);
    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(500))
        .run()
        .map_err(|e| SlipstreamError::CurveFit(format!("{model:?}: {e}")))?;

    let best_log = result
        .state()
        .get_best_param()
        .cloned()
        .ok_or_else(|| SlipstreamError::CurveFit(format!("{model:?}: no best parameter")))?;
    let best_cost = result.state().get_best_cost();
    if !best_cost.is_finite() {
        return Err(SlipstreamError::CurveFit(format!(
            "{model:?}: fit did not converge (cost {best_cost})"
        )));
    }

    let params: Vec<f64> = best_log.iter().map(|p| p.exp()).collect();
    let n = ranks.len() as f64;
    let rmse = (best_cost / n).sqrt();
    let mean = payouts.iter().sum::<f64>() / n;
    let sst: f64 = payouts.iter().map(|p| (p - mean).powi(2)).sum();
    let r2 = if sst > 0.0 { 1.0 - best_cost / sst } else { 1.0 };

    Ok(Fitted {
        params,
        points: Vec::new(),
        rmse,
        r2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A 100-entry GPP-ish payout table following a power law.
    fn power_table() -> (Vec<f64>, Vec<f64>) {
        let ranks: Vec<f64> = (1..=25).map(|r| r as f64).collect();
        let payouts: Vec<f64> = ranks.iter().map(|r| 500.0 * r.powf(-0.8)).collect();
        (ranks, payouts)
    }

    #[test]
    fn predict_before_fit_fails() {
        let curve = PayoutCurve::new(PayoutModel::PowerLaw);
        assert!(matches!(
            curve.predict(1),
            Err(SlipstreamError::NotFitted)
        ));
    }

    #[test]
    fn power_law_recovers_parameters() {
        let (ranks, payouts) = power_table();
        let mut curve = PayoutCurve::new(PayoutModel::PowerLaw);
        curve.fit(&ranks, &payouts).unwrap();
        assert!(curve.rmse().unwrap() < 1.0, "rmse {:?}", curve.rmse());
        assert!(curve.r2().unwrap() > 0.99);
        let p1 = curve.predict(1).unwrap();
        assert!((p1 - 500.0).abs() < 10.0, "p1 = {p1}");
    }

    #[test]
    fn predictions_are_non_negative() {
        let (ranks, payouts) = power_table();
        for model in [
            PayoutModel::PowerLaw,
            PayoutModel::Exponential,
            PayoutModel::PiecewiseLinear,
            PayoutModel::Hybrid,
        ] {
            let mut curve = PayoutCurve::new(model);
            curve.fit(&ranks, &payouts).unwrap();
            for rank in [1, 5, 50, 5_000] {
                let p = curve.predict(rank).unwrap();
                assert!(p >= 0.0, "{model:?} rank {rank} -> {p}");
                assert!(p.is_finite());
            }
        }
    }

    #[test]
    fn piecewise_interpolates_exactly() {
        let ranks = vec![1.0, 10.0, 100.0];
        let payouts = vec![1000.0, 100.0, 10.0];
        let mut curve = PayoutCurve::new(PayoutModel::PiecewiseLinear);
        curve.fit(&ranks, &payouts).unwrap();
        assert_relative_eq!(curve.predict(10).unwrap(), 100.0);
        // Midpoint of the second segment.
        assert_relative_eq!(curve.predict(55).unwrap(), 55.0);
        assert_eq!(curve.rmse(), Some(0.0));
    }

    #[test]
    fn hybrid_is_continuous_at_cutoff() {
        let (ranks, payouts) = power_table();
        let mut curve = PayoutCurve::new(PayoutModel::Hybrid);
        curve.fit(&ranks, &payouts).unwrap();
        let fitted = curve.fitted.as_ref().unwrap();
        let c = fitted.params[2];
        let just_below = eval_hybrid(&fitted.params, c - 1e-9);
        let just_above = eval_hybrid(&fitted.params, c + 1e-9);
        assert!((just_below - just_above).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_observations() {
        let mut curve = PayoutCurve::new(PayoutModel::PowerLaw);
        assert!(curve.fit(&[1.0], &[100.0]).is_err());
        assert!(curve.fit(&[1.0, 2.0], &[100.0]).is_err());
        assert!(curve.fit(&[0.0, 2.0], &[100.0, 50.0]).is_err());
        assert!(curve.fit(&[1.0, 2.0], &[-5.0, 50.0]).is_err());
    }
}
