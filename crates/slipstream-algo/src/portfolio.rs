//! Iterative MILP portfolio generation.
//!
//! The generator produces an ordered set of roster-valid lineups that
//! together target upper-tail outcomes. Each iteration composes one MILP —
//! roster/salary/stacking/lock/exclude constraints, exposure cuts from the
//! portfolio built so far, a soft diversity penalty, and the tail objective —
//! solves it under a time limit, measures tail metrics on the full scenario
//! matrix, and updates the exposure book.
//!
//! State flows strictly forward: lineup j is observed by lineup j+1's
//! exposure and diversity state, and emission order matches solve order.

use good_lp::solvers::highs::highs;
use good_lp::{constraint, variable, variables, Constraint, Expression, Solution, SolverModel, Variable};
use serde::{Deserialize, Serialize};
use slipstream_core::{
    CancelToken, ConstraintSpec, DriverId, ExposureBook, Lineup, Slate, SlipResult,
    SlipstreamError,
};
use slipstream_scenarios::ScenarioMatrix;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::leverage::{leverage_metrics, LeverageMetrics, LeverageSettings};
use crate::objective::{self, default_quantiles};
use crate::solver::{self, SolveStatus, SolverConfig};
use crate::tail::{tail_metrics, TailMetrics};

/// Which objective drives lineup selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Weighted multi-quantile upper-tail CVaR (the tournament objective).
    Cvar,
    /// Per-driver scenario means; the real baseline for tail validation.
    Mean,
}

/// Terminal portfolio state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioStatus {
    Complete,
    /// Truncated by infeasibility, a later-lineup timeout, or the request
    /// deadline; not an error.
    Partial,
    Cancelled,
}

/// Solver bookkeeping for one accepted lineup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRecord {
    pub status: SolveStatus,
    pub solve_time: Duration,
    /// Objective value recomputed from the extracted lineup's scenario
    /// series (weighted tail value for CVaR, mean total for the baseline).
    pub objective_value: f64,
}

/// One emitted lineup with its measured metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioLineup {
    pub lineup: Lineup,
    pub tail: Vec<TailMetrics>,
    pub leverage: Option<LeverageMetrics>,
    pub solve: SolveRecord,
}

/// Ordered lineups plus terminal exposure state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub lineups: Vec<PortfolioLineup>,
    pub exposure: ExposureBook,
    pub status: PortfolioStatus,
    pub objective: ObjectiveKind,
}

impl Portfolio {
    /// Mean pairwise Jaccard overlap across emitted lineups; the response's
    /// correlation summary.
    pub fn mean_pairwise_jaccard(&self) -> f64 {
        let n = self.lineups.len();
        if n < 2 {
            return 0.0;
        }
        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                total += self.lineups[i].lineup.jaccard(&self.lineups[j].lineup);
                pairs += 1;
            }
        }
        total / pairs as f64
    }

    /// Mean of one tail statistic across lineups, selected by quantile.
    pub fn mean_cvar(&self, alpha: f64) -> Option<f64> {
        let values: Vec<f64> = self
            .lineups
            .iter()
            .filter_map(|pl| {
                pl.tail
                    .iter()
                    .find(|m| (m.alpha - alpha).abs() < 1e-9)
                    .map(|m| m.cvar)
            })
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Generator tuning. Exposure limits are fractions of issued lineups;
/// `1.0` disables a cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub n_lineups: usize,
    pub objective: ObjectiveKind,
    /// `(alpha, weight)` pairs for the CVaR objective.
    pub quantiles: Vec<(f64, f64)>,
    /// Quantiles measured on every emitted lineup.
    pub metric_alphas: Vec<f64>,
    pub max_driver_exposure: f64,
    pub max_team_exposure: f64,
    pub diversity_weight: f64,
    pub solver: SolverConfig,
    /// Wall-clock budget for the whole request; remaining lineups are
    /// skipped once it is spent.
    pub request_deadline: Option<Duration>,
    pub seed: u64,
    pub leverage: Option<LeverageSettings>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n_lineups: 20,
            objective: ObjectiveKind::Cvar,
            quantiles: default_quantiles(),
            metric_alphas: vec![0.99, 0.95],
            max_driver_exposure: 1.0,
            max_team_exposure: 1.0,
            diversity_weight: 1.0,
            solver: SolverConfig::default(),
            request_deadline: None,
            seed: 0,
            leverage: None,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> SlipResult<()> {
        if self.n_lineups == 0 {
            return Err(SlipstreamError::Validation(
                "n_lineups must be positive".into(),
            ));
        }
        for (alpha, weight) in &self.quantiles {
            if !(*alpha > 0.0 && *alpha < 1.0) {
                return Err(SlipstreamError::InvalidAlpha(*alpha));
            }
            if *weight < 0.0 {
                return Err(SlipstreamError::Validation(format!(
                    "negative CVaR weight {weight}"
                )));
            }
        }
        for limit in [self.max_driver_exposure, self.max_team_exposure] {
            if !(limit > 0.0 && limit <= 1.0) {
                return Err(SlipstreamError::Validation(format!(
                    "exposure limit {limit} outside (0, 1]"
                )));
            }
        }
        if self.diversity_weight < 0.0 {
            return Err(SlipstreamError::Validation(
                "diversity_weight must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// What one solve produced.
enum SolveOutcome {
    Solved {
        drivers: Vec<DriverId>,
        solve_time: Duration,
    },
    Failed(SolveStatus),
}

/// Iterative lineup generator for one request. Borrows the slate and the
/// constraint spec; owns its config. A request owns exactly one of these,
/// so cross-request parallelism needs no locking here.
pub struct PortfolioGenerator<'a> {
    slate: &'a Slate,
    spec: &'a ConstraintSpec,
    config: GeneratorConfig,
}

impl<'a> PortfolioGenerator<'a> {
    pub fn new(slate: &'a Slate, spec: &'a ConstraintSpec, config: GeneratorConfig) -> Self {
        Self {
            slate,
            spec,
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the portfolio against an already-materialized scenario
    /// matrix. Deterministic under a fixed matrix and config.
    pub fn generate(
        &self,
        matrix: &ScenarioMatrix,
        token: &CancelToken,
    ) -> SlipResult<Portfolio> {
        self.config.validate()?;
        self.spec.validate()?;
        self.slate.validate()?;
        if matrix.n_drivers() != self.slate.len() {
            return Err(SlipstreamError::Validation(format!(
                "scenario columns {} != slate size {}",
                matrix.n_drivers(),
                self.slate.len()
            )));
        }

        let started = Instant::now();
        let mut book = ExposureBook::new();
        let mut lineups: Vec<PortfolioLineup> = Vec::with_capacity(self.config.n_lineups);
        let mut status = PortfolioStatus::Complete;

        for k in 0..self.config.n_lineups {
            if token.is_cancelled() {
                info!(lineup = k, "request cancelled; returning lineups so far");
                status = PortfolioStatus::Cancelled;
                break;
            }
            if let Some(deadline) = self.config.request_deadline {
                if started.elapsed() >= deadline {
                    warn!(lineup = k, "request deadline spent; truncating portfolio");
                    status = PortfolioStatus::Partial;
                    break;
                }
            }

            match self.solve_one(matrix, &book)? {
                SolveOutcome::Solved {
                    drivers,
                    solve_time,
                } => {
                    let lineup = Lineup::new(drivers, self.slate);
                    let series = matrix.lineup_series(&lineup.drivers);
                    let tail =
                        tail_metrics(&series, &self.config.metric_alphas).map_err(SlipstreamError::from)?;
                    let objective_value = self.realized_objective(&series);
                    let leverage = self
                        .config
                        .leverage
                        .as_ref()
                        .map(|settings| leverage_metrics(&lineup, settings, &series));
                    book.record(&lineup, self.slate);
                    debug!(
                        lineup = k,
                        salary = lineup.total_salary,
                        objective = objective_value,
                        "accepted lineup"
                    );
                    lineups.push(PortfolioLineup {
                        lineup,
                        tail,
                        leverage,
                        solve: SolveRecord {
                            status: SolveStatus::Optimal,
                            solve_time,
                            objective_value,
                        },
                    });
                }
                SolveOutcome::Failed(SolveStatus::Infeasible) => {
                    if k == 0 {
                        return Err(SlipstreamError::NoFeasibleLineup(format!(
                            "slate '{}' admits no lineup under the constraint spec",
                            self.slate.slate_id
                        )));
                    }
                    info!(lineup = k, "feasible set exhausted; portfolio is partial");
                    status = PortfolioStatus::Partial;
                    break;
                }
                SolveOutcome::Failed(SolveStatus::Unbounded) => {
                    // The bounded formulation must prevent this.
                    return Err(SlipstreamError::Unbounded(format!(
                        "lineup {k}: slack or threshold bound missing from the tail objective"
                    )));
                }
                SolveOutcome::Failed(SolveStatus::TimeLimit) => {
                    if k == 0 {
                        return Err(SlipstreamError::SolverTimeout(format!(
                            "no incumbent within {:?} on the first lineup",
                            self.config.solver.time_limit
                        )));
                    }
                    warn!(lineup = k, "solver=timeout; truncating portfolio");
                    status = PortfolioStatus::Partial;
                    break;
                }
                SolveOutcome::Failed(SolveStatus::Error(msg)) => {
                    return Err(SlipstreamError::Solver(format!("lineup {k}: {msg}")));
                }
                SolveOutcome::Failed(other) => {
                    return Err(SlipstreamError::Solver(format!(
                        "lineup {k}: unexpected solver status {other:?}"
                    )));
                }
            }
        }

        Ok(Portfolio {
            lineups,
            exposure: book,
            status,
            objective: self.config.objective,
        })
    }

    /// Weighted tail value (or mean total) of an extracted series, recorded
    /// as the realized objective.
    fn realized_objective(&self, series: &[f64]) -> f64 {
        match self.config.objective {
            ObjectiveKind::Mean => series.iter().sum::<f64>() / series.len() as f64,
            ObjectiveKind::Cvar => self
                .config
                .quantiles
                .iter()
                .map(|(alpha, weight)| {
                    crate::tail::cvar(series, *alpha).map(|c| c * weight).unwrap_or(f64::NAN)
                })
                .sum(),
        }
    }

    /// Compose and solve the MILP for the next lineup.
    fn solve_one(&self, matrix: &ScenarioMatrix, book: &ExposureBook) -> SlipResult<SolveOutcome> {
        let rules = &self.spec.roster;
        let mut vars = variables!();

        let x: Vec<Variable> = self
            .slate
            .drivers
            .iter()
            .map(|d| {
                vars.add(
                    variable()
                        .binary()
                        .name(format!("x_{}", d.driver_id.value())),
                )
            })
            .collect();

        let mut constraints: Vec<Constraint> = Vec::new();

        // Roster size.
        let mut roster_expr = Expression::from(0.0);
        for xv in &x {
            roster_expr += *xv;
        }
        constraints.push(constraint!(roster_expr == rules.n_roster as f64));

        // Salary cap.
        let mut salary_expr = Expression::from(0.0);
        for (d, xv) in self.slate.drivers.iter().zip(&x) {
            salary_expr += d.salary as f64 * *xv;
        }
        constraints.push(constraint!(salary_expr <= rules.salary_cap as f64));

        // Semi-continuous team stacking: either zero drivers from a team or
        // between min_stack and max_stack.
        for (t, team) in self.slate.teams().iter().enumerate() {
            let members = self.slate.team_members(team);
            let y = vars.add(variable().binary().name(format!("y_{t}")));
            let mut count = Expression::from(0.0);
            for m in &members {
                count += x[m.value()];
            }
            constraints.push(constraint!(count.clone() <= members.len() as f64 * y));
            constraints.push(constraint!(count.clone() >= rules.min_stack as f64 * y));
            constraints.push(constraint!(count <= rules.max_stack as f64));
        }

        // Locks, excludes, vetoes.
        let locked = &self.spec.drivers.locked;
        for id in locked {
            constraints.push(constraint!(1.0 * x[id.value()] == 1.0));
        }
        for id in self.spec.effective_excludes() {
            constraints.push(constraint!(1.0 * x[id.value()] == 0.0));
        }

        // Exposure cuts from the portfolio built so far. Locked drivers are
        // exempt: a lock guarantees 100% exposure by definition.
        let capped = self.capped_cuts(book, locked);
        for id in &capped {
            constraints.push(constraint!(1.0 * x[id.value()] == 0.0));
        }

        // Objective.
        let mut objective = match self.config.objective {
            ObjectiveKind::Mean => objective::mean_objective(&x, matrix)?,
            ObjectiveKind::Cvar => {
                let (expr, families) = objective::multi_cvar(
                    &mut vars,
                    &x,
                    matrix,
                    &self.config.quantiles,
                    rules.n_roster,
                    "obj",
                )?;
                for family in families {
                    constraints.extend(family.constraints);
                }
                expr
            }
        };

        // Soft diversity penalty: overlap with every previously emitted
        // lineup, i.e. the per-driver usage count.
        if self.config.diversity_weight > 0.0 {
            for d in &self.slate.drivers {
                let count = book.driver_count(d.driver_id);
                if count > 0 {
                    objective -= self.config.diversity_weight * count as f64 * x[d.driver_id.value()];
                }
            }
        }

        // Leverage: ownership penalty plus hard ownership constraints.
        if let Some(settings) = &self.config.leverage {
            let (penalty, lev_constraints) =
                crate::leverage::apply_leverage(&x, settings, rules.n_roster)?;
            objective -= penalty;
            constraints.extend(lev_constraints);
        }

        let mut model = solver::configure(
            vars.maximise(objective).using(highs),
            &self.config.solver,
        );
        for c in constraints {
            model = model.with(c);
        }

        let t0 = Instant::now();
        match model.solve() {
            Ok(solution) => {
                let drivers: Vec<DriverId> = self
                    .slate
                    .drivers
                    .iter()
                    .zip(&x)
                    .filter(|(_, xv)| solution.value(**xv) > 0.5)
                    .map(|(d, _)| d.driver_id)
                    .collect();
                Ok(SolveOutcome::Solved {
                    drivers,
                    solve_time: t0.elapsed(),
                })
            }
            Err(err) => Ok(SolveOutcome::Failed(solver::classify_failure(&err))),
        }
    }

    /// Drivers forced out of the next solve by exposure ceilings. A limit of
    /// 1.0 disables the cap (a driver at 100% exposure is allowed, not cut).
    fn capped_cuts(&self, book: &ExposureBook, locked: &BTreeSet<DriverId>) -> Vec<DriverId> {
        let mut cuts: Vec<DriverId> = if self.config.max_driver_exposure < 1.0 {
            book.capped_drivers(self.slate, self.config.max_driver_exposure)
                .into_iter()
                .filter(|id| !locked.contains(id))
                .collect()
        } else {
            Vec::new()
        };
        if self.config.max_team_exposure < 1.0 {
            for team in book.capped_teams(self.slate, self.config.max_team_exposure) {
                let members = self.slate.team_members(&team);
                if members.iter().any(|id| locked.contains(id)) {
                    continue;
                }
                cuts.extend(members);
            }
        }
        cuts.sort_unstable();
        cuts.dedup();
        cuts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        let mut config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        config.max_driver_exposure = 0.0;
        assert!(config.validate().is_err());
        config.max_driver_exposure = 0.5;
        config.quantiles = vec![(1.2, 0.5)];
        assert!(config.validate().is_err());
        config.quantiles = vec![(0.9, -1.0)];
        assert!(config.validate().is_err());
        config.quantiles = vec![(0.9, 1.0)];
        config.n_lineups = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn portfolio_correlation_summary_empty() {
        let portfolio = Portfolio {
            lineups: Vec::new(),
            exposure: ExposureBook::new(),
            status: PortfolioStatus::Complete,
            objective: ObjectiveKind::Cvar,
        };
        assert_eq!(portfolio.mean_pairwise_jaccard(), 0.0);
        assert_eq!(portfolio.mean_cvar(0.99), None);
    }
}
