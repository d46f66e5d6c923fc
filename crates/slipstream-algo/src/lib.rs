//! # slipstream-algo: Tail-Objective Lineup Optimization
//!
//! This crate provides the optimization and analytics algorithms of the
//! slipstream portfolio optimizer: tail metrics over scenario outcomes, MILP
//! objective builders, the iterative portfolio generator, and the
//! contest-equity layer.
//!
//! ## Pipeline
//!
//! | Stage | Module | Responsibility |
//! |-------|--------|----------------|
//! | Tail metrics | [`tail`] | VaR / CVaR / top-X% over a point vector via top-k selection |
//! | Objective builders | [`objective`] | Bounded upper-tail CVaR (Rockafellar-Uryasev slack form) over binary selectors |
//! | Portfolio generator | [`portfolio`] | Iterative MILP solves with exposure, stacking, and diversity state |
//! | Payout curve | [`payout`] | Parametric rank→payout fits (power-law, exponential, piecewise, hybrid) |
//! | Field sampler | [`field`] | Opponent lineups drawn from a perturbed ownership distribution |
//! | Contest simulator | [`contest`] | Monte-Carlo rank → payout under a fitted curve |
//! | Contest metrics | [`metrics`] | ROI / cash% / win% with bootstrap confidence intervals |
//! | Leverage | [`leverage`] | Ownership-aware penalties, constraints, and per-lineup metrics |
//! | Regimes | [`regime`] | Race-flow classification and per-regime lineup budgets |
//! | Validation | [`stability`], [`validation`] | Bootstrap tail stability and the CVaR-vs-mean harness |
//!
//! ## The bounded upper-tail CVaR objective
//!
//! Tournament equity lives in the upper tail, so the primary objective is
//! the mean of the best `(1-α)` fraction of scenario outcomes, linearized
//! with an auxiliary threshold `ζ` and per-scenario excess slacks `u_k`:
//!
//! ```text
//! maximize   ζ + 1/((1-α)·S) · Σ_k u_k
//! subject to u_k ≥ p_k(x) − ζ,   0 ≤ u_k ≤ R·(max_cell − min_cell)
//!            R·min_cell ≤ ζ ≤ R·max_cell
//! ```
//!
//! The explicit upper bound on `u_k` is mandatory: without it the LP is
//! unbounded under maximization (see the regression tests).
//!
//! ## Example
//!
//! ```ignore
//! use slipstream_algo::{GeneratorConfig, ObjectiveKind, PortfolioGenerator};
//!
//! let config = GeneratorConfig {
//!     n_lineups: 20,
//!     objective: ObjectiveKind::Cvar,
//!     ..GeneratorConfig::default()
//! };
//! let generator = PortfolioGenerator::new(&slate, &spec, config);
//! let portfolio = generator.generate(&matrix, &token)?;
//! println!("{} lineups, status {:?}", portfolio.lineups.len(), portfolio.status);
//! ```

pub mod contest;
pub mod field;
pub mod leverage;
pub mod metrics;
pub mod objective;
pub mod payout;
pub mod portfolio;
pub mod regime;
pub mod solver;
pub mod stability;
pub mod tail;
pub mod validation;

pub use contest::{simulate_contest, simulate_portfolio, ContestConfig, ContestResult, TiePolicy};
pub use field::{FieldLineup, FieldSampler, FieldSamplerConfig};
pub use leverage::{leverage_metrics, LeverageMetrics, LeverageSettings};
pub use metrics::{compute_contest_metrics, ContestMetrics};
pub use objective::{
    default_quantiles, mean_objective, multi_cvar, shortfall_cvar, upper_tail_cvar, CvarAux,
};
pub use payout::{PayoutCurve, PayoutModel};
pub use portfolio::{
    GeneratorConfig, ObjectiveKind, Portfolio, PortfolioGenerator, PortfolioLineup,
    PortfolioStatus, SolveRecord,
};
pub use regime::{
    allocate_budgets, generate_regime_portfolios, partition_by_regime, Regime, RegimeClassifier,
    RegimeWeights, VarianceDominanceClassifier,
};
pub use solver::{SolveStatus, SolverConfig};
pub use stability::{validate_tail_stability, BootstrapOutcome, StabilityReport};
pub use tail::{
    adaptive_scenario_count, conditional_upside, cvar, tail_metrics, tail_percent_label,
    top_x_pct, var_q, TailError, TailMetrics,
};
pub use validation::{validate_tail_objective, TailValidation};
