//! Solver backend configuration and status mapping.
//!
//! One site owns every backend-specific call so the rest of the generator
//! speaks only [`SolveStatus`]. HiGHS is the backend: the roster selectors
//! are binary, which rules out LP-relaxation-only solvers.

use good_lp::solvers::highs::HighsProblem;
use good_lp::ResolutionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome classes the generator distinguishes. `Feasible` is reserved for
/// an incumbent accepted at a limit; the good_lp surface currently returns
/// solutions only on proven optimality, so `Optimal` is the common success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unbounded,
    TimeLimit,
    Error(String),
}

impl SolveStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::TimeLimit => "timeout",
            SolveStatus::Error(_) => "error",
        }
    }
}

/// Per-solve configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Wall-clock limit per lineup solve.
    pub time_limit: Duration,
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(30),
            verbose: false,
        }
    }
}

/// Apply solver options to an assembled HiGHS model.
pub fn configure(problem: HighsProblem, config: &SolverConfig) -> HighsProblem {
    let mut problem = problem.set_time_limit(config.time_limit.as_secs_f64());
    problem.set_verbose(config.verbose);
    problem
}

/// Classify a good_lp resolution failure.
pub fn classify_failure(err: &ResolutionError) -> SolveStatus {
    match err {
        ResolutionError::Unbounded => SolveStatus::Unbounded,
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        other => {
            let msg = other.to_string();
            if msg.to_ascii_lowercase().contains("time") {
                SolveStatus::TimeLimit
            } else {
                SolveStatus::Error(msg)
            }
        }
    }
}
