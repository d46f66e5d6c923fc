//! Optimize response shapes.
//!
//! Optional pipeline blocks use [`Section`] so a reader can always tell
//! "omitted because off" from "absent because errored": a failed optional
//! step degrades to `errored` with a warning string, never to a silent null,
//! and never blocks the overall response.

use serde::{Deserialize, Serialize};
use slipstream_algo::{
    ContestMetrics, LeverageMetrics, ObjectiveKind, PortfolioStatus, SolveRecord, TailMetrics,
    TailValidation,
};
use slipstream_core::{SlipResult, Slate};
use tracing::warn;

/// An optional response block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Section<T> {
    /// The feature was not requested.
    Disabled,
    Ready(T),
    /// The step was requested but failed; the pipeline carried on.
    Errored { warning: String },
}

impl<T> Section<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Section::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Run an optional pipeline step: disabled steps short-circuit, failures are
/// logged and carried as typed warnings.
pub fn optional_step<T>(
    step: &str,
    enabled: bool,
    f: impl FnOnce() -> SlipResult<T>,
) -> Section<T> {
    if !enabled {
        return Section::Disabled;
    }
    match f() {
        Ok(value) => Section::Ready(value),
        Err(err) => {
            warn!(step, error = %err, "optional pipeline step failed; omitting block");
            Section::Errored {
                warning: err.to_string(),
            }
        }
    }
}

/// One driver slot in an exported lineup view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverView {
    pub driver_id: usize,
    pub display_id: String,
    pub name: String,
    pub team: String,
    pub salary: u32,
}

/// One lineup with its metrics, name-resolved for the export boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupView {
    pub drivers: Vec<DriverView>,
    pub total_salary: u32,
    pub tail: Vec<TailMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<LeverageMetrics>,
    pub solve: SolveRecord,
}

/// Contest-equity block: per-lineup metrics plus the pooled portfolio view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestEquity {
    pub per_lineup: Vec<ContestMetrics>,
    pub portfolio: ContestMetrics,
}

/// Per-driver exposure row for the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureView {
    pub display_id: String,
    pub name: String,
    pub count: usize,
    pub fraction: f64,
}

/// The optimize response. Truncation is success: a `partial` status ships
/// with the lineups produced, and hard failures never reach this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub slate_id: String,
    pub status: PortfolioStatus,
    pub objective: ObjectiveKind,
    pub seed: u64,
    pub lineups: Vec<LineupView>,
    pub exposures: Vec<ExposureView>,
    /// Mean pairwise Jaccard overlap across the portfolio.
    pub correlation: f64,
    pub contest_equity: Section<ContestEquity>,
    pub tail_validation: Section<TailValidation>,
    /// Calibration metrics passed through from the request pipeline.
    pub calibration: Section<serde_json::Value>,
}

impl OptimizeResponse {
    /// Resolve a portfolio lineup into its name-level view.
    pub fn lineup_view(
        slate: &Slate,
        lineup: &slipstream_algo::PortfolioLineup,
    ) -> LineupView {
        let drivers = lineup
            .lineup
            .drivers
            .iter()
            .map(|id| match slate.driver(*id) {
                Some(d) => DriverView {
                    driver_id: d.driver_id.value(),
                    display_id: d.display_id.clone(),
                    name: d.name.clone(),
                    team: d.team.clone(),
                    salary: d.salary,
                },
                None => DriverView {
                    driver_id: id.value(),
                    display_id: String::new(),
                    name: "Unknown".into(),
                    team: String::new(),
                    salary: 0,
                },
            })
            .collect();
        LineupView {
            drivers,
            total_salary: lineup.lineup.total_salary,
            tail: lineup.tail.clone(),
            leverage: lineup.leverage.clone(),
            solve: lineup.solve.clone(),
        }
    }
}
