//! Optimize request options and fail-fast validation.

use serde::{Deserialize, Serialize};
use slipstream_algo::{ObjectiveKind, PayoutModel};
use slipstream_core::{SlipResult, SlipstreamError};

fn default_n_scenarios() -> usize {
    10_000
}

fn default_n_lineups() -> usize {
    20
}

fn default_objective() -> ObjectiveKind {
    ObjectiveKind::Cvar
}

fn default_alphas() -> Vec<f64> {
    vec![0.99, 0.95]
}

fn default_weights() -> Vec<f64> {
    vec![0.7, 0.3]
}

fn default_diversity() -> f64 {
    1.0
}

fn default_exposure() -> f64 {
    1.0
}

fn default_lambda() -> f64 {
    1.0
}

fn default_max_total_ownership() -> f64 {
    0.25
}

fn default_min_low_owned() -> usize {
    2
}

fn default_low_threshold() -> f64 {
    10.0
}

fn default_field_size() -> usize {
    1_000
}

fn default_contest_sims() -> usize {
    20
}

fn default_buyin() -> f64 {
    20.0
}

fn default_payout_model() -> PayoutModel {
    PayoutModel::PowerLaw
}

/// Driver/team exposure ceilings as fractions of issued lineups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureOptions {
    #[serde(default = "default_exposure")]
    pub max_driver: f64,
    #[serde(default = "default_exposure")]
    pub max_team: f64,
}

impl Default for ExposureOptions {
    fn default() -> Self {
        Self {
            max_driver: default_exposure(),
            max_team: default_exposure(),
        }
    }
}

/// Where ownership estimates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipMode {
    #[default]
    Off,
    /// Use the slate's `projected_ownership` column.
    Estimated,
    /// Use the request's `ownership` vector.
    Provided,
}

/// Leverage-mode options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    #[serde(default = "default_max_total_ownership")]
    pub max_total_ownership: f64,
    #[serde(default = "default_min_low_owned")]
    pub min_low_ownership_drivers: usize,
    #[serde(default = "default_low_threshold")]
    pub low_ownership_threshold: f64,
}

impl Default for LeverageOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            lambda: default_lambda(),
            max_total_ownership: default_max_total_ownership(),
            min_low_ownership_drivers: default_min_low_owned(),
            low_ownership_threshold: default_low_threshold(),
        }
    }
}

/// Published payout steps plus the curve family to fit over them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayoutConfig {
    #[serde(default = "default_payout_model")]
    pub model: PayoutModel,
    pub ranks: Vec<f64>,
    pub payouts: Vec<f64>,
}

/// Contest-simulation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestSimOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_field_size")]
    pub field_size: usize,
    #[serde(default = "default_contest_sims")]
    pub n_contest_sims: usize,
    #[serde(default = "default_buyin")]
    pub buyin: f64,
    #[serde(default)]
    pub payout: PayoutConfig,
}

impl Default for ContestSimOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            field_size: default_field_size(),
            n_contest_sims: default_contest_sims(),
            buyin: default_buyin(),
            payout: PayoutConfig::default(),
        }
    }
}

/// The full optimize request. All fields but `slate_id` carry defaults, so a
/// minimal request is `{"slate_id": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub slate_id: String,
    #[serde(default = "default_n_scenarios")]
    pub n_scenarios: usize,
    #[serde(default = "default_n_lineups")]
    pub n_lineups: usize,
    #[serde(default = "default_objective")]
    pub objective_type: ObjectiveKind,
    #[serde(default = "default_alphas")]
    pub alphas: Vec<f64>,
    #[serde(default = "default_weights")]
    pub weights: Vec<f64>,
    #[serde(default)]
    pub exposure: ExposureOptions,
    #[serde(default = "default_diversity")]
    pub diversity_weight: f64,
    #[serde(default)]
    pub ownership_mode: OwnershipMode,
    /// Raw ownership vector, required when `ownership_mode` is `provided`.
    #[serde(default)]
    pub ownership: Option<Vec<f64>>,
    #[serde(default)]
    pub leverage: LeverageOptions,
    #[serde(default)]
    pub contest_sim: ContestSimOptions,
    /// Produce the mean-baseline portfolio and the tail-validation block.
    #[serde(default)]
    pub tail_validation: bool,
    /// Calibration metrics passed through to the response untouched.
    #[serde(default)]
    pub calibration: Option<serde_json::Value>,
    #[serde(default)]
    pub seed: u64,
    /// Per-lineup solver limit in seconds; the solver default applies when
    /// absent.
    #[serde(default)]
    pub time_limit_per_lineup_secs: Option<f64>,
    /// Whole-request deadline in seconds.
    #[serde(default)]
    pub request_deadline_secs: Option<f64>,
}

/// Validator floor on scenario counts.
const MIN_SCENARIOS: usize = 1_000;
/// Contract bounds on portfolio size.
const MAX_LINEUPS: usize = 150;

impl OptimizeRequest {
    pub fn new(slate_id: impl Into<String>) -> Self {
        Self {
            slate_id: slate_id.into(),
            n_scenarios: default_n_scenarios(),
            n_lineups: default_n_lineups(),
            objective_type: default_objective(),
            alphas: default_alphas(),
            weights: default_weights(),
            exposure: ExposureOptions::default(),
            diversity_weight: default_diversity(),
            ownership_mode: OwnershipMode::default(),
            ownership: None,
            leverage: LeverageOptions::default(),
            contest_sim: ContestSimOptions::default(),
            tail_validation: false,
            calibration: None,
            seed: 0,
            time_limit_per_lineup_secs: None,
            request_deadline_secs: None,
        }
    }

    /// Fail-fast request validation; every failure here is a 4xx.
    pub fn validate(&self) -> SlipResult<()> {
        if self.slate_id.trim().is_empty() {
            return Err(SlipstreamError::Validation("slate_id is empty".into()));
        }
        if self.n_scenarios < MIN_SCENARIOS {
            return Err(SlipstreamError::Validation(format!(
                "n_scenarios {} below minimum {}",
                self.n_scenarios, MIN_SCENARIOS
            )));
        }
        if self.n_lineups == 0 || self.n_lineups > MAX_LINEUPS {
            return Err(SlipstreamError::Validation(format!(
                "n_lineups {} outside [1, {}]",
                self.n_lineups, MAX_LINEUPS
            )));
        }
        if self.alphas.is_empty() || self.alphas.len() != self.weights.len() {
            return Err(SlipstreamError::Validation(format!(
                "alphas ({}) and weights ({}) must be non-empty and match",
                self.alphas.len(),
                self.weights.len()
            )));
        }
        for alpha in &self.alphas {
            if !(*alpha > 0.0 && *alpha < 1.0) {
                return Err(SlipstreamError::InvalidAlpha(*alpha));
            }
        }
        if self.weights.iter().any(|w| *w < 0.0) {
            return Err(SlipstreamError::Validation(
                "CVaR weights must be non-negative".into(),
            ));
        }
        for limit in [self.exposure.max_driver, self.exposure.max_team] {
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
        if self.ownership_mode == OwnershipMode::Provided && self.ownership.is_none() {
            return Err(SlipstreamError::Validation(
                "ownership_mode=provided requires an ownership vector".into(),
            ));
        }
        if self.leverage.enabled && self.ownership_mode == OwnershipMode::Off {
            return Err(SlipstreamError::Validation(
                "leverage requires ownership_mode=estimated or provided".into(),
            ));
        }
        if self.contest_sim.enabled {
            let cs = &self.contest_sim;
            if cs.field_size < 2 {
                return Err(SlipstreamError::Validation(format!(
                    "contest field_size {} below 2",
                    cs.field_size
                )));
            }
            if cs.n_contest_sims == 0 {
                return Err(SlipstreamError::Validation(
                    "n_contest_sims must be positive".into(),
                ));
            }
            if cs.buyin <= 0.0 {
                return Err(SlipstreamError::Validation(format!(
                    "buyin {} must be positive",
                    cs.buyin
                )));
            }
            if cs.payout.ranks.len() < 2 || cs.payout.ranks.len() != cs.payout.payouts.len() {
                return Err(SlipstreamError::Validation(
                    "payout config needs matching ranks/payouts with at least two steps".into(),
                ));
            }
        }
        Ok(())
    }

    /// `(alpha, weight)` pairs for the objective builder.
    pub fn quantiles(&self) -> Vec<(f64, f64)> {
        self.alphas
            .iter()
            .copied()
            .zip(self.weights.iter().copied())
            .collect()
    }
}
