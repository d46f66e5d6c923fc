//! The blocking optimize orchestrator.
//!
//! One call runs a full request: scenario materialization through the shared
//! cache, tail-objective portfolio generation, then the optional blocks
//! (tail validation against a real mean baseline, contest equity). Optional
//! steps degrade to typed warnings; only validation failures and fatal
//! generator errors surface as `Err`.

use slipstream_algo::{
    compute_contest_metrics, simulate_portfolio, validate_tail_objective, ContestConfig,
    FieldSampler, FieldSamplerConfig, GeneratorConfig, ObjectiveKind, PayoutCurve, Portfolio,
    PortfolioGenerator, PortfolioStatus, SolverConfig,
};
use slipstream_core::{
    CancelToken, ConstraintSpec, OwnershipVector, Slate, SlipResult, SlipstreamError,
};
use slipstream_scenarios::{CacheKey, ScenarioCache, ScenarioMatrix, ScenarioSource};
use std::time::Duration;
use tracing::{info, warn};

use crate::job::{JobProgress, JobStatus, ProgressSink};
use crate::request::{OptimizeRequest, OwnershipMode};
use crate::response::{
    optional_step, ContestEquity, ExposureView, OptimizeResponse, Section,
};

/// Run one optimize request end to end.
pub fn run_optimize(
    request: &OptimizeRequest,
    slate: &Slate,
    spec: &ConstraintSpec,
    source: &dyn ScenarioSource,
    cache: &ScenarioCache,
    sink: &dyn ProgressSink,
    token: &CancelToken,
) -> SlipResult<OptimizeResponse> {
    request.validate()?;
    slate.validate()?;
    spec.validate()?;

    let progress = JobProgress::new(uuid::Uuid::new_v4().to_string(), sink);
    progress.emit(JobStatus::Running, 0.0, None);

    // Advisory only: the validator floor is 1000, but deep quantiles want
    // more scenarios for at least 100 tail samples.
    for alpha in &request.alphas {
        if let Ok(recommended) = slipstream_algo::adaptive_scenario_count(*alpha, 100) {
            if request.n_scenarios < recommended {
                warn!(
                    alpha,
                    n_scenarios = request.n_scenarios,
                    recommended,
                    "scenario count below the adaptive recommendation for this quantile"
                );
            }
        }
    }

    let ownership = resolve_ownership(request, slate)?;

    // Scenario matrix, shared across every solve of this request and every
    // future request with the same key.
    let key = CacheKey::new(&request.slate_id, request.n_scenarios, request.seed);
    let matrix = match cache.get_or_sample(&key, source, token) {
        Ok(matrix) => matrix,
        Err(SlipstreamError::Cancelled(at)) => {
            info!(%at, "request cancelled before scenario materialization");
            progress.emit(JobStatus::Cancelled, 1.0, None);
            return Ok(empty_response(request, PortfolioStatus::Cancelled));
        }
        Err(err) => return Err(err),
    };
    progress.emit(JobStatus::Running, 0.15, None);

    // Portfolio generation.
    let config = generator_config(request, ownership.clone());
    let generator = PortfolioGenerator::new(slate, spec, config);
    let portfolio = generator.generate(&matrix, token)?;
    progress.emit(JobStatus::Running, 0.75, None);

    // Tail validation: a real mean-optimized baseline on the same matrix.
    let tail_validation = optional_step(
        "tail_validation",
        request.tail_validation && request.objective_type == ObjectiveKind::Cvar,
        || {
            let mut baseline_config = generator_config(request, None);
            baseline_config.objective = ObjectiveKind::Mean;
            let baseline =
                PortfolioGenerator::new(slate, spec, baseline_config).generate(&matrix, token)?;
            validate_tail_objective(&portfolio, &baseline, request.alphas[0])
        },
    );
    progress.emit(JobStatus::Running, 0.85, None);

    let contest_equity = optional_step(
        "contest_equity",
        request.contest_sim.enabled && !portfolio.lineups.is_empty(),
        || {
            contest_equity_block(
                request,
                slate,
                spec,
                &matrix,
                &portfolio,
                ownership.as_ref(),
                token,
            )
        },
    );
    progress.emit(JobStatus::Running, 0.95, None);

    let response = compose_response(
        request,
        slate,
        &portfolio,
        contest_equity,
        tail_validation,
    );
    let final_status = match portfolio.status {
        PortfolioStatus::Cancelled => JobStatus::Cancelled,
        _ => JobStatus::Complete,
    };
    progress.emit(final_status, 1.0, None);
    Ok(response)
}

fn generator_config(
    request: &OptimizeRequest,
    ownership: Option<OwnershipVector>,
) -> GeneratorConfig {
    let mut solver = SolverConfig::default();
    if let Some(secs) = request.time_limit_per_lineup_secs {
        solver.time_limit = Duration::from_secs_f64(secs.max(0.1));
    }
    let leverage = if request.leverage.enabled {
        ownership.map(|own| slipstream_algo::LeverageSettings {
            lambda: request.leverage.lambda,
            max_total_ownership: request.leverage.max_total_ownership,
            min_low_ownership_drivers: request.leverage.min_low_ownership_drivers,
            low_ownership_threshold: request.leverage.low_ownership_threshold,
            ownership: own,
        })
    } else {
        None
    };
    GeneratorConfig {
        n_lineups: request.n_lineups,
        objective: request.objective_type,
        quantiles: request.quantiles(),
        metric_alphas: request.alphas.clone(),
        max_driver_exposure: request.exposure.max_driver,
        max_team_exposure: request.exposure.max_team,
        diversity_weight: request.diversity_weight,
        solver,
        request_deadline: request
            .request_deadline_secs
            .map(Duration::from_secs_f64),
        seed: request.seed,
        leverage,
    }
}

/// Ownership resolution per the request mode; `Off` resolves to `None`.
fn resolve_ownership(
    request: &OptimizeRequest,
    slate: &Slate,
) -> SlipResult<Option<OwnershipVector>> {
    match request.ownership_mode {
        OwnershipMode::Off => Ok(None),
        OwnershipMode::Provided => {
            let raw = request
                .ownership
                .clone()
                .ok_or_else(|| {
                    SlipstreamError::Validation("ownership vector missing".into())
                })?;
            if raw.len() != slate.len() {
                return Err(SlipstreamError::Validation(format!(
                    "ownership length {} != slate size {}",
                    raw.len(),
                    slate.len()
                )));
            }
            OwnershipVector::new(raw).map(Some)
        }
        OwnershipMode::Estimated => {
            // Drivers without an estimate get a uniform share.
            let uniform = 100.0 / slate.len() as f64;
            let raw: Vec<f64> = slate
                .drivers
                .iter()
                .map(|d| d.projected_ownership.unwrap_or(uniform))
                .collect();
            OwnershipVector::new(raw).map(Some)
        }
    }
}

fn contest_equity_block(
    request: &OptimizeRequest,
    slate: &Slate,
    spec: &ConstraintSpec,
    matrix: &ScenarioMatrix,
    portfolio: &Portfolio,
    ownership: Option<&OwnershipVector>,
    token: &CancelToken,
) -> SlipResult<ContestEquity> {
    let field_ownership = match ownership {
        Some(own) => own.clone(),
        None => {
            warn!("contest sim without ownership; sampling a uniform field");
            OwnershipVector::uniform(slate.len())?
        }
    };
    let salaries: Vec<u32> = slate.drivers.iter().map(|d| d.salary).collect();
    let sampler = FieldSampler::new(
        &field_ownership,
        salaries,
        spec.roster.salary_cap,
        spec.roster.n_roster,
        FieldSamplerConfig::default(),
    )?;

    let mut curve = PayoutCurve::new(request.contest_sim.payout.model);
    curve.fit(
        &request.contest_sim.payout.ranks,
        &request.contest_sim.payout.payouts,
    )?;

    let contest_config = ContestConfig {
        field_size: request.contest_sim.field_size,
        n_contest_sims: request.contest_sim.n_contest_sims,
        buyin: request.contest_sim.buyin,
        ..ContestConfig::default()
    };
    let series: Vec<Vec<f64>> = portfolio
        .lineups
        .iter()
        .map(|pl| matrix.lineup_series(&pl.lineup.drivers))
        .collect();
    let per_lineup_results = simulate_portfolio(
        &series,
        matrix,
        &sampler,
        &curve,
        &contest_config,
        request.seed,
        token,
    )?;

    let mut per_lineup = Vec::with_capacity(per_lineup_results.len());
    let mut pooled = Vec::new();
    for (l, results) in per_lineup_results.iter().enumerate() {
        per_lineup.push(compute_contest_metrics(
            results,
            contest_config.buyin,
            request.seed.wrapping_add(l as u64),
        )?);
        pooled.extend(results.iter().cloned());
    }
    let portfolio_metrics =
        compute_contest_metrics(&pooled, contest_config.buyin, request.seed)?;

    Ok(ContestEquity {
        per_lineup,
        portfolio: portfolio_metrics,
    })
}

fn compose_response(
    request: &OptimizeRequest,
    slate: &Slate,
    portfolio: &Portfolio,
    contest_equity: Section<ContestEquity>,
    tail_validation: Section<slipstream_algo::TailValidation>,
) -> OptimizeResponse {
    let lineups = portfolio
        .lineups
        .iter()
        .map(|pl| OptimizeResponse::lineup_view(slate, pl))
        .collect();
    let exposures = slate
        .drivers
        .iter()
        .filter_map(|d| {
            let count = portfolio.exposure.driver_count(d.driver_id);
            if count == 0 {
                None
            } else {
                Some(ExposureView {
                    display_id: d.display_id.clone(),
                    name: d.name.clone(),
                    count,
                    fraction: portfolio.exposure.exposure(d.driver_id),
                })
            }
        })
        .collect();
    let calibration = match &request.calibration {
        Some(value) => Section::Ready(value.clone()),
        None => Section::Disabled,
    };
    OptimizeResponse {
        slate_id: request.slate_id.clone(),
        status: portfolio.status,
        objective: portfolio.objective,
        seed: request.seed,
        lineups,
        exposures,
        correlation: portfolio.mean_pairwise_jaccard(),
        contest_equity,
        tail_validation,
        calibration,
    }
}

fn empty_response(request: &OptimizeRequest, status: PortfolioStatus) -> OptimizeResponse {
    OptimizeResponse {
        slate_id: request.slate_id.clone(),
        status,
        objective: request.objective_type,
        seed: request.seed,
        lineups: Vec::new(),
        exposures: Vec::new(),
        correlation: 0.0,
        contest_equity: Section::Disabled,
        tail_validation: Section::Disabled,
        calibration: Section::Disabled,
    }
}
