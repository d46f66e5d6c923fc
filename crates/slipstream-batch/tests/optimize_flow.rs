//! End-to-end optimize-flow tests: cache reuse across identical requests,
//! response shape, optional blocks, and job progress.

use slipstream_algo::PortfolioStatus;
use slipstream_batch::{
    run_optimize, JobStatus, MemorySink, OptimizeRequest, OwnershipMode, Section,
};
use slipstream_core::{CancelToken, ConstraintSpec, DriverId, DriverRecord, Slate};
use slipstream_scenarios::{ScenarioCache, ScenarioMatrix, ScenarioSource};
use slipstream_core::SlipResult;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic source that counts sample calls.
struct CountingSource {
    calls: AtomicUsize,
    n_drivers: usize,
}

impl CountingSource {
    fn new(n_drivers: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            n_drivers,
        }
    }
}

impl ScenarioSource for CountingSource {
    fn sample(&self, n_scenarios: usize, seed: u64) -> SlipResult<ScenarioMatrix> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Deterministic pseudo-random points in [20, 52), varied per driver
        // and scenario so tails are not degenerate.
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
        let mut data = Vec::with_capacity(n_scenarios * self.n_drivers);
        for _ in 0..n_scenarios {
            for _ in 0..self.n_drivers {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let unit = ((state >> 33) & 0xFFFF) as f64 / 65536.0;
                data.push(20.0 + 32.0 * unit);
            }
        }
        ScenarioMatrix::from_rows(data, n_scenarios, self.n_drivers)
    }

    fn n_drivers(&self) -> usize {
        self.n_drivers
    }
}

fn test_slate() -> Slate {
    let mut drivers = Vec::new();
    for t in 0..4 {
        for j in 0..3 {
            let i = t * 3 + j;
            drivers.push(DriverRecord {
                driver_id: DriverId::new(i),
                display_id: format!("dk-{i}"),
                name: format!("Driver {i}"),
                team: format!("Team {t}"),
                salary: 6_500 + 250 * (i as u32 % 7),
                projected_points: 28.0 + i as f64,
                skill: 0.4,
                recent_form: 0.0,
                track_archetype: Default::default(),
                projected_ownership: Some(4.0 + i as f64 * 1.5),
            });
        }
    }
    Slate::new("flow-slate", drivers)
}

fn base_request() -> OptimizeRequest {
    let mut request = OptimizeRequest::new("flow-slate");
    request.n_scenarios = 1_000;
    request.n_lineups = 2;
    request.seed = 17;
    request
}

#[test]
fn identical_requests_reuse_the_scenario_matrix() {
    let slate = test_slate();
    let spec = ConstraintSpec::default();
    let source = CountingSource::new(slate.len());
    let cache = ScenarioCache::with_defaults();
    let sink = MemorySink::new();
    let token = CancelToken::new();
    let request = base_request();

    let first = run_optimize(&request, &slate, &spec, &source, &cache, &sink, &token).unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let second = run_optimize(&request, &slate, &spec, &source, &cache, &sink, &token).unwrap();
    // The second identical request must not sample again.
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    // Same seed, same matrix: byte-identical lineup sets.
    let ids = |r: &slipstream_batch::OptimizeResponse| -> Vec<Vec<usize>> {
        r.lineups
            .iter()
            .map(|l| l.drivers.iter().map(|d| d.driver_id).collect())
            .collect()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn response_carries_metrics_exposures_and_progress() {
    let slate = test_slate();
    let spec = ConstraintSpec::default();
    let source = CountingSource::new(slate.len());
    let cache = ScenarioCache::with_defaults();
    let sink = MemorySink::new();
    let token = CancelToken::new();
    let request = base_request();

    let response =
        run_optimize(&request, &slate, &spec, &source, &cache, &sink, &token).unwrap();
    assert_eq!(response.status, PortfolioStatus::Complete);
    assert_eq!(response.lineups.len(), 2);
    for lineup in &response.lineups {
        assert_eq!(lineup.drivers.len(), 6);
        assert!(lineup.total_salary <= 50_000);
        let labels: Vec<&str> = lineup.tail.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["top_1pct", "top_5pct"]);
    }
    assert!(!response.exposures.is_empty());
    assert!((0.0..=1.0).contains(&response.correlation));
    // Optional blocks default to disabled, not errored.
    assert!(matches!(response.contest_equity, Section::Disabled));
    assert!(matches!(response.tail_validation, Section::Disabled));
    assert!(matches!(response.calibration, Section::Disabled));

    let updates = sink.updates();
    assert!(updates.len() >= 3);
    assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert_eq!(updates.last().unwrap().status, JobStatus::Complete);
    assert_eq!(updates.last().unwrap().progress, 1.0);
}

#[test]
fn contest_and_validation_blocks_populate_when_enabled() {
    let slate = test_slate();
    let spec = ConstraintSpec::default();
    let source = CountingSource::new(slate.len());
    let cache = ScenarioCache::with_defaults();
    let sink = MemorySink::new();
    let token = CancelToken::new();

    let mut request = base_request();
    request.ownership_mode = OwnershipMode::Estimated;
    request.tail_validation = true;
    request.contest_sim.enabled = true;
    request.contest_sim.field_size = 25;
    request.contest_sim.n_contest_sims = 2;
    request.contest_sim.payout.ranks = vec![1.0, 5.0, 10.0, 25.0];
    request.contest_sim.payout.payouts = vec![100.0, 40.0, 20.0, 0.0];
    request.calibration = Some(serde_json::json!({"brier": 0.12}));

    let response =
        run_optimize(&request, &slate, &spec, &source, &cache, &sink, &token).unwrap();

    match &response.contest_equity {
        Section::Ready(equity) => {
            assert_eq!(equity.per_lineup.len(), response.lineups.len());
            for metrics in &equity.per_lineup {
                assert!((0.0..=1.0).contains(&metrics.cash_rate));
                assert!((0.0..=1.0).contains(&metrics.win_rate));
                assert!(metrics.roi_ci.0 <= metrics.roi_pct);
                assert!(metrics.roi_pct <= metrics.roi_ci.1);
            }
            assert!(equity.portfolio.n_results > 0);
        }
        other => panic!("expected contest equity, got {other:?}"),
    }
    match &response.tail_validation {
        Section::Ready(v) => {
            assert!((v.alpha - 0.99).abs() < 1e-9);
            assert!(v.cvar_portfolio.is_finite());
            assert!(v.mean_baseline.is_finite());
        }
        other => panic!("expected tail validation, got {other:?}"),
    }
    match &response.calibration {
        Section::Ready(value) => assert_eq!(value["brier"], 0.12),
        other => panic!("expected calibration passthrough, got {other:?}"),
    }
}

#[test]
fn leverage_mode_produces_leverage_metrics() {
    let slate = test_slate();
    let spec = ConstraintSpec::default();
    let source = CountingSource::new(slate.len());
    let cache = ScenarioCache::with_defaults();
    let sink = MemorySink::new();
    let token = CancelToken::new();

    let mut request = base_request();
    request.ownership_mode = OwnershipMode::Estimated;
    request.leverage.enabled = true;
    request.leverage.max_total_ownership = 0.5;
    request.leverage.min_low_ownership_drivers = 1;

    let response =
        run_optimize(&request, &slate, &spec, &source, &cache, &sink, &token).unwrap();
    assert!(!response.lineups.is_empty());
    for lineup in &response.lineups {
        let lev = lineup.leverage.as_ref().expect("leverage metrics present");
        assert!(lev.total_ownership >= 0.0);
        assert!(lev.max_ownership <= 100.0);
    }
}

#[test]
fn invalid_requests_fail_fast_without_sampling() {
    let slate = test_slate();
    let spec = ConstraintSpec::default();
    let source = CountingSource::new(slate.len());
    let cache = ScenarioCache::with_defaults();
    let sink = MemorySink::new();
    let token = CancelToken::new();

    let mut request = base_request();
    request.n_scenarios = 10;
    assert!(run_optimize(&request, &slate, &spec, &source, &cache, &sink, &token).is_err());
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}
