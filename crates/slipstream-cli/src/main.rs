use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use slipstream_algo::ObjectiveKind;
use slipstream_batch::{
    run_optimize, write_run_manifest, JobUpdate, OptimizeRequest, ProgressSink, RunManifest,
    Section,
};
use slipstream_core::{CancelToken, ConstraintSpec, Lineup, Slate};
use slipstream_io::{load_slate_from_path, write_dk_csv, ConstraintStore};
use slipstream_scenarios::{
    GammaUpsideSource, NormalFieldSource, ScenarioCache, ScenarioSource,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

mod cli;

use cli::{Cli, Commands, ObjectiveArg, SourceKind};

fn configure_threads(spec: &str) {
    let count = if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse().unwrap_or_else(|_| num_cpus::get())
    };
    let _ = ThreadPoolBuilder::new().num_threads(count).build_global();
}

/// Job updates rendered as an indicatif bar.
struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos:>3}% {msg}")
                .expect("static template parses"),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarSink {
    fn update(&self, update: JobUpdate) {
        self.bar.set_position((update.progress * 100.0) as u64);
        self.bar.set_message(format!("{:?}", update.status));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;
    configure_threads(&cli.threads);

    match cli.command {
        Commands::Optimize {
            slate,
            slate_id,
            constraints,
            request,
            n_scenarios,
            n_lineups,
            objective,
            seed,
            source,
            tail_validation,
            out,
        } => run_optimize_command(
            &slate,
            slate_id,
            constraints,
            request,
            n_scenarios,
            n_lineups,
            objective,
            seed,
            source,
            tail_validation,
            &out,
        ),
        Commands::Scenarios {
            slate,
            n_scenarios,
            seed,
            source,
        } => run_scenarios_command(&slate, n_scenarios, seed, source),
    }
}

fn slate_id_for(path: &Path, explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("slate")
            .to_string()
    })
}

fn build_source(kind: SourceKind, slate: &Slate, spec: &ConstraintSpec) -> Box<dyn ScenarioSource> {
    match kind {
        SourceKind::Normal => Box::new(NormalFieldSource::from_slate(slate, &spec.track)),
        SourceKind::Gamma => Box::new(GammaUpsideSource::from_slate(slate, 1.5)),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_optimize_command(
    slate_path: &Path,
    slate_id: Option<String>,
    constraints: Option<PathBuf>,
    request_path: Option<PathBuf>,
    n_scenarios: usize,
    n_lineups: usize,
    objective: ObjectiveArg,
    seed: u64,
    source_kind: SourceKind,
    tail_validation: bool,
    out: &Path,
) -> Result<()> {
    let slate_id = slate_id_for(slate_path, slate_id);
    let slate = load_slate_from_path(slate_path, &slate_id)?;
    let spec = match &constraints {
        Some(root) => ConstraintStore::new(root).load_or_default(&slate_id)?,
        None => ConstraintSpec::default(),
    };

    let request = match request_path {
        Some(path) => {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("reading request '{}'", path.display()))?;
            serde_json::from_str::<OptimizeRequest>(&data).context("parsing request json")?
        }
        None => {
            let mut request = OptimizeRequest::new(slate_id.clone());
            request.n_scenarios = n_scenarios;
            request.n_lineups = n_lineups;
            request.objective_type = match objective {
                ObjectiveArg::Cvar => ObjectiveKind::Cvar,
                ObjectiveArg::Mean => ObjectiveKind::Mean,
            };
            request.seed = seed;
            request.tail_validation = tail_validation;
            request
        }
    };

    let source = build_source(source_kind, &slate, &spec);
    let cache = ScenarioCache::with_defaults();
    let sink = BarSink::new();
    let token = CancelToken::new();

    let response = run_optimize(
        &request,
        &slate,
        &spec,
        source.as_ref(),
        &cache,
        &sink,
        &token,
    )
    .map_err(|err| anyhow::anyhow!("optimize failed ({:?}): {err}", err.kind()))?;
    sink.finish();

    fs::create_dir_all(out)
        .with_context(|| format!("creating output directory '{}'", out.display()))?;
    let response_path = out.join("response.json");
    fs::write(
        &response_path,
        serde_json::to_string_pretty(&response).context("serializing response")?,
    )?;

    let lineups: Vec<Lineup> = response
        .lineups
        .iter()
        .map(|view| Lineup {
            drivers: view
                .drivers
                .iter()
                .map(|d| slipstream_core::DriverId::new(d.driver_id))
                .collect(),
            total_salary: view.total_salary,
        })
        .collect();
    let csv_path = out.join("lineups.csv");
    write_dk_csv(&lineups, &slate, &csv_path)?;

    let manifest_path = out.join("manifest.json");
    write_run_manifest(
        &manifest_path,
        &RunManifest {
            created_at: chrono_now(),
            slate_id: slate_id.clone(),
            seed: request.seed,
            n_scenarios: request.n_scenarios,
            n_lineups_requested: request.n_lineups,
            n_lineups_produced: response.lineups.len(),
            status: format!("{:?}", response.status).to_lowercase(),
            outputs: vec![
                response_path.display().to_string(),
                csv_path.display().to_string(),
            ],
        },
    )?;

    info!(
        slate = %slate_id,
        lineups = response.lineups.len(),
        status = ?response.status,
        "optimize run finished"
    );
    println!(
        "{} lineups ({:?}) -> {}",
        response.lineups.len(),
        response.status,
        out.display()
    );
    println!("portfolio correlation: {:.3}", response.correlation);
    if let Section::Ready(v) = &response.tail_validation {
        println!(
            "tail lift vs mean baseline at alpha {}: {:+.1}%",
            v.alpha,
            v.tail_improvement * 100.0
        );
    }
    Ok(())
}

fn run_scenarios_command(
    slate_path: &Path,
    n_scenarios: usize,
    seed: u64,
    source_kind: SourceKind,
) -> Result<()> {
    let slate_id = slate_id_for(slate_path, None);
    let slate = load_slate_from_path(slate_path, &slate_id)?;
    let spec = ConstraintSpec::default();
    let source = build_source(source_kind, &slate, &spec);
    let matrix = source
        .sample(n_scenarios, seed)
        .map_err(|err| anyhow::anyhow!("sampling failed: {err}"))?;

    println!(
        "{} scenarios x {} drivers ({} KiB)",
        matrix.n_scenarios(),
        matrix.n_drivers(),
        matrix.approx_bytes() / 1024
    );
    for d in &slate.drivers {
        println!(
            "{:<24} proj {:>6.1}  scenario-mean {:>6.1}",
            d.name,
            d.projected_points,
            matrix.driver_mean(d.driver_id)
        );
    }
    Ok(())
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
