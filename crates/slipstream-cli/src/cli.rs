//! Command-line interface definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tail-objective DFS NASCAR portfolio optimizer", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Worker threads ("auto" picks the CPU count)
    #[arg(long, default_value = "auto")]
    pub threads: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Built-in scenario source for development runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Gaussian noise around projections.
    Normal,
    /// Right-skewed gamma upside; what tournaments reward.
    Gamma,
}

/// Objective selector mirrored from the request schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectiveArg {
    Cvar,
    Mean,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a tail-optimized portfolio for a slate
    Optimize {
        /// Slate file (CSV or JSON)
        slate: PathBuf,
        /// Slate identifier; defaults to the file stem
        #[arg(long)]
        slate_id: Option<String>,
        /// Constraint-store directory
        #[arg(long)]
        constraints: Option<PathBuf>,
        /// Full optimize request as JSON (overrides the flags below)
        #[arg(long)]
        request: Option<PathBuf>,
        #[arg(long, default_value_t = 10_000)]
        n_scenarios: usize,
        #[arg(long, default_value_t = 20)]
        n_lineups: usize,
        #[arg(long, value_enum, default_value = "cvar")]
        objective: ObjectiveArg,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Scenario source for this run
        #[arg(long, value_enum, default_value = "gamma")]
        source: SourceKind,
        /// Also build a mean baseline and report the tail lift
        #[arg(long)]
        tail_validation: bool,
        /// Output directory (response.json, lineups.csv, manifest.json)
        #[arg(long, default_value = "runs")]
        out: PathBuf,
    },
    /// Sample a scenario matrix and print summary statistics
    Scenarios {
        /// Slate file (CSV or JSON)
        slate: PathBuf,
        #[arg(long, default_value_t = 1_000)]
        n_scenarios: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, value_enum, default_value = "gamma")]
        source: SourceKind,
    },
}
