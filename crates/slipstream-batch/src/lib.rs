//! # slipstream-batch: The Optimize Request Surface
//!
//! The job queue and HTTP layer live outside this workspace; what they
//! drive is here:
//!
//! - [`request`] - `OptimizeRequest` options with defaults and fail-fast
//!   validation
//! - [`response`] - `OptimizeResponse` with typed optional sections that
//!   distinguish "off" from "errored"
//! - [`job`] - Job state, monotonic progress, and the progress sink the
//!   collaborator persists
//! - [`runner`] - The blocking request orchestrator: scenario cache →
//!   portfolio generation → optional contest equity and tail validation
//! - [`manifest`] - Run manifests written next to CLI outputs

pub mod job;
pub mod manifest;
pub mod request;
pub mod response;
pub mod runner;

pub use job::{JobProgress, JobState, JobStatus, JobUpdate, MemorySink, NullSink, ProgressSink};
pub use manifest::{write_run_manifest, RunManifest};
pub use request::{
    ContestSimOptions, ExposureOptions, LeverageOptions, OptimizeRequest, OwnershipMode,
    PayoutConfig,
};
pub use response::{optional_step, ContestEquity, LineupView, OptimizeResponse, Section};
pub use runner::run_optimize;
