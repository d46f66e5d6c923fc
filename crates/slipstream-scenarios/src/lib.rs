//! # slipstream-scenarios: Scenario Matrices, Sources, and the Shared Cache
//!
//! A scenario matrix is an immutable (S × D) block of driver fantasy-point
//! outcomes: row `k` is one simulated race, column `i` is the dense driver
//! index of the slate. Everything downstream (objective builders, tail
//! metrics, contest simulation) reads this one block, so the cache in this
//! crate is the central performance lever: a matrix is sampled **once** per
//! `(slate, n_scenarios, seed)` and shared across every lineup solve of every
//! request with the same key.
//!
//! ## Modules
//!
//! - [`matrix`] - The immutable matrix with per-driver means and row access
//! - [`source`] - The [`ScenarioSource`] trait plus deterministic built-in
//!   sources for development and validation harnesses
//! - [`cache`] - Single-flight, LRU, byte-budgeted scenario cache

pub mod cache;
pub mod matrix;
pub mod source;

pub use cache::{CacheConfig, CacheKey, ScenarioCache};
pub use matrix::ScenarioMatrix;
pub use source::{GammaUpsideSource, NormalFieldSource, ScenarioSource};
