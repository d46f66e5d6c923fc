//! # slipstream-io: Slate Import, Constraint Store, and Exports
//!
//! File-format boundaries of the optimizer:
//!
//! - [`slate`] - Slate importers (CSV or JSON); dense driver ids are
//!   assigned here, at request ingress
//! - [`constraint_store`] - Read-only `slate_id → ConstraintSpec` lookup
//!   over a directory of YAML/JSON files
//! - [`export`] - DraftKings-upload CSV writer

pub mod constraint_store;
pub mod export;
pub mod slate;

pub use constraint_store::ConstraintStore;
pub use export::{write_dk_csv, write_dk_csv_to};
pub use slate::load_slate_from_path;
