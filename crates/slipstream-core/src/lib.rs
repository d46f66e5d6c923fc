//! # slipstream-core: DFS NASCAR Portfolio Modeling Core
//!
//! Provides the fundamental data structures shared by the slipstream optimizer:
//! slates of drivers, roster rules, constraint specifications, lineups, and
//! exposure bookkeeping.
//!
//! ## Design Philosophy
//!
//! The optimizer works exclusively in **dense integer driver indices**:
//! - [`DriverId`] is a dense column index into the scenario matrix
//! - The display-id ↔ dense-index map is established once at request ingress
//!   (see [`Slate`]) and consulted only at export boundaries
//! - Salary, team, and ownership attributes hang off [`DriverRecord`]
//!
//! This keeps the MILP layer free of string lookups and makes scenario-matrix
//! column access an array index.
//!
//! ## Quick Start
//!
//! ```rust
//! use slipstream_core::*;
//!
//! let slate = Slate::new(
//!     "daytona-500",
//!     vec![
//!         DriverRecord::new(DriverId::new(0), "dk-101", "A. Driver", "Team Red", 9800, 45.0),
//!         DriverRecord::new(DriverId::new(1), "dk-102", "B. Driver", "Team Red", 8700, 41.5),
//!     ],
//! );
//! assert!(slate.validate().is_ok());
//!
//! let lineup = Lineup::new(vec![DriverId::new(0), DriverId::new(1)], &slate);
//! assert_eq!(lineup.total_salary, 18_500);
//! ```
//!
//! ## Modules
//!
//! - [`constraints`] - Constraint specification (locks, excludes, vetoes, track)
//! - [`lineup`] - Lineups, exposure bookkeeping
//! - [`ownership`] - Normalized ownership vectors
//! - [`error`] - Unified error taxonomy
//! - [`cancel`] - Cooperative cancellation tokens

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod cancel;
pub mod constraints;
pub mod error;
pub mod lineup;
pub mod ownership;

pub use cancel::CancelToken;
pub use constraints::{
    ConstraintSpec, DriverConstraints, PitWindow, RosterRules, TrackConstraints, VetoCondition,
    VetoRule,
};
pub use error::{ErrorKind, SlipResult, SlipstreamError};
pub use lineup::{ExposureBook, Lineup};
pub use ownership::OwnershipVector;

/// Dense driver index within a slate.
///
/// Doubles as the column index into the scenario matrix, so it must be
/// contiguous from zero within a slate ([`Slate::validate`] enforces this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(usize);

impl DriverId {
    #[inline]
    pub fn new(value: usize) -> Self {
        DriverId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Track archetype tag carried on each driver for a given slate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackArchetype {
    Superspeedway,
    #[default]
    Intermediate,
    ShortTrack,
    RoadCourse,
}

/// One driver's slate entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRecord {
    /// Dense index into scenario columns; distinct within a slate.
    pub driver_id: DriverId,
    /// Opaque site identifier (DraftKings player id).
    pub display_id: String,
    pub name: String,
    pub team: String,
    pub salary: u32,
    pub projected_points: f64,
    #[serde(default)]
    pub skill: f64,
    #[serde(default)]
    pub recent_form: f64,
    #[serde(default)]
    pub track_archetype: TrackArchetype,
    /// Projected ownership in percent, when an estimate exists.
    #[serde(default)]
    pub projected_ownership: Option<f64>,
}

impl DriverRecord {
    /// Minimal constructor for tests and builders; analytics fields default to zero.
    pub fn new(
        driver_id: DriverId,
        display_id: impl Into<String>,
        name: impl Into<String>,
        team: impl Into<String>,
        salary: u32,
        projected_points: f64,
    ) -> Self {
        Self {
            driver_id,
            display_id: display_id.into(),
            name: name.into(),
            team: team.into(),
            salary,
            projected_points,
            skill: 0.0,
            recent_form: 0.0,
            track_archetype: TrackArchetype::default(),
            projected_ownership: None,
        }
    }
}

/// A slate: the driver pool for one contest, with the ingress-built
/// bidirectional display-id index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slate {
    pub slate_id: String,
    pub drivers: Vec<DriverRecord>,
    #[serde(skip)]
    by_display: HashMap<String, DriverId>,
}

impl Slate {
    pub fn new(slate_id: impl Into<String>, drivers: Vec<DriverRecord>) -> Self {
        let by_display = drivers
            .iter()
            .map(|d| (d.display_id.clone(), d.driver_id))
            .collect();
        Self {
            slate_id: slate_id.into(),
            drivers,
            by_display,
        }
    }

    /// Number of drivers (scenario-matrix column count).
    #[inline]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Record for a dense driver index.
    #[inline]
    pub fn driver(&self, id: DriverId) -> Option<&DriverRecord> {
        self.drivers.get(id.value())
    }

    /// Dense index for a site display id.
    pub fn resolve_display(&self, display_id: &str) -> Option<DriverId> {
        self.by_display.get(display_id).copied()
    }

    /// Rebuild the display index after deserialization.
    pub fn reindex(&mut self) {
        self.by_display = self
            .drivers
            .iter()
            .map(|d| (d.display_id.clone(), d.driver_id))
            .collect();
    }

    /// Check slate invariants: ids dense and distinct, ownership within [0, 100].
    pub fn validate(&self) -> SlipResult<()> {
        if self.drivers.is_empty() {
            return Err(SlipstreamError::Validation(format!(
                "slate '{}' has no drivers",
                self.slate_id
            )));
        }
        for (i, d) in self.drivers.iter().enumerate() {
            if d.driver_id.value() != i {
                return Err(SlipstreamError::Validation(format!(
                    "slate '{}': driver_id {} at position {} is not dense",
                    self.slate_id,
                    d.driver_id.value(),
                    i
                )));
            }
            if let Some(own) = d.projected_ownership {
                if !(0.0..=100.0).contains(&own) {
                    return Err(SlipstreamError::Validation(format!(
                        "slate '{}': driver '{}' ownership {} outside [0, 100]",
                        self.slate_id, d.name, own
                    )));
                }
            }
        }
        Ok(())
    }

    /// Distinct team names on the slate.
    pub fn teams(&self) -> Vec<&str> {
        let mut teams: Vec<&str> = self.drivers.iter().map(|d| d.team.as_str()).collect();
        teams.sort_unstable();
        teams.dedup();
        teams
    }

    /// Dense indices of the drivers on one team.
    pub fn team_members(&self, team: &str) -> Vec<DriverId> {
        self.drivers
            .iter()
            .filter(|d| d.team == team)
            .map(|d| d.driver_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_driver_slate() -> Slate {
        Slate::new(
            "s1",
            vec![
                DriverRecord::new(DriverId::new(0), "dk-1", "A", "Red", 9000, 40.0),
                DriverRecord::new(DriverId::new(1), "dk-2", "B", "Blue", 8000, 38.0),
            ],
        )
    }

    #[test]
    fn validate_accepts_dense_ids() {
        assert!(two_driver_slate().validate().is_ok());
    }

    #[test]
    fn validate_rejects_gapped_ids() {
        let slate = Slate::new(
            "s1",
            vec![DriverRecord::new(DriverId::new(3), "dk-1", "A", "Red", 9000, 40.0)],
        );
        assert!(slate.validate().is_err());
    }

    #[test]
    fn validate_rejects_ownership_out_of_range() {
        let mut slate = two_driver_slate();
        slate.drivers[0].projected_ownership = Some(130.0);
        assert!(slate.validate().is_err());
    }

    #[test]
    fn display_roundtrip() {
        let slate = two_driver_slate();
        assert_eq!(slate.resolve_display("dk-2"), Some(DriverId::new(1)));
        assert_eq!(slate.resolve_display("dk-9"), None);
    }

    #[test]
    fn team_members_by_name() {
        let slate = two_driver_slate();
        assert_eq!(slate.team_members("Red"), vec![DriverId::new(0)]);
        assert_eq!(slate.teams(), vec!["Blue", "Red"]);
    }
}
