//! Constraint specification: roster rules, driver locks/excludes/vetoes,
//! and track-level calibration facts. Immutable per request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{SlipResult, SlipstreamError};
use crate::DriverId;

/// Site roster rules enforced as MILP constraints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RosterRules {
    /// Lineup cardinality.
    #[serde(default = "default_n_roster")]
    pub n_roster: usize,
    /// Total salary ceiling.
    #[serde(default = "default_salary_cap")]
    pub salary_cap: u32,
    /// Minimum drivers from a team once the team is used at all.
    #[serde(default = "default_min_stack")]
    pub min_stack: usize,
    /// Maximum drivers from a single team.
    #[serde(default = "default_max_stack")]
    pub max_stack: usize,
}

fn default_n_roster() -> usize {
    6
}

fn default_salary_cap() -> u32 {
    50_000
}

fn default_min_stack() -> usize {
    2
}

fn default_max_stack() -> usize {
    3
}

impl Default for RosterRules {
    fn default() -> Self {
        Self {
            n_roster: default_n_roster(),
            salary_cap: default_salary_cap(),
            min_stack: default_min_stack(),
            max_stack: default_max_stack(),
        }
    }
}

/// Condition under which a veto rule removes a driver from the pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VetoCondition {
    /// Unconditional removal.
    Always,
    /// Applies only when track difficulty is at or above the threshold.
    DifficultyAtLeast { threshold: f64 },
    /// Applies only when the calibrated caution rate is at or above the threshold.
    CautionRateAtLeast { threshold: f64 },
}

/// A per-driver veto: an `x_i = 0` cut with a recorded reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VetoRule {
    pub driver_id: DriverId,
    pub reason: String,
    #[serde(default = "always")]
    pub condition: VetoCondition,
}

fn always() -> VetoCondition {
    VetoCondition::Always
}

/// Driver-level constraint bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConstraints {
    /// Drivers that must appear in every lineup.
    #[serde(default)]
    pub locked: BTreeSet<DriverId>,
    /// Drivers that may appear in no lineup.
    #[serde(default)]
    pub excluded: BTreeSet<DriverId>,
    #[serde(default)]
    pub vetoes: Vec<VetoRule>,
}

/// Calibrated track facts consumed by veto conditions and scenario sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConstraints {
    /// Track difficulty on the calibration scale [0, 1].
    pub difficulty: f64,
    /// Aggression factor scaling position volatility.
    pub aggression_factor: f64,
    /// Expected cautions per 100 laps.
    pub caution_rate: f64,
    pub pit_window: PitWindow,
}

impl Default for TrackConstraints {
    fn default() -> Self {
        Self {
            difficulty: 0.5,
            aggression_factor: 1.0,
            caution_rate: 4.0,
            pit_window: PitWindow::default(),
        }
    }
}

/// Green-flag pit window in laps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PitWindow {
    pub open_lap: u32,
    pub close_lap: u32,
}

impl Default for PitWindow {
    fn default() -> Self {
        Self {
            open_lap: 40,
            close_lap: 55,
        }
    }
}

/// The full constraint bundle loaded from the constraint store for one slate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintSpec {
    #[serde(default)]
    pub roster: RosterRules,
    #[serde(default)]
    pub drivers: DriverConstraints,
    #[serde(default)]
    pub track: TrackConstraints,
}

impl ConstraintSpec {
    /// Fail-fast request validation: a driver cannot be both locked and
    /// excluded, and stack bounds must be ordered.
    pub fn validate(&self) -> SlipResult<()> {
        let clash: Vec<_> = self
            .drivers
            .locked
            .intersection(&self.drivers.excluded)
            .collect();
        if !clash.is_empty() {
            return Err(SlipstreamError::Validation(format!(
                "{} driver(s) are both locked and excluded",
                clash.len()
            )));
        }
        if self.roster.min_stack > self.roster.max_stack {
            return Err(SlipstreamError::Validation(format!(
                "min_stack {} exceeds max_stack {}",
                self.roster.min_stack, self.roster.max_stack
            )));
        }
        if self.roster.n_roster == 0 {
            return Err(SlipstreamError::Validation("n_roster must be positive".into()));
        }
        Ok(())
    }

    /// Dense ids removed from the pool for this request: excludes plus every
    /// veto whose condition holds under the track constraints.
    pub fn effective_excludes(&self) -> BTreeSet<DriverId> {
        let mut out = self.drivers.excluded.clone();
        for veto in &self.drivers.vetoes {
            let applies = match &veto.condition {
                VetoCondition::Always => true,
                VetoCondition::DifficultyAtLeast { threshold } => {
                    self.track.difficulty >= *threshold
                }
                VetoCondition::CautionRateAtLeast { threshold } => {
                    self.track.caution_rate >= *threshold
                }
            };
            if applies {
                out.insert(veto.driver_id);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_rules() {
        let rules = RosterRules::default();
        assert_eq!(rules.n_roster, 6);
        assert_eq!(rules.salary_cap, 50_000);
        assert_eq!(rules.min_stack, 2);
        assert_eq!(rules.max_stack, 3);
    }

    #[test]
    fn lock_exclude_clash_rejected() {
        let mut spec = ConstraintSpec::default();
        spec.drivers.locked.insert(DriverId::new(3));
        spec.drivers.excluded.insert(DriverId::new(3));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn conditional_veto_respects_track() {
        let mut spec = ConstraintSpec::default();
        spec.track.difficulty = 0.8;
        spec.drivers.vetoes.push(VetoRule {
            driver_id: DriverId::new(5),
            reason: "poor plate record".into(),
            condition: VetoCondition::DifficultyAtLeast { threshold: 0.7 },
        });
        spec.drivers.vetoes.push(VetoRule {
            driver_id: DriverId::new(6),
            reason: "caution magnet".into(),
            condition: VetoCondition::CautionRateAtLeast { threshold: 9.0 },
        });
        let excludes = spec.effective_excludes();
        assert!(excludes.contains(&DriverId::new(5)));
        assert!(!excludes.contains(&DriverId::new(6)));
    }
}
