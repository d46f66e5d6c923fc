//! Lineups and exposure bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::constraints::{ConstraintSpec, RosterRules};
use crate::{DriverId, Slate};

/// An unordered set of distinct drivers with derived salary and team counts.
///
/// Construction sorts and dedups the ids; roster-size validity is checked by
/// [`Lineup::violations`], not the constructor, so partially built lineups can
/// be inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineup {
    /// Sorted dense driver ids.
    pub drivers: Vec<DriverId>,
    pub total_salary: u32,
}

impl Lineup {
    pub fn new(mut drivers: Vec<DriverId>, slate: &Slate) -> Self {
        drivers.sort_unstable();
        drivers.dedup();
        let total_salary = drivers
            .iter()
            .filter_map(|id| slate.driver(*id))
            .map(|d| d.salary)
            .sum();
        Self {
            drivers,
            total_salary,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: DriverId) -> bool {
        self.drivers.binary_search(&id).is_ok()
    }

    /// Per-team driver counts for this lineup.
    pub fn team_counts(&self, slate: &Slate) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for id in &self.drivers {
            if let Some(d) = slate.driver(*id) {
                *counts.entry(d.team.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Number of drivers shared with another lineup.
    pub fn overlap(&self, other: &Lineup) -> usize {
        self.drivers
            .iter()
            .filter(|id| other.contains(**id))
            .count()
    }

    /// Jaccard similarity with another lineup.
    pub fn jaccard(&self, other: &Lineup) -> f64 {
        let inter = self.overlap(other);
        let union = self.len() + other.len() - inter;
        if union == 0 {
            0.0
        } else {
            inter as f64 / union as f64
        }
    }

    /// All roster/salary/stacking/lock/exclude violations, as messages.
    /// An empty vector means the lineup is contest-legal.
    pub fn violations(&self, slate: &Slate, spec: &ConstraintSpec) -> Vec<String> {
        let rules: &RosterRules = &spec.roster;
        let mut out = Vec::new();
        if self.len() != rules.n_roster {
            out.push(format!(
                "roster size {} != required {}",
                self.len(),
                rules.n_roster
            ));
        }
        if self.total_salary > rules.salary_cap {
            out.push(format!(
                "salary {} exceeds cap {}",
                self.total_salary, rules.salary_cap
            ));
        }
        for (team, count) in self.team_counts(slate) {
            if count > 0 && (count < rules.min_stack || count > rules.max_stack) {
                out.push(format!(
                    "team '{}' count {} outside [{}, {}]",
                    team, count, rules.min_stack, rules.max_stack
                ));
            }
        }
        let excludes: BTreeSet<DriverId> = spec.effective_excludes();
        for id in &self.drivers {
            if excludes.contains(id) {
                out.push(format!("driver {} is excluded", id.value()));
            }
        }
        for id in &spec.drivers.locked {
            if !self.contains(*id) {
                out.push(format!("locked driver {} missing", id.value()));
            }
        }
        out
    }
}

/// Mutable aggregate over the portfolio being built: per-driver and per-team
/// counts plus the number of lineups issued so far. Created empty, updated
/// after each accepted lineup, destroyed with the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExposureBook {
    driver_counts: HashMap<usize, usize>,
    team_counts: HashMap<String, usize>,
    issued: usize,
}

impl ExposureBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted lineup.
    pub fn record(&mut self, lineup: &Lineup, slate: &Slate) {
        for id in &lineup.drivers {
            *self.driver_counts.entry(id.value()).or_insert(0) += 1;
        }
        for (team, count) in lineup.team_counts(slate) {
            *self.team_counts.entry(team).or_insert(0) += count.min(1);
        }
        self.issued += 1;
    }

    #[inline]
    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn driver_count(&self, id: DriverId) -> usize {
        self.driver_counts.get(&id.value()).copied().unwrap_or(0)
    }

    pub fn team_count(&self, team: &str) -> usize {
        self.team_counts.get(team).copied().unwrap_or(0)
    }

    /// Fraction of issued lineups containing the driver; zero before the
    /// first lineup is issued.
    pub fn exposure(&self, id: DriverId) -> f64 {
        if self.issued == 0 {
            0.0
        } else {
            self.driver_count(id) as f64 / self.issued as f64
        }
    }

    /// Fraction of issued lineups touching the team.
    pub fn team_exposure(&self, team: &str) -> f64 {
        if self.issued == 0 {
            0.0
        } else {
            self.team_count(team) as f64 / self.issued as f64
        }
    }

    /// Drivers at or above the exposure ceiling, to be forced out of the
    /// next solve.
    pub fn capped_drivers(&self, slate: &Slate, max_exposure: f64) -> Vec<DriverId> {
        if self.issued == 0 {
            return Vec::new();
        }
        slate
            .drivers
            .iter()
            .map(|d| d.driver_id)
            .filter(|id| self.exposure(*id) >= max_exposure)
            .collect()
    }

    /// Teams at or above the team exposure ceiling.
    pub fn capped_teams(&self, slate: &Slate, max_exposure: f64) -> Vec<String> {
        if self.issued == 0 {
            return Vec::new();
        }
        slate
            .teams()
            .into_iter()
            .filter(|team| self.team_exposure(team) >= max_exposure)
            .map(|team| team.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DriverRecord;

    fn slate() -> Slate {
        Slate::new(
            "s1",
            vec![
                DriverRecord::new(DriverId::new(0), "d0", "A", "Red", 9000, 40.0),
                DriverRecord::new(DriverId::new(1), "d1", "B", "Red", 8000, 38.0),
                DriverRecord::new(DriverId::new(2), "d2", "C", "Blue", 7000, 35.0),
                DriverRecord::new(DriverId::new(3), "d3", "D", "Blue", 6000, 30.0),
            ],
        )
    }

    #[test]
    fn lineup_dedups_and_sums_salary() {
        let s = slate();
        let lineup = Lineup::new(
            vec![DriverId::new(1), DriverId::new(0), DriverId::new(1)],
            &s,
        );
        assert_eq!(lineup.len(), 2);
        assert_eq!(lineup.total_salary, 17_000);
    }

    #[test]
    fn violations_catch_singleton_team() {
        let s = slate();
        let mut spec = ConstraintSpec::default();
        spec.roster.n_roster = 3;
        let lineup = Lineup::new(
            vec![DriverId::new(0), DriverId::new(1), DriverId::new(2)],
            &s,
        );
        // Blue appears once: below min_stack.
        let violations = lineup.violations(&s, &spec);
        assert!(violations.iter().any(|v| v.contains("Blue")));
    }

    #[test]
    fn exposure_fractions() {
        let s = slate();
        let mut book = ExposureBook::new();
        let l1 = Lineup::new(vec![DriverId::new(0), DriverId::new(1)], &s);
        let l2 = Lineup::new(vec![DriverId::new(0), DriverId::new(2)], &s);
        book.record(&l1, &s);
        book.record(&l2, &s);
        assert_eq!(book.issued(), 2);
        assert_eq!(book.exposure(DriverId::new(0)), 1.0);
        assert_eq!(book.exposure(DriverId::new(1)), 0.5);
        assert_eq!(book.capped_drivers(&s, 0.8), vec![DriverId::new(0)]);
    }

    #[test]
    fn jaccard_overlap() {
        let s = slate();
        let l1 = Lineup::new(vec![DriverId::new(0), DriverId::new(1)], &s);
        let l2 = Lineup::new(vec![DriverId::new(1), DriverId::new(2)], &s);
        assert_eq!(l1.overlap(&l2), 1);
        assert!((l1.jaccard(&l2) - 1.0 / 3.0).abs() < 1e-12);
    }
}
