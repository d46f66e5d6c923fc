//! Field-lineup sampling from an ownership distribution.
//!
//! Opponents are not modeled individually; the field is drawn from the
//! projected ownership vector with Dirichlet-like noise on top:
//! `g_i ~ Gamma(α·p_i·K, 1)`, renormalized. Each field lineup then draws
//! `roster_size` distinct drivers from the perturbed distribution and must
//! fit under the salary cap. Stacking rules are deliberately not enforced
//! here: the public field is sloppier than an optimizer.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use slipstream_core::{DriverId, OwnershipVector, SlipResult, SlipstreamError};
use tracing::warn;

/// One sampled opponent lineup.
#[derive(Debug, Clone)]
pub struct FieldLineup {
    pub drivers: Vec<DriverId>,
    pub total_salary: u32,
}

impl FieldLineup {
    /// Total points under one scenario row.
    #[inline]
    pub fn score(&self, row: &[f64]) -> f64 {
        self.drivers.iter().map(|d| row[d.value()]).sum()
    }
}

/// Sampler tuning. Defaults deliver modest concentration around the given
/// ownership: the Gamma shapes sum to roughly `alpha * concentration`.
#[derive(Debug, Clone)]
pub struct FieldSamplerConfig {
    /// `α` scaling in the Gamma shape `α·p_i·K`.
    pub alpha: f64,
    /// Concentration `K`; larger values hug the input ownership tighter.
    pub concentration: f64,
    /// Candidate factor before salary filtering.
    pub oversample: f64,
    /// Bounded refills before a shortfall is accepted.
    pub max_refills: usize,
}

impl Default for FieldSamplerConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            concentration: 120.0,
            oversample: 3.0,
            max_refills: 4,
        }
    }
}

/// Draws roster-valid opponent lineups from a perturbed ownership
/// distribution.
#[derive(Debug, Clone)]
pub struct FieldSampler {
    probs: Vec<f64>,
    salaries: Vec<u32>,
    salary_cap: u32,
    roster_size: usize,
    config: FieldSamplerConfig,
}

impl FieldSampler {
    pub fn new(
        ownership: &OwnershipVector,
        salaries: Vec<u32>,
        salary_cap: u32,
        roster_size: usize,
        config: FieldSamplerConfig,
    ) -> SlipResult<Self> {
        if salaries.len() != ownership.len() {
            return Err(SlipstreamError::Validation(format!(
                "salary length {} != ownership length {}",
                salaries.len(),
                ownership.len()
            )));
        }
        if roster_size == 0 || roster_size > salaries.len() {
            return Err(SlipstreamError::Validation(format!(
                "roster size {} impossible for a {}-driver slate",
                roster_size,
                salaries.len()
            )));
        }
        let probs = ownership.as_slice().iter().map(|o| o / 100.0).collect();
        Ok(Self {
            probs,
            salaries,
            salary_cap,
            roster_size,
            config,
        })
    }

    /// Sample `n_lineups` salary-valid field lineups. Oversamples by the
    /// configured factor, drops cap violators, refills a bounded number of
    /// times, and accepts (and logs) a shortfall after that.
    pub fn sample_field(&self, n_lineups: usize, rng: &mut StdRng) -> Vec<FieldLineup> {
        let perturbed = self.perturb(rng);
        let mut out: Vec<FieldLineup> = Vec::with_capacity(n_lineups);
        let batch = ((n_lineups as f64) * self.config.oversample).ceil() as usize;

        for _refill in 0..=self.config.max_refills {
            if out.len() >= n_lineups {
                break;
            }
            for _ in 0..batch {
                if out.len() >= n_lineups {
                    break;
                }
                if let Some(lineup) = self.draw_lineup(&perturbed, rng) {
                    if lineup.total_salary <= self.salary_cap {
                        out.push(lineup);
                    }
                }
            }
        }

        if out.len() < n_lineups {
            warn!(
                requested = n_lineups,
                yielded = out.len(),
                "field sampler under cap pressure; accepting shortfall"
            );
        }
        out
    }

    /// Dirichlet-like perturbation: `g_i ~ Gamma(α·p_i·K, 1)`, renormalized.
    fn perturb(&self, rng: &mut StdRng) -> Vec<f64> {
        let mut g: Vec<f64> = self
            .probs
            .iter()
            .map(|p| {
                let shape = (self.config.alpha * p * self.config.concentration).max(1e-3);
                match Gamma::new(shape, 1.0) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => *p,
                }
            })
            .collect();
        let total: f64 = g.iter().sum();
        if total > 0.0 {
            for v in &mut g {
                *v /= total;
            }
        } else {
            g = vec![1.0 / g.len() as f64; g.len()];
        }
        g
    }

    /// Weighted draw of `roster_size` distinct drivers, renormalizing after
    /// each pick.
    fn draw_lineup(&self, weights: &[f64], rng: &mut StdRng) -> Option<FieldLineup> {
        let mut pool = weights.to_vec();
        let mut drivers = Vec::with_capacity(self.roster_size);
        let mut total_salary = 0u32;
        for _ in 0..self.roster_size {
            let total: f64 = pool.iter().sum();
            if total <= 0.0 {
                return None;
            }
            let mut target = rng.gen::<f64>() * total;
            let mut picked = pool.len() - 1;
            for (i, w) in pool.iter().enumerate() {
                target -= w;
                if target <= 0.0 {
                    picked = i;
                    break;
                }
            }
            pool[picked] = 0.0;
            drivers.push(DriverId::new(picked));
            total_salary += self.salaries[picked];
        }
        drivers.sort_unstable();
        Some(FieldLineup {
            drivers,
            total_salary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sampler(cap: u32) -> FieldSampler {
        let ownership =
            OwnershipVector::new(vec![30.0, 25.0, 15.0, 10.0, 10.0, 5.0, 3.0, 2.0]).unwrap();
        FieldSampler::new(
            &ownership,
            vec![9_000, 8_500, 8_000, 7_500, 7_000, 6_500, 6_000, 5_500],
            cap,
            4,
            FieldSamplerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn lineups_are_distinct_and_capped() {
        let s = sampler(31_000);
        let mut rng = StdRng::seed_from_u64(5);
        let field = s.sample_field(200, &mut rng);
        assert!(!field.is_empty());
        for lineup in &field {
            assert_eq!(lineup.drivers.len(), 4);
            assert!(lineup.total_salary <= 31_000);
            let mut distinct = lineup.drivers.clone();
            distinct.dedup();
            assert_eq!(distinct.len(), 4);
        }
    }

    #[test]
    fn impossible_cap_yields_shortfall_not_panic() {
        let s = sampler(10_000);
        let mut rng = StdRng::seed_from_u64(5);
        let field = s.sample_field(50, &mut rng);
        assert!(field.is_empty());
    }

    #[test]
    fn frequency_tracks_ownership() {
        let s = sampler(50_000);
        let mut rng = StdRng::seed_from_u64(11);
        let field = s.sample_field(4_000, &mut rng);
        assert_eq!(field.len(), 4_000);
        let mut counts = vec![0usize; 8];
        for lineup in &field {
            for d in &lineup.drivers {
                counts[d.value()] += 1;
            }
        }
        // The 30%-owned driver must appear far more often than the 2% one.
        assert!(counts[0] > counts[7] * 3);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let ownership = OwnershipVector::new(vec![50.0, 50.0]).unwrap();
        assert!(FieldSampler::new(
            &ownership,
            vec![1_000],
            50_000,
            1,
            FieldSamplerConfig::default()
        )
        .is_err());
        assert!(FieldSampler::new(
            &ownership,
            vec![1_000, 2_000],
            50_000,
            3,
            FieldSamplerConfig::default()
        )
        .is_err());
    }
}
