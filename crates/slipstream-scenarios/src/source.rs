//! Scenario sources.
//!
//! The calibrated race simulator lives outside this workspace; the optimizer
//! consumes it through [`ScenarioSource`]. The two built-in sources exist for
//! development, tests, and the tail-validation harness, and are deterministic
//! under an identical seed as the contract requires.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma, Normal};
use slipstream_core::{Slate, SlipResult, SlipstreamError, TrackConstraints};

use crate::matrix::ScenarioMatrix;

/// A pluggable producer of (S × D) driver-points matrices.
///
/// `sample` must be deterministic under identical `(seed, spec)` and must not
/// permute driver columns within a request.
pub trait ScenarioSource: Send + Sync {
    fn sample(&self, n_scenarios: usize, seed: u64) -> SlipResult<ScenarioMatrix>;

    /// Driver count of the matrices this source produces.
    fn n_drivers(&self) -> usize;
}

/// Gaussian points around each driver's projection, with volatility scaled by
/// track aggression and damped by driver skill.
#[derive(Debug, Clone)]
pub struct NormalFieldSource {
    means: Vec<f64>,
    sds: Vec<f64>,
}

impl NormalFieldSource {
    /// Derive per-driver moments from the slate and track calibration.
    ///
    /// Volatility grows with the track aggression factor and caution rate and
    /// shrinks with driver skill; recent form shifts the mean slightly.
    pub fn from_slate(slate: &Slate, track: &TrackConstraints) -> Self {
        let vol_scale = 1.0 + 0.25 * track.aggression_factor + 0.02 * track.caution_rate;
        let mut means = Vec::with_capacity(slate.len());
        let mut sds = Vec::with_capacity(slate.len());
        for d in &slate.drivers {
            means.push(d.projected_points * (1.0 + 0.05 * d.recent_form));
            let base_sd = (d.projected_points * 0.20).max(1.0);
            sds.push(base_sd * vol_scale * (1.0 - 0.3 * d.skill.clamp(0.0, 1.0)));
        }
        Self { means, sds }
    }
}

impl ScenarioSource for NormalFieldSource {
    fn sample(&self, n_scenarios: usize, seed: u64) -> SlipResult<ScenarioMatrix> {
        if n_scenarios == 0 {
            return Err(SlipstreamError::EmptyScenarios(
                "n_scenarios must be positive".into(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let dists: Vec<Normal<f64>> = self
            .means
            .iter()
            .zip(&self.sds)
            .map(|(m, s)| {
                Normal::new(*m, *s).map_err(|e| {
                    SlipstreamError::Validation(format!("normal source moments: {e}"))
                })
            })
            .collect::<SlipResult<_>>()?;
        let n_drivers = dists.len();
        let mut data = Vec::with_capacity(n_scenarios * n_drivers);
        for _ in 0..n_scenarios {
            for dist in &dists {
                // DK NASCAR scores are effectively non-negative.
                data.push(dist.sample(&mut rng).max(0.0));
            }
        }
        ScenarioMatrix::from_rows(data, n_scenarios, n_drivers)
    }

    fn n_drivers(&self) -> usize {
        self.means.len()
    }
}

/// Right-skewed source: a deterministic floor plus gamma-distributed upside,
/// matching each driver's projection in expectation. The heavy upper tail is
/// what separates a CVaR-optimized portfolio from a mean-optimized one, so
/// the tail-validation harness runs on this source.
#[derive(Debug, Clone)]
pub struct GammaUpsideSource {
    floors: Vec<f64>,
    upside_means: Vec<f64>,
    shape: f64,
}

impl GammaUpsideSource {
    /// `shape` controls skew: small shape means rarer, larger spikes.
    pub fn from_slate(slate: &Slate, shape: f64) -> Self {
        let floors = slate
            .drivers
            .iter()
            .map(|d| d.projected_points * 0.6)
            .collect();
        let upside_means = slate
            .drivers
            .iter()
            .map(|d| d.projected_points * 0.4)
            .collect();
        Self {
            floors,
            upside_means,
            shape,
        }
    }
}

impl ScenarioSource for GammaUpsideSource {
    fn sample(&self, n_scenarios: usize, seed: u64) -> SlipResult<ScenarioMatrix> {
        if n_scenarios == 0 {
            return Err(SlipstreamError::EmptyScenarios(
                "n_scenarios must be positive".into(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let dists: Vec<Gamma<f64>> = self
            .upside_means
            .iter()
            .map(|m| {
                let scale = (m / self.shape).max(1e-9);
                Gamma::new(self.shape, scale).map_err(|e| {
                    SlipstreamError::Validation(format!("gamma source parameters: {e}"))
                })
            })
            .collect::<SlipResult<_>>()?;
        let n_drivers = dists.len();
        let mut data = Vec::with_capacity(n_scenarios * n_drivers);
        for _ in 0..n_scenarios {
            for (floor, dist) in self.floors.iter().zip(&dists) {
                data.push(floor + dist.sample(&mut rng));
            }
        }
        ScenarioMatrix::from_rows(data, n_scenarios, n_drivers)
    }

    fn n_drivers(&self) -> usize {
        self.floors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipstream_core::{DriverId, DriverRecord};

    fn slate() -> Slate {
        Slate::new(
            "s1",
            vec![
                DriverRecord::new(DriverId::new(0), "d0", "A", "Red", 9000, 40.0),
                DriverRecord::new(DriverId::new(1), "d1", "B", "Blue", 8000, 30.0),
            ],
        )
    }

    #[test]
    fn normal_source_is_deterministic_under_seed() {
        let source = NormalFieldSource::from_slate(&slate(), &TrackConstraints::default());
        let a = source.sample(64, 7).unwrap();
        let b = source.sample(64, 7).unwrap();
        assert_eq!(a.row(10), b.row(10));
        let c = source.sample(64, 8).unwrap();
        assert_ne!(a.row(10), c.row(10));
    }

    #[test]
    fn gamma_source_matches_projection_in_expectation() {
        let source = GammaUpsideSource::from_slate(&slate(), 1.5);
        let m = source.sample(20_000, 11).unwrap();
        // Mean should land near the 40.0 projection for driver 0.
        let mean = m.driver_mean(DriverId::new(0));
        assert!((mean - 40.0).abs() < 1.0, "mean {mean} too far from 40.0");
    }

    #[test]
    fn gamma_source_is_right_skewed() {
        let source = GammaUpsideSource::from_slate(&slate(), 1.2);
        let m = source.sample(20_000, 3).unwrap();
        let mean = m.driver_mean(DriverId::new(0));
        let mut values: Vec<f64> = (0..m.n_scenarios())
            .map(|k| m.value(k, DriverId::new(0)))
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = values[values.len() / 2];
        assert!(mean > median, "gamma upside should pull mean above median");
    }

    #[test]
    fn zero_scenarios_rejected() {
        let source = NormalFieldSource::from_slate(&slate(), &TrackConstraints::default());
        assert!(source.sample(0, 1).is_err());
    }
}
