//! Immutable (S × D) scenario matrix.

use serde::{Deserialize, Serialize};
use slipstream_core::{DriverId, SlipResult, SlipstreamError};

/// Row-major (S × D) matrix of driver fantasy points. Row order carries no
/// semantics; the column index is the dense driver index of the slate.
///
/// The matrix is immutable after construction and is shared behind `Arc`
/// by the scenario cache. Per-driver means and the cell extrema are computed
/// once here because the bounded CVaR formulation needs them on every solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioMatrix {
    data: Vec<f64>,
    n_scenarios: usize,
    n_drivers: usize,
    means: Vec<f64>,
    min_cell: f64,
    max_cell: f64,
}

impl ScenarioMatrix {
    /// Build from a row-major buffer. `data.len()` must equal
    /// `n_scenarios * n_drivers` and both dimensions must be positive.
    pub fn from_rows(data: Vec<f64>, n_scenarios: usize, n_drivers: usize) -> SlipResult<Self> {
        if n_scenarios == 0 || n_drivers == 0 {
            return Err(SlipstreamError::EmptyScenarios(format!(
                "scenario matrix must be non-empty, got {} x {}",
                n_scenarios, n_drivers
            )));
        }
        if data.len() != n_scenarios * n_drivers {
            return Err(SlipstreamError::Validation(format!(
                "scenario buffer length {} != {} x {}",
                data.len(),
                n_scenarios,
                n_drivers
            )));
        }
        let mut means = vec![0.0; n_drivers];
        let mut min_cell = f64::INFINITY;
        let mut max_cell = f64::NEG_INFINITY;
        for row in data.chunks_exact(n_drivers) {
            for (i, v) in row.iter().enumerate() {
                means[i] += v;
                if *v < min_cell {
                    min_cell = *v;
                }
                if *v > max_cell {
                    max_cell = *v;
                }
            }
        }
        for m in &mut means {
            *m /= n_scenarios as f64;
        }
        Ok(Self {
            data,
            n_scenarios,
            n_drivers,
            means,
            min_cell,
            max_cell,
        })
    }

    #[inline]
    pub fn n_scenarios(&self) -> usize {
        self.n_scenarios
    }

    #[inline]
    pub fn n_drivers(&self) -> usize {
        self.n_drivers
    }

    /// One scenario row: points for every driver under scenario `k`.
    #[inline]
    pub fn row(&self, k: usize) -> &[f64] {
        &self.data[k * self.n_drivers..(k + 1) * self.n_drivers]
    }

    #[inline]
    pub fn value(&self, k: usize, driver: DriverId) -> f64 {
        self.data[k * self.n_drivers + driver.value()]
    }

    /// Scenario-mean points for one driver.
    #[inline]
    pub fn driver_mean(&self, driver: DriverId) -> f64 {
        self.means[driver.value()]
    }

    #[inline]
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    #[inline]
    pub fn min_cell(&self) -> f64 {
        self.min_cell
    }

    #[inline]
    pub fn max_cell(&self) -> f64 {
        self.max_cell
    }

    /// Per-scenario total points of a lineup: the masked dense row sum
    /// `p_k = Σ_{i ∈ L} s_{k,i}`, computed row-contiguously. This is the
    /// mat-vec primitive of the per-lineup algorithm; callers must not
    /// re-implement it element-by-element.
    pub fn lineup_series(&self, drivers: &[DriverId]) -> Vec<f64> {
        let cols: Vec<usize> = drivers.iter().map(|d| d.value()).collect();
        self.data
            .chunks_exact(self.n_drivers)
            .map(|row| cols.iter().map(|&c| row[c]).sum())
            .collect()
    }

    /// Rows selected by index, as a new matrix (regime partitioning).
    pub fn subset(&self, rows: &[usize]) -> SlipResult<ScenarioMatrix> {
        if rows.is_empty() {
            return Err(SlipstreamError::EmptyScenarios(
                "scenario subset selects no rows".into(),
            ));
        }
        let mut data = Vec::with_capacity(rows.len() * self.n_drivers);
        for &k in rows {
            data.extend_from_slice(self.row(k));
        }
        ScenarioMatrix::from_rows(data, rows.len(), self.n_drivers)
    }

    /// Approximate heap footprint, used for the cache byte budget.
    pub fn approx_bytes(&self) -> usize {
        (self.data.len() + self.means.len()) * std::mem::size_of::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix() -> ScenarioMatrix {
        // 3 scenarios x 2 drivers
        ScenarioMatrix::from_rows(vec![10.0, 1.0, 20.0, 2.0, 30.0, 3.0], 3, 2).unwrap()
    }

    #[test]
    fn means_and_extrema() {
        let m = matrix();
        assert_relative_eq!(m.driver_mean(DriverId::new(0)), 20.0);
        assert_relative_eq!(m.driver_mean(DriverId::new(1)), 2.0);
        assert_relative_eq!(m.min_cell(), 1.0);
        assert_relative_eq!(m.max_cell(), 30.0);
    }

    #[test]
    fn lineup_series_is_masked_row_sum() {
        let m = matrix();
        let series = m.lineup_series(&[DriverId::new(0), DriverId::new(1)]);
        assert_eq!(series, vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn subset_selects_rows() {
        let m = matrix();
        let sub = m.subset(&[2, 0]).unwrap();
        assert_eq!(sub.n_scenarios(), 2);
        assert_eq!(sub.row(0), &[30.0, 3.0]);
        assert_eq!(sub.row(1), &[10.0, 1.0]);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        assert!(ScenarioMatrix::from_rows(vec![1.0; 5], 2, 3).is_err());
        assert!(ScenarioMatrix::from_rows(vec![], 0, 3).is_err());
    }
}
