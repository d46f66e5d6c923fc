//! Normalized ownership vectors.

use serde::{Deserialize, Serialize};

use crate::error::{SlipResult, SlipstreamError};
use crate::DriverId;

/// A length-D non-negative vector normalized to sum to 100 (percent).
/// Index matches the dense driver index of the slate it was built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipVector(Vec<f64>);

impl OwnershipVector {
    /// Normalize a raw non-negative vector to percent. Rejects negative
    /// entries, non-finite entries, and an all-zero vector.
    pub fn new(raw: Vec<f64>) -> SlipResult<Self> {
        if raw.is_empty() {
            return Err(SlipstreamError::Validation(
                "ownership vector is empty".into(),
            ));
        }
        let mut sum = 0.0;
        for (i, v) in raw.iter().enumerate() {
            if !v.is_finite() || *v < 0.0 {
                return Err(SlipstreamError::Validation(format!(
                    "ownership[{}] = {} is not a non-negative finite number",
                    i, v
                )));
            }
            sum += v;
        }
        if sum <= 0.0 {
            return Err(SlipstreamError::Validation(
                "ownership vector sums to zero".into(),
            ));
        }
        Ok(Self(raw.into_iter().map(|v| v * 100.0 / sum).collect()))
    }

    /// Uniform ownership over `n` drivers.
    pub fn uniform(n: usize) -> SlipResult<Self> {
        Self::new(vec![1.0; n])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ownership percent for a dense driver index.
    #[inline]
    pub fn get(&self, id: DriverId) -> f64 {
        self.0.get(id.value()).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Dense ids with ownership strictly below the threshold (percent).
    pub fn below(&self, threshold: f64) -> Vec<DriverId> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, v)| **v < threshold)
            .map(|(i, _)| DriverId::new(i))
            .collect()
    }
}
