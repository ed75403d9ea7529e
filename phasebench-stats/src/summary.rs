//! Summary Means
//!
//! The three cross-test means reported per driver.

use crate::means::{arithmetic_mean, geometric_mean, harmonic_mean};
use serde::{Deserialize, Serialize};

/// Arithmetic, geometric and harmonic mean of one value series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryMeans {
    /// Arithmetic mean
    pub arithmetic: f64,
    /// Geometric mean
    pub geometric: f64,
    /// Harmonic mean
    pub harmonic: f64,
}

impl SummaryMeans {
    /// Compute all three means over `values`
    pub fn of(values: &[f64]) -> Self {
        Self {
            arithmetic: arithmetic_mean(values),
            geometric: geometric_mean(values),
            harmonic: harmonic_mean(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_means() {
        let means = SummaryMeans::of(&[1.0, 2.0, 4.0]);
        assert!((means.arithmetic - 7.0 / 3.0).abs() < 1e-9);
        assert!((means.geometric - 2.0).abs() < 1e-9);
        assert!((means.harmonic - 12.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_propagates() {
        let means = SummaryMeans::of(&[1.0, f64::NAN]);
        assert!(means.arithmetic.is_nan());
        assert!(means.harmonic.is_nan());
    }
}
