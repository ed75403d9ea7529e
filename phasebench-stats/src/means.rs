//! Means and Deviations
//!
//! Population statistics over result values. Empty inputs yield NaN.

/// Arithmetic mean `Σ xᵢ / n`
pub fn arithmetic_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Geometric mean `Π xᵢ^(1/n)`.
///
/// Accumulated as a running product of n-th roots so large inputs do not
/// overflow before the root is taken.
pub fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    values.iter().fold(1.0, |product, x| product * x.powf(1.0 / n))
}

/// Harmonic mean `1 / Σ (1 / (n·xᵢ))`.
///
/// Not special-cased: a zero input makes its reciprocal term infinite, and
/// a reciprocal sum of zero makes the mean `+∞`.
pub fn harmonic_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    1.0 / values.iter().map(|x| 1.0 / (n * x)).sum::<f64>()
}

/// Population standard deviation (biased, divides by `n`)
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mean = arithmetic_mean(values);
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
