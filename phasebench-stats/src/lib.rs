#![warn(missing_docs)]
//! PhaseBench Statistics
//!
//! Reduction primitives used by the two-pass aggregation:
//! - Arithmetic, geometric and harmonic means
//! - Population (biased) standard deviation
//! - Group-size partitioning for plotted driver sets

mod groups;
mod means;
mod summary;

pub use groups::calculate_group_sizes;
pub use means::{arithmetic_mean, geometric_mean, harmonic_mean, standard_deviation};
pub use summary::SummaryMeans;
