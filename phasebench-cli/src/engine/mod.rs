//! Execution Engine
//!
//! Sweeps every driver of a suite over every test case.
//!
//! ## Pipeline Overview
//!
//! ```text
//! TestSuite (materialized by the planner)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Load, then per row and test case:
//! │             │  prepare → warmup ⨯ N → run ⨯ N → finish
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ result_unit │  Derive tps / ms / mbps / %gctime
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  aggregate  │  Vertical then horizontal means, memoized
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   console   │  Per-row and summary lines
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  Parameter closure, result tree
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Driver sweep, thread pool dispatch and failure containment
//! - [`result_unit`] - Result unit parsing and derivation
//! - [`aggregate`] - Two-pass statistics aggregation
//! - [`memory`] - Collection and peak heap probes
//! - [`console`] - Console result lines
//! - [`metadata`] - Host description parameters
//! - [`report`] - Result tree for JSON and HTML output

mod aggregate;
mod console;
mod execution;
mod memory;
mod metadata;
mod report;
mod result_unit;

// Re-export public API
pub use aggregate::summarize;
pub use console::{Console, SharedBuffer};
pub use execution::Engine;
pub use memory::{AllocatorProbe, MemoryProbe};
pub use metadata::{apply_system_params, num_cpus, system_info};
pub use report::build_report;
pub use result_unit::{ResultUnit, UnitInputs, derive_results};

use crate::config::ConfigError;
use phasebench_core::{LoadError, ParamError};
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort a whole invocation
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid suite configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A suite-level parameter could not be read
    #[error(transparent)]
    Param(#[from] ParamError),

    /// A driver load failure that is a configuration mistake
    #[error(transparent)]
    Load(LoadError),

    /// The `mbps` unit needs an input file
    #[error("test case '{0}' uses result unit mbps but sets no phasebench.inputFile")]
    MissingInputFile(String),

    /// The input file of a test case cannot be inspected
    #[error("cannot read input file '{}': {source}", path.display())]
    InputFile {
        /// Configured path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Every driver failed to load
    #[error("Unable to load any of the drivers")]
    NoDriversLoaded,

    /// The per-driver worker pool could not be started
    #[error("cannot build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Writing result lines failed
    #[error("console output failed: {0}")]
    Console(#[from] std::io::Error),
}
