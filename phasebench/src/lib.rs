#![warn(missing_docs)]
//! # PhaseBench
//!
//! Micro-benchmark harness with warmup and measurement phases, pluggable
//! drivers and multi-threaded measurement.
//!
//! - **Drivers**: implement [`BenchmarkDriver`] and register with `#[driver]`
//! - **Suites**: TOML files of parameters, drivers and test cases
//! - **Phases**: iteration-based or duration-based warmup and run loops
//! - **Aggregation**: per-test means and standard deviations, then
//!   arithmetic/geometric/harmonic means per driver
//! - **Reports**: `report.json` and `index.html` in a timestamped directory
//!
//! ## Quick Start
//!
//! ```ignore
//! use phasebench::prelude::*;
//!
//! #[driver(library = "strings")]
//! #[derive(Default)]
//! struct Concat(String);
//!
//! impl BenchmarkDriver for Concat {
//!     fn prepare(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
//!         self.0.clear();
//!         Ok(())
//!     }
//!
//!     fn run(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
//!         self.0.push('x');
//!         Ok(())
//!     }
//! }
//!
//! fn main() {
//!     std::process::exit(phasebench::run().unwrap_or(1));
//! }
//! ```
//!
//! ## Suite file
//!
//! ```toml
//! name = "strings"
//!
//! [params]
//! phasebench.runsPerDriver = 3
//! phasebench.runTime = "5"
//!
//! [[driver]]
//! name = "Concat"
//! params = { phasebench.resourcePath = "strings" }
//!
//! [[test_case]]
//! name = "append"
//! ```

// Re-export core types
pub use phasebench_core::{
    BenchmarkDriver, DriverDef, DriverFactory, DriverLoader, DriverRecord, Isolation, LoadError,
    ParamError, ParamScope, ParamValue, Phase, TestCase, TestSuite, TrackingAllocator,
    constants, current_allocation, format_double, parse_duration, peak_allocation,
    registered_drivers, reset_peak_allocation,
};

// Re-export the registration attribute
pub use phasebench_macros::driver;

// Re-export stats
pub use phasebench_stats::{
    SummaryMeans, arithmetic_mean, calculate_group_sizes, geometric_mean, harmonic_mean,
    standard_deviation,
};

// Re-export reports
pub use phasebench_report::{DriverReport, Report, SuiteReport, TestCaseReport, parse_json_report};

// Re-export the engine and command line
pub use phasebench_cli::{
    Cli, Commands, Console, Engine, EngineError, PlanOptions, RunArgs, SharedBuffer, SuiteConfig,
    build_report, build_suite, normalize_args, run_files, run_with_cli,
};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{BenchmarkDriver, DriverRecord, ParamScope, TestCase, driver};
}

/// Run the PhaseBench CLI harness.
///
/// Call this from your benchmark binary's `main()`; the returned count of
/// recoverable errors is the process exit status:
/// ```ignore
/// fn main() {
///     std::process::exit(phasebench::run().unwrap_or(1));
/// }
/// ```
pub use phasebench_cli::run;
