#![warn(missing_docs)]
//! PhaseBench Core - Records and Driver Runtime
//!
//! This crate provides the pieces the execution engine is built from:
//! - `ParamScope` hierarchical typed parameters with `${...}` interpolation
//! - `TestCase`, `DriverRecord` and `TestSuite` result records
//! - `BenchmarkDriver` lifecycle trait and the `BenchmarkUnit` phase loops
//! - `DriverLoader` isolation domains over `#[driver]` registrations
//! - Duration parsing and a tracking global allocator

mod allocator;
#[allow(missing_docs)]
pub mod constants;
mod driver;
mod loader;
mod measure;
mod params;
mod records;
mod unit;

pub use allocator::{TrackingAllocator, current_allocation, peak_allocation, reset_peak_allocation};
pub use driver::BenchmarkDriver;
pub use loader::{
    DriverDef, DriverFactory, DriverLoader, Isolation, LibraryDomain, LoadError, driver_class,
    parse_resource_path, registered_drivers,
};
pub use measure::{DurationError, Timer, duration_ms, format_hms, parse_duration};
pub use params::{ParamError, ParamScope, ParamValue, format_double};
pub use records::{
    DriverRecord, Phase, PhaseTotals, TestCase, TestSuite, apply_parameter_closure,
};
pub use unit::{BenchmarkUnit, PhaseError, panic_message};

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<DriverDef> {}
};
