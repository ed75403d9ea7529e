//! Test Case, Driver and Suite Records
//!
//! Records hold configuration plus raw and aggregated results. A driver's
//! run matrix has one row per warmup or measured run; each row holds its own
//! copies of the suite's test cases, re-parented onto the driver scope.
//!
//! ```text
//! DriverRecord
//!   ├── rows[0..warmups+runs][0..test_cases]   raw per-run records
//!   └── aggregates[0..test_cases]              cross-run means/stddevs
//! ```

use crate::constants::{NOT_APPLICABLE, RESULT_VALUE};
use crate::params::{ParamError, ParamScope};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

/// Execution phase of a Benchmark Unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Warmup iterations, excluded from statistics
    Warmup,
    /// Measured iterations
    Run,
}

impl Phase {
    /// Lower-case phase label
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Warmup => "warmup",
            Phase::Run => "run",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summed iteration count and elapsed time for one phase
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTotals {
    /// Iterations summed across every contributing unit
    pub iterations: u64,
    /// Elapsed milliseconds summed across every contributing unit
    pub elapsed_ms: f64,
}

#[derive(Debug, Default)]
struct Accumulator {
    warmup: PhaseTotals,
    run: PhaseTotals,
}

/// One named workload variant
#[derive(Debug)]
pub struct TestCase {
    name: String,
    params: Arc<ParamScope>,
    totals: Mutex<Accumulator>,
}

impl TestCase {
    /// Create a test case whose scope falls back to `parent`
    pub fn new(name: impl Into<String>, parent: &Arc<ParamScope>) -> Self {
        Self::with_scope(name, ParamScope::with_parent(parent.clone()))
    }

    fn with_scope(name: impl Into<String>, scope: ParamScope) -> Self {
        Self {
            name: name.into(),
            params: Arc::new(scope),
            totals: Mutex::new(Accumulator::default()),
        }
    }

    /// Test case name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter scope of this test case
    pub fn params(&self) -> &Arc<ParamScope> {
        &self.params
    }

    /// Copy this test case under a new parent.
    ///
    /// Everything visible from the non-global part of the current chain is
    /// flattened into the copy's own scope; accumulators start at zero.
    pub fn rebind(&self, parent: &Arc<ParamScope>) -> TestCase {
        let scope = ParamScope::with_parent(parent.clone());
        for (name, value) in self.params.local_values() {
            scope.set_value(&name, value);
        }
        Self::with_scope(self.name.clone(), scope)
    }

    /// Add one unit's contribution to a phase accumulator
    pub fn accumulate(&self, phase: Phase, iterations: u64, elapsed_ms: f64) {
        let mut totals = self.totals.lock();
        let slot = match phase {
            Phase::Warmup => &mut totals.warmup,
            Phase::Run => &mut totals.run,
        };
        slot.iterations += iterations;
        slot.elapsed_ms += elapsed_ms;
    }

    /// Current totals of a phase accumulator
    pub fn totals(&self, phase: Phase) -> PhaseTotals {
        let totals = self.totals.lock();
        match phase {
            Phase::Warmup => totals.warmup,
            Phase::Run => totals.run,
        }
    }

    /// Result value, NaN if unset or unreadable
    pub fn result_value(&self) -> f64 {
        self.params.get_double(RESULT_VALUE).unwrap_or(f64::NAN)
    }
}

/// A named, loadable benchmark implementation plus its configuration
#[derive(Debug)]
pub struct DriverRecord {
    name: String,
    base_name: Option<String>,
    normal: bool,
    params: Arc<ParamScope>,
    warmups: usize,
    rows: Vec<Vec<Arc<TestCase>>>,
    aggregates: Vec<Arc<TestCase>>,
    means: OnceLock<()>,
}

impl DriverRecord {
    /// Create a driver whose scope falls back to `parent`
    pub fn new(name: impl Into<String>, parent: &Arc<ParamScope>) -> Self {
        Self::with_scope(name, ParamScope::with_parent(parent.clone()))
    }

    fn with_scope(name: impl Into<String>, scope: ParamScope) -> Self {
        Self {
            name: name.into(),
            base_name: None,
            normal: false,
            params: Arc::new(scope),
            warmups: 0,
            rows: Vec::new(),
            aggregates: Vec::new(),
            means: OnceLock::new(),
        }
    }

    /// Clone this driver's configuration under a new name.
    ///
    /// The parameter scope is deep-copied; results are not carried over.
    pub fn derive(&self, name: impl Into<String>) -> DriverRecord {
        let mut derived = Self::with_scope(name, self.params.deep_copy());
        derived.base_name = Some(self.name.clone());
        derived.normal = self.normal;
        derived
    }

    /// Driver name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the base driver this one was derived from
    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    /// Whether this driver is the 100% baseline of relative charts
    pub fn is_normal(&self) -> bool {
        self.normal
    }

    /// Mark this driver as the normalizer
    pub fn set_normal(&mut self, normal: bool) {
        self.normal = normal;
    }

    /// Parameter scope of this driver
    pub fn params(&self) -> &Arc<ParamScope> {
        &self.params
    }

    /// Build the run matrix from template test cases.
    ///
    /// Produces exactly `warmups + runs` rows plus one aggregate list, every
    /// entry an independent copy parented on this driver's scope.
    pub fn set_test_cases(&mut self, templates: &[TestCase], warmups: usize, runs: usize) {
        self.warmups = warmups;
        self.rows = (0..warmups + runs)
            .map(|_| {
                templates
                    .iter()
                    .map(|tc| Arc::new(tc.rebind(&self.params)))
                    .collect()
            })
            .collect();
        self.aggregates = templates
            .iter()
            .map(|tc| Arc::new(tc.rebind(&self.params)))
            .collect();
        self.means = OnceLock::new();
    }

    /// Number of warmup rows at the start of the matrix
    pub fn warmups(&self) -> usize {
        self.warmups
    }

    /// Number of measured rows
    pub fn runs(&self) -> usize {
        self.rows.len().saturating_sub(self.warmups)
    }

    /// Every row of the run matrix
    pub fn rows(&self) -> &[Vec<Arc<TestCase>>] {
        &self.rows
    }

    /// Rows after the warmup rows
    pub fn measured_rows(&self) -> &[Vec<Arc<TestCase>>] {
        &self.rows[self.warmups.min(self.rows.len())..]
    }

    /// Aggregated per-test records
    pub fn aggregates(&self) -> &[Arc<TestCase>] {
        &self.aggregates
    }

    /// Run `compute` the first time it is requested, never again
    pub fn memoize_means(&self, compute: impl FnOnce(&DriverRecord)) {
        self.means.get_or_init(|| compute(self));
    }

    /// Whether the summary means were computed
    pub fn means_computed(&self) -> bool {
        self.means.get().is_some()
    }
}

/// A suite of drivers run over a shared list of test cases
#[derive(Debug)]
pub struct TestSuite {
    name: String,
    params: Arc<ParamScope>,
    drivers: Vec<Arc<DriverRecord>>,
    test_cases: Vec<TestCase>,
}

impl TestSuite {
    /// Create a suite owning the global scope `params`
    pub fn new(name: impl Into<String>, params: Arc<ParamScope>) -> Self {
        Self {
            name: name.into(),
            params,
            drivers: Vec::new(),
            test_cases: Vec::new(),
        }
    }

    /// Suite name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global parameter scope
    pub fn params(&self) -> &Arc<ParamScope> {
        &self.params
    }

    /// Append a driver
    pub fn push_driver(&mut self, driver: DriverRecord) {
        self.drivers.push(Arc::new(driver));
    }

    /// Drivers in execution order
    pub fn drivers(&self) -> &[Arc<DriverRecord>] {
        &self.drivers
    }

    /// Keep only the drivers matching `keep`
    pub fn retain_drivers(&mut self, keep: impl FnMut(&Arc<DriverRecord>) -> bool) {
        self.drivers.retain(keep);
    }

    /// Append a template test case
    pub fn push_test_case(&mut self, test_case: TestCase) {
        self.test_cases.push(test_case);
    }

    /// Template test cases
    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Configured thread count
    pub fn threads(&self) -> Result<usize, ParamError> {
        self.count(crate::constants::NUMBER_OF_THREADS)
    }

    /// Configured warmup rows per driver
    pub fn warmups(&self) -> Result<usize, ParamError> {
        self.count(crate::constants::WARMUPS_PER_DRIVER)
    }

    /// Configured measured rows per driver
    pub fn runs(&self) -> Result<usize, ParamError> {
        self.count(crate::constants::RUNS_PER_DRIVER)
    }

    fn count(&self, name: &str) -> Result<usize, ParamError> {
        let value = self.params.get_long(name)?;
        usize::try_from(value).map_err(|_| ParamError::TypeConversion {
            name: name.to_string(),
            value: value.to_string(),
            target: "count",
        })
    }
}

/// Backfill names a sibling defines locally but another lacks.
///
/// After this, every scope in `siblings` answers `has_local` for the same
/// set of names; missing ones read as [`NOT_APPLICABLE`].
pub fn apply_parameter_closure<S: AsRef<ParamScope>>(siblings: &[S]) {
    let closure: BTreeSet<String> = siblings
        .iter()
        .flat_map(|scope| scope.as_ref().local_names())
        .collect();

    for scope in siblings {
        let scope = scope.as_ref();
        for name in &closure {
            if !scope.has_local(name) {
                scope.set_value(name, NOT_APPLICABLE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RESULT_VALUE, RUN_ITERATIONS};

    fn suite_scope() -> Arc<ParamScope> {
        let scope = Arc::new(ParamScope::new());
        scope.set(RUN_ITERATIONS, "10").unwrap();
        scope
    }

    #[test]
    fn test_set_test_cases_builds_matrix() {
        let global = suite_scope();
        let templates = vec![TestCase::new("a", &global), TestCase::new("b", &global)];
        templates[0].params().set("size", "10").unwrap();

        let mut driver = DriverRecord::new("d", &global);
        driver.set_test_cases(&templates, 1, 2);

        assert_eq!(driver.rows().len(), 3);
        assert_eq!(driver.runs(), 2);
        assert_eq!(driver.measured_rows().len(), 2);
        assert_eq!(driver.aggregates().len(), 2);

        let row0 = &driver.rows()[0][0];
        let row1 = &driver.rows()[1][0];
        assert!(!Arc::ptr_eq(row0, row1));
        assert!(Arc::ptr_eq(row0.params().parent().unwrap(), driver.params()));
        assert_eq!(row0.params().get_long("size").unwrap(), 10);
        assert_eq!(row0.params().get_long(RUN_ITERATIONS).unwrap(), 10);

        row0.params().set_value(RESULT_VALUE, 1.0);
        assert!(row1.result_value().is_nan());
    }

    #[test]
    fn test_accumulator_is_additive() {
        let global = suite_scope();
        let tc = Arc::new(TestCase::new("t", &global));
        std::thread::scope(|s| {
            for _ in 0..8 {
                let tc = tc.clone();
                s.spawn(move || {
                    for _ in 0..50 {
                        tc.accumulate(Phase::Run, 2, 0.5);
                    }
                });
            }
        });
        let totals = tc.totals(Phase::Run);
        assert_eq!(totals.iterations, 800);
        assert!((totals.elapsed_ms - 200.0).abs() < 1e-9);
        assert_eq!(tc.totals(Phase::Warmup), PhaseTotals::default());
    }

    #[test]
    fn test_derive_deep_copies_params() {
        let global = suite_scope();
        let mut base = DriverRecord::new("base", &global);
        base.set_normal(true);
        base.params().set("k", "1").unwrap();

        let derived = base.derive("child");
        derived.params().set("k", "2").unwrap();

        assert_eq!(derived.base_name(), Some("base"));
        assert!(derived.is_normal());
        assert_eq!(base.params().get_long("k").unwrap(), 1);
        assert_eq!(derived.params().get_long("k").unwrap(), 2);
    }

    #[test]
    fn test_parameter_closure_backfills() {
        let global = suite_scope();
        let a = TestCase::new("a", &global);
        let b = TestCase::new("b", &global);
        a.params().set("only.a", "1").unwrap();
        b.params().set("only.b", "2").unwrap();

        apply_parameter_closure(&[a.params(), b.params()]);

        assert_eq!(a.params().get("only.b").as_deref(), Some(NOT_APPLICABLE));
        assert_eq!(b.params().get("only.a").as_deref(), Some(NOT_APPLICABLE));
        assert_eq!(a.params().local_names(), b.params().local_names());
        assert!(!a.params().has_local(RUN_ITERATIONS));
    }

    #[test]
    fn test_memoize_means_runs_once() {
        let global = suite_scope();
        let driver = DriverRecord::new("d", &global);
        let mut calls = 0;
        driver.memoize_means(|_| calls += 1);
        driver.memoize_means(|_| calls += 1);
        assert_eq!(calls, 1);
        assert!(driver.means_computed());
    }
}
