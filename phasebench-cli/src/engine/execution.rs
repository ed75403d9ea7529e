//! Driver Sweep Execution
//!
//! ## Data Flow
//!
//! ```text
//! DriverRecord ──► DriverLoader::domain_for ──► threads × rows BenchmarkUnits
//!                                                   │
//!        per row, per test case                     ▼
//!   prepare (sequential) ─► warmup (pool, join) ─► run (pool, join) ─► finish (sequential)
//!                                                   │
//!                                                   ▼
//!                     published sums ─► derived result value ─► aggregate
//! ```
//!
//! With one thread the calling thread runs both phases directly; otherwise
//! a pool of exactly `numberOfThreads` workers is built once per driver.
//! A failing test case gets a NaN result and never stops the sweep.

use super::console::Console;
use super::memory::{AllocatorProbe, MemoryProbe};
use super::metadata::num_cpus;
use super::{EngineError, aggregate, result_unit};
use parking_lot::Mutex;
use phasebench_core::constants::*;
use phasebench_core::{
    BenchmarkUnit, DriverLoader, DriverRecord, Phase, PhaseError, TestCase, TestSuite,
    driver_class, parse_duration,
};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs a materialized suite
pub struct Engine {
    loader: DriverLoader,
    probe: Box<dyn MemoryProbe>,
    console: Console,
    silent: bool,
    cpus: usize,
    error_count: usize,
}

enum Outcome {
    Completed,
    Dropped,
}

impl Engine {
    /// Engine printing to stdout and probing the tracking allocator
    pub fn new(loader: DriverLoader) -> Self {
        Self {
            loader,
            probe: Box::new(AllocatorProbe::default()),
            console: Console::stdout(false),
            silent: false,
            cpus: num_cpus(),
            error_count: 0,
        }
    }

    /// Replace the console
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Replace the memory probe
    pub fn with_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Suppress error chains of failed test cases
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Loader, for registering resource sets
    pub fn loader_mut(&mut self) -> &mut DriverLoader {
        &mut self.loader
    }

    /// Recoverable errors counted so far
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Sweep every driver; returns the recoverable error count.
    ///
    /// Drivers that fail to load are removed from `suite`.
    pub fn run(&mut self, suite: &mut TestSuite) -> Result<usize, EngineError> {
        let threads = suite.threads()?;
        let drivers: Vec<Arc<DriverRecord>> = suite.drivers().to_vec();

        self.console
            .suite_header(suite.name(), drivers.len(), suite.test_cases().len())?;
        if let Some(total_ms) = estimated_time_ms(suite)? {
            self.console.estimated_time(total_ms)?;
        }

        let mut dropped = HashSet::new();
        for driver in &drivers {
            if let Outcome::Dropped = self.run_driver(suite, driver, threads)? {
                dropped.insert(driver.name().to_string());
            }
        }

        suite.retain_drivers(|d| !dropped.contains(d.name()));
        if suite.drivers().is_empty() {
            tracing::error!(suite = suite.name(), "No driver could be loaded");
            return Err(EngineError::NoDriversLoaded);
        }
        Ok(self.error_count)
    }

    fn run_driver(
        &mut self,
        suite: &TestSuite,
        driver: &Arc<DriverRecord>,
        threads: usize,
    ) -> Result<Outcome, EngineError> {
        self.console.driver_header(driver.name(), threads, self.cpus)?;

        let Some(mut units) = self.allocate_units(suite, driver, threads)? else {
            return Ok(Outcome::Dropped);
        };

        let pool = if threads > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("phasebench-worker-{i}"))
                    .build()?,
            )
        } else {
            None
        };

        let cancel = Arc::new(AtomicBool::new(false));
        for unit in units.iter_mut().flatten() {
            unit.set_cancel_flag(cancel.clone());
        }

        self.probe.begin_sweep();

        let warmups = driver.warmups();
        for (index, (row, row_units)) in driver.rows().iter().zip(units.iter_mut()).enumerate() {
            let (label, number) = if index < warmups {
                ("Warmup", index + 1)
            } else {
                ("Run", index - warmups + 1)
            };
            self.console.row_start(label, number)?;

            let mut values = Vec::with_capacity(row.len());
            for tc in row {
                self.run_test_case(pool.as_ref(), row_units, driver.name(), tc, threads, &cancel)?;
                let value = tc.result_value();
                values.push(value);
                self.console.value(value)?;
            }
            self.console.row_end(&values)?;
        }

        for unit in units.iter_mut().flatten() {
            if let Err(e) = unit.terminate() {
                self.recoverable(driver.name(), &e);
            }
        }
        drop(units);
        drop(pool);

        let peak_kb = self.probe.peak_usage_bytes() as f64 / 1024.0;
        driver.params().set_value(PEAK_HEAP_USAGE, peak_kb);

        aggregate::summarize(driver);
        if driver.runs() > 1 {
            let aggregates = driver.aggregates();
            let read = |name: &str| -> Vec<f64> {
                aggregates
                    .iter()
                    .map(|tc| tc.params().get_double(name).unwrap_or(f64::NAN))
                    .collect()
            };
            self.console.summary("Avgs", &read(RESULT_VALUE))?;
            self.console.summary("Stdev", &read(RESULT_VALUE_STDDEV))?;
        }
        if driver.params().has(REPORT_PEAK_HEAP_USAGE) && driver.params().get_bool(REPORT_PEAK_HEAP_USAGE)? {
            self.console.peak_heap(peak_kb)?;
        }

        Ok(Outcome::Completed)
    }

    /// One unit per (row, thread); `None` when the driver has to be dropped
    fn allocate_units(
        &mut self,
        suite: &TestSuite,
        driver: &Arc<DriverRecord>,
        threads: usize,
    ) -> Result<Option<Vec<Vec<BenchmarkUnit>>>, EngineError> {
        let factory = match self.loader.domain_for(driver) {
            Ok(factory) => factory,
            Err(e) if e.is_fatal() => return Err(EngineError::Load(e)),
            Err(e) => {
                self.load_failed(driver.name(), &e);
                return Ok(None);
            }
        };
        let class = driver_class(driver);

        let mut units = Vec::with_capacity(driver.rows().len());
        for _ in driver.rows() {
            let mut row = Vec::with_capacity(threads);
            for _ in 0..threads {
                let instance = match factory.instantiate(driver.name(), &class) {
                    Ok(instance) => instance,
                    Err(e) if e.is_fatal() => return Err(EngineError::Load(e)),
                    Err(e) => {
                        self.load_failed(driver.name(), &e);
                        return Ok(None);
                    }
                };
                let mut unit = BenchmarkUnit::new(instance, driver.clone(), suite.params().clone());
                if let Err(e) = unit.initialize() {
                    self.load_failed(driver.name(), &e);
                    return Ok(None);
                }
                row.push(unit);
            }
            units.push(row);
        }

        debug!(driver = driver.name(), %class, units = units.len() * threads, "Driver loaded");
        Ok(Some(units))
    }

    fn run_test_case(
        &mut self,
        pool: Option<&ThreadPool>,
        units: &mut [BenchmarkUnit],
        driver: &str,
        tc: &Arc<TestCase>,
        threads: usize,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        cancel.store(false, Ordering::Relaxed);
        for unit in units.iter_mut() {
            unit.set_test_case(tc.clone());
        }

        let measured = self.measure(pool, units, tc, threads, cancel);

        // Finish runs even when a phase failed
        let mut finished: Result<(), PhaseError> = Ok(());
        for unit in units.iter_mut() {
            if let Err(e) = unit.finish() {
                if finished.is_ok() {
                    finished = Err(e);
                }
            }
        }

        match measured.and(finished.map_err(anyhow::Error::from)) {
            Ok(()) => result_unit::derive_results(tc, threads, self.cpus),
            Err(e) => {
                mark_failed(tc);
                self.error_count += 1;
                warn!(driver, test_case = tc.name(), "Test case failed: {e:#}");
                if !self.silent {
                    eprintln!("\n  Test case '{}' of driver '{driver}' failed: {e:?}", tc.name());
                }
                Ok(())
            }
        }
    }

    fn measure(
        &mut self,
        pool: Option<&ThreadPool>,
        units: &mut [BenchmarkUnit],
        tc: &Arc<TestCase>,
        threads: usize,
        cancel: &Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        for unit in units.iter_mut() {
            unit.prepare()?;
        }

        let deadline = phase_deadline(tc, WARMUP_TIME)?;
        dispatch(pool, units, deadline, cancel)?;
        publish(tc, Phase::Warmup, threads);

        self.probe.request_collection();
        let gc_before = self.probe.collection_time_ms();

        let deadline = phase_deadline(tc, RUN_TIME)?;
        dispatch(pool, units, deadline, cancel)?;
        tc.params()
            .set_value(GC_TIME, self.probe.collection_time_ms() - gc_before);
        publish(tc, Phase::Run, threads);

        debug!(
            test_case = tc.name(),
            iterations = tc.totals(Phase::Run).iterations,
            "Run phase joined"
        );
        Ok(())
    }

    fn load_failed(&mut self, driver: &str, error: &dyn Display) {
        self.error_count += 1;
        warn!(driver, "Unable to load driver: {error}");
    }

    fn recoverable(&mut self, driver: &str, error: &PhaseError) {
        self.error_count += 1;
        warn!(driver, "{error}");
    }
}

/// Run the next phase of every unit and wait for all of them.
///
/// The first failure raises `cancel` so siblings stop early; every unit is
/// joined before the first error is returned.
fn dispatch(
    pool: Option<&ThreadPool>,
    units: &mut [BenchmarkUnit],
    deadline: Option<Instant>,
    cancel: &AtomicBool,
) -> Result<(), PhaseError> {
    for unit in units.iter_mut() {
        unit.set_deadline(deadline);
    }

    let Some(pool) = pool else {
        for unit in units.iter_mut() {
            unit.execute()?;
        }
        return Ok(());
    };

    let errors: Mutex<Vec<PhaseError>> = Mutex::new(Vec::new());
    pool.scope(|scope| {
        for unit in units.iter_mut() {
            let errors = &errors;
            scope.spawn(move |_| {
                if let Err(e) = unit.execute() {
                    cancel.store(true, Ordering::Relaxed);
                    errors.lock().push(e);
                }
            });
        }
    });

    match errors.into_inner().into_iter().next() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn phase_deadline(tc: &TestCase, name: &str) -> anyhow::Result<Option<Instant>> {
    let Some(raw) = tc.params().get(name) else {
        return Ok(None);
    };
    let ms = parse_duration(&raw).map_err(|e| anyhow::anyhow!("{name}: {e}"))?;
    Ok(Some(Instant::now() + Duration::from_millis(ms)))
}

fn publish(tc: &TestCase, phase: Phase, threads: usize) {
    let totals = tc.totals(phase);
    let (iterations, time, actual) = match phase {
        Phase::Warmup => (WARMUP_ITERATIONS_SUM, WARMUP_TIME_SUM, ACTUAL_WARMUP_TIME),
        Phase::Run => (RUN_ITERATIONS_SUM, RUN_TIME_SUM, ACTUAL_RUN_TIME),
    };
    let params = tc.params();
    params.set_value(iterations, totals.iterations as i64);
    params.set_value(time, totals.elapsed_ms);
    params.set_value(actual, totals.elapsed_ms / threads as f64);
}

fn mark_failed(tc: &TestCase) {
    let params = tc.params();
    params.set_value(RESULT_VALUE, f64::NAN);
    params.set_value(RUN_ITERATIONS_SUM, 0i64);
    params.set_value(RUN_TIME_SUM, f64::NAN);
    params.set_value(ACTUAL_RUN_TIME, f64::NAN);
}

/// Total warmup plus run time when every phase of the suite is time-based
fn estimated_time_ms(suite: &TestSuite) -> Result<Option<u64>, EngineError> {
    let params = suite.params();
    let (Some(warmup), Some(run)) = (params.get(WARMUP_TIME), params.get(RUN_TIME)) else {
        return Ok(None);
    };
    let duration = |name: &str, raw: &str| {
        parse_duration(raw).map_err(|source| crate::config::ConfigError::Duration {
            name: name.to_string(),
            source,
        })
    };
    let per_test = duration(WARMUP_TIME, &warmup)? + duration(RUN_TIME, &run)?;
    let rows = (suite.warmups()? + suite.runs()?) as u64;
    let total = per_test * rows * suite.test_cases().len() as u64 * suite.drivers().len() as u64;
    Ok(Some(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::console::SharedBuffer;
    use phasebench_core::{BenchmarkDriver, DriverDef, ParamScope};
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter;

    impl BenchmarkDriver for Counter {
        fn run(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
            std::hint::black_box(0u64.wrapping_add(1));
            Ok(())
        }
    }

    static FINISHED: AtomicUsize = AtomicUsize::new(0);

    /// Fails the run phase of test case "bad", counts finish calls
    #[derive(Default)]
    struct Picky;

    impl BenchmarkDriver for Picky {
        fn warmup(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
            Ok(())
        }

        fn run(&mut self, tc: &TestCase) -> anyhow::Result<()> {
            if tc.name() == "bad" {
                anyhow::bail!("refusing {}", tc.name());
            }
            Ok(())
        }

        fn finish(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
            FINISHED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Panicky;

    impl BenchmarkDriver for Panicky {
        fn run(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
            panic!("worker blew up");
        }
    }

    /// Supplies its own result value
    #[derive(Default)]
    struct SelfScoring;

    impl BenchmarkDriver for SelfScoring {
        fn run(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
            Ok(())
        }

        fn finish(&mut self, tc: &TestCase) -> anyhow::Result<()> {
            tc.params().set_value(RESULT_VALUE, 42.0);
            Ok(())
        }
    }

    fn counter() -> Box<dyn BenchmarkDriver> {
        Box::new(Counter)
    }
    fn picky() -> Box<dyn BenchmarkDriver> {
        Box::new(Picky)
    }
    fn panicky() -> Box<dyn BenchmarkDriver> {
        Box::new(Panicky)
    }
    fn self_scoring() -> Box<dyn BenchmarkDriver> {
        Box::new(SelfScoring)
    }

    macro_rules! def {
        ($name:ident, $class:literal, $create:ident) => {
            static $name: DriverDef = DriverDef {
                library: "engine-tests",
                class: $class,
                create: $create,
                module_path: module_path!(),
                file: file!(),
                line: line!(),
            };
        };
    }

    def!(COUNTER, "Counter", counter);
    def!(PICKY, "Picky", picky);
    def!(PANICKY, "Panicky", panicky);
    def!(SELF_SCORING, "SelfScoring", self_scoring);

    fn engine() -> (Engine, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let loader = DriverLoader::with_registry(vec![&COUNTER, &PICKY, &PANICKY, &SELF_SCORING]);
        let engine = Engine::new(loader)
            .with_console(Console::new(Box::new(buffer.clone()), false))
            .silent(true);
        (engine, buffer)
    }

    fn suite(threads: usize, warmups: usize, runs: usize, iterations: u64, drivers: &[&str], tests: &[&str]) -> TestSuite {
        let global = Arc::new(ParamScope::new());
        global.set_value(NUMBER_OF_THREADS, threads as i64);
        global.set_value(WARMUPS_PER_DRIVER, warmups as i64);
        global.set_value(RUNS_PER_DRIVER, runs as i64);
        global.set_value(WARMUP_ITERATIONS, iterations as i64);
        global.set_value(RUN_ITERATIONS, iterations as i64);
        global.set_value(RESULT_UNIT, "tps");

        let mut suite = TestSuite::new("engine", global.clone());
        let templates: Vec<TestCase> = tests.iter().map(|name| TestCase::new(*name, &global)).collect();
        for name in drivers {
            let mut driver = DriverRecord::new(*name, &global);
            driver.set_test_cases(&templates, warmups, runs);
            suite.push_driver(driver);
        }
        for template in templates {
            suite.push_test_case(template);
        }
        suite
    }

    #[test]
    fn test_four_threads_accumulate_exactly() {
        let (mut engine, _) = engine();
        let mut suite = suite(4, 0, 1, 100, &["Counter"], &["t"]);
        assert_eq!(engine.run(&mut suite).unwrap(), 0);

        let tc = &suite.drivers()[0].rows()[0][0];
        assert_eq!(tc.params().get_long(RUN_ITERATIONS_SUM).unwrap(), 400);
        assert_eq!(tc.params().get_long(WARMUP_ITERATIONS_SUM).unwrap(), 400);
        assert!(tc.result_value() > 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_no_lost_updates(threads in 2usize..=6, iterations in 1u64..=150) {
            let (mut engine, _) = engine();
            let mut suite = suite(threads, 0, 1, iterations, &["Counter"], &["t"]);
            engine.run(&mut suite).unwrap();

            let tc = &suite.drivers()[0].rows()[0][0];
            prop_assert_eq!(
                tc.params().get_long(RUN_ITERATIONS_SUM).unwrap(),
                (threads as u64 * iterations) as i64
            );
        }
    }

    #[test]
    fn test_failing_test_case_is_contained() {
        FINISHED.store(0, Ordering::SeqCst);
        let (mut engine, buffer) = engine();
        let mut suite = suite(2, 0, 1, 10, &["Picky"], &["good", "bad", "also-good"]);
        assert_eq!(engine.run(&mut suite).unwrap(), 1);

        let row = &suite.drivers()[0].rows()[0];
        assert!(row[0].result_value() > 0.0);
        assert!(row[1].result_value().is_nan());
        assert_eq!(row[1].params().get_long(RUN_ITERATIONS_SUM).unwrap(), 0);
        assert!(row[1].params().get_double(ACTUAL_RUN_TIME).unwrap().is_nan());
        assert!(row[2].result_value() > 0.0);

        // 2 threads x 3 test cases, including the failed one
        assert_eq!(FINISHED.load(Ordering::SeqCst), 6);
        assert!(buffer.contents().contains("NaN,"));
    }

    #[test]
    fn test_panicking_workers_all_joined() {
        let (mut engine, _) = engine();
        let mut suite = suite(3, 0, 1, 5, &["Panicky", "Counter"], &["t"]);
        assert_eq!(engine.run(&mut suite).unwrap(), 1);
        assert_eq!(suite.drivers().len(), 2);
        assert!(suite.drivers()[0].rows()[0][0].result_value().is_nan());
        assert!(suite.drivers()[1].rows()[0][0].result_value() > 0.0);
    }

    #[test]
    fn test_missing_class_dropped() {
        let (mut engine, _) = engine();
        let mut suite = suite(1, 0, 1, 5, &["Missing", "Counter"], &["t"]);
        assert_eq!(engine.run(&mut suite).unwrap(), 1);
        assert_eq!(suite.drivers().len(), 1);
        assert_eq!(suite.drivers()[0].name(), "Counter");
    }

    #[test]
    fn test_no_driver_loaded_is_fatal() {
        let (mut engine, _) = engine();
        let mut suite = suite(1, 0, 1, 5, &["Missing"], &["t"]);
        assert!(matches!(engine.run(&mut suite), Err(EngineError::NoDriversLoaded)));
    }

    #[test]
    fn test_undefined_resource_set_is_fatal() {
        let (mut engine, _) = engine();
        let mut suite = suite(1, 0, 1, 5, &["Counter"], &["t"]);
        suite.drivers()[0].params().set(RESOURCE_SET, "nowhere").unwrap();
        assert!(matches!(engine.run(&mut suite), Err(EngineError::Load(_))));
    }

    #[test]
    fn test_driver_supplied_value_kept() {
        let (mut engine, _) = engine();
        let mut suite = suite(1, 1, 2, 5, &["SelfScoring"], &["a", "b"]);
        engine.run(&mut suite).unwrap();

        let driver = &suite.drivers()[0];
        assert_eq!(driver.params().get_double(RESULT_ARIT_MEAN).unwrap(), 42.0);
        assert_eq!(driver.params().get_double(RESULT_ARIT_MEAN_STDDEV).unwrap(), 0.0);
    }

    #[test]
    fn test_console_rows_and_summaries() {
        let (mut engine, buffer) = engine();
        let mut suite = suite(1, 1, 2, 5, &["Counter"], &["a", "b"]);
        engine.run(&mut suite).unwrap();

        let out = buffer.contents();
        assert!(out.contains("  Counter using 1 thread(s) on "));
        assert!(out.contains("    Warmup 1: "));
        assert!(out.contains("    Run 1: "));
        assert!(out.contains("    Run 2: "));
        assert!(out.contains("     Avgs: "));
        assert!(out.contains("    Stdev: "));
        assert!(!out.contains("Peak heap usage"));
    }

    #[test]
    fn test_time_based_run() {
        let (mut engine, buffer) = engine();
        let mut suite = suite(2, 0, 1, 5, &["Counter"], &["t"]);
        suite.params().set(WARMUP_TIME, "0").unwrap();
        suite.params().set(RUN_TIME, "1").unwrap();
        engine.run(&mut suite).unwrap();

        let tc = &suite.drivers()[0].rows()[0][0];
        assert_eq!(tc.params().get_long(WARMUP_ITERATIONS_SUM).unwrap(), 0);
        assert!(tc.params().get_long(RUN_ITERATIONS_SUM).unwrap() > 0);
        assert!(tc.params().get_double(ACTUAL_RUN_TIME).unwrap() > 900.0);
        assert!(buffer.contents().contains("Estimated warmup time + run time is 00:00:01"));
    }

    #[test]
    fn test_iteration_delay_excluded() {
        let (mut engine, _) = engine();
        let mut suite = suite(1, 0, 1, 3, &["Counter"], &["t"]);
        suite.params().set(RUN_ITERATION_DELAY, "20").unwrap();
        engine.run(&mut suite).unwrap();

        let tc = &suite.drivers()[0].rows()[0][0];
        assert_eq!(tc.params().get_long(RUN_ITERATIONS_SUM).unwrap(), 3);
        assert!(tc.params().get_double(ACTUAL_RUN_TIME).unwrap() < 60.0);
    }
}
