//! Benchmark Unit - per-thread, per-run driver instance
//!
//! A unit binds one driver instance to its Driver Record for its whole life
//! and owns the phase loops. Each call to [`BenchmarkUnit::execute`] runs
//! the next phase: warmup first, then the measured run, alternating until a
//! new test case is bound.
//!
//! ## Termination
//!
//! - **Duration-based**: the engine sets an absolute deadline; the loop checks
//!   `now < deadline` before every iteration, so a deadline in the past runs
//!   zero iterations.
//! - **Iteration-based**: no deadline; the loop runs
//!   `phasebench.warmupIterations` / `phasebench.runIterations` times.
//!
//! Both loops also stop early once the engine raises the cancellation flag.
//! Totals are added to the test case's shared accumulator after the loop.

use crate::constants::{ACTUAL_PREPARE_TIME, RUN_ITERATIONS, RUN_ITERATION_DELAY, WARMUP_ITERATIONS};
use crate::driver::BenchmarkDriver;
use crate::measure::{Timer, duration_ms};
use crate::params::{ParamError, ParamScope};
use crate::records::{DriverRecord, Phase, TestCase};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failure of a lifecycle step
#[derive(Debug, Error)]
pub enum PhaseError {
    /// The driver returned an error
    #[error("{step} failed for '{target}'")]
    Failed {
        /// Lifecycle step
        step: &'static str,
        /// Test case, or driver name for initialize/terminate
        target: String,
        /// Error returned by the driver
        #[source]
        source: anyhow::Error,
    },
    /// The driver panicked
    #[error("{step} panicked for '{target}': {message}")]
    Panicked {
        /// Lifecycle step
        step: &'static str,
        /// Test case, or driver name for initialize/terminate
        target: String,
        /// Panic payload
        message: String,
    },
    /// A phase was requested before any test case was bound
    #[error("no test case bound to a unit of driver '{0}'")]
    Unbound(String),
    /// A phase parameter could not be read
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run a driver call, converting errors and panics into [`PhaseError`]
fn guarded<R>(
    step: &'static str,
    target: &str,
    f: impl FnOnce() -> anyhow::Result<R>,
) -> Result<R, PhaseError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(PhaseError::Failed {
            step,
            target: target.to_string(),
            source,
        }),
        Err(payload) => Err(PhaseError::Panicked {
            step,
            target: target.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// One driver instance bound to a Driver Record
pub struct BenchmarkUnit {
    driver: Box<dyn BenchmarkDriver>,
    record: Arc<DriverRecord>,
    suite: Arc<ParamScope>,
    test_case: Option<Arc<TestCase>>,
    needs_warmup: bool,
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl BenchmarkUnit {
    /// Bind a driver instance to its record and suite
    pub fn new(
        driver: Box<dyn BenchmarkDriver>,
        record: Arc<DriverRecord>,
        suite: Arc<ParamScope>,
    ) -> Self {
        Self {
            driver,
            record,
            suite,
            test_case: None,
            needs_warmup: true,
            deadline: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Driver record this unit belongs to
    pub fn record(&self) -> &Arc<DriverRecord> {
        &self.record
    }

    /// Currently bound test case
    pub fn test_case(&self) -> Option<&Arc<TestCase>> {
        self.test_case.as_ref()
    }

    /// Whether the next [`execute`](Self::execute) runs the warmup phase
    pub fn needs_warmup(&self) -> bool {
        self.needs_warmup
    }

    /// Bind a test case; the next phase is warmup again
    pub fn set_test_case(&mut self, test_case: Arc<TestCase>) {
        self.test_case = Some(test_case);
        self.needs_warmup = true;
    }

    /// Absolute deadline for the next phase, `None` for iteration-based
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Share the engine's cancellation flag
    pub fn set_cancel_flag(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = cancel;
    }

    /// Call `initialize_driver` on the wrapped instance
    pub fn initialize(&mut self) -> Result<(), PhaseError> {
        let record = self.record.clone();
        let suite = self.suite.clone();
        let driver = &mut self.driver;
        guarded("initialize", record.name(), || {
            driver.initialize_driver(&record, &suite)
        })
    }

    /// Call `prepare` and record its duration on the test case
    pub fn prepare(&mut self) -> Result<(), PhaseError> {
        let tc = self.bound()?;
        let driver = &mut self.driver;
        let elapsed_ms = guarded("prepare", tc.name(), || {
            let timer = Timer::start();
            driver.prepare(&tc)?;
            Ok(timer.elapsed_ms())
        })?;
        tc.params().set_value(ACTUAL_PREPARE_TIME, elapsed_ms);
        Ok(())
    }

    /// Run the next phase and return which one ran
    pub fn execute(&mut self) -> Result<Phase, PhaseError> {
        let tc = self.bound()?;
        let phase = if self.needs_warmup {
            Phase::Warmup
        } else {
            Phase::Run
        };
        self.needs_warmup = !self.needs_warmup;

        match phase {
            Phase::Warmup => self.warmup_loop(&tc)?,
            Phase::Run => self.run_loop(&tc)?,
        }
        Ok(phase)
    }

    /// Call `finish` on the wrapped instance
    pub fn finish(&mut self) -> Result<(), PhaseError> {
        let tc = self.bound()?;
        let driver = &mut self.driver;
        guarded("finish", tc.name(), || driver.finish(&tc))
    }

    /// Call `terminate_driver` on the wrapped instance
    pub fn terminate(&mut self) -> Result<(), PhaseError> {
        let record = self.record.clone();
        let driver = &mut self.driver;
        guarded("terminate", record.name(), || driver.terminate_driver())
    }

    fn bound(&self) -> Result<Arc<TestCase>, PhaseError> {
        self.test_case
            .clone()
            .ok_or_else(|| PhaseError::Unbound(self.record.name().to_string()))
    }

    fn warmup_loop(&mut self, tc: &Arc<TestCase>) -> Result<(), PhaseError> {
        let limit = match self.deadline {
            Some(_) => None,
            None => Some(iteration_count(tc.params(), WARMUP_ITERATIONS)?),
        };
        let deadline = self.deadline;
        let cancel = self.cancel.clone();
        let driver = &mut self.driver;

        let (iterations, elapsed_ms) = guarded("warmup", tc.name(), || {
            let timer = Timer::start();
            let mut iterations = 0u64;
            while keep_going(iterations, limit, deadline, &cancel) {
                driver.warmup(tc)?;
                iterations += 1;
            }
            Ok((iterations, timer.elapsed_ms()))
        })?;

        tc.accumulate(Phase::Warmup, iterations, elapsed_ms);
        Ok(())
    }

    fn run_loop(&mut self, tc: &Arc<TestCase>) -> Result<(), PhaseError> {
        let limit = match self.deadline {
            Some(_) => None,
            None => Some(iteration_count(tc.params(), RUN_ITERATIONS)?),
        };
        let delay = if tc.params().has(RUN_ITERATION_DELAY) {
            Duration::from_millis(iteration_count(tc.params(), RUN_ITERATION_DELAY)?)
        } else {
            Duration::ZERO
        };
        let mut deadline = self.deadline;
        let cancel = self.cancel.clone();
        let driver = &mut self.driver;

        let (iterations, elapsed_ms) = guarded("run", tc.name(), || {
            let timer = Timer::start();
            let mut paused = Duration::ZERO;
            let mut iterations = 0u64;
            while keep_going(iterations, limit, deadline, &cancel) {
                if !delay.is_zero() {
                    // Sleeping is excluded from the measurement and pushes the deadline out.
                    let pause = Timer::start();
                    std::thread::sleep(delay);
                    let slept = pause.elapsed();
                    paused += slept;
                    deadline = deadline.map(|d| d + slept);
                }
                driver.run(tc)?;
                iterations += 1;
            }
            Ok((iterations, duration_ms(timer.elapsed().saturating_sub(paused))))
        })?;

        tc.accumulate(Phase::Run, iterations, elapsed_ms);
        Ok(())
    }
}

#[inline]
fn keep_going(done: u64, limit: Option<u64>, deadline: Option<Instant>, cancel: &AtomicBool) -> bool {
    if cancel.load(Ordering::Relaxed) {
        return false;
    }
    match (deadline, limit) {
        (Some(deadline), _) => Instant::now() < deadline,
        (None, Some(limit)) => done < limit,
        (None, None) => false,
    }
}

fn iteration_count(params: &ParamScope, name: &str) -> Result<u64, ParamError> {
    Ok(params.get_long(name)?.max(0) as u64)
}
