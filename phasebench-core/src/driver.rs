//! Driver lifecycle contract
//!
//! A driver implements the workload. The harness owns the loops; a driver
//! only supplies one iteration of work per `warmup`/`run` call.

use crate::params::ParamScope;
use crate::records::{DriverRecord, TestCase};

/// Lifecycle of a benchmark implementation.
///
/// One instance exists per (thread, run) pair. `initialize_driver` and
/// `terminate_driver` run once per instance, `prepare` and `finish` once per
/// test case and never concurrently, `warmup` and `run` once per iteration.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct VecPush { data: Vec<u64> }
///
/// impl BenchmarkDriver for VecPush {
///     fn prepare(&mut self, tc: &TestCase) -> anyhow::Result<()> {
///         self.data = Vec::with_capacity(tc.params().get_long("size")? as usize);
///         Ok(())
///     }
///
///     fn run(&mut self, _tc: &TestCase) -> anyhow::Result<()> {
///         self.data.push(42);
///         Ok(())
///     }
/// }
/// ```
pub trait BenchmarkDriver: Send {
    /// Called once after instantiation
    fn initialize_driver(&mut self, _driver: &DriverRecord, _suite: &ParamScope) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before the warmup phase of each test case
    fn prepare(&mut self, _test_case: &TestCase) -> anyhow::Result<()> {
        Ok(())
    }

    /// One warmup iteration; defaults to `run`
    fn warmup(&mut self, test_case: &TestCase) -> anyhow::Result<()> {
        self.run(test_case)
    }

    /// One measured iteration
    fn run(&mut self, test_case: &TestCase) -> anyhow::Result<()>;

    /// Called after the run phase of each test case, even when it failed
    fn finish(&mut self, _test_case: &TestCase) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when the driver's sweep is over
    fn terminate_driver(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
