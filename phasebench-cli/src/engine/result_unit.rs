//! Result Unit Derivation
//!
//! Turns the accumulated run totals of a test case into its result value
//! when the driver did not supply one.
//!
//! | Unit      | Value                                     |
//! |-----------|-------------------------------------------|
//! | `tps`     | `I / T`                                   |
//! | `ms`      | `min(C, N) / tps * 1000`                  |
//! | `mbps`    | `size(inputFile) * 0.000008 * tps`        |
//! | `%gctime` | `gcTime / (T * 1000) * 100`               |
//!
//! `I` is the summed run iteration count, `T` the per-thread run time in
//! seconds, `N` the thread count and `C` the available processors.

use super::EngineError;
use crate::config::ConfigError;
use phasebench_core::TestCase;
use phasebench_core::constants::{
    ACTUAL_RUN_TIME, GC_TIME, INPUT_FILE, RESULT_UNIT, RESULT_UNIT_X, RESULT_VALUE,
    RESULT_VALUE_X, RUN_ITERATIONS_SUM,
};
use std::fmt;
use std::str::FromStr;

/// Unit a result value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultUnit {
    /// Transactions per second
    Tps,
    /// Latency in milliseconds
    Ms,
    /// Megabits per second over the test case's input file
    Mbps,
    /// Percentage of run time spent collecting
    GcTime,
}

impl ResultUnit {
    /// Canonical spelling
    pub fn as_str(self) -> &'static str {
        match self {
            ResultUnit::Tps => "tps",
            ResultUnit::Ms => "ms",
            ResultUnit::Mbps => "mbps",
            ResultUnit::GcTime => "%gctime",
        }
    }

    /// Compute the value of this unit from measured inputs
    pub fn derive(self, inputs: &UnitInputs) -> Result<f64, EngineError> {
        let tps = inputs.tps();
        Ok(match self {
            ResultUnit::Tps => tps,
            ResultUnit::Ms => inputs.latency_ms(),
            ResultUnit::Mbps => {
                let path = inputs
                    .input_file
                    .as_deref()
                    .ok_or_else(|| EngineError::MissingInputFile(inputs.test_case.clone()))?;
                let bytes = std::fs::metadata(path)
                    .map_err(|source| EngineError::InputFile {
                        path: path.into(),
                        source,
                    })?
                    .len();
                bytes as f64 * 0.000008 * tps
            }
            ResultUnit::GcTime => inputs.gc_time_ms / inputs.run_time_ms * 100.0,
        })
    }
}

impl fmt::Display for ResultUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tps" => Ok(ResultUnit::Tps),
            "ms" => Ok(ResultUnit::Ms),
            "mbps" => Ok(ResultUnit::Mbps),
            "%gctime" => Ok(ResultUnit::GcTime),
            _ => Err(ConfigError::UnknownResultUnit(s.to_string())),
        }
    }
}

/// Measured quantities a unit is derived from
#[derive(Debug, Clone)]
pub struct UnitInputs {
    /// Test case name, for error messages
    pub test_case: String,
    /// Summed run iterations across threads
    pub iterations: f64,
    /// Per-thread run time in milliseconds
    pub run_time_ms: f64,
    /// Thread count
    pub threads: usize,
    /// Available processors
    pub cpus: usize,
    /// Collection time during the run phase in milliseconds
    pub gc_time_ms: f64,
    /// Input file of the test case
    pub input_file: Option<String>,
}

impl UnitInputs {
    /// Read the inputs from a test case after its run phase was published
    pub fn from_test_case(tc: &TestCase, threads: usize, cpus: usize) -> Self {
        let params = tc.params();
        Self {
            test_case: tc.name().to_string(),
            iterations: params.get_double(RUN_ITERATIONS_SUM).unwrap_or(0.0),
            run_time_ms: params.get_double(ACTUAL_RUN_TIME).unwrap_or(f64::NAN),
            threads,
            cpus,
            gc_time_ms: params.get_double(GC_TIME).unwrap_or(0.0),
            input_file: params.get(INPUT_FILE),
        }
    }

    /// Transactions per second
    pub fn tps(&self) -> f64 {
        self.iterations / (self.run_time_ms / 1000.0)
    }

    /// Latency in milliseconds
    pub fn latency_ms(&self) -> f64 {
        self.cpus.min(self.threads) as f64 / self.tps() * 1000.0
    }
}

/// Fill in `resultValue` and `resultValueX` where the driver left them unset
pub fn derive_results(tc: &TestCase, threads: usize, cpus: usize) -> Result<(), EngineError> {
    let params = tc.params();
    let inputs = UnitInputs::from_test_case(tc, threads, cpus);

    let unit: ResultUnit = params
        .get(RESULT_UNIT)
        .as_deref()
        .unwrap_or(phasebench_core::constants::DEFAULT_RESULT_UNIT)
        .parse()?;

    if !params.has_own(RESULT_VALUE) {
        params.set_value(RESULT_VALUE, unit.derive(&inputs)?);
    }

    if unit == ResultUnit::GcTime {
        params.set_value(RESULT_UNIT_X, ResultUnit::Ms.as_str());
        if !params.has_own(RESULT_VALUE_X) {
            params.set_value(RESULT_VALUE_X, inputs.latency_ms());
        }
    } else if let Some(raw) = params.get(RESULT_UNIT_X) {
        let unit_x: ResultUnit = raw.parse()?;
        if !params.has_own(RESULT_VALUE_X) {
            params.set_value(RESULT_VALUE_X, unit_x.derive(&inputs)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasebench_core::ParamScope;
    use std::sync::Arc;

    fn inputs() -> UnitInputs {
        UnitInputs {
            test_case: "t".to_string(),
            iterations: 400.0,
            run_time_ms: 2000.0,
            threads: 4,
            cpus: 2,
            gc_time_ms: 50.0,
            input_file: None,
        }
    }

    fn measured(unit: &str) -> TestCase {
        let suite = Arc::new(ParamScope::new());
        suite.set(RESULT_UNIT, unit).unwrap();
        let tc = TestCase::new("t", &suite);
        tc.params().set_value(RUN_ITERATIONS_SUM, 400i64);
        tc.params().set_value(ACTUAL_RUN_TIME, 2000.0);
        tc.params().set_value(GC_TIME, 50.0);
        tc
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("TPS".parse::<ResultUnit>().unwrap(), ResultUnit::Tps);
        assert_eq!("%GCTime".parse::<ResultUnit>().unwrap(), ResultUnit::GcTime);
        assert!(matches!(
            "furlongs".parse::<ResultUnit>(),
            Err(ConfigError::UnknownResultUnit(_))
        ));
    }

    #[test]
    fn test_derivations() {
        let inputs = inputs();
        assert_eq!(ResultUnit::Tps.derive(&inputs).unwrap(), 200.0);
        // min(2 cpus, 4 threads) / 200 tps
        assert_eq!(ResultUnit::Ms.derive(&inputs).unwrap(), 10.0);
        assert_eq!(ResultUnit::GcTime.derive(&inputs).unwrap(), 2.5);
    }

    #[test]
    fn test_mbps_needs_input_file() {
        let mut inputs = inputs();
        assert!(matches!(
            ResultUnit::Mbps.derive(&inputs),
            Err(EngineError::MissingInputFile(_))
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![0u8; 125_000]).unwrap();
        inputs.input_file = Some(file.path().display().to_string());
        let mbps = ResultUnit::Mbps.derive(&inputs).unwrap();
        assert!((mbps - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_driver_value_kept() {
        let tc = measured("tps");
        tc.params().set_value(RESULT_VALUE, 7.0);
        derive_results(&tc, 1, 1).unwrap();
        assert_eq!(tc.result_value(), 7.0);
    }

    #[test]
    fn test_gctime_sets_latency_axis() {
        let tc = measured("%gctime");
        derive_results(&tc, 4, 2).unwrap();
        assert_eq!(tc.result_value(), 2.5);
        assert_eq!(tc.params().get(RESULT_UNIT_X).as_deref(), Some("ms"));
        assert_eq!(tc.params().get_double(RESULT_VALUE_X).unwrap(), 10.0);
    }

    #[test]
    fn test_secondary_unit() {
        let tc = measured("tps");
        tc.params().set(RESULT_UNIT_X, "ms").unwrap();
        derive_results(&tc, 4, 2).unwrap();
        assert_eq!(tc.result_value(), 200.0);
        assert_eq!(tc.params().get_double(RESULT_VALUE_X).unwrap(), 10.0);
    }
}
