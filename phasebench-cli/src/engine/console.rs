//! Console Output
//!
//! Result lines printed while the sweep runs:
//!
//! ```text
//!   JsonCodec using 2 thread(s) on 8 cpu(s)
//!     Warmup 1: 1520.5,980.25,aritmean,1250.375,geommean,1220.844,harmmean,1192.088
//!     Run 1: 1533.1,990,aritmean,1261.55,geommean,1232.021,harmmean,1203.151
//!      Avgs: 1530.2,985.5,aritmean,1257.85,geommean,1227.987,harmmean,1198.934
//!     Stdev: 2.9,4.5,aritmean,3.7,geommean,3.612,harmmean,3.527
//!     Peak heap usage: 5120 KB
//! ```

use parking_lot::Mutex;
use phasebench_core::{format_double, format_hms};
use phasebench_stats::SummaryMeans;
use std::io::{self, Write};
use std::sync::Arc;

/// Sink for result lines
pub struct Console {
    out: Box<dyn Write + Send>,
    line: bool,
}

impl Console {
    /// Console writing to stdout
    pub fn stdout(line: bool) -> Self {
        Self::new(Box::new(io::stdout()), line)
    }

    /// Console writing to `out`; `line` puts every per-test value on its own line
    pub fn new(out: Box<dyn Write + Send>, line: bool) -> Self {
        Self { out, line }
    }

    /// Announce a suite
    pub fn suite_header(&mut self, name: &str, drivers: usize, test_cases: usize) -> io::Result<()> {
        writeln!(
            self.out,
            "Running suite '{name}': {drivers} driver(s), {test_cases} test case(s)"
        )
    }

    /// Announce the expected duration of a time-based suite
    pub fn estimated_time(&mut self, total_ms: u64) -> io::Result<()> {
        writeln!(
            self.out,
            "  Estimated warmup time + run time is {}",
            format_hms(total_ms)
        )
    }

    /// Announce a driver
    pub fn driver_header(&mut self, name: &str, threads: usize, cpus: usize) -> io::Result<()> {
        writeln!(self.out, "  {name} using {threads} thread(s) on {cpus} cpu(s)")?;
        self.out.flush()
    }

    /// Start a run-row line such as `    Run 2: `
    pub fn row_start(&mut self, label: &str, index: usize) -> io::Result<()> {
        write!(self.out, "    {label} {index}: ")?;
        self.out.flush()
    }

    /// One per-test result
    pub fn value(&mut self, value: f64) -> io::Result<()> {
        write!(self.out, "{},", format_double(value))?;
        if self.line {
            write!(self.out, "\n      ")?;
        }
        self.out.flush()
    }

    /// Finish a run-row line with the means of its values
    pub fn row_end(&mut self, values: &[f64]) -> io::Result<()> {
        self.means(values)
    }

    /// A summary line (`Avgs` or `Stdev`) over aggregated values
    pub fn summary(&mut self, label: &str, values: &[f64]) -> io::Result<()> {
        write!(self.out, "    {label:>5}: ")?;
        for value in values {
            self.value(*value)?;
        }
        self.means(values)
    }

    /// Peak heap growth of a driver's sweep
    pub fn peak_heap(&mut self, kilobytes: f64) -> io::Result<()> {
        writeln!(self.out, "    Peak heap usage: {} KB", format_double(kilobytes))
    }

    fn means(&mut self, values: &[f64]) -> io::Result<()> {
        let means = SummaryMeans::of(values);
        writeln!(
            self.out,
            "aritmean,{},geommean,{},harmmean,{}",
            format_double(means.arithmetic),
            format_double(means.geometric),
            format_double(means.harmonic)
        )?;
        self.out.flush()
    }
}

/// In-memory writer that can be handed to a [`Console`] and read back
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Everything written so far
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
