//! Timing
//!
//! Wall-clock timers for the phase loops and the `((HH:)?MM:)?S?S` duration
//! format used by `phasebench.warmupTime` and `phasebench.runTime`.

use std::time::{Duration, Instant};
use thiserror::Error;

/// Malformed duration string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duration '{0}' does not conform to pattern '((HH:)?MM:)?S?S'")]
pub struct DurationError(pub String);

/// Parse `S`, `SS`, `MM:SS` or `HH:MM:SS` into milliseconds
pub fn parse_duration(s: &str) -> Result<u64, DurationError> {
    let fail = || DurationError(s.to_string());
    let digits = |part: &str| -> Result<u64, DurationError> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail());
        }
        part.parse::<u64>().map_err(|_| fail())
    };

    let seconds = match s.len() {
        1 | 2 => digits(s)?,
        5 => {
            let (minutes, seconds) = split_field(s, 2).ok_or_else(fail)?;
            digits(minutes)? * 60 + digits(seconds)?
        }
        8 => {
            let (hours, rest) = split_field(s, 2).ok_or_else(fail)?;
            let (minutes, seconds) = split_field(rest, 2).ok_or_else(fail)?;
            digits(hours)? * 3600 + digits(minutes)? * 60 + digits(seconds)?
        }
        _ => return Err(fail()),
    };

    Ok(seconds * 1000)
}

/// Split `NN:rest` at a colon found exactly at `at`
fn split_field(s: &str, at: usize) -> Option<(&str, &str)> {
    let (head, tail) = s.split_at_checked(at)?;
    let tail = tail.strip_prefix(':')?;
    Some((head, tail))
}

/// Timer for measuring a phase loop
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since start
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed milliseconds as a double
    #[inline(always)]
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.elapsed())
    }
}

/// Convert a duration to fractional milliseconds
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Render milliseconds as `HH:MM:SS`
pub fn format_hms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
