//! Report directory layout
//!
//! Each run writes into `<reports>/<yyyy_MM_dd_HH_mm>/`. With `-last`
//! the finished directory is mirrored to `<reports>/last/`.

use crate::html::generate_html_report;
use crate::json::generate_json_report;
use crate::report::Report;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the machine-readable report
pub const JSON_FILE: &str = "report.json";
/// File name of the HTML report
pub const HTML_FILE: &str = "index.html";
/// Directory name that `-last` mirrors into
pub const LAST_DIRECTORY: &str = "last";

/// Report output errors
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem failure
    #[error("cannot write '{}': {source}", path.display())]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization failure
    #[error("cannot serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io { path: path.to_path_buf(), source }
}

/// Name of the timestamped run directory
pub fn run_directory_name(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%Y_%m_%d_%H_%M").to_string()
}

/// Create `<base>/<timestamp>/`, reusing it when a run in the same minute already did
pub fn create_run_directory(base: &Path, timestamp: &DateTime<Local>) -> Result<PathBuf, ReportError> {
    let dir = base.join(run_directory_name(timestamp));
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    Ok(dir)
}

/// Write the report files into `dir`, returning the written paths
pub fn write_report(dir: &Path, report: &Report, html: bool) -> Result<Vec<PathBuf>, ReportError> {
    let mut written = Vec::with_capacity(2);

    let json_path = dir.join(JSON_FILE);
    fs::write(&json_path, generate_json_report(report)?).map_err(io_error(&json_path))?;
    written.push(json_path);

    if html {
        let html_path = dir.join(HTML_FILE);
        fs::write(&html_path, generate_html_report(report)).map_err(io_error(&html_path))?;
        written.push(html_path);
    }

    tracing::debug!(dir = %dir.display(), files = written.len(), "Report written");
    Ok(written)
}

/// Replace `<base>/last/` with a copy of `dir`
pub fn copy_to_last(base: &Path, dir: &Path) -> Result<PathBuf, ReportError> {
    let last = base.join(LAST_DIRECTORY);
    if last.exists() {
        fs::remove_dir_all(&last).map_err(io_error(&last))?;
    }
    copy_tree(dir, &last)?;
    Ok(last)
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(to).map_err(io_error(to))?;
    for entry in fs::read_dir(from).map_err(io_error(from))? {
        let entry = entry.map_err(io_error(from))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        if source.is_dir() {
            copy_tree(&source, &target)?;
        } else {
            fs::copy(&source, &target).map_err(io_error(&target))?;
        }
    }
    Ok(())
}
