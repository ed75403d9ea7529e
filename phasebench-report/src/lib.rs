#![warn(missing_docs)]
//! PhaseBench Report - Result Tree Output
//!
//! Writes the finished result tree of a suite run:
//! - JSON (`report.json`, machine-readable)
//! - HTML (`index.html`, one table per driver)

mod html;
mod json;
mod output;
mod report;

pub use html::generate_html_report;
pub use json::{generate_json_report, parse_json_report};
pub use output::{
    HTML_FILE, JSON_FILE, LAST_DIRECTORY, ReportError, copy_to_last, create_run_directory,
    run_directory_name, write_report,
};
pub use report::{
    DriverReport, Report, ReportMeta, SCHEMA_VERSION, SuiteReport, SystemInfo, TestCaseReport,
};
