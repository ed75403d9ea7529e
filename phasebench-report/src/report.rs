//! Report Data Structures
//!
//! The finished result tree: suite → drivers → test cases, each carrying
//! its parameters rendered as strings after the parameter closure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current schema version of `report.json`
pub const SCHEMA_VERSION: u32 = 1;

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Run metadata
    pub meta: ReportMeta,
    /// Result tree
    pub suite: SuiteReport,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Schema version
    pub schema_version: u32,
    /// Harness version
    pub version: String,
    /// Generation time
    pub timestamp: DateTime<Utc>,
    /// Host description
    pub system: SystemInfo,
    /// Recoverable errors counted during the run
    pub error_count: usize,
}

/// System information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// CPU model name
    pub cpu: String,
    /// Available processors
    pub cpu_count: usize,
    /// Host name
    pub host_name: String,
}

/// Suite level of the result tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub name: String,
    /// Global parameters
    pub params: BTreeMap<String, String>,
    /// Sizes of consecutive test case groups plotted together
    #[serde(default)]
    pub plot_groups: Vec<usize>,
    /// Drivers that completed their sweep
    pub drivers: Vec<DriverReport>,
}

/// Driver level of the result tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverReport {
    /// Driver name
    pub name: String,
    /// Base driver this one extends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Whether this driver is the normalization baseline
    pub normal: bool,
    /// Driver parameters, including summary means
    pub params: BTreeMap<String, String>,
    /// Aggregated test cases
    pub test_cases: Vec<TestCaseReport>,
}

impl DriverReport {
    /// Look up a driver parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Test case level of the result tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseReport {
    /// Test case name
    pub name: String,
    /// Test case parameters, including aggregated outputs
    pub params: BTreeMap<String, String>,
}

impl TestCaseReport {
    /// Look up a test case parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}
