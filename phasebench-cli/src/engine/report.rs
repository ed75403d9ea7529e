//! Report Building
//!
//! Shapes the finished suite into the serializable result tree.
//!
//! ## Pipeline
//!
//! ```text
//!   TestSuite (after the sweep)
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │  aggregate::summarize│  Means of drivers not yet summarized
//!   └──────────┬──────────┘
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │ Parameter closure   │  Test cases of each driver, then all drivers
//!   └──────────┬──────────┘
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │      Report         │  Ready for JSON/HTML output
//!   └─────────────────────┘
//! ```

use super::aggregate;
use super::metadata::system_info;
use chrono::Utc;
use phasebench_core::constants::PLOT_GROUP_SIZE;
use phasebench_core::{ParamScope, ParamValue, TestSuite, apply_parameter_closure};
use phasebench_report::{
    DriverReport, Report, ReportMeta, SCHEMA_VERSION, SuiteReport, TestCaseReport,
};
use phasebench_stats::calculate_group_sizes;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Build the result tree of a finished suite
pub fn build_report(suite: &TestSuite, error_count: usize) -> Report {
    for driver in suite.drivers() {
        aggregate::summarize(driver);
        let scopes: Vec<Arc<ParamScope>> = driver
            .aggregates()
            .iter()
            .map(|tc| tc.params().clone())
            .collect();
        apply_parameter_closure(&scopes);
    }
    let driver_scopes: Vec<Arc<ParamScope>> =
        suite.drivers().iter().map(|d| d.params().clone()).collect();
    apply_parameter_closure(&driver_scopes);

    let drivers = suite
        .drivers()
        .iter()
        .map(|driver| DriverReport {
            name: driver.name().to_string(),
            base: driver.base_name().map(str::to_string),
            normal: driver.is_normal(),
            params: render(driver.params().local_values()),
            test_cases: driver
                .aggregates()
                .iter()
                .map(|tc| TestCaseReport {
                    name: tc.name().to_string(),
                    params: render(tc.params().own_values()),
                })
                .collect(),
        })
        .collect();

    let params = suite.params();
    let group_size = params
        .get_long(PLOT_GROUP_SIZE)
        .map(|n| n.max(0) as usize)
        .unwrap_or(0);

    Report {
        meta: ReportMeta {
            schema_version: SCHEMA_VERSION,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            system: system_info(params),
            error_count,
        },
        suite: SuiteReport {
            name: suite.name().to_string(),
            params: render(params.own_values()),
            plot_groups: calculate_group_sizes(suite.test_cases().len(), group_size),
            drivers,
        },
    }
}

fn render(values: BTreeMap<String, ParamValue>) -> BTreeMap<String, String> {
    values
        .into_iter()
        .map(|(name, value)| (name, value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasebench_core::constants::*;
    use phasebench_core::{DriverRecord, TestCase};

    fn finished_suite() -> TestSuite {
        let global = Arc::new(ParamScope::new());
        global.set_value(PLOT_GROUP_SIZE, 2i64);
        let mut suite = TestSuite::new("closure", global.clone());

        let templates: Vec<TestCase> = ["a", "b", "c"]
            .iter()
            .map(|n| TestCase::new(*n, &global))
            .collect();
        templates[0].params().set_value("size", 16i64);

        for name in ["X", "Y"] {
            let mut driver = DriverRecord::new(name, &global);
            if name == "Y" {
                driver.params().set_value("flavour", "spicy");
            }
            driver.set_test_cases(&templates, 0, 1);
            for tc in &driver.rows()[0] {
                tc.params().set_value(RESULT_VALUE, 10.0);
            }
            suite.push_driver(driver);
        }
        for t in templates {
            suite.push_test_case(t);
        }
        suite
    }

    #[test]
    fn test_closure_gives_uniform_keys() {
        let report = build_report(&finished_suite(), 0);

        let x = &report.suite.drivers[0];
        let y = &report.suite.drivers[1];
        assert_eq!(x.param("flavour"), Some(NOT_APPLICABLE));
        assert_eq!(y.param("flavour"), Some("spicy"));

        let keys: Vec<Vec<&String>> = x.test_cases.iter().map(|tc| tc.params.keys().collect()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(x.test_cases[1].param("size"), Some(NOT_APPLICABLE));
        assert_eq!(x.test_cases[0].param("size"), Some("16"));
    }

    #[test]
    fn test_report_carries_results() {
        let report = build_report(&finished_suite(), 3);
        assert_eq!(report.meta.error_count, 3);
        assert_eq!(report.suite.plot_groups, vec![2, 1]);

        let x = &report.suite.drivers[0];
        assert_eq!(x.param(RESULT_ARIT_MEAN), Some("10"));
        assert_eq!(x.test_cases[2].param(RESULT_VALUE), Some("10"));
        assert!(x.param(RESULT_ARIT_MEAN_STDDEV).is_none());
    }
}
