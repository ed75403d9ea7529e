//! Statistics Aggregation
//!
//! Two passes, run at most once per driver:
//!
//! 1. Vertical: for each test case, mean and (when more than one run was
//!    measured) population standard deviation across the measured rows.
//! 2. Horizontal: arithmetic, geometric and harmonic means across the
//!    aggregated test cases, plus the same three means over the per-test
//!    standard deviations when they exist.

use phasebench_core::constants::*;
use phasebench_core::{DriverRecord, ParamScope, TestCase};
use phasebench_stats::{SummaryMeans, arithmetic_mean, standard_deviation};
use std::sync::Arc;

/// Aggregate a driver's run matrix, once
pub fn summarize(driver: &DriverRecord) {
    driver.memoize_means(compute);
}

fn compute(driver: &DriverRecord) {
    let measured = driver.measured_rows();
    let with_stddev = measured.len() > 1;

    for (index, aggregate) in driver.aggregates().iter().enumerate() {
        let column: Vec<&Arc<TestCase>> = measured.iter().filter_map(|row| row.get(index)).collect();
        vertical(aggregate.params(), &column, with_stddev);
    }

    horizontal(driver, with_stddev);
    tracing::debug!(driver = driver.name(), runs = measured.len(), "Aggregated results");
}

fn vertical(target: &ParamScope, column: &[&Arc<TestCase>], with_stddev: bool) {
    let read = |name: &str| -> Vec<f64> {
        column
            .iter()
            .map(|tc| tc.params().get_double(name).unwrap_or(f64::NAN))
            .collect()
    };

    let store = |name: &str, stddev_name: &str, values: Vec<f64>, scale: f64| {
        target.set_value(name, arithmetic_mean(&values) / scale);
        if with_stddev {
            target.set_value(stddev_name, standard_deviation(&values) / scale);
        }
    };

    store(RESULT_VALUE, RESULT_VALUE_STDDEV, read(RESULT_VALUE), 1.0);
    store(RESULT_TIME, RESULT_TIME_STDDEV, read(ACTUAL_RUN_TIME), 1000.0);
    store(RESULT_ITERATIONS, RESULT_ITERATIONS_STDDEV, read(RUN_ITERATIONS_SUM), 1.0);

    let has_x = !column.is_empty() && column.iter().all(|tc| tc.params().has(RESULT_VALUE_X));
    if has_x {
        store(RESULT_VALUE_X, RESULT_VALUE_X_STDDEV, read(RESULT_VALUE_X), 1.0);
        if let Some(unit) = column[0].params().get(RESULT_UNIT_X) {
            target.set_value(RESULT_UNIT_X, unit);
        }
    }
}

fn horizontal(driver: &DriverRecord, with_stddev: bool) {
    let aggregates = driver.aggregates();
    let params = driver.params();
    let column = |name: &str| -> Vec<f64> {
        aggregates
            .iter()
            .map(|tc| tc.params().get_double(name).unwrap_or(f64::NAN))
            .collect()
    };
    let publish = |names: [&str; 3], values: Vec<f64>| {
        let means = SummaryMeans::of(&values);
        params.set_value(names[0], means.arithmetic);
        params.set_value(names[1], means.geometric);
        params.set_value(names[2], means.harmonic);
    };

    publish(
        [RESULT_ARIT_MEAN, RESULT_GEOM_MEAN, RESULT_HARM_MEAN],
        column(RESULT_VALUE),
    );
    if with_stddev {
        publish(
            [RESULT_ARIT_MEAN_STDDEV, RESULT_GEOM_MEAN_STDDEV, RESULT_HARM_MEAN_STDDEV],
            column(RESULT_VALUE_STDDEV),
        );
    }

    let has_x = !aggregates.is_empty() && aggregates.iter().all(|tc| tc.params().has_own(RESULT_VALUE_X));
    if has_x {
        publish(
            [RESULT_ARIT_MEAN_X, RESULT_GEOM_MEAN_X, RESULT_HARM_MEAN_X],
            column(RESULT_VALUE_X),
        );
        if with_stddev {
            publish(
                [RESULT_ARIT_MEAN_X_STDDEV, RESULT_GEOM_MEAN_X_STDDEV, RESULT_HARM_MEAN_X_STDDEV],
                column(RESULT_VALUE_X_STDDEV),
            );
        }
    }
}
