//! HTML Output
//!
//! A single self-contained page: suite parameters, then one table per
//! driver listing every test case with its aggregated result.

use crate::report::{DriverReport, Report};
use std::collections::BTreeSet;
use std::fmt::Write;

const RESULT_VALUE: &str = "phasebench.resultValue";
const RESULT_UNIT: &str = "phasebench.resultUnit";
const RESULT_VALUE_STDDEV: &str = "phasebench.resultValueStddev";
const MEANS: [(&str, &str); 3] = [
    ("Arithmetic mean", "phasebench.resultAritMean"),
    ("Geometric mean", "phasebench.resultGeomMean"),
    ("Harmonic mean", "phasebench.resultHarmMean"),
];

/// Generate a single-file HTML report
pub fn generate_html_report(report: &Report) -> String {
    let suite = &report.suite;
    let mut out = String::with_capacity(8 * 1024);

    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html><head><meta charset=\"utf-8\">");
    let _ = writeln!(out, "<title>{}</title>", escape(&suite.name));
    let _ = writeln!(out, "<style>{STYLE}</style></head><body>");
    let _ = writeln!(out, "<h1>{}</h1>", escape(&suite.name));
    let _ = writeln!(
        out,
        "<p class=\"meta\">{} on {} ({} cpus), version {}</p>",
        report.meta.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        escape(&report.meta.system.host_name),
        report.meta.system.cpu_count,
        escape(&report.meta.version),
    );
    if report.meta.error_count > 0 {
        let _ = writeln!(out, "<p class=\"errors\">{} error(s) during the run</p>", report.meta.error_count);
    }

    let _ = writeln!(out, "<h2>Global parameters</h2>");
    write_param_table(&mut out, suite.params.iter());

    let _ = writeln!(out, "<h2>Summary</h2>");
    write_summary(&mut out, &suite.drivers);

    for driver in &suite.drivers {
        write_driver(&mut out, driver, &suite.plot_groups);
    }

    let _ = writeln!(out, "</body></html>");
    out
}

fn write_summary(out: &mut String, drivers: &[DriverReport]) {
    let _ = write!(out, "<table><tr><th>Driver</th>");
    for (label, _) in MEANS {
        let _ = write!(out, "<th>{label}</th>");
    }
    let _ = writeln!(out, "</tr>");
    for driver in drivers {
        let marker = if driver.normal { " (normal)" } else { "" };
        let _ = write!(out, "<tr><td>{}{marker}</td>", escape(&driver.name));
        for (_, key) in MEANS {
            let _ = write!(out, "<td class=\"num\">{}</td>", escape(driver.param(key).unwrap_or("n/a")));
        }
        let _ = writeln!(out, "</tr>");
    }
    let _ = writeln!(out, "</table>");
}

fn write_driver(out: &mut String, driver: &DriverReport, groups: &[usize]) {
    let _ = writeln!(out, "<h2>{}</h2>", escape(&driver.name));
    if let Some(base) = &driver.base {
        let _ = writeln!(out, "<p class=\"meta\">extends {}</p>", escape(base));
    }

    let unit = driver
        .test_cases
        .first()
        .and_then(|tc| tc.param(RESULT_UNIT))
        .or_else(|| driver.param(RESULT_UNIT))
        .unwrap_or("n/a");

    // Columns are the union of test case parameters outside the result keys
    let extra: BTreeSet<&str> = driver
        .test_cases
        .iter()
        .flat_map(|tc| tc.params.keys().map(String::as_str))
        .filter(|k| !k.starts_with("phasebench."))
        .collect();

    let total = driver.test_cases.len();
    let sizes: Vec<usize> = if groups.iter().sum::<usize>() == total && !groups.is_empty() {
        groups.to_vec()
    } else {
        vec![total]
    };

    let mut start = 0;
    for size in sizes {
        let _ = write!(out, "<table><tr><th>Test case</th><th>Result ({})</th><th>Stddev</th>", escape(unit));
        for key in &extra {
            let _ = write!(out, "<th>{}</th>", escape(key));
        }
        let _ = writeln!(out, "</tr>");

        for tc in &driver.test_cases[start..start + size] {
            let _ = write!(
                out,
                "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>",
                escape(&tc.name),
                escape(tc.param(RESULT_VALUE).unwrap_or("n/a")),
                escape(tc.param(RESULT_VALUE_STDDEV).unwrap_or("n/a")),
            );
            for key in &extra {
                let _ = write!(out, "<td>{}</td>", escape(tc.param(key).unwrap_or("n/a")));
            }
            let _ = writeln!(out, "</tr>");
        }
        let _ = writeln!(out, "</table>");
        start += size;
    }

    let _ = writeln!(out, "<details><summary>Driver parameters</summary>");
    write_param_table(out, driver.params.iter());
    let _ = writeln!(out, "</details>");
}

fn write_param_table<'a>(out: &mut String, params: impl Iterator<Item = (&'a String, &'a String)>) {
    let _ = writeln!(out, "<table><tr><th>Name</th><th>Value</th></tr>");
    for (name, value) in params {
        let _ = writeln!(out, "<tr><td>{}</td><td>{}</td></tr>", escape(name), escape(value));
    }
    let _ = writeln!(out, "</table>");
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;margin-bottom:1.5em}\
td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
th{background:#f0f0f0}td.num{text-align:right;font-family:monospace}\
.meta{color:#666}.errors{color:#b00}";
