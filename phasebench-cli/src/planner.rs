//! Suite Planner
//!
//! Materializes a [`SuiteConfig`] into a runnable [`TestSuite`]:
//!
//! 1. Global parameters in file order, then `phasebench.*` environment overrides
//! 2. Host description parameters
//! 3. Defaults and validation of the execution parameters
//! 4. Drivers (with groups and `extends`) and test cases (with groups)
//! 5. The run matrix of every driver
//!
//! Test mode forces a single warmup-free iteration per test case.

use crate::config::{ConfigError, DriverConfig, ParamList, SuiteConfig, TestCaseConfig};
use crate::engine::{ResultUnit, apply_system_params};
use phasebench_core::constants::*;
use phasebench_core::{DriverRecord, ParamScope, TestCase, TestSuite, parse_duration};
use std::collections::HashSet;
use std::sync::Arc;

const CHART_TYPES: [&str; 3] = ["barchart", "scatterchart", "linechart"];
const AXIS_TYPES: [&str; 2] = ["normal", "logarithmic"];

/// Planner switches coming from the command line
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Force one measured iteration and no warmup
    pub test_mode: bool,
    /// Source file(s), recorded as `phasebench.configFile`
    pub config_file: String,
    /// Apply `phasebench.*` process environment overrides
    pub env_overrides: bool,
}

/// Build a suite from its configuration
pub fn build_suite(config: &SuiteConfig, options: &PlanOptions) -> Result<TestSuite, ConfigError> {
    let overrides: Vec<(String, String)> = if options.env_overrides {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    } else {
        Vec::new()
    };
    build_suite_with(config, options, overrides)
}

/// Build a suite with an explicit set of override candidates.
///
/// Only candidates named `phasebench.*` with a non-empty value are applied.
pub fn build_suite_with(
    config: &SuiteConfig,
    options: &PlanOptions,
    overrides: impl IntoIterator<Item = (String, String)>,
) -> Result<TestSuite, ConfigError> {
    let name = config.name.clone().unwrap_or_else(|| "suite".to_string());
    let global = Arc::new(ParamScope::new());

    apply_params(&global, &config.params)?;
    for (key, value) in overrides {
        if key.starts_with(PREFIX) && !value.is_empty() {
            tracing::debug!(%key, %value, "Environment override");
            global.set(&key, &value)?;
        }
    }

    apply_system_params(&global, &options.config_file);
    if options.test_mode {
        force_test_mode(&global);
    }
    apply_defaults(&global)?;

    let mut suite = TestSuite::new(name.clone(), global.clone());
    let test_cases = build_test_cases(config, &global, options.test_mode)?;
    if test_cases.is_empty() {
        return Err(ConfigError::NoTestCases(name));
    }

    let warmups = count(&global, WARMUPS_PER_DRIVER)?;
    let runs = count(&global, RUNS_PER_DRIVER)?;
    let drivers = build_drivers(config, &global, options.test_mode)?;
    if drivers.is_empty() {
        return Err(ConfigError::NoDrivers(name));
    }

    for mut driver in drivers {
        driver.set_test_cases(&test_cases, warmups, runs);
        suite.push_driver(driver);
    }
    for test_case in test_cases {
        suite.push_test_case(test_case);
    }

    tracing::debug!(
        suite = suite.name(),
        drivers = suite.drivers().len(),
        test_cases = suite.test_cases().len(),
        warmups,
        runs,
        "Suite materialized"
    );
    Ok(suite)
}

fn apply_params(scope: &ParamScope, params: &ParamList) -> Result<(), ConfigError> {
    for (name, value) in params.iter() {
        scope.set(name, value)?;
    }
    Ok(())
}

fn force_test_mode(scope: &ParamScope) {
    scope.set_value(WARMUPS_PER_DRIVER, 0i64);
    scope.set_value(RUNS_PER_DRIVER, 1i64);
    scope.remove(WARMUP_TIME);
    scope.remove(RUN_TIME);
    scope.set_value(WARMUP_ITERATIONS, 0i64);
    scope.set_value(RUN_ITERATIONS, 1i64);
}

/// Lower-level scopes must not undo test mode
fn strip_timing(scope: &ParamScope) {
    for name in [
        WARMUP_TIME,
        RUN_TIME,
        WARMUP_ITERATIONS,
        RUN_ITERATIONS,
        WARMUPS_PER_DRIVER,
        RUNS_PER_DRIVER,
    ] {
        if scope.has_own(name) {
            scope.remove(name);
        }
    }
}

fn apply_defaults(global: &ParamScope) -> Result<(), ConfigError> {
    global.set_default(NUMBER_OF_THREADS, "1")?;
    global.set_default(RUNS_PER_DRIVER, "1")?;
    let threads = count(global, NUMBER_OF_THREADS)?;
    let runs = count(global, RUNS_PER_DRIVER)?;
    at_least_one(NUMBER_OF_THREADS, threads)?;
    at_least_one(RUNS_PER_DRIVER, runs)?;

    global.set_default(WARMUPS_PER_DRIVER, if runs > 1 { "1" } else { "0" })?;
    count(global, WARMUPS_PER_DRIVER)?;

    let iterations = DEFAULT_ITERATIONS.to_string();
    for (time, iters) in [(WARMUP_TIME, WARMUP_ITERATIONS), (RUN_TIME, RUN_ITERATIONS)] {
        match global.get(time) {
            Some(raw) => {
                parse_duration(&raw).map_err(|source| ConfigError::Duration {
                    name: time.to_string(),
                    source,
                })?;
            }
            None => {
                global.set_default(iters, &iterations)?;
            }
        }
        if global.has(iters) {
            count(global, iters)?;
        }
    }

    global.set_default(RESULT_UNIT, DEFAULT_RESULT_UNIT)?;
    validate_unit(global, RESULT_UNIT)?;
    validate_unit(global, RESULT_UNIT_X)?;

    global.set_default(REPORTS_DIRECTORY, DEFAULT_REPORTS_DIRECTORY)?;
    global.set_default(SHARED_DOMAIN, "false")?;
    global.get_bool(SHARED_DOMAIN)?;

    global.set_default(CHART_TYPE, CHART_TYPES[0])?;
    one_of(global, CHART_TYPE, &CHART_TYPES, "barchart, scatterchart or linechart")?;
    global.set_default(RESULT_AXIS, AXIS_TYPES[0])?;
    one_of(global, RESULT_AXIS, &AXIS_TYPES, "normal or logarithmic")?;
    global.set_default(RESULT_AXIS_X, AXIS_TYPES[0])?;
    one_of(global, RESULT_AXIS_X, &AXIS_TYPES, "normal or logarithmic")?;

    if global.has(PLOT_GROUP_SIZE) {
        count(global, PLOT_GROUP_SIZE)?;
    }
    Ok(())
}

/// Checks for parameters set below the suite scope
fn validate_scope(scope: &ParamScope) -> Result<(), ConfigError> {
    for name in [WARMUP_TIME, RUN_TIME] {
        if scope.has_own(name) {
            let raw = scope.get(name).unwrap_or_default();
            parse_duration(&raw).map_err(|source| ConfigError::Duration {
                name: name.to_string(),
                source,
            })?;
        }
    }
    // The run matrix has one shape for every driver
    for name in [WARMUPS_PER_DRIVER, RUNS_PER_DRIVER] {
        if scope.has_own(name) {
            return Err(ConfigError::Invalid {
                name: name.to_string(),
                value: scope.get(name).unwrap_or_default(),
                expected: "a suite-level parameter",
            });
        }
    }
    Ok(())
}

fn count(scope: &ParamScope, name: &str) -> Result<usize, ConfigError> {
    let value = scope.get_long(name)?;
    usize::try_from(value).map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        expected: "a non-negative integer",
    })
}

fn at_least_one(name: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            expected: "an integer of at least 1",
        });
    }
    Ok(())
}

fn validate_unit(scope: &ParamScope, name: &str) -> Result<(), ConfigError> {
    if let Some(raw) = scope.get(name) {
        raw.parse::<ResultUnit>()?;
    }
    Ok(())
}

fn one_of(scope: &ParamScope, name: &str, allowed: &[&str], expected: &'static str) -> Result<(), ConfigError> {
    let value = scope.get(name).unwrap_or_default();
    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&value)) {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            value,
            expected,
        });
    }
    Ok(())
}

fn build_test_cases(
    config: &SuiteConfig,
    global: &Arc<ParamScope>,
    test_mode: bool,
) -> Result<Vec<TestCase>, ConfigError> {
    let mut test_cases = Vec::with_capacity(config.test_case_count());
    let mut seen = HashSet::new();

    let mut add = |parent: &Arc<ParamScope>, tc: &TestCaseConfig| -> Result<(), ConfigError> {
        let name = parent.evaluate(&tc.name)?;
        if !seen.insert(name.clone()) {
            return Err(ConfigError::Duplicate { kind: "test case", name });
        }
        let test_case = TestCase::new(name, parent);
        apply_params(test_case.params(), &tc.params)?;
        validate_scope(test_case.params())?;
        validate_unit(test_case.params(), RESULT_UNIT)?;
        if test_mode {
            strip_timing(test_case.params());
        }
        test_cases.push(test_case);
        Ok(())
    };

    for tc in &config.test_cases {
        add(global, tc)?;
    }
    for group in &config.test_case_groups {
        let scope = Arc::new(ParamScope::with_parent(global.clone()));
        apply_params(&scope, &group.params)?;
        validate_scope(&scope)?;
        if test_mode {
            strip_timing(&scope);
        }
        for tc in &group.test_case {
            add(&scope, tc)?;
        }
    }
    Ok(test_cases)
}

fn build_drivers(
    config: &SuiteConfig,
    global: &Arc<ParamScope>,
    test_mode: bool,
) -> Result<Vec<DriverRecord>, ConfigError> {
    let mut declared: Vec<(Arc<ParamScope>, &DriverConfig)> = config
        .drivers
        .iter()
        .map(|d| (global.clone(), d))
        .collect();
    for group in &config.driver_groups {
        let scope = Arc::new(ParamScope::with_parent(global.clone()));
        apply_params(&scope, &group.params)?;
        validate_scope(&scope)?;
        if test_mode {
            strip_timing(&scope);
        }
        declared.extend(group.driver.iter().map(|d| (scope.clone(), d)));
    }

    let mut drivers: Vec<DriverRecord> = Vec::with_capacity(declared.len());
    let mut bases = HashSet::new();
    for (parent, decl) in declared {
        if drivers.iter().any(|d| d.name() == decl.name) {
            return Err(ConfigError::Duplicate {
                kind: "driver",
                name: decl.name.clone(),
            });
        }
        let mut driver = match &decl.extends {
            Some(base) => {
                let record = drivers.iter().find(|d| d.name() == base).ok_or_else(|| {
                    ConfigError::UnknownBase {
                        driver: decl.name.clone(),
                        base: base.clone(),
                    }
                })?;
                bases.insert(base.clone());
                let derived = record.derive(decl.name.clone());
                overlay(derived.params(), &decl.params)?;
                derived
            }
            None => {
                let record = DriverRecord::new(decl.name.clone(), &parent);
                apply_params(record.params(), &decl.params)?;
                record
            }
        };
        driver.set_normal(decl.normal);
        validate_scope(driver.params())?;
        validate_unit(driver.params(), RESULT_UNIT)?;
        if test_mode {
            strip_timing(driver.params());
        }
        drivers.push(driver);
    }

    drivers.retain(|d| !bases.contains(d.name()));

    let mut normal: Option<&str> = None;
    for driver in drivers.iter().filter(|d| d.is_normal()) {
        if let Some(first) = normal {
            return Err(ConfigError::MultipleNormal {
                first: first.to_string(),
                second: driver.name().to_string(),
            });
        }
        normal = Some(driver.name());
    }
    Ok(drivers)
}

/// Apply a derived driver's own parameters; resource paths are appended
fn overlay(scope: &ParamScope, params: &ParamList) -> Result<(), ConfigError> {
    for (name, value) in params.iter() {
        match scope.get(name) {
            Some(existing) if name == RESOURCE_PATH && !existing.is_empty() => {
                let appended = format!("{existing}{PATH_SEPARATOR}{value}");
                scope.set(name, &appended)?;
            }
            _ => scope.set(name, value)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(toml: &str) -> Result<TestSuite, ConfigError> {
        plan_with(toml, false, Vec::new())
    }

    fn plan_with(toml: &str, test_mode: bool, env: Vec<(&str, &str)>) -> Result<TestSuite, ConfigError> {
        let config = SuiteConfig::parse(toml)?;
        let options = PlanOptions {
            test_mode,
            config_file: "inline.toml".to_string(),
            env_overrides: false,
        };
        build_suite_with(
            &config,
            &options,
            env.into_iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    const MINIMAL: &str = r#"
name = "minimal"
[[driver]]
name = "D"
[[test_case]]
name = "t"
"#;

    fn with_params(params: &str) -> String {
        format!("[params]\n{params}\n[[driver]]\nname = \"D\"\n[[test_case]]\nname = \"t\"\n")
    }

    #[test]
    fn test_defaults() {
        let suite = plan(MINIMAL).unwrap();
        let p = suite.params();
        assert_eq!(p.get_long(NUMBER_OF_THREADS).unwrap(), 1);
        assert_eq!(p.get_long(RUNS_PER_DRIVER).unwrap(), 1);
        assert_eq!(p.get_long(WARMUPS_PER_DRIVER).unwrap(), 0);
        assert_eq!(p.get_long(WARMUP_ITERATIONS).unwrap(), 300);
        assert_eq!(p.get_long(RUN_ITERATIONS).unwrap(), 300);
        assert_eq!(p.get(RESULT_UNIT).as_deref(), Some("tps"));
        assert_eq!(p.get(REPORTS_DIRECTORY).as_deref(), Some("reports"));
        assert_eq!(p.get(CONFIG_FILE).as_deref(), Some("inline.toml"));
        assert!(p.has(HOST_NAME));
        assert_eq!(suite.drivers()[0].rows().len(), 1);
    }

    #[test]
    fn test_multiple_runs_default_one_warmup() {
        let suite = plan(&with_params(&format!("\"{RUNS_PER_DRIVER}\" = 3"))).unwrap();
        assert_eq!(suite.warmups().unwrap(), 1);
        assert_eq!(suite.drivers()[0].rows().len(), 4);
        assert_eq!(suite.drivers()[0].measured_rows().len(), 3);
    }

    #[test]
    fn test_time_suppresses_iteration_default() {
        let suite = plan(&with_params(&format!("\"{RUN_TIME}\" = \"00:05\""))).unwrap();
        assert!(!suite.params().has(RUN_ITERATIONS));
        assert_eq!(suite.params().get_long(WARMUP_ITERATIONS).unwrap(), 300);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_threads = plan(&with_params(&format!("\"{NUMBER_OF_THREADS}\" = 0")));
        assert!(matches!(zero_threads, Err(ConfigError::Invalid { .. })));

        let bad_time = plan(&with_params(&format!("\"{RUN_TIME}\" = \"1:2\"")));
        assert!(matches!(bad_time, Err(ConfigError::Duration { .. })));

        let bad_unit = plan(&with_params(&format!("\"{RESULT_UNIT}\" = \"furlongs\"")));
        assert!(matches!(bad_unit, Err(ConfigError::UnknownResultUnit(_))));

        let bad_chart = plan(&with_params(&format!("\"{CHART_TYPE}\" = \"piechart\"")));
        assert!(matches!(bad_chart, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_empty_suites_rejected() {
        assert!(matches!(
            plan("[[test_case]]\nname = \"t\""),
            Err(ConfigError::NoDrivers(_))
        ));
        assert!(matches!(
            plan("[[driver]]\nname = \"D\""),
            Err(ConfigError::NoTestCases(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let suite = plan_with(
            MINIMAL,
            false,
            vec![
                (RUN_ITERATIONS, "7"),
                (WARMUP_ITERATIONS, ""),
                ("UNRELATED", "1"),
            ],
        )
        .unwrap();
        assert_eq!(suite.params().get_long(RUN_ITERATIONS).unwrap(), 7);
        assert_eq!(suite.params().get_long(WARMUP_ITERATIONS).unwrap(), 300);
        assert!(!suite.params().has("UNRELATED"));
    }

    #[test]
    fn test_test_mode() {
        let toml = format!(
            "[params]\n\"{RUNS_PER_DRIVER}\" = 3\n\"{RUN_TIME}\" = \"10\"\n\n\
             [[driver]]\nname = \"D\"\nparams = {{ \"{RUN_ITERATIONS}\" = 50 }}\n\n\
             [[test_case]]\nname = \"t\"\nparams = {{ \"{WARMUP_TIME}\" = \"5\" }}\n"
        );
        let suite = plan_with(&toml, true, Vec::new()).unwrap();
        assert_eq!(suite.warmups().unwrap(), 0);
        assert_eq!(suite.runs().unwrap(), 1);
        assert!(!suite.params().has(RUN_TIME));

        let driver = &suite.drivers()[0];
        assert_eq!(driver.rows().len(), 1);
        let tc = &driver.rows()[0][0];
        assert_eq!(tc.params().get_long(RUN_ITERATIONS).unwrap(), 1);
        assert_eq!(tc.params().get_long(WARMUP_ITERATIONS).unwrap(), 0);
        assert!(!tc.params().has(WARMUP_TIME));
    }

    #[test]
    fn test_groups_provide_intermediate_scopes() {
        let toml = r#"
[params]
payload = "global"

[[driver_group]]
params = { payload = "group", "phasebench.sharedDomain" = true }
[[driver_group.driver]]
name = "InGroup"

[[driver]]
name = "Plain"

[[test_case_group]]
params = { size = 64 }
[[test_case_group.test_case]]
name = "sized-${size}"
"#;
        let suite = plan(toml).unwrap();
        let plain = &suite.drivers()[0];
        let grouped = &suite.drivers()[1];
        assert_eq!(plain.params().get("payload").as_deref(), Some("global"));
        assert_eq!(grouped.params().get("payload").as_deref(), Some("group"));
        assert!(grouped.params().get_bool(SHARED_DOMAIN).unwrap());

        let tc = &grouped.rows()[0][0];
        assert_eq!(tc.name(), "sized-64");
        // Group parameters are flattened into every copy
        assert!(tc.params().has_own("size"));
        assert_eq!(tc.params().get("payload").as_deref(), Some("group"));
    }

    #[test]
    fn test_extends_appends_resource_path() {
        let toml = r#"
[[driver]]
name = "Base"
params = { "phasebench.resourcePath" = "common", "phasebench.driverClass" = "Codec", level = 1 }

[[driver]]
name = "Fast"
extends = "Base"
normal = true
params = { "phasebench.resourcePath" = "fast", level = 9 }

[[test_case]]
name = "t"
"#;
        let suite = plan(toml).unwrap();
        assert_eq!(suite.drivers().len(), 1);

        let fast = &suite.drivers()[0];
        assert_eq!(fast.name(), "Fast");
        assert_eq!(fast.base_name(), Some("Base"));
        assert!(fast.is_normal());
        assert_eq!(fast.params().get(RESOURCE_PATH).as_deref(), Some("common,fast"));
        assert_eq!(fast.params().get(DRIVER_CLASS).as_deref(), Some("Codec"));
        assert_eq!(fast.params().get_long("level").unwrap(), 9);
    }

    #[test]
    fn test_extends_unknown_base() {
        let toml = "[[driver]]\nname = \"X\"\nextends = \"Nope\"\n[[test_case]]\nname = \"t\"\n";
        assert!(matches!(plan(toml), Err(ConfigError::UnknownBase { .. })));
    }

    #[test]
    fn test_duplicates_and_normals_rejected() {
        let dup = "[[driver]]\nname = \"D\"\n[[driver]]\nname = \"D\"\n[[test_case]]\nname = \"t\"\n";
        assert!(matches!(plan(dup), Err(ConfigError::Duplicate { kind: "driver", .. })));

        let normals = "[[driver]]\nname = \"A\"\nnormal = true\n[[driver]]\nname = \"B\"\nnormal = true\n[[test_case]]\nname = \"t\"\n";
        assert!(matches!(plan(normals), Err(ConfigError::MultipleNormal { .. })));
    }

    #[test]
    fn test_lower_scope_durations_validated() {
        let case = format!(
            "[[driver]]\nname = \"D\"\n[[test_case]]\nname = \"small\"\nparams = {{ \"{RUN_TIME}\" = \"1:xx\" }}\n"
        );
        assert!(matches!(plan(&case), Err(ConfigError::Duration { .. })));

        let driver = format!(
            "[[driver]]\nname = \"D\"\nparams = {{ \"{WARMUP_TIME}\" = \"soon\" }}\n[[test_case]]\nname = \"t\"\n"
        );
        assert!(matches!(plan(&driver), Err(ConfigError::Duration { .. })));

        let group = format!(
            "[[driver]]\nname = \"D\"\n[[test_case_group]]\nparams = {{ \"{RUN_TIME}\" = \"123\" }}\n\
             [[test_case_group.test_case]]\nname = \"t\"\n"
        );
        assert!(matches!(plan(&group), Err(ConfigError::Duration { .. })));

        let valid = format!(
            "[[driver]]\nname = \"D\"\n[[test_case]]\nname = \"t\"\nparams = {{ \"{RUN_TIME}\" = \"00:02\" }}\n"
        );
        assert!(plan(&valid).is_ok());
    }

    #[test]
    fn test_run_counts_are_suite_level() {
        let driver = format!(
            "[[driver]]\nname = \"D\"\nparams = {{ \"{RUNS_PER_DRIVER}\" = 5 }}\n[[test_case]]\nname = \"t\"\n"
        );
        match plan(&driver) {
            Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, RUNS_PER_DRIVER),
            other => panic!("unexpected {other:?}"),
        }

        let case = format!(
            "[[driver]]\nname = \"D\"\n[[test_case]]\nname = \"t\"\nparams = {{ \"{WARMUPS_PER_DRIVER}\" = 2 }}\n"
        );
        assert!(matches!(plan(&case), Err(ConfigError::Invalid { .. })));
    }
}
