//! Suite configuration files
//!
//! A suite is described by one or more TOML files. Parameter tables are
//! flattened into dotted names in file order, so a later entry may
//! reference an earlier one through `${...}`:
//!
//! ```toml
//! name = "codecs"
//!
//! [params]
//! phasebench.numberOfThreads = 2
//! phasebench.runTime = "00:05"
//! payload = "small"
//!
//! [[driver]]
//! name = "JsonCodec"
//! normal = true
//! params = { "phasebench.resourcePath" = "codecs" }
//!
//! [[test_case]]
//! name = "${payload}-1k"
//! params = { size = 1024 }
//! ```

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Value;

/// Errors raised while reading or materializing a suite
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid suite description
    #[error("cannot parse '{}': {source}", path.display())]
    Parse {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// A parameter could not be set or read
    #[error(transparent)]
    Param(#[from] phasebench_core::ParamError),

    /// A duration parameter is malformed
    #[error("{name}: {source}")]
    Duration {
        /// Parameter name
        name: String,
        /// Underlying error
        #[source]
        source: phasebench_core::DurationError,
    },

    /// A parameter holds a value outside its allowed set
    #[error("invalid value '{value}' for {name}: expected {expected}")]
    Invalid {
        /// Parameter name
        name: String,
        /// Offending value
        value: String,
        /// Description of the allowed values
        expected: &'static str,
    },

    /// The result unit is not one of the supported units
    #[error("unknown result unit '{0}': expected one of tps, ms, mbps, %gctime")]
    UnknownResultUnit(String),

    /// Two drivers or two test cases share a name
    #[error("duplicate {kind} '{name}'")]
    Duplicate {
        /// `driver` or `test case`
        kind: &'static str,
        /// Repeated name
        name: String,
    },

    /// A driver extends a driver that was not declared before it
    #[error("driver '{driver}' extends unknown driver '{base}'")]
    UnknownBase {
        /// Extending driver
        driver: String,
        /// Missing base driver
        base: String,
    },

    /// More than one driver is marked as the normalizer
    #[error("drivers '{first}' and '{second}' are both marked normal")]
    MultipleNormal {
        /// First normal driver
        first: String,
        /// Second normal driver
        second: String,
    },

    /// The suite declares no drivers
    #[error("suite '{0}' declares no drivers")]
    NoDrivers(String),

    /// The suite declares no test cases
    #[error("suite '{0}' declares no test cases")]
    NoTestCases(String),

    /// A parameter table holds a value that has no string form
    #[error("parameter '{0}' must be a string, number, boolean or array of those")]
    Unsupported(String),
}

/// Parameters flattened to `(dotted name, raw value)` pairs in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamList(Vec<(String, String)>);

impl ParamList {
    /// Flatten a TOML table
    pub fn from_table(table: &toml::Table) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        flatten_into(&mut entries, None, table)?;
        Ok(Self(entries))
    }

    /// Entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw value of the last entry named `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append another list; its entries are applied after ours and win
    pub fn extend(&mut self, other: ParamList) {
        self.0.extend(other.0);
    }
}

impl<'de> Deserialize<'de> for ParamList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let table = toml::Table::deserialize(deserializer)?;
        ParamList::from_table(&table).map_err(serde::de::Error::custom)
    }
}

fn flatten_into(
    entries: &mut Vec<(String, String)>,
    prefix: Option<&str>,
    table: &toml::Table,
) -> Result<(), ConfigError> {
    for (key, value) in table {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Table(nested) => flatten_into(entries, Some(&name), nested)?,
            Value::Array(items) => {
                let rendered = items
                    .iter()
                    .map(scalar)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| ConfigError::Unsupported(name.clone()))?;
                entries.push((name, rendered.join(",")));
            }
            other => {
                let rendered = scalar(other).ok_or_else(|| ConfigError::Unsupported(name.clone()))?;
                entries.push((name, rendered));
            }
        }
    }
    Ok(())
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

/// Top-level suite description
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    /// Suite name, defaulting to the file stem
    pub name: Option<String>,
    /// Global parameters
    pub params: ParamList,
    /// Drivers outside any group
    #[serde(rename = "driver")]
    pub drivers: Vec<DriverConfig>,
    /// Driver groups sharing an intermediate scope
    #[serde(rename = "driver_group")]
    pub driver_groups: Vec<DriverGroupConfig>,
    /// Test cases outside any group
    #[serde(rename = "test_case")]
    pub test_cases: Vec<TestCaseConfig>,
    /// Test case groups sharing an intermediate scope
    #[serde(rename = "test_case_group")]
    pub test_case_groups: Vec<TestCaseGroupConfig>,
}

/// One driver declaration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Driver name
    pub name: String,
    /// Whether this driver is the normalization baseline
    pub normal: bool,
    /// Name of a previously declared driver to inherit from
    pub extends: Option<String>,
    /// Driver parameters
    pub params: ParamList,
}

/// Drivers sharing a parameter scope
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverGroupConfig {
    /// Optional label
    pub name: Option<String>,
    /// Group parameters
    pub params: ParamList,
    /// Member drivers
    pub driver: Vec<DriverConfig>,
}

/// One test case declaration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestCaseConfig {
    /// Test case name, may reference parameters through `${...}`
    pub name: String,
    /// Test case parameters
    pub params: ParamList,
}

/// Test cases sharing a parameter scope
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestCaseGroupConfig {
    /// Optional label
    pub name: Option<String>,
    /// Group parameters
    pub params: ParamList,
    /// Member test cases
    pub test_case: Vec<TestCaseConfig>,
}

impl SuiteConfig {
    /// Load a suite file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.name.is_none() {
            config.name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        }
        tracing::debug!(path = %path.display(), drivers = config.driver_count(), "Loaded suite file");
        Ok(config)
    }

    /// Parse a suite from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Merge several suites into one.
    ///
    /// Parameters are concatenated so later files win. Drivers and test
    /// cases are concatenated; a later declaration with the same name
    /// replaces the earlier one in place. The first named suite names the result.
    pub fn merge(configs: impl IntoIterator<Item = SuiteConfig>) -> SuiteConfig {
        let mut merged = SuiteConfig::default();
        for config in configs {
            if merged.name.is_none() {
                merged.name = config.name;
            }
            merged.params.extend(config.params);
            for driver in config.drivers {
                replace_or_push(&mut merged.drivers, driver, |d| &d.name);
            }
            merged.driver_groups.extend(config.driver_groups);
            for test_case in config.test_cases {
                replace_or_push(&mut merged.test_cases, test_case, |t| &t.name);
            }
            merged.test_case_groups.extend(config.test_case_groups);
        }
        merged
    }

    /// Drivers declared directly and inside groups
    pub fn driver_count(&self) -> usize {
        self.drivers.len() + self.driver_groups.iter().map(|g| g.driver.len()).sum::<usize>()
    }

    /// Test cases declared directly and inside groups
    pub fn test_case_count(&self) -> usize {
        self.test_cases.len()
            + self
                .test_case_groups
                .iter()
                .map(|g| g.test_case.len())
                .sum::<usize>()
    }
}

fn replace_or_push<T>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> &String) {
    match items.iter().position(|existing| key(existing) == key(&item)) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
name = "codecs"

[params]
phasebench.numberOfThreads = 2
phasebench.runTime = "00:05"
sizes = [16, 1024]
ratio = 0.5

[[driver]]
name = "Json"
normal = true
params = { "phasebench.resourcePath" = "codecs" }

[[driver_group]]
params = { "phasebench.sharedDomain" = true }

[[driver_group.driver]]
name = "Cbor"

[[test_case]]
name = "small"
params = { size = 16 }

[[test_case_group]]
params = { payload = "text" }

[[test_case_group.test_case]]
name = "large"
"#;

    #[test]
    fn test_parse_flattens_in_order() {
        let config = SuiteConfig::parse(SUITE).unwrap();
        assert_eq!(config.name.as_deref(), Some("codecs"));

        let names: Vec<&str> = config.params.iter().map(|(k, _)| k).collect();
        assert_eq!(
            names,
            ["phasebench.numberOfThreads", "phasebench.runTime", "sizes", "ratio"]
        );
        assert_eq!(config.params.get("sizes"), Some("16,1024"));
        assert_eq!(config.params.get("ratio"), Some("0.5"));
        assert_eq!(config.params.get("phasebench.numberOfThreads"), Some("2"));
    }

    #[test]
    fn test_parse_drivers_and_groups() {
        let config = SuiteConfig::parse(SUITE).unwrap();
        assert_eq!(config.driver_count(), 2);
        assert_eq!(config.test_case_count(), 2);
        assert!(config.drivers[0].normal);
        assert_eq!(config.drivers[0].params.get("phasebench.resourcePath"), Some("codecs"));
        assert_eq!(config.driver_groups[0].params.get("phasebench.sharedDomain"), Some("true"));
        assert_eq!(config.test_case_groups[0].test_case[0].name, "large");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = SuiteConfig::parse("colour = \"red\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_nested_array_rejected() {
        let err = SuiteConfig::parse("[params]\nbad = [[1, 2]]").unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_merge_later_wins() {
        let first = SuiteConfig::parse(
            r#"
name = "first"
[params]
a = "1"
[[driver]]
name = "D"
params = { x = "old" }
"#,
        )
        .unwrap();
        let second = SuiteConfig::parse(
            r#"
name = "second"
[params]
a = "2"
[[driver]]
name = "D"
params = { x = "new" }
[[driver]]
name = "E"
"#,
        )
        .unwrap();

        let merged = SuiteConfig::merge([first, second]);
        assert_eq!(merged.name.as_deref(), Some("first"));
        assert_eq!(merged.params.len(), 2);
        assert_eq!(merged.params.get("a"), Some("2"));
        assert_eq!(merged.drivers.len(), 2);
        assert_eq!(merged.drivers[0].params.get("x"), Some("new"));
    }

    #[test]
    fn test_load_defaults_name_to_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nightly.toml");
        std::fs::write(&path, "[[driver]]\nname = \"D\"\n").unwrap();

        let config = SuiteConfig::load(&path).unwrap();
        assert_eq!(config.name.as_deref(), Some("nightly"));

        let missing = SuiteConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
