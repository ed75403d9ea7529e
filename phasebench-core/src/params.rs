//! Parameter Scopes
//!
//! Hierarchical, typed key/value configuration shared by suites, drivers and
//! test cases.
//!
//! ```text
//! suite (global) ──► driver group ──► driver ──► test case
//!        ▲                                           │
//!        └──────────── lookup on miss ───────────────┘
//! ```
//!
//! Values are type-sniffed on assignment and `${name}` placeholders are
//! expanded eagerly, once, against the scope chain and then the process
//! environment. Every reader and mutator takes the scope's internal lock, so
//! a scope can be shared by the worker threads of a run.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid"));

/// Errors raised by parameter lookup, conversion and interpolation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// The name is not defined anywhere in the scope chain
    #[error("parameter '{0}' is not defined")]
    Missing(String),
    /// The stored value cannot be read as the requested type
    #[error("cannot convert parameter '{name}' = '{value}' to {target}")]
    TypeConversion {
        /// Parameter name
        name: String,
        /// Stored value rendered as a string
        value: String,
        /// Requested type
        target: &'static str,
    },
    /// A placeholder names nothing in the chain or the environment
    #[error("undefined parameter or environment variable '{0}'")]
    Unresolved(String),
    /// A placeholder was opened but never closed
    #[error("unterminated placeholder in '{0}'")]
    Malformed(String),
}

/// Typed parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Free-form string
    Str(String),
    /// Boolean (`true` / `false`)
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// Double precision float
    Float(f64),
}

impl ParamValue {
    /// Sniff a raw string into the narrowest matching type.
    ///
    /// Exactly `true` or `false` become booleans, then integers, then
    /// doubles; anything else stays a string.
    pub fn sniff(raw: &str) -> Self {
        match raw {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            _ => {
                if let Ok(i) = raw.parse::<i64>() {
                    ParamValue::Int(i)
                } else if let Ok(f) = raw.parse::<f64>() {
                    ParamValue::Float(f)
                } else {
                    ParamValue::Str(raw.to_string())
                }
            }
        }
    }

    fn to_bool(&self, name: &str) -> Result<bool, ParamError> {
        match self {
            ParamValue::Bool(b) => Ok(*b),
            ParamValue::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            ParamValue::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(other.conversion_error(name, "bool")),
        }
    }

    fn to_long(&self, name: &str) -> Result<i64, ParamError> {
        match self {
            ParamValue::Int(i) => Ok(*i),
            ParamValue::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            ParamValue::Str(s) => s
                .trim()
                .parse::<i64>()
                .or_else(|_| {
                    s.trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                        .ok_or(())
                })
                .map_err(|_| self.conversion_error(name, "long")),
            other => Err(other.conversion_error(name, "long")),
        }
    }

    fn to_double(&self, name: &str) -> Result<f64, ParamError> {
        match self {
            ParamValue::Int(i) => Ok(*i as f64),
            ParamValue::Float(f) => Ok(*f),
            ParamValue::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.conversion_error(name, "double")),
            other => Err(other.conversion_error(name, "double")),
        }
    }

    fn conversion_error(&self, name: &str, target: &'static str) -> ParamError {
        ParamError::TypeConversion {
            name: name.to_string(),
            value: self.to_string(),
            target,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => f.write_str(&format_double(*x)),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

/// Render a double with at most three fractional digits, trimming zeros.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let rendered = format!("{:.3}", value);
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One level of the parameter hierarchy
#[derive(Debug, Default)]
pub struct ParamScope {
    values: RwLock<BTreeMap<String, ParamValue>>,
    parent: Option<Arc<ParamScope>>,
}

impl ParamScope {
    /// Create a root (global) scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope that falls back to `parent` on lookup miss
    pub fn with_parent(parent: Arc<ParamScope>) -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            parent: Some(parent),
        }
    }

    /// Create a scope with the same parent and a copy of this scope's own values
    pub fn deep_copy(&self) -> Self {
        Self {
            values: RwLock::new(self.values.read().clone()),
            parent: self.parent.clone(),
        }
    }

    /// Parent scope, if any
    pub fn parent(&self) -> Option<&Arc<ParamScope>> {
        self.parent.as_ref()
    }

    /// Only the root of a chain is global
    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether `name` is defined anywhere in the chain
    pub fn has(&self, name: &str) -> bool {
        self.get_value(name).is_some()
    }

    /// Whether `name` is stored directly in this scope
    pub fn has_own(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Whether `name` is defined in this scope or a non-global ancestor
    pub fn has_local(&self, name: &str) -> bool {
        self.non_global_chain()
            .any(|scope| scope.values.read().contains_key(name))
    }

    /// Look up a typed value, consulting the parent chain on miss
    pub fn get_value(&self, name: &str) -> Option<ParamValue> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.values.read().get(name) {
                return Some(value.clone());
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Look up a value rendered as a string
    pub fn get(&self, name: &str) -> Option<String> {
        self.get_value(name).map(|v| v.to_string())
    }

    /// Look up a boolean
    pub fn get_bool(&self, name: &str) -> Result<bool, ParamError> {
        self.require(name)?.to_bool(name)
    }

    /// Look up a 32-bit integer
    pub fn get_int(&self, name: &str) -> Result<i32, ParamError> {
        let value = self.require(name)?;
        let long = value.to_long(name)?;
        i32::try_from(long).map_err(|_| value.conversion_error(name, "int"))
    }

    /// Look up a 64-bit integer
    pub fn get_long(&self, name: &str) -> Result<i64, ParamError> {
        self.require(name)?.to_long(name)
    }

    /// Look up a double
    pub fn get_double(&self, name: &str) -> Result<f64, ParamError> {
        self.require(name)?.to_double(name)
    }

    /// Interpolate `raw`, sniff its type and store it in this scope
    pub fn set(&self, name: &str, raw: &str) -> Result<(), ParamError> {
        let expanded = self.evaluate(raw)?;
        self.values
            .write()
            .insert(name.to_string(), ParamValue::sniff(&expanded));
        Ok(())
    }

    /// Store an already-typed value without interpolation
    pub fn set_value(&self, name: &str, value: impl Into<ParamValue>) {
        self.values.write().insert(name.to_string(), value.into());
    }

    /// Set `name` only if the chain does not define it yet.
    ///
    /// Returns whether the value was stored.
    pub fn set_default(&self, name: &str, raw: &str) -> Result<bool, ParamError> {
        if self.has(name) {
            return Ok(false);
        }
        self.set(name, raw)?;
        Ok(true)
    }

    /// Remove `name` from the nearest scope in the chain that defines it
    pub fn remove(&self, name: &str) -> Option<ParamValue> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.values.write().remove(name) {
                return Some(value);
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Names defined in this scope or any non-global ancestor
    pub fn local_names(&self) -> BTreeSet<String> {
        self.non_global_chain()
            .flat_map(|scope| scope.values.read().keys().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Values visible from the non-global part of the chain, nearest scope winning
    pub fn local_values(&self) -> BTreeMap<String, ParamValue> {
        let chain: Vec<&ParamScope> = self.non_global_chain().collect();
        let mut merged = BTreeMap::new();
        for scope in chain.into_iter().rev() {
            for (name, value) in scope.values.read().iter() {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    /// Values stored directly in this scope
    pub fn own_values(&self) -> BTreeMap<String, ParamValue> {
        self.values.read().clone()
    }

    /// Expand every `${name}` in `expr` against the chain, then the environment
    pub fn evaluate(&self, expr: &str) -> Result<String, ParamError> {
        let mut expanded = String::with_capacity(expr.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(expr) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            expanded.push_str(&expr[last..whole.start()]);
            let name = name.as_str().trim();
            let value = self
                .get(name)
                .or_else(|| std::env::var(name).ok())
                .ok_or_else(|| ParamError::Unresolved(name.to_string()))?;
            expanded.push_str(&value);
            last = whole.end();
        }

        let rest = &expr[last..];
        if rest.contains("${") {
            return Err(ParamError::Malformed(expr.to_string()));
        }
        expanded.push_str(rest);
        Ok(expanded)
    }

    fn require(&self, name: &str) -> Result<ParamValue, ParamError> {
        self.get_value(name)
            .ok_or_else(|| ParamError::Missing(name.to_string()))
    }

    fn non_global_chain(&self) -> impl Iterator<Item = &ParamScope> {
        std::iter::successors(Some(self), |scope| scope.parent.as_deref())
            .take_while(|scope| !scope.is_global())
    }
}
