//! Driver Loader
//!
//! Resolves a driver's implementation class inside a loading domain and
//! instantiates it. Implementations register themselves into named
//! *libraries* with `#[driver(library = "...")]`; a driver's resource path
//! lists the libraries its domain may see.
//!
//! ```text
//!               ┌──────────────────────────────┐
//! DriverRecord ─►  Isolation::for_driver       │
//!               └──────┬───────────┬─────────┬─┘
//!                      │           │         │
//!                 PerDriver     Shared      Host(name)
//!              fresh domain  accumulating  embedder-registered
//!              per driver    domain        DriverFactory
//!                      └───────────┴─────────┘
//!                                  │
//!                                  ▼
//!                   DriverFactory::instantiate(driver, class)
//! ```
//!
//! The lifecycle trait and records live in this crate and are shared by
//! every domain, so instances cross domain boundaries unchanged; classes
//! resolve only among the libraries on the domain's path.

use crate::constants::{DRIVER_CLASS, PATH_SEPARATOR, RESOURCE_PATH, RESOURCE_SET, SHARED_DOMAIN};
use crate::driver::BenchmarkDriver;
use crate::params::{ParamError, ParamScope};
use crate::records::DriverRecord;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Registration of one driver implementation, submitted by `#[driver]`
#[derive(Debug, Clone)]
pub struct DriverDef {
    /// Library (resource path entry) the class belongs to
    pub library: &'static str,
    /// Class identifier referenced by `phasebench.driverClass`
    pub class: &'static str,
    /// Constructor for a fresh instance
    pub create: fn() -> Box<dyn BenchmarkDriver>,
    /// Module path of the implementing type
    pub module_path: &'static str,
    /// Source file path
    pub file: &'static str,
    /// Source line number
    pub line: u32,
}

inventory::collect!(DriverDef);

/// Every driver registered in this binary
pub fn registered_drivers() -> Vec<&'static DriverDef> {
    inventory::iter::<DriverDef>.into_iter().collect()
}

/// Failure to resolve or instantiate a driver implementation
#[derive(Debug, Error)]
pub enum LoadError {
    /// No library on the path registers the class
    #[error("driver '{driver}': class '{class}' not found on resource path [{path}]")]
    ClassNotFound {
        /// Driver name
        driver: String,
        /// Requested class
        class: String,
        /// Resource path searched
        path: String,
    },
    /// Several libraries on the path register the class
    #[error("driver '{driver}': class '{class}' is registered by libraries [{libraries}]")]
    Ambiguous {
        /// Driver name
        driver: String,
        /// Requested class
        class: String,
        /// Libraries registering it
        libraries: String,
    },
    /// The driver references a resource set nobody registered
    #[error("driver '{driver}': reference to undefined resource set '{name}'")]
    UndefinedResourceSet {
        /// Driver name
        driver: String,
        /// Missing resource set
        name: String,
    },
    /// Loading parameters could not be read
    #[error("driver '{driver}': {source}")]
    Param {
        /// Driver name
        driver: String,
        /// Underlying parameter error
        #[source]
        source: ParamError,
    },
}

impl LoadError {
    /// Configuration errors abort the invocation; the rest drop one driver
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadError::UndefinedResourceSet { .. } | LoadError::Param { .. }
        )
    }
}

/// Produces driver instances from a class identifier
pub trait DriverFactory: Send + Sync {
    /// Instantiate `class` for the driver named `driver`
    fn instantiate(&self, driver: &str, class: &str) -> Result<Box<dyn BenchmarkDriver>, LoadError>;
}

/// Loading domain backed by registered libraries
#[derive(Debug, Clone)]
pub struct LibraryDomain {
    registry: Arc<[&'static DriverDef]>,
    libraries: Vec<String>,
}

impl LibraryDomain {
    /// Domain over `registry` seeded with `libraries`.
    ///
    /// An empty library list sees every registered library.
    pub fn new(registry: Arc<[&'static DriverDef]>, libraries: Vec<String>) -> Self {
        let mut domain = Self {
            registry,
            libraries: Vec::new(),
        };
        domain.add_libraries(libraries);
        domain
    }

    /// Libraries visible in this domain
    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    /// Extend the path; entries are never replaced
    pub fn add_libraries(&mut self, libraries: impl IntoIterator<Item = String>) {
        for library in libraries {
            if !self.libraries.contains(&library) {
                self.libraries.push(library);
            }
        }
    }

    fn visible(&self, def: &DriverDef) -> bool {
        self.libraries.is_empty() || self.libraries.iter().any(|l| l == def.library)
    }
}

impl DriverFactory for LibraryDomain {
    fn instantiate(&self, driver: &str, class: &str) -> Result<Box<dyn BenchmarkDriver>, LoadError> {
        let candidates: Vec<&DriverDef> = self
            .registry
            .iter()
            .copied()
            .filter(|def| def.class == class && self.visible(def))
            .collect();

        match candidates.as_slice() {
            [def] => {
                debug!(driver, class, library = def.library, "instantiating driver");
                Ok((def.create)())
            }
            [] => Err(LoadError::ClassNotFound {
                driver: driver.to_string(),
                class: class.to_string(),
                path: self.libraries.join(", "),
            }),
            many => Err(LoadError::Ambiguous {
                driver: driver.to_string(),
                class: class.to_string(),
                libraries: many
                    .iter()
                    .map(|def| def.library)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Isolation strategy selected for one driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// Fresh domain seeded only with the driver's resource path
    PerDriver,
    /// One domain accumulating every driver's resource path
    Shared,
    /// Embedder-registered factory under this name
    Host(String),
}

impl Isolation {
    /// Select the strategy from a driver's parameters
    pub fn for_driver(params: &ParamScope) -> Result<Self, ParamError> {
        if let Some(name) = params.get(RESOURCE_SET) {
            return Ok(Isolation::Host(name));
        }
        if params.has(SHARED_DOMAIN) && params.get_bool(SHARED_DOMAIN)? {
            return Ok(Isolation::Shared);
        }
        Ok(Isolation::PerDriver)
    }
}

/// Split a resource path into library names
pub fn parse_resource_path(raw: &str) -> Vec<String> {
    raw.split(PATH_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Class identifier of a driver, defaulting to its name
pub fn driver_class(driver: &DriverRecord) -> String {
    driver
        .params()
        .get(DRIVER_CLASS)
        .unwrap_or_else(|| driver.name().to_string())
}

/// Hands out loading domains per the selected isolation strategy
pub struct DriverLoader {
    registry: Arc<[&'static DriverDef]>,
    shared: LibraryDomain,
    resource_sets: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverLoader {
    /// Loader over every driver registered in this binary
    pub fn new() -> Self {
        Self::with_registry(registered_drivers())
    }

    /// Loader over an explicit registry
    pub fn with_registry(registry: Vec<&'static DriverDef>) -> Self {
        let registry: Arc<[&'static DriverDef]> = registry.into();
        Self {
            shared: LibraryDomain::new(registry.clone(), Vec::new()),
            registry,
            resource_sets: HashMap::new(),
        }
    }

    /// Register a named resource set for host passthrough
    pub fn register_resource_set(&mut self, name: impl Into<String>, factory: Arc<dyn DriverFactory>) {
        self.resource_sets.insert(name.into(), factory);
    }

    /// Registered resource sets
    pub fn resource_sets(&self) -> impl Iterator<Item = &str> {
        self.resource_sets.keys().map(String::as_str)
    }

    /// Resolve the domain a driver loads from
    pub fn domain_for(&mut self, driver: &DriverRecord) -> Result<Arc<dyn DriverFactory>, LoadError> {
        let params = driver.params();
        let isolation = Isolation::for_driver(params).map_err(|source| LoadError::Param {
            driver: driver.name().to_string(),
            source,
        })?;
        let libraries = params
            .get(RESOURCE_PATH)
            .map(|raw| parse_resource_path(&raw))
            .unwrap_or_default();

        debug!(driver = driver.name(), ?isolation, ?libraries, "resolving loading domain");

        match isolation {
            Isolation::Host(name) => self.resource_sets.get(&name).cloned().ok_or_else(|| {
                LoadError::UndefinedResourceSet {
                    driver: driver.name().to_string(),
                    name,
                }
            }),
            Isolation::Shared => {
                self.shared.add_libraries(libraries);
                Ok(Arc::new(self.shared.clone()))
            }
            Isolation::PerDriver => Ok(Arc::new(LibraryDomain::new(self.registry.clone(), libraries))),
        }
    }
}

impl Default for DriverLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TestCase;

    struct Named(&'static str);

    impl BenchmarkDriver for Named {
        fn run(&mut self, tc: &TestCase) -> anyhow::Result<()> {
            tc.params().set_value("ran.by", self.0);
            Ok(())
        }
    }

    fn alpha() -> Box<dyn BenchmarkDriver> {
        Box::new(Named("alpha"))
    }

    fn beta() -> Box<dyn BenchmarkDriver> {
        Box::new(Named("beta"))
    }

    static ALPHA_CODEC: DriverDef = DriverDef {
        library: "alpha",
        class: "Codec",
        create: alpha,
        module_path: module_path!(),
        file: file!(),
        line: line!(),
    };

    static BETA_CODEC: DriverDef = DriverDef {
        library: "beta",
        class: "Codec",
        create: beta,
        module_path: module_path!(),
        file: file!(),
        line: line!(),
    };

    fn loader() -> DriverLoader {
        DriverLoader::with_registry(vec![&ALPHA_CODEC, &BETA_CODEC])
    }

    fn record(path: Option<&str>) -> DriverRecord {
        let suite = Arc::new(ParamScope::new());
        let record = DriverRecord::new("codec", &suite);
        record.params().set(DRIVER_CLASS, "Codec").unwrap();
        if let Some(path) = path {
            record.params().set(RESOURCE_PATH, path).unwrap();
        }
        record
    }

    fn run_once(factory: &dyn DriverFactory) -> String {
        let suite = Arc::new(ParamScope::new());
        let tc = TestCase::new("t", &suite);
        let mut instance = factory.instantiate("codec", "Codec").unwrap();
        instance.run(&tc).unwrap();
        tc.params().get("ran.by").unwrap()
    }

    #[test]
    fn test_same_class_in_two_domains_does_not_collide() {
        let mut loader = loader();
        let a = loader.domain_for(&record(Some("alpha"))).unwrap();
        let b = loader.domain_for(&record(Some("beta"))).unwrap();
        assert_eq!(run_once(a.as_ref()), "alpha");
        assert_eq!(run_once(b.as_ref()), "beta");
    }

    #[test]
    fn test_unqualified_path_is_ambiguous() {
        let mut loader = loader();
        let domain = loader.domain_for(&record(None)).unwrap();
        let err = domain.instantiate("codec", "Codec").err().unwrap();
        assert!(matches!(err, LoadError::Ambiguous { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_class_is_recoverable() {
        let mut loader = loader();
        let domain = loader.domain_for(&record(Some("alpha"))).unwrap();
        let err = domain.instantiate("codec", "NoSuchCodec").err().unwrap();
        assert!(matches!(err, LoadError::ClassNotFound { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_shared_domain_accumulates_paths() {
        let mut loader = loader();
        let first = record(Some("alpha"));
        first.params().set(SHARED_DOMAIN, "true").unwrap();
        let second = record(Some("beta"));
        second.params().set(SHARED_DOMAIN, "true").unwrap();

        let domain = loader.domain_for(&first).unwrap();
        assert_eq!(run_once(domain.as_ref()), "alpha");

        loader.domain_for(&second).unwrap();
        assert_eq!(loader.shared.libraries(), ["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_host_passthrough() {
        let mut loader = loader();
        loader.register_resource_set(
            "embedded",
            Arc::new(LibraryDomain::new(vec![&BETA_CODEC].into(), Vec::new())),
        );

        let driver = record(Some("alpha"));
        driver.params().set(RESOURCE_SET, "embedded").unwrap();
        let domain = loader.domain_for(&driver).unwrap();
        assert_eq!(run_once(domain.as_ref()), "beta");

        let orphan = record(None);
        orphan.params().set(RESOURCE_SET, "nowhere").unwrap();
        let err = loader.domain_for(&orphan).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_driver_class_defaults_to_name() {
        let suite = Arc::new(ParamScope::new());
        let driver = DriverRecord::new("VecPush", &suite);
        assert_eq!(driver_class(&driver), "VecPush");
    }

    #[test]
    fn test_parse_resource_path() {
        assert_eq!(parse_resource_path(" a, ,b,"), vec!["a".to_string(), "b".to_string()]);
    }
}
