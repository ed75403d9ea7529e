//! Well-known parameter names
//!
//! Every name the harness reads or writes lives under the `phasebench.`
//! prefix. Process environment variables carrying the same prefix override
//! suite configuration.

/// Namespace prefix for every well-known parameter
pub const PREFIX: &str = "phasebench.";

/// Sentinel written into records that lack a name their siblings define
pub const NOT_APPLICABLE: &str = "n/a";

/// Separator between entries of a resource path
pub const PATH_SEPARATOR: char = ',';

/// Iteration count used when neither a time nor a count is configured
pub const DEFAULT_ITERATIONS: i64 = 300;

/// Result unit used when none is configured
pub const DEFAULT_RESULT_UNIT: &str = "tps";

/// Reports directory used when none is configured
pub const DEFAULT_REPORTS_DIRECTORY: &str = "reports";

// Execution

pub const NUMBER_OF_THREADS: &str = "phasebench.numberOfThreads";
pub const RUNS_PER_DRIVER: &str = "phasebench.runsPerDriver";
pub const WARMUPS_PER_DRIVER: &str = "phasebench.warmupsPerDriver";
pub const WARMUP_TIME: &str = "phasebench.warmupTime";
pub const RUN_TIME: &str = "phasebench.runTime";
pub const WARMUP_ITERATIONS: &str = "phasebench.warmupIterations";
pub const RUN_ITERATIONS: &str = "phasebench.runIterations";
pub const RUN_ITERATION_DELAY: &str = "phasebench.runIterationDelay";
pub const RESULT_UNIT: &str = "phasebench.resultUnit";
pub const RESULT_UNIT_X: &str = "phasebench.resultUnitX";
pub const INPUT_FILE: &str = "phasebench.inputFile";
pub const REPORT_PEAK_HEAP_USAGE: &str = "phasebench.reportPeakHeapUsage";

// Loading

pub const DRIVER_CLASS: &str = "phasebench.driverClass";
pub const RESOURCE_PATH: &str = "phasebench.resourcePath";
pub const RESOURCE_SET: &str = "phasebench.resourceSet";
pub const SHARED_DOMAIN: &str = "phasebench.sharedDomain";

// Raw per-run outputs

pub const WARMUP_ITERATIONS_SUM: &str = "phasebench.warmupIterationsSum";
pub const WARMUP_TIME_SUM: &str = "phasebench.warmupTimeSum";
pub const RUN_ITERATIONS_SUM: &str = "phasebench.runIterationsSum";
pub const RUN_TIME_SUM: &str = "phasebench.runTimeSum";
pub const ACTUAL_WARMUP_TIME: &str = "phasebench.actualWarmupTime";
pub const ACTUAL_RUN_TIME: &str = "phasebench.actualRunTime";
pub const ACTUAL_PREPARE_TIME: &str = "phasebench.actualPrepareTime";
pub const GC_TIME: &str = "phasebench.gcTime";

// Derived per-test outputs

pub const RESULT_VALUE: &str = "phasebench.resultValue";
pub const RESULT_VALUE_X: &str = "phasebench.resultValueX";
pub const RESULT_TIME: &str = "phasebench.resultTime";
pub const RESULT_ITERATIONS: &str = "phasebench.resultIterations";
pub const RESULT_VALUE_STDDEV: &str = "phasebench.resultValueStddev";
pub const RESULT_VALUE_X_STDDEV: &str = "phasebench.resultValueXStddev";
pub const RESULT_TIME_STDDEV: &str = "phasebench.resultTimeStddev";
pub const RESULT_ITERATIONS_STDDEV: &str = "phasebench.resultIterationsStddev";

// Driver summary means

pub const RESULT_ARIT_MEAN: &str = "phasebench.resultAritMean";
pub const RESULT_GEOM_MEAN: &str = "phasebench.resultGeomMean";
pub const RESULT_HARM_MEAN: &str = "phasebench.resultHarmMean";
pub const RESULT_ARIT_MEAN_X: &str = "phasebench.resultAritMeanX";
pub const RESULT_GEOM_MEAN_X: &str = "phasebench.resultGeomMeanX";
pub const RESULT_HARM_MEAN_X: &str = "phasebench.resultHarmMeanX";
pub const RESULT_ARIT_MEAN_STDDEV: &str = "phasebench.resultAritMeanStddev";
pub const RESULT_GEOM_MEAN_STDDEV: &str = "phasebench.resultGeomMeanStddev";
pub const RESULT_HARM_MEAN_STDDEV: &str = "phasebench.resultHarmMeanStddev";
pub const RESULT_ARIT_MEAN_X_STDDEV: &str = "phasebench.resultAritMeanXStddev";
pub const RESULT_GEOM_MEAN_X_STDDEV: &str = "phasebench.resultGeomMeanXStddev";
pub const RESULT_HARM_MEAN_X_STDDEV: &str = "phasebench.resultHarmMeanXStddev";
pub const PEAK_HEAP_USAGE: &str = "phasebench.peakHeapUsage";

// Reporting

pub const REPORTS_DIRECTORY: &str = "phasebench.reportsDirectory";
pub const CHART_TYPE: &str = "phasebench.chartType";
pub const RESULT_AXIS: &str = "phasebench.resultAxis";
pub const RESULT_AXIS_X: &str = "phasebench.resultAxisX";
pub const PLOT_GROUP_SIZE: &str = "phasebench.plotGroupSize";
pub const CONFIG_FILE: &str = "phasebench.configFile";

// Suite output parameters

pub const VERSION: &str = "phasebench.version";
pub const OS_NAME: &str = "phasebench.osName";
pub const OS_ARCHITECTURE: &str = "phasebench.osArchitecture";
pub const DATE_TIME: &str = "phasebench.dateTime";
pub const NUMBER_OF_CPUS: &str = "phasebench.numberOfCpus";
pub const HOST_NAME: &str = "phasebench.hostName";
pub const CPU_MODEL: &str = "phasebench.cpuModel";
