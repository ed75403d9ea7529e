//! System Metadata Collection
//!
//! Output parameters describing the host, written to the suite scope
//! before the sweep starts.
//!
//! Linux-specific data (CPU model) degrades to "unknown" on other platforms.

use chrono::Local;
use phasebench_core::ParamScope;
use phasebench_core::constants::{
    CONFIG_FILE, CPU_MODEL, DATE_TIME, HOST_NAME, NUMBER_OF_CPUS, OS_ARCHITECTURE, OS_NAME, VERSION,
};
use phasebench_report::SystemInfo;

const UNKNOWN: &str = "unknown";

/// Write host description parameters into `scope`
pub fn apply_system_params(scope: &ParamScope, config_file: &str) {
    scope.set_value(VERSION, env!("CARGO_PKG_VERSION"));
    scope.set_value(OS_NAME, std::env::consts::OS);
    scope.set_value(OS_ARCHITECTURE, std::env::consts::ARCH);
    scope.set_value(DATE_TIME, Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    scope.set_value(NUMBER_OF_CPUS, num_cpus() as i64);
    scope.set_value(HOST_NAME, host_name().unwrap_or_else(|| UNKNOWN.to_string()));
    scope.set_value(CPU_MODEL, cpu_model().unwrap_or_else(|| UNKNOWN.to_string()));
    scope.set_value(CONFIG_FILE, config_file);
}

/// Read the host description back from a suite scope
pub fn system_info(scope: &ParamScope) -> SystemInfo {
    let text = |name: &str| scope.get(name).unwrap_or_else(|| UNKNOWN.to_string());
    SystemInfo {
        os: text(OS_NAME),
        arch: text(OS_ARCHITECTURE),
        cpu: text(CPU_MODEL),
        cpu_count: scope
            .get_long(NUMBER_OF_CPUS)
            .map(|n| n.max(1) as usize)
            .unwrap_or_else(|_| num_cpus()),
        host_name: text(HOST_NAME),
    }
}

/// Number of available processors
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(unix)]
fn host_name() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is writable for buf.len() bytes; gethostname writes at most that many.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec()).ok().filter(|s| !s.is_empty())
}

#[cfg(not(unix))]
fn host_name() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

/// Get CPU model name from /proc/cpuinfo (Linux only)
fn cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
