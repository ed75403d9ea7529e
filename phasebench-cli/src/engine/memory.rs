//! Memory Probes
//!
//! The engine requests a collection before each measured phase, samples
//! cumulative collection time around it, and reports the peak heap growth
//! over a driver's whole sweep.

use phasebench_core::{current_allocation, peak_allocation, reset_peak_allocation};

/// Source of collection and heap measurements
pub trait MemoryProbe: Send {
    /// Ask the runtime to reclaim memory before a measured phase
    fn request_collection(&mut self) {}

    /// Cumulative time spent collecting, in milliseconds
    fn collection_time_ms(&self) -> f64 {
        0.0
    }

    /// Begin observing a driver sweep
    fn begin_sweep(&mut self);

    /// Peak heap growth since [`begin_sweep`](Self::begin_sweep), in bytes
    fn peak_usage_bytes(&self) -> usize;
}

/// Probe backed by the tracking global allocator.
///
/// Reports zero unless the binary installs
/// [`TrackingAllocator`](phasebench_core::TrackingAllocator) as its global
/// allocator. Rust has no collector, so collection time is always zero.
#[derive(Debug, Default)]
pub struct AllocatorProbe {
    baseline: usize,
}

impl MemoryProbe for AllocatorProbe {
    fn begin_sweep(&mut self) {
        reset_peak_allocation();
        self.baseline = current_allocation();
    }

    fn peak_usage_bytes(&self) -> usize {
        peak_allocation().saturating_sub(self.baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_probe_never_negative() {
        let mut probe = AllocatorProbe::default();
        probe.begin_sweep();
        let _buffer = vec![0u8; 4096];
        // Without the tracking allocator installed both counters stay at zero
        assert!(probe.peak_usage_bytes() <= peak_allocation());
        assert_eq!(probe.collection_time_ms(), 0.0);
    }
}
