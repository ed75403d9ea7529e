//! Allocation Tracking
//!
//! A global allocator wrapper that keeps live and peak heap byte counts.
//! Install it in a benchmark binary to get peak heap usage per driver:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: phasebench::TrackingAllocator = phasebench::TrackingAllocator;
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

static CURRENT_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);

/// System allocator that records live and peak heap bytes
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded unchanged to the system allocator.
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            grow(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded unchanged to the system allocator.
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            grow(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: the caller upholds the GlobalAlloc contract for `ptr`.
        unsafe { System.dealloc(ptr, layout) };
        CURRENT_BYTES.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: the caller upholds the GlobalAlloc contract for `ptr`.
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                grow(new_size - layout.size());
            } else {
                CURRENT_BYTES.fetch_sub(layout.size() - new_size, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}

#[inline]
fn grow(bytes: usize) {
    let now = CURRENT_BYTES.fetch_add(bytes, Ordering::Relaxed) + bytes;
    PEAK_BYTES.fetch_max(now, Ordering::Relaxed);
}

/// Bytes currently allocated through the tracking allocator
pub fn current_allocation() -> usize {
    CURRENT_BYTES.load(Ordering::Relaxed)
}

/// Highest live byte count observed since the last reset
pub fn peak_allocation() -> usize {
    PEAK_BYTES.load(Ordering::Relaxed)
}

/// Reset the peak to the current live byte count
pub fn reset_peak_allocation() {
    PEAK_BYTES.store(CURRENT_BYTES.load(Ordering::Relaxed), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test: the counters are process-wide.
    #[test]
    fn test_direct_allocation_updates_peak() {
        reset_peak_allocation();
        assert_eq!(peak_allocation(), current_allocation());

        let layout = Layout::from_size_align(4096, 8).unwrap();
        let before = current_allocation();
        unsafe {
            let ptr = TrackingAllocator.alloc(layout);
            assert!(!ptr.is_null());
            assert!(peak_allocation() >= before + 4096);
            TrackingAllocator.dealloc(ptr, layout);
        }
        assert_eq!(current_allocation(), before);
    }
}
