//! Allocation counters for the memory report.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static FREED: AtomicU64 = AtomicU64::new(0);

/// System allocator wrapper that counts bytes allocated and freed.
///
/// Install it in the binary:
///
/// ```rust,ignore
/// #[global_allocator]
/// static ALLOC: dlog::diagnostics::CountingAlloc = dlog::diagnostics::CountingAlloc;
/// ```
///
/// Without it the counters stay at zero.
pub struct CountingAlloc;

impl CountingAlloc {
    /// Bytes allocated over the life of the process.
    pub fn total_allocated() -> u64 {
        ALLOCATED.load(Ordering::Relaxed)
    }

    /// Bytes currently allocated.
    pub fn live() -> u64 {
        Self::total_allocated().saturating_sub(FREED.load(Ordering::Relaxed))
    }
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        FREED.fetch_add(layout.size() as u64, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            FREED.fetch_add(layout.size() as u64, Ordering::Relaxed);
            ALLOCATED.fetch_add(new_size as u64, Ordering::Relaxed);
        }
        new_ptr
    }
}
