//! `GlobalAlloc` wrapper that routes every allocation and free through the ledger.
//!
//! ```ignore
//! static MONITOR: MemoryMonitor = MemoryMonitor::new(Config::get());
//!
//! #[global_allocator]
//! static ALLOCATOR: TrackingAllocator<MyHeap> = TrackingAllocator::new(MyHeap::empty(), &MONITOR);
//! ```
//!
//! The inner allocator's results and arguments pass through unchanged. The
//! wrapper never allocates on its own.

use core::alloc::{GlobalAlloc, Layout};

use crate::config::MAX_TRACKED;
use crate::ledger::FreeOutcome;
use crate::memory_map::Address;
use crate::monitor::MemoryMonitor;

pub struct TrackingAllocator<A, const N: usize = MAX_TRACKED> {
    inner: A,
    monitor: &'static MemoryMonitor<N>,
}

impl<A, const N: usize> TrackingAllocator<A, N> {
    pub const fn new(inner: A, monitor: &'static MemoryMonitor<N>) -> Self {
        Self { inner, monitor }
    }

    #[inline]
    pub const fn inner(&self) -> &A {
        &self.inner
    }

    #[inline]
    pub const fn monitor(&self) -> &'static MemoryMonitor<N> {
        self.monitor
    }
}

/// Ledger sizes are 16-bit; larger requests are recorded as `u16::MAX`.
#[inline]
fn ledger_size(layout: &Layout) -> u16 {
    u16::try_from(layout.size()).unwrap_or(u16::MAX)
}

// SAFETY: every call is delegated to `inner` with the caller's arguments, and
// its result is returned as-is. Tracking only reads the returned pointer value.
unsafe impl<A: GlobalAlloc, const N: usize> GlobalAlloc for TrackingAllocator<A, N> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller upholds the GlobalAlloc contract for `layout`.
        let ptr = unsafe { self.inner.alloc(layout) };
        self.monitor
            .record_allocation(Address::from_ptr(ptr), ledger_size(&layout));
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller upholds the GlobalAlloc contract for `layout`.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        self.monitor
            .record_allocation(Address::from_ptr(ptr), ledger_size(&layout));
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // Untrack first so a concurrent snapshot never counts a freed block.
        self.monitor.record_free(Address::from_ptr(ptr));
        // SAFETY: ptr was returned by `inner` for this layout.
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // Untrack first, like dealloc: the inner realloc may free the old block.
        let old = Address::from_ptr(ptr);
        let released = self.monitor.record_free(old);
        // SAFETY: caller upholds the GlobalAlloc contract for `ptr` and `layout`.
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if new_ptr.is_null() {
            // The old block is still live.
            if let FreeOutcome::Released { size, .. } = released {
                self.monitor.revert_free(old, size);
            }
        } else {
            let new_size = u16::try_from(new_size).unwrap_or(u16::MAX);
            self.monitor
                .record_allocation(Address::from_ptr(new_ptr), new_size);
        }
        new_ptr
    }
}
