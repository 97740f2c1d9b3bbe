//! ESP32 memory map: linker symbols, stack pointer and esp-alloc statistics.
//!
//! esp-alloc carves its heap out of a static array in `.bss`, so on this
//! target the heap never grows towards the stack. The region that can
//! collide is the CPU0 stack itself: its lowest address (`_stack_end_cpu0`)
//! stands in for the dynamic-region start and top, and the monitor's gap is
//! the unused part of the stack. Heap totals still come from the ledger, with
//! esp-alloc's own counters attached for cross-checking.

use core::convert::Infallible;

// Links the target's critical-section implementation.
use esp_hal as _;

use crate::memory_map::{Address, AllocatorStats, MemoryMap, MemoryRegionBounds};

/// Bytes below the live stack pointer left unfilled, so the fill loop never
/// overwrites its own frame. The band reads as used stack, so peaks on this
/// target can be overstated by up to this much.
const FILL_GUARD: usize = 256;

extern "C" {
    static _data_start: u8;
    static _data_end: u8;
    static _bss_start: u8;
    static _bss_end: u8;
    static _stack_start_cpu0: u8;
    static _stack_end_cpu0: u8;
}

/// Approximate stack pointer: the address of a local in this frame.
#[inline(always)]
fn stack_marker() -> Address {
    let marker = 0u8;
    Address::from_ptr(core::hint::black_box(&marker) as *const u8)
}

/// Memory map for the ESP32 (CPU0).
///
/// ESP32 DRAM spans well over 64 KiB and the CPU0 stack region can too. The
/// monitor's byte counts are `u16`, so `ram_total`, stack usage, the
/// high-water mark and the free gap clamp at 65535 on this target;
/// `MemoryRegionBounds::counts_clamped` is true and `init` logs a warning.
pub struct Esp32MemoryMap {
    _private: (),
}

impl Esp32MemoryMap {
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for Esp32MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMap for Esp32MemoryMap {
    fn region_bounds(&self) -> MemoryRegionBounds {
        // SAFETY: linker-provided symbols; only their addresses are taken.
        let (data_start, data_end, bss_start, bss_end, stack_low, stack_high) = unsafe {
            (
                Address::from_ptr(core::ptr::addr_of!(_data_start)),
                Address::from_ptr(core::ptr::addr_of!(_data_end)),
                Address::from_ptr(core::ptr::addr_of!(_bss_start)),
                Address::from_ptr(core::ptr::addr_of!(_bss_end)),
                Address::from_ptr(core::ptr::addr_of!(_stack_end_cpu0)),
                Address::from_ptr(core::ptr::addr_of!(_stack_start_cpu0)),
            )
        };
        MemoryRegionBounds {
            data_start,
            data_end,
            bss_start,
            bss_end,
            dynamic_region_start: stack_low,
            dynamic_region_top: stack_low,
            memory_ceiling: stack_high,
        }
    }

    fn current_stack_top(&self) -> Address {
        // critical_section::with restores the previous interrupt state on exit.
        critical_section::with(|_| stack_marker())
    }

    fn read_byte(&self, addr: Address) -> u8 {
        // SAFETY: callers only pass addresses inside the stack region from region_bounds().
        unsafe { core::ptr::read_volatile(addr.as_ptr()) }
    }

    fn write_byte(&mut self, addr: Address, value: u8) {
        // SAFETY: callers only pass addresses in the unused part of the stack region.
        unsafe { core::ptr::write_volatile(addr.as_ptr() as *mut u8, value) }
    }

    fn fill(&mut self, start: Address, end: Address, value: u8) {
        let limit = Address(stack_marker().0.saturating_sub(FILL_GUARD));
        let end = end.min(limit);
        let mut addr = start;
        while addr < end {
            self.write_byte(addr, value);
            addr = addr.offset(1);
        }
    }

    fn allocator_stats(&self) -> Option<AllocatorStats> {
        Some(AllocatorStats {
            used: esp_alloc::HEAP.used(),
            free: esp_alloc::HEAP.free(),
        })
    }
}

/// Byte writer over the esp-println UART, for [`crate::report::TextSink`].
#[derive(Default)]
pub struct UartWriter;

impl embedded_io::ErrorType for UartWriter {
    type Error = Infallible;
}

impl embedded_io::Write for UartWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        esp_println::Printer::write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
