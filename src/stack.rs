//! Stack high-water mark detection by sentinel fill and scan.
//!
//! At init the free gap between the dynamic-region top and the current stack
//! top is filled with a sentinel byte. The stack grows down into that gap and
//! every byte it touches loses the sentinel, even after the frames unwind.
//! Scanning up from the dynamic-region top to the first non-sentinel byte
//! therefore finds the deepest point the stack ever reached.
//!
//! Known limits of the technique, accepted as-is:
//! - a heap write landing in the scanned gap looks like stack use
//! - a stack write that happens to store the sentinel value is invisible
//! - anything that writes the gap before `arm` corrupts the baseline

use crate::memory_map::{Address, MemoryMap, MemoryRegionBounds};

/// Scan up from the dynamic-region top while bytes still hold `sentinel` and
/// return the stack depth (distance to the ceiling) at the first touched byte.
///
/// Runs without holding any lock. Stack activity during the scan can only
/// move the true boundary, never corrupt the result beyond one scan's staleness.
pub fn scan_penetration<M: MemoryMap + ?Sized>(
    map: &M,
    bounds: &MemoryRegionBounds,
    sentinel: u8,
) -> u16 {
    let ceiling = bounds.memory_ceiling;
    let mut addr = bounds.dynamic_region_top;
    while addr < ceiling && map.read_byte(addr) == sentinel {
        addr = addr.offset(1);
    }
    addr.bytes_to(ceiling)
}

/// Stack usage since the last `arm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackTracker {
    sentinel: u8,
    initial_stack_top: Address,
    high_water_mark: u16,
}

impl StackTracker {
    pub const fn new(sentinel: u8) -> Self {
        Self {
            sentinel,
            initial_stack_top: Address::NULL,
            high_water_mark: 0,
        }
    }

    /// Fill `[dynamic_region_top, stack_top)` with the sentinel and reset the
    /// high-water mark to the depth at `stack_top`.
    ///
    /// Destroys whatever was in the gap. Only call this before that memory
    /// holds live data, i.e. at subsystem init.
    pub fn arm<M: MemoryMap + ?Sized>(
        &mut self,
        map: &mut M,
        bounds: &MemoryRegionBounds,
        stack_top: Address,
    ) {
        map.fill(bounds.dynamic_region_top, stack_top, self.sentinel);
        self.initial_stack_top = stack_top;
        self.high_water_mark = Self::current_usage(stack_top, bounds.memory_ceiling);
    }

    /// Scan the gap and fold the result into the high-water mark.
    pub fn rescan<M: MemoryMap + ?Sized>(&mut self, map: &M, bounds: &MemoryRegionBounds) -> u16 {
        let depth = scan_penetration(map, bounds, self.sentinel);
        self.observe(depth)
    }

    /// Fold an externally scanned depth into the mark. Never decreases it.
    pub fn observe(&mut self, depth: u16) -> u16 {
        if depth > self.high_water_mark {
            self.high_water_mark = depth;
        }
        self.high_water_mark
    }

    /// Instantaneous stack depth, independent of sentinel integrity.
    #[inline]
    pub const fn current_usage(stack_top: Address, ceiling: Address) -> u16 {
        stack_top.bytes_to(ceiling)
    }

    #[inline]
    pub const fn high_water_mark(&self) -> u16 {
        self.high_water_mark
    }

    #[inline]
    pub const fn initial_stack_top(&self) -> Address {
        self.initial_stack_top
    }

    #[inline]
    pub const fn sentinel(&self) -> u8 {
        self.sentinel
    }

    /// Bytes between the dynamic-region top and the deepest stack point seen.
    /// Zero once the two have met.
    pub fn headroom(&self, bounds: &MemoryRegionBounds) -> u16 {
        bounds
            .dynamic_region_top
            .bytes_to(bounds.memory_ceiling)
            .saturating_sub(self.high_water_mark)
    }
}
