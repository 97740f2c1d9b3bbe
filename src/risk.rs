//! Fragmentation heuristic and heap/stack collision policy.

use crate::ledger::LedgerCounters;
use crate::memory_map::{Address, MemoryRegionBounds};

/// Heuristic heap fragmentation ratio in `[0.0, 1.0]`.
///
/// Coarse by construction: the allocator's free list is not observable, so
/// this only flags "many more live allocations than churn would explain".
/// When the dynamic region has no free space or nothing was ever allocated
/// the ratio is 0. Otherwise, once `alloc_count` exceeds `free_count + slack`,
/// it is the outstanding count (`alloc_count - free_count`) over ledger
/// `capacity`, clamped to 1.
pub fn fragmentation_ratio(
    counters: &LedgerCounters,
    bounds: &MemoryRegionBounds,
    capacity: usize,
    slack: u16,
) -> f32 {
    let total_free = bounds.dynamic_region_size().saturating_sub(counters.active_bytes);
    if total_free == 0 || counters.alloc_count == 0 || capacity == 0 {
        return 0.0;
    }
    outstanding_ratio(counters.alloc_count, counters.free_count, capacity, slack)
}

/// The count-based half of [`fragmentation_ratio`], without the region check.
pub fn outstanding_ratio(alloc_count: u16, free_count: u16, capacity: usize, slack: u16) -> f32 {
    if capacity == 0 || alloc_count as u32 <= free_count as u32 + slack as u32 {
        return 0.0;
    }
    let outstanding = alloc_count - free_count;
    let ratio = outstanding as f32 / capacity as f32;
    if ratio > 1.0 {
        1.0
    } else {
        ratio
    }
}

/// True when the gap between the dynamic-region top and the stack top is
/// below `margin`. A stack top already below the dynamic top counts as a gap of 0.
#[inline]
pub fn check_collision(current_stack_top: Address, dynamic_region_top: Address, margin: u16) -> bool {
    dynamic_region_top.bytes_to(current_stack_top) < margin
}

/// Most recent risk evaluation.
///
/// `collision_warning` always mirrors the latest check. `collision_latched`
/// stays set from the first warning until acknowledged or re-initialised, so
/// a reader polling less often than `update` runs still sees the spike.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RiskState {
    pub fragmentation_ratio: f32,
    pub collision_warning: bool,
    pub collision_latched: bool,
    /// Clear-to-warning transitions since init.
    pub collision_events: u16,
}

impl RiskState {
    pub const fn new() -> Self {
        Self {
            fragmentation_ratio: 0.0,
            collision_warning: false,
            collision_latched: false,
            collision_events: 0,
        }
    }

    /// Apply a fresh collision verdict. Returns true on a clear-to-warning edge.
    pub fn record_collision(&mut self, warning: bool) -> bool {
        let rising = warning && !self.collision_warning;
        if rising {
            self.collision_events = self.collision_events.wrapping_add(1);
        }
        if warning {
            self.collision_latched = true;
        }
        self.collision_warning = warning;
        rising
    }

    /// Clear the latch. The live flag is left to the next evaluation.
    pub fn acknowledge_collision(&mut self) {
        self.collision_latched = false;
    }
}
