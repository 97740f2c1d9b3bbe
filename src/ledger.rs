//! Fixed-capacity ledger of outstanding heap allocations.
//!
//! The ledger is a plain array of `N` slots. Allocation takes the first
//! inactive slot, free clears the first active slot with a matching address,
//! both by ascending slot index. Every query is backed by a running counter,
//! so reads never rescan the table.
//!
//! The ledger is driven from inside the global allocator: it never allocates,
//! never blocks and never logs. Losses surface as counters instead:
//! - a full table drops the record and bumps `saturation_count`
//! - a free of an address that is not active bumps `anomaly_count`
//!
//! Running counters are `u16` and use wrapping arithmetic, so
//! `active_bytes == cumulative_allocated - cumulative_freed` holds modulo 2^16.

use heapless::Vec;

use crate::config::MAX_TRACKED;
use crate::memory_map::Address;

/// One tracked allocation. Inactive slots are free for reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    pub address: Address,
    pub size: u16,
    pub active: bool,
}

impl AllocationRecord {
    const EMPTY: AllocationRecord = AllocationRecord {
        address: Address::NULL,
        size: 0,
        active: false,
    };
}

/// Result of recording an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Stored in the given slot.
    Tracked { slot: usize },
    /// Null address (failed allocation), nothing recorded.
    Ignored,
    /// No free slot; the allocation is untracked.
    Saturated,
}

/// Result of recording a free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOutcome {
    /// Matching record released; carries its size.
    Released { slot: usize, size: u16 },
    /// Null address, nothing to do.
    Ignored,
    /// No active record for this address (double free or pre-tracking pointer).
    Untracked,
}

/// Copy of the ledger's running counters, taken in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerCounters {
    pub active_bytes: u16,
    pub active_count: u16,
    pub alloc_count: u16,
    pub free_count: u16,
    pub cumulative_allocated: u16,
    pub cumulative_freed: u16,
    pub saturation_count: u16,
    pub anomaly_count: u16,
}

impl LedgerCounters {
    /// Allocations tracked but not yet freed, from the event counts.
    pub const fn outstanding(&self) -> u16 {
        self.alloc_count.wrapping_sub(self.free_count)
    }
}

/// Allocation table with `N` slots.
pub struct AllocationLedger<const N: usize = MAX_TRACKED> {
    slots: [AllocationRecord; N],
    counters: LedgerCounters,
}

impl<const N: usize> AllocationLedger<N> {
    pub const CAPACITY: usize = N;

    pub const fn new() -> Self {
        Self {
            slots: [AllocationRecord::EMPTY; N],
            counters: LedgerCounters {
                active_bytes: 0,
                active_count: 0,
                alloc_count: 0,
                free_count: 0,
                cumulative_allocated: 0,
                cumulative_freed: 0,
                saturation_count: 0,
                anomaly_count: 0,
            },
        }
    }

    /// Forget every record and zero all counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record a successful allocation. Call once, after the real allocator returned.
    pub fn record_allocation(&mut self, address: Address, size: u16) -> TrackOutcome {
        if address.is_null() {
            return TrackOutcome::Ignored;
        }

        let Some(slot) = self.slots.iter().position(|r| !r.active) else {
            self.counters.saturation_count = self.counters.saturation_count.wrapping_add(1);
            return TrackOutcome::Saturated;
        };

        self.slots[slot] = AllocationRecord {
            address,
            size,
            active: true,
        };

        let c = &mut self.counters;
        c.active_bytes = c.active_bytes.wrapping_add(size);
        c.active_count = c.active_count.wrapping_add(1);
        c.alloc_count = c.alloc_count.wrapping_add(1);
        c.cumulative_allocated = c.cumulative_allocated.wrapping_add(size);
        TrackOutcome::Tracked { slot }
    }

    /// Record a free request. Call once, before handing the block back.
    pub fn record_free(&mut self, address: Address) -> FreeOutcome {
        if address.is_null() {
            return FreeOutcome::Ignored;
        }

        let Some(slot) = self
            .slots
            .iter()
            .position(|r| r.active && r.address == address)
        else {
            self.counters.anomaly_count = self.counters.anomaly_count.wrapping_add(1);
            return FreeOutcome::Untracked;
        };

        let size = self.slots[slot].size;
        self.slots[slot].active = false;

        let c = &mut self.counters;
        c.active_bytes = c.active_bytes.wrapping_sub(size);
        c.active_count = c.active_count.wrapping_sub(1);
        c.free_count = c.free_count.wrapping_add(1);
        c.cumulative_freed = c.cumulative_freed.wrapping_add(size);
        FreeOutcome::Released { slot, size }
    }

    /// Undo a `Released` free whose block turned out to stay live (failed realloc).
    ///
    /// The record goes back into the first inactive slot and the free-side
    /// counters are rolled back; `alloc_count` is untouched. With no slot left
    /// the block stays counted as freed and `saturation_count` is bumped.
    pub fn revert_free(&mut self, address: Address, size: u16) -> TrackOutcome {
        if address.is_null() {
            return TrackOutcome::Ignored;
        }

        let Some(slot) = self.slots.iter().position(|r| !r.active) else {
            self.counters.saturation_count = self.counters.saturation_count.wrapping_add(1);
            return TrackOutcome::Saturated;
        };

        self.slots[slot] = AllocationRecord {
            address,
            size,
            active: true,
        };

        let c = &mut self.counters;
        c.active_bytes = c.active_bytes.wrapping_add(size);
        c.active_count = c.active_count.wrapping_add(1);
        c.free_count = c.free_count.wrapping_sub(1);
        c.cumulative_freed = c.cumulative_freed.wrapping_sub(size);
        TrackOutcome::Tracked { slot }
    }

    #[inline]
    pub fn active_bytes(&self) -> u16 {
        self.counters.active_bytes
    }

    #[inline]
    pub fn active_count(&self) -> u16 {
        self.counters.active_count
    }

    #[inline]
    pub fn alloc_count(&self) -> u16 {
        self.counters.alloc_count
    }

    #[inline]
    pub fn free_count(&self) -> u16 {
        self.counters.free_count
    }

    #[inline]
    pub fn cumulative_allocated(&self) -> u16 {
        self.counters.cumulative_allocated
    }

    #[inline]
    pub fn cumulative_freed(&self) -> u16 {
        self.counters.cumulative_freed
    }

    #[inline]
    pub fn saturation_count(&self) -> u16 {
        self.counters.saturation_count
    }

    #[inline]
    pub fn anomaly_count(&self) -> u16 {
        self.counters.anomaly_count
    }

    /// True once any allocation has been dropped for lack of a slot.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.counters.saturation_count != 0
    }

    #[inline]
    pub fn counters(&self) -> LedgerCounters {
        self.counters
    }

    /// Raw slot view, active and inactive, in slot order.
    pub fn slots(&self) -> &[AllocationRecord] {
        &self.slots
    }

    /// Copy of the active records in slot order.
    pub fn active_records(&self) -> Vec<AllocationRecord, N> {
        let mut out = Vec::new();
        for record in self.slots.iter().filter(|r| r.active) {
            // Cannot overflow: at most N slots are active.
            let _ = out.push(*record);
        }
        out
    }
}

impl<const N: usize> Default for AllocationLedger<N> {
    fn default() -> Self {
        Self::new()
    }
}
