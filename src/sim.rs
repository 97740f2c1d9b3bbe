//! Byte-array RAM model for running the monitor off-target.
//!
//! `SimulatedMemory<SIZE>` covers `[base, base + SIZE)`; the ceiling is the
//! end of the array. The stack top, the dynamic-region top and the bytes in
//! between are all set by the caller, so a test can play out calls, unwinds
//! and heap growth step by step.

use crate::memory_map::{Address, AllocatorStats, LayoutError, MemoryMap, MemoryRegionBounds};

pub struct SimulatedMemory<const SIZE: usize> {
    bytes: [u8; SIZE],
    base: Address,
    data: (Address, Address),
    bss: (Address, Address),
    dynamic_start: Address,
    dynamic_top: Address,
    stack_top: Address,
    allocator: Option<AllocatorStats>,
}

impl<const SIZE: usize> SimulatedMemory<SIZE> {
    /// Zeroed RAM at `base`, no static data, empty dynamic region at `base`,
    /// stack top at the ceiling.
    pub const fn new(base: Address) -> Self {
        Self {
            bytes: [0; SIZE],
            base,
            data: (base, base),
            bss: (base, base),
            dynamic_start: base,
            dynamic_top: base,
            stack_top: base.offset(SIZE),
            allocator: None,
        }
    }

    #[inline]
    pub const fn base(&self) -> Address {
        self.base
    }

    #[inline]
    pub const fn ceiling(&self) -> Address {
        self.base.offset(SIZE)
    }

    /// Address of byte `offset` from the base.
    #[inline]
    pub const fn at(&self, offset: usize) -> Address {
        self.base.offset(offset)
    }

    /// Lay out `.data`, `.bss` and the start of the dynamic region, back to back
    /// from the base. Resets the dynamic-region top to its start.
    pub fn with_static_regions(mut self, data_len: usize, bss_len: usize) -> Result<Self, LayoutError> {
        let data_end = self.base.offset(data_len);
        let bss_end = data_end.offset(bss_len);
        if bss_end > self.ceiling() {
            return Err(LayoutError::DynamicRegionAboveCeiling);
        }
        self.data = (self.base, data_end);
        self.bss = (data_end, bss_end);
        self.dynamic_start = bss_end;
        self.dynamic_top = bss_end;
        if self.stack_top < bss_end {
            self.stack_top = bss_end;
        }
        Ok(self)
    }

    /// Place the dynamic region at `start` with its top at `top`.
    pub fn set_dynamic_region(&mut self, start: Address, top: Address) -> Result<(), LayoutError> {
        if start > top {
            return Err(LayoutError::DynamicRegionInverted);
        }
        if top > self.ceiling() {
            return Err(LayoutError::DynamicRegionAboveCeiling);
        }
        self.dynamic_start = start;
        self.dynamic_top = top;
        Ok(())
    }

    /// Extend the dynamic region like an allocator asking for more memory.
    /// Lower values are ignored: the top never shrinks.
    pub fn grow_dynamic_top(&mut self, top: Address) {
        let top = top.min(self.ceiling());
        if top > self.dynamic_top {
            self.dynamic_top = top;
        }
    }

    /// Move the stack pointer (clamped to the array).
    pub fn set_stack_top(&mut self, top: Address) {
        self.stack_top = top.max(self.base).min(self.ceiling());
    }

    #[inline]
    pub fn stack_top(&self) -> Address {
        self.stack_top
    }

    /// Simulate a call: move the stack top down by `depth` bytes and write
    /// `fill` into the new frame, like locals and return addresses would.
    pub fn push_frame(&mut self, depth: usize, fill: u8) {
        let new_top = Address(self.stack_top.0.saturating_sub(depth)).max(self.base);
        self.write(new_top, self.stack_top, fill);
        self.stack_top = new_top;
    }

    /// Simulate returns: move the stack top back up. Frame bytes stay as written.
    pub fn unwind_to(&mut self, top: Address) {
        self.set_stack_top(top);
    }

    /// Write `value` into `[start, end)`, ignoring bytes outside the array.
    pub fn write(&mut self, start: Address, end: Address, value: u8) {
        let mut addr = start;
        while addr < end {
            if let Some(byte) = self.slot_mut(addr) {
                *byte = value;
            }
            addr = addr.offset(1);
        }
    }

    pub fn set_allocator_stats(&mut self, stats: Option<AllocatorStats>) {
        self.allocator = stats;
    }

    fn slot_mut(&mut self, addr: Address) -> Option<&mut u8> {
        let offset = addr.0.checked_sub(self.base.0)?;
        self.bytes.get_mut(offset)
    }
}

impl<const SIZE: usize> MemoryMap for SimulatedMemory<SIZE> {
    fn region_bounds(&self) -> MemoryRegionBounds {
        MemoryRegionBounds {
            data_start: self.data.0,
            data_end: self.data.1,
            bss_start: self.bss.0,
            bss_end: self.bss.1,
            dynamic_region_start: self.dynamic_start,
            dynamic_region_top: self.dynamic_top,
            memory_ceiling: self.ceiling(),
        }
    }

    fn current_stack_top(&self) -> Address {
        self.stack_top
    }

    /// Bytes outside the array read as 0.
    fn read_byte(&self, addr: Address) -> u8 {
        addr.0
            .checked_sub(self.base.0)
            .and_then(|offset| self.bytes.get(offset))
            .copied()
            .unwrap_or(0)
    }

    fn write_byte(&mut self, addr: Address, value: u8) {
        if let Some(byte) = self.slot_mut(addr) {
            *byte = value;
        }
    }

    fn allocator_stats(&self) -> Option<AllocatorStats> {
        self.allocator
    }
}
