//! Memory map access: static region boundaries, dynamic-region top and stack top.
//!
//! RAM layout assumed by the monitor (low to high addresses):
//!
//! ```text
//!  data_start            +------------------+
//!                        | .data            |
//!  data_end / bss_start  +------------------+
//!                        | .bss             |
//!  bss_end               +------------------+
//!  dynamic_region_start  | heap (grows up)  |
//!  dynamic_region_top    +------------------+
//!                        | free gap         |  <- sentinel-filled at init
//!  stack top             +------------------+
//!                        | stack (grows dn) |
//!  memory_ceiling        +------------------+
//! ```
//!
//! Addresses are plain integers everywhere outside this module. The only
//! pointer conversions in the crate are [`Address::from_ptr`] and
//! [`Address::as_ptr`], used by platform maps and the allocator shim.

use core::fmt;

/// Opaque address, sized to the platform's address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub usize);

impl Address {
    pub const NULL: Address = Address(0);

    #[inline]
    pub fn from_ptr(ptr: *const u8) -> Self {
        Address(ptr as usize)
    }

    #[inline]
    pub fn as_ptr(self) -> *const u8 {
        self.0 as *const u8
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn offset(self, bytes: usize) -> Self {
        Address(self.0.wrapping_add(bytes))
    }

    /// Bytes from `self` up to `end`, saturated into a `u16`.
    /// Returns 0 when `end` lies below `self`.
    #[inline]
    pub const fn bytes_to(self, end: Address) -> u16 {
        let distance = end.0.saturating_sub(self.0);
        if distance > u16::MAX as usize {
            u16::MAX
        } else {
            distance as u16
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Static map of the address space plus the live dynamic-region top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegionBounds {
    pub data_start: Address,
    pub data_end: Address,
    pub bss_start: Address,
    pub bss_end: Address,
    pub dynamic_region_start: Address,
    /// Highest address handed to the allocator so far. Never shrinks.
    pub dynamic_region_top: Address,
    /// One past the last usable RAM byte (the stack's starting point).
    pub memory_ceiling: Address,
}

impl MemoryRegionBounds {
    pub const fn data_size(&self) -> u16 {
        self.data_start.bytes_to(self.data_end)
    }

    pub const fn bss_size(&self) -> u16 {
        self.bss_start.bytes_to(self.bss_end)
    }

    /// Bytes the allocator has claimed from the system so far.
    pub const fn dynamic_region_size(&self) -> u16 {
        self.dynamic_region_start.bytes_to(self.dynamic_region_top)
    }

    pub const fn ram_total(&self) -> u16 {
        self.data_start.bytes_to(self.memory_ceiling)
    }

    /// True when the RAM span is wider than a `u16` count, so sizes and
    /// distances derived from these bounds clamp at `u16::MAX`.
    pub const fn counts_clamped(&self) -> bool {
        self.memory_ceiling.0.saturating_sub(self.data_start.0) > u16::MAX as usize
    }

    /// Check that the regions are ordered and `stack_top` sits between the
    /// dynamic-region top and the ceiling.
    pub fn validate(&self, stack_top: Address) -> Result<(), LayoutError> {
        if self.data_start > self.data_end {
            return Err(LayoutError::DataInverted);
        }
        if self.bss_start > self.bss_end {
            return Err(LayoutError::BssInverted);
        }
        if self.dynamic_region_start > self.dynamic_region_top {
            return Err(LayoutError::DynamicRegionInverted);
        }
        if self.dynamic_region_top > self.memory_ceiling {
            return Err(LayoutError::DynamicRegionAboveCeiling);
        }
        if stack_top < self.dynamic_region_top || stack_top > self.memory_ceiling {
            return Err(LayoutError::StackTopOutOfRange { stack_top });
        }
        Ok(())
    }
}

/// Inconsistent region bounds reported by a memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    DataInverted,
    BssInverted,
    DynamicRegionInverted,
    DynamicRegionAboveCeiling,
    /// Stack top below the dynamic-region top (already collided) or above the ceiling.
    StackTopOutOfRange { stack_top: Address },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::DataInverted => f.write_str(".data end lies below its start"),
            LayoutError::BssInverted => f.write_str(".bss end lies below its start"),
            LayoutError::DynamicRegionInverted => {
                f.write_str("dynamic region top lies below its start")
            }
            LayoutError::DynamicRegionAboveCeiling => {
                f.write_str("dynamic region top lies above the memory ceiling")
            }
            LayoutError::StackTopOutOfRange { stack_top } => {
                write!(f, "stack top {} outside the free gap", stack_top)
            }
        }
    }
}

/// The platform allocator's own accounting, when it exposes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocatorStats {
    pub used: usize,
    pub free: usize,
}

/// Read access to the platform's memory layout, plus raw byte access to the
/// free gap for the sentinel fill and scan.
pub trait MemoryMap {
    /// Current region bounds. Everything but `dynamic_region_top` is fixed at link time.
    fn region_bounds(&self) -> MemoryRegionBounds;

    /// Address of the top of the call stack right now.
    ///
    /// Implementations must read it with interrupts suspended and restore the
    /// previous interrupt-enable state afterwards, never force-enable.
    fn current_stack_top(&self) -> Address;

    fn read_byte(&self, addr: Address) -> u8;

    fn write_byte(&mut self, addr: Address, value: u8);

    /// Write `value` to every byte in `[start, end)`.
    fn fill(&mut self, start: Address, end: Address, value: u8) {
        let mut addr = start;
        while addr < end {
            self.write_byte(addr, value);
            addr = addr.offset(1);
        }
    }

    /// Used/free totals from the underlying allocator, if observable.
    fn allocator_stats(&self) -> Option<AllocatorStats> {
        None
    }
}
