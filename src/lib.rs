//! Runtime memory monitor for bare-metal microcontrollers.
//!
//! Tracks what the application's memory is doing without an OS and without
//! allocating on its own:
//! - `ledger`: fixed table of outstanding heap allocations, fed by the allocator shim
//! - `stack`: stack high-water mark via sentinel fill and scan
//! - `risk`: fragmentation heuristic and heap/stack collision check
//! - `report`: one consistent snapshot, plus log and text sinks
//!
//! [`MemoryMonitor`] owns all of it. Platform specifics (linker symbols, stack
//! pointer, raw memory) sit behind the [`MemoryMap`] trait; [`sim`] provides a
//! host model for tests and `esp32` the target implementation.

#![no_std]

pub mod allocator;
pub mod config;
#[cfg(feature = "esp32")]
pub mod esp32;
pub mod ledger;
pub mod memory_map;
pub mod monitor;
pub mod report;
pub mod risk;
pub mod sim;
pub mod stack;

pub use allocator::TrackingAllocator;
pub use config::{Config, COLLISION_MARGIN, FRAGMENTATION_SLACK, MAX_TRACKED, STACK_SENTINEL};
pub use ledger::{AllocationLedger, AllocationRecord, FreeOutcome, LedgerCounters, TrackOutcome};
pub use memory_map::{Address, AllocatorStats, LayoutError, MemoryMap, MemoryRegionBounds};
pub use monitor::MemoryMonitor;
pub use report::{LogSink, Report, ReportSink, TextSink};
pub use risk::RiskState;
pub use stack::StackTracker;
