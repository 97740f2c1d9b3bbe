//! The process-wide memory monitor.
//!
//! One [`MemoryMonitor`] exists per program, usually as a `static` so the
//! allocator shim can reach it:
//!
//! ```ignore
//! static MONITOR: MemoryMonitor = MemoryMonitor::new(Config::get());
//!
//! fn main() -> ! {
//!     let mut map = Esp32MemoryMap::new();
//!     MONITOR.init(&mut map).ok();
//!     loop {
//!         MONITOR.update(&map);
//!         MONITOR.publish(&map, &mut LogSink);
//!         // ...
//!     }
//! }
//! ```
//!
//! State lives behind `critical_section` mutexes so the allocation hooks may
//! run from interrupt context. Sentinel fill and scan run outside any
//! critical section; only the merge of a scan result takes the lock.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::{Config, MAX_TRACKED};
use crate::ledger::{AllocationLedger, AllocationRecord, FreeOutcome, LedgerCounters, TrackOutcome};
use crate::memory_map::{Address, LayoutError, MemoryMap};
use crate::report::{Report, ReportInputs, ReportSink};
use crate::risk::{self, RiskState};
use crate::stack::{self, StackTracker};

/// Counter values already reported in the log, so each update only warns about growth.
#[derive(Clone, Copy, Default)]
struct LoggedCounters {
    saturation: u16,
    anomaly: u16,
}

struct MonitorState {
    tracker: StackTracker,
    risk: RiskState,
    logged: LoggedCounters,
    armed: bool,
}

impl MonitorState {
    const fn new(sentinel: u8) -> Self {
        Self {
            tracker: StackTracker::new(sentinel),
            risk: RiskState::new(),
            logged: LoggedCounters {
                saturation: 0,
                anomaly: 0,
            },
            armed: false,
        }
    }
}

/// Ledger, stack tracker and risk state for the whole program.
pub struct MemoryMonitor<const N: usize = MAX_TRACKED> {
    config: Config,
    ledger: Mutex<RefCell<AllocationLedger<N>>>,
    state: Mutex<RefCell<MonitorState>>,
}

impl<const N: usize> MemoryMonitor<N> {
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            ledger: Mutex::new(RefCell::new(AllocationLedger::new())),
            state: Mutex::new(RefCell::new(MonitorState::new(config.sentinel))),
        }
    }

    #[inline]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reset the ledger and risk state, capture the stack top and arm the sentinel.
    ///
    /// Call once, early, before the gap between heap and stack holds data and
    /// before allocations that must be tracked. Calling again re-arms and
    /// forgets every outstanding record (their later frees count as anomalies).
    ///
    /// With inconsistent bounds the ledger and risk state are still reset but
    /// nothing is written to memory and stack peaks are not measured.
    pub fn init<M: MemoryMap + ?Sized>(&self, map: &mut M) -> Result<(), LayoutError> {
        let bounds = map.region_bounds();
        let stack_top = map.current_stack_top();

        let mut tracker = StackTracker::new(self.config.sentinel);
        let layout = bounds.validate(stack_top);
        if bounds.counts_clamped() {
            log::warn!(
                "mem: RAM span {}..{} exceeds 64 KiB, byte counts clamp at {}",
                bounds.data_start,
                bounds.memory_ceiling,
                u16::MAX
            );
        }
        match layout {
            Ok(()) => {
                tracker.arm(map, &bounds, stack_top);
                log::info!(
                    "mem: armed {} bytes [{}..{}), stack={}B",
                    bounds.dynamic_region_top.bytes_to(stack_top),
                    bounds.dynamic_region_top,
                    stack_top,
                    tracker.high_water_mark()
                );
            }
            Err(e) => {
                log::error!("mem: not arming sentinel: {}", e);
            }
        }

        critical_section::with(|cs| {
            self.ledger.borrow_ref_mut(cs).reset();
            let mut state = self.state.borrow_ref_mut(cs);
            *state = MonitorState::new(self.config.sentinel);
            state.tracker = tracker;
            state.armed = layout.is_ok();
        });
        layout
    }

    /// Rescan the sentinel and re-evaluate risk. Call periodically.
    pub fn update<M: MemoryMap + ?Sized>(&self, map: &M) -> RiskState {
        let bounds = map.region_bounds();
        let armed = critical_section::with(|cs| self.state.borrow_ref(cs).armed);
        let depth = if armed {
            Some(stack::scan_penetration(map, &bounds, self.config.sentinel))
        } else {
            None
        };
        let stack_top = map.current_stack_top();
        let collision = risk::check_collision(
            stack_top,
            bounds.dynamic_region_top,
            self.config.collision_margin,
        );

        let (evaluated, counters, rising, cleared, logged) = critical_section::with(|cs| {
            let counters = self.ledger.borrow_ref(cs).counters();
            let mut state = self.state.borrow_ref_mut(cs);
            if let Some(depth) = depth {
                state.tracker.observe(depth);
            }
            let was_warning = state.risk.collision_warning;
            let rising = state.risk.record_collision(collision);
            state.risk.fragmentation_ratio = risk::fragmentation_ratio(
                &counters,
                &bounds,
                N,
                self.config.fragmentation_slack,
            );
            let logged = state.logged;
            state.logged = LoggedCounters {
                saturation: counters.saturation_count,
                anomaly: counters.anomaly_count,
            };
            (state.risk, counters, rising, was_warning && !collision, logged)
        });

        if rising {
            log::warn!(
                "mem: COLLISION RISK - gap={}B (margin={}B) stack_top={} heap_top={}",
                bounds.dynamic_region_top.bytes_to(stack_top),
                self.config.collision_margin,
                stack_top,
                bounds.dynamic_region_top
            );
        } else if cleared {
            log::info!(
                "mem: collision risk cleared - gap={}B",
                bounds.dynamic_region_top.bytes_to(stack_top)
            );
        }
        if counters.saturation_count != logged.saturation {
            log::warn!(
                "mem: ledger full - {} allocations untracked (+{}), raise MEMMON_MAX_TRACKED above {}",
                counters.saturation_count,
                counters.saturation_count.wrapping_sub(logged.saturation),
                N
            );
        }
        if counters.anomaly_count != logged.anomaly {
            log::warn!(
                "mem: {} frees of untracked pointers (+{}), possible double free",
                counters.anomaly_count,
                counters.anomaly_count.wrapping_sub(logged.anomaly)
            );
        }
        evaluated
    }

    /// Assemble a consistent report from the latest state.
    ///
    /// Ledger totals and current stack depth are live. The collision flags
    /// come from the last `update` (or `check_collision`).
    pub fn snapshot<M: MemoryMap + ?Sized>(&self, map: &M) -> Report {
        let bounds = map.region_bounds();
        let stack_top = map.current_stack_top();
        let allocator = map.allocator_stats();

        let (counters, risk_state, high_water_mark) = critical_section::with(|cs| {
            let counters = self.ledger.borrow_ref(cs).counters();
            let state = self.state.borrow_ref(cs);
            (counters, state.risk, state.tracker.high_water_mark())
        });

        Report::assemble(ReportInputs {
            bounds,
            counters,
            risk: risk_state,
            current_stack_usage: StackTracker::current_usage(stack_top, bounds.memory_ceiling),
            high_water_mark,
            free_gap: bounds.dynamic_region_top.bytes_to(stack_top),
            fragmentation_ratio: risk::fragmentation_ratio(
                &counters,
                &bounds,
                N,
                self.config.fragmentation_slack,
            ),
            allocator,
        })
    }

    /// Snapshot and hand the report to `sink`. A failing sink loses this report only.
    pub fn publish<M, S>(&self, map: &M, sink: &mut S) -> Report
    where
        M: MemoryMap + ?Sized,
        S: ReportSink,
    {
        let report = self.snapshot(map);
        if sink.emit(&report).is_err() {
            log::debug!("mem: report sink rejected snapshot");
        }
        report
    }

    // ========================================================================
    // Allocation hooks (called from the allocator, possibly in interrupt context)
    // ========================================================================

    /// Record a successful allocation. Never allocates, blocks or logs.
    #[inline]
    pub fn record_allocation(&self, address: Address, size: u16) -> TrackOutcome {
        if address.is_null() {
            return TrackOutcome::Ignored;
        }
        critical_section::with(|cs| {
            self.ledger
                .borrow_ref_mut(cs)
                .record_allocation(address, size)
        })
    }

    /// Record a free request, before the block goes back to the allocator.
    #[inline]
    pub fn record_free(&self, address: Address) -> FreeOutcome {
        if address.is_null() {
            return FreeOutcome::Ignored;
        }
        critical_section::with(|cs| self.ledger.borrow_ref_mut(cs).record_free(address))
    }

    /// Put back a record released by `record_free` when the block stayed live.
    #[inline]
    pub fn revert_free(&self, address: Address, size: u16) -> TrackOutcome {
        if address.is_null() {
            return TrackOutcome::Ignored;
        }
        critical_section::with(|cs| {
            self.ledger
                .borrow_ref_mut(cs)
                .revert_free(address, size)
        })
    }

    // ========================================================================
    // Individual queries
    // ========================================================================

    pub fn counters(&self) -> LedgerCounters {
        critical_section::with(|cs| self.ledger.borrow_ref(cs).counters())
    }

    pub fn heap_used(&self) -> u16 {
        self.counters().active_bytes
    }

    pub fn active_records(&self) -> heapless::Vec<AllocationRecord, N> {
        critical_section::with(|cs| self.ledger.borrow_ref(cs).active_records())
    }

    pub fn high_water_mark(&self) -> u16 {
        critical_section::with(|cs| self.state.borrow_ref(cs).tracker.high_water_mark())
    }

    /// Stack top captured at the last `init`.
    pub fn initial_stack_top(&self) -> Address {
        critical_section::with(|cs| self.state.borrow_ref(cs).tracker.initial_stack_top())
    }

    pub fn risk(&self) -> RiskState {
        critical_section::with(|cs| self.state.borrow_ref(cs).risk)
    }

    pub fn stack_pointer<M: MemoryMap + ?Sized>(&self, map: &M) -> Address {
        map.current_stack_top()
    }

    pub fn current_stack_usage<M: MemoryMap + ?Sized>(&self, map: &M) -> u16 {
        let ceiling = map.region_bounds().memory_ceiling;
        StackTracker::current_usage(map.current_stack_top(), ceiling)
    }

    /// Bytes between the dynamic-region top and the current stack top; 0 once collided.
    pub fn free_gap<M: MemoryMap + ?Sized>(&self, map: &M) -> u16 {
        let bounds = map.region_bounds();
        bounds.dynamic_region_top.bytes_to(map.current_stack_top())
    }

    pub fn fragmentation_ratio<M: MemoryMap + ?Sized>(&self, map: &M) -> f32 {
        risk::fragmentation_ratio(
            &self.counters(),
            &map.region_bounds(),
            N,
            self.config.fragmentation_slack,
        )
    }

    /// Live collision check. Also updates the stored verdict and latch.
    pub fn check_collision<M: MemoryMap + ?Sized>(&self, map: &M) -> bool {
        let bounds = map.region_bounds();
        let warning = risk::check_collision(
            map.current_stack_top(),
            bounds.dynamic_region_top,
            self.config.collision_margin,
        );
        critical_section::with(|cs| {
            self.state.borrow_ref_mut(cs).risk.record_collision(warning);
        });
        warning
    }

    /// Clear the latched collision flag after the application has handled it.
    pub fn acknowledge_collision(&self) {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).risk.acknowledge_collision());
    }
}
