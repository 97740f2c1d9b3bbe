//! Diagnostics snapshot and the sinks that present it.
//!
//! A [`Report`] is a plain value assembled by the monitor in one critical
//! section. Sinks only read it. Delivery is best-effort: a sink that fails
//! loses that report and nothing else.
//!
//! `fragmentation_ratio` is a heuristic (see [`crate::risk::fragmentation_ratio`]),
//! not a measurement of the allocator's free list. Treat it as a trend signal.

use core::convert::Infallible;
use core::fmt::Write as FmtWrite;

use embedded_io::Write;
use heapless::String as HString;

use crate::ledger::LedgerCounters;
use crate::memory_map::{AllocatorStats, MemoryRegionBounds};
use crate::risk::RiskState;

/// One consistent view of memory usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub ram_total: u16,
    pub static_data: u16,
    pub static_bss: u16,
    pub heap_used: u16,
    pub heap_total_allocated: u16,
    pub heap_total_freed: u16,
    pub alloc_count: u16,
    pub free_count: u16,
    pub active_allocations: u16,
    pub current_stack_usage: u16,
    pub high_water_mark: u16,
    /// Bytes between the dynamic-region top and the current stack top.
    pub free_gap: u16,
    pub fragmentation_ratio: f32,
    pub collision_warning: bool,
    pub collision_latched: bool,
    pub collision_events: u16,
    pub saturation_count: u16,
    pub anomaly_count: u16,
    pub allocator: Option<AllocatorStats>,
}

/// Inputs to [`Report::assemble`], gathered by the monitor.
pub struct ReportInputs {
    pub bounds: MemoryRegionBounds,
    pub counters: LedgerCounters,
    pub risk: RiskState,
    pub current_stack_usage: u16,
    pub high_water_mark: u16,
    pub free_gap: u16,
    pub fragmentation_ratio: f32,
    pub allocator: Option<AllocatorStats>,
}

impl Report {
    /// Pure struct assembly, no further computation.
    pub fn assemble(inputs: ReportInputs) -> Self {
        let ReportInputs {
            bounds,
            counters,
            risk,
            current_stack_usage,
            high_water_mark,
            free_gap,
            fragmentation_ratio,
            allocator,
        } = inputs;

        Self {
            ram_total: bounds.ram_total(),
            static_data: bounds.data_size(),
            static_bss: bounds.bss_size(),
            heap_used: counters.active_bytes,
            heap_total_allocated: counters.cumulative_allocated,
            heap_total_freed: counters.cumulative_freed,
            alloc_count: counters.alloc_count,
            free_count: counters.free_count,
            active_allocations: counters.active_count,
            current_stack_usage,
            high_water_mark,
            free_gap,
            fragmentation_ratio,
            collision_warning: risk.collision_warning,
            collision_latched: risk.collision_latched,
            collision_events: risk.collision_events,
            saturation_count: counters.saturation_count,
            anomaly_count: counters.anomaly_count,
            allocator,
        }
    }

    /// Fragmentation as a percentage, for display.
    pub fn fragmentation_percent(&self) -> f32 {
        self.fragmentation_ratio * 100.0
    }

    /// True when the ledger dropped or could not match records, so heap totals
    /// under-count reality.
    pub fn tracking_degraded(&self) -> bool {
        self.saturation_count != 0 || self.anomaly_count != 0
    }
}

/// Consumer of reports (UART, log, radio...). Append-only and best-effort.
pub trait ReportSink {
    type Error;

    fn emit(&mut self, report: &Report) -> Result<(), Self::Error>;
}

/// Emits each report as a single `log::info!` line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    type Error = Infallible;

    fn emit(&mut self, report: &Report) -> Result<(), Infallible> {
        log::info!(
            "mem: heap={}B ({} allocs, {} frees) stack={}B peak={}B gap={}B frag={:.1}% collision={}",
            report.heap_used,
            report.alloc_count,
            report.free_count,
            report.current_stack_usage,
            report.high_water_mark,
            report.free_gap,
            report.fragmentation_percent(),
            if report.collision_warning { "WARNING" } else { "ok" },
        );
        if report.tracking_degraded() {
            log::warn!(
                "mem: tracking degraded - saturated={} untracked_frees={}",
                report.saturation_count,
                report.anomaly_count
            );
        }
        Ok(())
    }
}

/// Renders the multi-line diagnostics block onto any byte writer.
///
/// ```text
/// [MEM DIAGNOSTICS]
/// SRAM Total:    2048 bytes
/// Static (.data): 24 bytes
/// Static (.bss):  180 bytes
/// Heap Used:     160 bytes (8 allocs, 4 frees)
/// Stack Current: 42 bytes
/// Stack Peak:    310 bytes
/// Free RAM:      1350 bytes
/// Fragmentation: 0.0%
/// Collision:     OK
/// ```
pub struct TextSink<W> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, args: core::fmt::Arguments<'_>) -> Result<(), W::Error> {
        let mut buf: HString<64> = HString::new();
        // A line that overflows the buffer is truncated, not dropped.
        let _ = buf.write_fmt(args);
        self.writer.write_all(buf.as_bytes())?;
        self.writer.write_all(b"\r\n")
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    type Error = W::Error;

    fn emit(&mut self, r: &Report) -> Result<(), W::Error> {
        self.writer.write_all(b"\r\n")?;
        self.line(format_args!("[MEM DIAGNOSTICS]"))?;
        self.line(format_args!("SRAM Total:    {} bytes", r.ram_total))?;
        self.line(format_args!("Static (.data): {} bytes", r.static_data))?;
        self.line(format_args!("Static (.bss):  {} bytes", r.static_bss))?;
        self.line(format_args!(
            "Heap Used:     {} bytes ({} allocs, {} frees)",
            r.heap_used, r.alloc_count, r.free_count
        ))?;
        self.line(format_args!("Stack Current: {} bytes", r.current_stack_usage))?;
        self.line(format_args!("Stack Peak:    {} bytes", r.high_water_mark))?;
        self.line(format_args!("Free RAM:      {} bytes", r.free_gap))?;
        self.line(format_args!("Fragmentation: {:.1}%", r.fragmentation_percent()))?;
        if r.collision_warning {
            self.line(format_args!("Collision:     *** WARNING ***"))?;
        } else if r.collision_latched {
            self.line(format_args!("Collision:     OK (latched, {} events)", r.collision_events))?;
        } else {
            self.line(format_args!("Collision:     OK"))?;
        }
        if r.tracking_degraded() {
            self.line(format_args!(
                "Tracking:      {} dropped, {} untracked frees",
                r.saturation_count, r.anomaly_count
            ))?;
        }
        if let Some(stats) = r.allocator {
            self.line(format_args!(
                "Allocator:     {} used, {} free",
                stats.used, stats.free
            ))?;
        }
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()
    }
}
