//! Unit tests for the fragmentation heuristic and collision policy.

use memory_monitor::risk::{check_collision, fragmentation_ratio, outstanding_ratio};
use memory_monitor::{Address, LedgerCounters, MemoryRegionBounds, RiskState};

fn bounds(dynamic_start: usize, dynamic_top: usize) -> MemoryRegionBounds {
    MemoryRegionBounds {
        data_start: Address(0x100),
        data_end: Address(0x100),
        bss_start: Address(0x100),
        bss_end: Address(0x100),
        dynamic_region_start: Address(dynamic_start),
        dynamic_region_top: Address(dynamic_top),
        memory_ceiling: Address(0x900),
    }
}

fn counters(alloc_count: u16, free_count: u16, active_bytes: u16) -> LedgerCounters {
    LedgerCounters {
        active_bytes,
        active_count: alloc_count - free_count,
        alloc_count,
        free_count,
        ..Default::default()
    }
}

// ============================================================================
// Fragmentation heuristic
// ============================================================================

#[test]
fn test_fragmentation_many_outstanding() {
    // 10 - 2 = 8 > 2 + 5
    let ratio = fragmentation_ratio(&counters(10, 2, 100), &bounds(0x200, 0x400), 32, 5);
    assert_eq!(ratio, 0.25);
}

#[test]
fn test_fragmentation_within_slack_is_zero() {
    // 6 - 3 = 3 <= 3 + 5
    let ratio = fragmentation_ratio(&counters(6, 3, 100), &bounds(0x200, 0x400), 32, 5);
    assert_eq!(ratio, 0.0);
}

#[test]
fn test_fragmentation_boundary_is_exclusive() {
    // 9 > 1 + 5: reported
    assert_eq!(outstanding_ratio(9, 1, 32, 5), 0.25);
    // 7 > 1 + 5: reported
    assert_eq!(outstanding_ratio(7, 1, 32, 5), 6.0 / 32.0);
    // 6 == 1 + 5: not reported
    assert_eq!(outstanding_ratio(6, 1, 32, 5), 0.0);
    // 8 == 3 + 5: not reported
    assert_eq!(outstanding_ratio(8, 3, 32, 5), 0.0);
}

#[test]
fn test_fragmentation_threshold_compares_alloc_count() {
    // 10 > 3 + 5 even though 10 - 3 = 7 <= 3 + 5
    let ratio = fragmentation_ratio(&counters(10, 3, 100), &bounds(0x200, 0x400), 32, 5);
    assert_eq!(ratio, 7.0 / 32.0);

    // 9 - 3 = 6 outstanding, but 9 > 8 still reports
    assert_eq!(outstanding_ratio(9, 3, 32, 5), 6.0 / 32.0);
}

#[test]
fn test_fragmentation_clamped_to_one() {
    assert_eq!(outstanding_ratio(80, 0, 32, 5), 1.0);
}

#[test]
fn test_fragmentation_zero_without_allocations() {
    let ratio = fragmentation_ratio(&counters(0, 0, 0), &bounds(0x200, 0x400), 32, 5);
    assert_eq!(ratio, 0.0);
}

#[test]
fn test_fragmentation_zero_without_free_space() {
    // Dynamic region fully used by live blocks
    let ratio = fragmentation_ratio(&counters(10, 2, 0x200), &bounds(0x200, 0x400), 32, 5);
    assert_eq!(ratio, 0.0);

    // Empty dynamic region
    let ratio = fragmentation_ratio(&counters(10, 2, 0), &bounds(0x200, 0x200), 32, 5);
    assert_eq!(ratio, 0.0);
}

#[test]
fn test_fragmentation_slack_is_configurable() {
    assert_eq!(outstanding_ratio(10, 2, 32, 10), 0.0);
    assert_eq!(outstanding_ratio(10, 2, 32, 0), 0.25);
}

// ============================================================================
// Collision check
// ============================================================================

#[test]
fn test_collision_boundary() {
    let heap_top = Address(0x400);
    assert!(check_collision(heap_top.offset(127), heap_top, 128));
    assert!(!check_collision(heap_top.offset(128), heap_top, 128));
}

#[test]
fn test_collision_when_already_crossed() {
    assert!(check_collision(Address(0x300), Address(0x400), 128));
}

#[test]
fn test_no_collision_with_wide_gap() {
    assert!(!check_collision(Address(0x800), Address(0x400), 128));
}

#[test]
fn test_zero_margin_never_warns_at_contact() {
    assert!(!check_collision(Address(0x400), Address(0x400), 0));
}

// ============================================================================
// Risk state latching
// ============================================================================

#[test]
fn test_warning_tracks_latest_evaluation() {
    let mut risk = RiskState::new();
    assert!(risk.record_collision(true));
    assert!(risk.collision_warning);

    assert!(!risk.record_collision(false));
    assert!(!risk.collision_warning);
}

#[test]
fn test_latch_holds_until_acknowledged() {
    let mut risk = RiskState::new();
    risk.record_collision(true);
    risk.record_collision(false);
    risk.record_collision(false);
    assert!(risk.collision_latched);

    risk.acknowledge_collision();
    assert!(!risk.collision_latched);
    assert!(!risk.collision_warning);
}

#[test]
fn test_events_count_rising_edges_only() {
    let mut risk = RiskState::new();
    for warning in [true, true, false, true, false, false, true] {
        risk.record_collision(warning);
    }
    assert_eq!(risk.collision_events, 3);
}
