//! Tests for compile-time configuration parsing and defaults.
//!
//! Assumes the `MEMMON_*` variables are unset when the crate is built.

use memory_monitor::config::parse_number;
use memory_monitor::{Config, COLLISION_MARGIN, FRAGMENTATION_SLACK, MAX_TRACKED, STACK_SENTINEL};

#[test]
fn test_defaults() {
    assert_eq!(MAX_TRACKED, 32);
    assert_eq!(STACK_SENTINEL, 0xAA);
    assert_eq!(COLLISION_MARGIN, 128);
    assert_eq!(FRAGMENTATION_SLACK, 5);

    let config = Config::get();
    assert_eq!(config.sentinel, 0xAA);
    assert_eq!(config.collision_margin, 128);
    assert_eq!(config.fragmentation_slack, 5);
    assert_eq!(Config::default(), config);
}

#[test]
fn test_builders_override_single_field() {
    let config = Config::get().with_sentinel(0x55);
    assert_eq!(config.sentinel, 0x55);
    assert_eq!(config.collision_margin, COLLISION_MARGIN);

    let config = Config::get()
        .with_collision_margin(256)
        .with_fragmentation_slack(0);
    assert_eq!(config.collision_margin, 256);
    assert_eq!(config.fragmentation_slack, 0);
    assert_eq!(config.sentinel, STACK_SENTINEL);
}

#[test]
fn test_config_usable_in_const_context() {
    const CUSTOM: Config = Config::get().with_collision_margin(64);
    assert_eq!(CUSTOM.collision_margin, 64);
}

#[test]
fn test_parse_decimal() {
    assert_eq!(parse_number("0", 7), 0);
    assert_eq!(parse_number("128", 7), 128);
    assert_eq!(parse_number("65535", 7), 65535);
}

#[test]
fn test_parse_hex() {
    assert_eq!(parse_number("0xAA", 7), 0xAA);
    assert_eq!(parse_number("0x55", 7), 0x55);
    assert_eq!(parse_number("0Xff", 7), 0xFF);
    assert_eq!(parse_number("0x1000", 7), 0x1000);
}

#[test]
fn test_parse_invalid_returns_default() {
    assert_eq!(parse_number("", 7), 7);
    assert_eq!(parse_number("0x", 7), 7);
    assert_eq!(parse_number("12a", 7), 7);
    assert_eq!(parse_number("-5", 7), 7);
    assert_eq!(parse_number(" 5", 7), 7);
    assert_eq!(parse_number("0xZZ", 7), 7);
}

#[test]
fn test_parse_overflow_returns_default() {
    assert_eq!(parse_number("4294967295", 7), u32::MAX);
    assert_eq!(parse_number("4294967296", 7), 7);
    assert_eq!(parse_number("0x100000000", 7), 7);
}
