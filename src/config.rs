//! Monitor configuration, embedded at compile time.
//!
//! Thresholds are adjustable constants. Changing them never alters the
//! algorithms, only where they trip. Set the `MEMMON_*` environment variables
//! listed in `build.rs` to override the defaults.

/// Default number of allocation slots in the ledger.
const DEFAULT_MAX_TRACKED: usize = 32;
/// Default fill byte for the unused stack region.
const DEFAULT_STACK_SENTINEL: u8 = 0xAA;
/// Default heap/stack safety margin in bytes.
const DEFAULT_COLLISION_MARGIN: u16 = 128;
/// Default slack between live allocations and frees before fragmentation is reported.
const DEFAULT_FRAGMENTATION_SLACK: u16 = 5;

/// Capacity of the allocation ledger (slots).
pub const MAX_TRACKED: usize = match option_env!("MEMMON_MAX_TRACKED") {
    Some(s) => {
        let value = parse_number(s, DEFAULT_MAX_TRACKED as u32);
        if value == 0 || value > u16::MAX as u32 {
            DEFAULT_MAX_TRACKED
        } else {
            value as usize
        }
    }
    None => DEFAULT_MAX_TRACKED,
};

/// Sentinel byte written into the unused stack region at init.
pub const STACK_SENTINEL: u8 = match option_env!("MEMMON_STACK_SENTINEL") {
    Some(s) => {
        let value = parse_number(s, DEFAULT_STACK_SENTINEL as u32);
        if value > u8::MAX as u32 {
            DEFAULT_STACK_SENTINEL
        } else {
            value as u8
        }
    }
    None => DEFAULT_STACK_SENTINEL,
};

/// Minimum gap between dynamic-region top and stack top before warning.
///
/// 128 bytes covers the worst-case nested interrupt frame cost on small
/// AVR-class parts. Raise it on cores with larger exception frames.
pub const COLLISION_MARGIN: u16 = match option_env!("MEMMON_COLLISION_MARGIN") {
    Some(s) => clamp_u16(parse_number(s, DEFAULT_COLLISION_MARGIN as u32)),
    None => DEFAULT_COLLISION_MARGIN,
};

/// How far live allocations may exceed frees before fragmentation is reported.
pub const FRAGMENTATION_SLACK: u16 = match option_env!("MEMMON_FRAGMENTATION_SLACK") {
    Some(s) => clamp_u16(parse_number(s, DEFAULT_FRAGMENTATION_SLACK as u32)),
    None => DEFAULT_FRAGMENTATION_SLACK,
};

/// Runtime view of the thresholds a monitor was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub sentinel: u8,
    pub collision_margin: u16,
    pub fragmentation_slack: u16,
}

impl Config {
    /// Get the compile-time configuration.
    pub const fn get() -> Self {
        Self {
            sentinel: STACK_SENTINEL,
            collision_margin: COLLISION_MARGIN,
            fragmentation_slack: FRAGMENTATION_SLACK,
        }
    }

    pub const fn with_sentinel(self, sentinel: u8) -> Self {
        Self { sentinel, ..self }
    }

    pub const fn with_collision_margin(self, collision_margin: u16) -> Self {
        Self {
            collision_margin,
            ..self
        }
    }

    pub const fn with_fragmentation_slack(self, fragmentation_slack: u16) -> Self {
        Self {
            fragmentation_slack,
            ..self
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::get()
    }
}

const fn clamp_u16(value: u32) -> u16 {
    if value > u16::MAX as u32 {
        u16::MAX
    } else {
        value as u16
    }
}

/// Parse a decimal or `0x`-prefixed hex number at compile time (const fn compatible).
///
/// Returns `default` for empty input, stray characters, or overflow.
pub const fn parse_number(s: &str, default: u32) -> u32 {
    let bytes = s.as_bytes();
    let (radix, mut i) = if bytes.len() > 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
        (16u32, 2)
    } else {
        (10u32, 0)
    };
    if i >= bytes.len() {
        return default;
    }

    let mut result: u32 = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let digit = if c >= b'0' && c <= b'9' {
            (c - b'0') as u32
        } else if radix == 16 && c >= b'a' && c <= b'f' {
            (c - b'a') as u32 + 10
        } else if radix == 16 && c >= b'A' && c <= b'F' {
            (c - b'A') as u32 + 10
        } else {
            return default;
        };
        result = match result.checked_mul(radix) {
            Some(v) => match v.checked_add(digit) {
                Some(v) => v,
                None => return default,
            },
            None => return default,
        };
        i += 1;
    }
    result
}
