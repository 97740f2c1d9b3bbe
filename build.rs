//! Build script for compile-time configuration injection.
//!
//! Set environment variables before building to tune the monitor:
//!
//!   MEMMON_MAX_TRACKED=64 \
//!   MEMMON_STACK_SENTINEL=0xA5 \
//!   MEMMON_COLLISION_MARGIN=256 \
//!   MEMMON_FRAGMENTATION_SLACK=5 \
//!   cargo build --release
//!
//! Unset or malformed values fall back to the defaults in `src/config.rs`.

fn main() {
    // Re-run build script if these environment variables change
    println!("cargo::rerun-if-env-changed=MEMMON_MAX_TRACKED");
    println!("cargo::rerun-if-env-changed=MEMMON_STACK_SENTINEL");
    println!("cargo::rerun-if-env-changed=MEMMON_COLLISION_MARGIN");
    println!("cargo::rerun-if-env-changed=MEMMON_FRAGMENTATION_SLACK");
}
