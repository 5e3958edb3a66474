//! # Host Profile Detection
//!
//! The capture host's CPU count and total memory, used to key imported
//! settings. Either value can be overridden from the command line.

use settrack_core::HostProfile;
use sysinfo::System;

/// Detect the local host profile, preferring explicit overrides.
///
/// Memory falls back to 0 when the platform does not report it; only the
/// CPU count takes part in comparisons.
pub fn detect_host_profile(cpu: Option<u32>, memory_bytes: Option<u64>) -> HostProfile {
    let cpu = cpu.unwrap_or_else(detect_cpu);
    let memory_bytes = memory_bytes.or_else(detect_memory).unwrap_or_else(|| {
        tracing::warn!("Could not read total memory, recording 0 bytes");
        0
    });
    HostProfile::new(cpu, memory_bytes)
}

fn detect_cpu() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Total memory in bytes. `None` when the platform reports nothing.
fn detect_memory() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    Some(system.total_memory()).filter(|&bytes| bytes > 0)
}
