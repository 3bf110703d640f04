//! Memory probes and stats snapshots.
//!
//! DESIGN
//! ======
//! Memory usage comes from a pluggable [`MemoryProbe`]. `SystemProbe` reads
//! the resident size of the current process through `sysinfo`;
//! `EstimateProbe` never has a reading. Whenever the active probe returns
//! `None` the snapshot falls back to a fixed per-object estimate, and the
//! snapshot records which source it used.

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sysinfo::{Pid, System};
use tracing::debug;

/// Assumed footprint of one tracked object when no probe reading exists.
pub const ESTIMATED_BYTES_PER_OBJECT: u64 = 10 * 1024;

// =============================================================================
// PROBES
// =============================================================================

/// Source of a live memory reading.
pub trait MemoryProbe: Send + Sync {
    /// Bytes currently in use, or `None` when no reading is available.
    fn used_bytes(&self) -> Option<u64>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Resident memory of the current process.
pub struct SystemProbe {
    pid: Pid,
    system: Mutex<System>,
}

impl SystemProbe {
    /// `None` if the current process id cannot be determined on this platform.
    #[must_use]
    pub fn new() -> Option<Self> {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return None;
        };
        Some(Self { pid, system: Mutex::new(System::new()) })
    }
}

impl MemoryProbe for SystemProbe {
    fn used_bytes(&self) -> Option<u64> {
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !system.refresh_process(self.pid) {
            return None;
        }
        system.process(self.pid).map(sysinfo::Process::memory)
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Probe with no reading; stats always use the per-object estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateProbe;

impl MemoryProbe for EstimateProbe {
    fn used_bytes(&self) -> Option<u64> {
        None
    }

    fn name(&self) -> &'static str {
        "estimate"
    }
}

/// Pick `SystemProbe` if it produces a reading right now, else `EstimateProbe`.
#[must_use]
pub fn default_probe() -> Arc<dyn MemoryProbe> {
    if let Some(probe) = SystemProbe::new() {
        if probe.used_bytes().is_some() {
            return Arc::new(probe);
        }
    }
    debug!("process memory unavailable; using per-object estimate");
    Arc::new(EstimateProbe)
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Where `memory_usage_bytes` came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    Probe,
    #[default]
    Estimate,
}

/// Point-in-time memory accounting across every canvas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Pooled + active + tracked. Acquired objects count as both active and tracked.
    pub object_count: usize,
    pub memory_usage_bytes: u64,
    pub memory_source: MemorySource,
    /// Objects parked in pool free lists.
    pub pooled_objects: usize,
    /// Objects checked out of pools.
    pub active_objects: usize,
    /// Objects attached to canvases, pooled or not.
    pub tracked_objects: usize,
    pub canvas_count: usize,
    /// Sweeps that evicted at least one object.
    pub gc_runs: u64,
    /// Milliseconds since the Unix epoch when the snapshot was taken.
    pub timestamp_ms: i64,
}

/// Per-canvas view of pooled and tracked objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CanvasStats {
    pub tracked: usize,
    pub pooled: usize,
    pub active: usize,
    pub pools: usize,
}

impl CanvasStats {
    /// Objects attributable to the canvas, counted like `MemoryStats::object_count`.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.tracked + self.pooled + self.active
    }
}

/// Raw counts the manager gathers under its lock.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counts {
    pub(crate) pooled: usize,
    pub(crate) active: usize,
    pub(crate) tracked: usize,
    pub(crate) canvases: usize,
}

impl MemoryStats {
    pub(crate) fn compute(counts: Counts, gc_runs: u64, probe: &dyn MemoryProbe) -> Self {
        let object_count = counts.pooled + counts.active + counts.tracked;
        let (memory_usage_bytes, memory_source) = match probe.used_bytes() {
            Some(bytes) => (bytes, MemorySource::Probe),
            None => (estimate_bytes(object_count), MemorySource::Estimate),
        };
        Self {
            object_count,
            memory_usage_bytes,
            memory_source,
            pooled_objects: counts.pooled,
            active_objects: counts.active,
            tracked_objects: counts.tracked,
            canvas_count: counts.canvases,
            gc_runs,
            timestamp_ms: now_ms(),
        }
    }
}

fn estimate_bytes(object_count: usize) -> u64 {
    u64::try_from(object_count)
        .unwrap_or(u64::MAX)
        .saturating_mul(ESTIMATED_BYTES_PER_OBJECT)
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
