//! Inactivity collector.
//!
//! DESIGN
//! ======
//! A sweep goes Idle -> Scanning -> (Reclaiming | Idle). Scanning walks every
//! known canvas and collects ids whose last access is older than the
//! inactivity threshold. Reclaiming drops each of them from the canvas set,
//! the access ledger, and any active set of that canvas.
//!
//! TRADE-OFFS
//! ==========
//! Evicted objects are not returned to a pool: the caller holds the object,
//! and only the caller can detach it from the rendering surface. Every
//! eviction is reported instead, so the owner can dispose of the object.

#[cfg(test)]
#[path = "gc_test.rs"]
mod gc_test;

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::MemoryConfig;
use crate::ledger::AccessLedger;
use crate::object::ObjectId;
use crate::pool::PoolRegistry;
use crate::stats::MemoryProbe;

/// One object dropped from tracking by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Eviction {
    pub canvas_id: String,
    pub object_id: ObjectId,
}

/// Why a non-forced sweep did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Garbage collection is disabled in the configuration.
    Disabled,
    /// The probe reported usage below the low-memory threshold.
    LowMemory { used_bytes: u64, threshold_bytes: u64 },
}

/// Result of a `garbage_collect` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GcOutcome {
    Skipped(SkipReason),
    Swept { evictions: Vec<Eviction> },
}

impl GcOutcome {
    /// Evicted objects; empty for skipped or fruitless sweeps.
    #[must_use]
    pub fn evictions(&self) -> &[Eviction] {
        match self {
            Self::Skipped(_) => &[],
            Self::Swept { evictions } => evictions,
        }
    }

    #[must_use]
    pub fn evicted_count(&self) -> usize {
        self.evictions().len()
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Decide whether a non-forced sweep should be skipped.
///
/// A probe without a reading never causes a skip.
pub(crate) fn skip_reason(config: &MemoryConfig, probe: &dyn MemoryProbe) -> Option<SkipReason> {
    if !config.enable_garbage_collection {
        return Some(SkipReason::Disabled);
    }
    let used_bytes = probe.used_bytes()?;
    if used_bytes < config.low_memory_threshold_bytes {
        return Some(SkipReason::LowMemory { used_bytes, threshold_bytes: config.low_memory_threshold_bytes });
    }
    None
}

/// Scan every canvas and evict objects idle for longer than `threshold`.
pub(crate) fn sweep(
    ledger: &mut AccessLedger,
    pools: &mut PoolRegistry,
    threshold: Duration,
    now: Instant,
) -> Vec<Eviction> {
    let mut evictions = Vec::new();

    // PHASE: SCAN
    for canvas_id in ledger.canvas_ids() {
        for object_id in ledger.stale_on(&canvas_id, threshold, now) {
            evictions.push(Eviction { canvas_id: canvas_id.clone(), object_id });
        }
    }

    // PHASE: RECLAIM
    for eviction in &evictions {
        ledger.untrack(&eviction.canvas_id, &eviction.object_id);
        pools.forget_active(&eviction.canvas_id, &eviction.object_id);
    }

    evictions
}
