use super::*;
use crate::object::CanvasObject;
use crate::pool::{PoolConfig, PoolKey};
use crate::stats::EstimateProbe;

const THRESHOLD: Duration = Duration::from_secs(60);

struct FixedProbe(u64);

impl MemoryProbe for FixedProbe {
    fn used_bytes(&self) -> Option<u64> {
        Some(self.0)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

// =============================================================================
// skip_reason
// =============================================================================

#[test]
fn disabled_gc_is_skipped() {
    let config = MemoryConfig { enable_garbage_collection: false, ..MemoryConfig::default() };
    assert_eq!(skip_reason(&config, &EstimateProbe), Some(SkipReason::Disabled));
}

#[test]
fn low_memory_reading_skips() {
    let config = MemoryConfig { low_memory_threshold_bytes: 1_000, ..MemoryConfig::default() };
    assert_eq!(
        skip_reason(&config, &FixedProbe(999)),
        Some(SkipReason::LowMemory { used_bytes: 999, threshold_bytes: 1_000 })
    );
}

#[test]
fn reading_at_threshold_proceeds() {
    let config = MemoryConfig { low_memory_threshold_bytes: 1_000, ..MemoryConfig::default() };
    assert_eq!(skip_reason(&config, &FixedProbe(1_000)), None);
}

#[test]
fn missing_reading_proceeds() {
    let config = MemoryConfig { low_memory_threshold_bytes: u64::MAX, ..MemoryConfig::default() };
    assert_eq!(skip_reason(&config, &EstimateProbe), None);
}

// =============================================================================
// sweep
// =============================================================================

#[test]
fn sweep_evicts_only_stale_objects() {
    let mut ledger = AccessLedger::new();
    let mut pools = PoolRegistry::new();
    let start = Instant::now();
    let stale = CanvasObject::new("rect");
    let fresh = CanvasObject::new("rect");
    ledger.track("c1", stale.id, start);
    ledger.track("c1", fresh.id, start + THRESHOLD);

    let evictions = sweep(&mut ledger, &mut pools, THRESHOLD, start + THRESHOLD + Duration::from_secs(1));

    assert_eq!(evictions, vec![Eviction { canvas_id: "c1".into(), object_id: stale.id }]);
    assert!(!ledger.is_tracked("c1", &stale.id));
    assert!(ledger.is_tracked("c1", &fresh.id));
}

#[test]
fn sweep_drops_evicted_ids_from_active_sets() {
    let mut ledger = AccessLedger::new();
    let mut pools = PoolRegistry::new();
    pools.initialize("c1", &PoolConfig::of_kind("rect", 1));
    let key = PoolKey::new("c1", "rect");
    let start = Instant::now();
    let obj = pools.acquire(&key).unwrap();
    ledger.track("c1", obj.id, start);

    let evictions = sweep(&mut ledger, &mut pools, THRESHOLD, start + THRESHOLD * 2);

    assert_eq!(evictions.len(), 1);
    assert!(!pools.is_active(&key, &obj.id));
    // Not returned to the free list: the caller still owns the object.
    assert!(!pools.is_parked(&key, &obj.id));
}

#[test]
fn sweep_covers_every_canvas() {
    let mut ledger = AccessLedger::new();
    let mut pools = PoolRegistry::new();
    let start = Instant::now();
    ledger.track("c1", CanvasObject::new("rect").id, start);
    ledger.track("c2", CanvasObject::new("line").id, start);

    let evictions = sweep(&mut ledger, &mut pools, THRESHOLD, start + THRESHOLD * 2);

    let mut canvases: Vec<_> = evictions.iter().map(|e| e.canvas_id.as_str()).collect();
    canvases.sort_unstable();
    assert_eq!(canvases, vec!["c1", "c2"]);
    assert_eq!(ledger.tracked_total(), 0);
}

#[test]
fn sweep_with_nothing_stale_is_empty() {
    let mut ledger = AccessLedger::new();
    let mut pools = PoolRegistry::new();
    let now = Instant::now();
    ledger.track("c1", CanvasObject::new("rect").id, now);

    assert!(sweep(&mut ledger, &mut pools, THRESHOLD, now).is_empty());
    assert_eq!(ledger.tracked_total(), 1);
}

// =============================================================================
// GcOutcome
// =============================================================================

#[test]
fn outcome_accessors() {
    let skipped = GcOutcome::Skipped(SkipReason::Disabled);
    assert!(skipped.is_skipped());
    assert_eq!(skipped.evicted_count(), 0);

    let swept = GcOutcome::Swept {
        evictions: vec![Eviction { canvas_id: "c1".into(), object_id: CanvasObject::new("rect").id }],
    };
    assert!(!swept.is_skipped());
    assert_eq!(swept.evicted_count(), 1);
}
