//! Memory manager — the public facade over pools, the access ledger, the
//! collector, and stats.
//!
//! DESIGN
//! ======
//! `MemoryManager` is a cheap `Clone` handle built once by the canvas host
//! and passed to every component that creates or discards scene objects.
//! All state sits behind one `std::sync::Mutex`; every operation is a short
//! synchronous critical section and no lock is held across an `.await`.
//! Nothing outside this module can reach the maps directly.
//!
//! ERROR HANDLING
//! ==============
//! Lifecycle calls never fail from the caller's point of view. Unknown
//! pools are logged and ignored, mismatched releases are ignored, a probe
//! without a reading falls back to the per-object estimate. The only error
//! surfaced is `ConfigError` from `configure`.

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, MemoryConfig};
use crate::gc::{self, Eviction, GcOutcome};
use crate::ledger::AccessLedger;
use crate::object::{CanvasObject, ObjectId};
use crate::pool::{PoolConfig, PoolKey, PoolRegistry, PoolStats, ReleaseError};
use crate::stats::{self, CanvasStats, Counts, MemoryProbe, MemoryStats};
use crate::tasks::BackgroundTasks;

// =============================================================================
// STATE
// =============================================================================

struct Shared {
    state: Mutex<State>,
    tasks: Mutex<BackgroundTasks>,
    probe: Arc<dyn MemoryProbe>,
}

struct State {
    config: MemoryConfig,
    pools: PoolRegistry,
    ledger: AccessLedger,
    gc_runs: u64,
    stats: MemoryStats,
    eviction_tx: Option<mpsc::Sender<Eviction>>,
}

impl State {
    fn counts(&self) -> Counts {
        let (pooled, active) = self.pools.totals();
        Counts {
            pooled,
            active,
            tracked: self.ledger.tracked_total(),
            canvases: self.ledger.canvas_count(),
        }
    }

    fn refresh_stats(&mut self, probe: &dyn MemoryProbe) -> MemoryStats {
        self.stats = MemoryStats::compute(self.counts(), self.gc_runs, probe);
        self.stats.clone()
    }

    fn publish(&self, eviction: &Eviction) {
        let Some(tx) = &self.eviction_tx else {
            return;
        };
        match tx.try_send(eviction.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(canvas_id = %eviction.canvas_id, object_id = %eviction.object_id, "eviction sink full; dropping notice");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(canvas_id = %eviction.canvas_id, object_id = %eviction.object_id, "eviction sink closed; dropping notice");
            }
        }
    }
}

/// Weak handle held by background tasks.
#[derive(Clone)]
pub(crate) struct WeakManager(Weak<Shared>);

impl WeakManager {
    pub(crate) fn upgrade(&self) -> Option<MemoryManager> {
        self.0.upgrade().map(|shared| MemoryManager { shared })
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Shared handle to per-canvas object pools and tracking state.
#[derive(Clone)]
pub struct MemoryManager {
    shared: Arc<Shared>,
}

impl MemoryManager {
    /// Build a manager with the best available memory probe.
    ///
    /// Background timers are not started; call
    /// [`start_background_tasks`](Self::start_background_tasks) from within a
    /// tokio runtime.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_probe(config, stats::default_probe())
    }

    /// Like [`new`](Self::new), but rejects an invalid configuration up front.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`MemoryConfig::validate`].
    pub fn try_new(config: MemoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    #[must_use]
    pub fn with_probe(config: MemoryConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        let mut state = State {
            config,
            pools: PoolRegistry::new(),
            ledger: AccessLedger::new(),
            gc_runs: 0,
            stats: MemoryStats::default(),
            eviction_tx: None,
        };
        state.refresh_stats(probe.as_ref());
        debug!(probe = probe.name(), "memory manager created");
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                tasks: Mutex::new(BackgroundTasks::default()),
                probe,
            }),
        }
    }

    /// Deliver every future eviction to `tx` (non-blocking; overflow is logged and dropped).
    #[must_use]
    pub fn with_eviction_sink(self, tx: mpsc::Sender<Eviction>) -> Self {
        self.lock().eviction_tx = Some(tx);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, BackgroundTasks> {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> WeakManager {
        WeakManager(Arc::downgrade(&self.shared))
    }

    // --- Configuration ---

    #[must_use]
    pub fn config(&self) -> MemoryConfig {
        self.lock().config
    }

    /// Replace the configuration and restart the timers if they were running.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] and keeps the old configuration if `config`
    /// is invalid.
    pub fn configure(&self, config: MemoryConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.lock().config = config;
        info!(?config, "memory manager configured");

        let mut tasks = self.lock_tasks();
        if tasks.is_started() {
            tasks.start(self.downgrade(), &config);
        }
        Ok(())
    }

    // --- Background timers ---

    /// Start the GC and stats timers the configuration enables.
    /// Without a tokio runtime this logs a warning and does nothing.
    pub fn start_background_tasks(&self) {
        let config = self.config();
        self.lock_tasks().start(self.downgrade(), &config);
    }

    pub fn stop_background_tasks(&self) {
        self.lock_tasks().stop();
    }

    #[must_use]
    pub fn gc_task_running(&self) -> bool {
        self.lock_tasks().gc_running()
    }

    #[must_use]
    pub fn monitor_task_running(&self) -> bool {
        self.lock_tasks().monitor_running()
    }

    // --- Pools ---

    /// Create and pre-populate the pool for `config.object_type` on
    /// `canvas_id`. Existing pools are left untouched.
    pub fn initialize_object_pool(&self, canvas_id: &str, config: PoolConfig) {
        let mut state = self.lock();
        if !state.config.enable_object_pooling {
            debug!(canvas_id, object_type = %config.object_type, "object pooling disabled; pool not created");
            return;
        }
        if state.pools.initialize(canvas_id, &config) {
            debug!(canvas_id, object_type = %config.object_type, initial_size = config.initial_size, "object pool initialized");
        }
    }

    /// Check an object out of the pool. `None` if the pool is unknown or empty.
    #[must_use]
    pub fn acquire_object(&self, canvas_id: &str, object_type: &str) -> Option<CanvasObject> {
        self.acquire_object_at(canvas_id, object_type, Instant::now())
    }

    fn acquire_object_at(&self, canvas_id: &str, object_type: &str, now: Instant) -> Option<CanvasObject> {
        let mut state = self.lock();
        if !state.config.enable_object_pooling {
            return None;
        }
        let key = PoolKey::new(canvas_id, object_type);
        if !state.pools.contains(&key) {
            warn!(%key, "acquire from unknown object pool");
            return None;
        }
        let Some(obj) = state.pools.acquire(&key) else {
            debug!(%key, "object pool exhausted");
            return None;
        };
        state.ledger.track(canvas_id, obj.id, now);
        Some(obj)
    }

    /// Return a checked-out object to its pool with its transform reset.
    ///
    /// Objects the pool did not hand out are not adopted.
    pub fn release_object(&self, canvas_id: &str, object: CanvasObject, object_type: &str) {
        let key = PoolKey::new(canvas_id, object_type);
        let object_id = object.id;
        let mut state = self.lock();
        match state.pools.release(&key, object) {
            Ok(()) => {
                state.ledger.untrack(canvas_id, &object_id);
            }
            Err(ReleaseError::UnknownPool(_)) => {
                warn!(%key, %object_id, "release to unknown object pool");
            }
            Err(e @ ReleaseError::NotActive { .. }) => {
                state.ledger.untrack(canvas_id, &object_id);
                debug!(error = %e, "ignoring release of inactive object");
            }
        }
    }

    /// Add `count` objects to an existing pool using its factory.
    /// Returns how many were added.
    pub fn grow_object_pool(&self, canvas_id: &str, object_type: &str, count: usize) -> usize {
        let mut state = self.lock();
        if !state.config.enable_object_pooling {
            debug!(canvas_id, object_type, "object pooling disabled; pool not grown");
            return 0;
        }
        let key = PoolKey::new(canvas_id, object_type);
        let Some(added) = state.pools.grow(&key, count) else {
            warn!(%key, "grow of unknown object pool");
            return 0;
        };
        added
    }

    #[must_use]
    pub fn pool_stats(&self, canvas_id: &str, object_type: &str) -> Option<PoolStats> {
        self.lock().pools.stats(&PoolKey::new(canvas_id, object_type))
    }

    // --- Registration ---

    /// Track an object created outside the pools.
    pub fn register_object(&self, canvas_id: &str, object: &CanvasObject) {
        self.register_id(canvas_id, object.id);
    }

    pub fn register_id(&self, canvas_id: &str, object_id: ObjectId) {
        self.register_id_at(canvas_id, object_id, Instant::now());
    }

    fn register_id_at(&self, canvas_id: &str, object_id: ObjectId, now: Instant) {
        self.lock().ledger.track(canvas_id, object_id, now);
    }

    pub fn unregister_object(&self, canvas_id: &str, object: &CanvasObject) {
        self.unregister_id(canvas_id, &object.id);
    }

    pub fn unregister_id(&self, canvas_id: &str, object_id: &ObjectId) {
        if !self.lock().ledger.untrack(canvas_id, object_id) {
            debug!(canvas_id, %object_id, "unregister of untracked object");
        }
    }

    /// Record an interaction so the object is not collected as idle.
    /// Objects attached to no canvas are ignored.
    pub fn mark_object_accessed(&self, object: &CanvasObject) {
        self.mark_accessed_id(object.id);
    }

    pub fn mark_accessed_id(&self, object_id: ObjectId) {
        self.mark_accessed_id_at(object_id, Instant::now());
    }

    fn mark_accessed_id_at(&self, object_id: ObjectId, now: Instant) {
        if !self.lock().ledger.touch(object_id, now) {
            debug!(%object_id, "access mark for untracked object ignored");
        }
    }

    #[must_use]
    pub fn tracked_objects(&self, canvas_id: &str) -> Vec<ObjectId> {
        self.lock().ledger.tracked(canvas_id)
    }

    #[must_use]
    pub fn is_tracked(&self, canvas_id: &str, object_id: &ObjectId) -> bool {
        self.lock().ledger.is_tracked(canvas_id, object_id)
    }

    // --- Garbage collection ---

    /// Evict objects idle past the inactivity threshold.
    ///
    /// Unless `force` is set, the sweep is skipped when GC is disabled or the
    /// probe reports usage below the low-memory threshold.
    pub fn garbage_collect(&self, force: bool) -> GcOutcome {
        self.garbage_collect_at(force, Instant::now())
    }

    pub fn force_garbage_collection(&self) -> GcOutcome {
        self.garbage_collect(true)
    }

    fn garbage_collect_at(&self, force: bool, now: Instant) -> GcOutcome {
        let probe = self.shared.probe.as_ref();
        let mut guard = self.lock();
        let state = &mut *guard;

        if !force {
            if let Some(reason) = gc::skip_reason(&state.config, probe) {
                debug!(?reason, "gc sweep skipped");
                return GcOutcome::Skipped(reason);
            }
        }

        let threshold = state.config.inactivity_threshold;
        let evictions = gc::sweep(&mut state.ledger, &mut state.pools, threshold, now);
        if evictions.is_empty() {
            debug!(force, "gc sweep found no stale objects");
            return GcOutcome::Swept { evictions };
        }

        for eviction in &evictions {
            state.publish(eviction);
        }
        state.gc_runs += 1;
        let stats = state.refresh_stats(probe);
        info!(
            force,
            evicted = evictions.len(),
            gc_runs = state.gc_runs,
            objects = stats.object_count,
            "gc sweep evicted stale objects"
        );
        GcOutcome::Swept { evictions }
    }

    // --- Stats ---

    /// Last computed snapshot.
    #[must_use]
    pub fn memory_stats(&self) -> MemoryStats {
        self.lock().stats.clone()
    }

    /// Recompute and return the snapshot.
    pub fn update_memory_stats(&self) -> MemoryStats {
        let probe = self.shared.probe.as_ref();
        self.lock().refresh_stats(probe)
    }

    #[must_use]
    pub fn canvas_stats(&self, canvas_id: &str) -> CanvasStats {
        let state = self.lock();
        let (pools, pooled, active) = state.pools.canvas_totals(canvas_id);
        CanvasStats { tracked: state.ledger.tracked_on(canvas_id), pooled, active, pools }
    }

    // --- Teardown ---

    /// Forget everything scoped to `canvas_id`: tracked objects, their access
    /// times, and every pool. Must be called when a canvas is destroyed.
    pub fn cleanup_canvas(&self, canvas_id: &str) {
        let probe = self.shared.probe.as_ref();
        let mut state = self.lock();
        let untracked = state.ledger.remove_canvas(canvas_id);
        let pools = state.pools.remove_canvas(canvas_id);
        if untracked.is_none() && pools == 0 {
            debug!(canvas_id, "cleanup of unknown canvas");
        } else {
            let objects = untracked.as_ref().map_or(0, Vec::len);
            info!(canvas_id, objects, pools, "canvas cleaned up");
        }
        state.refresh_stats(probe);
    }
}
