//! Object pool registry and active-object tracker.
//!
//! DESIGN
//! ======
//! Pools are keyed by `(canvas_id, object_type)`. Each pool owns its free
//! objects by value in a LIFO stack and records the ids it has handed out in
//! an active set. An id is in exactly one of the two while checked out or
//! parked; acquire moves the object to the caller, release moves it back.
//!
//! TRADE-OFFS
//! ==========
//! The factory is retained with the pool but `acquire` never calls it: an
//! empty pool is a miss. Growing is an explicit `grow` call so allocation
//! bursts stay visible to the owner.

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::object::{CanvasObject, ObjectId};

// =============================================================================
// TYPES
// =============================================================================

/// Factory that materialises a fresh object for a pool.
pub type ObjectFactory = Arc<dyn Fn() -> CanvasObject + Send + Sync>;

/// Pool identity: one canvas, one object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    pub canvas_id: String,
    pub object_type: String,
}

impl PoolKey {
    #[must_use]
    pub fn new(canvas_id: &str, object_type: &str) -> Self {
        Self { canvas_id: canvas_id.to_owned(), object_type: object_type.to_owned() }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.canvas_id, self.object_type)
    }
}

/// Request to create a pool for one object type on a canvas.
#[derive(Clone)]
pub struct PoolConfig {
    /// Type tag the pool serves.
    pub object_type: String,
    /// Factory used to pre-populate (and explicitly grow) the pool.
    pub create_object: ObjectFactory,
    /// Number of objects allocated up front.
    pub initial_size: usize,
}

impl PoolConfig {
    pub fn new<F>(object_type: impl Into<String>, initial_size: usize, create_object: F) -> Self
    where
        F: Fn() -> CanvasObject + Send + Sync + 'static,
    {
        Self { object_type: object_type.into(), create_object: Arc::new(create_object), initial_size }
    }

    /// Pool of plain `CanvasObject::new(object_type)` instances.
    #[must_use]
    pub fn of_kind(object_type: &str, initial_size: usize) -> Self {
        let kind = object_type.to_owned();
        Self::new(object_type, initial_size, move || CanvasObject::new(kind.clone()))
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("object_type", &self.object_type)
            .field("initial_size", &self.initial_size)
            .finish_non_exhaustive()
    }
}

/// Counters for a single pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Objects parked in the free list.
    pub available: usize,
    /// Objects currently checked out.
    pub active: usize,
    /// Successful acquires since creation.
    pub acquired: u64,
    /// Successful releases since creation.
    pub released: u64,
    /// Acquires that found the pool empty.
    pub misses: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("pool not found: {0}")]
    UnknownPool(PoolKey),
    #[error("object {object_id} is not active in pool {key}")]
    NotActive { key: PoolKey, object_id: ObjectId },
}

// =============================================================================
// POOL
// =============================================================================

struct ObjectPool {
    free: Vec<CanvasObject>,
    active: HashSet<ObjectId>,
    factory: ObjectFactory,
    acquired: u64,
    released: u64,
    misses: u64,
}

impl ObjectPool {
    fn with_capacity(factory: ObjectFactory, initial_size: usize) -> Self {
        let free = (0..initial_size).map(|_| factory()).collect();
        Self { free, active: HashSet::new(), factory, acquired: 0, released: 0, misses: 0 }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.free.len(),
            active: self.active.len(),
            acquired: self.acquired,
            released: self.released,
            misses: self.misses,
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// All pools across all canvases.
#[derive(Default)]
pub(crate) struct PoolRegistry {
    pools: HashMap<PoolKey, ObjectPool>,
}

impl PoolRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Create the pool if absent. Returns `false` when it already existed.
    pub(crate) fn initialize(&mut self, canvas_id: &str, config: &PoolConfig) -> bool {
        let key = PoolKey::new(canvas_id, &config.object_type);
        if self.pools.contains_key(&key) {
            return false;
        }
        let pool = ObjectPool::with_capacity(Arc::clone(&config.create_object), config.initial_size);
        self.pools.insert(key, pool);
        true
    }

    pub(crate) fn contains(&self, key: &PoolKey) -> bool {
        self.pools.contains_key(key)
    }

    /// Pop the most recently parked object and mark it active.
    ///
    /// `None` for an unknown pool or an empty one (the latter counts a miss).
    pub(crate) fn acquire(&mut self, key: &PoolKey) -> Option<CanvasObject> {
        let pool = self.pools.get_mut(key)?;
        let Some(obj) = pool.free.pop() else {
            pool.misses += 1;
            return None;
        };
        pool.active.insert(obj.id);
        pool.acquired += 1;
        Some(obj)
    }

    /// Return an active object to its free list after resetting its transform.
    ///
    /// On error the object is dropped; a pool never adopts objects it did not
    /// hand out.
    pub(crate) fn release(&mut self, key: &PoolKey, mut obj: CanvasObject) -> Result<(), ReleaseError> {
        let pool = self
            .pools
            .get_mut(key)
            .ok_or_else(|| ReleaseError::UnknownPool(key.clone()))?;
        if !pool.active.remove(&obj.id) {
            return Err(ReleaseError::NotActive { key: key.clone(), object_id: obj.id });
        }
        obj.reset_transform();
        pool.free.push(obj);
        pool.released += 1;
        Ok(())
    }

    /// Allocate `count` more objects with the retained factory.
    pub(crate) fn grow(&mut self, key: &PoolKey, count: usize) -> Option<usize> {
        let pool = self.pools.get_mut(key)?;
        let factory = Arc::clone(&pool.factory);
        pool.free.extend((0..count).map(|_| factory()));
        Some(count)
    }

    /// Forget `object_id` in every active set belonging to `canvas_id`.
    pub(crate) fn forget_active(&mut self, canvas_id: &str, object_id: &ObjectId) -> bool {
        let mut removed = false;
        for (key, pool) in &mut self.pools {
            if key.canvas_id == canvas_id && pool.active.remove(object_id) {
                removed = true;
            }
        }
        removed
    }

    /// Drop every pool scoped to `canvas_id`. Returns how many were removed.
    pub(crate) fn remove_canvas(&mut self, canvas_id: &str) -> usize {
        let before = self.pools.len();
        self.pools.retain(|key, _| key.canvas_id != canvas_id);
        before - self.pools.len()
    }

    pub(crate) fn stats(&self, key: &PoolKey) -> Option<PoolStats> {
        self.pools.get(key).map(ObjectPool::stats)
    }

    /// `(pool count, parked, active)` for one canvas.
    pub(crate) fn canvas_totals(&self, canvas_id: &str) -> (usize, usize, usize) {
        self.pools
            .iter()
            .filter(|(key, _)| key.canvas_id == canvas_id)
            .fold((0, 0, 0), |(pools, free, active), (_, pool)| {
                (pools + 1, free + pool.free.len(), active + pool.active.len())
            })
    }

    /// `(parked, active)` across every pool.
    pub(crate) fn totals(&self) -> (usize, usize) {
        self.pools
            .values()
            .fold((0, 0), |(free, active), pool| (free + pool.free.len(), active + pool.active.len()))
    }

    /// Returns `true` if `object_id` is parked in the free list under `key`.
    #[cfg(test)]
    pub(crate) fn is_parked(&self, key: &PoolKey, object_id: &ObjectId) -> bool {
        self.pools
            .get(key)
            .is_some_and(|pool| pool.free.iter().any(|obj| obj.id == *object_id))
    }

    /// Returns `true` if `object_id` is checked out under `key`.
    #[cfg(test)]
    pub(crate) fn is_active(&self, key: &PoolKey, object_id: &ObjectId) -> bool {
        self.pools
            .get(key)
            .is_some_and(|pool| pool.active.contains(object_id))
    }
}
