//! Canvas membership and access-time ledger.
//!
//! DESIGN
//! ======
//! Two maps: canvas id -> set of attached object ids, and object id -> last
//! access `Instant` plus the number of canvas sets holding it. An access
//! entry exists exactly while the object is attached to at least one canvas;
//! it is created by the first `track` and dropped when the last membership
//! goes. `touch` only refreshes existing entries, so ids that were never
//! tracked, or were evicted or cleaned up, never leave a timestamp behind.
//! Canvas sets stay in place (possibly empty) until the canvas is cleaned
//! up, so a canvas that has emptied out is still known to the collector and
//! to stats.
//!
//! Every time-sensitive method takes `now` explicitly; the manager passes
//! `Instant::now()` and tests pass simulated instants.

#[cfg(test)]
#[path = "ledger_test.rs"]
mod ledger_test;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::object::ObjectId;

#[derive(Default)]
pub(crate) struct AccessLedger {
    canvases: HashMap<String, HashSet<ObjectId>>,
    access: HashMap<ObjectId, Access>,
}

struct Access {
    at: Instant,
    memberships: usize,
}

impl AccessLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Attach `object_id` to `canvas_id` and stamp its access time.
    pub(crate) fn track(&mut self, canvas_id: &str, object_id: ObjectId, now: Instant) {
        let added = self
            .canvases
            .entry(canvas_id.to_owned())
            .or_default()
            .insert(object_id);
        let entry = self
            .access
            .entry(object_id)
            .or_insert(Access { at: now, memberships: 0 });
        entry.at = now;
        if added {
            entry.memberships += 1;
        }
    }

    /// Detach `object_id` from `canvas_id`. The access time goes with the
    /// last membership. Returns `true` if it was attached.
    pub(crate) fn untrack(&mut self, canvas_id: &str, object_id: &ObjectId) -> bool {
        let removed = self
            .canvases
            .get_mut(canvas_id)
            .is_some_and(|ids| ids.remove(object_id));
        if removed {
            self.release_membership(object_id);
        }
        removed
    }

    /// Refresh the access time of an attached object.
    /// Returns `false` (and records nothing) for ids on no canvas.
    pub(crate) fn touch(&mut self, object_id: ObjectId, now: Instant) -> bool {
        let Some(entry) = self.access.get_mut(&object_id) else {
            return false;
        };
        entry.at = now;
        true
    }

    #[cfg(test)]
    pub(crate) fn last_access(&self, object_id: &ObjectId) -> Option<Instant> {
        self.access.get(object_id).map(|entry| entry.at)
    }

    #[cfg(test)]
    pub(crate) fn access_entries(&self) -> usize {
        self.access.len()
    }

    fn release_membership(&mut self, object_id: &ObjectId) {
        let Some(entry) = self.access.get_mut(object_id) else {
            return;
        };
        entry.memberships = entry.memberships.saturating_sub(1);
        if entry.memberships == 0 {
            self.access.remove(object_id);
        }
    }

    /// Objects on `canvas_id` idle for strictly longer than `threshold`.
    pub(crate) fn stale_on(&self, canvas_id: &str, threshold: Duration, now: Instant) -> Vec<ObjectId> {
        let Some(ids) = self.canvases.get(canvas_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter(|id| {
                self.access
                    .get(id)
                    .is_some_and(|entry| now.saturating_duration_since(entry.at) > threshold)
            })
            .copied()
            .collect()
    }

    /// Drop the canvas set and the access times of everything only it held.
    /// Returns the ids that were attached, or `None` for an unknown canvas.
    pub(crate) fn remove_canvas(&mut self, canvas_id: &str) -> Option<Vec<ObjectId>> {
        let ids = self.canvases.remove(canvas_id)?;
        for id in &ids {
            self.release_membership(id);
        }
        Some(ids.into_iter().collect())
    }

    pub(crate) fn is_tracked(&self, canvas_id: &str, object_id: &ObjectId) -> bool {
        self.canvases
            .get(canvas_id)
            .is_some_and(|ids| ids.contains(object_id))
    }

    pub(crate) fn tracked(&self, canvas_id: &str) -> Vec<ObjectId> {
        self.canvases
            .get(canvas_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn tracked_on(&self, canvas_id: &str) -> usize {
        self.canvases.get(canvas_id).map_or(0, HashSet::len)
    }

    /// Sum of attached objects across canvases.
    pub(crate) fn tracked_total(&self) -> usize {
        self.canvases.values().map(HashSet::len).sum()
    }

    pub(crate) fn canvas_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.canvases.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn canvas_count(&self) -> usize {
        self.canvases.len()
    }
}
