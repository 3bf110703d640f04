//! Background timers: periodic GC sweep and stats refresh.
//!
//! DESIGN
//! ======
//! Each timer is a spawned tokio task ticking on `tokio::time::interval` with
//! missed ticks skipped. A tick upgrades a weak handle to the manager, runs
//! one synchronous call, and releases it; the task ends on its own once the
//! manager is gone. Dropping `BackgroundTasks` aborts whatever is running, so
//! a task is stopped between ticks, never halfway through a sweep.

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tasks_test;

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::manager::{MemoryManager, WeakManager};

/// Handles of the running timers.
#[derive(Default)]
pub(crate) struct BackgroundTasks {
    gc: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    started: bool,
}

impl BackgroundTasks {
    /// Spawn the timers `config` enables. Any running timers are stopped first.
    /// A timer with a zero period is refused with a warning.
    pub(crate) fn start(&mut self, weak: WeakManager, config: &MemoryConfig) {
        self.stop();
        let Ok(handle) = Handle::try_current() else {
            warn!("no tokio runtime; background memory tasks not started");
            return;
        };

        if config.enable_garbage_collection {
            if config.gc_interval.is_zero() {
                warn!("gc interval is zero; gc timer not started");
            } else {
                self.gc = Some(spawn_periodic(&handle, weak.clone(), config.gc_interval, |m| {
                    m.garbage_collect(false);
                }));
            }
        }
        if config.enable_resource_monitoring {
            if config.monitoring_interval.is_zero() {
                warn!("monitoring interval is zero; stats timer not started");
            } else {
                self.monitor = Some(spawn_periodic(&handle, weak, config.monitoring_interval, |m| {
                    m.update_memory_stats();
                }));
            }
        }
        self.started = true;

        info!(
            gc = config.enable_garbage_collection,
            gc_interval_ms = duration_ms(config.gc_interval),
            monitoring = config.enable_resource_monitoring,
            monitoring_interval_ms = duration_ms(config.monitoring_interval),
            "background memory tasks started"
        );
    }

    /// Abort both timers.
    pub(crate) fn stop(&mut self) {
        let mut stopped = false;
        for handle in [self.gc.take(), self.monitor.take()].into_iter().flatten() {
            handle.abort();
            stopped = true;
        }
        self.started = false;
        if stopped {
            debug!("background memory tasks stopped");
        }
    }

    /// Whether `start` ran successfully since the last `stop`.
    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn gc_running(&self) -> bool {
        self.gc.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub(crate) fn monitor_running(&self) -> bool {
        self.monitor.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_periodic<F>(handle: &Handle, weak: WeakManager, period: Duration, tick: F) -> JoinHandle<()>
where
    F: Fn(&MemoryManager) + Send + 'static,
{
    handle.spawn(async move {
        // First tick one full period out; `interval` would fire immediately.
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(manager) = weak.upgrade() else {
                debug!("memory manager dropped; background task exiting");
                break;
            };
            tick(&manager);
        }
    })
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
