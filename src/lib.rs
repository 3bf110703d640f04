//! Object pooling and inactivity collection for canvas scene objects.
//!
//! A canvas-owning component builds one [`manager::MemoryManager`] at
//! startup and hands clones of it to everything that creates, touches, or
//! discards scene objects. The manager keeps per-canvas pools of reusable
//! objects, tracks every object attached to a canvas together with its last
//! access time, and periodically drops objects that have gone stale. It owns
//! tracking state only: detaching an evicted object from the rendering
//! surface stays with the caller, which learns about evictions through
//! [`gc::GcOutcome`] or an eviction sink.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`manager`] | Public facade: pools, registration, GC, stats, cleanup |
//! | [`object`] | Scene object contract and transform reset |
//! | [`pool`] | Per-canvas, per-type free lists and active sets |
//! | [`ledger`] | Per-canvas membership and last-access timestamps |
//! | [`gc`] | Stale-object scan and sweep outcomes |
//! | [`stats`] | Memory probes and stats snapshots |
//! | [`config`] | Tunables, env loading, validation |
//! | `tasks` | Background GC and stats-refresh timers |

pub mod config;
pub mod gc;
pub mod ledger;
pub mod manager;
pub mod object;
pub mod pool;
pub mod stats;
mod tasks;

pub use config::{ConfigError, MemoryConfig};
pub use gc::{Eviction, GcOutcome, SkipReason};
pub use manager::MemoryManager;
pub use object::{CanvasObject, ObjectId};
pub use pool::{PoolConfig, PoolStats};
pub use stats::{CanvasStats, EstimateProbe, MemoryProbe, MemorySource, MemoryStats, SystemProbe};
