//! # PulseSync Engine
//!
//! Owns the write-queue: drains queued mutation intents to the remote store
//! in FIFO order with bounded retry, driven both periodically and by
//! connectivity transitions.
//!
//! ## Architecture
//!
//! - **Single-flight**: at most one drain pass executes at any instant;
//!   overlapping `drain_now` calls are no-ops.
//! - **Bounded retry**: an entry failing past the retry ceiling is removed
//!   without being applied and published on an observable channel.
//! - **Scheduler**: a background task ticks every drain interval while
//!   online and suspends the timer while offline.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pulse_config::SyncConfig;
//! use pulse_core::{ConnectivityMonitor, LocalStore, Remotes};
//! use pulse_sync::SyncEngine;
//! use std::sync::Arc;
//!
//! # async fn run(remotes: Remotes) -> pulse_common::Result<()> {
//! let store = Arc::new(LocalStore::new("pulsesync.db"));
//! let net = ConnectivityMonitor::new();
//! let engine = Arc::new(SyncEngine::new(
//!     Arc::clone(&store),
//!     net,
//!     remotes,
//!     SyncConfig::default(),
//! ));
//!
//! let scheduler = engine.spawn_scheduler();
//! // ... hand `engine` to the repositories as their MutationQueue ...
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod scheduler;

pub use engine::{DrainReport, SyncEngine};
pub use scheduler::SchedulerHandle;

use pulse_common::{Collection, PulseError, QueueOp, RemoteError};

/// Why applying one queue entry failed.
///
/// Any variant counts as a failed attempt for the entry's retry counter;
/// payload and dispatch problems are permanent and age out through the
/// retry ceiling, which is the deliberate data-loss boundary for entries
/// that can never succeed.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("storage error: {0}")]
    Storage(#[from] PulseError),

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("unsupported operation {op:?} on collection '{collection}'")]
    Unsupported { collection: Collection, op: QueueOp },
}
