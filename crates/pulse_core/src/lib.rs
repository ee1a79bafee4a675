//! # PulseSync Core
//!
//! Offline-first data layer for the health-tracking client: the SQLite
//! local store, the connectivity monitor, the remote-store interfaces, and
//! the four domain repositories that keep local and remote state consistent.
//!
//! ## Architecture
//!
//! - **Local Store**: durable, indexed cache of every record collection;
//!   the write-through target for all mutations.
//! - **Connectivity Monitor**: push-based online/offline signal.
//! - **Domain Repositories**: remote-first reads with local fallback,
//!   local-first writes with deferred sync.
//! - The sync queue itself is drained by the `pulse_sync` crate; this crate
//!   only ever talks to it through the narrow [`remote::MutationQueue`]
//!   interface.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pulse_core::{ConnectivityMonitor, LocalStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> pulse_common::Result<()> {
//! let store = Arc::new(LocalStore::new("pulsesync.db"));
//! store.init().await?;
//!
//! let net = ConnectivityMonitor::new();
//! assert!(net.is_online());
//! # Ok(())
//! # }
//! ```

pub mod net;
pub mod remote;
pub mod repo;
pub mod store;

pub use net::ConnectivityMonitor;
pub use remote::{
    MutationQueue, ObservationQuery, ObservationRemote, ProfileRemote, ReminderRemote, Remotes,
    SharingRemote,
};
pub use repo::{ObservationRepository, ProfileRepository, ReminderRepository, SharingRepository};
pub use store::LocalStore;
