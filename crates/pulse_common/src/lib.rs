//! Common types and errors for PulseSync
//!
//! This crate provides the shared data structures used across all PulseSync
//! components: the record collections, the sync-queue entry shape, and the
//! error taxonomy for local storage and remote calls.

pub mod telemetry;
pub mod types;

pub use types::{
    is_local_id, local_id, Collection, LinkToken, MetricKind, Observation, Profile, ProfilePatch,
    ProviderLink, QueueEntry, QueueOp, Reminder, ReminderPatch, Role, SharingFlags,
};

use thiserror::Error;

/// Core error types for local PulseSync operations
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Local store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the remote store.
///
/// Remote failures are modelled as a variant result rather than an exception
/// path: repositories branch on these to decide between reconciliation,
/// local fallback, and enqueueing.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// Transport-level failure: the remote could not be reached at all.
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// The remote answered but refused the operation (validation, auth).
    #[error("Remote rejected request: {0}")]
    Rejected(String),

    /// Legitimate empty result on a single-record lookup.
    #[error("Record not found")]
    NotFound,
}

/// Result type alias for local operations
pub type Result<T> = std::result::Result<T, PulseError>;

/// Result type alias for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
