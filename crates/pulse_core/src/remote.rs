//! Remote store interfaces
//!
//! The networked backend is opaque to the sync core: repositories and the
//! sync engine only ever talk to it through these dyn-safe traits, and every
//! call reports failure as a [`RemoteError`] variant rather than a panic, so
//! the offline fallback path is a normal branch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_common::{
    Collection, LinkToken, MetricKind, Observation, Profile, ProfilePatch, ProviderLink, QueueOp,
    Reminder, ReminderPatch, RemoteResult, SharingFlags,
};
use std::sync::Arc;

/// Query shape for remote observation reads.
#[derive(Debug, Clone, Default)]
pub struct ObservationQuery {
    pub metric: Option<MetricKind>,
    /// Lower bound on `ts`, inclusive.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    /// Oldest-first when set; default is newest-first.
    pub ascending: bool,
}

/// Per-entity remote operations for profiles.
#[async_trait]
pub trait ProfileRemote: Send + Sync {
    async fn create(&self, profile: &Profile) -> RemoteResult<Profile>;
    async fn update(&self, user_id: &str, patch: &ProfilePatch) -> RemoteResult<Profile>;
    /// `NotFound` is a legitimate outcome here, not a transport failure.
    async fn fetch(&self, user_id: &str) -> RemoteResult<Profile>;
}

/// Per-entity remote operations for observations.
#[async_trait]
pub trait ObservationRemote: Send + Sync {
    /// The returned record carries the remote-assigned permanent id.
    async fn create(&self, observation: &Observation) -> RemoteResult<Observation>;
    async fn delete(&self, id: &str) -> RemoteResult<()>;
    async fn list(&self, user_id: &str, query: &ObservationQuery) -> RemoteResult<Vec<Observation>>;
    async fn latest(&self, user_id: &str, metric: MetricKind) -> RemoteResult<Option<Observation>>;
}

/// Per-entity remote operations for provider links and pairing tokens.
#[async_trait]
pub trait SharingRemote: Send + Sync {
    async fn update_flags(&self, link_id: &str, flags: &SharingFlags) -> RemoteResult<ProviderLink>;
    async fn delete_link(&self, id: &str) -> RemoteResult<()>;
    async fn links_for_provider(&self, provider_id: &str) -> RemoteResult<Vec<ProviderLink>>;
    async fn links_for_patient(&self, patient_id: &str) -> RemoteResult<Vec<ProviderLink>>;
    /// Token flows mint server-side state and are never queued locally.
    async fn create_token(&self, token: &LinkToken) -> RemoteResult<LinkToken>;
    async fn redeem_token(&self, code: &str, patient_id: &str) -> RemoteResult<ProviderLink>;
    async fn active_tokens(&self, provider_id: &str) -> RemoteResult<Vec<LinkToken>>;
}

/// Per-entity remote operations for reminders.
#[async_trait]
pub trait ReminderRemote: Send + Sync {
    async fn create(&self, reminder: &Reminder) -> RemoteResult<Reminder>;
    async fn update(&self, id: &str, patch: &ReminderPatch) -> RemoteResult<Reminder>;
    async fn delete(&self, id: &str) -> RemoteResult<()>;
    async fn list(&self, user_id: &str) -> RemoteResult<Vec<Reminder>>;
}

/// Bundle of the four remote handles, shared by the sync engine.
#[derive(Clone)]
pub struct Remotes {
    pub profiles: Arc<dyn ProfileRemote>,
    pub observations: Arc<dyn ObservationRemote>,
    pub sharing: Arc<dyn SharingRemote>,
    pub reminders: Arc<dyn ReminderRemote>,
}

/// Enqueue-only interface the repositories consume.
///
/// Splitting this off the sync engine breaks the construction cycle:
/// repositories never hold the whole engine, and the engine never reaches
/// back into repositories.
#[async_trait]
pub trait MutationQueue: Send + Sync {
    /// Record a mutation intent for later remote application. Implementors
    /// may opportunistically start draining; callers are not blocked on it.
    async fn enqueue(
        &self,
        collection: Collection,
        op: QueueOp,
        payload: serde_json::Value,
    ) -> pulse_common::Result<()>;
}
