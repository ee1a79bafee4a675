//! Sync engine orchestration

use crate::ApplyError;
use async_trait::async_trait;
use pulse_common::{
    Collection, Observation, Profile, ProfilePatch, QueueEntry, QueueOp, Reminder, ReminderPatch,
    Result, SharingFlags,
};
use pulse_config::SyncConfig;
use pulse_core::repo::reconcile_created;
use pulse_core::{ConnectivityMonitor, LocalStore, MutationQueue, Remotes};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

/// Outcome of one `drain_now` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// False when the call was a no-op (already draining, or the store is
    /// not initialized yet).
    pub ran: bool,
    /// Entries applied remotely and removed from the queue.
    pub applied: usize,
    /// Entries that failed this pass and stay queued with a bumped counter.
    pub failed: usize,
    /// Entries removed past the retry ceiling without being applied.
    pub dropped: usize,
}

/// Owns queue draining; the only writer that applies queued intents against
/// the remote store.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    net: ConnectivityMonitor,
    remotes: Remotes,
    config: SyncConfig,
    draining: AtomicBool,
    pub(crate) drain_notify: Notify,
    dropped_tx: broadcast::Sender<QueueEntry>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<LocalStore>,
        net: ConnectivityMonitor,
        remotes: Remotes,
        config: SyncConfig,
    ) -> Self {
        let (dropped_tx, _) = broadcast::channel(64);
        Self {
            store,
            net,
            remotes,
            config,
            draining: AtomicBool::new(false),
            drain_notify: Notify::new(),
            dropped_tx,
        }
    }

    pub(crate) fn net(&self) -> &ConnectivityMonitor {
        &self.net
    }

    pub(crate) fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.config.drain_interval_secs)
    }

    /// Entries abandoned past the retry ceiling are published here, so a UI
    /// can surface permanently lost mutations. The ceiling itself is
    /// unchanged; dropping stays silent for subscriber-less engines.
    pub fn dropped_mutations(&self) -> broadcast::Receiver<QueueEntry> {
        self.dropped_tx.subscribe()
    }

    /// Retry local store initialization with capped exponential backoff
    /// until it succeeds. Initialization failures are never surfaced as a
    /// fatal error.
    pub async fn ensure_initialized(&self) {
        let mut backoff = Duration::from_millis(self.config.init_backoff_ms);
        let max = Duration::from_millis(self.config.init_backoff_max_ms);
        loop {
            match self.store.init().await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(error = %e, backoff_ms = backoff.as_millis() as u64,
                        "Local store initialization failed; retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max);
                }
            }
        }
    }

    /// Run one drain pass.
    ///
    /// No-op while a pass is already in flight (single-flight) or before
    /// the local store has initialized. One pass reads the whole queue in
    /// enqueue order and attempts each entry exactly once; entry outcomes
    /// never short-circuit the pass.
    pub async fn drain_now(&self) -> Result<DrainReport> {
        if !self.store.is_initialized() {
            tracing::debug!("Drain skipped: local store not initialized");
            return Ok(DrainReport::default());
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Drain skipped: pass already in flight");
            return Ok(DrainReport::default());
        }

        let result = self.drain_pass().await;
        self.draining.store(false, Ordering::SeqCst);
        result
    }

    async fn drain_pass(&self) -> Result<DrainReport> {
        let entries = self.store.queue_entries().await?;
        let mut report = DrainReport {
            ran: true,
            ..Default::default()
        };

        for entry in entries {
            if entry.retries > self.config.retry_limit {
                self.store.remove_entry(&entry.id).await?;
                tracing::warn!(
                    entry_id = %entry.id,
                    collection = %entry.collection,
                    retries = entry.retries,
                    "Dropping queue entry past retry ceiling"
                );
                report.dropped += 1;
                let _ = self.dropped_tx.send(entry);
                continue;
            }

            match self.apply(&entry).await {
                Ok(()) => {
                    self.store.remove_entry(&entry.id).await?;
                    report.applied += 1;
                }
                Err(e) => {
                    tracing::debug!(entry_id = %entry.id, error = %e, "Queue entry failed; will retry next pass");
                    self.store.bump_retry(&entry.id).await?;
                    report.failed += 1;
                }
            }
        }

        if report.applied + report.failed + report.dropped > 0 {
            tracing::info!(
                applied = report.applied,
                failed = report.failed,
                dropped = report.dropped,
                "Drain pass complete"
            );
        }
        Ok(report)
    }

    /// Dispatch one entry to the remote operation matching its recorded
    /// collection and operation kind, reconciling the local store on
    /// success.
    async fn apply(&self, entry: &QueueEntry) -> std::result::Result<(), ApplyError> {
        match (entry.collection, entry.op) {
            (Collection::Profiles, QueueOp::Create) => {
                let profile: Profile = parse(&entry.payload)?;
                let remote = self.remotes.profiles.create(&profile).await?;
                self.store
                    .put(Collection::Profiles, &remote.id, &remote)
                    .await?;
            }
            (Collection::Profiles, QueueOp::Update) => {
                let (id, patch): (String, ProfilePatch) = parse_patch(&entry.payload)?;
                let remote = self.remotes.profiles.update(&id, &patch).await?;
                self.store
                    .put(Collection::Profiles, &remote.id, &remote)
                    .await?;
            }
            (Collection::Observations, QueueOp::Create) => {
                let observation: Observation = parse(&entry.payload)?;
                let remote = self.remotes.observations.create(&observation).await?;
                reconcile_created(
                    &self.store,
                    Collection::Observations,
                    &observation.id,
                    &remote.id,
                    &remote,
                )
                .await?;
            }
            (Collection::Observations, QueueOp::Delete) => {
                let id = parse_id(&entry.payload)?;
                self.remotes.observations.delete(&id).await?;
                self.store.delete(Collection::Observations, &id).await?;
            }
            (Collection::ProviderLinks, QueueOp::Update) => {
                let (id, flags): (String, SharingFlags) = parse_patch(&entry.payload)?;
                let remote = self.remotes.sharing.update_flags(&id, &flags).await?;
                self.store
                    .put(Collection::ProviderLinks, &remote.id, &remote)
                    .await?;
            }
            (Collection::ProviderLinks, QueueOp::Delete) => {
                let id = parse_id(&entry.payload)?;
                self.remotes.sharing.delete_link(&id).await?;
                self.store.delete(Collection::ProviderLinks, &id).await?;
            }
            (Collection::Reminders, QueueOp::Create) => {
                let reminder: Reminder = parse(&entry.payload)?;
                let remote = self.remotes.reminders.create(&reminder).await?;
                reconcile_created(
                    &self.store,
                    Collection::Reminders,
                    &reminder.id,
                    &remote.id,
                    &remote,
                )
                .await?;
            }
            (Collection::Reminders, QueueOp::Update) => {
                let (id, patch): (String, ReminderPatch) = parse_patch(&entry.payload)?;
                let remote = self.remotes.reminders.update(&id, &patch).await?;
                self.store
                    .put(Collection::Reminders, &remote.id, &remote)
                    .await?;
            }
            (Collection::Reminders, QueueOp::Delete) => {
                let id = parse_id(&entry.payload)?;
                self.remotes.reminders.delete(&id).await?;
                self.store.delete(Collection::Reminders, &id).await?;
            }
            (collection, op) => {
                return Err(ApplyError::Unsupported { collection, op });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MutationQueue for SyncEngine {
    /// Append a mutation intent with a fresh timestamp and a zero retry
    /// counter. While online, nudges the scheduler for a best-effort drain
    /// that the caller does not wait on.
    async fn enqueue(
        &self,
        collection: Collection,
        op: QueueOp,
        payload: serde_json::Value,
    ) -> Result<()> {
        let entry = QueueEntry::new(collection, op, payload);
        self.store.enqueue_entry(&entry).await?;
        tracing::debug!(entry_id = %entry.id, %collection, ?op, "Mutation queued for sync");

        if self.net.is_online() {
            self.drain_notify.notify_one();
        }
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(payload: &serde_json::Value) -> std::result::Result<T, ApplyError> {
    serde_json::from_value(payload.clone()).map_err(|e| ApplyError::Payload(e.to_string()))
}

/// Payload shape for updates: `{"id": ..., "patch": {...}}`.
fn parse_patch<T: DeserializeOwned>(
    payload: &serde_json::Value,
) -> std::result::Result<(String, T), ApplyError> {
    let id = parse_id(payload)?;
    let patch = payload
        .get("patch")
        .cloned()
        .ok_or_else(|| ApplyError::Payload("missing 'patch' field".to_string()))?;
    Ok((id, parse(&patch)?))
}

fn parse_id(payload: &serde_json::Value) -> std::result::Result<String, ApplyError> {
    payload
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ApplyError::Payload("missing 'id' field".to_string()))
}
