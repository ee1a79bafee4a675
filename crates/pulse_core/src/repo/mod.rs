//! Domain repositories
//!
//! One repository per entity type; each is the only caller of both the
//! local store and the remote store for that entity. The shared pattern:
//!
//! - Reads go remote-first while online, refreshing the local cache on
//!   success, and silently fall back to the local store on any remote
//!   error. "Not found" is an empty result, never an error.
//! - Writes compute the full resulting record, write it through to the
//!   local store unconditionally, then attempt the remote. Remote success
//!   reconciles the local copy with the authoritative record; remote
//!   failure or being offline enqueues the intent and reports success with
//!   the locally computed record. No write ever fails its caller because
//!   the network did.
//! - Deletes keep the local copy until the remote confirms.

mod observation;
mod profile;
mod reminder;
mod sharing;

pub use observation::ObservationRepository;
pub use profile::ProfileRepository;
pub use reminder::ReminderRepository;
pub use sharing::SharingRepository;

use crate::store::LocalStore;
use pulse_common::{is_local_id, Collection, Result};
use serde::Serialize;
use std::sync::Arc;

/// Replace the write-through copy with the authoritative remote record.
///
/// When the remote assigned a permanent id, the temporary local key is
/// removed so only the remote-keyed record remains.
pub async fn reconcile_created<T: Serialize>(
    store: &Arc<LocalStore>,
    collection: Collection,
    local_key: &str,
    remote_key: &str,
    remote_record: &T,
) -> Result<()> {
    store.put(collection, remote_key, remote_record).await?;
    if local_key != remote_key && is_local_id(local_key) {
        store.delete(collection, local_key).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal programmable fakes for the remote-store traits.

    use crate::net::ConnectivityMonitor;
    use crate::remote::{
        MutationQueue, ObservationQuery, ObservationRemote, ProfileRemote, ReminderRemote,
        SharingRemote,
    };
    use crate::store::LocalStore;
    use async_trait::async_trait;
    use pulse_common::{
        Collection, LinkToken, MetricKind, Observation, Profile, ProfilePatch, ProviderLink,
        QueueEntry, QueueOp, Reminder, ReminderPatch, RemoteError, RemoteResult, SharingFlags,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Queue double that records intents without a sync engine behind it.
    #[derive(Default)]
    pub struct RecordingQueue {
        pub entries: Mutex<Vec<QueueEntry>>,
    }

    #[async_trait]
    impl MutationQueue for RecordingQueue {
        async fn enqueue(
            &self,
            collection: Collection,
            op: QueueOp,
            payload: serde_json::Value,
        ) -> pulse_common::Result<()> {
            self.entries
                .lock()
                .await
                .push(QueueEntry::new(collection, op, payload));
            Ok(())
        }
    }

    /// Shared failure switch: while set, every remote call reports
    /// `Unreachable`.
    #[derive(Default)]
    pub struct FakeRemoteState {
        pub fail: AtomicBool,
        pub profiles: Mutex<HashMap<String, Profile>>,
        pub observations: Mutex<HashMap<String, Observation>>,
        pub links: Mutex<HashMap<String, ProviderLink>>,
        pub reminders: Mutex<HashMap<String, Reminder>>,
        next_id: std::sync::atomic::AtomicU64,
    }

    impl FakeRemoteState {
        pub fn fail_remote(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn check(&self) -> RemoteResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(RemoteError::Unreachable("connection reset".to_string()))
            } else {
                Ok(())
            }
        }

        pub fn assign_id(&self, prefix: &str) -> String {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            format!("{}-{}", prefix, n + 1)
        }
    }

    pub struct FakeRemote(pub Arc<FakeRemoteState>);

    #[async_trait]
    impl ProfileRemote for FakeRemote {
        async fn create(&self, profile: &Profile) -> RemoteResult<Profile> {
            self.0.check()?;
            let mut stored = profile.clone();
            stored.created_at = Some(chrono::Utc::now());
            self.0
                .profiles
                .lock()
                .await
                .insert(stored.id.clone(), stored.clone());
            Ok(stored)
        }

        async fn update(&self, user_id: &str, patch: &ProfilePatch) -> RemoteResult<Profile> {
            self.0.check()?;
            let mut profiles = self.0.profiles.lock().await;
            let profile = profiles.get_mut(user_id).ok_or(RemoteError::NotFound)?;
            profile.apply(patch);
            Ok(profile.clone())
        }

        async fn fetch(&self, user_id: &str) -> RemoteResult<Profile> {
            self.0.check()?;
            self.0
                .profiles
                .lock()
                .await
                .get(user_id)
                .cloned()
                .ok_or(RemoteError::NotFound)
        }
    }

    #[async_trait]
    impl ObservationRemote for FakeRemote {
        async fn create(&self, observation: &Observation) -> RemoteResult<Observation> {
            self.0.check()?;
            let mut stored = observation.clone();
            stored.id = self.0.assign_id("srv");
            stored.created_at = Some(chrono::Utc::now());
            self.0
                .observations
                .lock()
                .await
                .insert(stored.id.clone(), stored.clone());
            Ok(stored)
        }

        async fn delete(&self, id: &str) -> RemoteResult<()> {
            self.0.check()?;
            self.0.observations.lock().await.remove(id);
            Ok(())
        }

        async fn list(
            &self,
            user_id: &str,
            query: &ObservationQuery,
        ) -> RemoteResult<Vec<Observation>> {
            self.0.check()?;
            let mut result: Vec<Observation> = self
                .0
                .observations
                .lock()
                .await
                .values()
                .filter(|o| o.user_id == user_id)
                .filter(|o| query.metric.map_or(true, |m| o.metric == m))
                .filter(|o| query.since.map_or(true, |since| o.ts >= since))
                .cloned()
                .collect();
            if query.ascending {
                result.sort_by(|a, b| a.ts.cmp(&b.ts));
            } else {
                result.sort_by(|a, b| b.ts.cmp(&a.ts));
            }
            if let Some(limit) = query.limit {
                result.truncate(limit);
            }
            Ok(result)
        }

        async fn latest(
            &self,
            user_id: &str,
            metric: MetricKind,
        ) -> RemoteResult<Option<Observation>> {
            let query = ObservationQuery {
                metric: Some(metric),
                limit: Some(1),
                ..Default::default()
            };
            Ok(ObservationRemote::list(self, user_id, &query)
                .await?
                .into_iter()
                .next())
        }
    }

    #[async_trait]
    impl SharingRemote for FakeRemote {
        async fn update_flags(
            &self,
            link_id: &str,
            flags: &SharingFlags,
        ) -> RemoteResult<ProviderLink> {
            self.0.check()?;
            let mut links = self.0.links.lock().await;
            let link = links.get_mut(link_id).ok_or(RemoteError::NotFound)?;
            link.apply(flags);
            Ok(link.clone())
        }

        async fn delete_link(&self, id: &str) -> RemoteResult<()> {
            self.0.check()?;
            self.0.links.lock().await.remove(id);
            Ok(())
        }

        async fn links_for_provider(&self, provider_id: &str) -> RemoteResult<Vec<ProviderLink>> {
            self.0.check()?;
            Ok(self
                .0
                .links
                .lock()
                .await
                .values()
                .filter(|l| l.provider_id == provider_id)
                .cloned()
                .collect())
        }

        async fn links_for_patient(&self, patient_id: &str) -> RemoteResult<Vec<ProviderLink>> {
            self.0.check()?;
            Ok(self
                .0
                .links
                .lock()
                .await
                .values()
                .filter(|l| l.patient_id == patient_id)
                .cloned()
                .collect())
        }

        async fn create_token(&self, token: &LinkToken) -> RemoteResult<LinkToken> {
            self.0.check()?;
            Ok(token.clone())
        }

        async fn redeem_token(&self, _code: &str, patient_id: &str) -> RemoteResult<ProviderLink> {
            self.0.check()?;
            let link = ProviderLink {
                id: self.0.assign_id("link"),
                provider_id: "prov-1".to_string(),
                patient_id: patient_id.to_string(),
                share_bp: false,
                share_glucose: false,
                share_spo2: false,
                share_hr: false,
                share_pain: false,
                share_weight: false,
                created_at: Some(chrono::Utc::now()),
            };
            self.0
                .links
                .lock()
                .await
                .insert(link.id.clone(), link.clone());
            Ok(link)
        }

        async fn active_tokens(&self, _provider_id: &str) -> RemoteResult<Vec<LinkToken>> {
            self.0.check()?;
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl ReminderRemote for FakeRemote {
        async fn create(&self, reminder: &Reminder) -> RemoteResult<Reminder> {
            self.0.check()?;
            let mut stored = reminder.clone();
            stored.id = self.0.assign_id("rem");
            self.0
                .reminders
                .lock()
                .await
                .insert(stored.id.clone(), stored.clone());
            Ok(stored)
        }

        async fn update(&self, id: &str, patch: &ReminderPatch) -> RemoteResult<Reminder> {
            self.0.check()?;
            let mut reminders = self.0.reminders.lock().await;
            let reminder = reminders.get_mut(id).ok_or(RemoteError::NotFound)?;
            reminder.apply(patch);
            Ok(reminder.clone())
        }

        async fn delete(&self, id: &str) -> RemoteResult<()> {
            self.0.check()?;
            self.0.reminders.lock().await.remove(id);
            Ok(())
        }

        async fn list(&self, user_id: &str) -> RemoteResult<Vec<Reminder>> {
            self.0.check()?;
            Ok(self
                .0
                .reminders
                .lock()
                .await
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect())
        }
    }

    /// Everything a repository test needs, wired together.
    pub struct Harness {
        pub store: Arc<LocalStore>,
        pub net: ConnectivityMonitor,
        pub queue: Arc<RecordingQueue>,
        pub remote: Arc<FakeRemoteState>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        pub async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(LocalStore::new(dir.path().join("pulse.db")));
            store.init().await.unwrap();
            Self {
                store,
                net: ConnectivityMonitor::new(),
                queue: Arc::new(RecordingQueue::default()),
                remote: Arc::new(FakeRemoteState::default()),
                _dir: dir,
            }
        }

        pub fn remote_handle(&self) -> Arc<FakeRemote> {
            Arc::new(FakeRemote(Arc::clone(&self.remote)))
        }

        pub async fn queued(&self) -> Vec<QueueEntry> {
            self.queue.entries.lock().await.clone()
        }
    }
}
