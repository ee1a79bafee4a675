//! Scripted in-memory remote store
//!
//! Implements every remote trait over in-memory maps, with a failure
//! script: all calls can be failed, or just the next N, to drive the
//! enqueue/retry paths. Every call attempt is recorded so tests can assert
//! what was (or was not) dispatched.

use async_trait::async_trait;
use pulse_common::{
    LinkToken, MetricKind, Observation, Profile, ProfilePatch, ProviderLink, Reminder,
    ReminderPatch, RemoteError, RemoteResult, SharingFlags,
};
use pulse_core::{ObservationQuery, ObservationRemote, ProfileRemote, ReminderRemote, Remotes, SharingRemote};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Programmable fake backend shared by all four remote traits.
#[derive(Default)]
pub struct ScriptedRemote {
    fail_all: AtomicBool,
    fail_next: AtomicU32,
    delay_ms: AtomicU64,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
    pub profiles: Mutex<HashMap<String, Profile>>,
    pub observations: Mutex<HashMap<String, Observation>>,
    pub links: Mutex<HashMap<String, ProviderLink>>,
    pub reminders: Mutex<HashMap<String, Reminder>>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bundle this fake behind all four remote handles.
    pub fn remotes(self: &Arc<Self>) -> Remotes {
        Remotes {
            profiles: Arc::clone(self) as _,
            observations: Arc::clone(self) as _,
            sharing: Arc::clone(self) as _,
            reminders: Arc::clone(self) as _,
        }
    }

    /// Fail every call until cleared.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fail exactly the next `n` calls, then succeed again.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Every call attempted so far, in order (e.g. `observations.create`).
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c == &op).count()
    }

    /// Delay every call by `ms`, to let tests overlap in-flight passes.
    pub fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    async fn attempt(&self, op: &str) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(op.to_string());
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("scripted failure".to_string()));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RemoteError::Unreachable("scripted failure".to_string()));
        }
        Ok(())
    }

    fn assign_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl ProfileRemote for ScriptedRemote {
    async fn create(&self, profile: &Profile) -> RemoteResult<Profile> {
        self.attempt("profiles.create").await?;
        let mut stored = profile.clone();
        stored.created_at = Some(chrono::Utc::now());
        self.profiles
            .lock()
            .unwrap()
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, user_id: &str, patch: &ProfilePatch) -> RemoteResult<Profile> {
        self.attempt("profiles.update").await?;
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles.get_mut(user_id).ok_or(RemoteError::NotFound)?;
        profile.apply(patch);
        Ok(profile.clone())
    }

    async fn fetch(&self, user_id: &str) -> RemoteResult<Profile> {
        self.attempt("profiles.fetch").await?;
        self.profiles
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }
}

#[async_trait]
impl ObservationRemote for ScriptedRemote {
    async fn create(&self, observation: &Observation) -> RemoteResult<Observation> {
        self.attempt("observations.create").await?;
        let mut stored = observation.clone();
        stored.id = self.assign_id("srv");
        stored.created_at = Some(chrono::Utc::now());
        self.observations
            .lock()
            .unwrap()
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        self.attempt("observations.delete").await?;
        self.observations.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list(&self, user_id: &str, query: &ObservationQuery) -> RemoteResult<Vec<Observation>> {
        self.attempt("observations.list").await?;
        let mut result: Vec<Observation> = self
            .observations
            .lock()
            .unwrap()
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

    async fn latest(&self, user_id: &str, metric: MetricKind) -> RemoteResult<Option<Observation>> {
        self.attempt("observations.latest").await?;
        let result = self
            .observations
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.user_id == user_id && o.metric == metric)
            .cloned()
            .max_by_key(|o| o.ts);
        Ok(result)
    }
}

#[async_trait]
impl SharingRemote for ScriptedRemote {
    async fn update_flags(&self, link_id: &str, flags: &SharingFlags) -> RemoteResult<ProviderLink> {
        self.attempt("sharing.update_flags").await?;
        let mut links = self.links.lock().unwrap();
        let link = links.get_mut(link_id).ok_or(RemoteError::NotFound)?;
        link.apply(flags);
        Ok(link.clone())
    }

    async fn delete_link(&self, id: &str) -> RemoteResult<()> {
        self.attempt("sharing.delete_link").await?;
        self.links.lock().unwrap().remove(id);
        Ok(())
    }

    async fn links_for_provider(&self, provider_id: &str) -> RemoteResult<Vec<ProviderLink>> {
        self.attempt("sharing.links_for_provider").await?;
        Ok(self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn links_for_patient(&self, patient_id: &str) -> RemoteResult<Vec<ProviderLink>> {
        self.attempt("sharing.links_for_patient").await?;
        Ok(self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn create_token(&self, token: &LinkToken) -> RemoteResult<LinkToken> {
        self.attempt("sharing.create_token").await?;
        Ok(token.clone())
    }

    async fn redeem_token(&self, _code: &str, patient_id: &str) -> RemoteResult<ProviderLink> {
        self.attempt("sharing.redeem_token").await?;
        let link = ProviderLink {
            id: self.assign_id("link"),
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
        self.links
            .lock()
            .unwrap()
            .insert(link.id.clone(), link.clone());
        Ok(link)
    }

    async fn active_tokens(&self, _provider_id: &str) -> RemoteResult<Vec<LinkToken>> {
        self.attempt("sharing.active_tokens").await?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl ReminderRemote for ScriptedRemote {
    async fn create(&self, reminder: &Reminder) -> RemoteResult<Reminder> {
        self.attempt("reminders.create").await?;
        let mut stored = reminder.clone();
        stored.id = self.assign_id("rem");
        self.reminders
            .lock()
            .unwrap()
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: &ReminderPatch) -> RemoteResult<Reminder> {
        self.attempt("reminders.update").await?;
        let mut reminders = self.reminders.lock().unwrap();
        let reminder = reminders.get_mut(id).ok_or(RemoteError::NotFound)?;
        reminder.apply(patch);
        Ok(reminder.clone())
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        self.attempt("reminders.delete").await?;
        self.reminders.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list(&self, user_id: &str) -> RemoteResult<Vec<Reminder>> {
        self.attempt("reminders.list").await?;
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
