//! Profile repository

use crate::net::ConnectivityMonitor;
use crate::remote::{MutationQueue, ProfileRemote};
use crate::store::LocalStore;
use pulse_common::{Collection, Profile, ProfilePatch, PulseError, QueueOp, Result};
use std::sync::Arc;

/// CRUD-shaped operations for the `profiles` collection.
pub struct ProfileRepository {
    store: Arc<LocalStore>,
    remote: Arc<dyn ProfileRemote>,
    net: ConnectivityMonitor,
    queue: Arc<dyn MutationQueue>,
}

impl ProfileRepository {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn ProfileRemote>,
        net: ConnectivityMonitor,
        queue: Arc<dyn MutationQueue>,
    ) -> Self {
        Self {
            store,
            remote,
            net,
            queue,
        }
    }

    /// Create a profile. The key is the auth-provided user id, so no
    /// temporary identifier is synthesized here.
    pub async fn create_profile(&self, profile: Profile) -> Result<Profile> {
        if profile.id.is_empty() {
            return Err(PulseError::Validation(
                "profile id must not be empty".to_string(),
            ));
        }

        self.store
            .put(Collection::Profiles, &profile.id, &profile)
            .await?;

        if self.net.is_online() {
            match self.remote.create(&profile).await {
                Ok(remote) => {
                    self.store
                        .put(Collection::Profiles, &remote.id, &remote)
                        .await?;
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(user_id = %profile.id, error = %e, "Profile create deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::Profiles,
                QueueOp::Create,
                serde_json::to_value(&profile)?,
            )
            .await?;
        Ok(profile)
    }

    /// Merge a partial update over the last known local value.
    pub async fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<Profile> {
        let local: Option<Profile> = self.store.get(Collection::Profiles, user_id).await?;
        let mut merged = local.ok_or_else(|| {
            PulseError::Validation(format!("no local profile for user '{}'", user_id))
        })?;
        merged.apply(&patch);

        self.store
            .put(Collection::Profiles, user_id, &merged)
            .await?;

        if self.net.is_online() {
            match self.remote.update(user_id, &patch).await {
                Ok(remote) => {
                    self.store
                        .put(Collection::Profiles, &remote.id, &remote)
                        .await?;
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "Profile update deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::Profiles,
                QueueOp::Update,
                serde_json::json!({ "id": user_id, "patch": patch }),
            )
            .await?;
        Ok(merged)
    }

    /// Remote-first read with local fallback. Absence is `Ok(None)` on both
    /// paths.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        if self.net.is_online() {
            match self.remote.fetch(user_id).await {
                Ok(remote) => {
                    self.store
                        .put(Collection::Profiles, &remote.id, &remote)
                        .await?;
                    return Ok(Some(remote));
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "Profile read falling back to local store");
                }
            }
        }

        self.store.get(Collection::Profiles, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::fixtures::Harness;
    use pulse_common::{QueueOp, Role};

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.to_string(),
            role: Role::Patient,
            language: Some("en".to_string()),
            full_name: None,
            date_of_birth: None,
            country: None,
            created_at: None,
        }
    }

    fn repo(h: &Harness) -> ProfileRepository {
        ProfileRepository::new(
            Arc::clone(&h.store),
            h.remote_handle(),
            h.net.clone(),
            h.queue.clone(),
        )
    }

    #[tokio::test]
    async fn test_create_online_reconciles_with_remote() {
        let h = Harness::new().await;
        let repo = repo(&h);

        let created = repo.create_profile(profile("u1")).await.unwrap();
        // Remote stamped created_at; the local copy must match it.
        assert!(created.created_at.is_some());
        let local: Profile = h
            .store
            .get(Collection::Profiles, "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local, created);
        assert!(h.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_offline_enqueues_and_keeps_local() {
        let h = Harness::new().await;
        h.net.set_online(false);
        let repo = repo(&h);

        let created = repo.create_profile(profile("u1")).await.unwrap();
        assert!(created.created_at.is_none());

        let local: Option<Profile> = h.store.get(Collection::Profiles, "u1").await.unwrap();
        assert!(local.is_some());

        let queued = h.queued().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].op, QueueOp::Create);
        assert_eq!(queued[0].collection, Collection::Profiles);
    }

    #[tokio::test]
    async fn test_create_remote_failure_falls_through_to_enqueue() {
        let h = Harness::new().await;
        h.remote.fail_remote(true);
        let repo = repo(&h);

        repo.create_profile(profile("u1")).await.unwrap();
        assert_eq!(h.queued().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_over_local() {
        let h = Harness::new().await;
        h.net.set_online(false);
        let repo = repo(&h);
        repo.create_profile(profile("u1")).await.unwrap();

        let updated = repo
            .update_profile(
                "u1",
                ProfilePatch {
                    language: Some("fr".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.language.as_deref(), Some("fr"));
        assert_eq!(updated.role, Role::Patient);

        // Create + update both queued.
        assert_eq!(h.queued().await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_without_local_copy_is_validation_error() {
        let h = Harness::new().await;
        let repo = repo(&h);
        let err = repo
            .update_profile("ghost", ProfilePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_online_refreshes_cache() {
        let h = Harness::new().await;
        let repo = repo(&h);
        repo.create_profile(profile("u1")).await.unwrap();

        // Poison the local copy; an online read must overwrite it.
        let mut stale = profile("u1");
        stale.language = Some("stale".to_string());
        h.store
            .put(Collection::Profiles, "u1", &stale)
            .await
            .unwrap();

        let fetched = repo.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(fetched.language.as_deref(), Some("en"));
        let local: Profile = h
            .store
            .get(Collection::Profiles, "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_get_offline_reads_local() {
        let h = Harness::new().await;
        h.net.set_online(false);
        let repo = repo(&h);
        repo.create_profile(profile("u1")).await.unwrap();

        let fetched = repo.get_profile("u1").await.unwrap();
        assert!(fetched.is_some());
        assert!(repo.get_profile("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_remote_error_falls_back_to_local() {
        let h = Harness::new().await;
        let repo = repo(&h);
        repo.create_profile(profile("u1")).await.unwrap();

        h.remote.fail_remote(true);
        let fetched = repo.get_profile("u1").await.unwrap();
        assert!(fetched.is_some());
    }
}
