//! Reminder repository

use crate::net::ConnectivityMonitor;
use crate::remote::{MutationQueue, ReminderRemote};
use crate::repo::reconcile_created;
use crate::store::LocalStore;
use pulse_common::{local_id, Collection, PulseError, QueueOp, Reminder, ReminderPatch, Result};
use std::sync::Arc;

/// CRUD-shaped operations for the `reminders` collection.
pub struct ReminderRepository {
    store: Arc<LocalStore>,
    remote: Arc<dyn ReminderRemote>,
    net: ConnectivityMonitor,
    queue: Arc<dyn MutationQueue>,
}

impl ReminderRepository {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn ReminderRemote>,
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

    pub async fn create_reminder(&self, mut reminder: Reminder) -> Result<Reminder> {
        if reminder.id.is_empty() {
            reminder.id = local_id();
        }
        if reminder.title.is_empty() {
            return Err(PulseError::Validation(
                "reminder title must not be empty".to_string(),
            ));
        }

        self.store
            .put(Collection::Reminders, &reminder.id, &reminder)
            .await?;

        if self.net.is_online() {
            match self.remote.create(&reminder).await {
                Ok(remote) => {
                    reconcile_created(
                        &self.store,
                        Collection::Reminders,
                        &reminder.id,
                        &remote.id,
                        &remote,
                    )
                    .await?;
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(id = %reminder.id, error = %e, "Reminder create deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::Reminders,
                QueueOp::Create,
                serde_json::to_value(&reminder)?,
            )
            .await?;
        Ok(reminder)
    }

    pub async fn update_reminder(&self, id: &str, patch: ReminderPatch) -> Result<Reminder> {
        let local: Option<Reminder> = self.store.get(Collection::Reminders, id).await?;
        let mut merged = local
            .ok_or_else(|| PulseError::Validation(format!("no local reminder '{}'", id)))?;
        merged.apply(&patch);

        self.store.put(Collection::Reminders, id, &merged).await?;

        if self.net.is_online() {
            match self.remote.update(id, &patch).await {
                Ok(remote) => {
                    self.store
                        .put(Collection::Reminders, &remote.id, &remote)
                        .await?;
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(id, error = %e, "Reminder update deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::Reminders,
                QueueOp::Update,
                serde_json::json!({ "id": id, "patch": patch }),
            )
            .await?;
        Ok(merged)
    }

    /// Delete-on-confirmation, like every delete in the sync core.
    pub async fn delete_reminder(&self, id: &str) -> Result<()> {
        if self.net.is_online() {
            match self.remote.delete(id).await {
                Ok(()) => {
                    self.store.delete(Collection::Reminders, id).await?;
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(id, error = %e, "Reminder delete deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::Reminders,
                QueueOp::Delete,
                serde_json::json!({ "id": id }),
            )
            .await?;
        Ok(())
    }

    pub async fn reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        if self.net.is_online() {
            match self.remote.list(user_id).await {
                Ok(reminders) => {
                    for reminder in &reminders {
                        self.store
                            .put(Collection::Reminders, &reminder.id, reminder)
                            .await?;
                    }
                    return Ok(reminders);
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "Reminder read falling back to local store");
                }
            }
        }

        self.store
            .query_by_index(Collection::Reminders, "user_id", user_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::fixtures::Harness;
    use pulse_common::is_local_id;

    fn reminder(user: &str) -> Reminder {
        Reminder {
            id: String::new(),
            user_id: user.to_string(),
            title: "Morning weigh-in".to_string(),
            local_time: Some("08:00".to_string()),
            days: Some(vec!["Mon".to_string(), "Thu".to_string()]),
            enabled: true,
            created_at: None,
        }
    }

    fn repo(h: &Harness) -> ReminderRepository {
        ReminderRepository::new(
            Arc::clone(&h.store),
            h.remote_handle(),
            h.net.clone(),
            h.queue.clone(),
        )
    }

    #[tokio::test]
    async fn test_create_online_swaps_temporary_id() {
        let h = Harness::new().await;
        let repo = repo(&h);

        let created = repo.create_reminder(reminder("u1")).await.unwrap();
        assert!(!is_local_id(&created.id));
        let listed: Vec<Reminder> = h
            .store
            .query_by_index(Collection::Reminders, "user_id", "u1")
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
    }

    #[tokio::test]
    async fn test_create_offline_enqueues() {
        let h = Harness::new().await;
        h.net.set_online(false);
        let repo = repo(&h);

        let created = repo.create_reminder(reminder("u1")).await.unwrap();
        assert!(is_local_id(&created.id));
        let queued = h.queued().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].collection, Collection::Reminders);
        assert_eq!(queued[0].op, QueueOp::Create);
    }

    #[tokio::test]
    async fn test_create_empty_title_rejected() {
        let h = Harness::new().await;
        let repo = repo(&h);
        let mut bad = reminder("u1");
        bad.title.clear();
        assert!(matches!(
            repo.create_reminder(bad).await.unwrap_err(),
            PulseError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_update_merges_and_enqueues_offline() {
        let h = Harness::new().await;
        let repo = repo(&h);
        let created = repo.create_reminder(reminder("u1")).await.unwrap();

        h.net.set_online(false);
        let updated = repo
            .update_reminder(
                &created.id,
                ReminderPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.title, "Morning weigh-in");
        assert_eq!(h.queued().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_offline_keeps_local_copy() {
        let h = Harness::new().await;
        let repo = repo(&h);
        let created = repo.create_reminder(reminder("u1")).await.unwrap();

        h.net.set_online(false);
        repo.delete_reminder(&created.id).await.unwrap();

        let local: Option<Reminder> = h
            .store
            .get(Collection::Reminders, &created.id)
            .await
            .unwrap();
        assert!(local.is_some());
        assert_eq!(h.queued().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reminders_read_offline() {
        let h = Harness::new().await;
        let repo = repo(&h);
        repo.create_reminder(reminder("u1")).await.unwrap();
        repo.create_reminder(reminder("u2")).await.unwrap();

        h.net.set_online(false);
        let u1 = repo.reminders("u1").await.unwrap();
        assert_eq!(u1.len(), 1);
    }
}
