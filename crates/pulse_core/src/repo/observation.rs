//! Observation repository

use crate::net::ConnectivityMonitor;
use crate::remote::{MutationQueue, ObservationQuery, ObservationRemote};
use crate::repo::reconcile_created;
use crate::store::LocalStore;
use chrono::{Duration, Utc};
use pulse_common::{local_id, Collection, MetricKind, Observation, PulseError, QueueOp, Result};
use std::sync::Arc;

/// CRUD-shaped operations for the `observations` collection.
pub struct ObservationRepository {
    store: Arc<LocalStore>,
    remote: Arc<dyn ObservationRemote>,
    net: ConnectivityMonitor,
    queue: Arc<dyn MutationQueue>,
}

impl ObservationRepository {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn ObservationRemote>,
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

    /// Record a new reading. Assigns a temporary local id when none is
    /// supplied; the id is swapped for the remote-assigned one once the
    /// create reaches the server.
    pub async fn create_observation(&self, mut observation: Observation) -> Result<Observation> {
        if observation.id.is_empty() {
            observation.id = local_id();
        }
        observation
            .validate()
            .map_err(PulseError::Validation)?;

        self.store
            .put(Collection::Observations, &observation.id, &observation)
            .await?;

        if self.net.is_online() {
            match self.remote.create(&observation).await {
                Ok(remote) => {
                    reconcile_created(
                        &self.store,
                        Collection::Observations,
                        &observation.id,
                        &remote.id,
                        &remote,
                    )
                    .await?;
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(id = %observation.id, error = %e, "Observation create deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::Observations,
                QueueOp::Create,
                serde_json::to_value(&observation)?,
            )
            .await?;
        Ok(observation)
    }

    /// Delete a reading. The local copy stays until the remote confirms:
    /// a failed or offline delete only queues the intent.
    pub async fn delete_observation(&self, id: &str) -> Result<()> {
        if self.net.is_online() {
            match self.remote.delete(id).await {
                Ok(()) => {
                    self.store.delete(Collection::Observations, id).await?;
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(id, error = %e, "Observation delete deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::Observations,
                QueueOp::Delete,
                serde_json::json!({ "id": id }),
            )
            .await?;
        Ok(())
    }

    /// All readings for a user, newest first.
    pub async fn observations(&self, user_id: &str, limit: usize) -> Result<Vec<Observation>> {
        self.read(
            user_id,
            ObservationQuery {
                limit: Some(limit),
                ..Default::default()
            },
            None,
        )
        .await
    }

    /// Readings of one metric for a user, newest first.
    pub async fn observations_by_metric(
        &self,
        user_id: &str,
        metric: MetricKind,
        limit: usize,
    ) -> Result<Vec<Observation>> {
        self.read(
            user_id,
            ObservationQuery {
                metric: Some(metric),
                limit: Some(limit),
                ..Default::default()
            },
            Some(metric),
        )
        .await
    }

    /// Most recent reading of one metric.
    pub async fn latest_observation(
        &self,
        user_id: &str,
        metric: MetricKind,
    ) -> Result<Option<Observation>> {
        if self.net.is_online() {
            match self.remote.latest(user_id, metric).await {
                Ok(latest) => {
                    if let Some(obs) = &latest {
                        self.store
                            .put(Collection::Observations, &obs.id, obs)
                            .await?;
                    }
                    return Ok(latest);
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "Latest-observation read falling back to local store");
                }
            }
        }

        Ok(self
            .store
            .observations_for_user(user_id, Some(metric))
            .await?
            .into_iter()
            .next())
    }

    /// Windowed ascending series for charting: readings of one metric from
    /// the last `days` days, oldest first.
    pub async fn observations_for_chart(
        &self,
        user_id: &str,
        metric: MetricKind,
        days: i64,
    ) -> Result<Vec<Observation>> {
        let since = Utc::now() - Duration::days(days);

        if self.net.is_online() {
            let query = ObservationQuery {
                metric: Some(metric),
                since: Some(since),
                ascending: true,
                ..Default::default()
            };
            match self.remote.list(user_id, &query).await {
                Ok(remote) => {
                    for obs in &remote {
                        self.store
                            .put(Collection::Observations, &obs.id, obs)
                            .await?;
                    }
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "Chart read falling back to local store");
                }
            }
        }

        let mut local = self
            .store
            .observations_for_user(user_id, Some(metric))
            .await?;
        local.retain(|obs| obs.ts >= since);
        local.sort_by(|a, b| a.ts.cmp(&b.ts));
        Ok(local)
    }

    async fn read(
        &self,
        user_id: &str,
        query: ObservationQuery,
        metric: Option<MetricKind>,
    ) -> Result<Vec<Observation>> {
        if self.net.is_online() {
            match self.remote.list(user_id, &query).await {
                Ok(remote) => {
                    for obs in &remote {
                        self.store
                            .put(Collection::Observations, &obs.id, obs)
                            .await?;
                    }
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "Observation read falling back to local store");
                }
            }
        }

        let mut local = self.store.observations_for_user(user_id, metric).await?;
        if let Some(limit) = query.limit {
            local.truncate(limit);
        }
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::fixtures::Harness;
    use pulse_common::is_local_id;

    fn weight(user: &str, value: f64, age_secs: i64) -> Observation {
        Observation {
            id: String::new(),
            user_id: user.to_string(),
            metric: MetricKind::Weight,
            ts: Utc::now() - Duration::seconds(age_secs),
            systolic: None,
            diastolic: None,
            numeric_value: Some(value),
            unit: Some("kg".to_string()),
            tags: None,
            context: None,
            created_at: None,
        }
    }

    fn repo(h: &Harness) -> ObservationRepository {
        ObservationRepository::new(
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

        let created = repo.create_observation(weight("u1", 70.0, 0)).await.unwrap();
        assert!(!is_local_id(&created.id));

        // Only the remote-keyed record remains locally.
        let local = h.store.observations_for_user("u1", None).await.unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, created.id);
        assert!(h.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_offline_keeps_temporary_id_and_enqueues() {
        let h = Harness::new().await;
        h.net.set_online(false);
        let repo = repo(&h);

        let created = repo.create_observation(weight("u1", 70.0, 0)).await.unwrap();
        assert!(is_local_id(&created.id));

        let local: Option<Observation> = h
            .store
            .get(Collection::Observations, &created.id)
            .await
            .unwrap();
        assert!(local.is_some());

        let queued = h.queued().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].op, QueueOp::Create);
        assert_eq!(queued[0].payload["id"], serde_json::json!(created.id));
    }

    #[tokio::test]
    async fn test_create_network_error_matches_offline_outcome() {
        let h = Harness::new().await;
        h.remote.fail_remote(true);
        let repo = repo(&h);

        let created = repo.create_observation(weight("u1", 70.0, 0)).await.unwrap();
        assert!(is_local_id(&created.id));
        assert_eq!(h.queued().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payload() {
        let h = Harness::new().await;
        let repo = repo(&h);

        let mut bad = weight("u1", 70.0, 0);
        bad.systolic = Some(120.0);
        let err = repo.create_observation(bad).await.unwrap_err();
        assert!(matches!(err, PulseError::Validation(_)));
        assert!(h.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_offline_keeps_local_copy() {
        let h = Harness::new().await;
        let repo = repo(&h);
        let created = repo.create_observation(weight("u1", 70.0, 0)).await.unwrap();

        h.net.set_online(false);
        repo.delete_observation(&created.id).await.unwrap();

        // Still present locally; removal happens on drain confirmation.
        let local: Option<Observation> = h
            .store
            .get(Collection::Observations, &created.id)
            .await
            .unwrap();
        assert!(local.is_some());

        let queued = h.queued().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].op, QueueOp::Delete);
    }

    #[tokio::test]
    async fn test_delete_online_removes_local_copy() {
        let h = Harness::new().await;
        let repo = repo(&h);
        let created = repo.create_observation(weight("u1", 70.0, 0)).await.unwrap();

        repo.delete_observation(&created.id).await.unwrap();
        let local: Option<Observation> = h
            .store
            .get(Collection::Observations, &created.id)
            .await
            .unwrap();
        assert!(local.is_none());
        assert!(h.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_refresh_cache_and_fall_back() {
        let h = Harness::new().await;
        let repo = repo(&h);
        repo.create_observation(weight("u1", 70.0, 120)).await.unwrap();
        repo.create_observation(weight("u1", 71.0, 0)).await.unwrap();

        let online = repo.observations("u1", 10).await.unwrap();
        assert_eq!(online.len(), 2);
        assert_eq!(online[0].numeric_value, Some(71.0));

        // Offline read serves the refreshed cache.
        h.net.set_online(false);
        let offline = repo.observations("u1", 10).await.unwrap();
        assert_eq!(offline.len(), 2);
        assert_eq!(offline[0].numeric_value, Some(71.0));

        let limited = repo.observations("u1", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_latest_observation_offline() {
        let h = Harness::new().await;
        let repo = repo(&h);
        repo.create_observation(weight("u1", 70.0, 60)).await.unwrap();
        repo.create_observation(weight("u1", 72.0, 0)).await.unwrap();

        h.net.set_online(false);
        let latest = repo
            .latest_observation("u1", MetricKind::Weight)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.numeric_value, Some(72.0));

        let none = repo
            .latest_observation("u1", MetricKind::Glucose)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_chart_window_ascending() {
        let h = Harness::new().await;
        let repo = repo(&h);
        // One reading inside the 7-day window, one outside.
        repo.create_observation(weight("u1", 69.0, 60 * 60 * 24 * 10))
            .await
            .unwrap();
        repo.create_observation(weight("u1", 70.0, 60 * 60 * 24 * 2))
            .await
            .unwrap();
        repo.create_observation(weight("u1", 71.0, 0)).await.unwrap();

        for online in [true, false] {
            h.net.set_online(online);
            let series = repo
                .observations_for_chart("u1", MetricKind::Weight, 7)
                .await
                .unwrap();
            assert_eq!(series.len(), 2, "online={}", online);
            assert!(series[0].ts <= series[1].ts);
            assert_eq!(series[0].numeric_value, Some(70.0));
        }
    }
}
