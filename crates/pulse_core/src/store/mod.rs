//! SQLite-backed local store
//!
//! Durable, keyed, indexed storage for the five record collections. The
//! store survives process restarts and works regardless of network
//! reachability; repositories treat it as the immediate write-through target
//! for every mutation.
//!
//! Records are stored as JSON payloads keyed by their primary key, with the
//! declared secondary-index columns extracted on every upsert. Schema is
//! applied once from `schema.sql`; there is no migration story (single fixed
//! version).

use pulse_common::{Collection, MetricKind, Observation, PulseError, QueueEntry, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::{Mutex, OnceCell};

/// Handle to the on-device persistent cache.
///
/// Cheap to construct; no I/O happens until [`LocalStore::init`]. All
/// repositories share one handle (`Arc<LocalStore>`).
pub struct LocalStore {
    path: PathBuf,
    conn: OnceCell<Mutex<Connection>>,
}

impl LocalStore {
    /// Create a handle for the database at `path`. No I/O is performed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: OnceCell::new(),
        }
    }

    /// Open the database and apply the schema.
    ///
    /// Idempotent: once initialization succeeds every later call returns
    /// immediately. Concurrent callers before completion share the one
    /// in-flight initialization, so the schema is set up exactly once.
    /// Fails with [`PulseError::StorageUnavailable`] if the database cannot
    /// be opened, leaving the store uninitialized so a later call can retry.
    pub async fn init(&self) -> Result<()> {
        self.conn
            .get_or_try_init(|| async {
                let conn = Connection::open(&self.path)
                    .map_err(|e| PulseError::StorageUnavailable(e.to_string()))?;

                conn.execute_batch(include_str!("schema.sql"))
                    .map_err(|e| PulseError::StorageUnavailable(e.to_string()))?;

                tracing::info!("Local store opened at {:?}", self.path);
                Ok::<_, PulseError>(Mutex::new(conn))
            })
            .await?;
        Ok(())
    }

    /// True once `init()` has completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.conn.get().is_some()
    }

    fn conn(&self) -> Result<&Mutex<Connection>> {
        self.conn
            .get()
            .ok_or_else(|| PulseError::StorageUnavailable("store not initialized".to_string()))
    }

    /// Declared secondary indexes per collection.
    fn indexes(collection: Collection) -> &'static [&'static str] {
        match collection {
            Collection::Profiles => &[],
            Collection::Observations => &["user_id", "metric", "ts"],
            Collection::ProviderLinks => &["provider_id", "patient_id"],
            Collection::Reminders => &["user_id"],
            Collection::SyncQueue => &["enqueued_at"],
        }
    }

    /// Upsert a record by primary key. The durable write completes before
    /// this returns.
    pub async fn put<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        record: &T,
    ) -> Result<()> {
        let value = serde_json::to_value(record)?;
        let payload = value.to_string();
        let conn = self.conn()?.lock().await;

        match collection {
            Collection::Profiles => {
                conn.execute(
                    "INSERT INTO profiles (key, payload) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET payload = excluded.payload",
                    params![key, payload],
                )?;
            }
            Collection::Observations => {
                conn.execute(
                    "INSERT INTO observations (key, payload, user_id, metric, ts)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        user_id = excluded.user_id,
                        metric = excluded.metric,
                        ts = excluded.ts",
                    params![
                        key,
                        payload,
                        index_text(&value, "user_id"),
                        index_text(&value, "metric"),
                        index_text(&value, "ts"),
                    ],
                )?;
            }
            Collection::ProviderLinks => {
                conn.execute(
                    "INSERT INTO provider_links (key, payload, provider_id, patient_id)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        provider_id = excluded.provider_id,
                        patient_id = excluded.patient_id",
                    params![
                        key,
                        payload,
                        index_text(&value, "provider_id"),
                        index_text(&value, "patient_id"),
                    ],
                )?;
            }
            Collection::Reminders => {
                conn.execute(
                    "INSERT INTO reminders (key, payload, user_id) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        user_id = excluded.user_id",
                    params![key, payload, index_text(&value, "user_id")],
                )?;
            }
            Collection::SyncQueue => {
                let enqueued_at = value.get("enqueued_at").and_then(|v| v.as_i64()).unwrap_or(0);
                conn.execute(
                    "INSERT INTO sync_queue (key, payload, enqueued_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET payload = excluded.payload",
                    params![key, payload, enqueued_at],
                )?;
            }
        }

        Ok(())
    }

    /// Fetch a record by primary key.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>> {
        let conn = self.conn()?.lock().await;
        let sql = format!("SELECT payload FROM {} WHERE key = ?1", collection.table());
        let payload: Option<String> = conn
            .query_row(&sql, params![key], |row| row.get(0))
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Fetch all records matching a secondary-index value. Result order is
    /// unspecified beyond what callers impose afterwards.
    pub async fn query_by_index<T: DeserializeOwned>(
        &self,
        collection: Collection,
        index: &str,
        value: &str,
    ) -> Result<Vec<T>> {
        if !Self::indexes(collection).contains(&index) {
            return Err(PulseError::Validation(format!(
                "no index '{}' on collection '{}'",
                index, collection
            )));
        }

        let conn = self.conn()?.lock().await;
        let sql = format!(
            "SELECT payload FROM {} WHERE {} = ?1",
            collection.table(),
            index
        );
        let mut stmt = conn.prepare(&sql)?;
        let payloads = stmt
            .query_map(params![value], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(PulseError::from))
            .collect()
    }

    /// Delete a record by primary key; a no-op (not an error) when absent.
    pub async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        let conn = self.conn()?.lock().await;
        let sql = format!("DELETE FROM {} WHERE key = ?1", collection.table());
        conn.execute(&sql, params![key])?;
        Ok(())
    }

    /// Wipe every collection. Sign-out/reset flows only.
    pub async fn clear_all(&self) -> Result<()> {
        let conn = self.conn()?.lock().await;
        conn.execute_batch(
            "DELETE FROM profiles;
             DELETE FROM observations;
             DELETE FROM provider_links;
             DELETE FROM reminders;
             DELETE FROM sync_queue;",
        )?;
        tracing::info!("Local store cleared");
        Ok(())
    }

    /// Observations for a user, newest first, optionally filtered by metric.
    pub async fn observations_for_user(
        &self,
        user_id: &str,
        metric: Option<MetricKind>,
    ) -> Result<Vec<Observation>> {
        let mut observations: Vec<Observation> = self
            .query_by_index(Collection::Observations, "user_id", user_id)
            .await?;
        if let Some(metric) = metric {
            observations.retain(|obs| obs.metric == metric);
        }
        observations.sort_by(|a, b| b.ts.cmp(&a.ts));
        Ok(observations)
    }

    // --- Sync queue operations ---

    /// Append an entry to the sync queue.
    pub async fn enqueue_entry(&self, entry: &QueueEntry) -> Result<()> {
        self.put(Collection::SyncQueue, &entry.id, entry).await
    }

    /// Full queue in enqueue (FIFO) order.
    pub async fn queue_entries(&self) -> Result<Vec<QueueEntry>> {
        let conn = self.conn()?.lock().await;
        let mut stmt =
            conn.prepare("SELECT payload FROM sync_queue ORDER BY enqueued_at ASC, rowid ASC")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(PulseError::from))
            .collect()
    }

    /// Remove a queue entry; no-op when absent.
    pub async fn remove_entry(&self, entry_id: &str) -> Result<()> {
        self.delete(Collection::SyncQueue, entry_id).await
    }

    /// Increment an entry's retry counter in place. The entry keeps its
    /// enqueue timestamp and therefore its queue position.
    pub async fn bump_retry(&self, entry_id: &str) -> Result<()> {
        let entry: Option<QueueEntry> = self.get(Collection::SyncQueue, entry_id).await?;
        if let Some(mut entry) = entry {
            entry.retries += 1;
            self.put(Collection::SyncQueue, entry_id, &entry).await?;
        }
        Ok(())
    }
}

/// Extract a secondary-index column as text from the serialized record.
fn index_text(value: &serde_json::Value, field: &str) -> Option<String> {
    match value.get(field) {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}
