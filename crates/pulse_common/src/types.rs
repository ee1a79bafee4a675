//! Record collections and sync-queue types shared across PulseSync crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix used for locally-synthesized identifiers that the remote store
/// has not yet replaced with permanent ones.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Synthesize a temporary record identifier.
pub fn local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

/// True if the identifier was synthesized locally and is awaiting a
/// remote-assigned replacement.
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// User role within the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Provider,
}

/// Fixed enumeration of tracked health metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Bp,
    Glucose,
    Spo2,
    Hr,
    Pain,
    Weight,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Bp,
        MetricKind::Glucose,
        MetricKind::Spo2,
        MetricKind::Hr,
        MetricKind::Pain,
        MetricKind::Weight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Bp => "bp",
            MetricKind::Glucose => "glucose",
            MetricKind::Spo2 => "spo2",
            MetricKind::Hr => "hr",
            MetricKind::Pain => "pain",
            MetricKind::Weight => "weight",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per user identity; key = user id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial-update body for a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Profile {
    /// Merge a partial update over the last known value.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(language) = &patch.language {
            self.language = Some(language.clone());
        }
        if let Some(full_name) = &patch.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(dob) = &patch.date_of_birth {
            self.date_of_birth = Some(dob.clone());
        }
        if let Some(country) = &patch.country {
            self.country = Some(country.clone());
        }
    }
}

/// Time-series health reading; key = record id
///
/// A `bp` observation carries the systolic/diastolic pair and never a single
/// numeric value; every other metric carries `numeric_value` + `unit` and
/// never the pair. [`Observation::validate`] enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub user_id: String,
    pub metric: MetricKind,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Observation {
    /// Check the dual-vs-single numeric invariant for this metric kind.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.is_empty() {
            return Err("observation owner id must not be empty".to_string());
        }
        match self.metric {
            MetricKind::Bp => {
                if self.systolic.is_none() || self.diastolic.is_none() {
                    return Err("bp observation requires systolic and diastolic".to_string());
                }
                if self.numeric_value.is_some() {
                    return Err("bp observation must not carry a single numeric value".to_string());
                }
            }
            _ => {
                if self.numeric_value.is_none() {
                    return Err(format!("{} observation requires a numeric value", self.metric));
                }
                if self.systolic.is_some() || self.diastolic.is_some() {
                    return Err(format!(
                        "{} observation must not carry systolic/diastolic",
                        self.metric
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Many-to-many relation between a provider and a patient, with one
/// independent sharing flag per metric kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub id: String,
    pub provider_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub share_bp: bool,
    #[serde(default)]
    pub share_glucose: bool,
    #[serde(default)]
    pub share_spo2: bool,
    #[serde(default)]
    pub share_hr: bool,
    #[serde(default)]
    pub share_pain: bool,
    #[serde(default)]
    pub share_weight: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProviderLink {
    pub fn shares(&self, metric: MetricKind) -> bool {
        match metric {
            MetricKind::Bp => self.share_bp,
            MetricKind::Glucose => self.share_glucose,
            MetricKind::Spo2 => self.share_spo2,
            MetricKind::Hr => self.share_hr,
            MetricKind::Pain => self.share_pain,
            MetricKind::Weight => self.share_weight,
        }
    }

    /// Merge a partial flag update over the current link.
    pub fn apply(&mut self, flags: &SharingFlags) {
        if let Some(v) = flags.share_bp {
            self.share_bp = v;
        }
        if let Some(v) = flags.share_glucose {
            self.share_glucose = v;
        }
        if let Some(v) = flags.share_spo2 {
            self.share_spo2 = v;
        }
        if let Some(v) = flags.share_hr {
            self.share_hr = v;
        }
        if let Some(v) = flags.share_pain {
            self.share_pain = v;
        }
        if let Some(v) = flags.share_weight {
            self.share_weight = v;
        }
    }
}

/// Partial-update body for the six sharing flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharingFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_bp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_glucose: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_spo2: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_hr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_pain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_weight: Option<bool>,
}

/// Short-lived 6-digit pairing code minted by a provider.
///
/// Tokens are server-side state only; they are never written to the local
/// store and never queued for sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkToken {
    pub id: String,
    pub provider_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Scheduled notification definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub local_time: Option<String>,
    #[serde(default)]
    pub days: Option<Vec<String>>,
    pub enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial-update body for a reminder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Reminder {
    pub fn apply(&mut self, patch: &ReminderPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(local_time) = &patch.local_time {
            self.local_time = Some(local_time.clone());
        }
        if let Some(days) = &patch.days {
            self.days = Some(days.clone());
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
    }
}

/// Named local record collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Profiles,
    Observations,
    ProviderLinks,
    Reminders,
    SyncQueue,
}

impl Collection {
    /// SQLite table name for this collection.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Observations => "observations",
            Collection::ProviderLinks => "provider_links",
            Collection::Reminders => "reminders",
            Collection::SyncQueue => "sync_queue",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Kind of pending mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOp {
    Create,
    Update,
    Delete,
}

/// One pending mutation intent awaiting remote application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Synthetic entry id
    pub id: String,
    pub op: QueueOp,
    pub collection: Collection,
    /// The record, the partial-update body, or `{"id": ...}` for deletes
    pub payload: serde_json::Value,
    /// Enqueue timestamp, epoch milliseconds; drain order is ascending
    pub enqueued_at: i64,
    /// Only ever increases; never reset
    pub retries: u32,
}

impl QueueEntry {
    pub fn new(collection: Collection, op: QueueOp, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op,
            collection,
            payload,
            enqueued_at: Utc::now().timestamp_millis(),
            retries: 0,
        }
    }
}
