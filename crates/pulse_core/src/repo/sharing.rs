//! Sharing repository
//!
//! Provider links follow the common offline-first pattern. Pairing tokens
//! do not: they mint short-lived server-side state, so token operations are
//! online-only and are never written through or queued.

use crate::net::ConnectivityMonitor;
use crate::remote::{MutationQueue, SharingRemote};
use crate::store::LocalStore;
use chrono::{Duration, Utc};
use pulse_common::{
    Collection, LinkToken, ProviderLink, PulseError, QueueOp, RemoteError, RemoteResult, Result,
    SharingFlags,
};
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

/// Pairing codes expire after this many minutes.
const TOKEN_TTL_MINUTES: i64 = 15;

/// CRUD-shaped operations for the `provider_links` collection plus the
/// online-only pairing-token flows.
pub struct SharingRepository {
    store: Arc<LocalStore>,
    remote: Arc<dyn SharingRemote>,
    net: ConnectivityMonitor,
    queue: Arc<dyn MutationQueue>,
}

impl SharingRepository {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn SharingRemote>,
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

    /// Links where the user is the provider.
    pub async fn links_for_provider(&self, provider_id: &str) -> Result<Vec<ProviderLink>> {
        if self.net.is_online() {
            match self.remote.links_for_provider(provider_id).await {
                Ok(links) => {
                    for link in &links {
                        self.store
                            .put(Collection::ProviderLinks, &link.id, link)
                            .await?;
                    }
                    return Ok(links);
                }
                Err(e) => {
                    tracing::debug!(provider_id, error = %e, "Link read falling back to local store");
                }
            }
        }

        self.store
            .query_by_index(Collection::ProviderLinks, "provider_id", provider_id)
            .await
    }

    /// Links where the user is the patient.
    pub async fn links_for_patient(&self, patient_id: &str) -> Result<Vec<ProviderLink>> {
        if self.net.is_online() {
            match self.remote.links_for_patient(patient_id).await {
                Ok(links) => {
                    for link in &links {
                        self.store
                            .put(Collection::ProviderLinks, &link.id, link)
                            .await?;
                    }
                    return Ok(links);
                }
                Err(e) => {
                    tracing::debug!(patient_id, error = %e, "Link read falling back to local store");
                }
            }
        }

        self.store
            .query_by_index(Collection::ProviderLinks, "patient_id", patient_id)
            .await
    }

    /// Merge a sharing-flag update over the last known local link.
    pub async fn update_sharing(&self, link_id: &str, flags: SharingFlags) -> Result<ProviderLink> {
        let local: Option<ProviderLink> =
            self.store.get(Collection::ProviderLinks, link_id).await?;
        let mut merged = local.ok_or_else(|| {
            PulseError::Validation(format!("no local provider link '{}'", link_id))
        })?;
        merged.apply(&flags);

        self.store
            .put(Collection::ProviderLinks, link_id, &merged)
            .await?;

        if self.net.is_online() {
            match self.remote.update_flags(link_id, &flags).await {
                Ok(remote) => {
                    self.store
                        .put(Collection::ProviderLinks, &remote.id, &remote)
                        .await?;
                    return Ok(remote);
                }
                Err(e) => {
                    tracing::debug!(link_id, error = %e, "Sharing update deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::ProviderLinks,
                QueueOp::Update,
                serde_json::json!({ "id": link_id, "patch": flags }),
            )
            .await?;
        Ok(merged)
    }

    /// Revoke a link. Delete-on-confirmation: the local copy stays until
    /// the remote acknowledges the delete.
    pub async fn revoke_link(&self, link_id: &str) -> Result<()> {
        if self.net.is_online() {
            match self.remote.delete_link(link_id).await {
                Ok(()) => {
                    self.store.delete(Collection::ProviderLinks, link_id).await?;
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(link_id, error = %e, "Link revoke deferred to sync queue");
                }
            }
        }

        self.queue
            .enqueue(
                Collection::ProviderLinks,
                QueueOp::Delete,
                serde_json::json!({ "id": link_id }),
            )
            .await?;
        Ok(())
    }

    /// Mint a 6-digit pairing code for a provider. Online-only.
    pub async fn create_token(&self, provider_id: &str) -> RemoteResult<LinkToken> {
        if !self.net.is_online() {
            return Err(RemoteError::Unreachable("offline".to_string()));
        }

        let token = LinkToken {
            id: Uuid::new_v4().to_string(),
            provider_id: provider_id.to_string(),
            code: format!("{:06}", rand::thread_rng().gen_range(100_000..1_000_000)),
            expires_at: Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES),
            used: false,
            created_at: None,
        };
        self.remote.create_token(&token).await
    }

    /// Redeem a pairing code as a patient. Online-only; the resulting link
    /// is cached locally on success.
    pub async fn redeem_token(&self, code: &str, patient_id: &str) -> RemoteResult<ProviderLink> {
        if !self.net.is_online() {
            return Err(RemoteError::Unreachable("offline".to_string()));
        }

        let link = self.remote.redeem_token(code, patient_id).await?;
        if let Err(e) = self
            .store
            .put(Collection::ProviderLinks, &link.id, &link)
            .await
        {
            tracing::warn!(link_id = %link.id, error = %e, "Failed to cache redeemed link");
        }
        Ok(link)
    }

    /// Unexpired, unused codes for a provider. Online-only.
    pub async fn active_tokens(&self, provider_id: &str) -> RemoteResult<Vec<LinkToken>> {
        if !self.net.is_online() {
            return Err(RemoteError::Unreachable("offline".to_string()));
        }
        self.remote.active_tokens(provider_id).await
    }
}
