//! [`TokenRefresher`]: the single entry point the Account Selector calls to
//! get a valid bearer token for a credential, refreshing it first if
//! necessary.
//!
//! Refreshes are serialized per credential via a lock table keyed by
//! [`CredentialId`] — two concurrent requests picking the same expired
//! credential must not both call the upstream token endpoint, since most
//! providers invalidate the previous refresh token on rotation.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use gateway_core::credential::{Credential, Vendor};
use gateway_core::ids::CredentialId;
use gateway_store::CredentialStore;
use tokio::sync::Mutex;

use crate::errors::AuthError;
use crate::{anthropic, vertex, warp};

/// Refreshes upstream OAuth/JWT tokens and persists them to the credential
/// store.
pub struct TokenRefresher {
    store: CredentialStore,
    http: reqwest::Client,
    locks: DashMap<CredentialId, Arc<Mutex<()>>>,
}

impl TokenRefresher {
    /// Build a refresher over the given credential store.
    #[must_use]
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, id: &CredentialId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Get a valid access token for this credential, refreshing it first if
    /// it is expired, missing, or `force_refresh` is set.
    ///
    /// Holds a per-credential lock for the duration of any refresh, so a
    /// second caller racing on the same credential blocks until the first
    /// refresh completes and then observes the refreshed token rather than
    /// triggering a second, conflicting refresh.
    #[tracing::instrument(skip_all, fields(credential_id = %credential.id, vendor = %credential.vendor))]
    pub async fn get_valid_access_token(
        &self,
        credential: &Credential,
        force_refresh: bool,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        if !force_refresh && !credential.is_token_expired(now) {
            if let Some(token) = &credential.access_token {
                return Ok(token.clone());
            }
        }

        let lock = self.lock_for(&credential.id);
        let _guard = lock.lock().await;

        // Re-read after acquiring the lock: another task may have already
        // refreshed this credential while we were waiting.
        let fresh = self.store.get_by_id(credential.id.clone()).await?;
        if !force_refresh && !fresh.is_token_expired(Utc::now()) {
            if let Some(token) = &fresh.access_token {
                return Ok(token.clone());
            }
        }

        let (access_token, refresh_token, expires_at) = self.refresh_upstream(&fresh).await?;
        self.store
            .update_token(fresh.id.clone(), access_token.clone(), expires_at.to_rfc3339())
            .await?;
        if let Some(new_refresh_token) = refresh_token {
            let mut updated = self.store.get_by_id(fresh.id.clone()).await?;
            updated.refresh_token = Some(new_refresh_token);
            self.store.update(updated).await?;
        }
        Ok(access_token)
    }

    async fn refresh_upstream(
        &self,
        credential: &Credential,
    ) -> Result<(String, Option<String>, chrono::DateTime<Utc>), AuthError> {
        match credential.vendor {
            Vendor::Anthropic => {
                let refresh_token = credential
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| AuthError::MissingField("refresh_token".into()))?;
                let tokens = anthropic::refresh(&self.http, refresh_token).await?;
                Ok((tokens.access_token, Some(tokens.refresh_token), tokens.expires_at))
            }
            Vendor::Vertex => {
                let client_email = credential
                    .client_id
                    .as_deref()
                    .ok_or_else(|| AuthError::MissingField("client_id (service account email)".into()))?;
                let private_key = credential
                    .client_secret
                    .as_deref()
                    .ok_or_else(|| AuthError::MissingField("client_secret (private key)".into()))?;
                let (access_token, expires_at) =
                    vertex::exchange_assertion(&self.http, client_email, private_key).await?;
                Ok((access_token, None, expires_at))
            }
            Vendor::Warp => {
                let refresh_token = credential
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| AuthError::MissingField("refresh_token".into()))?;
                let api_key = credential
                    .client_id
                    .as_deref()
                    .ok_or_else(|| AuthError::MissingField("client_id (Firebase API key)".into()))?;
                let (id_token, rotated_refresh, expires_at) =
                    warp::refresh(&self.http, api_key, refresh_token).await?;
                Ok((id_token, Some(rotated_refresh), expires_at))
            }
        }
    }
}
