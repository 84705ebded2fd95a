//! [`CredentialStore`]: the async facade the rest of the gateway talks to.
//!
//! `rusqlite` is synchronous, so every method borrows a connection from the
//! pool and runs its query inside [`tokio::task::spawn_blocking`]. Callers
//! never see a blocking call.

use gateway_core::credential::{Credential, RateLimits, Vendor};
use gateway_core::ids::CredentialId;

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::ConnectionPool;
use crate::sqlite::repositories::credential::DEFAULT_ERROR_THRESHOLD;
use crate::sqlite::repositories::{ApiKeyRepository, ApiLogRepository, CredentialRepository};

/// Credential pool, API key table, and request log, backed by one `SQLite`
/// connection pool.
#[derive(Clone)]
pub struct CredentialStore {
    pool: ConnectionPool,
    error_threshold: u32,
}

impl CredentialStore {
    /// Wrap an already-migrated connection pool.
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }

    /// Override the consecutive-error quarantine threshold (default 5).
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(StoreError::Pool)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("blocking task panicked: {e}")))?
    }

    pub async fn get_all(&self, vendor: Vendor) -> Result<Vec<Credential>> {
        self.run(move |conn| CredentialRepository.get_all(conn, vendor)).await
    }

    pub async fn get_active(&self, vendor: Vendor) -> Result<Vec<Credential>> {
        self.run(move |conn| CredentialRepository.get_active(conn, vendor)).await
    }

    pub async fn get_random_active(
        &self,
        vendor: Vendor,
        exclude_ids: Vec<CredentialId>,
    ) -> Result<Option<Credential>> {
        self.run(move |conn| CredentialRepository.get_random_active(conn, vendor, &exclude_ids))
            .await
    }

    pub async fn get_by_id(&self, id: CredentialId) -> Result<Credential> {
        self.run(move |conn| CredentialRepository.get_by_id(conn, &id)).await
    }

    pub async fn add(&self, credential: Credential) -> Result<CredentialId> {
        self.run(move |conn| CredentialRepository.add(conn, &credential)).await
    }

    pub async fn update(&self, credential: Credential) -> Result<()> {
        self.run(move |conn| CredentialRepository.update(conn, &credential)).await
    }

    pub async fn update_token(&self, id: CredentialId, access_token: String, expires_at: String) -> Result<()> {
        self.run(move |conn| CredentialRepository.update_token(conn, &id, &access_token, &expires_at))
            .await
    }

    pub async fn update_quota(
        &self,
        id: CredentialId,
        quota_limit: Option<u64>,
        quota_used: Option<u64>,
    ) -> Result<()> {
        self.run(move |conn| CredentialRepository.update_quota(conn, &id, quota_limit, quota_used))
            .await
    }

    pub async fn update_rate_limits(&self, id: CredentialId, rate_limits: RateLimits) -> Result<()> {
        self.run(move |conn| CredentialRepository.update_rate_limits(conn, &id, &rate_limits))
            .await
    }

    pub async fn increment_use_count(&self, id: CredentialId) -> Result<()> {
        self.run(move |conn| CredentialRepository.increment_use_count(conn, &id)).await
    }

    /// Returns `true` if this call crossed the quarantine threshold.
    pub async fn increment_error_count(&self, id: CredentialId, message: String) -> Result<bool> {
        let threshold = self.error_threshold;
        self.run(move |conn| CredentialRepository.increment_error_count(conn, &id, &message, threshold))
            .await
    }

    pub async fn mark_quota_exhausted(&self, id: CredentialId, until: Option<String>) -> Result<()> {
        self.run(move |conn| CredentialRepository.mark_quota_exhausted(conn, &id, until.as_deref()))
            .await
    }

    pub async fn move_to_error(&self, id: CredentialId, reason: String) -> Result<()> {
        self.run(move |conn| CredentialRepository.move_to_error(conn, &id, &reason)).await
    }

    pub async fn restore_from_error(&self, id: CredentialId, new_refresh_token: Option<String>) -> Result<()> {
        self.run(move |conn| {
            CredentialRepository.restore_from_error(conn, &id, new_refresh_token.as_deref())
        })
        .await
    }

    pub async fn delete(&self, id: CredentialId) -> Result<()> {
        self.run(move |conn| CredentialRepository.delete(conn, &id)).await
    }

    /// Look up an active API key by its raw (unhashed) value.
    pub async fn find_api_key(&self, raw_key: String) -> Result<Option<crate::sqlite::repositories::api_key::ApiKeyRecord>> {
        let hash = crate::hashing::hash_api_key(&raw_key);
        self.run(move |conn| ApiKeyRepository.get_by_hash(conn, &hash)).await
    }

    /// Register a new API key, returning its assigned row ID.
    pub async fn add_api_key(&self, raw_key: String, label: String) -> Result<i64> {
        let hash = crate::hashing::hash_api_key(&raw_key);
        self.run(move |conn| ApiKeyRepository.add(conn, &hash, &label)).await
    }

    /// Append one completed request to the request log.
    #[allow(clippy::too_many_arguments)]
    pub async fn log_request(
        &self,
        request_id: String,
        vendor: Vendor,
        model: String,
        endpoint: String,
        status_code: u16,
        latency_ms: u64,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    ) -> Result<()> {
        self.run(move |conn| {
            ApiLogRepository.insert(
                conn,
                &request_id,
                vendor.as_str(),
                &model,
                &endpoint,
                status_code,
                latency_ms,
                input_tokens,
                output_tokens,
            )
        })
        .await
    }
}
