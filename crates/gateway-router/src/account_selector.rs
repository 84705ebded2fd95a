//! # Account Selector
//!
//! Picks a credential per attempt and drives retry/failover across a
//! vendor's credential pool, extending [`crate::retry`]'s "retry the stream
//! factory" idiom from a fixed backoff loop into a loop that also rotates
//! which upstream account is used on each attempt.
//!
//! [`AccountSelector::with_credential`] is the single entry point request
//! workers call: it maintains a `tried` set for the current request, asks
//! the store for a random untried active credential, and classifies the
//! operation's outcome to decide whether to quarantine the credential,
//! force a token refresh, or give up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use gateway_auth::TokenRefresher;
use gateway_core::credential::{Credential, Vendor};
use gateway_core::errors::GatewayError;
use gateway_core::ids::CredentialId;
use gateway_store::CredentialStore;

/// Default ceiling on distinct credentials tried for one request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default interval after which the process-wide excluded (quota-exhausted)
/// set is cleared.
pub const DEFAULT_EXCLUDE_RESET_INTERVAL: Duration = Duration::from_secs(3600);

/// `gateway-core` has no dependency on `gateway-store` (the store depends on
/// core, not the reverse), so there is no blanket `From` conversion between
/// their error types. This crate sits above both and bridges them.
fn store_err(err: gateway_store::StoreError) -> GatewayError {
    GatewayError::UpstreamTransient { status: None, message: err.to_string() }
}

/// Outcome an attempt callback reports back to the selector.
///
/// Distinct from [`GatewayError`] because the selector needs to decide
/// *before* the request is considered finished whether to quarantine the
/// credential, retry with a fresh token, or move on — a caller reports its
/// raw classification here and the selector does the bookkeeping.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// The operation succeeded.
    Success(T),
    /// The credential is out of quota (HTTP 429 or a quota/limit/exceeded
    /// message). Quarantined immediately; the selector moves to the next
    /// credential without counting this as a generic error.
    QuotaExceeded,
    /// The credential was rejected (HTTP 401/403). The selector will force
    /// a token refresh and retry once on the same credential before giving
    /// up on it.
    AuthRejected,
    /// A transient failure (network, timeout, 5xx) worth retrying with a
    /// different credential.
    Transient(GatewayError),
    /// A failure that would not be helped by retrying or switching
    /// credentials; propagated to the caller immediately.
    Fatal(GatewayError),
}

/// Chooses credentials and drives vendor-level failover.
pub struct AccountSelector {
    store: CredentialStore,
    refresher: Arc<TokenRefresher>,
    excluded: DashMap<(Vendor, CredentialId), Instant>,
    max_retries: u32,
    exclude_reset_interval: Duration,
}

impl AccountSelector {
    /// Build a selector over the given store and token refresher.
    #[must_use]
    pub fn new(store: CredentialStore, refresher: Arc<TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            excluded: DashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            exclude_reset_interval: DEFAULT_EXCLUDE_RESET_INTERVAL,
        }
    }

    /// Override the default retry ceiling (mainly for tests).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Drop every process-wide quota exclusion older than
    /// `exclude_reset_interval`. Intended to be called on a periodic timer
    /// by the server's background tasks.
    pub fn sweep_excluded(&self) {
        let now = Instant::now();
        self.excluded
            .retain(|_, excluded_at| now.duration_since(*excluded_at) < self.exclude_reset_interval);
    }

    fn is_excluded(&self, vendor: Vendor, id: &CredentialId) -> bool {
        self.excluded.contains_key(&(vendor, id.clone()))
    }

    fn exclude(&self, vendor: Vendor, id: CredentialId) {
        self.excluded.insert((vendor, id), Instant::now());
    }

    /// Run `op` against a rotating set of credentials for `vendor` until it
    /// succeeds, every active credential has been tried, or a fatal error
    /// is reported.
    ///
    /// `op` is called once per attempt with the selected credential and its
    /// current valid access token; it reports an [`AttemptOutcome`] rather
    /// than a plain `Result` so the selector can distinguish "quarantine and
    /// move on" from "retry this very credential with a fresh token" from
    /// "give up entirely".
    pub async fn with_credential<T, F, Fut>(
        &self,
        vendor: Vendor,
        mut op: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut(Credential, String) -> Fut,
        Fut: std::future::Future<Output = AttemptOutcome<T>>,
    {
        let mut tried: Vec<CredentialId> = Vec::new();

        for _ in 0..self.max_retries {
            let exclude_ids: Vec<CredentialId> = tried
                .iter()
                .cloned()
                .chain(
                    self.excluded
                        .iter()
                        .filter(|entry| entry.key().0 == vendor)
                        .map(|entry| entry.key().1.clone()),
                )
                .collect();

            let Some(credential) = self.store.get_random_active(vendor, exclude_ids).await.map_err(store_err)? else {
                return Err(GatewayError::NoCredentialAvailable { vendor: vendor.to_string() });
            };

            tried.push(credential.id.clone());

            let token = match self.refresher.get_valid_access_token(&credential, false).await {
                Ok(token) => token,
                Err(err) => {
                    let _ = self.store.increment_error_count(credential.id.clone(), err.to_string()).await;
                    return Err(GatewayError::TokenRefreshFailed { status: None, message: err.to_string() });
                }
            };

            match op(credential.clone(), token).await {
                AttemptOutcome::Success(value) => {
                    self.store.increment_use_count(credential.id).await.map_err(store_err)?;
                    return Ok(value);
                }
                AttemptOutcome::QuotaExceeded => {
                    self.store.mark_quota_exhausted(credential.id.clone(), None).await.map_err(store_err)?;
                    self.exclude(vendor, credential.id);
                }
                AttemptOutcome::AuthRejected => {
                    self.store.increment_error_count(credential.id.clone(), "auth rejected (401/403)".into()).await.map_err(store_err)?;
                    if self.refresher.get_valid_access_token(&credential, true).await.is_ok() {
                        // Refreshed: give this same credential one more
                        // direct shot before falling through to the pool.
                        tried.pop();
                    }
                }
                AttemptOutcome::Transient(err) => {
                    self.store.increment_error_count(credential.id, err.to_string()).await.map_err(store_err)?;
                    if !err.is_retryable() {
                        return Err(err);
                    }
                }
                AttemptOutcome::Fatal(err) => return Err(err),
            }
        }

        Err(GatewayError::NoCredentialAvailable { vendor: vendor.to_string() })
    }
}
