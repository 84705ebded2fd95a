//! Background Quota Refresher — walks each vendor's active credential pool on
//! an interval, refreshes tokens nearing expiry, and logs low/critical quota
//! warnings from whatever rate-limit/quota fields the last live request left
//! on the credential record. No vendor here exposes a standalone quota
//! probe endpoint, so this is the passive half of quota tracking; the active
//! half is [`gateway_auth::TokenRefresher`] and each adapter's
//! `persist_rate_limits` writing those fields after every real request.

use std::sync::Arc;
use std::time::Duration;

use gateway_auth::TokenRefresher;
use gateway_config::types::QuotaRefresherSettings;
use gateway_core::credential::{Credential, Vendor};
use gateway_core::errors::ErrorCollector;
use gateway_store::CredentialStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const VENDORS: [Vendor; 3] = [Vendor::Anthropic, Vendor::Vertex, Vendor::Warp];

pub struct QuotaRefresher {
    store: CredentialStore,
    refresher: Arc<TokenRefresher>,
    settings: QuotaRefresherSettings,
}

impl QuotaRefresher {
    pub fn new(store: CredentialStore, refresher: Arc<TokenRefresher>, settings: QuotaRefresherSettings) -> Self {
        Self { store, refresher, settings }
    }

    /// Spawn the background task. Exits when `shutdown` is cancelled.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(self.settings.initial_delay_secs)) => {}
                _ = shutdown.cancelled() => return,
            }

            loop {
                let pass_started = tokio::time::Instant::now();
                self.run_pass().await;
                let elapsed = pass_started.elapsed();
                let interval = Duration::from_secs(self.settings.interval_secs);

                // Skip straight to the next tick if a pass ran long, rather
                // than stacking overlapping passes against the same pool.
                let sleep_for = interval.saturating_sub(elapsed);
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {}
                    _ = shutdown.cancelled() => return,
                }
            }
        })
    }

    async fn run_pass(&self) {
        let mut errors = ErrorCollector::new();
        metrics::counter!(crate::metrics::QUOTA_REFRESHER_SWEEPS_TOTAL).increment(1);

        for (i, vendor) in VENDORS.iter().enumerate() {
            self.refresh_vendor(*vendor, &mut errors).await;
            if i + 1 < VENDORS.len() {
                tokio::time::sleep(Duration::from_secs(self.settings.inter_vendor_delay_secs)).await;
            }
        }

        if errors.has_errors() {
            warn!(count = errors.count(), "quota refresher pass completed with errors");
        } else {
            info!("quota refresher pass completed");
        }
    }

    async fn refresh_vendor(&self, vendor: Vendor, errors: &mut ErrorCollector) {
        let credentials = match self.store.get_active(vendor).await {
            Ok(creds) => creds,
            Err(err) => {
                warn!(%vendor, error = %err, "failed to list active credentials for quota refresh");
                metrics::counter!(crate::metrics::QUOTA_REFRESHER_ERRORS_TOTAL, "vendor" => vendor.to_string()).increment(1);
                return;
            }
        };

        let mut low_quota = 0u64;
        for (i, credential) in credentials.iter().enumerate() {
            if let Err(err) = self.refresher.get_valid_access_token(credential, false).await {
                warn!(%vendor, credential_id = %credential.id, error = %err, "background token refresh failed");
                errors.collect(gateway_core::errors::GatewayError::TokenRefreshFailed { status: None, message: err.to_string() });
                metrics::counter!(crate::metrics::QUOTA_REFRESHER_ERRORS_TOTAL, "vendor" => vendor.to_string()).increment(1);
            }

            if self.log_quota_state(credential) {
                low_quota += 1;
            }

            if i + 1 < credentials.len() {
                tokio::time::sleep(Duration::from_secs(self.settings.intra_vendor_delay_secs)).await;
            }
        }

        metrics::gauge!(crate::metrics::CREDENTIALS_LOW_QUOTA, "vendor" => vendor.to_string()).set(low_quota as f64);
    }

    /// Returns true if the credential is below the low-quota threshold.
    fn log_quota_state(&self, credential: &Credential) -> bool {
        let (Some(limit), Some(used)) = (credential.quota_limit, credential.quota_used) else {
            return false;
        };
        if limit == 0 {
            return false;
        }
        let remaining_fraction = 1.0 - (used as f64 / limit as f64);
        if remaining_fraction <= self.settings.critical_quota_threshold {
            warn!(
                credential_id = %credential.id,
                vendor = %credential.vendor,
                remaining_fraction,
                "credential quota critically low"
            );
            true
        } else if remaining_fraction <= self.settings.low_quota_threshold {
            warn!(
                credential_id = %credential.id,
                vendor = %credential.vendor,
                remaining_fraction,
                "credential quota low"
            );
            true
        } else {
            false
        }
    }
}
