//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the on-disk
//! JSON config file format. Each type implements [`Default`] with production
//! default values. Types marked with `#[serde(default)]` allow partial JSON —
//! missing fields get their default value during deserialization.

use serde::{Deserialize, Serialize};

/// Root settings type for the gateway.
///
/// Loaded from `~/.ai-gateway/settings.json` with defaults applied for
/// missing fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// All field names are camelCase. Example:
///
/// ```json
/// {
///   "version": "0.1.0",
///   "server": { "port": 9090 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Settings schema version.
    pub version: String,
    /// Server network settings.
    pub server: ServerSettings,
    /// Credential store settings.
    pub store: StoreSettings,
    /// Account selector / failover settings.
    pub selector: SelectorSettings,
    /// Token refresh settings.
    pub refresher: RefresherSettings,
    /// Background quota refresher settings.
    pub quota_refresher: QuotaRefresherSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            store: StoreSettings::default(),
            selector: SelectorSettings::default(),
            refresher: RefresherSettings::default(),
            quota_refresher: QuotaRefresherSettings::default(),
        }
    }
}

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// HTTP server port.
    pub port: u16,
    /// Health/metrics HTTP port (may equal `port`, mirroring the main router).
    pub health_port: u16,
    /// Bind address.
    pub host: String,
    /// Request body size limit in bytes.
    pub max_body_bytes: usize,
    /// Non-streaming request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Grace period before aborting in-flight work on client disconnect, in
    /// milliseconds.
    pub cancellation_grace_period_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            health_port: 8080,
            host: "0.0.0.0".to_string(),
            max_body_bytes: 1_048_576,
            request_timeout_ms: 300_000,
            cancellation_grace_period_ms: 2_000,
        }
    }
}

/// Credential store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Path to the `SQLite` database file.
    pub sqlite_path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Consecutive error count after which a credential is quarantined.
    pub error_quarantine_threshold: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "gateway.db".to_string(),
            pool_size: 16,
            error_quarantine_threshold: 5,
        }
    }
}

/// Account selector / failover settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorSettings {
    /// Maximum credential attempts per request.
    pub max_retries: u32,
    /// How long a quota-exhausted credential stays excluded, in seconds.
    pub exclude_reset_interval_secs: u64,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            exclude_reset_interval_secs: 3_600,
        }
    }
}

/// Token refresh settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefresherSettings {
    /// Refresh a token this many seconds before it actually expires.
    pub refresh_skew_secs: i64,
}

impl Default for RefresherSettings {
    fn default() -> Self {
        Self {
            refresh_skew_secs: 300,
        }
    }
}

/// Background quota refresher settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotaRefresherSettings {
    /// Delay before the first pass, in seconds.
    pub initial_delay_secs: u64,
    /// Interval between passes, in seconds.
    pub interval_secs: u64,
    /// Delay between credentials within one vendor, in seconds.
    pub intra_vendor_delay_secs: u64,
    /// Delay between vendors, in seconds.
    pub inter_vendor_delay_secs: u64,
    /// Log a warning below this fraction of quota remaining.
    pub low_quota_threshold: f64,
    /// Log a critical warning below this fraction of quota remaining.
    pub critical_quota_threshold: f64,
}

impl Default for QuotaRefresherSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 60,
            interval_secs: 300,
            intra_vendor_delay_secs: 2,
            inter_vendor_delay_secs: 5,
            low_quota_threshold: 0.20,
            critical_quota_threshold: 0.05,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_version() {
        let s = GatewaySettings::default();
        assert_eq!(s.version, "0.1.0");
    }

    #[test]
    fn default_settings_serde_roundtrip() {
        let defaults = GatewaySettings::default();
        let json = serde_json::to_string(&defaults).unwrap();
        let back: GatewaySettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.port, defaults.server.port);
        assert_eq!(back.selector.max_retries, defaults.selector.max_retries);
    }

    #[test]
    fn default_settings_json_field_names() {
        let defaults = GatewaySettings::default();
        let json = serde_json::to_value(&defaults).unwrap();
        let server = json.get("server").unwrap();
        assert!(server.get("healthPort").is_some());
        let selector = json.get("selector").unwrap();
        assert!(selector.get("maxRetries").is_some());
    }

    #[test]
    fn empty_json_produces_defaults() {
        let settings: GatewaySettings = serde_json::from_str("{}").unwrap();
        let defaults = GatewaySettings::default();
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(settings.selector.max_retries, defaults.selector.max_retries);
    }

    #[test]
    fn partial_json_overrides() {
        let json = serde_json::json!({
            "server": { "port": 9090 },
            "selector": { "maxRetries": 5 }
        });
        let settings: GatewaySettings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.selector.max_retries, 5);
        assert_eq!(settings.server.health_port, 8080);
        assert_eq!(settings.selector.exclude_reset_interval_secs, 3_600);
    }

    #[test]
    fn quota_refresher_defaults() {
        let q = QuotaRefresherSettings::default();
        assert_eq!(q.initial_delay_secs, 60);
        assert!((q.low_quota_threshold - 0.20).abs() < f64::EPSILON);
    }
}
