//! Credential types shared by the store, the auth refresher, and the
//! account selector.
//!
//! A [`Credential`] is a row in the `credentials` table: one operator
//! account for one vendor, with its refresh state, quota bookkeeping, and
//! health counters. Vendor-specific fields that don't apply to every vendor
//! (Vertex's `project_id`/`region`, Warp's `client_id`/`client_secret`) are
//! plain `Option`s rather than a per-vendor enum, matching the flat
//! `credentials` table schema.

use serde::{Deserialize, Serialize};

use crate::ids::CredentialId;

/// Upstream vendor a credential authenticates against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Anthropic direct (Messages API, `api.anthropic.com`).
    Anthropic,
    /// GCP Vertex AI (Claude-on-Vertex `rawPredict`/`streamRawPredict` or Gemini).
    Vertex,
    /// The Warp protocol (Protobuf-over-SSE).
    Warp,
}

impl Vendor {
    /// Stable lowercase string used in table rows, log fields, and routes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Vertex => "vertex",
            Self::Warp => "warp",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anthropic" => Ok(Self::Anthropic),
            "vertex" => Ok(Self::Vertex),
            "warp" => Ok(Self::Warp),
            other => Err(format!("unknown vendor: {other}")),
        }
    }
}

/// Per-vendor rate limit snapshot parsed from upstream response headers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    /// Requests remaining in the current window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_remaining: Option<u64>,
    /// Tokens remaining in the current window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_remaining: Option<u64>,
    /// When the current window resets (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<String>,
}

/// One stored upstream operator credential.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Row ID.
    pub id: CredentialId,
    /// Upstream vendor this credential authenticates against.
    pub vendor: Vendor,
    /// Operator-facing label.
    pub name: String,
    /// Account email, when known (Anthropic OAuth, Vertex service account).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// OAuth/Firebase refresh token. Absent for API-key-only credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Current access token (API key or bearer token).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Access token expiry (RFC 3339). `None` means never expires (static API key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// GCP project ID (Vertex only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// GCP region (Vertex only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Profile ARN, reserved for future vendor support.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_arn: Option<String>,
    /// OAuth client ID (Warp/Firebase).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth client secret (Warp/Firebase).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Override for the vendor's default API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Whether the selector may pick this credential.
    pub is_active: bool,
    /// Selection weight (higher is picked more often by the weighted selector).
    pub weight: u32,
    /// Lifetime count of requests served by this credential.
    pub use_count: u64,
    /// Consecutive error count since the last success.
    pub error_count: u32,
    /// Last error message observed, for operator diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Last time this credential was selected (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
    /// Vendor-reported quota ceiling, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_limit: Option<u64>,
    /// Vendor-reported quota used so far in the current window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_used: Option<u64>,
    /// Parsed rate limit headers from the most recent response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimits>,
    /// If set, this credential is quarantined until this time (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_exhausted_until: Option<String>,
    /// Row creation time (RFC 3339).
    pub created_at: String,
    /// Row last-update time (RFC 3339).
    pub updated_at: String,
}

impl Credential {
    /// Whether the access token is missing or expired (with no refresh skew applied).
    #[must_use]
    pub fn is_token_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match &self.expires_at {
            None => false,
            Some(expires_at) => match chrono::DateTime::parse_from_rfc3339(expires_at) {
                Ok(expires) => expires.with_timezone(&chrono::Utc) <= now,
                Err(_) => true,
            },
        }
    }

    /// Whether this credential is currently quarantined due to quota exhaustion.
    #[must_use]
    pub fn is_quota_exhausted(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match &self.quota_exhausted_until {
            None => false,
            Some(until) => match chrono::DateTime::parse_from_rfc3339(until) {
                Ok(until) => until.with_timezone(&chrono::Utc) > now,
                Err(_) => false,
            },
        }
    }

    /// Whether this credential is eligible for selection right now.
    #[must_use]
    pub fn is_eligible(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.is_active && !self.is_quota_exhausted(now)
    }
}
