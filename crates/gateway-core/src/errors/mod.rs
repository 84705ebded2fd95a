//! Error hierarchy for the gateway.
//!
//! Provides a structured error type system built on [`thiserror`]:
//!
//! - [`GatewayError`]: Top-level enum covering the full taxonomy a request
//!   can fail with — client mistakes, auth failures, exhausted credential
//!   pools, upstream transient/permanent failures, refresh failures,
//!   protocol decode failures, and cancellation.
//! - [`ErrorCollector`]: Accumulates errors from fire-and-forget operations
//!   (used by the background quota refresher, which must not abort on one
//!   vendor's failure).
//!
//! The error parsing utilities in [`parse`] classify raw upstream error
//! strings into categories used to decide retry behavior.

pub mod parse;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::parse::{ErrorCategory, parse_error};

/// Top-level error type for the gateway.
///
/// Every variant maps to exactly one HTTP/SSE rendering at the response
/// boundary (see the server's error-to-response conversion), and every
/// variant is classified by [`GatewayError::is_retryable`] for the account
/// selector's failover loop.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request body (missing required field, bad enum value).
    #[error("invalid request: {0}")]
    ClientError(String),

    /// Missing, unknown, or disabled API key.
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// The account selector exhausted every active credential for a vendor.
    #[error("no available accounts for {vendor}")]
    NoCredentialAvailable {
        /// Vendor whose pool was exhausted.
        vendor: String,
    },

    /// Upstream failure that is safe to retry with a different credential
    /// (429, 5xx, timeout, connection reset).
    #[error("upstream transient error ({status:?}): {message}")]
    UpstreamTransient {
        /// HTTP status code, if the upstream responded at all.
        status: Option<u16>,
        /// Upstream-provided or synthesized message.
        message: String,
    },

    /// Upstream failure caused by the request itself; retrying with a
    /// different credential would not help.
    #[error("upstream error ({status}): {message}")]
    UpstreamPermanent {
        /// HTTP status code from the upstream.
        status: u16,
        /// Upstream-provided message.
        message: String,
    },

    /// Token exchange/refresh failed for a credential.
    #[error("token refresh failed: {message}")]
    TokenRefreshFailed {
        /// Upstream status code from the token endpoint, if any.
        status: Option<u16>,
        /// Human-readable failure reason.
        message: String,
    },

    /// A wire-format event could not be decoded or was structurally invalid
    /// (malformed SSE frame, undecodable Protobuf payload).
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The request was cancelled by the client disconnecting, or exceeded
    /// its deadline.
    #[error("request cancelled")]
    Cancellation,
}

impl GatewayError {
    /// Whether the account selector should retry this failure with a
    /// different credential.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTransient { .. } | Self::NoCredentialAvailable { .. }
        )
    }

    /// Whether this failure indicates the credential itself is bad (quota
    /// exhausted or auth rejected) and should be quarantined.
    #[must_use]
    pub fn should_quarantine_credential(&self) -> bool {
        match self {
            Self::UpstreamTransient { status: Some(429), .. } => true,
            Self::UpstreamPermanent { status: 401 | 403, .. } => true,
            Self::TokenRefreshFailed { .. } => true,
            _ => false,
        }
    }

    /// Classify a raw upstream error string (used when the upstream gives
    /// only a text body, not a structured error).
    #[must_use]
    pub fn from_upstream_message(status: Option<u16>, message: &str) -> Self {
        let parsed = parse_error(message);
        match parsed.category {
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server => {
                Self::UpstreamTransient {
                    status,
                    message: parsed.message,
                }
            }
            ErrorCategory::Authentication | ErrorCategory::Authorization => Self::AuthError(parsed.message),
            _ => Self::UpstreamPermanent {
                status: status.unwrap_or(400),
                message: parsed.message,
            },
        }
    }

    /// HTTP status code this error should be rendered as at the response
    /// boundary, for non-streaming endpoints.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ClientError(_) => 400,
            Self::AuthError(_) => 401,
            Self::NoCredentialAvailable { .. } => 503,
            Self::UpstreamTransient { .. } => 502,
            Self::UpstreamPermanent { status, .. } => *status,
            Self::TokenRefreshFailed { .. } => 502,
            Self::ProtocolError(_) => 502,
            Self::Cancellation => 499,
        }
    }

    /// Short category string for retry/error events and metrics labels.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ClientError(_) => "client",
            Self::AuthError(_) => "auth",
            Self::NoCredentialAvailable { .. } => "no_credential",
            Self::UpstreamTransient { .. } => "transient",
            Self::UpstreamPermanent { .. } => "permanent",
            Self::TokenRefreshFailed { .. } => "token_refresh",
            Self::ProtocolError(_) => "protocol",
            Self::Cancellation => "cancelled",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ErrorCollector
// ─────────────────────────────────────────────────────────────────────────────

/// Collects errors from fire-and-forget operations without losing them.
///
/// Useful when running multiple tasks concurrently where each can fail
/// independently, but you don't want to abort on the first failure — the
/// background quota refresher uses this while looping over vendors.
///
/// # Example
///
/// ```
/// use gateway_core::errors::{ErrorCollector, GatewayError};
///
/// let mut collector = ErrorCollector::new();
/// collector.collect(GatewayError::ClientError("bad request".into()));
/// collector.collect(GatewayError::ProtocolError("bad frame".into()));
/// assert_eq!(collector.count(), 2);
///
/// let errors = collector.flush();
/// assert_eq!(errors.len(), 2);
/// assert_eq!(collector.count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<GatewayError>,
}

impl ErrorCollector {
    /// Create a new empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect an error.
    pub fn collect(&mut self, error: GatewayError) {
        self.errors.push(error);
    }

    /// Whether any errors have been collected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of collected errors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    /// Get and clear all collected errors.
    pub fn flush(&mut self) -> Vec<GatewayError> {
        std::mem::take(&mut self.errors)
    }
}

/// Machine-readable error code rendering, used in JSON error bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// `invalid_request_error`
    InvalidRequestError,
    /// `authentication_error`
    AuthenticationError,
    /// `overloaded_error`
    OverloadedError,
    /// `api_error`
    ApiError,
}

impl GatewayError {
    /// The schema-native `type` field for a JSON error envelope.
    #[must_use]
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::ClientError(_) => ErrorType::InvalidRequestError,
            Self::AuthError(_) => ErrorType::AuthenticationError,
            Self::NoCredentialAvailable { .. } | Self::UpstreamTransient { .. } => {
                ErrorType::OverloadedError
            }
            _ => ErrorType::ApiError,
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
    fn upstream_transient_is_retryable() {
        let err = GatewayError::UpstreamTransient {
            status: Some(429),
            message: "rate limited".into(),
        };
        assert!(err.is_retryable());
        assert!(err.should_quarantine_credential());
    }

    #[test]
    fn upstream_permanent_not_retryable() {
        let err = GatewayError::UpstreamPermanent {
            status: 400,
            message: "bad request".into(),
        };
        assert!(!err.is_retryable());
        assert!(!err.should_quarantine_credential());
    }

    #[test]
    fn auth_rejection_quarantines_credential() {
        let err = GatewayError::UpstreamPermanent {
            status: 401,
            message: "invalid token".into(),
        };
        assert!(err.should_quarantine_credential());
    }

    #[test]
    fn no_credential_available_display() {
        let err = GatewayError::NoCredentialAvailable {
            vendor: "anthropic".into(),
        };
        assert_eq!(err.to_string(), "no available accounts for anthropic");
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn from_upstream_message_classifies_rate_limit() {
        let err = GatewayError::from_upstream_message(Some(429), "429 rate limit exceeded");
        assert!(matches!(err, GatewayError::UpstreamTransient { .. }));
    }

    #[test]
    fn from_upstream_message_classifies_auth() {
        let err = GatewayError::from_upstream_message(Some(401), "401 unauthorized");
        assert!(matches!(err, GatewayError::AuthError(_)));
    }

    #[test]
    fn from_upstream_message_classifies_other_as_permanent() {
        let err = GatewayError::from_upstream_message(Some(400), "missing field messages");
        assert!(matches!(err, GatewayError::UpstreamPermanent { .. }));
    }

    #[test]
    fn category_mapping() {
        assert_eq!(GatewayError::ClientError("x".into()).category(), "client");
        assert_eq!(
            GatewayError::NoCredentialAvailable { vendor: "anthropic".into() }.category(),
            "no_credential"
        );
        assert_eq!(GatewayError::Cancellation.category(), "cancelled");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(GatewayError::ClientError("x".into()).http_status(), 400);
        assert_eq!(GatewayError::AuthError("x".into()).http_status(), 401);
        assert_eq!(GatewayError::Cancellation.http_status(), 499);
    }

    #[test]
    fn error_collector_collects_and_flushes() {
        let mut collector = ErrorCollector::new();
        collector.collect(GatewayError::ClientError("a".into()));
        collector.collect(GatewayError::ProtocolError("b".into()));
        assert_eq!(collector.count(), 2);
        let errors = collector.flush();
        assert_eq!(errors.len(), 2);
        assert_eq!(collector.count(), 0);
    }

    #[test]
    fn error_type_mapping() {
        assert_eq!(
            GatewayError::ClientError("x".into()).error_type(),
            ErrorType::InvalidRequestError
        );
        assert_eq!(
            GatewayError::NoCredentialAvailable { vendor: "vertex".into() }.error_type(),
            ErrorType::OverloadedError
        );
    }
}
