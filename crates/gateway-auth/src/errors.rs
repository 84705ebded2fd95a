//! Auth error types.

/// Errors that can occur during authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// OAuth token exchange or refresh failed.
    #[error("OAuth error ({status}): {message}")]
    OAuth {
        /// HTTP status code (0 if no response).
        status: u16,
        /// Error description.
        message: String,
    },

    /// Token has expired and refresh failed.
    #[error("token expired and refresh failed: {0}")]
    TokenExpired(String),

    /// No authentication configured for the given provider.
    #[error("no auth configured for provider: {0}")]
    NotConfigured(String),

    /// JWT signing failed (Vertex service-account assertions).
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The credential store returned an error while reading or persisting
    /// a credential's token state.
    #[error("credential store error: {0}")]
    Store(#[from] gateway_store::StoreError),

    /// A credential is missing a field the refresher requires (e.g. a
    /// Vertex credential with no `client_secret` private key).
    #[error("credential missing required field: {0}")]
    MissingField(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
