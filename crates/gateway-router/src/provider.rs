//! # Vendor Adapter Trait
//!
//! Core abstraction for upstream vendor backends. Every adapter (Anthropic,
//! Vertex, Warp) implements [`VendorAdapter`] to expose a unified streaming
//! interface over the canonical request/event types.
//!
//! The trait returns a boxed [`Stream`] of [`StreamEvent`]s, allowing the
//! Streaming Engine to translate them into the client's wire format
//! incrementally regardless of the upstream's own protocol.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use gateway_core::credential::Credential;
use gateway_core::errors::GatewayError;
use gateway_core::events::StreamEvent;
use gateway_core::messages::{CanonicalRequest, ProviderType};

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, GatewayError>;

/// Boxed stream of [`StreamEvent`]s returned by [`VendorAdapter::stream`].
pub type StreamEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, GatewayError>> + Send>>;

/// Core vendor adapter trait.
///
/// Implementors must be `Send + Sync` for use across async tasks. The
/// [`stream`](VendorAdapter::stream) method returns an async stream of
/// [`StreamEvent`]s that the Streaming Engine consumes incrementally and
/// the account selector retries against a different credential on failure.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// Vendor this adapter talks to.
    fn provider_type(&self) -> ProviderType;

    /// Stream a response from the upstream vendor using the given credential.
    ///
    /// Returns a stream of [`StreamEvent`]s. The caller consumes events until
    /// [`StreamEvent::Done`] or [`StreamEvent::Error`] is received.
    async fn stream(
        &self,
        request: &CanonicalRequest,
        credential: &Credential,
    ) -> AdapterResult<StreamEventStream>;

    /// Count tokens for a request without generating a response, when the
    /// vendor exposes a dedicated endpoint (Vertex's `countTokens`). Adapters
    /// that don't support this return `None` rather than erroring.
    async fn count_tokens(
        &self,
        _request: &CanonicalRequest,
        _credential: &Credential,
    ) -> AdapterResult<Option<u64>> {
        Ok(None)
    }
}

/// Registry of vendor adapters the router dispatches through.
///
/// A thin `Arc`-keyed lookup rather than a factory: adapters are built once
/// at startup (each wraps an HTTP client and any vendor-specific config) and
/// shared across every request.
pub trait AdapterRegistry: Send + Sync {
    /// Look up the adapter for a given vendor, if one is configured.
    fn get(&self, provider_type: ProviderType) -> Option<Arc<dyn VendorAdapter>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_adapter_is_object_safe() {
        fn assert_object_safe(_: &dyn VendorAdapter) {}
        let _ = assert_object_safe;
    }

    #[test]
    fn vendor_adapter_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn VendorAdapter>();
    }

    #[test]
    fn adapter_registry_is_object_safe() {
        fn assert_object_safe(_: &dyn AdapterRegistry) {}
        let _ = assert_object_safe;
    }
}
