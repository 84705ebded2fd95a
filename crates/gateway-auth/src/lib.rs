//! # gateway-auth
//!
//! Upstream credential authentication for the gateway: PKCE OAuth for
//! Anthropic, JWT-bearer service-account auth for Vertex, and Firebase
//! refresh-token exchange for Warp.
//!
//! [`refresher::TokenRefresher`] is the single entry point other crates use
//! — it decides whether a credential's token needs refreshing, serializes
//! concurrent refreshes of the same credential through a per-credential
//! lock, and persists the result to [`gateway_store::CredentialStore`].
//!
//! # Example
//!
//! ```no_run
//! # async fn example(store: gateway_store::CredentialStore, credential: gateway_core::Credential) -> Result<(), gateway_auth::AuthError> {
//! let refresher = gateway_auth::TokenRefresher::new(store);
//! let token = refresher.get_valid_access_token(&credential, false).await?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod anthropic;
pub mod errors;
pub mod pkce;
pub mod refresher;
pub mod vertex;
pub mod warp;

pub use errors::AuthError;
pub use pkce::{PkcePair, generate_pkce};
pub use refresher::TokenRefresher;
