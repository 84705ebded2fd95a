//! Stateless repository structs. Each method takes a `&Connection` and
//! executes SQL directly — no shared mutable state lives here, the
//! connection pool in [`crate::sqlite::connection`] owns that.

pub mod api_key;
pub mod api_log;
pub mod credential;

pub use api_key::ApiKeyRepository;
pub use api_log::ApiLogRepository;
pub use credential::CredentialRepository;
