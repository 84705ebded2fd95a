//! # gateway-store
//!
//! `SQLite`-backed persistence for the gateway: the credential pool and its
//! quarantine table, client API keys, and the append-only request log.
//!
//! This is the only crate that touches `SQLite` directly — everything else
//! goes through [`CredentialStore`], an async facade that runs queries on a
//! blocking thread pool via `tokio::task::spawn_blocking`.
//!
//! - **Credentials**: [`sqlite::repositories::CredentialRepository`] implements
//!   `getAll`/`getActive`/`getRandomActive`/`add`/`update`/`updateToken`/
//!   `updateQuota`/`updateRateLimits`/`incrementUseCount`/`incrementErrorCount`
//!   (with automatic quarantine past a threshold)/`markQuotaExhausted`/
//!   `moveToError`/`restoreFromError`/`delete`.
//! - **API keys**: [`sqlite::repositories::ApiKeyRepository`] hashes and looks
//!   up client-facing keys.
//! - **Request log**: [`sqlite::repositories::ApiLogRepository`] appends one row
//!   per completed request, keyed by request ID.
//! - **Migrations**: [`sqlite::migrations`] runs version-tracked schema SQL
//!   transactionally and idempotently on startup.

#![deny(unsafe_code)]

pub mod errors;
pub mod hashing;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use hashing::hash_api_key;
pub use sqlite::repositories::api_key::ApiKeyRecord;
pub use sqlite::repositories::api_log::ApiLogRecord;
pub use sqlite::repositories::credential::DEFAULT_ERROR_THRESHOLD;
pub use sqlite::repositories::{ApiKeyRepository, ApiLogRepository, CredentialRepository};
pub use sqlite::{
    ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory, run_migrations,
};
pub use store::CredentialStore;
