//! Raw row shapes for `rusqlite` mapping, and their conversion to/from the
//! canonical [`gateway_core::Credential`].
//!
//! Keeping the row struct separate from the domain type means a schema
//! column rename only touches this file — every other crate keeps using
//! [`gateway_core::Credential`].

use gateway_core::credential::{Credential, RateLimits, Vendor};
use gateway_core::ids::CredentialId;
use rusqlite::Row;

use crate::errors::{Result, StoreError};

/// One `credentials` table row, as read back from `SQLite`.
#[derive(Clone, Debug)]
pub struct CredentialRow {
    pub id: i64,
    pub vendor: String,
    pub name: String,
    pub email: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<String>,
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub profile_arn: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base_url: Option<String>,
    pub is_active: bool,
    pub weight: u32,
    pub use_count: u64,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub last_used_at: Option<String>,
    pub quota_limit: Option<u64>,
    pub quota_used: Option<u64>,
    pub rate_limits: Option<String>,
    pub quota_exhausted_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CredentialRow {
    /// Columns selected by every repository query, in this order.
    pub const SELECT_COLUMNS: &'static str = "id, vendor, name, email, refresh_token, \
        access_token, expires_at, project_id, region, profile_arn, client_id, client_secret, \
        api_base_url, is_active, weight, use_count, error_count, last_error, last_used_at, \
        quota_limit, quota_used, rate_limits, quota_exhausted_until, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            vendor: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            refresh_token: row.get(4)?,
            access_token: row.get(5)?,
            expires_at: row.get(6)?,
            project_id: row.get(7)?,
            region: row.get(8)?,
            profile_arn: row.get(9)?,
            client_id: row.get(10)?,
            client_secret: row.get(11)?,
            api_base_url: row.get(12)?,
            is_active: row.get::<_, i64>(13)? != 0,
            weight: row.get::<_, i64>(14)? as u32,
            use_count: row.get::<_, i64>(15)? as u64,
            error_count: row.get::<_, i64>(16)? as u32,
            last_error: row.get(17)?,
            last_used_at: row.get(18)?,
            quota_limit: row.get::<_, Option<i64>>(19)?.map(|v| v as u64),
            quota_used: row.get::<_, Option<i64>>(20)?.map(|v| v as u64),
            rate_limits: row.get(21)?,
            quota_exhausted_until: row.get(22)?,
            created_at: row.get(23)?,
            updated_at: row.get(24)?,
        })
    }

    /// Convert this row into the canonical domain type.
    pub fn into_credential(self) -> Result<Credential> {
        let vendor: Vendor = self
            .vendor
            .parse()
            .map_err(|e| StoreError::InvalidOperation(format!("bad vendor in row: {e}")))?;
        let rate_limits = self
            .rate_limits
            .as_deref()
            .map(serde_json::from_str::<RateLimits>)
            .transpose()?;
        Ok(Credential {
            id: CredentialId::from_string(self.id.to_string()),
            vendor,
            name: self.name,
            email: self.email,
            refresh_token: self.refresh_token,
            access_token: self.access_token,
            expires_at: self.expires_at,
            project_id: self.project_id,
            region: self.region,
            profile_arn: self.profile_arn,
            client_id: self.client_id,
            client_secret: self.client_secret,
            api_base_url: self.api_base_url,
            is_active: self.is_active,
            weight: self.weight,
            use_count: self.use_count,
            error_count: self.error_count,
            last_error: self.last_error,
            last_used_at: self.last_used_at,
            quota_limit: self.quota_limit,
            quota_used: self.quota_used,
            rate_limits,
            quota_exhausted_until: self.quota_exhausted_until,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
