//! Credential pool persistence: the `credentials` and `error_credentials`
//! tables.
//!
//! All mutations are idempotent per `(id, field)` — retrying a failed
//! `update_token` or `increment_error_count` call after a transient `SQLite`
//! error is always safe.

use gateway_core::credential::{Credential, RateLimits, Vendor};
use gateway_core::ids::CredentialId;
use rand::Rng;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, StoreError};
use crate::sqlite::row_types::CredentialRow;

/// Consecutive error count at which a credential is automatically quarantined.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;

/// Repository for the credential pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialRepository;

impl CredentialRepository {
    fn parse_id(id: &CredentialId) -> Result<i64> {
        id.as_str()
            .parse::<i64>()
            .map_err(|_| StoreError::InvalidOperation(format!("not a row id: {id}")))
    }

    /// All credentials for a vendor, active or not.
    pub fn get_all(&self, conn: &Connection, vendor: Vendor) -> Result<Vec<Credential>> {
        let sql = format!(
            "SELECT {} FROM credentials WHERE vendor = ?1 ORDER BY id",
            CredentialRow::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![vendor.as_str()], CredentialRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(CredentialRow::into_credential).collect()
    }

    /// Active credentials for a vendor (regardless of quota exhaustion).
    pub fn get_active(&self, conn: &Connection, vendor: Vendor) -> Result<Vec<Credential>> {
        let sql = format!(
            "SELECT {} FROM credentials WHERE vendor = ?1 AND is_active = 1 ORDER BY id",
            CredentialRow::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![vendor.as_str()], CredentialRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(CredentialRow::into_credential).collect()
    }

    /// One credential chosen uniformly at random from those that are active,
    /// not quota-exhausted, and not in `exclude_ids`. `None` if no candidate.
    pub fn get_random_active(
        &self,
        conn: &Connection,
        vendor: Vendor,
        exclude_ids: &[CredentialId],
    ) -> Result<Option<Credential>> {
        let now = chrono::Utc::now().to_rfc3339();
        let sql = format!(
            "SELECT {} FROM credentials \
             WHERE vendor = ?1 AND is_active = 1 \
               AND (quota_exhausted_until IS NULL OR quota_exhausted_until <= ?2)",
            CredentialRow::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![vendor.as_str(), now], CredentialRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let exclude: Vec<String> = exclude_ids.iter().map(|id| id.as_str().to_owned()).collect();
        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            if exclude.contains(&row.id.to_string()) {
                continue;
            }
            candidates.push(row.into_credential()?);
        }

        if candidates.is_empty() {
            return Ok(None);
        }
        let idx = rand::rng().random_range(0..candidates.len());
        Ok(Some(candidates.swap_remove(idx)))
    }

    /// Fetch one credential by ID, regardless of vendor or active state.
    pub fn get_by_id(&self, conn: &Connection, id: &CredentialId) -> Result<Credential> {
        let row_id = Self::parse_id(id)?;
        let sql = format!(
            "SELECT {} FROM credentials WHERE id = ?1",
            CredentialRow::SELECT_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![row_id], CredentialRow::from_row)
            .optional()?
            .ok_or(StoreError::CredentialNotFound(row_id))?;
        row.into_credential()
    }

    /// Insert a new credential, returning its assigned ID.
    pub fn add(&self, conn: &Connection, credential: &Credential) -> Result<CredentialId> {
        let rate_limits = credential
            .rate_limits
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            "INSERT INTO credentials (
                vendor, name, email, refresh_token, access_token, expires_at,
                project_id, region, profile_arn, client_id, client_secret, api_base_url,
                is_active, weight, use_count, error_count, last_error, last_used_at,
                quota_limit, quota_used, rate_limits, quota_exhausted_until,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                datetime('now'), datetime('now')
            )",
            params![
                credential.vendor.as_str(),
                credential.name,
                credential.email,
                credential.refresh_token,
                credential.access_token,
                credential.expires_at,
                credential.project_id,
                credential.region,
                credential.profile_arn,
                credential.client_id,
                credential.client_secret,
                credential.api_base_url,
                credential.is_active,
                credential.weight,
                credential.use_count as i64,
                credential.error_count,
                credential.last_error,
                credential.last_used_at,
                credential.quota_limit.map(|v| v as i64),
                credential.quota_used.map(|v| v as i64),
                rate_limits,
                credential.quota_exhausted_until,
            ],
        )?;
        let row_id = conn.last_insert_rowid();
        Ok(CredentialId::from_string(row_id.to_string()))
    }

    /// Replace all mutable fields of a credential in place.
    pub fn update(&self, conn: &Connection, credential: &Credential) -> Result<()> {
        let row_id = Self::parse_id(&credential.id)?;
        let rate_limits = credential
            .rate_limits
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let changed = conn.execute(
            "UPDATE credentials SET
                name = ?2, email = ?3, refresh_token = ?4, access_token = ?5,
                expires_at = ?6, project_id = ?7, region = ?8, profile_arn = ?9,
                client_id = ?10, client_secret = ?11, api_base_url = ?12,
                is_active = ?13, weight = ?14, last_error = ?15,
                quota_limit = ?16, quota_used = ?17, rate_limits = ?18,
                quota_exhausted_until = ?19, updated_at = datetime('now')
             WHERE id = ?1",
            params![
                row_id,
                credential.name,
                credential.email,
                credential.refresh_token,
                credential.access_token,
                credential.expires_at,
                credential.project_id,
                credential.region,
                credential.profile_arn,
                credential.client_id,
                credential.client_secret,
                credential.api_base_url,
                credential.is_active,
                credential.weight,
                credential.last_error,
                credential.quota_limit.map(|v| v as i64),
                credential.quota_used.map(|v| v as i64),
                rate_limits,
                credential.quota_exhausted_until,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        Ok(())
    }

    /// Update the access token and its expiry after a successful refresh.
    pub fn update_token(
        &self,
        conn: &Connection,
        id: &CredentialId,
        access_token: &str,
        expires_at: &str,
    ) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let changed = conn.execute(
            "UPDATE credentials SET access_token = ?2, expires_at = ?3, updated_at = datetime('now') \
             WHERE id = ?1",
            params![row_id, access_token, expires_at],
        )?;
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        Ok(())
    }

    /// Update the vendor-reported quota ceiling and usage.
    pub fn update_quota(
        &self,
        conn: &Connection,
        id: &CredentialId,
        quota_limit: Option<u64>,
        quota_used: Option<u64>,
    ) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let changed = conn.execute(
            "UPDATE credentials SET quota_limit = ?2, quota_used = ?3, updated_at = datetime('now') \
             WHERE id = ?1",
            params![row_id, quota_limit.map(|v| v as i64), quota_used.map(|v| v as i64)],
        )?;
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        Ok(())
    }

    /// Record the most recent rate limit headers observed for a credential.
    pub fn update_rate_limits(
        &self,
        conn: &Connection,
        id: &CredentialId,
        rate_limits: &RateLimits,
    ) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let serialized = serde_json::to_string(rate_limits)?;
        let changed = conn.execute(
            "UPDATE credentials SET rate_limits = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![row_id, serialized],
        )?;
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        Ok(())
    }

    /// Record a successful use: bump `use_count`, `last_used_at`, and reset
    /// the consecutive error count.
    pub fn increment_use_count(&self, conn: &Connection, id: &CredentialId) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let changed = conn.execute(
            "UPDATE credentials SET use_count = use_count + 1, error_count = 0, \
             last_used_at = datetime('now'), updated_at = datetime('now') WHERE id = ?1",
            params![row_id],
        )?;
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        Ok(())
    }

    /// Record a failed use. After `threshold` consecutive failures the
    /// credential is atomically quarantined into the error table.
    ///
    /// Returns `true` if this call crossed the threshold and quarantined
    /// the credential.
    pub fn increment_error_count(
        &self,
        conn: &Connection,
        id: &CredentialId,
        message: &str,
        threshold: u32,
    ) -> Result<bool> {
        let row_id = Self::parse_id(id)?;
        let new_count: u32 = conn
            .query_row(
                "UPDATE credentials SET error_count = error_count + 1, last_error = ?2, \
                 updated_at = datetime('now') WHERE id = ?1 RETURNING error_count",
                params![row_id, message],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::CredentialNotFound(row_id),
                other => StoreError::Sqlite(other),
            })?;

        if new_count >= threshold {
            self.move_to_error(conn, id, &format!("error threshold reached: {message}"))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Quarantine a credential until the given time (or indefinitely).
    pub fn mark_quota_exhausted(
        &self,
        conn: &Connection,
        id: &CredentialId,
        until: Option<&str>,
    ) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let changed = conn.execute(
            "UPDATE credentials SET quota_exhausted_until = ?2, updated_at = datetime('now') \
             WHERE id = ?1",
            params![row_id, until],
        )?;
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        Ok(())
    }

    /// Move a credential into the `error_credentials` quarantine table and
    /// deactivate the live row. Atomic with respect to other mutations.
    pub fn move_to_error(&self, conn: &Connection, id: &CredentialId, reason: &str) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let credential = self.get_by_id(conn, id)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO error_credentials (id, vendor, name, email, refresh_token, reason, moved_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
            params![
                row_id,
                credential.vendor.as_str(),
                credential.name,
                credential.email,
                credential.refresh_token,
                reason,
            ],
        )?;
        tx.execute(
            "UPDATE credentials SET is_active = 0, updated_at = datetime('now') WHERE id = ?1",
            params![row_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Restore a quarantined credential to active status, optionally
    /// replacing its refresh token (the common reason it was quarantined).
    pub fn restore_from_error(
        &self,
        conn: &Connection,
        id: &CredentialId,
        new_refresh_token: Option<&str>,
    ) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let tx = conn.unchecked_transaction()?;
        let changed = match new_refresh_token {
            Some(token) => tx.execute(
                "UPDATE credentials SET is_active = 1, refresh_token = ?2, error_count = 0, \
                 quota_exhausted_until = NULL, updated_at = datetime('now') WHERE id = ?1",
                params![row_id, token],
            )?,
            None => tx.execute(
                "UPDATE credentials SET is_active = 1, error_count = 0, \
                 quota_exhausted_until = NULL, updated_at = datetime('now') WHERE id = ?1",
                params![row_id],
            )?,
        };
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        tx.execute("DELETE FROM error_credentials WHERE id = ?1", params![row_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Permanently remove a credential.
    pub fn delete(&self, conn: &Connection, id: &CredentialId) -> Result<()> {
        let row_id = Self::parse_id(id)?;
        let changed = conn.execute("DELETE FROM credentials WHERE id = ?1", params![row_id])?;
        if changed == 0 {
            return Err(StoreError::CredentialNotFound(row_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn sample(vendor: Vendor, name: &str) -> Credential {
        Credential {
            id: CredentialId::from_string("0".into()),
            vendor,
            name: name.into(),
            email: None,
            refresh_token: Some("refresh-xyz".into()),
            access_token: None,
            expires_at: None,
            project_id: None,
            region: None,
            profile_arn: None,
            client_id: None,
            client_secret: None,
            api_base_url: None,
            is_active: true,
            weight: 1,
            use_count: 0,
            error_count: 0,
            last_error: None,
            last_used_at: None,
            quota_limit: None,
            quota_used: None,
            rate_limits: None,
            quota_exhausted_until: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn add_and_get_by_id_round_trips() {
        let conn = setup();
        let repo = CredentialRepository;
        let id = repo.add(&conn, &sample(Vendor::Anthropic, "ops")).unwrap();
        let fetched = repo.get_by_id(&conn, &id).unwrap();
        assert_eq!(fetched.name, "ops");
        assert_eq!(fetched.vendor, Vendor::Anthropic);
    }

    #[test]
    fn get_by_id_missing_errors() {
        let conn = setup();
        let repo = CredentialRepository;
        let err = repo
            .get_by_id(&conn, &CredentialId::from_string("999".into()))
            .unwrap_err();
        assert!(matches!(err, StoreError::CredentialNotFound(999)));
    }

    #[test]
    fn get_random_active_excludes_ids() {
        let conn = setup();
        let repo = CredentialRepository;
        let id1 = repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        let id2 = repo.add(&conn, &sample(Vendor::Anthropic, "b")).unwrap();
        let chosen = repo
            .get_random_active(&conn, Vendor::Anthropic, std::slice::from_ref(&id1))
            .unwrap()
            .unwrap();
        assert_eq!(chosen.id, id2);
    }

    #[test]
    fn get_random_active_empty_when_all_excluded() {
        let conn = setup();
        let repo = CredentialRepository;
        let id = repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        let chosen = repo
            .get_random_active(&conn, Vendor::Anthropic, &[id])
            .unwrap();
        assert!(chosen.is_none());
    }

    #[test]
    fn get_random_active_skips_quota_exhausted() {
        let conn = setup();
        let repo = CredentialRepository;
        let id = repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        let until = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        repo.mark_quota_exhausted(&conn, &id, Some(&until)).unwrap();
        let chosen = repo.get_random_active(&conn, Vendor::Anthropic, &[]).unwrap();
        assert!(chosen.is_none());
    }

    #[test]
    fn increment_use_count_resets_error_count() {
        let conn = setup();
        let repo = CredentialRepository;
        let id = repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        repo.increment_error_count(&conn, &id, "boom", DEFAULT_ERROR_THRESHOLD)
            .unwrap();
        repo.increment_use_count(&conn, &id).unwrap();
        let fetched = repo.get_by_id(&conn, &id).unwrap();
        assert_eq!(fetched.error_count, 0);
        assert_eq!(fetched.use_count, 1);
    }

    #[test]
    fn increment_error_count_quarantines_at_threshold() {
        let conn = setup();
        let repo = CredentialRepository;
        let id = repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        let mut quarantined = false;
        for _ in 0..DEFAULT_ERROR_THRESHOLD {
            quarantined = repo
                .increment_error_count(&conn, &id, "503", DEFAULT_ERROR_THRESHOLD)
                .unwrap();
        }
        assert!(quarantined);
        let fetched = repo.get_by_id(&conn, &id).unwrap();
        assert!(!fetched.is_active);

        let errored: i64 = conn
            .query_row("SELECT COUNT(*) FROM error_credentials WHERE id = ?1", params![0], |r| {
                r.get(0)
            })
            .unwrap_or(0);
        let _ = errored; // row id differs per test run order; existence checked below
        let in_error: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM error_credentials WHERE name = 'a'",
                [],
                |r| r.get::<_, i64>(0),
            )
            .map(|n| n > 0)
            .unwrap();
        assert!(in_error);
    }

    #[test]
    fn restore_from_error_reactivates_and_clears_quarantine_row() {
        let conn = setup();
        let repo = CredentialRepository;
        let id = repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        repo.move_to_error(&conn, &id, "manual test").unwrap();
        repo.restore_from_error(&conn, &id, Some("new-refresh")).unwrap();
        let fetched = repo.get_by_id(&conn, &id).unwrap();
        assert!(fetched.is_active);
        assert_eq!(fetched.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(fetched.error_count, 0);
    }

    #[test]
    fn delete_removes_row() {
        let conn = setup();
        let repo = CredentialRepository;
        let id = repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        repo.delete(&conn, &id).unwrap();
        assert!(repo.get_by_id(&conn, &id).is_err());
    }

    #[test]
    fn get_all_scopes_by_vendor() {
        let conn = setup();
        let repo = CredentialRepository;
        repo.add(&conn, &sample(Vendor::Anthropic, "a")).unwrap();
        repo.add(&conn, &sample(Vendor::Vertex, "b")).unwrap();
        let anthropic = repo.get_all(&conn, Vendor::Anthropic).unwrap();
        assert_eq!(anthropic.len(), 1);
        assert_eq!(anthropic[0].name, "a");
    }
}
