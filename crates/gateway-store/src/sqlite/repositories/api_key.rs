//! Client-facing API key persistence.
//!
//! Keys are never stored in plaintext — callers hash the presented key
//! (SHA-256, see [`crate::hashing`]) before calling into this repository.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, StoreError};

/// One row of the `api_keys` table.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiKeyRecord {
    pub id: i64,
    pub hash: String,
    pub label: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    Ok(ApiKeyRecord {
        id: row.get(0)?,
        hash: row.get(1)?,
        label: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
        last_used_at: row.get(5)?,
    })
}

const COLUMNS: &str = "id, hash, label, is_active, created_at, last_used_at";

/// Repository for client API keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiKeyRepository;

impl ApiKeyRepository {
    /// Look up an active key by its SHA-256 hash.
    pub fn get_by_hash(&self, conn: &Connection, hash: &str) -> Result<Option<ApiKeyRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM api_keys WHERE hash = ?1 AND is_active = 1");
        conn.query_row(&sql, params![hash], row_to_record)
            .optional()
            .map_err(StoreError::from)
    }

    /// Create a new key, returning its assigned ID.
    pub fn add(&self, conn: &Connection, hash: &str, label: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO api_keys (hash, label, is_active, created_at) \
             VALUES (?1, ?2, 1, datetime('now'))",
            params![hash, label],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List every key, active or revoked.
    pub fn list(&self, conn: &Connection) -> Result<Vec<ApiKeyRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM api_keys ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record that a key was used to authenticate a request.
    pub fn touch_last_used(&self, conn: &Connection, id: i64) -> Result<()> {
        conn.execute(
            "UPDATE api_keys SET last_used_at = datetime('now') WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Revoke a key without deleting its row (keeps `api_logs` foreign
    /// references meaningful for audit).
    pub fn deactivate(&self, conn: &Connection, id: i64) -> Result<()> {
        let changed = conn.execute("UPDATE api_keys SET is_active = 0 WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::ApiKeyNotFound);
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

    #[test]
    fn add_and_lookup_by_hash() {
        let conn = setup();
        let repo = ApiKeyRepository;
        repo.add(&conn, "deadbeef", "ci key").unwrap();
        let found = repo.get_by_hash(&conn, "deadbeef").unwrap().unwrap();
        assert_eq!(found.label, "ci key");
        assert!(found.is_active);
    }

    #[test]
    fn lookup_missing_hash_returns_none() {
        let conn = setup();
        let repo = ApiKeyRepository;
        assert!(repo.get_by_hash(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn deactivated_key_not_returned_by_hash_lookup() {
        let conn = setup();
        let repo = ApiKeyRepository;
        let id = repo.add(&conn, "deadbeef", "ci key").unwrap();
        repo.deactivate(&conn, id).unwrap();
        assert!(repo.get_by_hash(&conn, "deadbeef").unwrap().is_none());
    }

    #[test]
    fn deactivate_missing_key_errors() {
        let conn = setup();
        let repo = ApiKeyRepository;
        assert!(matches!(repo.deactivate(&conn, 999), Err(StoreError::ApiKeyNotFound)));
    }
}
