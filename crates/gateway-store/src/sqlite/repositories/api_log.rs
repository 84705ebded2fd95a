//! Append-only request log (`api_logs`), keyed by request ID.

use rusqlite::{Connection, params};

use crate::errors::Result;

/// One logged request/response pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiLogRecord {
    pub request_id: String,
    pub vendor: String,
    pub model: String,
    pub endpoint: String,
    pub status_code: u16,
    pub latency_ms: u64,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub created_at: String,
}

const COLUMNS: &str = "request_id, vendor, model, endpoint, status_code, latency_ms, \
    input_tokens, output_tokens, created_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiLogRecord> {
    Ok(ApiLogRecord {
        request_id: row.get(0)?,
        vendor: row.get(1)?,
        model: row.get(2)?,
        endpoint: row.get(3)?,
        status_code: row.get::<_, i64>(4)? as u16,
        latency_ms: row.get::<_, i64>(5)? as u64,
        input_tokens: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        output_tokens: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        created_at: row.get(8)?,
    })
}

/// Repository for the request log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiLogRepository;

impl ApiLogRepository {
    /// Insert one completed request. `request_id` is the primary key, so a
    /// retried insert for the same request is a no-op rather than an error.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &self,
        conn: &Connection,
        request_id: &str,
        vendor: &str,
        model: &str,
        endpoint: &str,
        status_code: u16,
        latency_ms: u64,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    ) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO api_logs (
                request_id, vendor, model, endpoint, status_code, latency_ms,
                input_tokens, output_tokens, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))",
            params![
                request_id,
                vendor,
                model,
                endpoint,
                status_code,
                latency_ms as i64,
                input_tokens.map(|v| v as i64),
                output_tokens.map(|v| v as i64),
            ],
        )?;
        Ok(())
    }

    /// Most recent `limit` log entries, newest first.
    pub fn recent(&self, conn: &Connection, limit: u32) -> Result<Vec<ApiLogRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM api_logs ORDER BY created_at DESC LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
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
    fn insert_and_query_recent() {
        let conn = setup();
        let repo = ApiLogRepository;
        repo.insert(&conn, "req-1", "anthropic", "claude-opus-4", "/v1/messages", 200, 450, Some(10), Some(20))
            .unwrap();
        let recent = repo.recent(&conn, 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].request_id, "req-1");
        assert_eq!(recent[0].status_code, 200);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let conn = setup();
        let repo = ApiLogRepository;
        repo.insert(&conn, "req-1", "anthropic", "claude-opus-4", "/v1/messages", 200, 450, None, None)
            .unwrap();
        repo.insert(&conn, "req-1", "vertex", "claude-opus-4", "/v1/messages", 500, 10, None, None)
            .unwrap();
        let recent = repo.recent(&conn, 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].vendor, "anthropic");
    }
}
