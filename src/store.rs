// src/store.rs
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS seen (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    external_id TEXT NOT NULL,
    url TEXT,
    seen_at TEXT NOT NULL,
    UNIQUE (source, external_id)
);
";

/// Append-only ledger of items already processed, keyed by
/// `(source, external_id)`.
///
/// The UNIQUE constraint is the concurrency control: `admit` is an atomic
/// insert-if-absent, so concurrent source tasks can share one handle without
/// application-level locking. Rows are never updated or deleted.
pub struct SeenLedger {
    conn: Mutex<Connection>,
}

impl SeenLedger {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening ledger at {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().context("opening in-memory ledger")?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("creating seen table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Atomic insert-if-absent. Returns `true` only when this call created
    /// the record. A duplicate is the normal "already seen" outcome, not an
    /// error.
    pub fn admit(&self, source: &str, external_id: &str, url: Option<&str>) -> Result<bool> {
        let seen_at = chrono::Utc::now().to_rfc3339();
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("ledger mutex poisoned"))?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO seen (source, external_id, url, seen_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![source, external_id, url, seen_at],
            )
            .context("inserting seen record")?;
        Ok(inserted > 0)
    }

    /// Number of admitted records, for diagnostics and tests.
    pub fn count(&self) -> Result<u64> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("ledger mutex poisoned"))?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM seen", [], |row| row.get(0))
            .context("counting seen records")?;
        Ok(n as u64)
    }
}
