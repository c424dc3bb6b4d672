use crate::common::{FaceRollError, Result};
use rusqlite::{ffi, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS identities (
    identity_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    reference_image_path TEXT
);

CREATE TABLE IF NOT EXISTS identity_embeddings (
    identity_id TEXT PRIMARY KEY
        REFERENCES identities (identity_id) ON DELETE CASCADE,
    dimension INTEGER NOT NULL,
    vector BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    event_id TEXT PRIMARY KEY,
    identity_id TEXT NOT NULL REFERENCES identities (identity_id),
    evidence_frame_path TEXT NOT NULL,
    occurred_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_attendance_occurred_at ON attendance (occurred_at);
CREATE INDEX IF NOT EXISTS idx_attendance_identity_id ON attendance (identity_id);
";

/// Shared handle to the SQLite database behind the identity store and the ledger.
///
/// Clones share one connection; every statement runs under its lock, so a
/// multi-statement transaction is never interleaved with another caller.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| FaceRollError::StoreUnavailable(format!("{}: {}", path.display(), e)))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let db = Self::init(conn)?;
        tracing::info!("Opened database at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", 1)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FaceRollError::StoreUnavailable("connection lock poisoned".into()))
    }

    #[cfg(test)]
    fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
    Key,
    ForeignKey,
}

/// Which integrity rule a failed write broke, if any.
pub(crate) fn violated_constraint(err: &rusqlite::Error) -> Option<Constraint> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    Some(Constraint::Key)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Constraint::ForeignKey),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Offset for a 1-based page, rejecting pages and sizes below one.
pub(crate) fn page_offset(page: u32, page_size: u32) -> Result<(i64, i64)> {
    if page == 0 || page_size == 0 {
        return Err(FaceRollError::InvalidArgument(format!(
            "page and page_size must be at least 1, got page={} page_size={}",
            page, page_size
        )));
    }
    let offset = (page as i64 - 1) * page_size as i64;
    Ok((page_size as i64, offset))
}
