//! Store connections, schema and row-level query helpers.
//!
//! Every connection runs in WAL mode with foreign keys enforced and a 5s
//! busy timeout, so concurrent writers queue instead of failing outright and
//! link rows follow journal deletes.

pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};
use tracing::debug;

/// How long a writer waits on a locked database before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the store at `path`, ready for use.
///
/// Connections are not shared: each request or thread opens its own.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created, or if
/// setting pragmas or migrating fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create store directory {}", dir.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open store {}", path.display()))?;
    prepare(conn)
}

/// A throwaway store with the full schema, for tests and dry runs.
///
/// # Errors
///
/// Returns an error if setting pragmas or migrating fails.
pub fn open_in_memory() -> Result<Connection> {
    prepare(Connection::open_in_memory().context("open in-memory store")?)
}

fn prepare(mut conn: Connection) -> Result<Connection> {
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    for (name, value) in [("foreign_keys", "ON"), ("synchronous", "NORMAL")] {
        conn.pragma_update(None, name, value)
            .with_context(|| format!("set {name}={value}"))?;
    }
    // In-memory databases answer "memory" here; only files switch to WAL.
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "store connection configured");
    migrations::migrate(&mut conn)?;
    Ok(conn)
}

/// Returns true when `err` is a composite-unique or primary-key violation.
///
/// Foreign-key and check failures share the same primary result code, so
/// the extended code is what tells a lost creation race apart from a bad
/// reference.
#[must_use]
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
