//! Versioned schema upgrades, tracked in `PRAGMA user_version` and mirrored
//! into `store_meta`.

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use tracing::{debug, info};

use super::schema;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "hierarchy, entities and links",
        sql: schema::MIGRATION_V1_SQL,
    },
    Migration {
        version: 2,
        name: "closure and intersection indexes",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Schema version a freshly migrated store ends up at.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// Version recorded in the store header.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read or is negative.
pub fn current_schema_version(conn: &Connection) -> Result<u32> {
    let raw: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("read user_version")?;
    u32::try_from(raw).with_context(|| format!("user_version {raw} out of range"))
}

/// Bring the store up to [`LATEST_SCHEMA_VERSION`], one transaction per
/// step, and return the resulting version.
///
/// # Errors
///
/// Fails if a step's DDL fails, or if the store was written by a newer
/// build whose schema this one does not know.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    let start = current_schema_version(conn)?;
    if start > LATEST_SCHEMA_VERSION {
        bail!(
            "store schema v{start} is newer than supported v{LATEST_SCHEMA_VERSION}; upgrade trellis"
        );
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > start).collect();
    if pending.is_empty() {
        debug!(version = start, "store schema up to date");
        return Ok(start);
    }

    for step in &pending {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)
            .with_context(|| format!("migration v{} ({})", step.version, step.name))?;
        tx.pragma_update(None, "user_version", i64::from(step.version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(step.version)],
        )?;
        tx.commit()?;
        debug!(version = step.version, name = step.name, "migration applied");
    }

    info!(from = start, to = LATEST_SCHEMA_VERSION, "store schema upgraded");
    Ok(LATEST_SCHEMA_VERSION)
}
