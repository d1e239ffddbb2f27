//! Ancestor-propagated two-way links.
//!
//! Linking an entity at a journal records the link at that journal and at
//! every ancestor up to the root. Reads ("is partner P linked anywhere under
//! journal 4?") are then a single indexed lookup instead of a subtree walk.
//! The price is O(depth) rows per link.
//!
//! Each row is upserted by its natural key with `ON CONFLICT DO NOTHING`, so
//! replaying a link is harmless and concurrent callers never fail on each
//! other's rows.

use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, info};

use super::DeleteOutcome;
use crate::config::LinkConfig;
use crate::db::{self, query};
use crate::error::{RecordKind, TrellisError};
use crate::graph::hierarchy;
use crate::model::{
    EntityType, GoodLink, LinkRequest, PartnerLink, PartnershipType, validate_entity_id,
    validate_journal_id,
};

/// Which journals on the path gained a link and which already had one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub entity_type: EntityType,
    pub entity_id: String,
    /// Set for partner links only.
    pub partnership_type: Option<PartnershipType>,
    /// Journals where a new link row was written, root first.
    pub created: Vec<String>,
    /// Journals that already carried the link, root first.
    pub existing: Vec<String>,
}

impl PropagationReport {
    /// Total number of journals on the propagated path.
    #[must_use]
    pub fn path_len(&self) -> usize {
        self.created.len() + self.existing.len()
    }
}

/// Link an entity to `request.journal_id` and every ancestor of it.
///
/// Partner links without an explicit partnership type use
/// `config.default_partnership_type`. All rows are written in one
/// transaction.
///
/// # Errors
///
/// - [`TrellisError::Validation`] for malformed ids
/// - [`TrellisError::NotFound`] if the journal or the entity does not exist
pub fn link(
    conn: &Connection,
    request: &LinkRequest,
    config: &LinkConfig,
) -> Result<PropagationReport, TrellisError> {
    validate_journal_id(&request.journal_id)?;
    validate_entity_id(&request.entity_type.to_string(), &request.entity_id)?;

    let path = hierarchy::ancestor_ids(conn, &request.journal_id)?;
    if path.is_empty() {
        return Err(TrellisError::not_found(RecordKind::Journal, &request.journal_id));
    }

    let partnership_type = match request.entity_type {
        EntityType::Partner => {
            if !query::partner_exists(conn, &request.entity_id)? {
                return Err(TrellisError::not_found(RecordKind::Partner, &request.entity_id));
            }
            Some(
                request
                    .partnership_type
                    .clone()
                    .unwrap_or_else(|| config.default_partnership_type.clone()),
            )
        }
        EntityType::Good => {
            if !query::good_exists(conn, &request.entity_id)? {
                return Err(TrellisError::not_found(RecordKind::Good, &request.entity_id));
            }
            None
        }
    };

    let now = db::now_us();
    let tx = conn.unchecked_transaction()?;
    let mut report = PropagationReport {
        entity_type: request.entity_type,
        entity_id: request.entity_id.clone(),
        partnership_type: partnership_type.clone(),
        created: Vec::new(),
        existing: Vec::new(),
    };

    for journal_id in path {
        let changes = match &partnership_type {
            Some(kind) => tx.execute(
                "INSERT INTO journal_partner_links
                     (journal_id, partner_id, partnership_type, created_at_us)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (journal_id, partner_id, partnership_type) DO NOTHING",
                params![journal_id, request.entity_id, kind.as_str(), now],
            )?,
            None => tx.execute(
                "INSERT INTO journal_good_links (journal_id, good_id, created_at_us)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (journal_id, good_id) DO NOTHING",
                params![journal_id, request.entity_id, now],
            )?,
        };
        if changes == 0 {
            debug!(journal_id = %journal_id, "link already present");
            report.existing.push(journal_id);
        } else {
            report.created.push(journal_id);
        }
    }
    tx.commit()?;

    info!(
        entity_type = %request.entity_type,
        entity_id = %request.entity_id,
        journal_id = %request.journal_id,
        created = report.created.len(),
        existing = report.existing.len(),
        "link propagated"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Whether `partner_id` is linked at `journal_id` (directly or through a
/// descendant, since links are propagated). `None` matches any type.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn is_partner_linked(
    conn: &Connection,
    journal_id: &str,
    partner_id: &str,
    partnership_type: Option<&PartnershipType>,
) -> Result<bool, TrellisError> {
    let linked = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM journal_partner_links
             WHERE journal_id = ?1 AND partner_id = ?2
               AND (?3 IS NULL OR partnership_type = ?3)
         )",
        params![journal_id, partner_id, partnership_type.map(PartnershipType::as_str)],
        |row| row.get(0),
    )?;
    Ok(linked)
}

/// Whether `good_id` is linked at `journal_id`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn is_good_linked(conn: &Connection, journal_id: &str, good_id: &str) -> Result<bool, TrellisError> {
    Ok(query::find_good_link(conn, journal_id, good_id)?.is_some())
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Partner links recorded at a journal.
///
/// # Errors
///
/// [`TrellisError::NotFound`] if the journal does not exist.
pub fn partner_links(conn: &Connection, journal_id: &str) -> Result<Vec<PartnerLink>, TrellisError> {
    hierarchy::get(conn, journal_id)?;
    Ok(query::list_partner_links_for_journal(conn, journal_id)?)
}

/// Good links recorded at a journal.
///
/// # Errors
///
/// [`TrellisError::NotFound`] if the journal does not exist.
pub fn good_links(conn: &Connection, journal_id: &str) -> Result<Vec<GoodLink>, TrellisError> {
    hierarchy::get(conn, journal_id)?;
    Ok(query::list_good_links_for_journal(conn, journal_id)?)
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Delete one partner link row. Its three-way links go with it.
///
/// Only the addressed row is removed; copies propagated to other journals
/// stay.
///
/// # Errors
///
/// Returns an error if the database statement fails.
pub fn delete_partner_link(conn: &Connection, link_id: i64) -> Result<DeleteOutcome, TrellisError> {
    let changes = conn.execute(
        "DELETE FROM journal_partner_links WHERE link_id = ?1",
        params![link_id],
    )?;
    log_delete(RecordKind::PartnerLink, &link_id.to_string(), changes);
    Ok(DeleteOutcome::from_changes(changes))
}

/// Delete a partner link by its natural key.
///
/// # Errors
///
/// Returns an error if the database statement fails.
pub fn delete_partner_link_by_key(
    conn: &Connection,
    journal_id: &str,
    partner_id: &str,
    partnership_type: &PartnershipType,
) -> Result<DeleteOutcome, TrellisError> {
    let changes = conn.execute(
        "DELETE FROM journal_partner_links
         WHERE journal_id = ?1 AND partner_id = ?2 AND partnership_type = ?3",
        params![journal_id, partner_id, partnership_type.as_str()],
    )?;
    log_delete(
        RecordKind::PartnerLink,
        &format!("{journal_id}/{partner_id}/{partnership_type}"),
        changes,
    );
    Ok(DeleteOutcome::from_changes(changes))
}

/// Delete one good link row.
///
/// # Errors
///
/// Returns an error if the database statement fails.
pub fn delete_good_link(conn: &Connection, link_id: i64) -> Result<DeleteOutcome, TrellisError> {
    let changes = conn.execute(
        "DELETE FROM journal_good_links WHERE link_id = ?1",
        params![link_id],
    )?;
    log_delete(RecordKind::GoodLink, &link_id.to_string(), changes);
    Ok(DeleteOutcome::from_changes(changes))
}

/// Delete a good link by its natural key.
///
/// # Errors
///
/// Returns an error if the database statement fails.
pub fn delete_good_link_by_key(
    conn: &Connection,
    journal_id: &str,
    good_id: &str,
) -> Result<DeleteOutcome, TrellisError> {
    let changes = conn.execute(
        "DELETE FROM journal_good_links WHERE journal_id = ?1 AND good_id = ?2",
        params![journal_id, good_id],
    )?;
    log_delete(RecordKind::GoodLink, &format!("{journal_id}/{good_id}"), changes);
    Ok(DeleteOutcome::from_changes(changes))
}

fn log_delete(kind: RecordKind, key: &str, changes: usize) {
    if changes == 0 {
        debug!(%kind, key, "delete found nothing");
    } else {
        info!(%kind, key, "link deleted");
    }
}
