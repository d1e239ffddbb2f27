//! Three-way journal × partner × good links.
//!
//! A three-way link is a good attached to a two-way partner link. Creating
//! one through [`create_full_link`] first finds or creates the partner link.
//! When two callers race to create the same partner link, the loser sees a
//! unique-constraint violation, re-reads the row the winner wrote exactly
//! once, and carries on with it. A row that is still missing after that
//! refetch means the store is inconsistent, and the call fails with
//! [`TrellisError::InvariantViolation`] instead of retrying.

use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::DeleteOutcome;
use crate::db::{self, query};
use crate::error::{RecordKind, TrellisError};
use crate::model::{
    FullLink, PartnerLink, PartnershipType, validate_entity_id, validate_journal_id,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input to [`create_full_link`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFullLink {
    pub journal_id: String,
    pub partner_id: String,
    pub good_id: String,
    pub partnership_type: PartnershipType,
    #[serde(default)]
    pub descriptive_text: Option<String>,
    /// Overrides the good's default tax code in this context.
    #[serde(default)]
    pub tax_code_id: Option<String>,
}

impl NewFullLink {
    #[must_use]
    pub fn new(
        journal_id: &str,
        partner_id: &str,
        good_id: &str,
        partnership_type: PartnershipType,
    ) -> Self {
        Self {
            journal_id: journal_id.to_string(),
            partner_id: partner_id.to_string(),
            good_id: good_id.to_string(),
            partnership_type,
            descriptive_text: None,
            tax_code_id: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.descriptive_text = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn with_tax_code(mut self, tax_code_id: &str) -> Self {
        self.tax_code_id = Some(tax_code_id.to_string());
        self
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Find or create the partner link for (journal, partner, type), then
/// attach the good to it. All of it runs in one transaction: a failed call
/// leaves no new partner link behind. Must not be called inside an open
/// transaction on `conn`.
///
/// # Errors
///
/// - [`TrellisError::Validation`] for malformed ids
/// - [`TrellisError::NotFound`] if the journal, partner, good or tax code is absent
/// - [`TrellisError::Conflict`] if the good is already attached to the partner link
/// - [`TrellisError::InvariantViolation`] if the partner link is missing
///   even after the post-race refetch
pub fn create_full_link(conn: &Connection, request: &NewFullLink) -> Result<FullLink, TrellisError> {
    validate_journal_id(&request.journal_id)?;
    validate_entity_id("partner", &request.partner_id)?;
    validate_entity_id("good", &request.good_id)?;

    // IMMEDIATE takes the write lock up front, so concurrent creators queue
    // on the busy timeout instead of failing a deferred lock upgrade.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    if !query::journal_exists(&tx, &request.journal_id)? {
        return Err(TrellisError::not_found(RecordKind::Journal, &request.journal_id));
    }
    if !query::partner_exists(&tx, &request.partner_id)? {
        return Err(TrellisError::not_found(RecordKind::Partner, &request.partner_id));
    }

    let partner_link = find_or_create_partner_link(
        &tx,
        &request.journal_id,
        &request.partner_id,
        &request.partnership_type,
    )?;

    let link = create_link(
        &tx,
        partner_link.link_id,
        &request.good_id,
        request.descriptive_text.as_deref(),
        request.tax_code_id.as_deref(),
    )?;
    tx.commit()?;
    Ok(link)
}

/// Attach a good to an existing partner link.
///
/// # Errors
///
/// - [`TrellisError::NotFound`] if the partner link, good or tax code is absent
/// - [`TrellisError::Conflict`] if the good is already attached
pub fn create_link(
    conn: &Connection,
    partner_link_id: i64,
    good_id: &str,
    descriptive_text: Option<&str>,
    tax_code_id: Option<&str>,
) -> Result<FullLink, TrellisError> {
    if query::get_partner_link(conn, partner_link_id)?.is_none() {
        return Err(TrellisError::not_found(
            RecordKind::PartnerLink,
            partner_link_id.to_string(),
        ));
    }
    require_good(conn, good_id)?;
    if let Some(tax) = tax_code_id {
        require_tax_code(conn, tax)?;
    }

    let now = db::now_us();
    let inserted = conn.execute(
        "INSERT INTO journal_partner_good_links
             (partner_link_id, good_id, descriptive_text, tax_code_id, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![partner_link_id, good_id, normalize_text(descriptive_text), tax_code_id, now],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if db::is_unique_violation(&e) => {
            debug!(partner_link_id, good_id, "three-way link already exists");
            return Err(TrellisError::conflict(
                RecordKind::FullLink,
                format!("partner link {partner_link_id} / good '{good_id}'"),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let link_id = conn.last_insert_rowid();
    info!(link_id, partner_link_id, good_id, "three-way link created");
    get_by_id(conn, link_id)
}

/// Find the partner link by natural key, creating it when absent.
///
/// # Errors
///
/// [`TrellisError::InvariantViolation`] if a lost creation race is not
/// followed by a visible row.
pub fn find_or_create_partner_link(
    conn: &Connection,
    journal_id: &str,
    partner_id: &str,
    partnership_type: &PartnershipType,
) -> Result<PartnerLink, TrellisError> {
    find_or_create(
        || query::find_partner_link(conn, journal_id, partner_id, partnership_type.as_str()),
        || {
            conn.execute(
                "INSERT INTO journal_partner_links
                     (journal_id, partner_id, partnership_type, created_at_us)
                 VALUES (?1, ?2, ?3, ?4)",
                params![journal_id, partner_id, partnership_type.as_str(), db::now_us()],
            )
            .map(|_| ())
        },
        &format!("{journal_id}/{partner_id}/{partnership_type}"),
    )
}

/// Look up, create on miss, and refetch once if the create lost a race.
pub(crate) fn find_or_create<T>(
    find: impl Fn() -> anyhow::Result<Option<T>>,
    create: impl FnOnce() -> rusqlite::Result<()>,
    key: &str,
) -> Result<T, TrellisError> {
    if let Some(found) = find()? {
        return Ok(found);
    }

    match create() {
        Ok(()) => find()?.ok_or_else(|| {
            TrellisError::InvariantViolation(format!("row '{key}' not visible after insert"))
        }),
        Err(e) if db::is_unique_violation(&e) => {
            warn!(key, "concurrent creator won; refetching");
            find()?.ok_or_else(|| {
                TrellisError::InvariantViolation(format!(
                    "row '{key}' rejected as duplicate but not found on refetch"
                ))
            })
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// [`TrellisError::NotFound`] if no three-way link has this id.
pub fn get_by_id(conn: &Connection, link_id: i64) -> Result<FullLink, TrellisError> {
    query::get_full_link(conn, link_id)?
        .ok_or_else(|| TrellisError::not_found(RecordKind::FullLink, link_id.to_string()))
}

/// Look up the three-way link for a full natural key without creating
/// anything.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_full_link(
    conn: &Connection,
    journal_id: &str,
    partner_id: &str,
    partnership_type: &PartnershipType,
    good_id: &str,
) -> Result<Option<FullLink>, TrellisError> {
    let Some(partner_link) =
        query::find_partner_link(conn, journal_id, partner_id, partnership_type.as_str())?
    else {
        return Ok(None);
    };
    Ok(query::find_full_link(conn, partner_link.link_id, good_id)?)
}

/// Three-way links attached to one partner link (the goods traded with
/// that partner at that journal).
///
/// # Errors
///
/// [`TrellisError::NotFound`] if the partner link does not exist.
pub fn links_for_partner_link(
    conn: &Connection,
    partner_link_id: i64,
) -> Result<Vec<FullLink>, TrellisError> {
    if query::get_partner_link(conn, partner_link_id)?.is_none() {
        return Err(TrellisError::not_found(
            RecordKind::PartnerLink,
            partner_link_id.to_string(),
        ));
    }
    Ok(query::list_full_links_for_partner_link(conn, partner_link_id)?)
}

/// Partner links that carry a three-way link for `good_id`, optionally
/// restricted to one journal.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn partner_links_for_good(
    conn: &Connection,
    good_id: &str,
    journal_id: Option<&str>,
) -> Result<Vec<PartnerLink>, TrellisError> {
    Ok(query::list_partner_links_for_good(conn, good_id, journal_id)?)
}

/// Three-way links for `good_id` recorded at `journal_id`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn links_for_good_in_journal(
    conn: &Connection,
    good_id: &str,
    journal_id: &str,
) -> Result<Vec<FullLink>, TrellisError> {
    Ok(query::list_full_links_for_good_in_journal(conn, good_id, journal_id)?)
}

// ---------------------------------------------------------------------------
// Updates and deletion
// ---------------------------------------------------------------------------

/// Replace the optional attributes of a three-way link. `None` clears.
///
/// # Errors
///
/// [`TrellisError::NotFound`] if the link or the tax code does not exist.
pub fn update_details(
    conn: &Connection,
    link_id: i64,
    descriptive_text: Option<&str>,
    tax_code_id: Option<&str>,
) -> Result<FullLink, TrellisError> {
    if let Some(tax) = tax_code_id {
        require_tax_code(conn, tax)?;
    }
    let changes = conn.execute(
        "UPDATE journal_partner_good_links
         SET descriptive_text = ?2, tax_code_id = ?3, updated_at_us = ?4
         WHERE link_id = ?1",
        params![link_id, normalize_text(descriptive_text), tax_code_id, db::now_us()],
    )?;
    if changes == 0 {
        return Err(TrellisError::not_found(RecordKind::FullLink, link_id.to_string()));
    }
    get_by_id(conn, link_id)
}

/// Delete a three-way link. A missing id is reported, not an error.
///
/// # Errors
///
/// Returns an error if the database statement fails.
pub fn delete_by_id(conn: &Connection, link_id: i64) -> Result<DeleteOutcome, TrellisError> {
    let changes = conn.execute(
        "DELETE FROM journal_partner_good_links WHERE link_id = ?1",
        params![link_id],
    )?;
    let outcome = DeleteOutcome::from_changes(changes);
    match outcome {
        DeleteOutcome::Deleted => info!(link_id, "three-way link deleted"),
        DeleteOutcome::NotFound => debug!(link_id, "three-way link already gone"),
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_good(conn: &Connection, good_id: &str) -> Result<(), TrellisError> {
    if query::good_exists(conn, good_id)? {
        Ok(())
    } else {
        Err(TrellisError::not_found(RecordKind::Good, good_id))
    }
}

fn require_tax_code(conn: &Connection, tax_code_id: &str) -> Result<(), TrellisError> {
    if query::tax_code_exists(conn, tax_code_id)? {
        Ok(())
    } else {
        Err(TrellisError::not_found(RecordKind::TaxCode, tax_code_id))
    }
}

/// Trim descriptive text; blank becomes absent.
fn normalize_text(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}
