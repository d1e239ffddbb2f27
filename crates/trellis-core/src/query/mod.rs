//! Descendant-closure filtering queries.
//!
//! These answer the picker questions of the document editor: "which goods
//! does partner P trade anywhere under journals J?", "which partners trade
//! good G under J?", "where do P and G meet?". Each query short-circuits to
//! an empty result, without touching the link tables, as soon as an
//! intermediate set comes back empty.

use rusqlite::{Connection, params};
use tracing::debug;

use crate::db::query;
use crate::error::TrellisError;
use crate::model::{Good, Partner};

/// Descendant closure of a journal, including itself.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn descendants_of(conn: &Connection, journal_id: &str) -> Result<Vec<String>, TrellisError> {
    Ok(query::descendant_closure(conn, &[journal_id.to_string()])?)
}

/// Goods that `partner_id` is linked with through a three-way link at any
/// of `journal_ids` (or anywhere beneath them when `include_descendants`).
///
/// Sorted by label, then id. Journals that do not exist contribute nothing.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn goods_for_journals_and_partner(
    conn: &Connection,
    journal_ids: &[String],
    partner_id: &str,
    include_descendants: bool,
) -> Result<Vec<Good>, TrellisError> {
    if journal_ids.is_empty() {
        debug!("empty journal scope; no goods");
        return Ok(Vec::new());
    }

    let link_ids = partner_link_ids(conn, journal_ids, include_descendants, partner_id)?;
    if link_ids.is_empty() {
        debug!(partner_id, "partner has no links in scope");
        return Ok(Vec::new());
    }

    let good_ids = good_ids_for_links(conn, &link_ids)?;
    Ok(query::get_goods_sorted(conn, &good_ids)?)
}

/// Partners linked with `good_id` through a three-way link at any of
/// `journal_ids` (or beneath them when `include_descendants`).
///
/// Sorted by name, then id.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn partners_for_journals_and_good(
    conn: &Connection,
    journal_ids: &[String],
    good_id: &str,
    include_descendants: bool,
) -> Result<Vec<Partner>, TrellisError> {
    if journal_ids.is_empty() {
        debug!("empty journal scope; no partners");
        return Ok(Vec::new());
    }

    let link_ids = full_link_partner_link_ids(conn, good_id)?;
    if link_ids.is_empty() {
        debug!(good_id, "good has no three-way links");
        return Ok(Vec::new());
    }

    let sql = format!(
        "{}
         SELECT DISTINCT partner_id FROM journal_partner_links
         WHERE journal_id IN (SELECT journal_id FROM scope)
           AND link_id IN (SELECT value FROM json_each(?2))",
        scope_cte(include_descendants)
    );
    let mut stmt = conn.prepare(&sql)?;
    let partner_ids = stmt
        .query_map(
            params![query::id_list(journal_ids)?, query::id_list(&link_ids)?],
            |row| row.get::<_, String>(0),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(query::get_partners_sorted(conn, &partner_ids)?)
}

/// Journals where `partner_id` has a partner link carrying a three-way link
/// for `good_id`. Not expanded to descendants. Sorted by code.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn journals_for_partner_and_good(
    conn: &Connection,
    partner_id: &str,
    good_id: &str,
) -> Result<Vec<String>, TrellisError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT jp.journal_id
         FROM journal_partner_links jp
         INNER JOIN journal_partner_good_links jpg ON jpg.partner_link_id = jp.link_id
         WHERE jp.partner_id = ?1 AND jpg.good_id = ?2
         ORDER BY jp.journal_id ASC",
    )?;
    let ids = stmt
        .query_map(params![partner_id, good_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `scope(journal_id)` CTE over the existing journals named by the JSON
/// array bound at `?1`, expanded to their descendants on request. The
/// closure stays inside SQL so its size never turns into bound parameters.
const fn scope_cte(include_descendants: bool) -> &'static str {
    if include_descendants {
        "WITH RECURSIVE scope(journal_id) AS (
             SELECT journal_id FROM journals
             WHERE journal_id IN (SELECT value FROM json_each(?1))
             UNION
             SELECT j.journal_id FROM journals j
             INNER JOIN scope s ON j.parent_id = s.journal_id
         )"
    } else {
        "WITH scope(journal_id) AS (
             SELECT journal_id FROM journals
             WHERE journal_id IN (SELECT value FROM json_each(?1))
         )"
    }
}

/// Ids of `partner_id`'s partner links recorded at a journal in scope.
fn partner_link_ids(
    conn: &Connection,
    journal_ids: &[String],
    include_descendants: bool,
    partner_id: &str,
) -> Result<Vec<i64>, TrellisError> {
    let sql = format!(
        "{}
         SELECT link_id FROM journal_partner_links
         WHERE partner_id = ?2 AND journal_id IN (SELECT journal_id FROM scope)",
        scope_cte(include_descendants)
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params![query::id_list(journal_ids)?, partner_id], |row| {
            row.get::<_, i64>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Partner link ids that carry a three-way link for `good_id`.
fn full_link_partner_link_ids(conn: &Connection, good_id: &str) -> Result<Vec<i64>, TrellisError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT partner_link_id FROM journal_partner_good_links WHERE good_id = ?1",
    )?;
    let ids = stmt
        .query_map(params![good_id], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Distinct goods attached to any of `link_ids`.
fn good_ids_for_links(conn: &Connection, link_ids: &[i64]) -> Result<Vec<String>, TrellisError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT good_id FROM journal_partner_good_links
         WHERE partner_link_id IN (SELECT value FROM json_each(?1))",
    )?;
    let values = stmt
        .query_map([query::id_list(link_ids)?], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}
