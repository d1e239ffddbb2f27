//! `SQLite` read helpers for the trellis store.
//!
//! All functions take a shared `&Connection` and return `anyhow::Result<T>`
//! with typed records (never raw rows). Domain modules translate absence
//! and constraint failures into [`crate::error::TrellisError`].

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::collections::HashSet;

use crate::model::{FullLink, Good, GoodLink, JournalNode, Partner, PartnerLink, TaxCode};

// ---------------------------------------------------------------------------
// Journals
// ---------------------------------------------------------------------------

const JOURNAL_COLUMNS: &str =
    "journal_id, name, parent_id, is_terminal, created_at_us, updated_at_us";

/// Fetch a single journal by exact id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_journal(conn: &Connection, journal_id: &str) -> Result<Option<JournalNode>> {
    let sql = format!("SELECT {JOURNAL_COLUMNS} FROM journals WHERE journal_id = ?1");
    conn.query_row(&sql, params![journal_id], row_to_journal)
        .optional()
        .with_context(|| format!("get_journal '{journal_id}'"))
}

/// Check if a journal exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn journal_exists(conn: &Connection, journal_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM journals WHERE journal_id = ?1)",
        params![journal_id],
        |row| row.get(0),
    )
    .context("check journal_exists")
}

/// Direct children of `parent_id`, ordered by code.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_children(conn: &Connection, parent_id: &str) -> Result<Vec<JournalNode>> {
    let sql = format!(
        "SELECT {JOURNAL_COLUMNS} FROM journals WHERE parent_id = ?1 ORDER BY journal_id ASC"
    );
    let mut stmt = conn.prepare(&sql).context("prepare get_children")?;
    let rows = stmt
        .query_map(params![parent_id], row_to_journal)
        .context("execute get_children")?;

    let mut children = Vec::new();
    for row in rows {
        children.push(row.context("read child row")?);
    }
    Ok(children)
}

/// Journals without a parent, ordered by code.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_roots(conn: &Connection) -> Result<Vec<JournalNode>> {
    let sql = format!(
        "SELECT {JOURNAL_COLUMNS} FROM journals WHERE parent_id IS NULL ORDER BY journal_id ASC"
    );
    collect_journals(conn, &sql, "list_roots")
}

/// Every journal, ordered by code.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_journals(conn: &Connection) -> Result<Vec<JournalNode>> {
    let sql = format!("SELECT {JOURNAL_COLUMNS} FROM journals ORDER BY journal_id ASC");
    collect_journals(conn, &sql, "list_journals")
}

/// Number of direct children of `journal_id`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_children(conn: &Connection, journal_id: &str) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM journals WHERE parent_id = ?1",
            params![journal_id],
            |row| row.get(0),
        )
        .context("count_children")?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Upper bound on how far the ancestor walk climbs. Real charts of accounts
/// are a handful of levels deep; the bound only matters on corrupted data.
pub const MAX_ANCESTOR_DEPTH: i64 = 1024;

/// Ids on the path from `journal_id` up to its root, nearest first
/// (`journal_id` itself at index 0). Empty when the journal does not exist.
///
/// The walk stops at the first repeated id, so a corrupted parent cycle
/// yields a finite path.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn ancestor_ids(conn: &Connection, journal_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE chain(journal_id, parent_id, depth) AS (
                 SELECT journal_id, parent_id, 0 FROM journals WHERE journal_id = ?1
                 UNION ALL
                 SELECT j.journal_id, j.parent_id, c.depth + 1
                 FROM journals j
                 INNER JOIN chain c ON j.journal_id = c.parent_id
                 WHERE c.depth < ?2
             )
             SELECT journal_id FROM chain ORDER BY depth ASC",
        )
        .context("prepare ancestor_ids")?;
    let rows = stmt
        .query_map(params![journal_id, MAX_ANCESTOR_DEPTH], |row| {
            row.get::<_, String>(0)
        })
        .context("execute ancestor_ids")?;

    let mut seen = HashSet::new();
    let mut path = Vec::new();
    for row in rows {
        let id = row.context("read ancestor row")?;
        if !seen.insert(id.clone()) {
            break;
        }
        path.push(id);
    }
    Ok(path)
}

/// Descendant closure of every seed id (seeds included), sorted and
/// deduplicated. Seeds that do not exist contribute nothing.
///
/// `UNION` (not `UNION ALL`) discards rows already produced, which also
/// terminates the recursion on a corrupted parent cycle.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn descendant_closure(conn: &Connection, seeds: &[String]) -> Result<Vec<String>> {
    if seeds.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE sub(journal_id) AS (
                 SELECT journal_id FROM journals
                 WHERE journal_id IN (SELECT value FROM json_each(?1))
                 UNION
                 SELECT j.journal_id FROM journals j
                 INNER JOIN sub s ON j.parent_id = s.journal_id
             )
             SELECT journal_id FROM sub ORDER BY journal_id ASC",
        )
        .context("prepare descendant_closure")?;
    let rows = stmt
        .query_map([id_list(seeds)?], |row| row.get::<_, String>(0))
        .context("execute descendant_closure")?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row.context("read descendant row")?);
    }
    Ok(ids)
}

/// Existing journal ids among `ids`, sorted and deduplicated.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn existing_journal_ids(conn: &Connection, ids: &[String]) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(
            "SELECT journal_id FROM journals
             WHERE journal_id IN (SELECT value FROM json_each(?1))
             ORDER BY journal_id ASC",
        )
        .context("prepare existing_journal_ids")?;
    let rows = stmt
        .query_map([id_list(ids)?], |row| row.get::<_, String>(0))
        .context("execute existing_journal_ids")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("read journal id row")?);
    }
    Ok(out)
}

fn collect_journals(conn: &Connection, sql: &str, label: &str) -> Result<Vec<JournalNode>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("prepare {label}"))?;
    let rows = stmt
        .query_map([], row_to_journal)
        .with_context(|| format!("execute {label}"))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.with_context(|| format!("read {label} row"))?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns an error if the query fails.
pub fn get_partner(conn: &Connection, partner_id: &str) -> Result<Option<Partner>> {
    conn.query_row(
        "SELECT partner_id, name FROM partners WHERE partner_id = ?1",
        params![partner_id],
        |row| {
            Ok(Partner {
                partner_id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .optional()
    .with_context(|| format!("get_partner '{partner_id}'"))
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get_good(conn: &Connection, good_id: &str) -> Result<Option<Good>> {
    conn.query_row(
        "SELECT good_id, label, default_tax_code_id FROM goods WHERE good_id = ?1",
        params![good_id],
        row_to_good,
    )
    .optional()
    .with_context(|| format!("get_good '{good_id}'"))
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get_tax_code(conn: &Connection, tax_code_id: &str) -> Result<Option<TaxCode>> {
    conn.query_row(
        "SELECT tax_code_id, label FROM tax_codes WHERE tax_code_id = ?1",
        params![tax_code_id],
        |row| {
            Ok(TaxCode {
                tax_code_id: row.get(0)?,
                label: row.get(1)?,
            })
        },
    )
    .optional()
    .with_context(|| format!("get_tax_code '{tax_code_id}'"))
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn partner_exists(conn: &Connection, partner_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM partners WHERE partner_id = ?1)",
        params![partner_id],
        |row| row.get(0),
    )
    .context("check partner_exists")
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn good_exists(conn: &Connection, good_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM goods WHERE good_id = ?1)",
        params![good_id],
        |row| row.get(0),
    )
    .context("check good_exists")
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn tax_code_exists(conn: &Connection, tax_code_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tax_codes WHERE tax_code_id = ?1)",
        params![tax_code_id],
        |row| row.get(0),
    )
    .context("check tax_code_exists")
}

/// Fetch goods by id, sorted by label then id. Unknown ids are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_goods_sorted(conn: &Connection, good_ids: &[String]) -> Result<Vec<Good>> {
    if good_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(
            "SELECT good_id, label, default_tax_code_id FROM goods
             WHERE good_id IN (SELECT value FROM json_each(?1))
             ORDER BY label ASC, good_id ASC",
        )
        .context("prepare get_goods_sorted")?;
    let rows = stmt
        .query_map([id_list(good_ids)?], row_to_good)
        .context("execute get_goods_sorted")?;

    let mut goods = Vec::new();
    for row in rows {
        goods.push(row.context("read good row")?);
    }
    Ok(goods)
}

/// Fetch partners by id, sorted by name then id. Unknown ids are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_partners_sorted(conn: &Connection, partner_ids: &[String]) -> Result<Vec<Partner>> {
    if partner_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(
            "SELECT partner_id, name FROM partners
             WHERE partner_id IN (SELECT value FROM json_each(?1))
             ORDER BY name ASC, partner_id ASC",
        )
        .context("prepare get_partners_sorted")?;
    let rows = stmt
        .query_map([id_list(partner_ids)?], |row| {
            Ok(Partner {
                partner_id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .context("execute get_partners_sorted")?;

    let mut partners = Vec::new();
    for row in rows {
        partners.push(row.context("read partner row")?);
    }
    Ok(partners)
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

const PARTNER_LINK_COLUMNS: &str =
    "link_id, journal_id, partner_id, partnership_type, created_at_us";

const FULL_LINK_COLUMNS: &str = "link_id, partner_link_id, good_id, descriptive_text, \
                                 tax_code_id, created_at_us, updated_at_us";

/// Look up a two-way partner link by its natural key.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_partner_link(
    conn: &Connection,
    journal_id: &str,
    partner_id: &str,
    partnership_type: &str,
) -> Result<Option<PartnerLink>> {
    let sql = format!(
        "SELECT {PARTNER_LINK_COLUMNS} FROM journal_partner_links \
         WHERE journal_id = ?1 AND partner_id = ?2 AND partnership_type = ?3"
    );
    conn.query_row(
        &sql,
        params![journal_id, partner_id, partnership_type],
        row_to_partner_link,
    )
    .optional()
    .context("find_partner_link")
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get_partner_link(conn: &Connection, link_id: i64) -> Result<Option<PartnerLink>> {
    let sql = format!("SELECT {PARTNER_LINK_COLUMNS} FROM journal_partner_links WHERE link_id = ?1");
    conn.query_row(&sql, params![link_id], row_to_partner_link)
        .optional()
        .with_context(|| format!("get_partner_link {link_id}"))
}

/// Two-way partner links recorded at `journal_id`, ordered by partner then type.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_partner_links_for_journal(
    conn: &Connection,
    journal_id: &str,
) -> Result<Vec<PartnerLink>> {
    let sql = format!(
        "SELECT {PARTNER_LINK_COLUMNS} FROM journal_partner_links \
         WHERE journal_id = ?1 ORDER BY partner_id ASC, partnership_type ASC"
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("prepare list_partner_links_for_journal")?;
    let rows = stmt
        .query_map(params![journal_id], row_to_partner_link)
        .context("execute list_partner_links_for_journal")?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row.context("read partner link row")?);
    }
    Ok(links)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn find_good_link(conn: &Connection, journal_id: &str, good_id: &str) -> Result<Option<GoodLink>> {
    conn.query_row(
        "SELECT link_id, journal_id, good_id, created_at_us FROM journal_good_links \
         WHERE journal_id = ?1 AND good_id = ?2",
        params![journal_id, good_id],
        row_to_good_link,
    )
    .optional()
    .context("find_good_link")
}

/// Two-way good links recorded at `journal_id`, ordered by good id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_good_links_for_journal(conn: &Connection, journal_id: &str) -> Result<Vec<GoodLink>> {
    let mut stmt = conn
        .prepare(
            "SELECT link_id, journal_id, good_id, created_at_us FROM journal_good_links \
             WHERE journal_id = ?1 ORDER BY good_id ASC",
        )
        .context("prepare list_good_links_for_journal")?;
    let rows = stmt
        .query_map(params![journal_id], row_to_good_link)
        .context("execute list_good_links_for_journal")?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row.context("read good link row")?);
    }
    Ok(links)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get_full_link(conn: &Connection, link_id: i64) -> Result<Option<FullLink>> {
    let sql = format!("SELECT {FULL_LINK_COLUMNS} FROM journal_partner_good_links WHERE link_id = ?1");
    conn.query_row(&sql, params![link_id], row_to_full_link)
        .optional()
        .with_context(|| format!("get_full_link {link_id}"))
}

/// Look up a three-way link by its natural key.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_full_link(
    conn: &Connection,
    partner_link_id: i64,
    good_id: &str,
) -> Result<Option<FullLink>> {
    let sql = format!(
        "SELECT {FULL_LINK_COLUMNS} FROM journal_partner_good_links \
         WHERE partner_link_id = ?1 AND good_id = ?2"
    );
    conn.query_row(&sql, params![partner_link_id, good_id], row_to_full_link)
        .optional()
        .context("find_full_link")
}

/// Three-way links hanging off one two-way partner link, ordered by good id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_full_links_for_partner_link(
    conn: &Connection,
    partner_link_id: i64,
) -> Result<Vec<FullLink>> {
    let sql = format!(
        "SELECT {FULL_LINK_COLUMNS} FROM journal_partner_good_links \
         WHERE partner_link_id = ?1 ORDER BY good_id ASC"
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("prepare list_full_links_for_partner_link")?;
    let rows = stmt
        .query_map(params![partner_link_id], row_to_full_link)
        .context("execute list_full_links_for_partner_link")?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row.context("read full link row")?);
    }
    Ok(links)
}

/// Two-way partner links that carry a three-way link for `good_id`,
/// optionally restricted to one journal.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_partner_links_for_good(
    conn: &Connection,
    good_id: &str,
    journal_id: Option<&str>,
) -> Result<Vec<PartnerLink>> {
    let sql = "SELECT jp.link_id, jp.journal_id, jp.partner_id, jp.partnership_type, jp.created_at_us \
               FROM journal_partner_links jp \
               INNER JOIN journal_partner_good_links jpg ON jpg.partner_link_id = jp.link_id \
               WHERE jpg.good_id = ?1 AND (?2 IS NULL OR jp.journal_id = ?2) \
               ORDER BY jp.journal_id ASC, jp.partner_id ASC, jp.partnership_type ASC";
    let mut stmt = conn
        .prepare(sql)
        .context("prepare list_partner_links_for_good")?;
    let rows = stmt
        .query_map(params![good_id, journal_id], row_to_partner_link)
        .context("execute list_partner_links_for_good")?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row.context("read partner link row")?);
    }
    Ok(links)
}

/// Three-way links for `good_id` whose partner link sits at `journal_id`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_full_links_for_good_in_journal(
    conn: &Connection,
    good_id: &str,
    journal_id: &str,
) -> Result<Vec<FullLink>> {
    let sql = "SELECT jpg.link_id, jpg.partner_link_id, jpg.good_id, jpg.descriptive_text, \
               jpg.tax_code_id, jpg.created_at_us, jpg.updated_at_us \
               FROM journal_partner_good_links jpg \
               INNER JOIN journal_partner_links jp ON jp.link_id = jpg.partner_link_id \
               WHERE jpg.good_id = ?1 AND jp.journal_id = ?2 \
               ORDER BY jpg.link_id ASC";
    let mut stmt = conn
        .prepare(sql)
        .context("prepare list_full_links_for_good_in_journal")?;
    let rows = stmt
        .query_map(params![good_id, journal_id], row_to_full_link)
        .context("execute list_full_links_for_good_in_journal")?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row.context("read full link row")?);
    }
    Ok(links)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Encode ids as one JSON array parameter, read back in SQL with
/// `json_each`. A single bound value keeps arbitrarily long id lists clear
/// of SQLite's host-parameter limit.
pub(crate) fn id_list<T: Serialize>(ids: &[T]) -> Result<String> {
    serde_json::to_string(ids).context("encode id list")
}

fn row_to_journal(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalNode> {
    Ok(JournalNode {
        journal_id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        is_terminal: row.get::<_, i64>(3)? != 0,
        created_at_us: row.get(4)?,
        updated_at_us: row.get(5)?,
    })
}

fn row_to_good(row: &rusqlite::Row<'_>) -> rusqlite::Result<Good> {
    Ok(Good {
        good_id: row.get(0)?,
        label: row.get(1)?,
        default_tax_code_id: row.get(2)?,
    })
}

pub(crate) fn row_to_partner_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartnerLink> {
    Ok(PartnerLink {
        link_id: row.get(0)?,
        journal_id: row.get(1)?,
        partner_id: row.get(2)?,
        partnership_type: row.get(3)?,
        created_at_us: row.get(4)?,
    })
}

fn row_to_good_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<GoodLink> {
    Ok(GoodLink {
        link_id: row.get(0)?,
        journal_id: row.get(1)?,
        good_id: row.get(2)?,
        created_at_us: row.get(3)?,
    })
}

fn row_to_full_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<FullLink> {
    Ok(FullLink {
        link_id: row.get(0)?,
        partner_link_id: row.get(1)?,
        good_id: row.get(2)?,
        descriptive_text: row.get(3)?,
        tax_code_id: row.get(4)?,
        created_at_us: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
