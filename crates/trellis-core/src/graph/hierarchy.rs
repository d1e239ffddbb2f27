//! Journal hierarchy: parent-pointer forest stored in SQLite.
//!
//! This module answers and maintains the structural questions the rest of
//! the engine relies on:
//!
//! - What is the root-to-node path of a journal? ([`ancestors`])
//! - Which journals sit underneath a journal? ([`descendants`])
//! - Can a journal be moved under another one? ([`validate_move`])
//! - Delete a set of journals without ever removing a node that still has
//!   live children ([`delete_safely`]).
//!
//! # Terminal flag
//!
//! `is_terminal` is derived state: true exactly when the node has no
//! children. Every mutation that adds or removes a child recomputes the flag
//! of the affected parent inside the same transaction.
//!
//! # Cycle prevention
//!
//! [`validate_move`] rejects a new parent that is the node itself or one of
//! its descendants. Closure walks are still guarded against cycles so that
//! hand-edited data cannot hang a query.

#![allow(clippy::module_name_repetitions)]

use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::db::{self, query};
use crate::error::{RecordKind, TrellisError};
use crate::model::{JournalNode, validate_journal_id};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which journals [`delete_safely`] should remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    /// Every journal in the store.
    All,
    /// The listed journals. Ids that no longer exist are skipped.
    Ids(Vec<String>),
}

/// Outcome of a successful [`delete_safely`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Deleted ids in deletion order (leaves first).
    pub deleted: Vec<String>,
    /// Number of pruning passes that ran.
    pub passes: usize,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetch one journal.
///
/// # Errors
///
/// [`TrellisError::NotFound`] if the journal does not exist.
pub fn get(conn: &Connection, journal_id: &str) -> Result<JournalNode, TrellisError> {
    query::get_journal(conn, journal_id)?
        .ok_or_else(|| TrellisError::not_found(RecordKind::Journal, journal_id))
}

/// Direct children of a journal, ordered by code.
///
/// # Errors
///
/// [`TrellisError::NotFound`] if the journal does not exist.
pub fn children(conn: &Connection, journal_id: &str) -> Result<Vec<JournalNode>, TrellisError> {
    require_journal(conn, journal_id)?;
    Ok(query::get_children(conn, journal_id)?)
}

/// Root journals, ordered by code.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn roots(conn: &Connection) -> Result<Vec<JournalNode>, TrellisError> {
    Ok(query::list_roots(conn)?)
}

/// Ancestor path of a journal ordered root → … → `journal_id`, inclusive.
///
/// Returns an empty path when the journal does not exist.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn ancestor_ids(conn: &Connection, journal_id: &str) -> Result<Vec<String>, TrellisError> {
    let mut path = query::ancestor_ids(conn, journal_id)?;
    path.reverse();
    Ok(path)
}

/// Like [`ancestor_ids`] but returns full records.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn ancestors(conn: &Connection, journal_id: &str) -> Result<Vec<JournalNode>, TrellisError> {
    let mut nodes = Vec::new();
    for id in ancestor_ids(conn, journal_id)? {
        if let Some(node) = query::get_journal(conn, &id)? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

/// Descendant closure of a journal, including the journal itself, sorted
/// by code. Empty when the journal does not exist.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn descendants(conn: &Connection, journal_id: &str) -> Result<Vec<String>, TrellisError> {
    Ok(query::descendant_closure(conn, &[journal_id.to_string()])?)
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Create a journal under `parent_id` (or as a root).
///
/// The new node starts terminal; the parent's terminal flag is cleared.
///
/// # Errors
///
/// - [`TrellisError::Validation`] for a malformed id or blank name
/// - [`TrellisError::NotFound`] if `parent_id` is given but absent
/// - [`TrellisError::Conflict`] if `journal_id` is already taken
pub fn insert(
    conn: &Connection,
    journal_id: &str,
    name: &str,
    parent_id: Option<&str>,
) -> Result<JournalNode, TrellisError> {
    validate_journal_id(journal_id)?;
    let name = validate_name(name)?;
    if let Some(parent) = parent_id {
        require_journal(conn, parent)?;
    }

    let now = db::now_us();
    let tx = conn.unchecked_transaction()?;
    let inserted = tx.execute(
        "INSERT INTO journals (journal_id, name, parent_id, is_terminal, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, 1, ?4, ?4)",
        params![journal_id, name, parent_id, now],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if db::is_unique_violation(&e) => {
            return Err(TrellisError::conflict(RecordKind::Journal, journal_id));
        }
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = parent_id {
        refresh_terminal(&tx, parent, now)?;
    }
    tx.commit()?;

    info!(journal_id, parent_id = parent_id.unwrap_or("-"), "journal created");
    get(conn, journal_id)
}

/// Change a journal's display name.
///
/// # Errors
///
/// [`TrellisError::NotFound`] if the journal does not exist, or
/// [`TrellisError::Validation`] for a blank name.
pub fn rename(conn: &Connection, journal_id: &str, name: &str) -> Result<JournalNode, TrellisError> {
    let name = validate_name(name)?;
    let changed = conn.execute(
        "UPDATE journals SET name = ?2, updated_at_us = ?3 WHERE journal_id = ?1",
        params![journal_id, name, db::now_us()],
    )?;
    if changed == 0 {
        return Err(TrellisError::not_found(RecordKind::Journal, journal_id));
    }
    get(conn, journal_id)
}

/// Check that `journal_id` may be moved under `new_parent_id`.
///
/// # Errors
///
/// - [`TrellisError::NotFound`] if either journal is absent
/// - [`TrellisError::CycleDetected`] if the new parent is the journal itself
///   or one of its descendants
pub fn validate_move(
    conn: &Connection,
    journal_id: &str,
    new_parent_id: &str,
) -> Result<(), TrellisError> {
    require_journal(conn, journal_id)?;
    require_journal(conn, new_parent_id)?;

    let subtree = descendants(conn, journal_id)?;
    if subtree.iter().any(|id| id == new_parent_id) {
        return Err(TrellisError::CycleDetected {
            journal_id: journal_id.to_string(),
            proposed_parent: new_parent_id.to_string(),
        });
    }
    Ok(())
}

/// Reparent a journal (`None` makes it a root). Terminal flags of the old
/// and new parent are recomputed.
///
/// Links already propagated to the old ancestor chain are left in place;
/// they record history, not structure.
///
/// # Errors
///
/// See [`validate_move`].
pub fn move_to(
    conn: &Connection,
    journal_id: &str,
    new_parent_id: Option<&str>,
) -> Result<JournalNode, TrellisError> {
    let node = get(conn, journal_id)?;
    if let Some(parent) = new_parent_id {
        validate_move(conn, journal_id, parent)?;
    }
    if node.parent_id.as_deref() == new_parent_id {
        return Ok(node);
    }

    let now = db::now_us();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE journals SET parent_id = ?2, updated_at_us = ?3 WHERE journal_id = ?1",
        params![journal_id, new_parent_id, now],
    )?;
    if let Some(old) = node.parent_id.as_deref() {
        refresh_terminal(&tx, old, now)?;
    }
    if let Some(new) = new_parent_id {
        refresh_terminal(&tx, new, now)?;
    }
    tx.commit()?;

    info!(
        journal_id,
        from = node.parent_id.as_deref().unwrap_or("-"),
        to = new_parent_id.unwrap_or("-"),
        "journal moved"
    );
    get(conn, journal_id)
}

/// Delete journals by iterative leaf pruning.
///
/// Each pass deletes every targeted journal that currently has zero
/// children, then recomputes the terminal flag of each surviving parent.
/// Passes repeat until the target set is empty.
///
/// The whole call is one transaction: on error nothing is deleted.
///
/// # Errors
///
/// [`TrellisError::InvariantViolation`] when a pass makes no progress while
/// targets remain (a target has a child outside the target set, or the
/// parent graph contains a cycle), or when `max_passes` is exhausted.
pub fn delete_safely(
    conn: &Connection,
    target: &DeleteTarget,
    max_passes: usize,
) -> Result<DeleteReport, TrellisError> {
    let tx = conn.unchecked_transaction()?;

    let mut remaining: BTreeSet<String> = match target {
        DeleteTarget::All => query::list_journals(&tx)?
            .into_iter()
            .map(|j| j.journal_id)
            .collect(),
        DeleteTarget::Ids(ids) => query::existing_journal_ids(&tx, ids)?.into_iter().collect(),
    };

    let mut report = DeleteReport::default();
    while !remaining.is_empty() {
        if report.passes >= max_passes {
            warn!(passes = report.passes, remaining = remaining.len(), "delete pass limit reached");
            return Err(TrellisError::InvariantViolation(format!(
                "gave up after {max_passes} passes with {} journals remaining: {}",
                remaining.len(),
                join_ids(&remaining)
            )));
        }
        report.passes += 1;

        let mut leaves = Vec::new();
        for id in &remaining {
            if query::count_children(&tx, id)? == 0 {
                leaves.push(id.clone());
            }
        }
        if leaves.is_empty() {
            warn!(pass = report.passes, remaining = remaining.len(), "delete pass made no progress");
            return Err(TrellisError::InvariantViolation(format!(
                "no deletable leaf among {} remaining journals (cycle or child outside the delete set): {}",
                remaining.len(),
                join_ids(&remaining)
            )));
        }

        let now = db::now_us();
        let mut parents = BTreeSet::new();
        for id in &leaves {
            let parent: Option<String> = tx.query_row(
                "SELECT parent_id FROM journals WHERE journal_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            tx.execute("DELETE FROM journals WHERE journal_id = ?1", params![id])?;
            remaining.remove(id);
            if let Some(parent) = parent {
                parents.insert(parent);
            }
        }
        // A parent always had a child at the start of the pass, so it is
        // never among this pass's leaves.
        for parent in &parents {
            refresh_terminal(&tx, parent, now)?;
        }

        debug!(pass = report.passes, deleted = leaves.len(), "delete pass complete");
        report.deleted.extend(leaves);
    }

    tx.commit()?;
    info!(deleted = report.deleted.len(), passes = report.passes, "journals deleted");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_journal(conn: &Connection, journal_id: &str) -> Result<(), TrellisError> {
    if query::journal_exists(conn, journal_id)? {
        Ok(())
    } else {
        Err(TrellisError::not_found(RecordKind::Journal, journal_id))
    }
}

fn validate_name(name: &str) -> Result<&str, TrellisError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TrellisError::Validation("journal name must not be blank".into()));
    }
    Ok(trimmed)
}

/// Recompute `is_terminal` for one journal from its current children.
fn refresh_terminal(conn: &Connection, journal_id: &str, now: i64) -> Result<(), TrellisError> {
    conn.execute(
        "UPDATE journals
         SET is_terminal = NOT EXISTS (SELECT 1 FROM journals c WHERE c.parent_id = ?1),
             updated_at_us = ?2
         WHERE journal_id = ?1",
        params![journal_id, now],
    )?;
    Ok(())
}

fn join_ids(ids: &BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::ErrorCode;

    // -----------------------------------------------------------------------
    // Test helpers
    // -----------------------------------------------------------------------

    fn test_db() -> Connection {
        open_in_memory().expect("open in-memory store")
    }

    /// 1 → 10 → {101, 102}, 1 → 11, 2
    fn seed(conn: &Connection) {
        insert(conn, "1", "Assets", None).unwrap();
        insert(conn, "10", "Cash", Some("1")).unwrap();
        insert(conn, "101", "Petty cash", Some("10")).unwrap();
        insert(conn, "102", "Bank", Some("10")).unwrap();
        insert(conn, "11", "Receivables", Some("1")).unwrap();
        insert(conn, "2", "Liabilities", None).unwrap();
    }

    // -----------------------------------------------------------------------
    // insert / get
    // -----------------------------------------------------------------------

    #[test]
    fn insert_clears_parent_terminal_flag() {
        let conn = test_db();
        let root = insert(&conn, "1", "Assets", None).unwrap();
        assert!(root.is_terminal);

        let child = insert(&conn, "10", "Cash", Some("1")).unwrap();
        assert!(child.is_terminal);
        assert!(!get(&conn, "1").unwrap().is_terminal);
    }

    #[test]
    fn insert_missing_parent_is_not_found() {
        let conn = test_db();
        let err = insert(&conn, "10", "Cash", Some("1")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn insert_duplicate_is_conflict() {
        let conn = test_db();
        insert(&conn, "1", "Assets", None).unwrap();
        let err = insert(&conn, "1", "Again", None).unwrap_err();
        assert!(matches!(err, TrellisError::Conflict { kind: RecordKind::Journal, .. }));
    }

    #[test]
    fn insert_rejects_bad_id_and_blank_name() {
        let conn = test_db();
        assert_eq!(
            insert(&conn, "1 0", "x", None).unwrap_err().code(),
            ErrorCode::ValidationFailed
        );
        assert_eq!(
            insert(&conn, "1", "   ", None).unwrap_err().code(),
            ErrorCode::ValidationFailed
        );
    }

    #[test]
    fn rename_updates_name() {
        let conn = test_db();
        seed(&conn);
        assert_eq!(rename(&conn, "10", " Cash on hand ").unwrap().name, "Cash on hand");
        assert!(matches!(
            rename(&conn, "404", "x"),
            Err(TrellisError::NotFound { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Closures
    // -----------------------------------------------------------------------

    #[test]
    fn ancestors_are_root_first() {
        let conn = test_db();
        seed(&conn);
        assert_eq!(ancestor_ids(&conn, "101").unwrap(), vec!["1", "10", "101"]);
        let names: Vec<_> = ancestors(&conn, "101")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["Assets", "Cash", "Petty cash"]);
        assert!(ancestor_ids(&conn, "missing").unwrap().is_empty());
    }

    #[test]
    fn descendants_include_self() {
        let conn = test_db();
        seed(&conn);
        assert_eq!(descendants(&conn, "1").unwrap(), vec!["1", "10", "101", "102", "11"]);
        assert_eq!(descendants(&conn, "2").unwrap(), vec!["2"]);
        assert!(descendants(&conn, "missing").unwrap().is_empty());
    }

    #[test]
    fn children_and_roots() {
        let conn = test_db();
        seed(&conn);
        let kids: Vec<_> = children(&conn, "10")
            .unwrap()
            .into_iter()
            .map(|n| n.journal_id)
            .collect();
        assert_eq!(kids, vec!["101", "102"]);
        let root_ids: Vec<_> = roots(&conn).unwrap().into_iter().map(|n| n.journal_id).collect();
        assert_eq!(root_ids, vec!["1", "2"]);
        assert!(children(&conn, "404").is_err());
    }

    // -----------------------------------------------------------------------
    // move
    // -----------------------------------------------------------------------

    #[test]
    fn move_under_descendant_is_cycle() {
        let conn = test_db();
        seed(&conn);
        let err = move_to(&conn, "1", Some("101")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CycleDetected);
        let err = move_to(&conn, "10", Some("10")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CycleDetected);
    }

    #[test]
    fn move_recomputes_terminal_flags() {
        let conn = test_db();
        seed(&conn);
        move_to(&conn, "11", Some("2")).unwrap();
        assert!(!get(&conn, "2").unwrap().is_terminal);

        move_to(&conn, "101", None).unwrap();
        move_to(&conn, "102", Some("2")).unwrap();
        assert!(get(&conn, "10").unwrap().is_terminal);
        assert!(get(&conn, "101").unwrap().is_root());
    }

    #[test]
    fn move_missing_parent_is_not_found() {
        let conn = test_db();
        seed(&conn);
        assert_eq!(
            move_to(&conn, "10", Some("9")).unwrap_err().code(),
            ErrorCode::NotFound
        );
    }

    // -----------------------------------------------------------------------
    // delete_safely
    // -----------------------------------------------------------------------

    #[test]
    fn delete_all_prunes_bottom_up() {
        let conn = test_db();
        seed(&conn);
        let report = delete_safely(&conn, &DeleteTarget::All, 64).unwrap();
        assert_eq!(report.passes, 3);
        assert_eq!(report.deleted.len(), 6);
        let pos = |id: &str| report.deleted.iter().position(|d| d == id).unwrap();
        assert!(pos("101") < pos("10"));
        assert!(pos("10") < pos("1"));
        assert!(query::list_journals(&conn).unwrap().is_empty());
    }

    #[test]
    fn delete_leaf_restores_parent_terminal() {
        let conn = test_db();
        seed(&conn);
        let report =
            delete_safely(&conn, &DeleteTarget::Ids(vec!["11".into()]), 64).unwrap();
        assert_eq!(report.passes, 1);
        assert!(!get(&conn, "1").unwrap().is_terminal);

        delete_safely(&conn, &DeleteTarget::Ids(vec!["101".into(), "102".into()]), 64).unwrap();
        assert!(get(&conn, "10").unwrap().is_terminal);
    }

    #[test]
    fn delete_with_untargeted_child_is_invariant_violation() {
        let conn = test_db();
        seed(&conn);
        let err = delete_safely(&conn, &DeleteTarget::Ids(vec!["10".into()]), 64).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code(), ErrorCode::InvariantViolation);
        // Nothing was removed.
        assert_eq!(query::list_journals(&conn).unwrap().len(), 6);
    }

    #[test]
    fn delete_reports_cycle_instead_of_looping() {
        let conn = test_db();
        insert(&conn, "1", "A", None).unwrap();
        insert(&conn, "2", "B", Some("1")).unwrap();
        conn.execute("UPDATE journals SET parent_id = '2' WHERE journal_id = '1'", [])
            .unwrap();

        let err = delete_safely(&conn, &DeleteTarget::All, 64).unwrap_err();
        assert!(matches!(err, TrellisError::InvariantViolation(_)));
    }

    #[test]
    fn delete_respects_pass_limit() {
        let conn = test_db();
        seed(&conn);
        let err = delete_safely(&conn, &DeleteTarget::All, 2).unwrap_err();
        assert!(matches!(err, TrellisError::InvariantViolation(msg) if msg.contains("2 passes")));
    }

    #[test]
    fn delete_skips_unknown_ids() {
        let conn = test_db();
        seed(&conn);
        let report = delete_safely(&conn, &DeleteTarget::Ids(vec!["nope".into()]), 64).unwrap();
        assert_eq!(report, DeleteReport::default());
    }
}
