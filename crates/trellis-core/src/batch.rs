//! Bulk link operations with per-item failure isolation.
//!
//! Every item runs on its own; a failing item is recorded with its input
//! index and the remaining items still run. The exception is
//! [`TrellisError::InvariantViolation`]: the store is in a state the engine
//! refuses to reason about, so the batch stops and the error propagates.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::LinkConfig;
use crate::error::TrellisError;
use crate::links::{self, DeleteOutcome, NewFullLink, PropagationReport, propagate, resolver};
use crate::model::{FullLink, LinkRequest};

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every item succeeded (also reported for an empty batch).
    Success,
    /// At least one item succeeded and at least one failed.
    Partial,
    /// Every item failed.
    AllFailed,
}

/// A failed item and the index it had in the input.
#[derive(Debug)]
pub struct ItemError {
    pub index: usize,
    pub error: TrellisError,
}

/// Per-item results of a batch.
#[derive(Debug)]
pub struct BatchReport<T> {
    /// Successful items as `(input index, value)`, in input order.
    pub succeeded: Vec<(usize, T)>,
    /// Failed items, in input order.
    pub failed: Vec<ItemError>,
}

impl<T> BatchReport<T> {
    #[must_use]
    pub fn status(&self) -> BatchStatus {
        match (self.succeeded.is_empty(), self.failed.is_empty()) {
            (_, true) => BatchStatus::Success,
            (false, false) => BatchStatus::Partial,
            (true, false) => BatchStatus::AllFailed,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Error recorded for input `index`, if that item failed.
    #[must_use]
    pub fn error_at(&self, index: usize) -> Option<&TrellisError> {
        self.failed
            .iter()
            .find(|f| f.index == index)
            .map(|f| &f.error)
    }
}

/// Run `op` over every item, isolating failures.
///
/// # Errors
///
/// Propagates the first [`TrellisError::InvariantViolation`].
pub(crate) fn run<I, T>(
    label: &str,
    items: impl IntoIterator<Item = I>,
    mut op: impl FnMut(I) -> Result<T, TrellisError>,
) -> Result<BatchReport<T>, TrellisError> {
    let mut report = BatchReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (index, item) in items.into_iter().enumerate() {
        match op(item) {
            Ok(value) => report.succeeded.push((index, value)),
            Err(error @ TrellisError::InvariantViolation(_)) => {
                warn!(batch = label, index, %error, "aborting batch");
                return Err(error);
            }
            Err(error) => {
                warn!(batch = label, index, %error, "batch item failed");
                report.failed.push(ItemError { index, error });
            }
        }
    }
    info!(
        batch = label,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch complete"
    );
    Ok(report)
}

/// Propagate every link request.
///
/// # Errors
///
/// Propagates [`TrellisError::InvariantViolation`].
pub fn bulk_link(
    conn: &Connection,
    requests: &[LinkRequest],
    config: &LinkConfig,
) -> Result<BatchReport<PropagationReport>, TrellisError> {
    run("bulk_link", requests, |req| links::link(conn, req, config))
}

/// Create every three-way link.
///
/// # Errors
///
/// Propagates [`TrellisError::InvariantViolation`].
pub fn bulk_create_full_links(
    conn: &Connection,
    requests: &[NewFullLink],
) -> Result<BatchReport<FullLink>, TrellisError> {
    run("bulk_create_full_links", requests, |req| {
        links::create_full_link(conn, req)
    })
}

/// Delete partner links by id. Missing ids succeed with
/// [`DeleteOutcome::NotFound`].
///
/// # Errors
///
/// Propagates [`TrellisError::InvariantViolation`].
pub fn bulk_delete_partner_links(
    conn: &Connection,
    link_ids: &[i64],
) -> Result<BatchReport<DeleteOutcome>, TrellisError> {
    run("bulk_delete_partner_links", link_ids, |id| {
        propagate::delete_partner_link(conn, *id)
    })
}

/// Delete three-way links by id. Missing ids succeed with
/// [`DeleteOutcome::NotFound`].
///
/// # Errors
///
/// Propagates [`TrellisError::InvariantViolation`].
pub fn bulk_delete_full_links(
    conn: &Connection,
    link_ids: &[i64],
) -> Result<BatchReport<DeleteOutcome>, TrellisError> {
    run("bulk_delete_full_links", link_ids, |id| {
        resolver::delete_by_id(conn, *id)
    })
}
