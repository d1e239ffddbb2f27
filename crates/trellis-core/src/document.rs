//! Document line assembly from resolved three-way links.
//!
//! A document (invoice, quote, ...) for a journal and partner lists goods
//! with quantities. Each requested good must already be attached to the
//! partner link through a three-way link; assembly only looks links up and
//! never creates them. The line's description and tax code come from the
//! link when it carries them, otherwise from the good.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::batch::{self, BatchReport};
use crate::db::query;
use crate::error::{RecordKind, TrellisError};
use crate::links::resolver;
use crate::model::PartnershipType;

/// One requested good and its quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRequest {
    pub good_id: String,
    pub quantity: f64,
}

impl LineRequest {
    #[must_use]
    pub fn new(good_id: &str, quantity: f64) -> Self {
        Self {
            good_id: good_id.to_string(),
            quantity,
        }
    }
}

/// A resolved document line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentLine {
    /// Id of the three-way link the line was resolved from.
    pub link_id: i64,
    pub good_id: String,
    pub description: String,
    pub tax_code_id: Option<String>,
    pub quantity: f64,
}

/// Resolve every request against the (journal, partner, type) context.
///
/// Lines fail independently: a good without a three-way link in this
/// context yields a [`TrellisError::NotFound`] at its index, a quantity that
/// is not strictly positive yields a [`TrellisError::Validation`].
///
/// # Errors
///
/// Propagates [`TrellisError::InvariantViolation`].
pub fn assemble_lines(
    conn: &Connection,
    journal_id: &str,
    partner_id: &str,
    partnership_type: &PartnershipType,
    requests: &[LineRequest],
) -> Result<BatchReport<DocumentLine>, TrellisError> {
    batch::run("assemble_lines", requests, |req| {
        resolve_line(conn, journal_id, partner_id, partnership_type, req)
    })
}

fn resolve_line(
    conn: &Connection,
    journal_id: &str,
    partner_id: &str,
    partnership_type: &PartnershipType,
    req: &LineRequest,
) -> Result<DocumentLine, TrellisError> {
    if !(req.quantity.is_finite() && req.quantity > 0.0) {
        return Err(TrellisError::Validation(format!(
            "quantity for good '{}' must be positive, got {}",
            req.good_id, req.quantity
        )));
    }

    let link = resolver::find_full_link(conn, journal_id, partner_id, partnership_type, &req.good_id)?
        .ok_or_else(|| {
            TrellisError::not_found(
                RecordKind::FullLink,
                format!("{journal_id}/{partner_id}/{partnership_type}/{}", req.good_id),
            )
        })?;
    let good = query::get_good(conn, &req.good_id)?
        .ok_or_else(|| TrellisError::not_found(RecordKind::Good, &req.good_id))?;

    Ok(DocumentLine {
        link_id: link.link_id,
        description: link.descriptive_text.unwrap_or(good.label),
        tax_code_id: link.tax_code_id.or(good.default_tax_code_id),
        good_id: good.good_id,
        quantity: req.quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchStatus;
    use crate::db::open_in_memory;
    use crate::error::ErrorCode;
    use crate::graph::hierarchy;
    use crate::links::{NewFullLink, create_full_link};
    use crate::registry;

    fn seeded() -> Connection {
        let conn = open_in_memory().unwrap();
        hierarchy::insert(&conn, "7", "Sales", None).unwrap();
        hierarchy::insert(&conn, "70", "Hardware", Some("7")).unwrap();
        registry::insert_partner(&conn, "C1", "Customer").unwrap();
        registry::insert_tax_code(&conn, "VAT20", "VAT 20%").unwrap();
        registry::insert_tax_code(&conn, "VAT5", "VAT 5%").unwrap();
        registry::insert_good(&conn, "G1", "Bolt", Some("VAT20")).unwrap();
        registry::insert_good(&conn, "G2", "Nut", Some("VAT20")).unwrap();
        registry::insert_good(&conn, "G3", "Washer", None).unwrap();

        let std = PartnershipType::standard();
        create_full_link(&conn, &NewFullLink::new("70", "C1", "G1", std.clone())).unwrap();
        create_full_link(
            &conn,
            &NewFullLink::new("70", "C1", "G2", std)
                .with_text("Hex nut M8")
                .with_tax_code("VAT5"),
        )
        .unwrap();
        conn
    }

    #[test]
    fn link_attributes_override_good_defaults() {
        let conn = seeded();
        let report = assemble_lines(
            &conn,
            "70",
            "C1",
            &PartnershipType::standard(),
            &[LineRequest::new("G1", 2.0), LineRequest::new("G2", 10.0)],
        )
        .unwrap();
        assert_eq!(report.status(), BatchStatus::Success);

        let lines: Vec<_> = report.succeeded.into_iter().map(|(_, l)| l).collect();
        assert_eq!(lines[0].description, "Bolt");
        assert_eq!(lines[0].tax_code_id.as_deref(), Some("VAT20"));
        assert_eq!(lines[1].description, "Hex nut M8");
        assert_eq!(lines[1].tax_code_id.as_deref(), Some("VAT5"));
        assert!((lines[1].quantity - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unlinked_good_and_bad_quantity_fail_per_line() {
        let conn = seeded();
        let report = assemble_lines(
            &conn,
            "70",
            "C1",
            &PartnershipType::standard(),
            &[
                LineRequest::new("G3", 1.0),
                LineRequest::new("G1", 0.0),
                LineRequest::new("G1", 1.5),
            ],
        )
        .unwrap();
        assert_eq!(report.status(), BatchStatus::Partial);
        assert_eq!(report.error_at(0).map(TrellisError::code), Some(ErrorCode::NotFound));
        assert_eq!(
            report.error_at(1).map(TrellisError::code),
            Some(ErrorCode::ValidationFailed)
        );
        assert_eq!(report.succeeded.len(), 1);
    }

    #[test]
    fn assembly_never_creates_links() {
        let conn = seeded();
        let report = assemble_lines(
            &conn,
            "7",
            "C1",
            &PartnershipType::standard(),
            &[LineRequest::new("G1", 1.0)],
        )
        .unwrap();
        assert_eq!(report.status(), BatchStatus::AllFailed);
        assert!(query::find_partner_link(&conn, "7", "C1", "STANDARD").unwrap().is_none());
    }
}
