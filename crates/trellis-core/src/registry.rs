//! Partner, good and tax code rows.
//!
//! Only the attributes links need are stored: an id, a display label and a
//! good's default tax code.

use rusqlite::{Connection, params};
use tracing::info;

use crate::db::{self, query};
use crate::error::{RecordKind, TrellisError};
use crate::model::{Good, Partner, TaxCode, validate_entity_id};

/// # Errors
///
/// [`TrellisError::Validation`] for a malformed id or blank name,
/// [`TrellisError::Conflict`] if the id is taken.
pub fn insert_partner(conn: &Connection, partner_id: &str, name: &str) -> Result<Partner, TrellisError> {
    validate_entity_id("partner", partner_id)?;
    let name = require_label("partner name", name)?;
    insert_row(
        conn,
        "INSERT INTO partners (partner_id, name, created_at_us) VALUES (?1, ?2, ?3)",
        params![partner_id, name, db::now_us()],
        RecordKind::Partner,
        partner_id,
    )?;
    info!(partner_id, "partner created");
    Ok(Partner {
        partner_id: partner_id.to_string(),
        name: name.to_string(),
    })
}

/// # Errors
///
/// [`TrellisError::Validation`] for a malformed id or blank label,
/// [`TrellisError::NotFound`] for an unknown default tax code,
/// [`TrellisError::Conflict`] if the id is taken.
pub fn insert_good(
    conn: &Connection,
    good_id: &str,
    label: &str,
    default_tax_code_id: Option<&str>,
) -> Result<Good, TrellisError> {
    validate_entity_id("good", good_id)?;
    let label = require_label("good label", label)?;
    if let Some(tax) = default_tax_code_id {
        get_tax_code(conn, tax)?;
    }
    insert_row(
        conn,
        "INSERT INTO goods (good_id, label, default_tax_code_id, created_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![good_id, label, default_tax_code_id, db::now_us()],
        RecordKind::Good,
        good_id,
    )?;
    info!(good_id, "good created");
    Ok(Good {
        good_id: good_id.to_string(),
        label: label.to_string(),
        default_tax_code_id: default_tax_code_id.map(str::to_string),
    })
}

/// # Errors
///
/// [`TrellisError::Validation`] for a malformed id or blank label,
/// [`TrellisError::Conflict`] if the id is taken.
pub fn insert_tax_code(conn: &Connection, tax_code_id: &str, label: &str) -> Result<TaxCode, TrellisError> {
    validate_entity_id("tax code", tax_code_id)?;
    let label = require_label("tax code label", label)?;
    insert_row(
        conn,
        "INSERT INTO tax_codes (tax_code_id, label, created_at_us) VALUES (?1, ?2, ?3)",
        params![tax_code_id, label, db::now_us()],
        RecordKind::TaxCode,
        tax_code_id,
    )?;
    Ok(TaxCode {
        tax_code_id: tax_code_id.to_string(),
        label: label.to_string(),
    })
}

/// # Errors
///
/// [`TrellisError::NotFound`] if the partner does not exist.
pub fn get_partner(conn: &Connection, partner_id: &str) -> Result<Partner, TrellisError> {
    query::get_partner(conn, partner_id)?
        .ok_or_else(|| TrellisError::not_found(RecordKind::Partner, partner_id))
}

/// # Errors
///
/// [`TrellisError::NotFound`] if the good does not exist.
pub fn get_good(conn: &Connection, good_id: &str) -> Result<Good, TrellisError> {
    query::get_good(conn, good_id)?.ok_or_else(|| TrellisError::not_found(RecordKind::Good, good_id))
}

/// # Errors
///
/// [`TrellisError::NotFound`] if the tax code does not exist.
pub fn get_tax_code(conn: &Connection, tax_code_id: &str) -> Result<TaxCode, TrellisError> {
    query::get_tax_code(conn, tax_code_id)?
        .ok_or_else(|| TrellisError::not_found(RecordKind::TaxCode, tax_code_id))
}

fn require_label<'a>(what: &str, value: &'a str) -> Result<&'a str, TrellisError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrellisError::Validation(format!("{what} must not be blank")));
    }
    Ok(trimmed)
}

fn insert_row(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    kind: RecordKind,
    id: &str,
) -> Result<(), TrellisError> {
    match conn.execute(sql, params) {
        Ok(_) => Ok(()),
        Err(e) if db::is_unique_violation(&e) => Err(TrellisError::conflict(kind, id)),
        Err(e) => Err(e.into()),
    }
}
