use serde::{Deserialize, Serialize};

use crate::error::TrellisError;

/// Maximum length of a partner, good or tax code id.
pub const MAX_ENTITY_ID_LEN: usize = 64;

/// A trading partner. Only the label is modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub partner_id: String,
    pub name: String,
}

/// A tradable good with an optional default tax code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Good {
    pub good_id: String,
    pub label: String,
    pub default_tax_code_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCode {
    pub tax_code_id: String,
    pub label: String,
}

/// Check a surrogate entity id (partner, good, tax code).
///
/// # Errors
///
/// Returns [`TrellisError::Validation`] for empty ids, ids with surrounding
/// whitespace, or ids longer than [`MAX_ENTITY_ID_LEN`].
pub fn validate_entity_id(what: &str, id: &str) -> Result<(), TrellisError> {
    if id.is_empty() {
        return Err(TrellisError::Validation(format!("{what} id must not be empty")));
    }
    if id.trim() != id {
        return Err(TrellisError::Validation(format!(
            "{what} id '{id}' has surrounding whitespace"
        )));
    }
    if id.len() > MAX_ENTITY_ID_LEN {
        return Err(TrellisError::Validation(format!(
            "{what} id '{id}' exceeds {MAX_ENTITY_ID_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_trimmed_and_bounded() {
        assert!(validate_entity_id("partner", "P1").is_ok());
        assert!(validate_entity_id("partner", "").is_err());
        assert!(validate_entity_id("good", " G1").is_err());
        assert!(validate_entity_id("good", &"g".repeat(65)).is_err());
    }
}
