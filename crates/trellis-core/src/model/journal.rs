use serde::{Deserialize, Serialize};

use crate::error::TrellisError;

/// Maximum length of a journal code.
pub const MAX_JOURNAL_ID_LEN: usize = 32;

/// A node of the journal classification forest.
///
/// `journal_id` is the business code (`"4"`, `"40"`, `"401"`); `is_terminal`
/// is maintained by the store and is true exactly when the node has no
/// children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalNode {
    pub journal_id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub is_terminal: bool,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl JournalNode {
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Check that `id` is a well-formed journal code.
///
/// # Errors
///
/// Returns [`TrellisError::Validation`] when the code is empty, too long, or
/// contains characters outside `[A-Za-z0-9._-]`.
pub fn validate_journal_id(id: &str) -> Result<(), TrellisError> {
    if id.is_empty() {
        return Err(TrellisError::Validation("journal id must not be empty".into()));
    }
    if id.len() > MAX_JOURNAL_ID_LEN {
        return Err(TrellisError::Validation(format!(
            "journal id '{id}' exceeds {MAX_JOURNAL_ID_LEN} characters"
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
    {
        return Err(TrellisError::Validation(format!(
            "journal id '{id}' contains invalid character {bad:?}"
        )));
    }
    Ok(())
}
