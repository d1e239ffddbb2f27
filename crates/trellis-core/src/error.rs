use std::fmt;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    NotFound,
    Conflict,
    ValidationFailed,
    CycleDetected,
    InvariantViolation,
    StorageFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::NotFound => "E2001",
            Self::Conflict => "E2002",
            Self::ValidationFailed => "E2003",
            Self::CycleDetected => "E2004",
            Self::InvariantViolation => "E3001",
            Self::StorageFailure => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::NotFound => "Referenced record not found",
            Self::Conflict => "Record already exists",
            Self::ValidationFailed => "Invalid identifier or reference",
            Self::CycleDetected => "Hierarchy cycle would be created",
            Self::InvariantViolation => "Hierarchy or link invariant violated",
            Self::StorageFailure => "Database operation failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .trellis/config.toml and retry."),
            Self::NotFound | Self::Conflict => None,
            Self::ValidationFailed => {
                Some("Journal ids are 1-32 chars of [A-Za-z0-9._-]; partnership types are [A-Z0-9_].")
            }
            Self::CycleDetected => Some("Pick a new parent outside the subtree being moved."),
            Self::InvariantViolation => Some(
                "Inspect the journal hierarchy for cycles or children outside the delete set; do not retry blindly.",
            ),
            Self::StorageFailure => Some("Check that the store file is writable and not locked."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Journal,
    Partner,
    Good,
    TaxCode,
    PartnerLink,
    GoodLink,
    FullLink,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Journal => "journal",
            Self::Partner => "partner",
            Self::Good => "good",
            Self::TaxCode => "tax code",
            Self::PartnerLink => "journal-partner link",
            Self::GoodLink => "journal-good link",
            Self::FullLink => "journal-partner-good link",
        })
    }
}

/// Errors returned by trellis domain operations.
#[derive(Debug, thiserror::Error)]
pub enum TrellisError {
    /// A referenced journal, entity or link does not exist.
    #[error("{kind} not found: '{id}'")]
    NotFound { kind: RecordKind, id: String },

    /// A unique constraint rejected a create.
    #[error("{kind} already exists: {key}")]
    Conflict { kind: RecordKind, key: String },

    /// Malformed identifier or disallowed reference.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Moving a journal under itself or one of its descendants.
    #[error("moving journal '{journal_id}' under '{proposed_parent}' would create a cycle")]
    CycleDetected {
        journal_id: String,
        proposed_parent: String,
    },

    /// The store is in a state the engine refuses to repair automatically.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An underlying database error.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl TrellisError {
    pub(crate) fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn conflict(kind: RecordKind, key: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            key: key.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::CycleDetected { .. } => ErrorCode::CycleDetected,
            Self::InvariantViolation(_) => ErrorCode::InvariantViolation,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether callers should treat this error as fatal rather than a
    /// recoverable outcome.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::Storage(_))
    }
}

impl From<rusqlite::Error> for TrellisError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(anyhow::Error::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, RecordKind, TrellisError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::NotFound,
            ErrorCode::Conflict,
            ErrorCode::ValidationFailed,
            ErrorCode::CycleDetected,
            ErrorCode::InvariantViolation,
            ErrorCode::StorageFailure,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvariantViolation.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn not_found_display_names_kind_and_id() {
        let e = TrellisError::not_found(RecordKind::Good, "G-9");
        let s = e.to_string();
        assert!(s.contains("good"), "display: {s}");
        assert!(s.contains("G-9"), "display: {s}");
        assert_eq!(e.code(), ErrorCode::NotFound);
        assert!(!e.is_fatal());
    }

    #[test]
    fn invariant_violation_is_fatal() {
        let e = TrellisError::InvariantViolation("no progress".into());
        assert!(e.is_fatal());
        assert!(e.hint().is_some());
    }

    #[test]
    fn storage_wraps_sqlite_errors() {
        let e: TrellisError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(e.code(), ErrorCode::StorageFailure);
    }
}
