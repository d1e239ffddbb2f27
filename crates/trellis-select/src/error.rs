use crate::role::Role;

/// Reasons a selection command is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("role order must list every role exactly once, got {0:?}")]
    InvalidOrder(Vec<Role>),

    #[error("{0} is not an entity role")]
    NotEntityRole(Role),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("{0} picker is hidden")]
    HiddenRole(Role),

    #[error("journal '{0}' is not in the hierarchy")]
    UnknownJournal(String),
}
