use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::SelectError;

/// A picker in the selection chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Journal,
    Partner,
    Good,
    Document,
}

impl Role {
    /// Every role, in the default chain order.
    pub const ALL: [Self; 4] = [Self::Journal, Self::Partner, Self::Good, Self::Document];

    /// Roles whose selection is a single entity id rather than a journal
    /// multi-level selection.
    #[must_use]
    pub const fn is_entity(self) -> bool {
        !matches!(self, Self::Journal)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Journal => "journal",
            Self::Partner => "partner",
            Self::Good => "good",
            Self::Document => "document",
        })
    }
}

impl FromStr for Role {
    type Err = SelectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "journal" => Ok(Self::Journal),
            "partner" => Ok(Self::Partner),
            "good" => Ok(Self::Good),
            "document" => Ok(Self::Document),
            _ => Err(SelectError::UnknownRole(s.to_string())),
        }
    }
}
