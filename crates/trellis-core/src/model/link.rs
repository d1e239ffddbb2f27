use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::TrellisError;

/// Qualifier distinguishing several links between the same journal and
/// partner (`STANDARD`, `SUPPLIER`, `CUSTOMER`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartnershipType(String);

impl PartnershipType {
    pub const MAX_LEN: usize = 32;

    #[must_use]
    pub fn standard() -> Self {
        Self("STANDARD".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PartnershipType {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > Self::MAX_LEN {
            return Err(TrellisError::Validation(format!(
                "partnership type must be 1-{} characters, got '{s}'",
                Self::MAX_LEN
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(TrellisError::Validation(format!(
                "partnership type '{s}' must use only A-Z, 0-9 and '_'"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for PartnershipType {
    type Error = TrellisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartnershipType> for String {
    fn from(value: PartnershipType) -> Self {
        value.0
    }
}

impl fmt::Display for PartnershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a two-way link an entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Partner,
    Good,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Partner => "partner",
            Self::Good => "good",
        })
    }
}

impl FromStr for EntityType {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "partner" => Ok(Self::Partner),
            "good" => Ok(Self::Good),
            other => Err(TrellisError::Validation(format!(
                "unknown entity type '{other}': expected partner or good"
            ))),
        }
    }
}

/// Input to the link propagator: associate an entity with a journal and
/// all of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub journal_id: String,
    /// Ignored for goods; partners fall back to the configured default.
    pub partnership_type: Option<PartnershipType>,
}

impl LinkRequest {
    #[must_use]
    pub fn partner(partner_id: &str, journal_id: &str, kind: Option<PartnershipType>) -> Self {
        Self {
            entity_id: partner_id.to_string(),
            entity_type: EntityType::Partner,
            journal_id: journal_id.to_string(),
            partnership_type: kind,
        }
    }

    #[must_use]
    pub fn good(good_id: &str, journal_id: &str) -> Self {
        Self {
            entity_id: good_id.to_string(),
            entity_type: EntityType::Good,
            journal_id: journal_id.to_string(),
            partnership_type: None,
        }
    }
}

/// Two-way journal ↔ partner link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerLink {
    pub link_id: i64,
    pub journal_id: String,
    pub partner_id: String,
    pub partnership_type: String,
    pub created_at_us: i64,
}

/// Two-way journal ↔ good link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodLink {
    pub link_id: i64,
    pub journal_id: String,
    pub good_id: String,
    pub created_at_us: i64,
}

/// Three-way journal × partner × good fact, stored as a good attached to a
/// [`PartnerLink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullLink {
    pub link_id: i64,
    pub partner_link_id: i64,
    pub good_id: String,
    pub descriptive_text: Option<String>,
    pub tax_code_id: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}
