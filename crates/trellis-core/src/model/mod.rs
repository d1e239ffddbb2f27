//! Domain records and identifier rules.

pub mod entity;
pub mod journal;
pub mod link;

pub use entity::{Good, Partner, TaxCode, validate_entity_id};
pub use journal::{JournalNode, validate_journal_id};
pub use link::{EntityType, FullLink, GoodLink, LinkRequest, PartnerLink, PartnershipType};
