//! Two-way and three-way links between journals, partners and goods.
//!
//! ## Submodules
//!
//! - [`propagate`] — two-way links replicated up the ancestor chain, plus
//!   membership checks and deletion.
//! - [`resolver`] — find-or-create of the two-way partner link followed by
//!   creation of the three-way link, with a single refetch when a concurrent
//!   creator wins the race.
//!
//! Two-way creation is idempotent. Creating a three-way link that already
//! exists is a [`crate::TrellisError::Conflict`].

pub mod propagate;
pub mod resolver;

pub use propagate::{PropagationReport, link};
pub use resolver::{NewFullLink, create_full_link, create_link};

/// Outcome of a delete that treats a missing row as a normal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub(crate) const fn from_changes(changes: usize) -> Self {
        if changes == 0 { Self::NotFound } else { Self::Deleted }
    }
}
