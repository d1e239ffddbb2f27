//! Stale-response guard for option fetches.
//!
//! A picker's options are loaded asynchronously from the selections
//! upstream of it. Take a [`FetchTicket`] when the request goes out and
//! hand it back with the response: if any upstream selection changed in
//! between, the role's epoch has moved on and the response is discarded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::role::Role;
use crate::state::SelectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTicket {
    pub role: Role,
    pub epoch: u64,
}

impl SelectionState {
    /// Ticket for an options fetch for `role` issued now.
    #[must_use]
    pub fn ticket(&self, role: Role) -> FetchTicket {
        FetchTicket {
            role,
            epoch: self.epoch(role),
        }
    }

    /// Whether a response fetched under `ticket` still matches this state.
    #[must_use]
    pub fn accepts(&self, ticket: &FetchTicket) -> bool {
        self.epoch(ticket.role) == ticket.epoch
    }

    /// Pass `payload` through when `ticket` is current, drop it otherwise.
    pub fn admit<T>(&self, ticket: &FetchTicket, payload: T) -> Option<T> {
        if self.accepts(ticket) {
            Some(payload)
        } else {
            debug!(
                role = %ticket.role,
                issued = ticket.epoch,
                current = self.epoch(ticket.role),
                "discarding stale fetch"
            );
            None
        }
    }
}
