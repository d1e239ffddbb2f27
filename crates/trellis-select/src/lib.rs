#![forbid(unsafe_code)]
//! trellis-select library.
//!
//! Client-side state for a row of dependent pickers (journal, partner, good,
//! document). Each picker's options are filtered by the selections of the
//! pickers before it, so changing one selection invalidates everything
//! downstream. Transitions are pure: [`reduce`] takes a state and a
//! [`Command`] and returns the next state.
//!
//! # Conventions
//!
//! - **Errors**: rejected commands return [`SelectError`]; the input state is
//!   never modified.
//! - **Logging**: `tracing` at `debug` for cascades and evictions.

pub mod error;
pub mod fetch;
pub mod journal;
pub mod role;
pub mod state;

pub use error::SelectError;
pub use fetch::FetchTicket;
pub use journal::JournalSelection;
pub use role::Role;
pub use state::{Command, SelectionState, reduce};
