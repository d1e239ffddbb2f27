//! Journal hierarchy operations.
//!
//! ## Submodules
//!
//! - [`hierarchy`] — store-backed insert, move, closure lookups and safe
//!   leaf-pruning deletion.
//! - [`tree`] — in-memory arena snapshot of the hierarchy plus the
//!   [`tree::HierarchyView`] trait used by callers that only need parent
//!   lookups.

pub mod hierarchy;
pub mod tree;

pub use hierarchy::{DeleteReport, DeleteTarget};
pub use tree::{HierarchyView, JournalTree};
