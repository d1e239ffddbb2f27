#![forbid(unsafe_code)]
//! trellis-core library.
//!
//! Journal hierarchy maintenance, ancestor-propagated two-way links,
//! race-safe three-way link resolution and descendant-closure queries over a
//! SQLite store.
//!
//! # Conventions
//!
//! - **Errors**: domain operations return [`error::TrellisError`]; internal
//!   query helpers use `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod batch;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod graph;
pub mod links;
pub mod logging;
pub mod model;
pub mod query;
pub mod registry;

pub use error::{ErrorCode, TrellisError};
