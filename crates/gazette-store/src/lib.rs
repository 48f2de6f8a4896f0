//! # gazette-store
//!
//! SQLite-backed storage for the Gazette application.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model.  Relationship-set fields (`followers`, `following`,
//! `follow_requests`, `likes`, `dislikes`) are stored as JSON arrays and
//! mutated only through commutative set-union / set-remove operations; every
//! multi-row mutation runs inside a single SQL transaction, so a failure
//! leaves no partial state behind.
//!
//! Every committed mutation is published on the [`ChangeFeed`], a broadcast
//! channel interested readers subscribe to instead of polling.

pub mod chats;
pub mod comments;
pub mod database;
pub mod events;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod relationships;
pub mod users;

mod error;

#[cfg(test)]
pub(crate) mod testutil;

pub use database::Database;
pub use error::StoreError;
pub use events::{ChangeFeed, StoreEvent};
pub use models::*;
