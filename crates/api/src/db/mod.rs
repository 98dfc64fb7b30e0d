//! Shared database schema, migrations, and query builders for the mirror
//! store.
//!
//! The local store is a mirror of the chat backend, not the system of
//! record — every table here is rebuildable by replaying backend responses
//! (identities aside, which are owned by the login flow).

pub mod identities;
pub mod messages;
pub mod migrations;
pub mod oauth_states;
pub mod sessions;
pub mod tables;

// Re-export tables for convenience
pub use tables::*;

/// A built statement: SQL plus its bind values.
pub type Built = (String, sea_query::Values);
