//! OAuth state query builders.
//!
//! A state row is written when the browser is redirected to the provider
//! and consumed (single use) on callback; expired rows are rejected.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::OauthStates;

/// Insert a pending state.
pub fn insert(state: &str, created_at: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(OauthStates::Table)
        .columns([
            OauthStates::State,
            OauthStates::CreatedAt,
            OauthStates::ExpiresAt,
        ])
        .values_panic([state.into(), created_at.into(), expires_at.into()])
        .build(SqliteQueryBuilder)
}

/// Look up a state (returns expires_at).
pub fn get(state: &str) -> Built {
    Query::select()
        .column(OauthStates::ExpiresAt)
        .from(OauthStates::Table)
        .and_where(Expr::col(OauthStates::State).eq(state))
        .build(SqliteQueryBuilder)
}

/// Delete a state (used or expired).
pub fn delete(state: &str) -> Built {
    Query::delete()
        .from_table(OauthStates::Table)
        .and_where(Expr::col(OauthStates::State).eq(state))
        .build(SqliteQueryBuilder)
}
