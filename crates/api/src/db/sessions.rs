//! Mirrored-session query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Sessions;

/// UPSERT a mirrored session row from a backend history response.
///
/// Last write wins on every mirrored field — the backend is authoritative.
pub fn upsert(session_id: &str, email: &str, created_at: &str, updated_at: &str) -> Built {
    let sql = concat!(
        "INSERT INTO \"sessions\" ",
        "(\"session_id\", \"email\", \"created_at\", \"updated_at\") ",
        "VALUES (?, ?, ?, ?) ",
        "ON CONFLICT (\"session_id\") DO UPDATE SET ",
        "\"email\" = excluded.\"email\", ",
        "\"created_at\" = excluded.\"created_at\", ",
        "\"updated_at\" = excluded.\"updated_at\"",
    )
    .to_string();
    let values = sea_query::Values(vec![
        session_id.into(),
        email.into(),
        created_at.into(),
        updated_at.into(),
    ]);
    (sql, values)
}

/// Find a mirrored session by id.
pub fn get_by_id(session_id: &str) -> Built {
    Query::select()
        .columns([
            Sessions::SessionId,
            Sessions::Email,
            Sessions::CreatedAt,
            Sessions::UpdatedAt,
        ])
        .from(Sessions::Table)
        .and_where(Expr::col(Sessions::SessionId).eq(session_id))
        .build(SqliteQueryBuilder)
}

/// All session ids owned by an email.
pub fn ids_by_email(email: &str) -> Built {
    Query::select()
        .column(Sessions::SessionId)
        .from(Sessions::Table)
        .and_where(Expr::col(Sessions::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Delete one session row.
pub fn delete_by_id(session_id: &str) -> Built {
    Query::delete()
        .from_table(Sessions::Table)
        .and_where(Expr::col(Sessions::SessionId).eq(session_id))
        .build(SqliteQueryBuilder)
}

/// Delete every session row owned by an email.
pub fn delete_by_email(email: &str) -> Built {
    Query::delete()
        .from_table(Sessions::Table)
        .and_where(Expr::col(Sessions::Email).eq(email))
        .build(SqliteQueryBuilder)
}
