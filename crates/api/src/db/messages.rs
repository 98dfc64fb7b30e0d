//! Mirrored-message query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Messages;

/// UPSERT a mirrored message.
///
/// `(session_id, timestamp)` is the uniqueness key: re-applying the same
/// backend response, or two concurrent syncs of the same session, converge
/// on identical rows instead of duplicating them.
pub fn upsert(session_id: &str, role: &str, content: &str, timestamp: &str) -> Built {
    let sql = concat!(
        "INSERT INTO \"messages\" ",
        "(\"session_id\", \"role\", \"content\", \"timestamp\") ",
        "VALUES (?, ?, ?, ?) ",
        "ON CONFLICT (\"session_id\", \"timestamp\") DO UPDATE SET ",
        "\"role\" = excluded.\"role\", ",
        "\"content\" = excluded.\"content\"",
    )
    .to_string();
    let values = sea_query::Values(vec![
        session_id.into(),
        role.into(),
        content.into(),
        timestamp.into(),
    ]);
    (sql, values)
}

/// All messages of a session, oldest first.
pub fn list_by_session(session_id: &str) -> Built {
    Query::select()
        .columns([Messages::Role, Messages::Content, Messages::Timestamp])
        .from(Messages::Table)
        .and_where(Expr::col(Messages::SessionId).eq(session_id))
        .order_by(Messages::Timestamp, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Delete every message of a session.
pub fn delete_by_session(session_id: &str) -> Built {
    Query::delete()
        .from_table(Messages::Table)
        .and_where(Expr::col(Messages::SessionId).eq(session_id))
        .build(SqliteQueryBuilder)
}
