//! Identity query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Identities;

/// UPSERT an identity on login. Keyed by email; every successful login
/// refreshes the profile fields and `last_login`.
pub fn upsert(
    email: &str,
    display_name: Option<&str>,
    picture_url: Option<&str>,
    last_login: &str,
) -> Built {
    // ON CONFLICT requires raw SQL — sea-query's ON CONFLICT support is limited
    let sql = concat!(
        "INSERT INTO \"identities\" ",
        "(\"email\", \"display_name\", \"picture_url\", \"last_login\") ",
        "VALUES (?, ?, ?, ?) ",
        "ON CONFLICT (\"email\") DO UPDATE SET ",
        "\"display_name\" = excluded.\"display_name\", ",
        "\"picture_url\" = excluded.\"picture_url\", ",
        "\"last_login\" = excluded.\"last_login\"",
    )
    .to_string();
    let values = sea_query::Values(vec![
        email.into(),
        display_name.map(|s| s.to_string()).into(),
        picture_url.map(|s| s.to_string()).into(),
        last_login.into(),
    ]);
    (sql, values)
}

/// Find an identity by email (returns email, display_name, picture_url).
pub fn get_by_email(email: &str) -> Built {
    Query::select()
        .columns([
            Identities::Email,
            Identities::DisplayName,
            Identities::PictureUrl,
        ])
        .from(Identities::Table)
        .and_where(Expr::col(Identities::Email).eq(email))
        .build(SqliteQueryBuilder)
}
