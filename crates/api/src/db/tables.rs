//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Identities {
    Table,
    Email,
    DisplayName,
    PictureUrl,
    LastLogin,
}

#[derive(Iden)]
pub enum Sessions {
    Table,
    SessionId,
    Email,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Messages {
    Table,
    SessionId,
    Role,
    Content,
    Timestamp,
}

#[derive(Iden)]
pub enum OauthStates {
    Table,
    State,
    CreatedAt,
    ExpiresAt,
}
