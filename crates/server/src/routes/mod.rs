use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

pub mod auth;
pub mod chat;
pub mod health;
pub mod oauth;
pub mod sessions;

/// Pass a backend reply through unchanged: raw status, raw body.
///
/// The backend API speaks JSON, so the content type is fixed; the body is
/// not reinterpreted.
pub(crate) fn backend_passthrough(status: u16, body: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
