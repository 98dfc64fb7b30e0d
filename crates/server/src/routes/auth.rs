use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};

use chatfront_api::{Identity, UserInfoResponse, crypto};

use crate::AppConfig;
use crate::storage::{self, Db};

/// Name of the session token cookie.
pub const TOKEN_COOKIE: &str = "token";

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

/// Extract a cookie value from the `Cookie` header.
fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    let raw = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// `Set-Cookie` value binding the session token: http-only, lax cross-site
/// policy, 7-day max age.
pub fn token_cookie(token: &str) -> String {
    format!(
        "{TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        crypto::TOKEN_TTL_SECS
    )
}

/// `Set-Cookie` value expiring the session token immediately.
pub fn clear_token_cookie() -> String {
    format!("{TOKEN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

// ---------------------------------------------------------------------------
// Caller resolution
// ---------------------------------------------------------------------------

/// Resolve the caller from the token cookie.
///
/// Anonymous on: missing cookie, failed verification, expiry, or a subject
/// with no identity row (the token outlived the identity record). A store
/// error also resolves to anonymous rather than failing the request.
fn resolve_caller<S>(parts: &Parts, state: &S) -> Option<Identity>
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    let config = AppConfig::from_ref(state);
    if config.jwt_secret.is_empty() {
        return None;
    }

    let token = cookie_value(parts, TOKEN_COOKIE)?;
    let now = chrono::Utc::now().timestamp() as u64;
    let email = crypto::verify_token(&token, &config.jwt_secret, now).ok()?;

    let db = Db::from_ref(state);
    match storage::find_identity(&db, &email) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("identity lookup failed for {email}: {e}");
            None
        }
    }
}

/// Caller identity when present; never rejects.
///
/// Endpoints that allow anonymous access use this and decide per-operation
/// what an absent identity means.
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_caller(parts, state)))
    }
}

/// Authenticated caller; rejects with 401 when anonymous.
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_caller(parts, state).map(AuthUser).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "could not validate credentials"})),
            )
                .into_response()
        })
    }
}

// ---------------------------------------------------------------------------
// GET /api/v1/user — current user info
// ---------------------------------------------------------------------------

/// GET /api/v1/user — the authenticated caller's profile.
pub async fn user_info(AuthUser(user): AuthUser) -> Json<UserInfoResponse> {
    Json(user.into())
}

// ---------------------------------------------------------------------------
// GET /logout — clear the session token cookie
// ---------------------------------------------------------------------------

/// GET /logout — expire the token cookie and return to the chat page.
/// Always succeeds; idempotent.
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_token_cookie())],
        Redirect::to("/?just_logged_out=true"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cookie_is_http_only_lax_week_long() {
        let cookie = token_cookie("abc.def.ghi");
        assert!(cookie.starts_with("token=abc.def.ghi;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_token_cookie().contains("Max-Age=0"));
    }
}
