use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;

use chatfront_api::crypto;

use super::auth;
use crate::error::ApiErr;
use crate::oauth_client::OAuthClient;
use crate::{AppState, storage};

fn require_oauth(state: &AppState) -> Result<&OAuthClient, ApiErr> {
    if state.config.jwt_secret.is_empty() {
        return Err(ApiErr::internal("JWT_SECRET not configured"));
    }
    state
        .oauth
        .as_ref()
        .ok_or_else(|| ApiErr::not_found("Google OAuth is not configured"))
}

// ---------------------------------------------------------------------------
// GET /login/google — redirect to the provider's authorize page
// ---------------------------------------------------------------------------

/// GET /login/google — redirect the browser to Google's authorize page.
pub async fn login_redirect(State(state): State<AppState>) -> Result<Redirect, ApiErr> {
    let oauth = require_oauth(&state)?;

    let csrf = crypto::generate_state_token()?;
    storage::insert_oauth_state(&state.db, &csrf)
        .map_err(ApiErr::from_db("oauth state insert"))?;

    let url = oauth.authorize_url(&state.config.oauth_redirect_uri(), &csrf);
    Ok(Redirect::temporary(&url))
}

// ---------------------------------------------------------------------------
// GET /auth/callback — handle the provider callback
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /auth/callback — complete the login: consume the state, exchange the
/// code, fetch the profile, upsert the identity, bind the session token to
/// its cookie, and return to the chat page.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiErr> {
    let oauth = require_oauth(&state)?;

    if let Some(err) = params.error {
        return Err(ApiErr::bad_request(format!(
            "authorization was denied: {err}"
        )));
    }
    let code = params
        .code
        .ok_or_else(|| ApiErr::bad_request("missing code parameter"))?;
    let csrf = params
        .state
        .ok_or_else(|| ApiErr::bad_request("missing state parameter"))?;

    let valid = storage::consume_oauth_state(&state.db, &csrf)
        .map_err(ApiErr::from_db("oauth state lookup"))?;
    if !valid {
        return Err(ApiErr::bad_request("invalid or expired OAuth state"));
    }

    // Two provider round trips: code -> access token -> profile
    let redirect_uri = state.config.oauth_redirect_uri();
    let access_token = oauth.exchange_code(&code, &redirect_uri).await?;
    let profile = oauth.fetch_profile(&access_token).await?;

    storage::upsert_identity(
        &state.db,
        &profile.email,
        profile.name.as_deref(),
        profile.picture.as_deref(),
    )
    .map_err(ApiErr::from_db("identity upsert"))?;

    let now = chrono::Utc::now().timestamp() as u64;
    let token = crypto::sign_token(&profile.email, &state.config.jwt_secret, now);

    tracing::info!("login completed for {}", profile.email);

    Ok((
        [(header::SET_COOKIE, auth::token_cookie(&token))],
        Redirect::to("/"),
    ))
}
