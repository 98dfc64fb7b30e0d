//! OAuth2 provider support for the login flow.
//!
//! This module contains only types, URL builders, and JSON parsing.
//! No HTTP calls or DB access — those live in the server's `OAuthClient`.

use serde::{Deserialize, Serialize};

use crate::ServiceError;

// ── Provider Configuration ──────────────────────────────────────────────────

/// OAuth2 provider configuration. Loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// Unique provider identifier: "google"
    pub id: String,
    /// UI display name: "Google"
    pub display_name: String,

    // OAuth2 endpoints
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,

    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub scopes: String,

    /// Request a refresh-capable grant (`access_type=offline`).
    #[serde(default)]
    pub offline_access: bool,
}

/// Profile fields extracted from the provider's userinfo response.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

// ── URL Builders (pure functions, no HTTP) ──────────────────────────────────

/// Build the authorize URL that the user's browser should be redirected to.
pub fn build_authorize_url(
    config: &OAuthProviderConfig,
    redirect_uri: &str,
    state: &str,
) -> String {
    let mut url = format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        config.authorize_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&config.scopes),
        urlencoding::encode(state),
    );
    if config.offline_access {
        url.push_str("&access_type=offline");
    }
    url
}

/// Build the token exchange request as application/x-www-form-urlencoded pairs.
pub fn build_token_request_form(
    config: &OAuthProviderConfig,
    code: &str,
    redirect_uri: &str,
) -> Vec<(String, String)> {
    vec![
        ("code".into(), code.to_string()),
        ("client_id".into(), config.client_id.clone()),
        ("client_secret".into(), config.client_secret.clone()),
        ("redirect_uri".into(), redirect_uri.to_string()),
        ("grant_type".into(), "authorization_code".into()),
    ]
}

/// Parse `access_token` from the provider's token response.
///
/// A response carrying an `error` field fails with its detail, matching the
/// provider contract: an error field means the exchange failed regardless of
/// transport status.
pub fn parse_access_token_response(raw: &str) -> Result<String, ServiceError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(ServiceError::OAuthExchange(
            "token exchange failed: empty response body".into(),
        ));
    }

    let json: serde_json::Value = serde_json::from_str(body).map_err(|_| {
        ServiceError::OAuthExchange("token exchange failed: response is not JSON".into())
    })?;

    if let Some(token) = json
        .get("access_token")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Ok(token.to_string());
    }

    let err = json.get("error").and_then(|v| v.as_str());
    let err_desc = json.get("error_description").and_then(|v| v.as_str());

    let detail = match (err, err_desc) {
        (Some(e), Some(d)) if !d.is_empty() => format!("{e}: {d}"),
        (Some(e), _) => e.to_string(),
        (_, Some(d)) if !d.is_empty() => d.to_string(),
        _ => "no access_token field in response".to_string(),
    };

    Err(ServiceError::OAuthExchange(format!(
        "token exchange failed: {detail}"
    )))
}

/// Extract profile fields from the provider's userinfo JSON response.
///
/// The email is mandatory — an identity cannot be keyed without it; name and
/// picture are optional.
pub fn extract_profile(userinfo: &serde_json::Value) -> Result<OAuthProfile, ServiceError> {
    let email = userinfo["email"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::OAuthExchange("userinfo response missing 'email' field".into())
        })?
        .to_string();

    let name = userinfo["name"].as_str().map(|s| s.to_string());
    let picture = userinfo["picture"].as_str().map(|s| s.to_string());

    Ok(OAuthProfile {
        email,
        name,
        picture,
    })
}

// ── Provider Presets ────────────────────────────────────────────────────────

/// Create a Google OAuth2 provider config. Only needs client credentials.
pub fn google_preset(client_id: String, client_secret: String) -> OAuthProviderConfig {
    OAuthProviderConfig {
        id: "google".into(),
        display_name: "Google".into(),
        authorize_url: "https://accounts.google.com/o/oauth2/auth".into(),
        token_url: "https://oauth2.googleapis.com/token".into(),
        userinfo_url: "https://www.googleapis.com/oauth2/v1/userinfo".into(),
        client_id,
        client_secret,
        scopes: "email profile".into(),
        offline_access: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_scope_state_and_offline_access() {
        let provider = google_preset("cid".into(), "secret".into());
        let url = build_authorize_url(&provider, "http://127.0.0.1:8000/auth/callback", "st4te");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?response_type=code"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("scope=email%20profile"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8000%2Fauth%2Fcallback"));
    }

    #[test]
    fn token_form_contains_required_fields() {
        let provider = google_preset("cid".into(), "secret".into());
        let form = build_token_request_form(&provider, "code-1", "https://app/callback");
        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("code"), Some("code-1"));
        assert_eq!(get("client_id"), Some("cid"));
        assert_eq!(get("client_secret"), Some("secret"));
        assert_eq!(get("redirect_uri"), Some("https://app/callback"));
        assert_eq!(get("grant_type"), Some("authorization_code"));
    }

    #[test]
    fn parse_access_token_ok() {
        let raw = r#"{"access_token":"ya29.abc","expires_in":3599,"token_type":"Bearer"}"#;
        assert_eq!(parse_access_token_response(raw).unwrap(), "ya29.abc");
    }

    #[test]
    fn parse_access_token_error_field_has_reason() {
        let raw = r#"{"error":"invalid_grant","error_description":"Bad authorization code."}"#;
        let err = parse_access_token_response(raw).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("invalid_grant"));
    }

    #[test]
    fn extract_profile_requires_email() {
        let full = serde_json::json!({"email": "a@x.com", "name": "A", "picture": "http://p"});
        let profile = extract_profile(&full).unwrap();
        assert_eq!(profile.email, "a@x.com");
        assert_eq!(profile.name.as_deref(), Some("A"));

        let partial = serde_json::json!({"email": "a@x.com"});
        let profile = extract_profile(&partial).unwrap();
        assert!(profile.name.is_none());
        assert!(profile.picture.is_none());

        let missing = serde_json::json!({"name": "A"});
        assert!(extract_profile(&missing).is_err());
    }
}
