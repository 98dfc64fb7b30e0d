//! HTTP half of the OAuth login flow.
//!
//! Two outbound calls per login — exchange the authorization code, then
//! fetch the user's profile — with no state retained between them. The pure
//! halves (URL building, response parsing) live in `chatfront_api::oauth`.

use chatfront_api::ServiceError;
use chatfront_api::oauth::{self, OAuthProfile, OAuthProviderConfig};

#[derive(Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    provider: OAuthProviderConfig,
}

impl OAuthClient {
    pub fn new(provider: OAuthProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
        }
    }

    /// Build the provider authorize URL for a browser redirect.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        oauth::build_authorize_url(&self.provider, redirect_uri, state)
    }

    /// Exchange an authorization code for a provider access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, ServiceError> {
        let form = oauth::build_token_request_form(&self.provider, code, redirect_uri);
        let raw = self
            .client
            .post(&self.provider.token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::OAuthExchange(format!("token exchange failed: {e}")))?
            .text()
            .await
            .map_err(|e| {
                ServiceError::OAuthExchange(format!("token response read failed: {e}"))
            })?;

        oauth::parse_access_token_response(&raw)
    }

    /// Fetch the authenticated user's profile with a bearer token.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, ServiceError> {
        let userinfo: serde_json::Value = self
            .client
            .get(&self.provider.userinfo_url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::OAuthExchange(format!("userinfo fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::OAuthExchange(format!("userinfo parse failed: {e}")))?;

        oauth::extract_profile(&userinfo)
    }
}
