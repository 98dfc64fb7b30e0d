use std::time::Duration;

use serde_json::json;

use crate::error::GatewayError;

/// Timeout for chat forwarding. The backend performs long-running
/// generation, so this is deliberately generous.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeout for session-management operations. These are expected to be
/// fast; a generous budget here would only mask backend outages.
pub const MANAGEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed HTTP client for the chat backend.
///
/// One attempt per call — chat is not idempotent, so retries are the
/// caller's decision, never this client's.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new client for the given backend base URL.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    // ── Chat ──────────────────────────────────────────────────────────────

    /// POST /api/v1/chat — forward a chat request.
    ///
    /// `email` is the resolved caller email; when present it is attached as
    /// the `email_id` query parameter (the body copy is the caller's
    /// responsibility, since the body is passed through opaquely).
    pub async fn chat(
        &self,
        body: &serde_json::Value,
        email: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut url = self.url("/chat");
        if let Some(email) = email {
            url = format!("{url}?email_id={}", urlencoding::encode(email));
        }
        tracing::debug!("forwarding chat request to {url}");

        let resp = self
            .client
            .post(&url)
            .json(body)
            .timeout(CHAT_TIMEOUT)
            .send()
            .await
            .map_err(|e| GatewayError::classify(e, CHAT_TIMEOUT))?;
        parse_response(resp, CHAT_TIMEOUT).await
    }

    // ── Session management ────────────────────────────────────────────────

    /// POST /api/v1/sessions — list all chat sessions for an email.
    pub async fn list_sessions(&self, email: &str) -> Result<serde_json::Value, GatewayError> {
        self.post_management("/sessions", &json!({ "email_id": email }))
            .await
    }

    /// POST /api/v1/conversation-history — fetch a session's history.
    pub async fn conversation_history(
        &self,
        session_id: &str,
        email: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut body = json!({ "session_id": session_id });
        if let Some(email) = email {
            body["email_id"] = json!(email);
        }
        self.post_management("/conversation-history", &body).await
    }

    /// POST /api/v1/clear-conversation — clear one session or all of an
    /// email's sessions on the backend.
    pub async fn clear_conversation(
        &self,
        conversation_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut body = json!({});
        if let Some(id) = conversation_id {
            body["conversation_id"] = json!(id);
        }
        if let Some(email) = email {
            body["email_id"] = json!(email);
        }
        self.post_management("/clear-conversation", &body).await
    }

    async fn post_management(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = self.url(path);
        tracing::debug!("forwarding management request to {url}");

        let resp = self
            .client
            .post(&url)
            .json(body)
            .timeout(MANAGEMENT_TIMEOUT)
            .send()
            .await
            .map_err(|e| GatewayError::classify(e, MANAGEMENT_TIMEOUT))?;
        parse_response(resp, MANAGEMENT_TIMEOUT).await
    }
}

/// Parse an HTTP response: return the deserialized body on 2xx, or a
/// `Backend` outcome keeping the raw status and body for pass-through.
async fn parse_response(
    resp: reqwest::Response,
    budget: Duration,
) -> Result<serde_json::Value, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Backend {
            status: status.as_u16(),
            body,
        });
    }
    // A 2xx body that is not JSON breaks the backend contract; reading it
    // can also still hit the request deadline.
    resp.json().await.map_err(|e| GatewayError::classify(e, budget))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serve a single canned HTTP response on a loopback socket.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 8192];
            let _ = sock.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn success_returns_backend_body() {
        let base = one_shot_server("HTTP/1.1 200 OK", r#"{"sessions":["a"]}"#).await;
        let client = BackendClient::new(&base);
        let body = client.list_sessions("a@x.com").await.unwrap();
        assert_eq!(body["sessions"][0], "a");
    }

    #[tokio::test]
    async fn non_2xx_is_kept_raw_for_passthrough() {
        let base =
            one_shot_server("HTTP/1.1 500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = BackendClient::new(&base);
        match client.list_sessions("a@x.com").await {
            Err(GatewayError::Backend { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, r#"{"error":"boom"}"#);
            }
            other => panic!("expected Backend outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_classifies_as_transport() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BackendClient::new(&format!("http://{addr}"));
        match client.clear_conversation(Some("s1"), None).await {
            Err(GatewayError::Transport(_)) => {}
            other => panic!("expected Transport outcome, got {other:?}"),
        }
    }

    #[test]
    fn url_joins_base_without_trailing_slash() {
        let client = BackendClient::new("http://backend:9000/");
        assert_eq!(client.url("/chat"), "http://backend:9000/api/v1/chat");
    }
}
