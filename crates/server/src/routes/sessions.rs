use axum::{Json, extract::State, response::{IntoResponse, Response}};

use chatfront_api::{
    ChatResponse, ClearConversationRequest, ConversationHistory, EmailRequest, HistoryRequest,
    service::{self, ClearTarget},
};
use chatfront_backend_client::GatewayError;

use super::auth::MaybeUser;
use super::backend_passthrough;
use crate::error::ApiErr;
use crate::{AppState, storage};

// ---------------------------------------------------------------------------
// POST /api/v1/sessions — list sessions for an email
// ---------------------------------------------------------------------------

/// POST /api/v1/sessions — list all chat sessions for an email.
///
/// Always fetched live from the backend; the mirror is not consulted and
/// not written.
pub async fn list_sessions(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<EmailRequest>,
) -> Result<Response, ApiErr> {
    service::authorize_email(user.as_ref(), &req.email_id)?;
    service::validate_email(&req.email_id)?;

    match state.backend.list_sessions(&req.email_id).await {
        Ok(body) => Ok(Json(body).into_response()),
        Err(GatewayError::Backend { status, body }) => Ok(backend_passthrough(status, body)),
        Err(outage) => {
            tracing::error!("listing sessions for {} failed: {outage}", req.email_id);
            Err(ApiErr::from_gateway(&outage))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/conversation-history — fetch history, sync the mirror
// ---------------------------------------------------------------------------

/// POST /api/v1/conversation-history — fetch a session's history.
///
/// Every successful fetch re-synchronizes the mirror; when the backend is
/// unreachable the mirrored copy is served instead, so history survives
/// backend downtime.
pub async fn conversation_history(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<HistoryRequest>,
) -> Result<Response, ApiErr> {
    if let Some(ref email) = req.email_id {
        service::authorize_email(user.as_ref(), email)?;
    }
    if req.session_id.is_empty() {
        return Err(ApiErr::bad_request("session_id must not be empty"));
    }

    match state
        .backend
        .conversation_history(&req.session_id, req.email_id.as_deref())
        .await
    {
        Ok(body) => {
            mirror_history(&state, &body);
            Ok(Json(body).into_response())
        }
        Err(GatewayError::Backend { status, body }) => Ok(backend_passthrough(status, body)),
        Err(outage) => match storage::read_history(&state.db, &req.session_id) {
            Ok(Some(history)) => {
                tracing::warn!(
                    "backend unavailable ({outage}); serving mirrored history for session {}",
                    req.session_id
                );
                Ok(Json(history).into_response())
            }
            Ok(None) => Err(ApiErr::from_gateway(&outage)),
            Err(e) => {
                tracing::error!("mirror read failed for session {}: {e}", req.session_id);
                Err(ApiErr::from_gateway(&outage))
            }
        },
    }
}

/// Mirror a backend history response. Best-effort: failures are logged and
/// swallowed, never turned into a request failure.
fn mirror_history(state: &AppState, body: &serde_json::Value) {
    match serde_json::from_value::<ConversationHistory>(body.clone()) {
        Ok(history) => {
            if let Err(e) = storage::sync_history(&state.db, &history) {
                tracing::warn!(
                    "mirror write failed for session {}: {e}",
                    history.session_id
                );
            }
        }
        Err(e) => {
            tracing::warn!("history response did not match the sync shape, mirror skipped: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/clear-conversation — two-phase delete, local first
// ---------------------------------------------------------------------------

/// POST /api/v1/clear-conversation — clear one session or a whole email.
///
/// The mirror is cleared before the backend call so local state is gone even
/// if the backend is unreachable. The remote half is best-effort; its
/// outcome is exposed in `metadata.backend_error` instead of rolling back
/// the local deletion.
pub async fn clear_conversation(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<ClearConversationRequest>,
) -> Result<Response, ApiErr> {
    let target = service::clear_request_target(&req)?;
    if let ClearTarget::Email(ref email) = target {
        service::authorize_email(user.as_ref(), email)?;
    }

    // Phase one: local mirror
    match &target {
        ClearTarget::Session(session_id) => {
            tracing::info!("clearing mirrored session {session_id}");
            storage::clear_by_session(&state.db, session_id)
                .map_err(ApiErr::from_db("clear mirrored session"))?;
        }
        ClearTarget::Email(email) => {
            tracing::info!("clearing all mirrored sessions for {email}");
            storage::clear_by_email(&state.db, email)
                .map_err(ApiErr::from_db("clear mirrored sessions for email"))?;
        }
    }

    // Phase two: backend, best-effort
    let (conversation_id, email_id) = match &target {
        ClearTarget::Session(id) => (Some(id.as_str()), None),
        ClearTarget::Email(email) => (None, Some(email.as_str())),
    };
    match state
        .backend
        .clear_conversation(conversation_id, email_id)
        .await
    {
        Ok(body) => Ok(Json(body).into_response()),
        Err(err) => {
            tracing::warn!("backend clear failed after local clear: {err}");
            let (scope, id) = match &target {
                ClearTarget::Session(id) => ("session", id.as_str()),
                ClearTarget::Email(email) => ("email", email.as_str()),
            };
            Ok(Json(ChatResponse::info_text(
                format!(
                    "Conversation history cleared locally for {scope} {id}; \
                     backend clear failed and can be retried"
                ),
                Some(&err.marker()),
            ))
            .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chatfront_api::{HistoryMessage, Identity, MessageRole};
    use chatfront_backend_client::BackendClient;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::AppConfig;

    fn identity(email: &str) -> Identity {
        Identity {
            email: email.into(),
            display_name: None,
            picture_url: None,
        }
    }

    fn test_state(backend_url: &str) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::storage::init_db(dir.path()).unwrap();
        let state = AppState {
            db,
            config: AppConfig {
                base_url: "http://127.0.0.1:8000".into(),
                jwt_secret: "secret".into(),
                backend_api_url: backend_url.into(),
                oauth_redirect_url: None,
            },
            backend: BackendClient::new(backend_url),
            oauth: None,
        };
        (dir, state)
    }

    /// Base URL of a port nothing listens on.
    fn unreachable_backend() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    /// Serve a single canned 200 response on a loopback socket.
    async fn one_shot_backend(body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 8192];
            let _ = sock.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn seed_history(state: &AppState, session_id: &str, email: &str, content: &str) {
        storage::sync_history(
            &state.db,
            &ConversationHistory {
                session_id: session_id.into(),
                email_id: email.into(),
                created_at: "2024-01-01 00:00:00".into(),
                updated_at: "2024-01-01 00:00:00".into(),
                messages: vec![HistoryMessage {
                    role: MessageRole::User,
                    content: content.into(),
                    timestamp: "2024-01-01 00:00:01".into(),
                }],
            },
        )
        .unwrap();
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_sessions_for_another_email_is_forbidden() {
        let (_dir, state) = test_state(&unreachable_backend());
        let err = list_sessions(
            State(state),
            MaybeUser(Some(identity("b@x.com"))),
            Json(EmailRequest {
                email_id: "a@x.com".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn history_fetch_syncs_the_mirror() {
        let backend = one_shot_backend(
            r#"{"session_id":"s1","email_id":"a@x.com","created_at":"2024-01-01 00:00:00","updated_at":"2024-01-01 00:00:05","messages":[{"role":"user","content":"hi","timestamp":"2024-01-01 00:00:01"}]}"#,
        )
        .await;
        let (_dir, state) = test_state(&backend);

        let response = conversation_history(
            State(state.clone()),
            MaybeUser(None),
            Json(HistoryRequest {
                session_id: "s1".into(),
                email_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mirrored = storage::read_history(&state.db, "s1").unwrap().unwrap();
        assert_eq!(mirrored.messages.len(), 1);
        assert_eq!(mirrored.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn history_serves_the_mirror_when_backend_is_down() {
        let (_dir, state) = test_state(&unreachable_backend());
        seed_history(&state, "s1", "a@x.com", "hello");

        let response = conversation_history(
            State(state),
            MaybeUser(None),
            Json(HistoryRequest {
                session_id: "s1".into(),
                email_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[tokio::test]
    async fn history_without_a_mirror_surfaces_the_outage() {
        let (_dir, state) = test_state(&unreachable_backend());
        let err = conversation_history(
            State(state),
            MaybeUser(None),
            Json(HistoryRequest {
                session_id: "never-mirrored".into(),
                email_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn clear_removes_local_state_even_when_backend_fails() {
        let (_dir, state) = test_state(&unreachable_backend());
        seed_history(&state, "s1", "a@x.com", "one");
        seed_history(&state, "s2", "a@x.com", "two");

        let response = clear_conversation(
            State(state.clone()),
            MaybeUser(Some(identity("a@x.com"))),
            Json(ClearConversationRequest {
                conversation_id: Some("s1".into()),
                email_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["metadata"]["backend_error"], "connection_error");

        assert!(storage::read_history(&state.db, "s1").unwrap().is_none());
        assert!(storage::read_history(&state.db, "s2").unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_with_both_identifiers_is_a_validation_error() {
        let (_dir, state) = test_state(&unreachable_backend());
        let err = clear_conversation(
            State(state),
            MaybeUser(None),
            Json(ClearConversationRequest {
                conversation_id: Some("s1".into()),
                email_id: Some("a@x.com".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
