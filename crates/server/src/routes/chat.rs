use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use chatfront_api::ChatResponse;
use chatfront_backend_client::GatewayError;

use super::auth::MaybeUser;
use super::backend_passthrough;
use crate::AppState;

// ---------------------------------------------------------------------------
// POST /api/v1/chat — forward a chat request to the backend
// ---------------------------------------------------------------------------

/// POST /api/v1/chat — forward the request to the chat backend.
///
/// Whatever goes wrong, the browser receives a renderable chat-shaped reply:
/// backend failures become text responses with an error marker in metadata
/// instead of bare error statuses.
pub async fn chat(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    body: Bytes,
) -> Response {
    // Parsed by hand so a malformed body still yields a renderable reply
    let mut payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return chat_failure(
                StatusCode::BAD_REQUEST,
                "Invalid JSON in request body",
                "invalid_json",
            );
        }
    };

    if let Some(message) = payload.get("message").and_then(|v| v.as_str()) {
        let preview: String = message.chars().take(50).collect();
        tracing::info!("chat request: {preview}...");
    }

    // Attach the resolved caller email; anonymous callers forward as-is
    let email = user.as_ref().map(|u| u.email.clone());
    if let Some(ref email) = email {
        match payload.as_object_mut() {
            Some(object) => {
                object.insert("email_id".into(), serde_json::json!(email));
            }
            None => {
                return chat_failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred: chat request body must be a JSON object",
                    "server_error",
                );
            }
        }
    }

    match state.backend.chat(&payload, email.as_deref()).await {
        Ok(body) => Json(body).into_response(),
        Err(GatewayError::Backend { status, body }) => backend_passthrough(status, body),
        Err(err @ GatewayError::Timeout { .. }) => {
            tracing::error!("chat request to backend timed out: {err}");
            chat_failure(
                StatusCode::GATEWAY_TIMEOUT,
                "Request timed out after 180 seconds. The request may be too complex or the \
                 server might be experiencing high load. Please try again with a simpler prompt.",
                "timeout",
            )
        }
        Err(err) => {
            tracing::error!("error communicating with backend API: {err}");
            chat_failure(
                StatusCode::BAD_GATEWAY,
                format!("Error communicating with backend API: {err}"),
                "connection_error",
            )
        }
    }
}

/// Build a chat-shaped failure reply with an error marker in metadata.
fn chat_failure(status: StatusCode, text: impl Into<String>, marker: &str) -> Response {
    (status, Json(ChatResponse::error_text(text, marker))).into_response()
}
