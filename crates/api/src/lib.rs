//! Shared API types, token crypto, and SQL builders for chatfront.
//!
//! This crate is the single source of truth for the request/response types
//! exchanged with the browser and the chat backend. It contains no HTTP
//! calls and no database connections — those live in the server and the
//! backend client.

use serde::{Deserialize, Serialize};

pub mod crypto;
pub mod db;
pub mod oauth;
pub mod service;

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Author of a mirrored conversation message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a stored role string back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// A locally stored user identity, keyed by email.
///
/// Created/updated on every successful OAuth login; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

/// Returned by `GET /api/v1/user` — the authenticated caller's profile.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<Identity> for UserInfoResponse {
    fn from(identity: Identity) -> Self {
        Self {
            email: identity.email,
            name: identity.display_name,
            picture: identity.picture_url,
        }
    }
}

// ─── Session Requests ────────────────────────────────────────────────────────

/// Body of `POST /api/v1/sessions` — list all chat sessions for an email.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email_id: String,
}

/// Body of `POST /api/v1/conversation-history`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
}

/// Body of `POST /api/v1/clear-conversation`.
///
/// Exactly one of `conversation_id` / `email_id` must be set — see
/// [`service::clear_request_target`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClearConversationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
}

// ─── Conversation History ────────────────────────────────────────────────────

/// A single message inside a conversation history response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: String,
}

/// The chat backend's `POST /api/v1/conversation-history` response.
///
/// This is the shape the mirror synchronization consumes; the raw body is
/// still passed through to the browser untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub session_id: String,
    pub email_id: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

// ─── Chat ────────────────────────────────────────────────────────────────────

/// The chat backend's response schema, also used for locally generated
/// failure replies so the browser always receives renderable content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub text_content: Option<String>,
    pub image_content: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ChatResponse {
    /// A text-typed reply carrying an error marker in `metadata.error`.
    pub fn error_text(text: impl Into<String>, marker: &str) -> Self {
        Self {
            kind: "text".into(),
            text_content: Some(text.into()),
            image_content: None,
            metadata: serde_json::json!({ "error": marker }),
        }
    }

    /// An info-typed reply, with an optional marker in `metadata.backend_error`.
    pub fn info_text(text: impl Into<String>, backend_error: Option<&str>) -> Self {
        let metadata = match backend_error {
            Some(marker) => serde_json::json!({ "backend_error": marker }),
            None => serde_json::Value::Null,
        };
        Self {
            kind: "info".into(),
            text_content: Some(text.into()),
            image_content: None,
            metadata,
        }
    }
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// Returned by `GET /api/health` — server liveness check.
///
/// `backend` names the chat backend this deployment fronts, so an operator
/// can tell the three deployments apart from the probe alone.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code; the server converts this into
/// its JSON error response.
#[derive(Debug, Clone)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    /// The identity provider rejected the code exchange or profile fetch.
    OAuthExchange(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::OAuthExchange(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::OAuthExchange(m)
            | Self::Internal(m) => m,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_serializes_with_type_field() {
        let resp = ChatResponse::error_text("timed out", "timeout");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["metadata"]["error"], "timeout");
        assert!(json["image_content"].is_null());
    }

    #[test]
    fn history_roles_round_trip_lowercase() {
        let msg: HistoryMessage = serde_json::from_value(serde_json::json!({
            "role": "assistant",
            "content": "hi",
            "timestamp": "2024-01-01 00:00:00",
        }))
        .unwrap();
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(MessageRole::parse("user"), Some(MessageRole::User));
        assert_eq!(MessageRole::parse("system"), None);
    }

    #[test]
    fn history_tolerates_missing_messages_field() {
        let history: ConversationHistory = serde_json::from_value(serde_json::json!({
            "session_id": "s1",
            "email_id": "a@x.com",
            "created_at": "2024-01-01 00:00:00",
            "updated_at": "2024-01-01 00:00:00",
        }))
        .unwrap();
        assert!(history.messages.is_empty());
    }
}
