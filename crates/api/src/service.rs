//! Shared business logic — framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters over these.

use crate::{ClearConversationRequest, Identity, ServiceError};

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate an email address's shape.
///
/// The value is checked, not normalized: session-scoped authorization
/// compares emails with exact equality, so the string forwarded to the
/// backend must be the string the caller was authorized against.
pub fn validate_email(email: &str) -> Result<(), ServiceError> {
    if email.is_empty() || !email.contains('@') || email.len() > 254 {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(())
}

// ─── Authorization ──────────────────────────────────────────────────────────

/// Enforce that a caller may only act on data scoped to their own email.
///
/// An anonymous caller passes: unauthenticated flows are allowed to act on a
/// self-declared email. That is a deliberate trust boundary inherited from
/// the upstream contract, not an oversight — tightening it would break every
/// logged-out client. An authenticated caller must match the target email
/// exactly (no case folding, no prefix matching).
pub fn authorize_email(caller: Option<&Identity>, target_email: &str) -> Result<(), ServiceError> {
    match caller {
        Some(user) if user.email != target_email => Err(ServiceError::Forbidden(format!(
            "not authorized to access data for {target_email}"
        ))),
        _ => Ok(()),
    }
}

// ─── Clear-Conversation Target ──────────────────────────────────────────────

/// What a clear-conversation request wants removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    /// One session and its messages.
    Session(String),
    /// Every session owned by an email, and their messages.
    Email(String),
}

/// Resolve the target of a clear request.
///
/// Exactly one of `conversation_id` / `email_id` must be present; zero or
/// both is a validation error.
pub fn clear_request_target(req: &ClearConversationRequest) -> Result<ClearTarget, ServiceError> {
    match (&req.conversation_id, &req.email_id) {
        (Some(id), None) if !id.is_empty() => Ok(ClearTarget::Session(id.clone())),
        (None, Some(email)) if !email.is_empty() => Ok(ClearTarget::Email(email.clone())),
        _ => Err(ServiceError::BadRequest(
            "exactly one of conversation_id or email_id must be provided".into(),
        )),
    }
}
