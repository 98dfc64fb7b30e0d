//! Typed HTTP client for the chat backend API.
//!
//! Forwards chat and session-management operations, applies per-operation
//! timeouts, and classifies transport failures into typed outcomes so the
//! server can map them onto HTTP statuses deterministically.

mod client;
mod error;

pub use client::{BackendClient, CHAT_TIMEOUT, MANAGEMENT_TIMEOUT};
pub use error::GatewayError;
