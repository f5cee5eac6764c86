//! Completion backend abstraction
//!
//! This module defines the interface between the host runtime and the
//! completion service. The conversation core never depends on this, it only
//! sees provider-agnostic requests and responses.

use kubechat_core::{CompletionRequest, CompletionResponse};
use std::time::Duration;

/// Failures at the completion service boundary
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The model tried to call a tool but produced an invalid call
    #[error("model produced an invalid tool call: {0}")]
    MalformedToolCall(String),

    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("completion request failed: {0}")]
    Transport(String),

    #[error("unexpected completion response: {0}")]
    InvalidResponse(String),
}

/// Host-side completion backend interface
///
/// Implementors speak to an actual completion service.
pub trait CompletionBackend {
    /// Send one request and wait for the assistant's message
    fn complete(&mut self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionError>;
}
