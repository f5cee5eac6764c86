//! Two-phase exchange with the completion service
//!
//! The first request offers the tools and lets the model decide. The
//! follow-up request carries the tool results and offers no tools, so the
//! model summarizes instead of calling again.

use crate::llm::{CompletionBackend, CompletionError};
use kubechat_core::{CompletionRequest, CompletionResponse, Message, ToolDescriptor};

/// Reply used when the model produced a tool call that could not be parsed
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I didn't understand that. I can only execute kubectl commands.";

/// Outcome of the first completion of a turn
#[derive(Debug, Clone, PartialEq)]
pub enum FirstResponse {
    /// The model's message, possibly carrying tool calls
    Completion(CompletionResponse),

    /// The model botched a tool call; show this text instead
    Fallback(&'static str),
}

pub struct CompletionClient<B> {
    backend: B,
    tools: Vec<ToolDescriptor>,
}

impl<B: CompletionBackend> CompletionClient<B> {
    pub fn new(backend: B, tools: Vec<ToolDescriptor>) -> Self {
        Self { backend, tools }
    }

    /// Send the transcript with the tools attached and `auto` tool choice
    pub fn complete_first(&mut self, messages: Vec<Message>) -> Result<FirstResponse, CompletionError> {
        let request = CompletionRequest::with_tools(messages, self.tools.clone());

        match self.backend.complete(&request) {
            Ok(response) => Ok(FirstResponse::Completion(response)),
            Err(CompletionError::MalformedToolCall(detail)) => {
                tracing::warn!("Model produced an invalid tool call: {detail}");
                Ok(FirstResponse::Fallback(FALLBACK_REPLY))
            }
            Err(e) => Err(e),
        }
    }

    /// Send the transcript, now holding every tool result, without tools
    pub fn complete_follow_up(
        &mut self,
        messages: Vec<Message>,
    ) -> Result<CompletionResponse, CompletionError> {
        let request = CompletionRequest::without_tools(messages);
        self.backend.complete(&request)
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
