//! # kubechat-core
//!
//! Pure Rust conversation logic with no dependencies on the OS, the network,
//! or a specific completion provider.
//!
//! This crate provides the tool-invocation loop semantics:
//! - Describe the callable tools and dispatch calls to them by typed id
//! - Normalize kubectl commands and gate destructive ones
//! - Track the transcript and the per-turn state machine
//!   (first completion, tool calls, follow-up completion)

#![forbid(unsafe_code)]

pub mod conversation;
pub mod guardrail;
pub mod protocol;
pub mod tool;

// Re-export commonly used types
pub use conversation::{Conversation, ConversationError, Turn, TurnDecision, TurnPhase};
pub use guardrail::{normalize_command, CommandGuardrail, DenyVerbGuard, GuardrailChain, GuardrailResult};
pub use protocol::{
    parse_completion, CompletionRequest, CompletionResponse, Message, ParseResult, Role,
    ToolCallRequest, ToolChoice,
};
pub use tool::{Tool, ToolDescriptor, ToolError, ToolId, ToolRegistry};
