use crate::tool::ToolDescriptor;
use serde_json::{Map, Value};

/// The role of a message, as the completion service sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A message in the conversation transcript
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Text typed by the user
    User { content: String },

    /// A plain assistant reply
    Assistant { content: String },

    /// An assistant turn that asks the caller to invoke one or more tools
    AssistantToolCalls {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },

    /// The textual result of a tool call, paired by `tool_call_id`
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    pub fn tool_result(call: &ToolCallRequest, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: call.id.clone(),
            name: call.function_name.clone(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant { .. } | Self::AssistantToolCalls { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }
}

/// A structured request from the model to invoke a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Opaque token used to pair the call with its result
    pub id: String,

    /// Name of the function the model wants to call
    pub function_name: String,

    /// Parameter name to value
    pub arguments: Map<String, Value>,
}

/// How the model may use the offered tools
///
/// Only `auto` is sent: the model decides whether to call a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
        }
    }
}

/// A provider-agnostic chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
    pub tool_choice: Option<ToolChoice>,
}

impl CompletionRequest {
    /// First-phase request: the model decides whether to call a tool
    pub fn with_tools(messages: Vec<Message>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            messages,
            tools,
            tool_choice: Some(ToolChoice::Auto),
        }
    }

    /// Follow-up request: no tools attached, the model only summarizes
    pub fn without_tools(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: None,
        }
    }
}

/// The assistant message returned by the completion service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

/// Decide whether a completion is a plain reply or a tool invocation
///
/// Any tool call in the response wins over its text content.
pub fn parse_completion(response: CompletionResponse) -> ParseResult {
    if response.tool_calls.is_empty() {
        ParseResult::Reply(response.content.unwrap_or_default())
    } else {
        ParseResult::ToolCalls {
            content: response.content,
            calls: response.tool_calls,
        }
    }
}

/// The result of parsing a completion response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// The model answered directly
    Reply(String),

    /// The model wants one or more tools invoked
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
}
