//! Groq backend implementation
//!
//! This module encapsulates the OpenAI-compatible chat-completions wire format
//! and the provider's error taxonomy.

use crate::llm::{CompletionBackend, CompletionError};
use anyhow::{Context, Result};
use kubechat_core::{CompletionRequest, CompletionResponse, Message, ToolCallRequest, ToolDescriptor};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Error code Groq reports when the model emits a call it cannot parse
const TOOL_USE_FAILED: &str = "tool_use_failed";

/// Connection settings for the completion service
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Chat-completions client for Groq (or any OpenAI-compatible endpoint)
pub struct GroqBackend {
    client: Client,
    config: GroqConfig,
}

impl GroqBackend {
    pub fn new(config: GroqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

impl CompletionBackend for GroqBackend {
    fn complete(&mut self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionError> {
        let body = ChatRequest::new(&self.config.model, request);
        tracing::debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let error = classify_error(status.as_u16(), &text);
            tracing::warn!(status = status.as_u16(), "Completion request rejected: {error}");
            return Err(error);
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::InvalidResponse(format!("failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::InvalidResponse("no choices in response".to_string()))?;

        choice.message.into_response()
    }
}

impl GroqBackend {
    fn transport_error(&self, error: reqwest::Error) -> CompletionError {
        if is_timeout(&error) {
            CompletionError::Timeout(self.config.timeout)
        } else {
            CompletionError::Transport(error.to_string())
        }
    }
}

/// Body reads that stall surface as an I/O `TimedOut` source, not always as
/// a reqwest timeout
fn is_timeout(error: &reqwest::Error) -> bool {
    if error.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Map a non-success response onto the completion error taxonomy
///
/// Only this function knows Groq's error codes.
pub fn classify_error(status: u16, body: &str) -> CompletionError {
    let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);

    match detail {
        Some(detail)
            if detail
                .code
                .as_deref()
                .is_some_and(|code| code.contains(TOOL_USE_FAILED)) =>
        {
            CompletionError::MalformedToolCall(detail.message)
        }
        Some(detail) => CompletionError::Api {
            status,
            message: detail.message,
        },
        None => CompletionError::Api {
            status,
            message: body.to_string(),
        },
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, request: &'a CompletionRequest) -> Self {
        Self {
            model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request
                .tools
                .iter()
                .map(|function| WireTool {
                    kind: "function",
                    function,
                })
                .collect(),
            tool_choice: request.tool_choice.map(|choice| choice.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDescriptor,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let role = message.role().as_str();
        match message {
            Message::User { content } | Message::Assistant { content } => Self {
                role,
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            },
            Message::AssistantToolCalls { content, tool_calls } => Self {
                role,
                content: content.clone(),
                tool_calls: Some(tool_calls.iter().map(WireToolCall::from).collect()),
                tool_call_id: None,
                name: None,
            },
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => Self {
                role,
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
                name: Some(name.clone()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

fn function_kind() -> String {
    "function".to_string()
}

/// Arguments travel as a JSON-encoded string
#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl From<&ToolCallRequest> for WireToolCall {
    fn from(call: &ToolCallRequest) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunction {
                name: call.function_name.clone(),
                arguments: Value::Object(call.arguments.clone()).to_string(),
            },
        }
    }
}

impl WireToolCall {
    fn into_request(self) -> Result<ToolCallRequest, CompletionError> {
        let arguments = parse_arguments(&self.function.arguments).ok_or_else(|| {
            CompletionError::MalformedToolCall(format!(
                "arguments for '{}' are not a JSON object: {}",
                self.function.name, self.function.arguments
            ))
        })?;

        Ok(ToolCallRequest {
            id: self.id,
            function_name: self.function.name,
            arguments,
        })
    }
}

fn parse_arguments(raw: &str) -> Option<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Some(Map::new());
    }
    match serde_json::from_str(raw).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

impl ChatChoiceMessage {
    fn into_response(self) -> Result<CompletionResponse, CompletionError> {
        let tool_calls = self
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(WireToolCall::into_request)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompletionResponse {
            content: self.content,
            tool_calls,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}
