//! Interactive chat loop
//!
//! Reads one line per turn, drives the turn state machine through the
//! completion client and the tool registry, and prints the final text.

use crate::completion::{CompletionClient, FirstResponse};
use crate::llm::{CompletionBackend, CompletionError};
use kubechat_core::{Conversation, ConversationError, ToolError, ToolRegistry, TurnDecision};
use std::io::{self, BufRead, Write};

const GREETING: &str = "Welcome to the Kubernetes Chatbot!\nYou can ask me anything about your Kubernetes cluster.";
const PROMPT: &str = " User Input:  > ";
const RESPONSE_PREFIX: &str = " Chatbot Response:  > ";
const FAREWELL: &str = "Goodbye!";

/// Anything that ends a turn without a reply
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Whether a line ends the session
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("q")
}

/// One conversation with one tool registry
pub struct ChatSession<B> {
    client: CompletionClient<B>,
    registry: ToolRegistry,
    conversation: Conversation,
}

impl<B: CompletionBackend> ChatSession<B> {
    pub fn new(client: CompletionClient<B>, registry: ToolRegistry) -> Self {
        Self {
            client,
            registry,
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run until the user exits or input ends
    ///
    /// A failed turn is reported and the loop keeps going.
    pub fn run(&mut self, mut input: impl BufRead, mut output: impl Write) -> io::Result<()> {
        writeln!(output, "{}", GREETING)?;

        loop {
            write!(output, "{}", PROMPT)?;
            output.flush()?;

            // Invalid UTF-8 is replaced, not fatal
            let mut buf = Vec::new();
            if input.read_until(b'\n', &mut buf)? == 0 {
                writeln!(output, "{}", FAREWELL)?;
                return Ok(());
            }

            let line = String::from_utf8_lossy(&buf);
            if is_exit_command(&line) {
                writeln!(output, "{}", FAREWELL)?;
                return Ok(());
            }

            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            match self.handle_turn(text) {
                Ok(reply) => {
                    writeln!(output)?;
                    writeln!(output, "{}{}", RESPONSE_PREFIX, reply)?;
                    writeln!(output)?;
                }
                Err(e) => {
                    tracing::error!("Turn failed: {e}");
                    writeln!(output)?;
                    writeln!(output, "Error: {}", e)?;
                    writeln!(output)?;
                }
            }
        }
    }

    /// Resolve one user turn and return the text to show
    ///
    /// The transcript only changes when the turn succeeds.
    pub fn handle_turn(&mut self, user_text: &str) -> Result<String, TurnError> {
        let mut turn = self.conversation.begin_turn(user_text);

        let first = self
            .client
            .complete_first(self.conversation.request_messages(&turn))?;

        let reply = match first {
            FirstResponse::Fallback(text) => turn.resolve(text)?,
            FirstResponse::Completion(response) => match turn.apply_first_response(response)? {
                TurnDecision::Reply(text) => text,
                TurnDecision::DispatchTools(calls) => {
                    tracing::info!(calls = calls.len(), "Model requested tool calls");
                    for call in &calls {
                        let result = self.registry.dispatch(call)?;
                        turn.apply_tool_result(call, result)?;
                    }

                    let follow_up = self
                        .client
                        .complete_follow_up(self.conversation.request_messages(&turn))?;
                    turn.apply_follow_up(follow_up)?
                }
            },
        };

        self.conversation.commit(turn)?;
        Ok(reply)
    }
}
