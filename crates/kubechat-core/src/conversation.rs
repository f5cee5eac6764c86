use crate::protocol::{parse_completion, CompletionResponse, Message, ParseResult, ToolCallRequest};
use std::collections::VecDeque;
use std::fmt;

/// The committed conversation transcript
///
/// Append-only. Messages only land here once a turn has fully resolved, so
/// every tool call in the transcript is already paired with its result.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    history: Vec<Message>,
}

/// Where a user turn currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingFirstResponse,
    ToolCallsPending,
    AwaitingFollowUp,
    Done,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingFirstResponse => "awaiting first response",
            Self::ToolCallsPending => "tool calls pending",
            Self::AwaitingFollowUp => "awaiting follow-up response",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Protocol violations while advancing a turn
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConversationError {
    #[error("cannot {action} while the turn is {phase}")]
    UnexpectedPhase { action: &'static str, phase: TurnPhase },
    #[error("tool result for call '{got}' does not match the next pending call '{expected}'")]
    UnpairedToolResult { expected: String, got: String },
    #[error("no tool call is pending, got a result for '{0}'")]
    NoPendingCall(String),
}

/// The decision made after the first completion of a turn
#[derive(Debug, Clone, PartialEq)]
pub enum TurnDecision {
    /// The model answered directly; the turn is done
    Reply(String),

    /// Every call must be dispatched, in order, before the follow-up
    DispatchTools(Vec<ToolCallRequest>),
}

/// A user turn in flight
///
/// Holds the messages staged during the turn and the calls still waiting for
/// a result.
#[derive(Debug, Clone)]
pub struct Turn {
    messages: Vec<Message>,
    phase: TurnPhase,
    pending: VecDeque<ToolCallRequest>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed transcript, oldest first
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Start a turn with the user's text
    pub fn begin_turn(&self, user_text: impl Into<String>) -> Turn {
        Turn {
            messages: vec![Message::user(user_text)],
            phase: TurnPhase::AwaitingFirstResponse,
            pending: VecDeque::new(),
        }
    }

    /// Committed history followed by the turn's staged messages
    pub fn request_messages(&self, turn: &Turn) -> Vec<Message> {
        self.history
            .iter()
            .chain(turn.messages.iter())
            .cloned()
            .collect()
    }

    /// Append a resolved turn to the transcript
    pub fn commit(&mut self, turn: Turn) -> Result<(), ConversationError> {
        if turn.phase != TurnPhase::Done {
            return Err(ConversationError::UnexpectedPhase {
                action: "commit",
                phase: turn.phase,
            });
        }
        self.history.extend(turn.messages);
        Ok(())
    }
}

impl Turn {
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Process the first completion of the turn
    pub fn apply_first_response(
        &mut self,
        response: CompletionResponse,
    ) -> Result<TurnDecision, ConversationError> {
        self.expect_phase(TurnPhase::AwaitingFirstResponse, "apply a first response")?;

        match parse_completion(response) {
            ParseResult::Reply(text) => {
                self.messages.push(Message::assistant(text.clone()));
                self.phase = TurnPhase::Done;
                Ok(TurnDecision::Reply(text))
            }
            ParseResult::ToolCalls { content, calls } => {
                // The assistant's call must precede the results in the transcript
                self.messages.push(Message::AssistantToolCalls {
                    content,
                    tool_calls: calls.clone(),
                });
                self.pending = calls.iter().cloned().collect();
                self.phase = TurnPhase::ToolCallsPending;
                Ok(TurnDecision::DispatchTools(calls))
            }
        }
    }

    /// Pair the next pending call with its textual result
    pub fn apply_tool_result(
        &mut self,
        call: &ToolCallRequest,
        content: impl Into<String>,
    ) -> Result<(), ConversationError> {
        self.expect_phase(TurnPhase::ToolCallsPending, "apply a tool result")?;

        let expected = self
            .pending
            .front()
            .ok_or_else(|| ConversationError::NoPendingCall(call.id.clone()))?;
        if expected.id != call.id {
            return Err(ConversationError::UnpairedToolResult {
                expected: expected.id.clone(),
                got: call.id.clone(),
            });
        }

        self.pending.pop_front();
        self.messages.push(Message::tool_result(call, content));
        if self.pending.is_empty() {
            self.phase = TurnPhase::AwaitingFollowUp;
        }
        Ok(())
    }

    /// Process the follow-up completion and finish the turn
    ///
    /// Tool calls in a follow-up are ignored: no tools were offered.
    pub fn apply_follow_up(
        &mut self,
        response: CompletionResponse,
    ) -> Result<String, ConversationError> {
        self.expect_phase(TurnPhase::AwaitingFollowUp, "apply a follow-up response")?;

        let text = response.content.unwrap_or_default();
        self.messages.push(Message::assistant(text.clone()));
        self.phase = TurnPhase::Done;
        Ok(text)
    }

    /// Finish a turn that is still awaiting its first response with a local reply
    pub fn resolve(&mut self, text: impl Into<String>) -> Result<String, ConversationError> {
        self.expect_phase(TurnPhase::AwaitingFirstResponse, "resolve locally")?;

        let text = text.into();
        self.messages.push(Message::assistant(text.clone()));
        self.phase = TurnPhase::Done;
        Ok(text)
    }

    fn expect_phase(&self, phase: TurnPhase, action: &'static str) -> Result<(), ConversationError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(ConversationError::UnexpectedPhase {
                action,
                phase: self.phase,
            })
        }
    }
}
