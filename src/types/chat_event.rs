use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The name of a server-sent chat event.
///
/// Names the client does not know are kept in [`ChatEventType::Other`] so newer servers can add
/// events without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatEventType {
    /// A delta of assistant text (and possibly reasoning text).
    MessageChunk,
    /// Complete tool calls issued by an agent.
    ToolCalls,
    /// Partial tool call arguments being streamed.
    ToolCallChunks,
    /// The output of a tool call.
    ToolCallResult,
    /// The assistant is asking the user to choose before it continues.
    Interrupt,
    /// The server reported an error inside the stream.
    Error,
    /// Any other event name.
    Other(String),
}

impl ChatEventType {
    /// The event name as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            ChatEventType::MessageChunk => "message_chunk",
            ChatEventType::ToolCalls => "tool_calls",
            ChatEventType::ToolCallChunks => "tool_call_chunks",
            ChatEventType::ToolCallResult => "tool_call_result",
            ChatEventType::Interrupt => "interrupt",
            ChatEventType::Error => "error",
            ChatEventType::Other(name) => name,
        }
    }
}

impl From<&str> for ChatEventType {
    fn from(name: &str) -> Self {
        match name {
            "message_chunk" => ChatEventType::MessageChunk,
            "tool_calls" => ChatEventType::ToolCalls,
            "tool_call_chunks" => ChatEventType::ToolCallChunks,
            "tool_call_result" => ChatEventType::ToolCallResult,
            "interrupt" => ChatEventType::Interrupt,
            "error" => ChatEventType::Error,
            other => ChatEventType::Other(other.to_string()),
        }
    }
}

impl From<String> for ChatEventType {
    fn from(name: String) -> Self {
        ChatEventType::from(name.as_str())
    }
}

impl From<ChatEventType> for String {
    fn from(event_type: ChatEventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl fmt::Display for ChatEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded event from the chat stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// The event name.
    #[serde(rename = "type")]
    pub event_type: ChatEventType,
    /// The JSON payload.  Its shape depends on `event_type`.
    pub data: Value,
}

impl ChatEvent {
    /// Creates a new event.
    pub fn new(event_type: impl Into<ChatEventType>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// Decodes the payload into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            Error::serialization(
                format!("failed to decode `{}` payload: {e}", self.event_type),
                Some(Box::new(e)),
            )
        })
    }

    /// Returns the interrupt payload if this is an interrupt event.
    pub fn interrupt(&self) -> Option<Result<InterruptEvent>> {
        (self.event_type == ChatEventType::Interrupt).then(|| self.decode())
    }

    /// Returns the message chunk payload if this is a message chunk.
    pub fn message_chunk(&self) -> Option<Result<MessageChunk>> {
        (self.event_type == ChatEventType::MessageChunk).then(|| self.decode())
    }
}

/// Payload of a `message_chunk` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChunk {
    /// Message the chunk belongs to.
    #[serde(default)]
    pub id: String,
    /// Conversation the message belongs to.
    #[serde(default)]
    pub thread_id: String,
    /// Agent producing the message (planner, researcher, reporter, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Message role, usually `assistant`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Reasoning text delta, present when deep thinking is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Set on the final chunk of a message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A single complete tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool call identifier.
    #[serde(default)]
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub args: Value,
}

/// Payload of a `tool_calls` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallsEvent {
    /// Message the calls belong to.
    #[serde(default)]
    pub id: String,
    /// Agent issuing the calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// The calls.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// Payload of a `tool_call_result` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Message the result belongs to.
    #[serde(default)]
    pub id: String,
    /// The call this result answers.
    pub tool_call_id: String,
    /// Tool output.
    #[serde(default)]
    pub content: Value,
}

/// An option offered by an interrupt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptOption {
    /// Display text.
    pub text: String,
    /// Value sent back as `interrupt_feedback`.
    pub value: String,
}

impl InterruptOption {
    /// Creates a new option.
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }
}

/// Payload of an `interrupt` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptEvent {
    /// Message the interrupt belongs to.
    #[serde(default)]
    pub id: String,
    /// Conversation the interrupt belongs to.
    #[serde(default)]
    pub thread_id: String,
    /// Question shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Usually `interrupt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Choices the user can make.
    #[serde(default)]
    pub options: Vec<InterruptOption>,
}
