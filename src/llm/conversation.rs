// Backend-neutral conversation built up during one invocation
//
// Messages are appended in order and discarded when the invocation ends.
// Each backend encodes this sequence into its own wire format; the raw
// tool-call payload of an assistant turn is kept exactly as the backend sent
// it so it can be echoed back unchanged.

use crate::tools::ToolCallResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    /// Raw tool-call payload of an assistant turn, in the backend's format
    ToolCalls(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on tool messages whose call failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ConversationMessage {
    fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            tool_call_id: None,
            is_error: false,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Assistant turn that requested tools
    pub fn assistant_tool_calls(raw: Value) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCalls(raw),
            tool_call_id: None,
            is_error: false,
        }
    }

    /// Tool output, tagged with the call it answers
    pub fn tool_result(result: &ToolCallResult) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(result.text()),
            tool_call_id: Some(result.call_id.clone()),
            is_error: result.is_error(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::ToolCalls(_) => None,
        }
    }
}

/// Opening messages: optional system instructions, then the prompt
pub fn initial_conversation(
    system_instructions: Option<&str>,
    prompt: &str,
) -> Vec<ConversationMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_instructions.filter(|s| !s.is_empty()) {
        messages.push(ConversationMessage::system(system));
    }
    messages.push(ConversationMessage::user(prompt));
    messages
}
