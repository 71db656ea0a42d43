// Tool-call requests parsed from model replies, their results, and the
// audit records the executor keeps for each execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ToolArgs;

/// A tool call requested by the model
///
/// `call_id` is backend-assigned, or synthesized when the backend omits it.
/// `tool_name` is optional so a malformed reply still reaches the executor,
/// which turns it into an error result instead of dropping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: Option<String>,
    #[serde(default)]
    pub arguments: ToolArgs,
}

impl ToolCallRequest {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: ToolArgs) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: Some(tool_name.into()),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// Outcome of one tool call, echoed back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub status: ToolStatus,
    /// Ordered text blocks
    pub content: Vec<String>,
}

impl ToolCallResult {
    pub fn success(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            status: ToolStatus::Success,
            content: vec![text.into()],
        }
    }

    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            status: ToolStatus::Error,
            content: vec![message.into()],
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    /// All content blocks joined into one body
    pub fn text(&self) -> String {
        self.content.concat()
    }
}

/// Audit entry for one execution attempt
///
/// `result` holds the raw tool output (not its serialized text) and is only
/// present on success. Lookups of unknown tools are recorded without
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_name: String,
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ToolArgs>,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}
