use crate::error::BackendError;
use crate::tools::{ExecutionRecord, ToolCallRequest, ToolSpec};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Everything a backend needs for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub model_id: String,
    pub prompt: String,

    /// Falls back to the configured default when None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,

    pub temperature: f64,
    pub max_tokens: u32,

    /// Attempt ceiling for throttled requests
    pub max_retries: u32,

    /// Tools offered to the model; only used together with an executor
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

impl InvocationRequest {
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            prompt: prompt.into(),
            system_instructions: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_retries: DEFAULT_MAX_RETRIES,
            tools: Vec::new(),
        }
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// Token accounting for an invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Build usage, computing the total when the backend omitted it
    pub fn new(input_tokens: u64, output_tokens: u64, total_tokens: Option<u64>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: total_tokens.unwrap_or(input_tokens.saturating_add(output_tokens)),
        }
    }
}

/// Normalized outcome of an invocation, identical in shape for every backend
///
/// Callers branch on `success`; `error` and `error_code` are only present
/// on failure. `tool_calls` accumulates every tool call observed across all
/// attempts and tool iterations of the invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub success: bool,
    pub content: String,
    pub model_id: String,
    pub usage: Usage,

    /// 1-based attempt that succeeded or ended the invocation
    pub attempt: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    #[serde(default)]
    pub tool_execution_history: Vec<ExecutionRecord>,
}

impl InvocationResult {
    pub fn succeeded(model_id: impl Into<String>, content: String, usage: Usage, attempt: u32) -> Self {
        Self {
            success: true,
            content,
            model_id: model_id.into(),
            usage,
            attempt,
            error: None,
            error_code: None,
            tool_calls: Vec::new(),
            tool_execution_history: Vec::new(),
        }
    }

    /// Failure carrying the error's message and classification code
    pub fn failed(model_id: impl Into<String>, error: &BackendError, attempt: u32) -> Self {
        Self::failure(model_id, error.to_string(), Some(error.error_code()), attempt)
    }

    pub fn failure(
        model_id: impl Into<String>,
        error: impl Into<String>,
        error_code: Option<String>,
        attempt: u32,
    ) -> Self {
        Self {
            success: false,
            content: String::new(),
            model_id: model_id.into(),
            usage: Usage::default(),
            attempt,
            error: Some(error.into()),
            error_code,
            tool_calls: Vec::new(),
            tool_execution_history: Vec::new(),
        }
    }

    pub fn with_tool_activity(
        mut self,
        tool_calls: Vec<ToolCallRequest>,
        history: Vec<ExecutionRecord>,
    ) -> Self {
        self.tool_calls = tool_calls;
        self.tool_execution_history = history;
        self
    }
}
