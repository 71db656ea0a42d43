// OpenRouter backend (OpenAI-compatible chat completions)
//
// Reference: https://openrouter.ai/docs/features/tool-calling
//
// Request:  POST {base}/chat/completions, Authorization: Bearer <key>
//           {model, messages, max_tokens, temperature, tools?}
// Reply:    {choices: [{message: {content, tool_calls?}}], usage: {...}}
//
// Tool definitions use the OpenAI function-calling format. Tool-call
// arguments arrive as a JSON-encoded string and are decoded here; the raw
// tool_calls array is echoed back on the following assistant message.

use super::conversation::{ConversationMessage, MessageContent, Role};
use super::engine::{ClientRuntime, ModelTurn, WireProtocol};
use super::retry::Sleeper;
use super::transport::{HttpReply, HttpTransport};
use super::types::{InvocationRequest, InvocationResult, Usage};
use super::Backend;
use crate::config::{BenchConfig, DEFAULT_OPENROUTER_BASE_URL};
use crate::error::{BackendError, Result};
use crate::tool_executor::ToolExecutor;
use crate::tools::{ToolArgs, ToolCallRequest, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub struct OpenRouterClient {
    runtime: ClientRuntime,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            runtime: ClientRuntime::new(transport),
            api_key: api_key.into(),
            base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
        }
    }

    /// Client with a reqwest transport, built from configuration
    ///
    /// # Errors
    /// - `BenchError::EnvError` if OPENROUTER_API_KEY is not set
    pub fn from_config(config: &BenchConfig) -> Result<Self> {
        let api_key = config.require_openrouter_key()?.to_string();
        Ok(Self {
            runtime: ClientRuntime::from_config(config)?,
            api_key,
            base_url: config.openrouter_base_url.clone(),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.runtime.sleeper = sleeper;
        self
    }

    /// Delay before the first retry; doubles for each later one
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.runtime.backoff_base = backoff_base;
        self
    }

    pub fn with_default_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.runtime.default_system_instructions = Some(instructions.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(
        &self,
        request: &InvocationRequest,
        conversation: &[ConversationMessage],
        offer_tools: bool,
    ) -> Value {
        let messages: Vec<ApiMessage> = conversation.iter().map(ApiMessage::from).collect();

        let mut body = json!({
            "model": request.model_id,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if offer_tools && !request.tools.is_empty() {
            let tools: Vec<ToolDefinition> = request.tools.iter().map(ToolDefinition::from).collect();
            body["tools"] = json!(tools);
        }

        body
    }
}

#[async_trait]
impl WireProtocol for OpenRouterClient {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    async fn send_turn(
        &self,
        request: &InvocationRequest,
        conversation: &[ConversationMessage],
        offer_tools: bool,
    ) -> std::result::Result<ModelTurn, BackendError> {
        let body = self.build_body(request, conversation, offer_tools);
        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )];

        tracing::debug!(
            "OpenRouter request: model={} messages={} tools={}",
            request.model_id,
            conversation.len(),
            offer_tools
        );

        let reply = self
            .runtime
            .transport
            .post_json(&self.completions_url(), headers, &body)
            .await?;

        if !reply.is_success() {
            return Err(classify_failure(&reply));
        }

        let completion: CompletionResponse = serde_json::from_str(&reply.body).map_err(|e| {
            BackendError::InvalidResponse(format!("OpenRouter returned invalid JSON: {}", e))
        })?;

        normalize_response(completion)
    }
}

#[async_trait]
impl Backend for OpenRouterClient {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    async fn invoke(
        &self,
        request: &InvocationRequest,
        executor: Option<&mut ToolExecutor>,
    ) -> InvocationResult {
        self.runtime.invoke(self, request, executor).await
    }
}

/// Map a non-2xx reply to a BackendError
///
/// 429 is throttling; everything else is final. The message comes from the
/// body's `error.message` when the body has one.
fn classify_failure(reply: &HttpReply) -> BackendError {
    let code = format!("HTTP_{}", reply.status);
    let message = reply
        .json()
        .and_then(|body| body["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}: {}", reply.status, reply.body.trim()));

    if reply.status == 429 {
        BackendError::Throttled { code, message }
    } else {
        BackendError::Http {
            status: reply.status,
            code,
            message,
        }
    }
}

/// Normalize a decoded completion into a ModelTurn
///
/// Missing fields degrade to empty content and zero usage. A 2xx reply that
/// carries only an `error` object is classified like an HTTP failure.
fn normalize_response(completion: CompletionResponse) -> std::result::Result<ModelTurn, BackendError> {
    if completion.choices.is_empty() {
        if let Some(error) = completion.error {
            let status = error
                .code
                .as_ref()
                .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
                .and_then(|n| u16::try_from(n).ok())
                .unwrap_or(500);
            let message = error.message.unwrap_or_else(|| "OpenRouter error".to_string());
            let code = format!("HTTP_{}", status);
            return Err(if status == 429 {
                BackendError::Throttled { code, message }
            } else {
                BackendError::Http {
                    status,
                    code,
                    message,
                }
            });
        }
    }

    let content = completion
        .choices
        .first()
        .map(CompletionChoice::text)
        .unwrap_or_default();

    let mut raw_calls = Vec::new();
    let mut tool_calls = Vec::new();
    for choice in &completion.choices {
        let Some(calls) = choice.message.as_ref().and_then(|m| m.tool_calls.as_ref()) else {
            continue;
        };
        for raw in calls {
            let (request, echoed) = parse_tool_call(raw, tool_calls.len());
            tool_calls.push(request);
            raw_calls.push(echoed);
        }
    }

    Ok(ModelTurn {
        content,
        usage: completion.usage.map(ApiUsage::normalize).unwrap_or_default(),
        tool_calls,
        assistant_payload: Value::Array(raw_calls),
    })
}

/// Decode one OpenAI-style tool call
///
/// Returns the request and the raw entry to echo back, with a synthesized
/// `call_<n>` id filled in when the backend sent none.
fn parse_tool_call(raw: &Value, index: usize) -> (ToolCallRequest, Value) {
    let call_id = raw["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", index));

    let function = &raw["function"];
    let tool_name = function["name"].as_str().map(str::to_string);
    let arguments = match &function["arguments"] {
        Value::String(encoded) => serde_json::from_str::<ToolArgs>(encoded).unwrap_or_default(),
        Value::Object(map) => map.clone(),
        _ => ToolArgs::new(),
    };

    let mut echoed = raw.clone();
    if let Value::Object(map) = &mut echoed {
        map.insert("id".to_string(), json!(call_id));
    }

    (
        ToolCallRequest {
            call_id,
            tool_name,
            arguments,
        },
        echoed,
    )
}

/// Tool definition in OpenAI function-calling format
///
/// ```json
/// {
///   "type": "function",
///   "function": {
///     "name": "fuzzy_match",
///     "description": "Find the closest matches for a value...",
///     "parameters": { "type": "object", "properties": {...}, "required": [...] }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,

    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.to_json(),
            },
        }
    }
}

// Internal API types

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    /// null on assistant turns that only carry tool calls
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ConversationMessage> for ApiMessage {
    fn from(message: &ConversationMessage) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        match &message.content {
            MessageContent::Text(text) => Self {
                role,
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: message.tool_call_id.clone(),
            },
            MessageContent::ToolCalls(raw) => Self {
                role,
                content: None,
                tool_calls: Some(raw.clone()),
                tool_call_id: None,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<ApiUsage>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionChoice {
    message: Option<ResponseMessage>,
    /// Legacy completions shape
    text: Option<String>,
}

impl CompletionChoice {
    fn text(&self) -> String {
        if let Some(content) = self.message.as_ref().and_then(|m| m.content.as_ref()) {
            return content_text(content);
        }
        self.text.clone().unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseMessage {
    /// A string, null, or an array of content parts
    content: Option<Value>,
    tool_calls: Option<Vec<Value>>,
}

fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .concat(),
        _ => String::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiUsage {
    #[serde(alias = "input_tokens")]
    prompt_tokens: Option<u64>,
    #[serde(alias = "output_tokens")]
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

impl ApiUsage {
    fn normalize(self) -> Usage {
        Usage::new(
            self.prompt_tokens.unwrap_or(0),
            self.completion_tokens.unwrap_or(0),
            self.total_tokens,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiErrorBody {
    message: Option<String>,
    code: Option<Value>,
}
