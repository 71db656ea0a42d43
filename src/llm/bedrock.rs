// AWS Bedrock backend for Anthropic models, bearer-token authenticated
//
// Request:  POST {endpoint}/model/{model_id}/invoke
//           {anthropic_version, max_tokens, temperature, system?, messages, tools?}
// Reply:    {content: [{type: "text"|"tool_use", ...}], usage: {input_tokens, output_tokens}}
//
// Tool calls arrive as tool_use content blocks. The assistant's whole content
// array is echoed back, followed by one user message carrying a tool_result
// block per executed call.

use super::conversation::{ConversationMessage, MessageContent, Role};
use super::engine::{ClientRuntime, ModelTurn, WireProtocol};
use super::retry::Sleeper;
use super::transport::{HttpReply, HttpTransport};
use super::types::{InvocationRequest, InvocationResult, Usage};
use super::Backend;
use crate::config::BenchConfig;
use crate::error::{BackendError, Result};
use crate::tool_executor::ToolExecutor;
use crate::tools::{ToolArgs, ToolCallRequest, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

pub struct BedrockClient {
    runtime: ClientRuntime,
    bearer_token: String,
    endpoint: String,
}

impl BedrockClient {
    pub fn new(
        bearer_token: impl Into<String>,
        endpoint: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            runtime: ClientRuntime::new(transport),
            bearer_token: bearer_token.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// # Errors
    /// - `BenchError::EnvError` if AWS_BEARER_TOKEN_BEDROCK is not set
    pub fn from_config(config: &BenchConfig) -> Result<Self> {
        let bearer_token = config.require_bedrock_token()?.to_string();
        Ok(Self {
            runtime: ClientRuntime::from_config(config)?,
            bearer_token,
            endpoint: config.bedrock_endpoint.clone(),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.runtime.sleeper = sleeper;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.runtime.backoff_base = backoff_base;
        self
    }

    pub fn with_default_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.runtime.default_system_instructions = Some(instructions.into());
        self
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!("{}/model/{}/invoke", self.endpoint, model_id)
    }

    fn build_body(
        &self,
        request: &InvocationRequest,
        conversation: &[ConversationMessage],
        offer_tools: bool,
    ) -> Value {
        let (system, messages) = encode_conversation(conversation);

        let mut body = json!({
            "anthropic_version": ANTHROPIC_VERSION,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });

        if let Some(system) = system {
            body["system"] = json!(system);
        }

        if offer_tools && !request.tools.is_empty() {
            let tools: Vec<AnthropicTool> = request.tools.iter().map(AnthropicTool::from).collect();
            body["tools"] = json!(tools);
        }

        body
    }
}

#[async_trait]
impl WireProtocol for BedrockClient {
    fn name(&self) -> &str {
        "Bedrock"
    }

    async fn send_turn(
        &self,
        request: &InvocationRequest,
        conversation: &[ConversationMessage],
        offer_tools: bool,
    ) -> std::result::Result<ModelTurn, BackendError> {
        let body = self.build_body(request, conversation, offer_tools);
        let headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.bearer_token),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ];

        tracing::debug!(
            "Bedrock request: model={} messages={} tools={}",
            request.model_id,
            conversation.len(),
            offer_tools
        );

        let reply = self
            .runtime
            .transport
            .post_json(&self.invoke_url(&request.model_id), headers, &body)
            .await?;

        if !reply.is_success() {
            return Err(classify_failure(&reply));
        }

        let body: Value = serde_json::from_str(&reply.body).map_err(|e| {
            BackendError::InvalidResponse(format!("Bedrock returned invalid JSON: {}", e))
        })?;

        normalize_response(reply.status, &body)
    }
}

#[async_trait]
impl Backend for BedrockClient {
    fn name(&self) -> &str {
        "Bedrock"
    }

    async fn invoke(
        &self,
        request: &InvocationRequest,
        executor: Option<&mut ToolExecutor>,
    ) -> InvocationResult {
        self.runtime.invoke(self, request, executor).await
    }
}

/// Split off system text and encode the rest as Anthropic messages
///
/// Consecutive tool results are merged into a single user message, which is
/// what the messages API expects after a multi-call assistant turn.
fn encode_conversation(conversation: &[ConversationMessage]) -> (Option<String>, Vec<Value>) {
    let mut system: Vec<&str> = Vec::new();
    let mut messages: Vec<Value> = Vec::new();
    let mut pending_results: Vec<Value> = Vec::new();

    for message in conversation {
        if message.role != Role::Tool && !pending_results.is_empty() {
            messages.push(json!({
                "role": "user",
                "content": std::mem::take(&mut pending_results),
            }));
        }

        match (&message.role, &message.content) {
            (Role::System, MessageContent::Text(text)) => system.push(text),
            (Role::Tool, content) => pending_results.push(json!({
                "type": "tool_result",
                "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": content_as_text(content),
                "is_error": message.is_error,
            })),
            (Role::Assistant, MessageContent::ToolCalls(raw)) => messages.push(json!({
                "role": "assistant",
                "content": raw,
            })),
            (role, content) => messages.push(json!({
                "role": if *role == Role::Assistant { "assistant" } else { "user" },
                "content": content_as_text(content),
            })),
        }
    }

    if !pending_results.is_empty() {
        messages.push(json!({"role": "user", "content": pending_results}));
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, messages)
}

fn content_as_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::ToolCalls(raw) => raw.to_string(),
    }
}

/// Map a non-2xx reply to a BackendError
///
/// The error type comes from `__type` (namespace and URI suffix stripped);
/// 429 and any Throttling type are retryable.
fn classify_failure(reply: &HttpReply) -> BackendError {
    let body = reply.json().unwrap_or(Value::Null);

    let error_type = body["__type"]
        .as_str()
        .or_else(|| body["Output"]["__type"].as_str())
        .map(short_error_type)
        .filter(|t| !t.is_empty());

    let message = ["message", "Message", "error"]
        .iter()
        .find_map(|key| body[*key].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}: {}", reply.status, reply.body.trim()));

    let throttled = reply.status == 429
        || error_type.as_deref().is_some_and(|t| t.contains("Throttling"));
    let code = error_type.unwrap_or_else(|| format!("HTTP_{}", reply.status));

    if throttled {
        BackendError::Throttled { code, message }
    } else {
        BackendError::Http {
            status: reply.status,
            code,
            message,
        }
    }
}

/// "com.amazon.coral.service#ThrottlingException" -> "ThrottlingException"
/// "ValidationException:http://internal.amazon.com/..." -> "ValidationException"
fn short_error_type(raw: &str) -> String {
    let name = raw.rsplit('#').next().unwrap_or(raw);
    name.split(':').next().unwrap_or(name).trim().to_string()
}

/// Normalize a decoded 2xx body into a ModelTurn
fn normalize_response(status: u16, body: &Value) -> std::result::Result<ModelTurn, BackendError> {
    // Some bearer-token failures come back as 200 with an error envelope
    if let Some(raw_type) = body["Output"]["__type"].as_str() {
        let code = short_error_type(raw_type);
        let message = body["Output"]["message"]
            .as_str()
            .or_else(|| body["Output"]["Message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| code.clone());
        return Err(BackendError::Http {
            status,
            code,
            message,
        });
    }

    let blocks = body["content"].as_array().cloned().unwrap_or_default();

    let mut tool_calls = Vec::new();
    let mut echoed_blocks = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block["type"] == "tool_use" {
            let (request, echoed) = parse_tool_use(&block, tool_calls.len());
            tool_calls.push(request);
            echoed_blocks.push(echoed);
        } else {
            echoed_blocks.push(block);
        }
    }

    let content = extract_text(body);
    let usage = serde_json::from_value::<ApiUsage>(body["usage"].clone())
        .unwrap_or_default()
        .normalize();

    Ok(ModelTurn {
        content,
        usage,
        tool_calls,
        assistant_payload: Value::Array(echoed_blocks),
    })
}

/// Anthropic text blocks, then an OpenAI-style choice, then `text`/`output`
fn extract_text(body: &Value) -> String {
    let from_blocks: String = body["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text" || b["type"].is_null())
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default();
    if !from_blocks.is_empty() {
        return from_blocks;
    }

    let choice = &body["choices"][0];
    if let Some(text) = choice["message"]["content"]
        .as_str()
        .or_else(|| choice["text"].as_str())
    {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    body["text"]
        .as_str()
        .or_else(|| body["output"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn parse_tool_use(block: &Value, index: usize) -> (ToolCallRequest, Value) {
    let call_id = block["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", index));

    let arguments = match &block["input"] {
        Value::Object(map) => map.clone(),
        Value::String(encoded) => serde_json::from_str::<ToolArgs>(encoded).unwrap_or_default(),
        _ => ToolArgs::new(),
    };

    let mut echoed = block.clone();
    if let Value::Object(map) = &mut echoed {
        map.insert("id".to_string(), json!(call_id));
    }

    (
        ToolCallRequest {
            call_id,
            tool_name: block["name"].as_str().map(str::to_string),
            arguments,
        },
        echoed,
    )
}

/// Tool definition in Anthropic messages format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<&ToolSpec> for AnthropicTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            input_schema: spec.parameters.to_json(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiUsage {
    #[serde(alias = "prompt_tokens")]
    input_tokens: Option<u64>,
    #[serde(alias = "completion_tokens")]
    output_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

impl ApiUsage {
    fn normalize(self) -> Usage {
        Usage::new(
            self.input_tokens.unwrap_or(0),
            self.output_tokens.unwrap_or(0),
            self.total_tokens,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::retry::testing::RecordingSleeper;
    use crate::llm::transport::MockHttpTransport;
    use crate::tools::{ParameterSchema, PropertySchema, ToolCallResult, ToolRegistry};

    const ENDPOINT: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";
    const MODEL: &str = "us.anthropic.claude-3-5-sonnet-20241022-v2:0";

    fn client(mock: MockHttpTransport, sleeper: Arc<RecordingSleeper>) -> BedrockClient {
        BedrockClient::new("bedrock-token", ENDPOINT, Arc::new(mock))
            .with_sleeper(sleeper)
            .with_backoff_base(Duration::from_millis(50))
    }

    fn message(text: &str) -> HttpReply {
        HttpReply::new(
            200,
            json!({
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": text}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 31, "output_tokens": 5}
            })
            .to_string(),
        )
    }

    #[tokio::test]
    async fn test_plain_request_wire_format() {
        let mut mock = MockHttpTransport::new();
        mock.expect_post_json()
            .withf(|url, headers, body| {
                url == format!("{}/model/{}/invoke", ENDPOINT, MODEL)
                    && headers.contains(&(
                        "Authorization".to_string(),
                        "Bearer bedrock-token".to_string(),
                    ))
                    && body["anthropic_version"] == "bedrock-2023-05-31"
                    && body["system"] == "Answer in uppercase."
                    && body["messages"] == json!([{"role": "user", "content": "liver"}])
                    && body.get("tools").is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(message("LIVER")));

        let request = InvocationRequest::new(MODEL, "liver").with_system_instructions("Answer in uppercase.");

        let result = client(mock, Arc::new(RecordingSleeper::default()))
            .invoke(&request, None)
            .await;

        assert!(result.success);
        assert_eq!(result.content, "LIVER");
        assert_eq!(result.usage, Usage::new(31, 5, None));
        assert_eq!(result.usage.total_tokens, 36);
    }

    #[tokio::test]
    async fn test_default_system_instructions_apply() {
        let mut mock = MockHttpTransport::new();
        mock.expect_post_json()
            .withf(|_, _, body| body["system"] == "You are a curation assistant.")
            .times(1)
            .returning(|_, _, _| Ok(message("ok")));

        let result = client(mock, Arc::new(RecordingSleeper::default()))
            .with_default_system_instructions("You are a curation assistant.")
            .invoke(&InvocationRequest::new(MODEL, "p"), None)
            .await;

        assert!(result.success);
    }

    #[tokio::test]
    async fn test_throttling_exception_is_retried() {
        let mut mock = MockHttpTransport::new();
        let mut calls = 0;
        mock.expect_post_json().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Ok(HttpReply::new(
                    400,
                    r#"{"__type":"com.amazon.coral.availability#ThrottlingException","message":"Too many requests"}"#,
                ))
            } else {
                Ok(message("ok"))
            }
        });

        let sleeper = Arc::new(RecordingSleeper::default());
        let result = client(mock, Arc::clone(&sleeper))
            .invoke(&InvocationRequest::new(MODEL, "p"), None)
            .await;

        assert!(result.success);
        assert_eq!(result.attempt, 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(50)]);
    }

    #[tokio::test]
    async fn test_validation_error_reports_type() {
        let mut mock = MockHttpTransport::new();
        mock.expect_post_json().times(1).returning(|_, _, _| {
            Ok(HttpReply::new(
                400,
                r#"{"__type":"ValidationException:http://internal.amazon.com/coral/","message":"Malformed input request"}"#,
            ))
        });

        let result = client(mock, Arc::new(RecordingSleeper::default()))
            .invoke(&InvocationRequest::new(MODEL, "p"), None)
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Malformed input request"));
        assert_eq!(result.error_code.as_deref(), Some("ValidationException"));
        assert_eq!(result.attempt, 1);
    }

    #[tokio::test]
    async fn test_tool_use_round_trip() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolSpec::new(
                    "ontology_lookup",
                    "Look up an ontology term",
                    ParameterSchema::new().required_property("term", PropertySchema::string("Term")),
                ),
                |args: &ToolArgs| -> anyhow::Result<Value> { Ok(json!(format!("id for {}", args["term"].as_str().unwrap_or("")))) },
            )
            .unwrap();
        let mut executor = ToolExecutor::new(Arc::new(registry));

        let mut mock = MockHttpTransport::new();
        let mut calls = 0;
        mock.expect_post_json().times(2).returning(move |_, _, body| {
            calls += 1;
            if calls == 1 {
                assert_eq!(body["tools"][0]["name"], "ontology_lookup");
                assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
                Ok(HttpReply::new(
                    200,
                    json!({
                        "content": [
                            {"type": "text", "text": "Looking it up."},
                            {"type": "tool_use", "id": "toolu_1", "name": "ontology_lookup", "input": {"term": "liver"}},
                            {"type": "tool_use", "id": "toolu_2", "name": "unregistered", "input": {}}
                        ],
                        "stop_reason": "tool_use",
                        "usage": {"input_tokens": 50, "output_tokens": 20}
                    })
                    .to_string(),
                ))
            } else {
                let messages = body["messages"].as_array().unwrap();
                assert_eq!(messages.len(), 3);
                assert_eq!(messages[1]["role"], "assistant");
                assert_eq!(messages[1]["content"][1]["id"], "toolu_1");
                assert_eq!(messages[2]["role"], "user");
                let results = messages[2]["content"].as_array().unwrap();
                assert_eq!(results.len(), 2);
                assert_eq!(results[0]["type"], "tool_result");
                assert_eq!(results[0]["tool_use_id"], "toolu_1");
                assert_eq!(results[0]["content"], "id for liver");
                assert_eq!(results[0]["is_error"], false);
                assert_eq!(results[1]["tool_use_id"], "toolu_2");
                assert_eq!(results[1]["is_error"], true);
                Ok(message("UBERON:0002107"))
            }
        });

        let request = InvocationRequest::new(MODEL, "Map 'liver'").with_tools(executor.registry().specs());

        let result = client(mock, Arc::new(RecordingSleeper::default()))
            .invoke(&request, Some(&mut executor))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.content, "UBERON:0002107");
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_execution_history.len(), 2);
    }

    #[test]
    fn test_temperature_sent_without_float_noise() {
        let client = BedrockClient::new("bedrock-token", ENDPOINT, Arc::new(MockHttpTransport::new()));
        let request = InvocationRequest::new(MODEL, "p").with_temperature(0.7);
        let conversation = vec![ConversationMessage::user("p")];

        let body = client.build_body(&request, &conversation, false);

        assert_eq!(serde_json::to_string(&body["temperature"]).unwrap(), "0.7");
    }

    #[test]
    fn test_extract_text_fallbacks() {
        assert_eq!(
            extract_text(&json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]})),
            "ab"
        );
        assert_eq!(
            extract_text(&json!({"choices": [{"message": {"content": "from choices"}}]})),
            "from choices"
        );
        assert_eq!(extract_text(&json!({"choices": [{"text": "legacy"}]})), "legacy");
        assert_eq!(extract_text(&json!({"output": "raw output"})), "raw output");
        assert_eq!(extract_text(&json!({})), "");
    }

    #[test]
    fn test_usage_accepts_openai_names() {
        let turn = normalize_response(
            200,
            &json!({"text": "x", "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}}),
        )
        .unwrap();
        assert_eq!(turn.usage, Usage::new(4, 2, Some(6)));
    }

    #[test]
    fn test_error_envelope_in_success_reply() {
        let err = normalize_response(
            200,
            &json!({"Output": {"__type": "com.amazon.coral.service#UnknownOperationException"}}),
        )
        .unwrap_err();

        assert_eq!(err.error_code(), "UnknownOperationException");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_plain_429() {
        let err = classify_failure(&HttpReply::new(429, "slow down"));
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "HTTP_429");
        assert_eq!(err.to_string(), "HTTP 429: slow down");
    }

    #[test]
    fn test_consecutive_tool_results_merge() {
        let conversation = vec![
            ConversationMessage::system("sys"),
            ConversationMessage::user("q"),
            ConversationMessage::assistant_tool_calls(json!([{"type": "tool_use", "id": "a"}])),
            ConversationMessage::tool_result(&ToolCallResult::success("a", "1")),
            ConversationMessage::tool_result(&ToolCallResult::error("b", "boom")),
            ConversationMessage::assistant("done"),
        ];

        let (system, messages) = encode_conversation(&conversation);

        assert_eq!(system.as_deref(), Some("sys"));
        let roles: Vec<&str> = messages.iter().filter_map(|m| m["role"].as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
        assert_eq!(messages[2]["content"].as_array().unwrap().len(), 2);
        assert_eq!(messages[2]["content"][1]["is_error"], true);
    }
}
