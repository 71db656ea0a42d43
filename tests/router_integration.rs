// End-to-end invocation through the public API: router -> backend client ->
// tool executor, with a scripted HTTP transport instead of the network.

use async_trait::async_trait;
use curatebench::llm::{HttpReply, HttpTransport, Sleeper};
use curatebench::tools::builtin;
use curatebench::{
    BackendError, BackendKind, BedrockClient, BenchConfig, InvocationRequest, ModelRouter,
    OpenRouterClient, ToolExecutor,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays canned replies in order and records every request
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<HttpReply>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<HttpReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        _headers: Vec<(String, String)>,
        body: &Value,
    ) -> Result<HttpReply, BackendError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Transport("script exhausted".to_string()))
    }
}

#[derive(Default)]
struct NoSleep {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
}

fn chat_reply(message: Value) -> HttpReply {
    HttpReply::new(
        200,
        json!({
            "choices": [{"message": message}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        })
        .to_string(),
    )
}

#[tokio::test]
async fn test_openrouter_fuzzy_match_tool_flow() {
    init_tracing();

    let transport = ScriptedTransport::new(vec![
        HttpReply::new(429, r#"{"error":{"message":"Rate limit exceeded"}}"#),
        chat_reply(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_fz",
                "type": "function",
                "function": {
                    "name": "fuzzy_match",
                    "arguments": "{\"value\":\"hepatic tissue\",\"candidates\":[\"liver\",\"hepatic tissue\",\"heart\"]}"
                }
            }]
        })),
        chat_reply(json!({"role": "assistant", "content": "hepatic tissue"})),
    ]);
    let sleeper = Arc::new(NoSleep::default());

    let client = OpenRouterClient::new("sk-test", transport.clone())
        .with_sleeper(sleeper.clone())
        .with_backoff_base(Duration::from_millis(5));
    let router = ModelRouter::new(BenchConfig::default())
        .with_backend(BackendKind::OpenRouter, Arc::new(client));

    let registry = Arc::new(builtin::default_registry().unwrap());
    let mut executor = ToolExecutor::new(Arc::clone(&registry));
    let request = InvocationRequest::new("openai/gpt-4o", "Normalize 'hepatic tissue'")
        .with_tools(registry.specs());

    let result = router.invoke(&request, Some(&mut executor)).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.content, "hepatic tissue");
    assert_eq!(result.attempt, 2);
    assert_eq!(result.usage.total_tokens, 12);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_execution_history.len(), 1);
    assert_eq!(*sleeper.delays.lock().unwrap(), vec![Duration::from_millis(5)]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].0.ends_with("/chat/completions"));

    let tool_message = &requests[2].1["messages"][2];
    assert_eq!(tool_message["role"], "tool");
    let output: Value = serde_json::from_str(tool_message["content"].as_str().unwrap()).unwrap();
    assert_eq!(output["found"], true);
    assert_eq!(output["best_match"]["candidate"], "hepatic tissue");
}

#[tokio::test]
async fn test_bedrock_plain_invocation_and_serialized_result() {
    init_tracing();

    let transport = ScriptedTransport::new(vec![HttpReply::new(
        200,
        json!({
            "content": [{"type": "text", "text": "LIVER"}],
            "usage": {"input_tokens": 8, "output_tokens": 1}
        })
        .to_string(),
    )]);

    let client = BedrockClient::new("token", "https://bedrock.test", transport.clone());
    let router = ModelRouter::new(BenchConfig::default())
        .with_backend(BackendKind::Bedrock, Arc::new(client));

    let request = InvocationRequest::new("us.anthropic.claude-3-5-haiku-20241022-v1:0", "liver")
        .with_max_retries(1);
    let result = router.invoke(&request, None).await;

    assert!(result.success);
    assert_eq!(result.content, "LIVER");
    assert_eq!(result.attempt, 1);

    let requests = transport.requests();
    assert_eq!(
        requests[0].0,
        "https://bedrock.test/model/us.anthropic.claude-3-5-haiku-20241022-v1:0/invoke"
    );

    let serialized = serde_json::to_value(&result).unwrap();
    assert_eq!(serialized["usage"]["total_tokens"], 9);
    assert!(serialized.get("error").is_none());
    assert!(serialized.get("error_code").is_none());
}

#[tokio::test]
async fn test_transport_failure_surfaces_in_result() {
    init_tracing();

    let transport = ScriptedTransport::new(Vec::new());
    let client = OpenRouterClient::new("sk-test", transport);
    let router = ModelRouter::new(BenchConfig::default())
        .with_backend(BackendKind::OpenRouter, Arc::new(client));

    let result = router
        .invoke(&InvocationRequest::new("openai/gpt-4o", "p"), None)
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code.as_deref(), Some("TRANSPORT_ERROR"));
    assert_eq!(result.attempt, 1);
}
