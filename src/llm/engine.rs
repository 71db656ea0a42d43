// Invocation state machine shared by every backend
//
// Backends only know their wire format (WireProtocol::send_turn). This module
// owns the control flow around it:
//
//   Sending ──(tool calls, tools offered)──> AwaitingToolResults ──> Sending
//      │                                              │
//      │ (no tool calls)                              │ (iteration ceiling)
//      v                                              v
//   Terminal                                        Failed
//
// and wraps each attempt in the retry policy. Conversation, iteration count,
// and accumulated tool calls live in a ToolSession that outlives a single
// attempt: a throttled request is re-sent with the same conversation, and
// tools that already ran are not executed again.

use super::conversation::{initial_conversation, ConversationMessage};
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::transport::{HttpTransport, ReqwestTransport};
use super::types::{InvocationRequest, InvocationResult, Usage};
use crate::config::BenchConfig;
use crate::error::{self, BackendError};
use crate::tool_executor::ToolExecutor;
use crate::tools::ToolCallRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling on tool-use iterations within one invocation
pub const MAX_TOOL_ITERATIONS: usize = 10;

pub const MAX_RETRIES_EXCEEDED: &str = "Max retries exceeded";

/// One normalized model reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub content: String,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Raw assistant payload, echoed back verbatim when tools were requested
    pub assistant_payload: Value,
}

/// Wire format of one backend
#[async_trait]
pub trait WireProtocol: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Send the conversation and normalize the reply
    ///
    /// `offer_tools` is false on the plain path; tool definitions from the
    /// request must then be left out of the payload.
    async fn send_turn(
        &self,
        request: &InvocationRequest,
        conversation: &[ConversationMessage],
        offer_tools: bool,
    ) -> Result<ModelTurn, BackendError>;
}

/// Pieces every backend client needs besides its wire format
#[derive(Clone)]
pub struct ClientRuntime {
    pub transport: Arc<dyn HttpTransport>,
    pub sleeper: Arc<dyn Sleeper>,
    /// Used when a request carries no system instructions
    pub default_system_instructions: Option<String>,
    pub backoff_base: Duration,
}

impl ClientRuntime {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            default_system_instructions: None,
            backoff_base: Duration::from_secs(1),
        }
    }

    /// reqwest transport with the configured timeout, real sleeps
    pub fn from_config(config: &BenchConfig) -> error::Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self {
            transport: Arc::new(transport),
            sleeper: Arc::new(TokioSleeper),
            default_system_instructions: config.default_system_instructions.clone(),
            backoff_base: config.backoff_base,
        })
    }

    /// Build the opening conversation and run the invocation
    pub async fn invoke<P>(
        &self,
        protocol: &P,
        request: &InvocationRequest,
        executor: Option<&mut ToolExecutor>,
    ) -> InvocationResult
    where
        P: WireProtocol + ?Sized,
    {
        let system = request
            .system_instructions
            .as_deref()
            .or(self.default_system_instructions.as_deref());
        let conversation = initial_conversation(system, &request.prompt);
        let policy = RetryPolicy::new(request.max_retries, self.backoff_base);

        run_invocation(
            protocol,
            self.sleeper.as_ref(),
            policy,
            request,
            conversation,
            executor,
        )
        .await
    }
}

enum State {
    Sending,
    AwaitingToolResults(ModelTurn),
    Terminal(ModelTurn),
    Failed(BackendError),
}

struct ToolSession {
    conversation: Vec<ConversationMessage>,
    iterations: usize,
    tool_calls: Vec<ToolCallRequest>,
}

/// Run a full invocation: retries around a (possibly multi-turn) exchange
///
/// Never fails: every outcome is folded into the returned InvocationResult.
pub async fn run_invocation<P>(
    protocol: &P,
    sleeper: &dyn Sleeper,
    policy: RetryPolicy,
    request: &InvocationRequest,
    conversation: Vec<ConversationMessage>,
    mut executor: Option<&mut ToolExecutor>,
) -> InvocationResult
where
    P: WireProtocol + ?Sized,
{
    let tool_mode = !request.tools.is_empty() && executor.is_some();
    let mut session = ToolSession {
        conversation,
        iterations: 0,
        tool_calls: Vec::new(),
    };

    let mut attempt_index: u32 = 0;
    let result = loop {
        let attempt = attempt_index + 1;

        match run_attempt(protocol, request, &mut session, executor.as_deref_mut(), tool_mode).await
        {
            Ok(turn) => {
                tracing::info!(
                    "{} model {} answered on attempt {} ({} tokens)",
                    protocol.name(),
                    request.model_id,
                    attempt,
                    turn.usage.total_tokens
                );
                break InvocationResult::succeeded(&request.model_id, turn.content, turn.usage, attempt);
            }
            Err(e) if e.is_retryable() && policy.has_next(attempt_index) => {
                let delay = policy.delay_for(attempt_index);
                tracing::warn!(
                    "{} throttled model {} on attempt {}: {} (retrying in {:?})",
                    protocol.name(),
                    request.model_id,
                    attempt,
                    e,
                    delay
                );
                sleeper.sleep(delay).await;
                attempt_index += 1;
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    "{} model {}: giving up after {} attempts",
                    protocol.name(),
                    request.model_id,
                    attempt
                );
                break InvocationResult::failure(&request.model_id, MAX_RETRIES_EXCEEDED, None, attempt);
            }
            Err(e) => {
                tracing::error!(
                    "{} model {} failed on attempt {}: {}",
                    protocol.name(),
                    request.model_id,
                    attempt,
                    e
                );
                break InvocationResult::failed(&request.model_id, &e, attempt);
            }
        }
    };

    let history = match (&executor, tool_mode) {
        (Some(executor), true) => executor.history(),
        _ => Vec::new(),
    };
    result.with_tool_activity(session.tool_calls, history)
}

/// One attempt: send, execute requested tools, repeat until terminal
async fn run_attempt<P>(
    protocol: &P,
    request: &InvocationRequest,
    session: &mut ToolSession,
    mut executor: Option<&mut ToolExecutor>,
    tool_mode: bool,
) -> Result<ModelTurn, BackendError>
where
    P: WireProtocol + ?Sized,
{
    let mut state = State::Sending;

    loop {
        state = match state {
            State::Sending => {
                match protocol
                    .send_turn(request, &session.conversation, tool_mode)
                    .await
                {
                    Ok(turn) if tool_mode && !turn.tool_calls.is_empty() => {
                        State::AwaitingToolResults(turn)
                    }
                    Ok(turn) => State::Terminal(turn),
                    Err(e) => State::Failed(e),
                }
            }
            State::AwaitingToolResults(turn) => match executor.as_deref_mut() {
                Some(executor) => {
                    tracing::debug!(
                        "Model {} requested {} tool call(s) (iteration {})",
                        request.model_id,
                        turn.tool_calls.len(),
                        session.iterations + 1
                    );

                    let results = executor.execute(&turn.tool_calls);
                    session
                        .conversation
                        .push(ConversationMessage::assistant_tool_calls(turn.assistant_payload));
                    session
                        .conversation
                        .extend(results.iter().map(ConversationMessage::tool_result));
                    session.tool_calls.extend(turn.tool_calls);
                    session.iterations += 1;

                    if session.iterations >= MAX_TOOL_ITERATIONS {
                        State::Failed(BackendError::MaxToolIterations(MAX_TOOL_ITERATIONS))
                    } else {
                        State::Sending
                    }
                }
                None => State::Terminal(turn),
            },
            State::Terminal(turn) => return Ok(turn),
            State::Failed(e) => return Err(e),
        };
    }
}
