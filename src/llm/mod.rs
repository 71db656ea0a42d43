// Model backends and the invocation loop they share
//
// Module Organization:
// - types.rs: InvocationRequest / InvocationResult / Usage
// - conversation.rs: backend-neutral conversation messages
// - transport.rs: HTTP seam (reqwest in production, mocks in tests)
// - retry.rs: backoff policy and injectable sleeper
// - engine.rs: retry + bounded tool-loop state machine
// - openrouter.rs / bedrock.rs: wire formats
// - router.rs: model id -> backend dispatch

pub mod bedrock;
pub mod conversation;
pub mod engine;
pub mod openrouter;
pub mod retry;
pub mod router;
pub mod transport;
pub mod types;

pub use bedrock::BedrockClient;
pub use engine::{MAX_RETRIES_EXCEEDED, MAX_TOOL_ITERATIONS};
pub use openrouter::OpenRouterClient;
pub use retry::{Sleeper, TokioSleeper};
pub use router::{BackendKind, ModelRouter};
pub use transport::{HttpReply, HttpTransport, ReqwestTransport};
pub use types::*;

use crate::tool_executor::ToolExecutor;
use async_trait::async_trait;

/// A model backend every benchmark invocation goes through
///
/// Implementations never fail: transport errors, HTTP errors, throttling
/// exhaustion and the tool-iteration ceiling all come back as an
/// InvocationResult with `success == false`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name for logging/debugging
    fn name(&self) -> &str;

    /// Run one prompt to completion
    ///
    /// Tool calling is enabled only when `request.tools` is non-empty and an
    /// executor is supplied.
    async fn invoke(
        &self,
        request: &InvocationRequest,
        executor: Option<&mut ToolExecutor>,
    ) -> InvocationResult;
}
