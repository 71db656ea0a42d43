// Library interface for curatebench
// This exposes the model-invocation core so it can be:
// - Driven by benchmark runners and scripts
// - Exercised from integration tests with scripted transports
// - Embedded in other evaluation tooling

pub mod config;
pub mod error;
pub mod llm;
pub mod tool_executor;
pub mod tools;
pub mod version;

// Re-export commonly used types for convenience
pub use config::BenchConfig;
pub use error::{BackendError, BenchError, Result};
pub use llm::{
    Backend, BackendKind, BedrockClient, InvocationRequest, InvocationResult, ModelRouter,
    OpenRouterClient, Usage,
};
pub use tool_executor::ToolExecutor;
pub use tools::{ToolCallRequest, ToolCallResult, ToolRegistry, ToolSpec};
