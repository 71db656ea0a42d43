// Tools the model can call during an invocation
//
// Module Organization:
// - spec.rs: ToolSpec and its parameter schema
// - registry.rs: name -> (spec, handler) lookup owned by the caller
// - call.rs: tool-call requests/results and execution records
// - builtin/: offline curation tools shipped with the benchmark
//
// Execution itself lives in crate::tool_executor.

pub mod builtin;
pub mod call;
pub mod registry;
pub mod spec;

pub use call::{ExecutionRecord, ToolCallRequest, ToolCallResult, ToolStatus};
pub use registry::{RegisteredTool, ToolRegistry};
pub use spec::{ParameterSchema, PropertySchema, ToolSpec};

use serde_json::{Map, Value};

/// Named arguments passed to a tool
pub type ToolArgs = Map<String, Value>;

/// Executable body of a tool
///
/// Tools are pure functions from named arguments to a scalar, mapping, or
/// sequence. Errors are converted to structured failure results by the
/// executor and never reach the model client.
pub trait ToolHandler: Send + Sync {
    fn call(&self, args: &ToolArgs) -> anyhow::Result<Value>;
}

impl<F> ToolHandler for F
where
    F: Fn(&ToolArgs) -> anyhow::Result<Value> + Send + Sync,
{
    fn call(&self, args: &ToolArgs) -> anyhow::Result<Value> {
        self(args)
    }
}
