// Tool execution for model-requested tool calls
//
// The executor is the boundary between the model loop and tool code: every
// request produces exactly one result, in order, and nothing a tool does
// (error or panic) propagates past it. Each execution is appended to an
// audit history that backends copy into the InvocationResult.
//
// One executor belongs to one invocation. `execute` takes `&mut self`, so
// two invocations cannot share an executor without external serialization.

use crate::tools::{
    ExecutionRecord, ToolArgs, ToolCallRequest, ToolCallResult, ToolRegistry, ToolStatus,
};
use chrono::Utc;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

const UNKNOWN_CALL_ID: &str = "unknown";

#[derive(Debug)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    history: Vec<ExecutionRecord>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            history: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a batch of tool calls
    ///
    /// Returns one result per request in request order. A failing request
    /// never prevents the ones after it from running.
    pub fn execute(&mut self, requests: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        requests.iter().map(|request| self.execute_one(request)).collect()
    }

    /// Execute a single tool call
    pub fn execute_one(&mut self, request: &ToolCallRequest) -> ToolCallResult {
        let call_id = if request.call_id.is_empty() {
            UNKNOWN_CALL_ID.to_string()
        } else {
            request.call_id.clone()
        };

        let tool_name = match request.tool_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                tracing::warn!("Tool call {} has no tool name", call_id);
                return ToolCallResult::error(call_id, "Tool name missing from tool call");
            }
        };

        let registry = Arc::clone(&self.registry);
        let Some(tool) = registry.get(tool_name) else {
            let message = format!("Tool '{}' not found in registry", tool_name);
            tracing::warn!("{}", message);
            self.record(tool_name, &call_id, None, Err(message.clone()));
            return ToolCallResult::error(call_id, message);
        };

        tracing::debug!("Executing tool '{}' (call {})", tool_name, call_id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| tool.invoke(&request.arguments)));

        let outcome = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        };

        match outcome {
            Ok(value) => {
                let text = render_tool_output(&value);
                self.record(tool_name, &call_id, Some(&request.arguments), Ok(value));
                ToolCallResult::success(call_id, text)
            }
            Err(cause) => {
                let message = format!("Error executing tool '{}': {}", tool_name, cause);
                tracing::warn!("{}", message);
                self.record(
                    tool_name,
                    &call_id,
                    Some(&request.arguments),
                    Err(message.clone()),
                );
                ToolCallResult::error(call_id, message)
            }
        }
    }

    /// Snapshot of the execution history
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.clone()
    }

    /// Forget all recorded executions
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn record(
        &mut self,
        tool_name: &str,
        call_id: &str,
        parameters: Option<&ToolArgs>,
        outcome: std::result::Result<Value, String>,
    ) {
        let (status, result, error) = match outcome {
            Ok(value) => (ToolStatus::Success, Some(value), None),
            Err(message) => (ToolStatus::Error, None, Some(message)),
        };

        self.history.push(ExecutionRecord {
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            parameters: parameters.cloned(),
            status,
            result,
            error,
            executed_at: Utc::now(),
        });
    }
}

/// Text sent back to the model for a tool's output
///
/// Mappings and sequences become indented JSON; strings are sent as-is;
/// other scalars use their JSON text.
pub fn render_tool_output(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
