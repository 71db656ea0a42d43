// Tool registry: unique names mapped to a spec and its handler
//
// There is no global registry. Whoever builds a ToolExecutor owns the
// registry it executes against; wrap it in an Arc to share one registry
// between the executors of concurrent invocations.

use super::spec::{ParameterSchema, ToolSpec};
use super::{ToolArgs, ToolHandler};
use crate::error::{BenchError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered tool: immutable spec plus its executable handler
#[derive(Clone)]
pub struct RegisteredTool {
    pub spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    /// Run the handler with the given arguments
    pub fn invoke(&self, args: &ToolArgs) -> anyhow::Result<Value> {
        self.handler.call(args)
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its spec name
    ///
    /// # Errors
    /// - `BenchError::DuplicateTool` if the name is already registered
    pub fn register<H>(&mut self, spec: ToolSpec, handler: H) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        if self.tools.contains_key(&spec.name) {
            return Err(BenchError::DuplicateTool(spec.name));
        }

        tracing::debug!("Registered tool '{}'", spec.name);
        self.tools.insert(
            spec.name.clone(),
            RegisteredTool {
                spec,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Declared parameter schema, verbatim
    pub fn get_schema(&self, name: &str) -> Option<&ParameterSchema> {
        self.tools.get(name).map(|tool| &tool.spec.parameters)
    }

    /// All registered specs, sorted by name for stable request payloads
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::spec::PropertySchema;
    use serde_json::json;

    fn echo_spec(name: &str) -> ToolSpec {
        ToolSpec::new(
            name,
            "Echo the input",
            ParameterSchema::new().required_property("text", PropertySchema::string("Text to echo")),
        )
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry
            .register(echo_spec("echo"), |args: &ToolArgs| -> anyhow::Result<Value> {
                Ok(args.get("text").cloned().unwrap_or(Value::Null))
            })
            .unwrap();

        let tool = registry.get("echo").expect("tool should be registered");
        assert_eq!(tool.spec.name, "echo");

        let mut args = ToolArgs::new();
        args.insert("text".to_string(), json!("hi"));
        assert_eq!(tool.invoke(&args).unwrap(), json!("hi"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(echo_spec("echo"), |_: &ToolArgs| -> anyhow::Result<Value> { Ok(json!(1)) })
            .unwrap();

        let err = registry
            .register(echo_spec("echo"), |_: &ToolArgs| -> anyhow::Result<Value> { Ok(json!(2)) })
            .unwrap_err();

        assert!(matches!(err, BenchError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_tool_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("nope").is_none());
        assert!(registry.get_schema("nope").is_none());
    }

    #[test]
    fn test_get_schema_is_verbatim() {
        let mut registry = ToolRegistry::new();
        let spec = echo_spec("echo");
        let expected = spec.parameters.clone();
        registry.register(spec, |_: &ToolArgs| -> anyhow::Result<Value> { Ok(Value::Null) }).unwrap();

        assert_eq!(registry.get_schema("echo"), Some(&expected));
    }

    #[test]
    fn test_specs_sorted() {
        let mut registry = ToolRegistry::new();
        for name in ["zooma", "alpha", "mid"] {
            registry.register(echo_spec(name), |_: &ToolArgs| -> anyhow::Result<Value> { Ok(Value::Null) }).unwrap();
        }

        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zooma"]);
    }
}
