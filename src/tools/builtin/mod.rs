// Offline curation tools shipped with the benchmark
//
// These run entirely in-process, so tool-use experiments can be reproduced
// without network access beyond the model endpoint itself.

pub mod data_pattern_analyzer;
pub mod fuzzy_match;
pub mod regex_tester;
pub mod schema_validator;

use super::{ToolArgs, ToolRegistry};
use crate::error::Result;
use anyhow::Context;
use serde_json::Value;
use std::fs;

/// Registry holding every built-in tool
pub fn default_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(regex_tester::spec(), regex_tester::execute)?;
    registry.register(fuzzy_match::spec(), fuzzy_match::execute)?;
    registry.register(data_pattern_analyzer::spec(), data_pattern_analyzer::execute)?;
    registry.register(schema_validator::spec(), schema_validator::execute)?;
    Ok(registry)
}

fn required_str<'a>(args: &'a ToolArgs, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing required string argument '{}'", key))
}

fn string_list(args: &ToolArgs, key: &str) -> anyhow::Result<Option<Vec<String>>> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }

    let items = value
        .as_array()
        .with_context(|| format!("argument '{}' must be a list of strings", key))?;

    Ok(Some(
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    ))
}

/// JSON schema given inline (`schema`) or as a file (`schema_path`)
///
/// Returns the schema and a label naming where it came from. None when
/// neither argument is present.
fn load_schema(args: &ToolArgs) -> anyhow::Result<Option<(Value, String)>> {
    if let Some(schema) = args.get("schema").filter(|v| !v.is_null()) {
        anyhow::ensure!(schema.is_object(), "argument 'schema' must be a JSON object");
        return Ok(Some((schema.clone(), "inline".to_string())));
    }

    let Some(path) = args.get("schema_path").and_then(Value::as_str) else {
        return Ok(None);
    };
    let raw = fs::read_to_string(path).with_context(|| format!("Schema file not found: {}", path))?;
    let schema: Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in schema file: {}", path))?;
    Ok(Some((schema, path.to_string())))
}
