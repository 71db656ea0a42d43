// fuzzy_match: rank controlled-vocabulary candidates by similarity to a value
//
// Similarity is the Ratcliff/Obershelp ratio 2*M/T on lowercased text, where
// M counts characters in recursively found longest common blocks and T is
// the combined length of both strings.
//
// Candidates come from the `candidates` list or, when it is absent, from the
// `enum` values of a JSON schema's properties (one field or all of them).

use super::{load_schema, required_str, string_list};
use crate::tools::{ParameterSchema, PropertySchema, ToolArgs, ToolSpec};
use serde_json::{json, Map, Value};

pub const NAME: &str = "fuzzy_match";

const DEFAULT_THRESHOLD: f64 = 0.6;
const DEFAULT_MAX_RESULTS: usize = 5;

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Find the closest matches for a value in a list of candidate terms, such as the \
         permitted values of a controlled vocabulary. Candidates can also be taken from the \
         enum values of a JSON schema. Returns matches sorted by similarity.",
        ParameterSchema::new()
            .required_property("value", PropertySchema::string("The value to match"))
            .property(
                "candidates",
                PropertySchema::array("Candidate strings to match against", PropertySchema::string("")),
            )
            .property(
                "schema",
                PropertySchema::object("JSON schema whose enum values are the candidates"),
            )
            .property(
                "schema_path",
                PropertySchema::string("Path to a JSON schema file, used when no schema is given"),
            )
            .property(
                "field_name",
                PropertySchema::string("Schema property whose enum to match (default: all enum fields)"),
            )
            .property(
                "threshold",
                PropertySchema::number("Minimum similarity between 0.0 and 1.0 (default 0.6)"),
            )
            .property(
                "max_results",
                PropertySchema::integer("Maximum number of matches to return (default 5)"),
            ),
    )
}

pub fn execute(args: &ToolArgs) -> anyhow::Result<Value> {
    let value = required_str(args, "value")?;
    let threshold = args
        .get("threshold")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_THRESHOLD);
    let max_results = args
        .get("max_results")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_RESULTS);

    if let Some(candidates) = string_list(args, "candidates")? {
        return Ok(rank(value, &candidates, threshold, max_results));
    }

    let (schema, source) = match load_schema(args) {
        Ok(Some(loaded)) => loaded,
        Ok(None) => return Ok(rank(value, &[], threshold, max_results)),
        Err(e) => return Ok(json!({"value": value, "error": e.to_string()})),
    };

    let field_name = args.get("field_name").and_then(Value::as_str);
    let (candidates, search_field) = schema_candidates(&schema, field_name);

    let mut output = rank(value, &candidates, threshold, max_results);
    output["schema_source"] = json!(source);
    output["field_name"] = json!(search_field);
    Ok(output)
}

/// Enum values of one schema property, or of every property deduplicated
///
/// Falls back to all fields when `field_name` has no enum. Returns the
/// candidates and the field they were taken from (`all_fields` for the union).
fn schema_candidates(schema: &Value, field_name: Option<&str>) -> (Vec<String>, String) {
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let enum_strings = |definition: &Value| -> Option<Vec<String>> {
        let values = definition.get("enum")?.as_array()?;
        Some(
            values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )
    };

    if let Some(field) = field_name {
        if let Some(values) = properties.get(field).and_then(enum_strings) {
            return (values, field.to_string());
        }
    }

    let mut all = Vec::new();
    for definition in properties.values() {
        for candidate in enum_strings(definition).unwrap_or_default() {
            if !all.contains(&candidate) {
                all.push(candidate);
            }
        }
    }
    (all, "all_fields".to_string())
}

fn rank(value: &str, candidates: &[String], threshold: f64, max_results: usize) -> Value {
    if value.is_empty() || candidates.is_empty() {
        return json!({
            "value": value,
            "matches": [],
            "found": false,
            "message": "Value or candidates list is empty",
        });
    }

    let mut scored: Vec<(f64, &String)> = candidates
        .iter()
        .map(|candidate| (similarity(value, candidate), candidate))
        .filter(|(score, _)| *score >= threshold)
        .collect();

    // Stable sort keeps candidate order among equal scores
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(max_results);

    let matches: Vec<Value> = scored
        .iter()
        .map(|(score, candidate)| {
            json!({
                "candidate": candidate,
                "similarity": round4(*score),
                "exact_match": *score == 1.0,
            })
        })
        .collect();

    json!({
        "value": value,
        "threshold": threshold,
        "found": !matches.is_empty(),
        "best_match": matches.first().cloned().unwrap_or(Value::Null),
        "matches": matches,
        "total_candidates": candidates.len(),
    })
}

/// Case-insensitive similarity ratio in [0.0, 1.0]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Start in `a`, start in `b`, and length of the earliest longest common run
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = curr[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
