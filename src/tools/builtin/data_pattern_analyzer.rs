// data_pattern_analyzer: infer the type and format of a column of values
//
// Each value is scored as one of boolean, integer, number, date or datetime
// (first match wins, in that order), and may additionally score as email or
// url. A value that scores nothing counts as string. The inferred type is the
// highest score; ties go to the earlier type in TYPE_ORDER.

use super::{required_str, string_list};
use crate::tools::{ParameterSchema, PropertySchema, ToolArgs, ToolSpec};
use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{json, Map, Value};

pub const NAME: &str = "data_pattern_analyzer";

const TYPE_ORDER: [&str; 8] = [
    "string", "integer", "number", "boolean", "date", "datetime", "email", "url",
];

const TRUE_WORDS: [&str; 4] = ["true", "yes", "1", "y"];
const FALSE_WORDS: [&str; 4] = ["false", "no", "0", "n"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const SAMPLE_SIZE: usize = 5;

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Analyze a list of values to infer their data type (string, integer, number, boolean, \
         date, datetime, email, url) and any date formats they use.",
        ParameterSchema::new()
            .required_property(
                "values",
                PropertySchema::array("Values to analyze", PropertySchema::string("")),
            )
            .property(
                "analyze_format",
                PropertySchema::boolean("Detect dates, emails and URLs (default true)"),
            )
            .property(
                "column_name",
                PropertySchema::string("Optional column name echoed in the result"),
            ),
    )
}

struct Patterns {
    integer: Regex,
    number: Regex,
    email: Regex,
    url: Regex,
}

impl Patterns {
    fn compile() -> anyhow::Result<Self> {
        Ok(Self {
            integer: Regex::new(r"^-?\d+$").context("integer pattern")?,
            number: Regex::new(r"^-?\d+\.\d+$").context("number pattern")?,
            email: Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .context("email pattern")?,
            url: Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").context("url pattern")?,
        })
    }
}

pub fn execute(args: &ToolArgs) -> anyhow::Result<Value> {
    let values = string_list(args, "values")?.unwrap_or_default();
    let analyze_format = args
        .get("analyze_format")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let column_name = match args.get("column_name") {
        Some(v) if !v.is_null() => Some(required_str(args, "column_name")?),
        _ => None,
    };

    let mut output = if values.is_empty() {
        json!({
            "error": "Empty values list",
            "inferred_type": "unknown",
        })
    } else {
        analyze(&values, analyze_format)?
    };

    if let Some(name) = column_name {
        output["column_name"] = json!(name);
    }
    Ok(output)
}

fn analyze(values: &[String], analyze_format: bool) -> anyhow::Result<Value> {
    let patterns = Patterns::compile()?;
    let mut scores = [0usize; TYPE_ORDER.len()];
    let mut formats: Vec<&'static str> = Vec::new();

    for value in values {
        let value = value.trim();
        let lowered = value.to_lowercase();
        let mut scored = false;

        let mut bump = |kind: &str| {
            if let Some(i) = TYPE_ORDER.iter().position(|t| *t == kind) {
                scores[i] += 1;
            }
            scored = true;
        };

        if TRUE_WORDS.contains(&lowered.as_str()) || FALSE_WORDS.contains(&lowered.as_str()) {
            bump("boolean");
        } else if patterns.integer.is_match(value) {
            bump("integer");
        } else if patterns.number.is_match(value) {
            bump("number");
        } else if analyze_format {
            if let Some((kind, format)) = date_format(value) {
                bump(kind);
                if !formats.contains(&format) {
                    formats.push(format);
                }
            }
        }

        if analyze_format && patterns.email.is_match(value) {
            bump("email");
        }
        if analyze_format && patterns.url.is_match(value) {
            bump("url");
        }

        if !scored {
            scores[0] += 1;
        }
    }

    // Earliest maximum, so ties resolve in TYPE_ORDER
    let (best, best_score) = scores
        .iter()
        .enumerate()
        .fold((0, 0), |acc, (i, &s)| if s > acc.1 { (i, s) } else { acc });

    let type_scores: Map<String, Value> = TYPE_ORDER
        .iter()
        .zip(scores.iter())
        .filter(|(_, score)| **score > 0)
        .map(|(kind, &score)| (kind.to_string(), json!(score)))
        .collect();

    let confidence = best_score as f64 / values.len() as f64;

    Ok(json!({
        "values_analyzed": values.len(),
        "inferred_type": TYPE_ORDER[best],
        "confidence": (confidence * 10_000.0).round() / 10_000.0,
        "type_scores": type_scores,
        "detected_formats": if formats.is_empty() { Value::Null } else { json!(formats) },
        "sample_values": &values[..values.len().min(SAMPLE_SIZE)],
    }))
}

/// First date or datetime format that parses the whole value
fn date_format(value: &str) -> Option<(&'static str, &'static str)> {
    if let Some(format) = DATE_FORMATS
        .iter()
        .find(|f| NaiveDate::parse_from_str(value, f).is_ok())
    {
        return Some(("date", *format));
    }
    DATETIME_FORMATS
        .iter()
        .find(|f| NaiveDateTime::parse_from_str(value, f).is_ok())
        .map(|format| ("datetime", *format))
}
