// regex_tester: run a pattern against sample strings and report matches
//
// When the pattern has capture groups, the first group is reported per match
// (an unmatched group reports ""), otherwise the whole match. An invalid
// pattern is reported in the output's `error` field so the model can fix it
// and try again.

use super::{required_str, string_list};
use crate::tools::{ParameterSchema, PropertySchema, ToolArgs, ToolSpec};
use regex::Regex;
use serde_json::{json, Map, Value};

pub const NAME: &str = "regex_tester";

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Test a regular expression against a list of strings. Returns the matches \
         for each string and, when expected matches are given, whether each one is correct.",
        ParameterSchema::new()
            .required_property("regex_pattern", PropertySchema::string("The regex pattern to test"))
            .required_property(
                "test_strings",
                PropertySchema::array(
                    "Strings to test the pattern against",
                    PropertySchema::string(""),
                ),
            )
            .property(
                "expected_matches",
                PropertySchema::array(
                    "Optional expected match for each test string, in order",
                    PropertySchema::string(""),
                ),
            ),
    )
}

pub fn execute(args: &ToolArgs) -> anyhow::Result<Value> {
    let pattern = required_str(args, "regex_pattern")?;
    let test_strings = string_list(args, "test_strings")?.unwrap_or_default();
    let expected = args
        .get("expected_matches")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty());

    let mut output = Map::new();
    output.insert("regex_pattern".to_string(), json!(pattern));
    output.insert("total_tests".to_string(), json!(test_strings.len()));

    let compiled = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            output.insert("test_results".to_string(), json!([]));
            output.insert("all_passed".to_string(), json!(false));
            output.insert("error".to_string(), json!(format!("Invalid regex pattern: {}", e)));
            return Ok(Value::Object(output));
        }
    };

    let mut all_passed = true;
    let mut matched_count = 0usize;
    let mut correct_count = 0usize;
    let mut test_results = Vec::with_capacity(test_strings.len());

    for (i, test_string) in test_strings.iter().enumerate() {
        let matches = find_all(&compiled, test_string);
        if !matches.is_empty() {
            matched_count += 1;
        }

        let mut result = json!({
            "test_string": test_string,
            "matches": matches,
            "matched": !matches.is_empty(),
            "match_count": matches.len(),
        });

        if let Some(expected_value) = expected.and_then(|list| list.get(i)) {
            let correct = matches_expected(&matches, expected_value);
            if correct {
                correct_count += 1;
            } else {
                all_passed = false;
            }
            result["expected"] = expected_value.clone();
            result["correct"] = json!(correct);
        }

        test_results.push(result);
    }

    let total = test_strings.len();
    let rate = |count: usize| if total == 0 { 0.0 } else { count as f64 / total as f64 };

    output.insert("test_results".to_string(), Value::Array(test_results));
    output.insert("all_passed".to_string(), json!(all_passed));
    output.insert("matched_count".to_string(), json!(matched_count));
    output.insert("match_rate".to_string(), json!(rate(matched_count)));
    if expected.is_some() {
        output.insert("correct_count".to_string(), json!(correct_count));
        output.insert("accuracy".to_string(), json!(rate(correct_count)));
    }

    Ok(Value::Object(output))
}

fn find_all(re: &Regex, haystack: &str) -> Vec<String> {
    let has_groups = re.captures_len() > 1;
    re.captures_iter(haystack)
        .map(|caps| {
            if has_groups {
                caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default()
            } else {
                caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default()
            }
        })
        .collect()
}

fn matches_expected(matches: &[String], expected: &Value) -> bool {
    match expected {
        Value::String(s) => matches.len() == 1 && &matches[0] == s,
        Value::Array(items) => {
            items.len() == matches.len()
                && items
                    .iter()
                    .zip(matches)
                    .all(|(e, m)| e.as_str() == Some(m.as_str()))
        }
        _ => false,
    }
}
