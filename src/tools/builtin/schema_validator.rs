// schema_validator: check a record, or a single field of one, against a JSON schema
//
// The schema is given inline or as a file path. Every violation is reported
// with its JSON-pointer location in the data and the schema keyword that
// failed. Problems with the schema itself go in the output's `error` field.

use super::load_schema;
use crate::tools::{ParameterSchema, PropertySchema, ToolArgs, ToolSpec};
use jsonschema::JSONSchema;
use serde_json::{json, Value};

pub const NAME: &str = "schema_validator";

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Validate data against a JSON schema. Pass `data` to validate a whole record, or \
         `field_name` and `field_value` to validate one field against its property schema.",
        ParameterSchema::new()
            .property("data", PropertySchema::object("The record to validate"))
            .property("schema", PropertySchema::object("The JSON schema"))
            .property(
                "schema_path",
                PropertySchema::string("Path to a JSON schema file, used when no schema is given"),
            )
            .property(
                "field_name",
                PropertySchema::string("Validate only this property of the schema"),
            )
            .property(
                "field_value",
                PropertySchema::string("Value to validate when field_name is given"),
            )
            .property(
                "strict",
                PropertySchema::boolean("Include the failing schema location for each error"),
            ),
    )
}

pub fn execute(args: &ToolArgs) -> anyhow::Result<Value> {
    let strict = args.get("strict").and_then(Value::as_bool).unwrap_or(false);

    let (schema, source) = match load_schema(args) {
        Ok(Some(loaded)) => loaded,
        Ok(None) => return Ok(failure("Either 'schema' or 'schema_path' is required")),
        Err(e) => return Ok(failure(e.to_string())),
    };

    if let Some(field_name) = args.get("field_name").and_then(Value::as_str) {
        let field_value = args.get("field_value").cloned().unwrap_or(Value::Null);
        return Ok(validate_field(&schema, field_name, field_value));
    }

    let Some(data) = args.get("data") else {
        return Ok(failure("Either 'data' or 'field_name' is required"));
    };

    let errors = match violations(&schema, data, strict) {
        Ok(errors) => errors,
        Err(message) => return Ok(failure(message)),
    };

    let mut output = json!({
        "valid": errors.is_empty(),
        "data": data,
        "schema_source": source,
    });
    if let Some(first) = errors.first() {
        output["error_message"] = first["message"].clone();
    }
    output["errors"] = json!(errors);
    Ok(output)
}

fn validate_field(schema: &Value, field_name: &str, field_value: Value) -> Value {
    let Some(property) = schema.get("properties").and_then(|p| p.get(field_name)) else {
        return json!({
            "valid": false,
            "field_name": field_name,
            "error": format!("Field '{}' not found in schema", field_name),
        });
    };

    let errors: Vec<Value> = match violations(property, &field_value, false) {
        Ok(errors) => errors.into_iter().map(|e| e["message"].clone()).collect(),
        Err(message) => {
            return json!({
                "valid": false,
                "field_name": field_name,
                "error": message,
            })
        }
    };

    json!({
        "valid": errors.is_empty(),
        "field_name": field_name,
        "field_value": field_value,
        "errors": errors,
        "allowed_values": property.get("enum").cloned().unwrap_or(Value::Null),
    })
}

/// Every violation of `schema` by `instance`, or a message if the schema does not compile
fn violations(schema: &Value, instance: &Value, strict: bool) -> Result<Vec<Value>, String> {
    let compiled =
        JSONSchema::compile(schema).map_err(|e| format!("Invalid JSON schema: {}", e))?;

    let Err(errors) = compiled.validate(instance) else {
        return Ok(Vec::new());
    };

    Ok(errors
        .map(|error| {
            let schema_path = error.schema_path.to_string();
            let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
            let mut entry = json!({
                "message": error.to_string(),
                "path": error.instance_path.to_string(),
                "validator": keyword,
            });
            if strict {
                entry["schema_path"] = json!(schema_path);
            }
            entry
        })
        .collect())
}

fn failure(message: impl Into<String>) -> Value {
    json!({
        "valid": false,
        "error": message.into(),
    })
}
