// Tool specifications: name, description, and JSON-Schema-like parameters
//
// A ToolSpec is backend-neutral. Each backend translates it into its own
// tool-definition payload (OpenAI function format for OpenRouter,
// name/description/input_schema for Bedrock) using ParameterSchema::to_json.
//
// Example rendering of a schema:
// ```json
// {
//   "type": "object",
//   "properties": {
//     "value": { "type": "string", "description": "The value to match" }
//   },
//   "required": ["value"]
// }
// ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Named, schema-described callable the model may request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique within a registry
    pub name: String,

    /// Tells the model when to use this tool
    pub description: String,

    /// JSON schema for the tool's arguments
    pub parameters: ParameterSchema,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Object schema describing a tool's arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Always "object" for parameter schemas
    #[serde(rename = "type")]
    pub param_type: String,

    /// Property name to property schema
    pub properties: BTreeMap<String, PropertySchema>,

    /// Names of required properties
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self {
            param_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an optional property
    pub fn property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Add a property and mark it required
    pub fn required_property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    /// Render as a JSON Schema object for backend tool payloads
    pub fn to_json(&self) -> Value {
        json!({
            "type": self.param_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// Schema of a single argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Allowed values, when the argument is an enumeration
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,

    /// Element schema for array arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
}

impl PropertySchema {
    fn typed(property_type: &str, description: impl Into<String>) -> Self {
        Self {
            property_type: property_type.to_string(),
            description: description.into(),
            allowed_values: None,
            items: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::typed("number", description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::typed("integer", description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::typed("boolean", description)
    }

    /// Free-form JSON object
    pub fn object(description: impl Into<String>) -> Self {
        Self::typed("object", description)
    }

    /// Array whose elements follow `items`
    pub fn array(description: impl Into<String>, items: PropertySchema) -> Self {
        let mut schema = Self::typed("array", description);
        schema.items = Some(Box::new(items));
        schema
    }

    /// Restrict the argument to a fixed set of values
    pub fn with_enum<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}
