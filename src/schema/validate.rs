//! Validation of document data against a graph type schema.
//!
//! - The schema is compiled once per graph type and cached on it
//! - YAML data is converted to a JSON value before validation (jsonschema requirement)
//! - Violations are data, never errors: a document mid-edit is expected to be invalid

use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::document::SourceRange;

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Dotted data path of the offending value; `""` for the root.
    pub path: String,
    /// Human-readable message from schema validation.
    pub message: String,
    /// Where the offending entry sits in the text, when it exists there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            path: path.into(),
            message: message.into(),
            range: None,
        }
    }
}

/// Compiled JSON schema for one graph type.
pub struct GraphSchema {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for GraphSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSchema").finish_non_exhaustive()
    }
}

impl GraphSchema {
    /// Compiles `schema`; the error is the compiler's message.
    pub fn compile(schema: &JsonValue) -> Result<Self, String> {
        let validator = jsonschema::validator_for(schema).map_err(|err| err.to_string())?;
        Ok(GraphSchema { validator })
    }

    /// Validates `data`, returning every violation. Ranges are left empty;
    /// callers holding the document fill them in.
    pub fn validate(&self, data: &YamlValue) -> Vec<ValidationError> {
        let instance = yaml_to_json(data);
        self.validator
            .iter_errors(&instance)
            .map(|error| {
                ValidationError::new(
                    pointer_to_path(&error.instance_path.to_string()),
                    error.to_string(),
                )
            })
            .collect()
    }
}

/// Converts a YAML data tree to JSON. Non-string keys are stringified and
/// tags are dropped.
pub fn yaml_to_json(value: &YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(flag) => JsonValue::Bool(*flag),
        YamlValue::Number(number) => {
            if let Some(int) = number.as_i64() {
                JsonValue::from(int)
            } else if let Some(uint) = number.as_u64() {
                JsonValue::from(uint)
            } else {
                number
                    .as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(JsonValue::Null, JsonValue::Number)
            }
        }
        YamlValue::String(text) => JsonValue::String(text.clone()),
        YamlValue::Sequence(items) => JsonValue::Array(items.iter().map(yaml_to_json).collect()),
        YamlValue::Mapping(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| (key_string(key), yaml_to_json(value)))
                .collect(),
        ),
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn key_string(key: &YamlValue) -> String {
    match key {
        YamlValue::String(text) => text.clone(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Bool(flag) => flag.to_string(),
        YamlValue::Number(number) => number.to_string(),
        YamlValue::Tagged(tagged) => key_string(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    }
}

/// `/nodes/check/label` → `nodes.check.label`.
pub fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_schema() -> GraphSchema {
        GraphSchema::compile(&json!({
            "type": "object",
            "properties": {
                "nodes": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "required": ["label"],
                        "properties": {
                            "label": { "type": "string" },
                            "weight": { "type": "integer" }
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn yaml(text: &str) -> YamlValue {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_valid_data_has_no_errors() {
        let schema = node_schema();
        let errors = schema.validate(&yaml("nodes:\n  a:\n    label: A\n"));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_errors_carry_dotted_paths() {
        let schema = node_schema();
        let errors = schema.validate(&yaml(
            "nodes:\n  a:\n    label: A\n  b:\n    weight: heavy\n",
        ));

        let mut paths = errors.iter().map(|e| e.path.as_str()).collect::<Vec<_>>();
        paths.sort();
        assert_eq!(paths, vec!["nodes.b", "nodes.b.weight"]);
        assert!(errors.iter().any(|e| e.message.contains("label")));
    }

    #[test]
    fn test_invalid_schema_does_not_compile() {
        assert!(GraphSchema::compile(&json!({ "type": 12 })).is_err());
    }

    #[test]
    fn test_yaml_to_json_stringifies_keys() {
        let value = yaml("1: one\ntrue: yes\nlist: [1, 2.5, null]\n");
        assert_eq!(
            yaml_to_json(&value),
            json!({ "1": "one", "true": "yes", "list": [1, 2.5, null] })
        );
    }

    #[test]
    fn test_pointer_to_path() {
        assert_eq!(pointer_to_path(""), "");
        assert_eq!(pointer_to_path("/edges/0/to"), "edges.0.to");
        assert_eq!(pointer_to_path("/a~1b/c~0d"), "a/b.c~d");
    }
}
