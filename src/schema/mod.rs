//! Schema resolution and field metadata.
//!
//! Graph type schemas are JSON schemas. This module follows their internal
//! `$ref`s, finds the sub-schema that governs one element of a collection,
//! and compiles an object schema into the flat [`FieldSchema`] list a node
//! editor form is built from. Validation of whole documents lives in
//! [`validate`].

mod validate;

pub use validate::{pointer_to_path, yaml_to_json, GraphSchema, ValidationError};

use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::document::split_path;
use crate::error::SchemaError;

/// UI-facing description of one editable property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Dotted data path; array items use a `[]` suffix (`steps[].name`).
    pub path: String,
    pub label: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FieldKind {
    String {
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        x_widget: Option<String>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
        integer: bool,
    },
    Boolean,
    Enum {
        options: Vec<Value>,
    },
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<Box<FieldSchema>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_items: Option<u64>,
    },
    Object {
        properties: Vec<FieldSchema>,
        allow_additional: bool,
    },
}

/// The closed set of reference shapes the resolver understands.
enum RefTarget<'r> {
    /// `#/definitions/<name>` or `#/$defs/<name>`
    Internal { section: &'static str, name: String, raw: &'r str },
    Unsupported(&'r str),
}

impl<'r> RefTarget<'r> {
    fn classify(reference: &'r str) -> RefTarget<'r> {
        for section in ["definitions", "$defs"] {
            let prefix = format!("#/{section}/");
            if let Some(name) = reference.strip_prefix(prefix.as_str()) {
                if !name.is_empty() && !name.contains('/') {
                    return RefTarget::Internal {
                        section,
                        name: name.replace("~1", "/").replace("~0", "~"),
                        raw: reference,
                    };
                }
            }
        }
        RefTarget::Unsupported(reference)
    }
}

/// Resolves references and derives field metadata against one root schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'s> {
    root: &'s Value,
}

impl<'s> SchemaResolver<'s> {
    pub fn new(root: &'s Value) -> Self {
        SchemaResolver { root }
    }

    /// Follows a `$ref` on `node`, merging the referencing node's sibling
    /// keys over the referenced definition. Nodes without a reference are
    /// returned as they are.
    pub fn resolve_ref(&self, node: &Value) -> Result<Value, SchemaError> {
        self.resolve_chain(node, &mut Vec::new())
    }

    fn resolve_chain(&self, node: &Value, seen: &mut Vec<String>) -> Result<Value, SchemaError> {
        let Some(object) = node.as_object() else {
            return Ok(node.clone());
        };
        let Some(reference) = object.get("$ref") else {
            return Ok(node.clone());
        };
        let Some(reference) = reference.as_str() else {
            return Err(SchemaError::UnsupportedReference {
                reference: reference.to_string(),
            });
        };

        if seen.iter().any(|visited| visited == reference) {
            return Err(SchemaError::ReferenceCycle {
                reference: reference.to_string(),
            });
        }
        seen.push(reference.to_string());

        let target = match RefTarget::classify(reference) {
            RefTarget::Internal { section, name, raw } => self
                .root
                .get(section)
                .and_then(|definitions| definitions.get(&name))
                .ok_or_else(|| SchemaError::UnresolvedReference {
                    reference: raw.to_string(),
                })?,
            RefTarget::Unsupported(raw) => {
                return Err(SchemaError::UnsupportedReference {
                    reference: raw.to_string(),
                })
            }
        };

        let mut resolved = self.resolve_chain(target, seen)?;
        if let Some(merged) = resolved.as_object_mut() {
            for (key, value) in object.iter().filter(|(key, _)| *key != "$ref") {
                merged.insert(key.clone(), value.clone());
            }
        }
        Ok(resolved)
    }

    /// The schema of one element under `source_path` (`nodes`, `edges`,
    /// `meta`, or a wildcard path such as `nodes.*.connections`): the
    /// `additionalProperties` of a map-of-items or the `items` of an array.
    pub fn extract_node_sub_schema(&self, source_path: &str) -> Result<Option<Value>, SchemaError> {
        let mut current = self.resolve_ref(self.root)?;

        for segment in split_path(source_path) {
            let next = if segment == "*" {
                self.element_schema(&current)?
            } else {
                match current.get("properties").and_then(|p| p.get(segment)) {
                    Some(property) => Some(self.resolve_ref(property)?),
                    None => None,
                }
            };
            let Some(next) = next else {
                return Ok(None);
            };
            current = next;
        }

        self.element_schema(&current)
    }

    fn element_schema(&self, schema: &Value) -> Result<Option<Value>, SchemaError> {
        let element = schema
            .get("additionalProperties")
            .filter(|value| value.is_object())
            .or_else(|| schema.get("items").filter(|value| value.is_object()));
        element.map(|element| self.resolve_ref(element)).transpose()
    }

    /// Compiles the declared properties of an object schema into field
    /// descriptors, in declaration order. Properties whose type has no
    /// supported editor are dropped.
    pub fn build_field_schemas(
        &self,
        sub_schema: &Value,
        base_path: Option<&str>,
    ) -> Result<Vec<FieldSchema>, SchemaError> {
        self.build_fields(sub_schema, base_path, &mut Vec::new())
    }

    /// `expanding` holds the references whose properties are being built
    /// further up; a property that refers back to one of them is emitted
    /// without recursing into it again.
    fn build_fields(
        &self,
        sub_schema: &Value,
        base_path: Option<&str>,
        expanding: &mut Vec<String>,
    ) -> Result<Vec<FieldSchema>, SchemaError> {
        let reference = reference_of(sub_schema);
        if let Some(reference) = reference {
            expanding.push(reference.to_string());
        }

        let schema = self.resolve_ref(sub_schema)?;
        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect_vec())
            .unwrap_or_default();
        let mut fields = Vec::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, property) in properties {
                let path = match base_path {
                    Some(base) if !base.is_empty() => format!("{base}.{key}"),
                    _ => key.clone(),
                };
                let is_required = required.contains(&key.as_str());
                if let Some(field) = self.build_field(key, path, property, is_required, expanding)? {
                    fields.push(field);
                }
            }
        }

        if reference.is_some() {
            expanding.pop();
        }
        Ok(fields)
    }

    fn build_field(
        &self,
        key: &str,
        path: String,
        property: &Value,
        required: bool,
        expanding: &mut Vec<String>,
    ) -> Result<Option<FieldSchema>, SchemaError> {
        let reentered = reference_of(property)
            .is_some_and(|reference| expanding.iter().any(|active| active == reference));
        if reentered {
            debug!(path = path.as_str(), "recursive reference, not expanding further");
        }
        let reference = reference_of(property).filter(|_| !reentered);
        let property = self.resolve_ref(property)?;
        let label = property
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| humanize_label(key));

        if let Some(reference) = reference {
            expanding.push(reference.to_string());
        }
        let kind = self.field_kind(key, &path, &property, reentered, expanding);
        if reference.is_some() {
            expanding.pop();
        }

        Ok(kind?.map(|kind| FieldSchema {
            path,
            label,
            required,
            kind,
        }))
    }

    fn field_kind(
        &self,
        key: &str,
        path: &str,
        property: &Value,
        reentered: bool,
        expanding: &mut Vec<String>,
    ) -> Result<Option<FieldKind>, SchemaError> {
        let kind = if let Some(options) = property.get("enum").and_then(Value::as_array) {
            FieldKind::Enum {
                options: options.clone(),
            }
        } else {
            match declared_type(property) {
                Some("string") => {
                    let x_widget = property
                        .get("x-widget")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let multiline = property.get("format").and_then(Value::as_str)
                        == Some("multiline")
                        || x_widget.as_deref() == Some("textarea");
                    FieldKind::String {
                        multiline,
                        x_widget,
                    }
                }
                Some(number @ ("number" | "integer")) => FieldKind::Number {
                    minimum: property.get("minimum").and_then(Value::as_f64),
                    maximum: property.get("maximum").and_then(Value::as_f64),
                    integer: number == "integer",
                },
                Some("boolean") => FieldKind::Boolean,
                Some("array") => {
                    let items = match property.get("items") {
                        Some(items) if !reentered => self
                            .build_field(key, format!("{path}[]"), items, false, expanding)?
                            .map(Box::new),
                        _ => None,
                    };
                    FieldKind::Array {
                        items,
                        min_items: property.get("minItems").and_then(Value::as_u64),
                    }
                }
                Some("object") => FieldKind::Object {
                    properties: if reentered {
                        Vec::new()
                    } else {
                        self.build_fields(property, Some(path), expanding)?
                    },
                    allow_additional: property.get("additionalProperties")
                        != Some(&Value::Bool(false)),
                },
                other => {
                    debug!(path, declared = ?other, "skipping property without a supported type");
                    return Ok(None);
                }
            }
        };
        Ok(Some(kind))
    }
}

fn reference_of(schema: &Value) -> Option<&str> {
    schema.get("$ref").and_then(Value::as_str)
}

/// The property's type; nullable unions use their non-null member, and an
/// untyped schema with `properties` or `items` is an object or array.
fn declared_type(property: &Value) -> Option<&str> {
    match property.get("type") {
        Some(Value::String(name)) => Some(name.as_str()),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null"),
        _ if property.get("properties").is_some() => Some("object"),
        _ if property.get("items").is_some() => Some("array"),
        _ => None,
    }
}

/// Turns `graph-version`, `graphVersion` or `graph_version` into
/// `Graph Version`.
pub fn humanize_label(key: &str) -> String {
    let chars = key.chars().collect_vec();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '-' | '_' | ' ' | '.') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        let prev = i.checked_sub(1).map(|j| chars[j]);
        let next = chars.get(i + 1).copied();
        let boundary = c.is_uppercase()
            && match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                // the last capital of an acronym starts the next word: HTTPServer
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .join(" ")
}
