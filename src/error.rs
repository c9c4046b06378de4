//! Error taxonomy.
//!
//! Registry and schema errors are returned to the immediate caller: they
//! describe configuration mistakes that surface at registration or compile
//! time. Document errors come back from parsing and mutation. Data that merely
//! violates a schema is never an error here; it is collected as
//! [`crate::schema::ValidationError`] inside conversion results.

use serde::Serialize;
use thiserror::Error;

/// Failure to register a graph type.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum RegistryError {
    #[error("graph type '{new_id}' claims pattern '{pattern}' already owned by '{existing_id}'")]
    TypeConflict {
        new_id: String,
        existing_id: String,
        pattern: String,
    },
    #[error("graph type '{id}' has an invalid file pattern '{pattern}': {message}")]
    InvalidPattern {
        id: String,
        pattern: String,
        message: String,
    },
}

/// Failure to follow a `$ref` inside a schema.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum SchemaError {
    #[error("reference '{reference}' points to an undeclared definition")]
    UnresolvedReference { reference: String },
    #[error("reference '{reference}' is not an internal definition reference")]
    UnsupportedReference { reference: String },
    #[error("reference '{reference}' is part of a cycle")]
    ReferenceCycle { reference: String },
}

/// Failure to parse or mutate a document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("YAML parse error: {0}")]
    Yaml(String),
    #[error("unsupported YAML construct at byte {offset}: {message}")]
    Unsupported { offset: usize, message: String },
    #[error("path '{0}' does not exist in the document")]
    PathNotFound(String),
    #[error("value at '{0}' is not a mapping")]
    NotAMap(String),
    #[error("value at '{0}' is not a sequence")]
    NotASequence(String),
    #[error("key '{key}' already exists under '{parent}'")]
    DuplicateKey { parent: String, key: String },
}

/// Failure to pick the graph type (and version) that governs a document.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResolutionError {
    #[error("document could not be parsed: {message}")]
    Parse { message: String },
    #[error("document has no '{field}' field")]
    MissingVersion { field: String },
    #[error("'{field}' must be an integer, found '{found}'")]
    MalformedVersion { field: String, found: String },
    #[error("no graph type is registered for '{file_name}'")]
    NoMatchingType { file_name: String },
    #[error("no graph type '{key}' is registered for '{file_name}'")]
    UnknownVersion { file_name: String, key: String },
}
