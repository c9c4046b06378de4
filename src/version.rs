//! Picking the graph type version that governs a document.
//!
//! A document names its version in an integer field (`meta.graph-version` by
//! default) and may name its graph type explicitly (`meta.graph-type`);
//! otherwise the file name decides. A missing or non-integer version is a
//! hard failure, never a silent default.

use std::sync::Arc;

use serde_yaml::Value;
use tracing::debug;

use crate::config::Settings;
use crate::convert::scalar_text;
use crate::document::value_at_path;
use crate::error::ResolutionError;
use crate::registry::{version_key, GraphType, GraphTypeRegistry};

pub fn resolve_graph_type(
    registry: &GraphTypeRegistry,
    file_name: &str,
    text: &str,
    settings: &Settings,
) -> Result<Arc<GraphType>, ResolutionError> {
    let data: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text).map_err(|err| ResolutionError::Parse {
            message: err.to_string(),
        })?
    };

    let version = declared_version(&data, &settings.version_field)?;
    let explicit_id = value_at_path(&data, &settings.type_field).and_then(scalar_text);

    let resolved = match explicit_id {
        Some(id) => registry
            .get(&id, version)
            .ok_or_else(|| ResolutionError::UnknownVersion {
                file_name: file_name.to_string(),
                key: version_key(&id, version),
            })?,
        None => {
            let default = registry
                .get_for_file(file_name)
                .ok_or_else(|| ResolutionError::NoMatchingType {
                    file_name: file_name.to_string(),
                })?;
            registry
                .get_for_file_version(file_name, version)
                .ok_or_else(|| ResolutionError::UnknownVersion {
                    file_name: file_name.to_string(),
                    key: version_key(&default.id, version),
                })?
        }
    };

    debug!(file_name, key = resolved.version_key(), "resolved graph type");
    Ok(resolved)
}

fn declared_version(data: &Value, field: &str) -> Result<u32, ResolutionError> {
    let missing = || ResolutionError::MissingVersion {
        field: field.to_string(),
    };
    let value = match value_at_path(data, field) {
        None | Some(Value::Null) => return Err(missing()),
        Some(value) => value,
    };

    value
        .as_u64()
        .and_then(|version| u32::try_from(version).ok())
        .ok_or_else(|| ResolutionError::MalformedVersion {
            field: field.to_string(),
            found: scalar_text(value).unwrap_or_else(|| {
                serde_yaml::to_string(value)
                    .map(|text| text.trim().to_string())
                    .unwrap_or_default()
            }),
        })
}
