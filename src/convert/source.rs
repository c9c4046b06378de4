//! Walking the node and edge collections a mapping points at.

use serde_yaml::Value;

use super::template::{field_text, scalar_text};
use crate::document::value_at_path;
use crate::mapping::{EdgeLinks, EdgeSource, NodeShapes};
use crate::schema::ValidationError;

/// One element of the node collection.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry<'d> {
    /// The map key, or the `idField` value (else the index) for sequences.
    pub id: String,
    pub data_path: String,
    pub value: &'d Value,
}

/// One element of an edge collection.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeEntry<'d> {
    pub data_path: String,
    pub value: &'d Value,
    /// Id of the node the edge is nested under, for co-located edges.
    pub enclosing: Option<String>,
}

fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

/// Elements of the collection at `path`, keyed the way nodes are keyed.
fn collection_entries<'d>(
    data: &'d Value,
    path: &str,
    id_field: &str,
) -> Result<Vec<NodeEntry<'d>>, ValidationError> {
    let entries = match value_at_path(data, path) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Mapping(map)) => map
            .iter()
            .filter_map(|(key, value)| {
                let id = scalar_text(key)?;
                Some(NodeEntry {
                    data_path: join(path, &id),
                    id,
                    value,
                })
            })
            .collect(),
        Some(Value::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(index, value)| NodeEntry {
                id: field_text(value, id_field).unwrap_or_else(|| index.to_string()),
                data_path: join(path, &index.to_string()),
                value,
            })
            .collect(),
        Some(_) => {
            return Err(ValidationError::new(
                path,
                format!("'{path}' must be a mapping or a sequence"),
            ))
        }
    };
    Ok(entries)
}

/// Every node under `shapes.source_path`, in data order.
pub fn node_entries<'d>(
    data: &'d Value,
    shapes: &NodeShapes,
) -> Result<Vec<NodeEntry<'d>>, ValidationError> {
    collection_entries(data, &shapes.source_path, &shapes.id_field)
}

/// Every edge the mapping can discover, in data order. For co-located edges
/// the nodes are walked in order and each one's nested collection read.
pub fn edge_entries<'d>(
    data: &'d Value,
    links: &EdgeLinks,
    shapes: &NodeShapes,
) -> Result<Vec<EdgeEntry<'d>>, ValidationError> {
    match links.source() {
        EdgeSource::Plain(path) => Ok(collection_entries(data, path, "id")?
            .into_iter()
            .map(|entry| EdgeEntry {
                data_path: entry.data_path,
                value: entry.value,
                enclosing: None,
            })
            .collect()),
        EdgeSource::CoLocated { nodes, collection } => {
            let id_field = if nodes == shapes.source_path {
                shapes.id_field.as_str()
            } else {
                "id"
            };
            let mut edges = Vec::new();
            for node in collection_entries(data, nodes, id_field)? {
                let nested_path = join(&node.data_path, collection);
                match node.value.get(collection) {
                    None | Some(Value::Null) => {}
                    Some(Value::Sequence(items)) => {
                        edges.extend(items.iter().enumerate().map(|(index, value)| EdgeEntry {
                            data_path: join(&nested_path, &index.to_string()),
                            value,
                            enclosing: Some(node.id.clone()),
                        }));
                    }
                    Some(_) => {
                        return Err(ValidationError::new(
                            nested_path.clone(),
                            format!("'{nested_path}' must be a sequence"),
                        ))
                    }
                }
            }
            Ok(edges)
        }
    }
}

/// `(from, to)` of one edge element. A scalar element is shorthand for its
/// target. `from` falls back to the enclosing node when the mapping marks
/// it implicit.
pub fn edge_endpoints(
    value: &Value,
    links: &EdgeLinks,
    enclosing: Option<&str>,
) -> (Option<String>, Option<String>) {
    let implicit = links
        .from_implicit
        .as_ref()
        .and(enclosing)
        .map(str::to_string);

    match value {
        Value::Mapping(_) => (
            field_text(value, &links.from_field).or(implicit),
            field_text(value, &links.to_field),
        ),
        other => (implicit, scalar_text(other)),
    }
}
