//! Declarative mapping from document data to Mermaid output.
//!
//! A mapping never executes code: it names where nodes and edges live in the
//! data, which fields carry ids and labels, and which templates render them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Shape used when neither the node's type nor `default` has a template.
pub const FALLBACK_SHAPE: &str = r#"{id}["{label}"]"#;

/// Arrow used when neither the edge's style nor `default` has a link style.
pub const FALLBACK_ARROW: &str = "-->";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub node_shapes: NodeShapes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_links: Option<EdgeLinks>,
    /// Flowchart direction (`TD`, `LR`, ...); the caller's default applies
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeShapes {
    /// Path of the node collection: a map keyed by node id or a sequence.
    pub source_path: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_label_field")]
    pub label_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_field: Option<String>,
    /// Type value to shape template. `default` applies to unmapped types.
    #[serde(default)]
    pub shapes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_connector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_connector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLinks {
    /// `edges` for a top-level collection, `nodes.*.connections` for edges
    /// nested under each node.
    pub source_path: String,
    #[serde(default = "default_from_field")]
    pub from_field: String,
    #[serde(default = "default_to_field")]
    pub to_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_field: Option<String>,
    /// Field filled from the enclosing node's key for nested edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_implicit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_field: Option<String>,
    /// Style value to an arrow token (`-.->`) or, when it mentions `{from}`,
    /// a whole line template.
    #[serde(default)]
    pub link_styles: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_template: Option<String>,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_label_field() -> String {
    "label".to_string()
}

fn default_from_field() -> String {
    "from".to_string()
}

fn default_to_field() -> String {
    "to".to_string()
}

/// An edge source path split around its wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSource<'m> {
    /// One collection holding every edge.
    Plain(&'m str),
    /// `<nodes>.*.<collection>`: a collection under each node.
    CoLocated { nodes: &'m str, collection: &'m str },
}

impl EdgeLinks {
    pub fn source(&self) -> EdgeSource<'_> {
        match self.source_path.split_once(".*.") {
            Some((nodes, collection)) if !nodes.is_empty() && !collection.is_empty() => {
                EdgeSource::CoLocated { nodes, collection }
            }
            _ => EdgeSource::Plain(&self.source_path),
        }
    }

    /// The nested collection name, for co-located edges.
    pub fn co_located_collection(&self) -> Option<&str> {
        match self.source() {
            EdgeSource::CoLocated { collection, .. } => Some(collection),
            EdgeSource::Plain(_) => None,
        }
    }
}

impl NodeShapes {
    /// Template for a node whose type value is `kind`, if the mapping has
    /// one (directly or through `default`).
    pub fn mapped_shape(&self, kind: Option<&str>) -> Option<&str> {
        kind.and_then(|kind| self.shapes.get(kind))
            .or_else(|| self.shapes.get("default"))
            .map(String::as_str)
    }

    pub fn shape_for(&self, kind: Option<&str>) -> &str {
        self.mapped_shape(kind).unwrap_or(FALLBACK_SHAPE)
    }
}
