//! Selection state and the messages that keep host views in sync.
//!
//! A click in the diagram and a click in the tree go through the same
//! handler. Every outcome is a list of [`HostMessage`]s; the coordinator
//! never talks to a UI itself.

use std::collections::HashMap;
use std::sync::Arc;

use ropey::Rope;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::convert::{node_entries, sanitize_id, ConversionResult};
use crate::document::{LineRange, ParsedDocument, SourceRange};
use crate::error::SchemaError;
use crate::registry::GraphType;
use crate::schema::{yaml_to_json, FieldSchema, SchemaResolver, ValidationError};
use crate::tree::TreeNode;

/// One instruction for the host's UI channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    UpdateAll {
        mermaid_source: String,
        tree: Vec<TreeNode>,
        errors: Vec<ValidationError>,
    },
    SelectNode {
        node_id: String,
    },
    HighlightNode {
        node_id: String,
        mermaid_id: String,
    },
    ShowNode {
        node_id: String,
        data: JsonValue,
        fields: Vec<FieldSchema>,
    },
    ClearNodeEditor,
    Reveal {
        node_id: String,
        range: SourceRange,
        lines: LineRange,
    },
}

/// Bundles one conversion and its tree for the host.
pub fn update_all(result: &ConversionResult, tree: Vec<TreeNode>) -> HostMessage {
    HostMessage::UpdateAll {
        mermaid_source: result.mermaid_source.clone(),
        tree,
        errors: result.errors.clone(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    NoSelection,
    NodeSelected(String),
}

type CacheKey = (String, u32, String);

/// Builds node editor messages; caches compiled field schemas per
/// `(graph type id, version, source path)`.
#[derive(Debug, Default)]
pub struct NodeEditorController {
    cache: HashMap<CacheKey, Arc<Vec<FieldSchema>>>,
}

impl NodeEditorController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field schemas for one element under `source_path`.
    pub fn field_schemas(
        &mut self,
        graph_type: &GraphType,
        source_path: &str,
    ) -> Result<Arc<Vec<FieldSchema>>, SchemaError> {
        let key = (graph_type.id.clone(), graph_type.version, source_path.to_string());
        if let Some(fields) = self.cache.get(&key) {
            debug!(key = graph_type.version_key(), source_path, "field schema cache hit");
            return Ok(Arc::clone(fields));
        }

        let resolver = SchemaResolver::new(&graph_type.schema);
        let fields = match resolver.extract_node_sub_schema(source_path)? {
            Some(sub_schema) => resolver.build_field_schemas(&sub_schema, None)?,
            None => Vec::new(),
        };
        let fields = Arc::new(fields);
        self.cache.insert(key, Arc::clone(&fields));
        Ok(fields)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// `ShowNode` for `node_id`, or `ClearNodeEditor` when it is not in
    /// `data`.
    pub fn build_node_message(&mut self, graph_type: &GraphType, data: &Value, node_id: &str) -> HostMessage {
        let shapes = &graph_type.mapping.node_shapes;
        let Some(node) = node_entries(data, shapes)
            .unwrap_or_default()
            .into_iter()
            .find(|node| node.id == node_id)
        else {
            debug!(node_id, "selected node is not in the document");
            return Self::build_clear_message();
        };

        let fields = self
            .field_schemas(graph_type, &shapes.source_path)
            .unwrap_or_else(|err| {
                warn!(key = graph_type.version_key(), %err, "field schemas unavailable");
                Arc::new(Vec::new())
            });
        HostMessage::ShowNode {
            node_id: node_id.to_string(),
            data: yaml_to_json(node.value),
            fields: fields.as_ref().clone(),
        }
    }

    pub fn build_clear_message() -> HostMessage {
        HostMessage::ClearNodeEditor
    }
}

/// Owns the current selection and the graph type it belongs to.
#[derive(Debug, Default)]
pub struct SelectionCoordinator {
    state: SelectionState,
    graph_type: Option<Arc<GraphType>>,
    controller: NodeEditorController,
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn selected(&self) -> Option<&str> {
        match &self.state {
            SelectionState::NodeSelected(id) => Some(id),
            SelectionState::NoSelection => None,
        }
    }

    pub fn controller_mut(&mut self) -> &mut NodeEditorController {
        &mut self.controller
    }

    /// Switches graph type; the selection is reset when it differs from the
    /// current one. Returns whether it changed.
    pub fn set_graph_type(&mut self, graph_type: Arc<GraphType>) -> bool {
        let changed = self
            .graph_type
            .as_ref()
            .map_or(true, |current| current.version_key() != graph_type.version_key());
        if changed {
            debug!(key = graph_type.version_key(), "graph type changed, clearing selection");
            self.state = SelectionState::NoSelection;
        }
        self.graph_type = Some(graph_type);
        changed
    }

    /// A click on a diagram node. Mermaid ids are mapped back to data ids
    /// through the conversion's node map.
    pub fn handle_diagram_click(
        &mut self,
        mermaid_id: &str,
        result: &ConversionResult,
        data: &Value,
    ) -> Vec<HostMessage> {
        let node_id = result
            .node_for_mermaid_id(mermaid_id)
            .unwrap_or(mermaid_id)
            .to_string();
        self.select(&node_id, mermaid_id.to_string(), data)
    }

    pub fn handle_tree_click(&mut self, node_id: &str, data: &Value) -> Vec<HostMessage> {
        self.select(node_id, sanitize_id(node_id), data)
    }

    fn select(&mut self, node_id: &str, mermaid_id: String, data: &Value) -> Vec<HostMessage> {
        self.state = SelectionState::NodeSelected(node_id.to_string());
        let mut messages = vec![
            HostMessage::SelectNode {
                node_id: node_id.to_string(),
            },
            HostMessage::HighlightNode {
                node_id: node_id.to_string(),
                mermaid_id,
            },
        ];
        messages.push(self.node_message(node_id, data));
        messages
    }

    fn node_message(&mut self, node_id: &str, data: &Value) -> HostMessage {
        let message = match &self.graph_type {
            Some(graph_type) => self.controller.build_node_message(graph_type, data, node_id),
            None => NodeEditorController::build_clear_message(),
        };
        if message == HostMessage::ClearNodeEditor {
            self.state = SelectionState::NoSelection;
        }
        message
    }

    /// Re-reads the selected node after an edit.
    pub fn refresh(&mut self, data: &Value) -> HostMessage {
        match self.selected().map(str::to_string) {
            Some(node_id) => self.node_message(&node_id, data),
            None => NodeEditorController::build_clear_message(),
        }
    }

    pub fn clear(&mut self) -> HostMessage {
        self.state = SelectionState::NoSelection;
        NodeEditorController::build_clear_message()
    }

    /// Where the selected node's entry sits in `doc`, for the host to scroll
    /// to. Advisory only.
    pub fn reveal(&self, doc: &ParsedDocument) -> Option<HostMessage> {
        let node_id = self.selected()?;
        let graph_type = self.graph_type.as_ref()?;
        let node = node_entries(&doc.data, &graph_type.mapping.node_shapes)
            .ok()?
            .into_iter()
            .find(|node| node.id == node_id)?;
        let range = doc.map_entry_range(&node.data_path)?;
        let lines = range.to_line_range(&Rope::from_str(&doc.raw_text));
        Some(HostMessage::Reveal {
            node_id: node_id.to_string(),
            range,
            lines,
        })
    }
}
