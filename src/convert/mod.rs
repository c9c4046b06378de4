//! Conversion of graph documents to Mermaid flowcharts.
//!
//! Conversion never fails. Parse errors, schema violations and mapping
//! problems are collected into [`ConversionResult::errors`] and the engine
//! emits whatever it can, so a document that is half-way through an edit
//! still renders.
//!
//! Hosts add their own lines (click directives, styling) through
//! [`ConversionHooks`] without the engine knowing what they are for.

mod source;
mod template;

pub use source::{edge_endpoints, edge_entries, node_entries, EdgeEntry, NodeEntry};
pub use template::{escape_label, field_text, sanitize_id, scalar_text, TemplateVars};

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::document::{self, ParsedDocument, SourceRange};
use crate::mapping::{EdgeSource, Mapping, FALLBACK_ARROW, FALLBACK_SHAPE};
use crate::registry::GraphType;
use crate::schema::ValidationError;

const INDENT: &str = "    ";

/// Caller-supplied values for one conversion. The engine reads no global
/// state; session variables arrive here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionContext {
    /// Extra `{name}` placeholders available to every template.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Direction used when the mapping does not declare one.
    #[serde(default)]
    pub direction: Option<String>,
    /// Shape used when the mapping has none for a node's type.
    #[serde(default)]
    pub default_shape: Option<String>,
}

/// What `prepare` may rewrite before conversion starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionInput {
    pub raw_text: String,
    pub context: ConversionContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub mermaid_id: String,
    pub data_path: String,
    /// Line of the node in `mermaid_source`, counting from 0.
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePosition {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub mermaid_source: String,
    pub errors: Vec<ValidationError>,
    /// Data id to emitted node.
    pub node_map: BTreeMap<String, NodePosition>,
    /// Edge data path (`edges.0`, `nodes.a.connections.1`) to emitted edge.
    pub edge_map: BTreeMap<String, EdgePosition>,
}

impl ConversionResult {
    /// The data id of the node emitted as `mermaid_id`.
    pub fn node_for_mermaid_id(&self, mermaid_id: &str) -> Option<&str> {
        self.node_map
            .iter()
            .find(|(_, position)| position.mermaid_id == mermaid_id)
            .map(|(id, _)| id.as_str())
    }
}

/// A node as it was just emitted.
#[derive(Debug, Clone, Copy)]
pub struct EmittedNode<'a> {
    pub id: &'a str,
    pub mermaid_id: &'a str,
    pub data_path: &'a str,
    pub line: usize,
    pub value: &'a Value,
}

/// An edge as it was just emitted.
#[derive(Debug, Clone, Copy)]
pub struct EmittedEdge<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub mermaid_from: &'a str,
    pub mermaid_to: &'a str,
    pub label: Option<&'a str>,
    pub data_path: &'a str,
    pub line: usize,
    pub value: &'a Value,
}

/// Host callbacks around a conversion. Lines returned from the emit hooks
/// are placed right after the element that triggered them; lines from
/// `on_complete` go at the end.
pub trait ConversionHooks {
    fn prepare(&mut self, _input: &mut ConversionInput) {}

    fn on_node_emit(&mut self, _node: &EmittedNode<'_>) -> Vec<String> {
        Vec::new()
    }

    fn on_edge_emit(&mut self, _edge: &EmittedEdge<'_>) -> Vec<String> {
        Vec::new()
    }

    fn on_complete(&mut self, _result: &ConversionResult) -> Vec<String> {
        Vec::new()
    }
}

/// Hooks that add nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ConversionHooks for NoHooks {}

pub fn convert(raw_text: &str, graph_type: &GraphType) -> ConversionResult {
    convert_with_prepare(raw_text, graph_type, &ConversionContext::default(), &mut NoHooks)
}

pub fn convert_with_prepare(
    raw_text: &str,
    graph_type: &GraphType,
    context: &ConversionContext,
    hooks: &mut dyn ConversionHooks,
) -> ConversionResult {
    let mut input = ConversionInput {
        raw_text: raw_text.to_string(),
        context: context.clone(),
    };
    hooks.prepare(&mut input);

    let mut emitter = Emitter::new(graph_type, &input.context);
    match document::parse(&input.raw_text) {
        Ok(doc) => emitter.emit_document(&doc, hooks),
        Err(err) => {
            debug!(key = graph_type.version_key(), %err, "document did not parse");
            emitter.errors.push(ValidationError::new("", err.to_string()));
        }
    }
    emitter.finish(hooks)
}

struct Emitter<'g> {
    graph_type: &'g GraphType,
    mapping: &'g Mapping,
    context: &'g ConversionContext,
    lines: Vec<String>,
    errors: Vec<ValidationError>,
    node_map: BTreeMap<String, NodePosition>,
    edge_map: BTreeMap<String, EdgePosition>,
    /// Data id to emitted Mermaid id.
    mermaid_ids: HashMap<String, String>,
}

impl<'g> Emitter<'g> {
    fn new(graph_type: &'g GraphType, context: &'g ConversionContext) -> Self {
        let mapping = &graph_type.mapping;
        let direction = mapping
            .direction
            .as_deref()
            .or(context.direction.as_deref())
            .unwrap_or("TD");
        Emitter {
            graph_type,
            mapping,
            context,
            lines: vec![format!("flowchart {direction}")],
            errors: Vec::new(),
            node_map: BTreeMap::new(),
            edge_map: BTreeMap::new(),
            mermaid_ids: HashMap::new(),
        }
    }

    /// Assigns a Mermaid id to `id`. Ids that sanitize to one already taken
    /// by a different node get a numeric suffix and are reported.
    fn assign_mermaid_id(&mut self, doc: &ParsedDocument, id: &str, data_path: &str) -> String {
        if let Some(existing) = self.mermaid_ids.get(id) {
            return existing.clone();
        }

        let base = sanitize_id(id);
        let taken = |candidate: &str| self.mermaid_ids.values().any(|used| used == candidate);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while taken(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }

        if candidate != base {
            self.report(
                doc,
                data_path,
                format!("node id '{id}' collides with another node as '{base}'; emitted as '{candidate}'"),
            );
        }
        self.mermaid_ids.insert(id.to_string(), candidate.clone());
        candidate
    }

    fn mermaid_id_for(&self, id: &str) -> String {
        self.mermaid_ids
            .get(id)
            .cloned()
            .unwrap_or_else(|| sanitize_id(id))
    }

    /// Pushes a body line and returns its line number.
    fn push(&mut self, line: String) -> usize {
        self.lines.push(format!("{INDENT}{line}"));
        self.lines.len() - 1
    }

    fn report(&mut self, doc: &ParsedDocument, path: &str, message: String) {
        let mut error = ValidationError::new(path, message);
        error.range = doc.map_entry_range(path);
        self.errors.push(error);
    }

    fn base_vars(&self) -> TemplateVars {
        let mut vars = TemplateVars::new();
        for (name, value) in &self.context.variables {
            vars.set(name.clone(), value.clone());
        }
        vars
    }

    fn emit_document(&mut self, doc: &ParsedDocument, hooks: &mut dyn ConversionHooks) {
        self.validate(doc);
        let known = self.emit_nodes(doc, hooks);
        self.emit_edges(doc, &known, hooks);
    }

    fn validate(&mut self, doc: &ParsedDocument) {
        match self.graph_type.validator() {
            Ok(schema) => {
                for mut error in schema.validate(&doc.data) {
                    if !error.path.is_empty() {
                        error.range = doc.map_entry_range(&error.path);
                    }
                    self.errors.push(error);
                }
            }
            Err(message) => {
                warn!(key = self.graph_type.version_key(), message, "schema does not compile");
                self.errors.push(ValidationError::new(
                    "",
                    format!("schema could not be compiled: {message}"),
                ));
            }
        }
    }

    fn emit_nodes(&mut self, doc: &ParsedDocument, hooks: &mut dyn ConversionHooks) -> HashSet<String> {
        let mapping: &'g Mapping = self.mapping;
        let context: &'g ConversionContext = self.context;
        let shapes = &mapping.node_shapes;
        let nodes = match node_entries(&doc.data, shapes) {
            Ok(nodes) => nodes,
            Err(error) => {
                let path = error.path.clone();
                self.report(doc, &path, error.message);
                Vec::new()
            }
        };

        let mut known = HashSet::new();
        let mut first_vars = None;
        let mut last_vars = None;

        for node in &nodes {
            if !known.insert(node.id.clone()) {
                self.report(doc, &node.data_path, format!("duplicate node id '{}'", node.id));
            }

            let mermaid_id = self.assign_mermaid_id(doc, &node.id, &node.data_path);
            let kind = shapes
                .shape_field
                .as_deref()
                .and_then(|field| field_text(node.value, field));
            let label = field_text(node.value, &shapes.label_field).unwrap_or_else(|| node.id.clone());

            let mut vars = self.base_vars();
            vars.set_fields(node.value)
                .set(shapes.id_field.clone(), escape_label(&node.id))
                .set(shapes.label_field.clone(), escape_label(&label))
                .set("id", mermaid_id.clone())
                .set("label", escape_label(&label));

            let template = shapes
                .mapped_shape(kind.as_deref())
                .or(context.default_shape.as_deref())
                .unwrap_or(FALLBACK_SHAPE);
            let line = self.push(vars.render(template));

            self.node_map.insert(
                node.id.clone(),
                NodePosition {
                    mermaid_id: mermaid_id.clone(),
                    data_path: node.data_path.clone(),
                    line,
                    range: doc.map_entry_range(&node.data_path),
                },
            );
            let extra = hooks.on_node_emit(&EmittedNode {
                id: &node.id,
                mermaid_id: &mermaid_id,
                data_path: &node.data_path,
                line,
                value: node.value,
            });
            self.push_all(extra);

            if first_vars.is_none() {
                first_vars = Some(vars.clone());
            }
            last_vars = Some(vars);
        }

        if let (Some(template), Some(vars)) = (&shapes.initial_connector, &first_vars) {
            let line = vars.render(template);
            self.push(line);
        }
        if let (Some(template), Some(vars)) = (&shapes.final_connector, &last_vars) {
            let line = vars.render(template);
            self.push(line);
        }

        known
    }

    fn emit_edges(
        &mut self,
        doc: &ParsedDocument,
        known: &HashSet<String>,
        hooks: &mut dyn ConversionHooks,
    ) {
        let mapping: &'g Mapping = self.mapping;
        let Some(links) = &mapping.edge_links else {
            return;
        };
        let edges = match edge_entries(&doc.data, links, &mapping.node_shapes) {
            Ok(edges) => edges,
            Err(error) => {
                let path = error.path.clone();
                self.report(doc, &path, error.message);
                return;
            }
        };
        let co_located = matches!(links.source(), EdgeSource::CoLocated { .. });
        let mut seen = HashSet::new();

        for edge in &edges {
            let (from, to) = edge_endpoints(edge.value, links, edge.enclosing.as_deref());
            let (from, to) = match (from, to) {
                (Some(from), Some(to)) => (from, to),
                (from, _) => {
                    let field = if from.is_none() { &links.from_field } else { &links.to_field };
                    debug!(path = edge.data_path, field, "skipping edge without endpoint");
                    self.report(doc, &edge.data_path, format!("edge is missing '{field}'"));
                    continue;
                }
            };

            let mermaid_from = self.mermaid_id_for(&from);
            let mermaid_to = self.mermaid_id_for(&to);
            let mut vars = self.base_vars();
            vars.set_fields(edge.value);
            if let (Some(field), Some(enclosing)) = (&links.from_implicit, &edge.enclosing) {
                vars.set(field.clone(), escape_label(enclosing));
            }
            vars.set("from", mermaid_from.clone()).set("to", mermaid_to.clone());

            let label = match &links.label_template {
                Some(template) => Some(vars.render(template)),
                None => links
                    .label_field
                    .as_deref()
                    .and_then(|field| field_text(edge.value, field))
                    .map(|text| escape_label(&text)),
            }
            .filter(|label| !label.trim().is_empty());

            if co_located && !seen.insert((from.clone(), to.clone(), label.clone())) {
                debug!(path = edge.data_path, "skipping duplicate edge");
                continue;
            }

            for endpoint in [&from, &to] {
                if !known.contains(endpoint) {
                    self.report(
                        doc,
                        &edge.data_path,
                        format!("edge refers to unknown node '{endpoint}'"),
                    );
                }
            }

            vars.set("label", label.clone().unwrap_or_default());
            let style = links
                .style_field
                .as_deref()
                .and_then(|field| field_text(edge.value, field));
            let link = style
                .as_deref()
                .and_then(|style| links.link_styles.get(style))
                .or_else(|| links.link_styles.get("default"))
                .map_or(FALLBACK_ARROW, String::as_str);

            let text = if link.contains("{from}") {
                vars.render(link)
            } else {
                match &label {
                    Some(label) => format!("{mermaid_from} {link}|{label}| {mermaid_to}"),
                    None => format!("{mermaid_from} {link} {mermaid_to}"),
                }
            };
            let line = self.push(text);

            self.edge_map.insert(
                edge.data_path.clone(),
                EdgePosition {
                    from: from.clone(),
                    to: to.clone(),
                    label: label.clone(),
                    line,
                    range: doc.map_entry_range(&edge.data_path),
                },
            );
            let extra = hooks.on_edge_emit(&EmittedEdge {
                from: &from,
                to: &to,
                mermaid_from: &mermaid_from,
                mermaid_to: &mermaid_to,
                label: label.as_deref(),
                data_path: &edge.data_path,
                line,
                value: edge.value,
            });
            self.push_all(extra);
        }
    }

    fn push_all(&mut self, lines: Vec<String>) {
        for line in lines {
            self.push(line);
        }
    }

    fn source(&self) -> String {
        let mut source = self.lines.join("\n");
        source.push('\n');
        source
    }

    fn finish(mut self, hooks: &mut dyn ConversionHooks) -> ConversionResult {
        let mut result = ConversionResult {
            mermaid_source: self.source(),
            errors: std::mem::take(&mut self.errors),
            node_map: std::mem::take(&mut self.node_map),
            edge_map: std::mem::take(&mut self.edge_map),
        };
        let extra = hooks.on_complete(&result);
        if !extra.is_empty() {
            self.push_all(extra);
            result.mermaid_source = self.source();
        }

        debug!(
            key = self.graph_type.version_key(),
            nodes = result.node_map.len(),
            edges = result.edge_map.len(),
            errors = result.errors.len(),
            "converted document"
        );
        result
    }
}
