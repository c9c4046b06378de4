//! Projection of document data into a display hierarchy.
//!
//! The tree is rebuilt wholesale on every update; nothing here is mutated in
//! place. Ids are dotted and stable across rebuilds (`build`,
//! `build.connections`, `build.tags.0`) so a host can keep its expansion and
//! selection state.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

use crate::convert::{edge_endpoints, field_text, node_entries, scalar_text};
use crate::mapping::Mapping;
use crate::registry::GraphType;
use crate::schema::humanize_label;

const DEFAULT_ICONS: [(&str, &str); 7] = [
    ("start", "debug-start"),
    ("end", "debug-stop"),
    ("process", "gear"),
    ("decision", "question"),
    ("io", "arrow-swap"),
    ("subgraph", "folder"),
    ("note", "note"),
];

const FALLBACK_ICON: &str = "circle-outline";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    fn leaf(id: impl Into<String>, label: impl Into<String>) -> Self {
        TreeNode {
            id: id.into(),
            label: label.into(),
            icon: None,
            kind: None,
            children: None,
        }
    }

    fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = (!children.is_empty()).then_some(children);
        self
    }

    /// Depth-first search by id.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter()
            .flatten()
            .find_map(|child| child.find(id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Type value to icon, merged over the default table.
    pub icon_overrides: BTreeMap<String, String>,
}

impl TreeOptions {
    fn icon_for(&self, kind: Option<&str>) -> String {
        let Some(kind) = kind else {
            return FALLBACK_ICON.to_string();
        };
        self.icon_overrides
            .get(kind)
            .map(String::as_str)
            .or_else(|| {
                DEFAULT_ICONS
                    .iter()
                    .find(|(name, _)| *name == kind)
                    .map(|(_, icon)| *icon)
            })
            .unwrap_or(FALLBACK_ICON)
            .to_string()
    }
}

/// `[meta group?, nodes group]`, or nothing when `data` is not a mapping.
pub fn build_tree(data: &Value, graph_type: &GraphType, options: &TreeOptions) -> Vec<TreeNode> {
    if !data.is_mapping() {
        return Vec::new();
    }
    let mapping = &graph_type.mapping;
    let mut groups = Vec::with_capacity(2);

    if let Some(meta) = data.get("meta").and_then(Value::as_mapping) {
        let children = meta
            .iter()
            .filter_map(|(key, value)| {
                let key = scalar_text(key)?;
                let label = match scalar_text(value) {
                    Some(text) => format!("{key}: {text}"),
                    None => key.clone(),
                };
                Some(TreeNode::leaf(format!("meta.{key}"), label))
            })
            .collect();
        groups.push(TreeNode::leaf("meta", "Meta").with_icon("info").with_children(children));
    }

    let shapes = &mapping.node_shapes;
    let nodes = node_entries(data, shapes).unwrap_or_default();
    let group_name = shapes
        .source_path
        .rsplit('.')
        .next()
        .unwrap_or(&shapes.source_path);
    let children = nodes
        .iter()
        .map(|node| build_node(&node.id, node.value, mapping, options))
        .collect::<Vec<_>>();
    let mut group = TreeNode::leaf(
        shapes.source_path.clone(),
        format!("{} ({})", humanize_label(group_name), nodes.len()),
    )
    .with_icon("folder");
    group.children = Some(children);
    groups.push(group);

    groups
}

fn build_node(id: &str, value: &Value, mapping: &Mapping, options: &TreeOptions) -> TreeNode {
    let shapes = &mapping.node_shapes;
    let label = field_text(value, &shapes.label_field)
        .or_else(|| field_text(value, "name"))
        .unwrap_or_else(|| id.to_string());
    let kind = field_text(value, shapes.shape_field.as_deref().unwrap_or("type"));
    let edge_collection = mapping
        .edge_links
        .as_ref()
        .and_then(|links| links.co_located_collection());

    let mut children = Vec::new();
    if let Some(map) = value.as_mapping() {
        for (key, field) in map {
            let Some(key) = scalar_text(key) else {
                continue;
            };
            let child_id = format!("{id}.{key}");

            if Some(key.as_str()) == edge_collection {
                let edges = build_edges_group(field, mapping, Some(id));
                if !edges.is_empty() {
                    children.push(
                        TreeNode::leaf(child_id, format!("{} ({})", humanize_label(&key), edges.len()))
                            .with_icon("link")
                            .with_children(edges),
                    );
                }
            } else if key == "metadata" {
                if let Some(metadata) = field.as_mapping() {
                    let entries = metadata
                        .iter()
                        .filter_map(|(name, value)| {
                            let name = scalar_text(name)?;
                            let label = match scalar_text(value) {
                                Some(text) => format!("{name}: {text}"),
                                None => name.clone(),
                            };
                            Some(TreeNode::leaf(format!("{child_id}.{name}"), label))
                        })
                        .collect();
                    children.push(
                        TreeNode::leaf(child_id, "Metadata")
                            .with_icon("tag")
                            .with_children(entries),
                    );
                }
            } else if let Some(items) = field.as_sequence() {
                let entries = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let label = scalar_text(item)
                            .or_else(|| field_text(item, &shapes.label_field))
                            .or_else(|| field_text(item, "name"))
                            .unwrap_or_else(|| format!("Item {}", index + 1));
                        TreeNode::leaf(format!("{child_id}.{index}"), label)
                    })
                    .collect();
                children.push(
                    TreeNode::leaf(child_id, format!("{} ({})", humanize_label(&key), items.len()))
                        .with_icon("list-unordered")
                        .with_children(entries),
                );
            }
        }
    }

    let mut node = TreeNode::leaf(id, label).with_children(children);
    node.icon = Some(options.icon_for(kind.as_deref()));
    node.kind = kind;
    node
}

/// Flat children for a raw edge collection, labelled `from → to`. With
/// `implicit_from`, edges are those nested under that node.
pub fn build_edges_group(edges: &Value, mapping: &Mapping, implicit_from: Option<&str>) -> Vec<TreeNode> {
    let Some(links) = &mapping.edge_links else {
        return Vec::new();
    };
    let parent = match (implicit_from, links.co_located_collection()) {
        (Some(node), Some(collection)) => format!("{node}.{collection}"),
        _ => links.source_path.clone(),
    };
    let items: Vec<(String, &Value)> = match edges {
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Value::Mapping(map) => map
            .iter()
            .filter_map(|(key, item)| Some((scalar_text(key)?, item)))
            .collect(),
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .map(|(key, item)| {
            let (from, to) = edge_endpoints(item, links, implicit_from);
            let mut label = format!(
                "{} → {}",
                from.as_deref().unwrap_or("?"),
                to.as_deref().unwrap_or("?")
            );
            if let Some(text) = links.label_field.as_deref().and_then(|f| field_text(item, f)) {
                label.push_str(&format!(" ({text})"));
            }
            let mut node = TreeNode::leaf(format!("{parent}.{key}"), label).with_icon("arrow-right");
            node.kind = Some("edge".to_string());
            node
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{flowchart_type, graph_type_with_mapping, FLOWCHART};
    use serde_json::json;

    fn data(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    // ========================================================================
    // build_tree
    // ========================================================================

    #[test]
    fn test_flowchart_tree_has_meta_and_nodes() {
        let tree = build_tree(&data(FLOWCHART), &flowchart_type(), &TreeOptions::default());

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, "meta");
        assert_eq!(
            tree[0].children.as_ref().unwrap()[0].label,
            "title: Release"
        );
        assert_eq!(tree[1].label, "Nodes (6)");

        let nodes = tree[1].children.as_ref().unwrap();
        assert_eq!(
            nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["start", "build", "test", "review", "publish", "done"]
        );
        assert_eq!(nodes[3].label, "Approved?");
        assert_eq!(nodes[3].icon.as_deref(), Some("question"));
        assert_eq!(nodes[3].kind.as_deref(), Some("decision"));
        assert_eq!(nodes[1].children, None);
    }

    #[test]
    fn test_synthetic_children() {
        let tree = build_tree(&data(FLOWCHART), &flowchart_type(), &TreeOptions::default());

        let connections = tree[1].find("start.connections").unwrap();
        assert_eq!(connections.label, "Connections (1)");
        let edge = &connections.children.as_ref().unwrap()[0];
        assert_eq!(edge.id, "start.connections.0");
        assert_eq!(edge.label, "start → build (go)");

        let metadata = tree[1].find("publish.metadata").unwrap();
        assert_eq!(
            metadata.children.as_ref().unwrap()[0].label,
            "registry: crates.io"
        );

        let tags = tree[1].find("test.tags").unwrap();
        assert_eq!(tags.label, "Tags (2)");
        assert_eq!(tree[1].find("test.tags.1").unwrap().label, "integration");
    }

    #[test]
    fn test_label_falls_back_to_name_then_key() {
        let graph_type = graph_type_with_mapping(json!({ "nodeShapes": { "sourcePath": "graph.steps" } }));
        let tree = build_tree(
            &data("graph:\n  steps:\n    a: {name: Alpha}\n    b: {}\n"),
            &graph_type,
            &TreeOptions::default(),
        );

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].label, "Steps (2)");
        let steps = tree[0].children.as_ref().unwrap();
        assert_eq!(steps[0].label, "Alpha");
        assert_eq!(steps[1].label, "b");
        assert_eq!(steps[1].icon.as_deref(), Some(FALLBACK_ICON));
    }

    #[test]
    fn test_icon_overrides_merge_over_defaults() {
        let options = TreeOptions {
            icon_overrides: BTreeMap::from([("process".to_string(), "tools".to_string())]),
        };
        let tree = build_tree(&data(FLOWCHART), &flowchart_type(), &options);
        let nodes = tree[1].children.as_ref().unwrap();
        assert_eq!(nodes[1].icon.as_deref(), Some("tools"));
        assert_eq!(nodes[0].icon.as_deref(), Some("debug-start"));
    }

    #[test]
    fn test_non_mapping_input_is_empty() {
        let flow = flowchart_type();
        assert!(build_tree(&Value::Null, &flow, &TreeOptions::default()).is_empty());
        assert!(build_tree(&data("[1, 2]"), &flow, &TreeOptions::default()).is_empty());
    }

    // ========================================================================
    // build_edges_group
    // ========================================================================

    #[test]
    fn test_edges_group_from_top_level_list() {
        let graph_type = graph_type_with_mapping(json!({
            "nodeShapes": { "sourcePath": "nodes" },
            "edgeLinks": { "sourcePath": "edges", "labelField": "why" }
        }));
        let edges = data("- {from: a, to: b, why: retry}\n- {from: b}\n");
        let group = build_edges_group(&edges, &graph_type.mapping, None);

        assert_eq!(
            group.iter().map(|n| (n.id.as_str(), n.label.as_str())).collect::<Vec<_>>(),
            vec![("edges.0", "a → b (retry)"), ("edges.1", "b → ?")]
        );
        assert!(build_edges_group(&Value::Null, &graph_type.mapping, None).is_empty());
    }
}
