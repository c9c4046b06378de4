//! Integration tests for the yamlgraph library public API.
//!
//! These tests use the crate the way a host does: load graph types, resolve
//! a document's version, convert it, build the tree and drive selection.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use serde_yaml::Value;
use tempfile::TempDir;

use yamlgraph::catalog::{builtin_registry, load_catalog};
use yamlgraph::config::Settings;
use yamlgraph::convert::{convert, convert_with_prepare, ConversionHooks, EmittedNode};
use yamlgraph::document::parse;
use yamlgraph::registry::GraphType;
use yamlgraph::selection::{HostMessage, SelectionCoordinator};
use yamlgraph::tree::{build_tree, TreeOptions};
use yamlgraph::version::resolve_graph_type;

const RELEASE: &str = r#"meta:
  title: Release
  graph-version: 1
nodes:
  start:
    label: Start
    type: start
    connections:
      - to: build
  build:
    label: Build
    type: process
  test:
    label: Test
    type: process
  review:
    label: Approved?
    type: decision
  publish:
    label: Publish
    type: io
  done:
    label: Done
    type: end
"#;

/// Helper: Create a temporary catalog directory for testing.
///
/// Returns (TempDir, PathBuf) - keep TempDir alive for test duration.
fn create_test_catalog_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let catalog_dir = temp_dir.path().join("catalog");
    fs::create_dir(&catalog_dir).expect("Failed to create catalog subdirectory");
    (temp_dir, catalog_dir)
}

fn flowchart() -> Arc<GraphType> {
    let registry = builtin_registry().unwrap();
    resolve_graph_type(&registry, "release.flow.yaml", RELEASE, &Settings::default()).unwrap()
}

// ============================================================================
// Scenario A: six-node flowchart
// ============================================================================

#[test]
fn test_six_node_flowchart_tree_and_diagram() {
    let graph_type = flowchart();
    let doc = parse(RELEASE).unwrap();

    let tree = build_tree(&doc.data, &graph_type, &TreeOptions::default());
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[1].label, "Nodes (6)");
    assert_eq!(tree[1].children.as_ref().map(Vec::len), Some(6));

    let result = convert(RELEASE, &graph_type);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.node_map.len(), 6);
    assert_eq!(result.edge_map.len(), 1);
    assert!(result.mermaid_source.starts_with("flowchart TD\n"));
    assert!(result.mermaid_source.contains("    start --> build\n"));
}

// ============================================================================
// Scenario B: invalid data still renders
// ============================================================================

#[test]
fn test_missing_required_field_reports_node_path() {
    let text = RELEASE.replace("    label: Test\n", "");
    let result = convert(&text, &flowchart());

    assert!(result
        .errors
        .iter()
        .any(|error| error.path == "nodes.test" && error.message.contains("label")));
    assert_eq!(result.node_map.len(), 6);

    let range = result
        .errors
        .iter()
        .find(|error| error.path == "nodes.test")
        .and_then(|error| error.range)
        .expect("error carries a source range");
    assert!(range.slice(&text).unwrap().starts_with("test:"));
}

// ============================================================================
// Scenario C: appending to an empty edge list
// ============================================================================

#[test]
fn test_append_edge_to_empty_list() {
    let graph_type = GraphType::new(
        "pairs",
        1,
        vec!["*.pairs.yaml".to_string()],
        json!({ "type": "object" }),
        serde_json::from_value(json!({
            "nodeShapes": { "sourcePath": "nodes" },
            "edgeLinks": { "sourcePath": "edges" }
        }))
        .unwrap(),
    );
    let text = "nodes:\n  a: {label: A}\n  b: {label: B}\nedges: []\n";
    let doc = parse(text).unwrap();

    let edge: Value = serde_yaml::from_str("{from: a, to: b}").unwrap();
    let edited = doc.append_to_sequence("edges", &edge).unwrap();
    let reparsed = parse(&edited).unwrap();

    let edges = reparsed.value_at("edges").and_then(Value::as_sequence).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(reparsed.value_at("edges.0.to"), Some(&Value::from("b")));

    let result = convert(&edited, &graph_type);
    assert_eq!(result.edge_map.len(), 1);
    assert!(result.mermaid_source.contains("    a --> b\n"));
}

// ============================================================================
// Scenario D: selecting an absent node
// ============================================================================

#[test]
fn test_selecting_absent_node_clears_editor() {
    let doc = parse(RELEASE).unwrap();
    let mut coordinator = SelectionCoordinator::new();
    coordinator.set_graph_type(flowchart());

    let messages = coordinator.handle_tree_click("nope", &doc.data);
    assert_eq!(messages.last(), Some(&HostMessage::ClearNodeEditor));
    assert_eq!(coordinator.selected(), None);
}

// ============================================================================
// Hooks and catalogs
// ============================================================================

struct Clicks;

impl ConversionHooks for Clicks {
    fn on_node_emit(&mut self, node: &EmittedNode<'_>) -> Vec<String> {
        vec![format!("click {} call reveal(\"{}\")", node.mermaid_id, node.id)]
    }
}

#[test]
fn test_host_hooks_add_click_directives() {
    let graph_type = flowchart();
    let context = Settings::default().conversion_context();
    let result = convert_with_prepare(RELEASE, &graph_type, &context, &mut Clicks);

    assert!(result
        .mermaid_source
        .contains("    click review call reveal(\"review\")\n"));
    let review = &result.node_map["review"];
    let lines: Vec<&str> = result.mermaid_source.lines().collect();
    assert!(lines[review.line].starts_with("    review{"));
}

#[test]
fn test_catalog_from_disk_adds_versions() {
    let (_temp_dir, catalog_dir) = create_test_catalog_dir();
    fs::write(
        catalog_dir.join("flowchart-v2.graphtype.yaml"),
        "id: flowchart\nversion: 2\nfilePatterns: ['*.flow.yaml']\nschema: {type: object}\nmapping:\n  nodeShapes:\n    sourcePath: nodes\n",
    )
    .unwrap();
    fs::write(catalog_dir.join("broken.graphtype.yaml"), "id: [").unwrap();

    let catalog = load_catalog(&catalog_dir).unwrap();
    assert_eq!(catalog.failures.len(), 1);
    assert_eq!(
        catalog.registry.list_version_keys(),
        vec!["flowchart@1".to_string(), "flowchart@2".to_string()]
    );

    let text = RELEASE.replace("graph-version: 1", "graph-version: 2");
    let resolved =
        resolve_graph_type(&catalog.registry, "x.flow.yaml", &text, &Settings::default()).unwrap();
    assert_eq!(resolved.version, 2);
}
