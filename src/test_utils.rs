//! Shared test utilities for yamlgraph.
//!
//! This module provides fixtures used across multiple test modules.
//! It is only compiled when running tests.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use crate::catalog::builtin_registry;
use crate::registry::GraphType;

/// A flowchart with six nodes and one edge.
pub const FLOWCHART: &str = r#"# Release pipeline
meta:
  title: Release # shown in the header
  graph-version: 1
nodes:
  start:
    label: Start
    type: start
    connections:
      - to: build
        label: go
  build:
    label: Build
    type: process
    owner: ci
  test:
    label: Run tests
    type: process
    tags: [unit, integration]
  review:
    label: Approved?
    type: decision
  publish:
    label: Publish
    type: io
    metadata:
      registry: crates.io
  done:
    label: Done
    type: end
"#;

/// The built-in flowchart graph type.
pub fn flowchart_type() -> Arc<GraphType> {
    builtin_registry()
        .expect("built-in registry loads")
        .get("flowchart", 1)
        .expect("flowchart@1 is built in")
}

/// A `test@1` graph type with an open schema and the given mapping.
pub fn graph_type_with_mapping(mapping: serde_json::Value) -> GraphType {
    GraphType::new(
        "test",
        1,
        vec!["*.test.yaml".to_string()],
        json!({ "type": "object" }),
        serde_json::from_value(mapping).expect("mapping fixture deserializes"),
    )
}

/// Creates a temporary catalog directory for testing.
///
/// Returns a tuple of (TempDir, PathBuf) where:
/// - TempDir: The temp directory handle (must be kept alive for the test duration)
/// - PathBuf: The path to the catalog subdirectory
///
/// Temp directories may be created under hidden paths like `/tmp/.tmpXXXXX`;
/// the non-hidden subdirectory keeps hidden-entry filtering out of the way.
pub fn create_test_catalog_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let catalog_dir = temp_dir.path().join("catalog");
    fs::create_dir(&catalog_dir).expect("Failed to create catalog subdirectory");
    (temp_dir, catalog_dir)
}
