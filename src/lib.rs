//! yamlgraph: typed, versioned graph documents written in YAML
//!
//! This crate edits graph description documents losslessly, validates them
//! against per-type JSON schemas, and compiles them into Mermaid flowcharts
//! while keeping enough position information to sync a tree view, a diagram
//! renderer and the text editor.
//!
//! # Overview
//!
//! - **Registry**: graph types matched to file patterns, many versions per type
//! - **Document editing**: point, map and sequence edits that keep comments and formatting
//! - **Schema resolution**: `$ref` following and field metadata for node editor forms
//! - **Conversion**: mapping-driven Mermaid output that tolerates invalid data
//! - **Tree and selection**: display hierarchy and the messages that keep views in sync
//!
//! # Architecture
//!
//! - [`document`]: parsing, range lookup and lossless mutation
//! - [`schema`]: reference resolution, field schemas and validation
//! - [`registry`] and [`mapping`]: graph types and how they render
//! - [`convert`]: the conversion engine and its host hooks
//! - [`tree`] and [`selection`]: projections for the host UI
//! - [`version`], [`catalog`] and [`config`]: picking and loading graph types
//!
//! # Usage
//!
//! ```ignore
//! use yamlgraph::catalog::builtin_registry;
//! use yamlgraph::config::Settings;
//! use yamlgraph::convert::convert;
//! use yamlgraph::version::resolve_graph_type;
//!
//! let registry = builtin_registry()?;
//! let graph_type = resolve_graph_type(&registry, "release.flow.yaml", &text, &Settings::default())?;
//! let result = convert(&text, &graph_type);
//! println!("{}", result.mermaid_source);
//! ```

// Core modules
pub mod document;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod schema;

// Projections
pub mod convert;
pub mod selection;
pub mod tree;

// Configuration and loading
pub mod catalog;
pub mod config;
pub mod version;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
