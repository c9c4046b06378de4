//! Graph type registry.
//!
//! Holds every registered `(id, version)` pair and answers "which graph type
//! governs this file". A file pattern belongs to exactly one graph type id;
//! versions of that id share it, and the highest version is the pattern's
//! default.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::RegistryError;
use crate::mapping::Mapping;
use crate::schema::GraphSchema;

/// One supported document flavor at one version.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphType {
    pub id: String,
    pub version: u32,
    pub file_patterns: Vec<String>,
    pub schema: JsonValue,
    pub mapping: Mapping,
    #[serde(skip)]
    compiled: OnceCell<Result<GraphSchema, String>>,
}

impl GraphType {
    pub fn new(
        id: impl Into<String>,
        version: u32,
        file_patterns: Vec<String>,
        schema: JsonValue,
        mapping: Mapping,
    ) -> Self {
        GraphType {
            id: id.into(),
            version,
            file_patterns,
            schema,
            mapping,
            compiled: OnceCell::new(),
        }
    }

    /// `id@version`
    pub fn version_key(&self) -> String {
        version_key(&self.id, self.version)
    }

    /// The compiled schema, built on first use.
    pub fn validator(&self) -> Result<&GraphSchema, &str> {
        self.compiled
            .get_or_init(|| GraphSchema::compile(&self.schema))
            .as_ref()
            .map_err(String::as_str)
    }
}

pub fn version_key(id: &str, version: u32) -> String {
    format!("{id}@{version}")
}

struct PatternMatcher {
    pattern: String,
    owner: String,
    regex: Regex,
}

#[derive(Default)]
pub struct GraphTypeRegistry {
    /// Registration order.
    types: Vec<Arc<GraphType>>,
    by_key: HashMap<String, Arc<GraphType>>,
    matchers: Vec<PatternMatcher>,
    /// Pattern to its highest registered version.
    defaults: HashMap<String, Arc<GraphType>>,
}

impl std::fmt::Debug for GraphTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphTypeRegistry")
            .field("types", &self.list_version_keys())
            .finish()
    }
}

impl GraphTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `graph_type`. Nothing changes when it fails.
    pub fn register(&mut self, graph_type: GraphType) -> Result<Arc<GraphType>, RegistryError> {
        for pattern in &graph_type.file_patterns {
            if let Some(owner) = self.owner_of(pattern) {
                if owner != graph_type.id {
                    return Err(RegistryError::TypeConflict {
                        new_id: graph_type.id.clone(),
                        existing_id: owner.to_string(),
                        pattern: pattern.clone(),
                    });
                }
            }
        }

        let mut compiled = Vec::with_capacity(graph_type.file_patterns.len());
        for pattern in &graph_type.file_patterns {
            let regex = glob_to_regex(pattern).map_err(|message| RegistryError::InvalidPattern {
                id: graph_type.id.clone(),
                pattern: pattern.clone(),
                message,
            })?;
            compiled.push((pattern.clone(), regex));
        }

        let graph_type = Arc::new(graph_type);
        let key = graph_type.version_key();
        match self.types.iter().position(|existing| existing.version_key() == key) {
            Some(index) => {
                debug!(key, "replacing registered graph type");
                self.types[index] = Arc::clone(&graph_type);
            }
            None => {
                debug!(key, patterns = ?graph_type.file_patterns, "registering graph type");
                self.types.push(Arc::clone(&graph_type));
            }
        }
        self.by_key.insert(key, Arc::clone(&graph_type));

        for (pattern, regex) in compiled {
            if self.owner_of(&pattern).is_none() {
                self.matchers.push(PatternMatcher {
                    pattern,
                    owner: graph_type.id.clone(),
                    regex,
                });
            }
        }
        self.rebuild_defaults();

        Ok(graph_type)
    }

    fn owner_of(&self, pattern: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|matcher| matcher.pattern == pattern)
            .map(|matcher| matcher.owner.as_str())
    }

    fn rebuild_defaults(&mut self) {
        let mut defaults: HashMap<String, Arc<GraphType>> = HashMap::new();
        for graph_type in &self.types {
            for pattern in &graph_type.file_patterns {
                let replace = defaults
                    .get(pattern)
                    .map_or(true, |current| current.version <= graph_type.version);
                if replace {
                    defaults.insert(pattern.clone(), Arc::clone(graph_type));
                }
            }
        }
        for (pattern, graph_type) in &defaults {
            let changed = self
                .defaults
                .get(pattern)
                .map_or(true, |previous| !Arc::ptr_eq(previous, graph_type));
            if changed {
                debug!(pattern, key = graph_type.version_key(), "pattern default changed");
            }
        }
        self.defaults = defaults;
    }

    /// Patterns matching `file_name`, most specific (longest) first.
    fn matching_patterns<'r>(&'r self, file_name: &str) -> Vec<&'r PatternMatcher> {
        let normalized = file_name.replace('\\', "/");
        self.matchers
            .iter()
            .filter(|matcher| matcher.regex.is_match(&normalized))
            .sorted_by(|a, b| b.pattern.len().cmp(&a.pattern.len()))
            .collect()
    }

    /// Highest-version graph type whose pattern matches `file_name`.
    pub fn get_for_file(&self, file_name: &str) -> Option<Arc<GraphType>> {
        self.matching_patterns(file_name)
            .into_iter()
            .find_map(|matcher| self.defaults.get(&matcher.pattern))
            .cloned()
    }

    /// Exactly `version` of the graph type that owns the most specific
    /// pattern matching `file_name`. Less specific patterns owned by other
    /// ids are never consulted.
    pub fn get_for_file_version(&self, file_name: &str, version: u32) -> Option<Arc<GraphType>> {
        let matching = self.matching_patterns(file_name);
        let owner = matching.first()?.owner.as_str();
        self.types
            .iter()
            .find(|graph_type| {
                graph_type.id == owner
                    && graph_type.version == version
                    && matching
                        .iter()
                        .any(|matcher| graph_type.file_patterns.contains(&matcher.pattern))
            })
            .cloned()
    }

    pub fn get(&self, id: &str, version: u32) -> Option<Arc<GraphType>> {
        self.get_by_version_key(&version_key(id, version))
    }

    /// Highest registered version of `id`.
    pub fn latest(&self, id: &str) -> Option<Arc<GraphType>> {
        self.types
            .iter()
            .filter(|graph_type| graph_type.id == id)
            .max_by_key(|graph_type| graph_type.version)
            .cloned()
    }

    /// Looks up `id@version`.
    pub fn get_by_version_key(&self, key: &str) -> Option<Arc<GraphType>> {
        self.by_key.get(key).cloned()
    }

    /// Every `id@version` key, in registration order.
    pub fn list_version_keys(&self) -> Vec<String> {
        self.types.iter().map(|graph_type| graph_type.version_key()).collect()
    }

    /// Every registered graph type, in registration order.
    pub fn get_all(&self) -> &[Arc<GraphType>] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Compiles a file glob: `*` and `?` stay inside one path segment, `**`
/// crosses segments. The pattern may match any path suffix that starts at a
/// segment boundary.
fn glob_to_regex(pattern: &str) -> Result<Regex, String> {
    if pattern.trim().is_empty() {
        return Err("pattern is empty".to_string());
    }
    let mut source = String::from("(?:^|/)");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if matches!(chars.peek(), Some('/') | Some('\\')) {
                    chars.next();
                    source.push_str("(?:.*/)?");
                } else {
                    source.push_str(".*");
                }
            }
            '*' => source.push_str("[^/]*"),
            '?' => source.push_str("[^/]"),
            '\\' | '/' => source.push('/'),
            c => source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping() -> Mapping {
        serde_json::from_value(json!({ "nodeShapes": { "sourcePath": "nodes" } })).unwrap()
    }

    fn graph_type(id: &str, version: u32, patterns: &[&str]) -> GraphType {
        GraphType::new(
            id,
            version,
            patterns.iter().map(|p| p.to_string()).collect(),
            json!({ "type": "object" }),
            mapping(),
        )
    }

    // ========================================================================
    // register
    // ========================================================================

    #[test]
    fn test_conflicting_pattern_is_rejected() {
        let mut registry = GraphTypeRegistry::new();
        registry
            .register(graph_type("flowchart", 1, &["*.flow.yaml"]))
            .unwrap();

        let err = registry
            .register(graph_type("sequence", 1, &["*.seq.yaml", "*.flow.yaml"]))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::TypeConflict {
                new_id: "sequence".into(),
                existing_id: "flowchart".into(),
                pattern: "*.flow.yaml".into(),
            }
        );
        // nothing from the failed registration leaked in
        assert!(registry.get_for_file("a.seq.yaml").is_none());
        assert_eq!(registry.list_version_keys(), vec!["flowchart@1"]);
    }

    #[test]
    fn test_new_version_of_same_id_does_not_conflict() {
        let mut registry = GraphTypeRegistry::new();
        registry
            .register(graph_type("flowchart", 1, &["*.flow.yaml"]))
            .unwrap();
        registry
            .register(graph_type("flowchart", 2, &["*.flow.yaml"]))
            .unwrap();

        assert_eq!(registry.list_version_keys(), vec!["flowchart@1", "flowchart@2"]);
        assert_eq!(registry.get_for_file("a.flow.yaml").unwrap().version, 2);
        assert_eq!(
            registry.get_for_file_version("a.flow.yaml", 1).unwrap().version,
            1
        );
        assert!(registry.get_for_file_version("a.flow.yaml", 3).is_none());
    }

    #[test]
    fn test_default_keeps_highest_version_regardless_of_order() {
        let mut registry = GraphTypeRegistry::new();
        registry
            .register(graph_type("flowchart", 3, &["*.flow.yaml"]))
            .unwrap();
        registry
            .register(graph_type("flowchart", 1, &["*.flow.yaml"]))
            .unwrap();
        assert_eq!(registry.get_for_file("x.flow.yaml").unwrap().version, 3);
        assert_eq!(registry.latest("flowchart").unwrap().version, 3);
    }

    #[test]
    fn test_same_version_replaces_entry() {
        let mut registry = GraphTypeRegistry::new();
        registry
            .register(graph_type("flowchart", 1, &["*.flow.yaml"]))
            .unwrap();
        registry
            .register(graph_type("flowchart", 1, &["*.flow.yaml", "*.fc.yaml"]))
            .unwrap();

        assert_eq!(registry.get_all().len(), 1);
        assert!(registry.get_for_file("a.fc.yaml").is_some());
        assert_eq!(
            registry.get_by_version_key("flowchart@1").unwrap().file_patterns.len(),
            2
        );
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let mut registry = GraphTypeRegistry::new();
        let err = registry
            .register(graph_type("broken", 1, &["*.ok.yaml", " "]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern { .. }), "{err:?}");
        assert!(registry.is_empty());
    }

    // ========================================================================
    // matching
    // ========================================================================

    #[test]
    fn test_patterns_tolerate_path_prefixes() {
        let mut registry = GraphTypeRegistry::new();
        registry
            .register(graph_type("flowchart", 1, &["*.flow.yaml"]))
            .unwrap();

        assert!(registry.get_for_file("demo.flow.yaml").is_some());
        assert!(registry.get_for_file("/home/me/docs/demo.flow.yaml").is_some());
        assert!(registry.get_for_file(r"C:\docs\demo.flow.yaml").is_some());
        assert!(registry.get_for_file("demo.flow.yaml.bak").is_none());
        assert!(registry.get_for_file("demo.yaml").is_none());
    }

    #[test]
    fn test_most_specific_pattern_wins() {
        let mut registry = GraphTypeRegistry::new();
        registry.register(graph_type("generic", 1, &["*.yaml"])).unwrap();
        registry
            .register(graph_type("flowchart", 1, &["*.flow.yaml"]))
            .unwrap();

        assert_eq!(registry.get_for_file("a.flow.yaml").unwrap().id, "flowchart");
        assert_eq!(registry.get_for_file("a.yaml").unwrap().id, "generic");
    }

    #[test]
    fn test_version_lookup_stays_with_most_specific_owner() {
        let mut registry = GraphTypeRegistry::new();
        registry.register(graph_type("generic", 1, &["*.yaml"])).unwrap();
        registry
            .register(graph_type("flowchart", 2, &["*.flow.yaml"]))
            .unwrap();

        assert_eq!(registry.get_for_file("a.flow.yaml").unwrap().version_key(), "flowchart@2");
        assert!(registry.get_for_file_version("a.flow.yaml", 1).is_none());
        assert_eq!(
            registry.get_for_file_version("a.flow.yaml", 2).unwrap().version_key(),
            "flowchart@2"
        );
        assert_eq!(
            registry.get_for_file_version("a.yaml", 1).unwrap().version_key(),
            "generic@1"
        );
    }

    #[test]
    fn test_glob_segments() {
        let single = glob_to_regex("graphs/*.yaml").unwrap();
        assert!(single.is_match("repo/graphs/a.yaml"));
        assert!(!single.is_match("repo/graphs/nested/a.yaml"));

        let deep = glob_to_regex("graphs/**/*.yaml").unwrap();
        assert!(deep.is_match("graphs/a.yaml"));
        assert!(deep.is_match("graphs/nested/more/a.yaml"));

        let one = glob_to_regex("v?.yaml").unwrap();
        assert!(one.is_match("v1.yaml"));
        assert!(!one.is_match("v10.yaml"));
    }

    #[test]
    fn test_validator_is_compiled_once() {
        let flow = graph_type("flowchart", 1, &["*.flow.yaml"]);
        let first = flow.validator().unwrap() as *const GraphSchema;
        let second = flow.validator().unwrap() as *const GraphSchema;
        assert_eq!(first, second);
    }
}
