//! Graph type catalogs: the built-in set and directories of
//! `*.graphtype.{yaml,yml,json}` files.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::registry::{GraphType, GraphTypeRegistry};

const FLOWCHART: &str = include_str!("../graph-types/flowchart.graphtype.yaml");

const SUFFIXES: [&str; 3] = [".graphtype.yaml", ".graphtype.yml", ".graphtype.json"];

/// Parses one graph type definition. JSON files are read as JSON, anything
/// else as YAML. The schema is compiled so that a broken schema fails here
/// rather than on first conversion.
pub fn parse_graph_type(text: &str, path: &Path) -> anyhow::Result<GraphType> {
    let graph_type: GraphType = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(text)?,
        _ => serde_yaml::from_str(text)?,
    };
    graph_type
        .validator()
        .map_err(|message| anyhow!("schema of '{}' does not compile: {message}", graph_type.id))?;
    Ok(graph_type)
}

pub fn builtin_graph_types() -> anyhow::Result<Vec<GraphType>> {
    let flowchart = parse_graph_type(FLOWCHART, Path::new("flowchart.graphtype.yaml"))
        .context("built-in flowchart graph type")?;
    Ok(vec![flowchart])
}

/// A registry holding the built-in graph types.
pub fn builtin_registry() -> anyhow::Result<GraphTypeRegistry> {
    let mut registry = GraphTypeRegistry::new();
    for graph_type in builtin_graph_types()? {
        registry.register(graph_type)?;
    }
    Ok(registry)
}

/// A file that could not be loaded or registered.
#[derive(Debug)]
pub struct CatalogFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

#[derive(Debug)]
pub struct Catalog {
    pub registry: GraphTypeRegistry,
    pub failures: Vec<CatalogFailure>,
}

fn is_graph_type_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
}

/// Loads every graph type file under `dir` on top of the built-in set.
/// Files are registered in path order; a file that fails to parse or
/// register is reported in [`Catalog::failures`] and the rest still load.
pub fn load_catalog(dir: &Path) -> anyhow::Result<Catalog> {
    if !dir.is_dir() {
        return Err(anyhow!("'{}' is not a directory", dir.display()));
    }

    let paths = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
        })
        .flatten()
        .filter(|e| e.file_type().is_file() && is_graph_type_file(e.path()))
        .map(|e| e.into_path())
        .sorted()
        .collect_vec();

    let parsed: Vec<(PathBuf, anyhow::Result<GraphType>)> = paths
        .par_iter()
        .map(|path| {
            let result = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))
                .and_then(|text| parse_graph_type(&text, path));
            (path.clone(), result)
        })
        .collect();

    let mut registry = builtin_registry()?;
    let mut failures = Vec::new();
    for (path, result) in parsed {
        match result.and_then(|graph_type| Ok(registry.register(graph_type)?)) {
            Ok(graph_type) => {
                debug!(path = %path.display(), key = graph_type.version_key(), "loaded graph type")
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping graph type file");
                failures.push(CatalogFailure { path, error });
            }
        }
    }

    Ok(Catalog { registry, failures })
}
