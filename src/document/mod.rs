//! Lossless YAML document editing.
//!
//! A [`ParsedDocument`] holds the raw text, the plain data tree read by
//! `serde_yaml`, and a [`DocumentTree`] that records where every value sits in
//! the text. Range queries read the tree; mutations compute one replacement
//! from it and return the new text. Callers re-parse that text before asking
//! for further ranges, so a document never answers from stale positions.
//!
//! Paths are dot-separated (`nodes.start.label`); numeric segments index
//! sequences (`edges.0.to`); `""` is the document root.
//! There is no escape syntax, so a key that itself contains `.` (such as
//! `v1.2`) cannot be addressed: lookups and edits through it find nothing.

mod cst;
mod edit;
mod render;
mod types;

pub use cst::{
    split_path, Collection, CollectionStyle, DocumentTree, Entry, Item, Node, NodeKind,
    ScalarStyle, Slot,
};
pub use types::{LineRange, Position, SourceRange};

use serde_yaml::Value;

use crate::error::DocumentError;

/// The result of one parse: raw text, data tree, and document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub raw_text: String,
    pub data: Value,
    pub tree: DocumentTree,
}

/// Parses `text`. Empty and comment-only text yields `Null` data.
pub fn parse(text: &str) -> Result<ParsedDocument, DocumentError> {
    if is_blank(text) {
        return Ok(ParsedDocument {
            raw_text: text.to_string(),
            data: Value::Null,
            tree: DocumentTree::default(),
        });
    }

    if serde_yaml::Deserializer::from_str(text).nth(1).is_some() {
        return Err(DocumentError::Unsupported {
            offset: 0,
            message: "multi-document streams are not supported".to_string(),
        });
    }
    let data: Value = serde_yaml::from_str(text).map_err(|err| DocumentError::Yaml(err.to_string()))?;
    let tree = DocumentTree::parse(text)?;

    Ok(ParsedDocument {
        raw_text: text.to_string(),
        data,
        tree,
    })
}

fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

impl ParsedDocument {
    /// Range of the value at `path`, excluding its key.
    pub fn source_range(&self, path: &str) -> Option<SourceRange> {
        let slot = self.tree.locate(path)?;
        Some(slot.value().span.clone().into())
    }

    /// Range of the whole entry at `path`: key and value for mapping entries,
    /// dash and value for sequence items.
    pub fn map_entry_range(&self, path: &str) -> Option<SourceRange> {
        let span = match self.tree.locate(path)? {
            Slot::Root(node) => node.span.clone(),
            Slot::Entry { entry, .. } => entry.span(),
            Slot::Item { item, .. } => item.span(),
        };
        Some(span.into())
    }

    /// The data value at `path`.
    pub fn value_at(&self, path: &str) -> Option<&Value> {
        value_at_path(&self.data, path)
    }
}

/// Reads the plain data tree with the same path syntax the editor uses.
pub fn value_at_path<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = data;
    for segment in split_path(path) {
        current = step(current, segment)?;
    }
    Some(current)
}

fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Mapping(map) => map.get(segment).or_else(|| {
            // numeric keys are stored as numbers in the data tree
            let number: i64 = segment.parse().ok()?;
            map.get(Value::from(number))
        }),
        Value::Sequence(items) => items.get(segment.parse::<usize>().ok()?),
        Value::Tagged(tagged) => step(&tagged.value, segment),
        _ => None,
    }
}
