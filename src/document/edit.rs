//! Structural mutations.
//!
//! Each operation locates its target in the document tree, computes a single
//! replacement `(range, text)` from the spans it finds there, and splices it
//! into a copy of the raw text. Text outside the range is copied through
//! byte-for-byte, which is what keeps comments and formatting intact.

use std::ops::Range;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::cst::{split_path, CollectionStyle, Node, NodeKind, ScalarStyle, Slot};
use super::render;
use super::ParsedDocument;
use crate::error::DocumentError;

const DEFAULT_INDENT: usize = 2;

impl ParsedDocument {
    /// Replaces the value at `path`.
    pub fn edit_value(&self, path: &str, value: &Value) -> Result<String, DocumentError> {
        let slot = self.locate(path)?;
        let (range, text) = self.replacement(slot, value);
        Ok(self.splice(range, &text))
    }

    /// Appends `key: value` to the mapping at `parent_path` (`""` for the root).
    pub fn add_map_entry(
        &self,
        parent_path: &str,
        key: &str,
        value: &Value,
    ) -> Result<String, DocumentError> {
        let indent = self.indent_unit();

        let Some(root) = self.tree.root.as_ref() else {
            if split_path(parent_path).next().is_some() {
                return Err(DocumentError::PathNotFound(parent_path.to_string()));
            }
            let line = format!(
                "{}:{}",
                render::key(&Value::String(key.to_string())),
                render::entry_value(value, 0, indent)
            );
            return Ok(self.append_line(&line));
        };

        let slot = if split_path(parent_path).next().is_none() {
            Slot::Root(root)
        } else {
            self.locate(parent_path)?
        };
        let node = slot.value();

        match &node.kind {
            NodeKind::Map(map) => {
                if map.children.iter().any(|entry| entry.key == key) {
                    return Err(DocumentError::DuplicateKey {
                        parent: parent_path.to_string(),
                        key: key.to_string(),
                    });
                }
                let rendered_key = render::key(&Value::String(key.to_string()));
                match (map.style, map.children.last()) {
                    (CollectionStyle::Block { column }, Some(last)) => {
                        let line = format!(
                            "{}{}:{}",
                            " ".repeat(column),
                            rendered_key,
                            render::entry_value(value, column, indent)
                        );
                        Ok(self.insert_line_after(last.span().end, &line))
                    }
                    (CollectionStyle::Flow, Some(last)) => {
                        let at = last.span().end;
                        let text = format!(", {}: {}", rendered_key, render::flow(value));
                        Ok(self.splice(at..at, &text))
                    }
                    (_, None) => {
                        let mut mapping = Mapping::new();
                        mapping.insert(Value::String(key.to_string()), value.clone());
                        let (range, text) = self.replacement(slot, &Value::Mapping(mapping));
                        Ok(self.splice(range, &text))
                    }
                }
            }
            _ if self.holds_null(node) => {
                let mut mapping = Mapping::new();
                mapping.insert(Value::String(key.to_string()), value.clone());
                let (range, text) = self.replacement(slot, &Value::Mapping(mapping));
                Ok(self.splice(range, &text))
            }
            _ => Err(DocumentError::NotAMap(parent_path.to_string())),
        }
    }

    /// Appends `item` to the sequence at `path`. An empty `[]` (or a null
    /// value) becomes a block sequence holding the item.
    pub fn append_to_sequence(&self, path: &str, item: &Value) -> Result<String, DocumentError> {
        let slot = self.locate(path)?;
        let node = slot.value();

        match &node.kind {
            NodeKind::Seq(seq) => match (seq.style, seq.children.last()) {
                (CollectionStyle::Block { column }, Some(last)) => {
                    let line = format!(
                        "{}{}",
                        " ".repeat(column),
                        render::seq_item(item, column, self.indent_unit())
                    );
                    Ok(self.insert_line_after(last.span().end, &line))
                }
                (CollectionStyle::Flow, Some(last)) => {
                    let at = last.span().end;
                    Ok(self.splice(at..at, &format!(", {}", render::flow(item))))
                }
                (_, None) => {
                    let (range, text) =
                        self.replacement(slot, &Value::Sequence(vec![item.clone()]));
                    Ok(self.splice(range, &text))
                }
            },
            _ if self.holds_null(node) => {
                let (range, text) = self.replacement(slot, &Value::Sequence(vec![item.clone()]));
                Ok(self.splice(range, &text))
            }
            _ => Err(DocumentError::NotASequence(path.to_string())),
        }
    }

    /// Removes the mapping entry or sequence item at `path`.
    pub fn delete_entry(&self, path: &str) -> Result<String, DocumentError> {
        let (parent_path, _) = path.rsplit_once('.').unwrap_or(("", path));
        let (parent, index) = match self.locate(path)? {
            Slot::Root(_) => return Err(DocumentError::PathNotFound(path.to_string())),
            Slot::Entry { parent, index, .. } | Slot::Item { parent, index, .. } => (parent, index),
        };

        let spans: Vec<Range<usize>> = match &parent.kind {
            NodeKind::Map(map) => map.children.iter().map(|entry| entry.span()).collect(),
            NodeKind::Seq(seq) => seq.children.iter().map(|item| item.span()).collect(),
            _ => return Err(DocumentError::PathNotFound(path.to_string())),
        };
        let target = spans[index].clone();

        let range = match parent.style() {
            Some(CollectionStyle::Flow) => {
                if spans.len() == 1 {
                    let empty = if parent.entries().is_some() { "{}" } else { "[]" };
                    return Ok(self.splice(parent.span.clone(), empty));
                }
                if index + 1 < spans.len() {
                    target.start..spans[index + 1].start
                } else {
                    spans[index - 1].end..target.end
                }
            }
            _ if spans.len() == 1 => {
                let parent_slot = if split_path(parent_path).next().is_none() {
                    None
                } else {
                    Some(self.locate(parent_path)?)
                };
                match parent_slot {
                    // keep the collection's type by leaving an empty flow collection
                    Some(slot) => {
                        let empty = match &parent.kind {
                            NodeKind::Map(_) => Value::Mapping(Mapping::new()),
                            _ => Value::Sequence(Vec::new()),
                        };
                        let (range, text) = self.replacement(slot, &empty);
                        return Ok(self.splice(range, &text));
                    }
                    None => self.line_start(target.start)..self.after_line(target.end),
                }
            }
            _ => {
                if self.starts_line(target.start) {
                    self.line_start(target.start)..self.after_line(target.end)
                } else if index + 1 < spans.len() {
                    // first entry of a compact `- key: value` item; pull the next one up
                    target.start..spans[index + 1].start
                } else {
                    target
                }
            }
        };

        debug!(path, ?range, "deleting entry");
        Ok(self.splice(range, ""))
    }

    fn locate(&self, path: &str) -> Result<Slot<'_>, DocumentError> {
        self.tree
            .locate(path)
            .ok_or_else(|| DocumentError::PathNotFound(path.to_string()))
    }

    /// The replacement that turns the value in `slot` into `value`.
    fn replacement(&self, slot: Slot<'_>, value: &Value) -> (Range<usize>, String) {
        let node = slot.value();
        let indent = self.indent_unit();
        let preferred = match node.kind {
            NodeKind::Scalar(style @ (ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)) => {
                Some(style)
            }
            _ => None,
        };

        let parent_is_flow = match slot {
            Slot::Entry { parent, .. } | Slot::Item { parent, .. } => {
                parent.style() == Some(CollectionStyle::Flow)
            }
            Slot::Root(_) => false,
        };
        if parent_is_flow {
            let text = render::flow(value);
            return match node.kind {
                NodeKind::Null => (node.span.clone(), format!(" {text}")),
                _ => (node.span.clone(), text),
            };
        }

        // offset just past the `:` or `-` that introduces the value
        let indicator_end = match slot {
            Slot::Entry { entry, .. } => Some(entry.colon_end),
            Slot::Item { item, .. } => Some(item.start + 1),
            Slot::Root(_) => None,
        };

        match (render::inline(value, preferred), indicator_end) {
            (Some(text), Some(at)) if node.kind == NodeKind::Null => (at..at, format!(" {text}")),
            (Some(text), Some(at)) if node.is_block_collection() => {
                // comments between the indicator and the old block stay on the line
                let between = self.raw_text[at..node.span.start].trim();
                let text = if between.is_empty() {
                    format!(" {text}")
                } else {
                    format!(" {text} {between}")
                };
                (at..node.span.end, text)
            }
            (Some(text), _) => (node.span.clone(), text),
            (None, _) if node.is_block_collection() => {
                let column = self.column(node.span.start);
                (node.span.clone(), render::body(value, column, indent))
            }
            (None, Some(at)) => match slot {
                Slot::Entry { entry, .. } => {
                    let key_column = self.column(entry.key_span.start);
                    (
                        at..node.span.end,
                        render::entry_value(value, key_column, indent),
                    )
                }
                _ => {
                    let column = self.column(at) + 1;
                    (at..node.span.end, format!(" {}", render::body(value, column, indent)))
                }
            },
            (None, None) => {
                let column = self.column(node.span.start);
                (node.span.clone(), render::body(value, column, indent))
            }
        }
    }

    /// True for an absent value and for explicit `null`/`~` scalars.
    fn holds_null(&self, node: &Node) -> bool {
        match node.kind {
            NodeKind::Null => true,
            NodeKind::Scalar(ScalarStyle::Plain) => {
                matches!(&self.raw_text[node.span.clone()], "null" | "Null" | "NULL" | "~")
            }
            _ => false,
        }
    }

    /// Indentation step used by the document, detected from the first block
    /// collection nested under a mapping key.
    fn indent_unit(&self) -> usize {
        fn detect(doc: &ParsedDocument, node: &Node) -> Option<usize> {
            match &node.kind {
                NodeKind::Map(map) => map.children.iter().find_map(|entry| {
                    let key_column = doc.column(entry.key_span.start);
                    match entry.value.style() {
                        Some(CollectionStyle::Block { column }) if column > key_column => {
                            Some(column - key_column)
                        }
                        _ => detect(doc, &entry.value),
                    }
                }),
                NodeKind::Seq(seq) => seq.children.iter().find_map(|item| detect(doc, &item.value)),
                _ => None,
            }
        }

        self.tree
            .root
            .as_ref()
            .and_then(|root| detect(self, root))
            .unwrap_or(DEFAULT_INDENT)
    }

    fn line_start(&self, offset: usize) -> usize {
        self.raw_text[..offset].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Offset just past the line break ending the line that contains `offset`.
    fn after_line(&self, offset: usize) -> usize {
        self.raw_text[offset..]
            .find('\n')
            .map_or(self.raw_text.len(), |i| offset + i + 1)
    }

    fn column(&self, offset: usize) -> usize {
        offset - self.line_start(offset)
    }

    fn starts_line(&self, offset: usize) -> bool {
        self.raw_text[self.line_start(offset)..offset]
            .chars()
            .all(|c| c == ' ' || c == '\t')
    }

    /// Inserts `line` as a new line after the line containing `offset`.
    fn insert_line_after(&self, offset: usize, line: &str) -> String {
        let at = self.after_line(offset);
        if at == self.raw_text.len() && !self.raw_text.ends_with('\n') {
            self.splice(at..at, &format!("\n{line}"))
        } else {
            self.splice(at..at, &format!("{line}\n"))
        }
    }

    fn append_line(&self, line: &str) -> String {
        let at = self.raw_text.len();
        if at > 0 && !self.raw_text.ends_with('\n') {
            self.splice(at..at, &format!("\n{line}\n"))
        } else {
            self.splice(at..at, &format!("{line}\n"))
        }
    }

    /// The document's line break, taken from its first line.
    fn line_break(&self) -> &'static str {
        match self.raw_text.find('\n') {
            Some(i) if self.raw_text[..i].ends_with('\r') => "\r\n",
            _ => "\n",
        }
    }

    /// Copies the text with `range` replaced. Line breaks in `replacement`
    /// follow the document's.
    fn splice(&self, range: Range<usize>, replacement: &str) -> String {
        let converted;
        let replacement = match self.line_break() {
            "\n" => replacement,
            line_break => {
                converted = replacement.replace("\r\n", "\n").replace('\n', line_break);
                converted.as_str()
            }
        };
        let mut text = String::with_capacity(self.raw_text.len() + replacement.len());
        text.push_str(&self.raw_text[..range.start]);
        text.push_str(replacement);
        text.push_str(&self.raw_text[range.end..]);
        text
    }
}

#[cfg(test)]
mod tests {
    use crate::document::parse;
    use serde_yaml::Value;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    const DOC: &str = r#"# graph header
meta:
  title: Demo # inline note
  graph-version: 1

nodes:
  # the entry point
  start:
    label: 'Start'
    type: start
  end:
    label: End
edges:
  - from: start
    to: end # only edge
"#;

    // ========================================================================
    // edit_value
    // ========================================================================

    #[test]
    fn test_edit_scalar_preserves_comments_and_quotes() {
        let doc = parse(DOC).unwrap();
        let text = doc
            .edit_value("nodes.start.label", &Value::String("Begin".into()))
            .unwrap();

        assert!(text.contains("    label: 'Begin'\n"));
        assert!(text.contains("# the entry point"));
        assert!(text.contains("title: Demo # inline note"));
        assert_eq!(text.len(), DOC.len());
    }

    #[test]
    fn test_edit_value_renders_types() {
        let doc = parse(DOC).unwrap();

        let text = doc.edit_value("meta.graph-version", &yaml("2")).unwrap();
        assert!(text.contains("graph-version: 2\n"));

        let text = doc.edit_value("meta.title", &Value::Bool(true)).unwrap();
        assert!(text.contains("title: true # inline note"));

        let text = doc.edit_value("meta.title", &Value::Null).unwrap();
        assert_eq!(parse(&text).unwrap().value_at("meta.title"), Some(&Value::Null));

        let text = doc.edit_value("meta.title", &Value::String("42".into())).unwrap();
        assert_eq!(
            parse(&text).unwrap().value_at("meta.title"),
            Some(&Value::String("42".into()))
        );
    }

    #[test]
    fn test_edit_block_value_to_scalar_and_back() {
        let doc = parse(DOC).unwrap();
        let text = doc.edit_value("nodes.end", &Value::String("gone".into())).unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.value_at("nodes.end").and_then(Value::as_str), Some("gone"));
        assert_eq!(reparsed.value_at("edges.0.to").and_then(Value::as_str), Some("end"));

        let text = reparsed
            .edit_value("nodes.end", &yaml("label: Finish\ntype: end"))
            .unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(
            reparsed.value_at("nodes.end.type").and_then(Value::as_str),
            Some("end")
        );
    }

    #[test]
    fn test_edit_missing_path_is_an_error() {
        let doc = parse(DOC).unwrap();
        assert!(doc.edit_value("nodes.nope.label", &Value::Null).is_err());
    }

    // ========================================================================
    // add_map_entry
    // ========================================================================

    #[test]
    fn test_add_map_entry_to_nested_block_map() {
        let doc = parse(DOC).unwrap();
        let text = doc
            .add_map_entry("nodes.end", "type", &Value::String("end".into()))
            .unwrap();

        assert!(text.contains("  end:\n    label: End\n    type: end\nedges:"));
        let reparsed = parse(&text).unwrap();
        assert_eq!(
            reparsed.value_at("nodes.end.type").and_then(Value::as_str),
            Some("end")
        );
    }

    #[test]
    fn test_add_map_entry_at_root_and_with_block_value() {
        let doc = parse(DOC).unwrap();
        let text = doc
            .add_map_entry("", "styles", &yaml("start: fill:#f9f"))
            .unwrap();

        assert!(text.ends_with("    to: end # only edge\nstyles:\n  start: fill:#f9f\n"));
        let reparsed = parse(&text).unwrap();
        assert_eq!(
            reparsed.value_at("styles.start").and_then(Value::as_str),
            Some("fill:#f9f")
        );
    }

    #[test]
    fn test_add_map_entry_to_empty_flow_map() {
        let doc = parse("meta: {} # none\n").unwrap();
        let text = doc.add_map_entry("meta", "title", &yaml("Demo")).unwrap();
        assert_eq!(text, "meta:\n  title: Demo # none\n");
    }

    #[test]
    fn test_add_map_entry_to_empty_document() {
        let doc = parse("# fresh file\n").unwrap();
        let text = doc.add_map_entry("", "nodes", &yaml("{}")).unwrap();
        assert_eq!(text, "# fresh file\nnodes: {}\n");
    }

    #[test]
    fn test_add_duplicate_key_is_rejected() {
        let doc = parse(DOC).unwrap();
        assert!(doc.add_map_entry("nodes", "start", &Value::Null).is_err());
        assert!(doc.add_map_entry("meta.title", "x", &Value::Null).is_err());
    }

    // ========================================================================
    // append_to_sequence
    // ========================================================================

    #[test]
    fn test_append_to_block_sequence() {
        let doc = parse(DOC).unwrap();
        let text = doc
            .append_to_sequence("edges", &yaml("from: end\nto: start"))
            .unwrap();

        assert!(text.ends_with("    to: end # only edge\n  - from: end\n    to: start\n"));
        let reparsed = parse(&text).unwrap();
        assert_eq!(
            reparsed.value_at("edges.1.from").and_then(Value::as_str),
            Some("end")
        );
    }

    #[test]
    fn test_append_to_empty_flow_sequence_becomes_block() {
        let doc = parse("nodes: {}\nedges: []\n").unwrap();
        let text = doc
            .append_to_sequence("edges", &yaml("from: a\nto: b"))
            .unwrap();

        assert_eq!(text, "nodes: {}\nedges:\n  - from: a\n    to: b\n");
    }

    #[test]
    fn test_append_to_populated_flow_sequence() {
        let doc = parse("tags: [a, b]\n").unwrap();
        let text = doc.append_to_sequence("tags", &yaml("c d")).unwrap();
        assert_eq!(text, "tags: [a, b, c d]\n");
    }

    #[test]
    fn test_append_to_non_sequence_fails() {
        let doc = parse(DOC).unwrap();
        assert!(doc.append_to_sequence("meta", &Value::Null).is_err());
    }

    // ========================================================================
    // delete_entry
    // ========================================================================

    #[test]
    fn test_delete_map_entry_keeps_neighbours() {
        let doc = parse(DOC).unwrap();
        let text = doc.delete_entry("nodes.start").unwrap();

        assert!(text.contains("  # the entry point\n  end:\n"));
        assert!(!text.contains("label: 'Start'"));
        let reparsed = parse(&text).unwrap();
        assert!(reparsed.value_at("nodes.start").is_none());
        assert!(reparsed.value_at("nodes.end").is_some());
    }

    #[test]
    fn test_delete_last_sequence_item_leaves_empty_sequence() {
        let doc = parse(DOC).unwrap();
        let text = doc.delete_entry("edges.0").unwrap();

        assert!(text.ends_with("edges: [] # only edge\n"));
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.value_at("edges"), Some(&Value::Sequence(vec![])));
    }

    #[test]
    fn test_delete_first_key_of_compact_item() {
        let doc = parse(DOC).unwrap();
        let text = doc.delete_entry("edges.0.from").unwrap();
        assert!(text.contains("  - to: end # only edge\n"));
    }

    #[test]
    fn test_delete_from_flow_collections() {
        let doc = parse("tags: [a, b, c]\nmeta: {x: 1}\n").unwrap();
        assert_eq!(doc.delete_entry("tags.1").unwrap(), "tags: [a, c]\nmeta: {x: 1}\n");
        assert_eq!(doc.delete_entry("tags.2").unwrap(), "tags: [a, b]\nmeta: {x: 1}\n");
        assert_eq!(doc.delete_entry("meta.x").unwrap(), "tags: [a, b, c]\nmeta: {}\n");
    }

    #[test]
    fn test_sequence_items_shift_after_delete() {
        let doc = parse("items:\n  - a\n  - b\n  - c\n").unwrap();
        let text = doc.delete_entry("items.0").unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.value_at("items.0").and_then(Value::as_str), Some("b"));
        assert_eq!(
            reparsed.source_range("items.1").and_then(|r| r.slice(&text).map(str::to_string)),
            Some("c".to_string())
        );
    }

    // ========================================================================
    // Line breaks
    // ========================================================================

    fn only_crlf(text: &str) -> bool {
        text.match_indices('\n').all(|(i, _)| text[..i].ends_with('\r'))
    }

    #[test]
    fn test_crlf_documents_keep_crlf_line_breaks() {
        let doc = parse("a: 1\r\nb:\r\n  c: 2\r\n").unwrap();

        let text = doc.add_map_entry("b", "d", &yaml("3")).unwrap();
        assert_eq!(text, "a: 1\r\nb:\r\n  c: 2\r\n  d: 3\r\n");

        let text = doc.add_map_entry("", "e", &yaml("x: 1\ny: [2]")).unwrap();
        assert!(only_crlf(&text), "{text:?}");
        assert_eq!(parse(&text).unwrap().value_at("e.x").and_then(Value::as_i64), Some(1));

        let text = doc.edit_value("b", &yaml("c: 2\nd: 4")).unwrap();
        assert!(only_crlf(&text), "{text:?}");
    }

    #[test]
    fn test_crlf_sequence_append_and_missing_final_break() {
        let doc = parse("items:\r\n  - a\r\n  - b").unwrap();
        let text = doc.append_to_sequence("items", &yaml("c")).unwrap();
        assert_eq!(text, "items:\r\n  - a\r\n  - b\r\n  - c");

        let doc = parse("# fresh\r\n").unwrap();
        let text = doc.add_map_entry("", "nodes", &yaml("{}")).unwrap();
        assert_eq!(text, "# fresh\r\nnodes: {}\r\n");
    }

    #[test]
    fn test_lf_documents_are_untouched_by_line_break_handling() {
        let doc = parse("a: 1\nb:\n  c: 2\n").unwrap();
        let text = doc.add_map_entry("b", "d", &yaml("3")).unwrap();
        assert_eq!(text, "a: 1\nb:\n  c: 2\n  d: 3\n");
    }
}
