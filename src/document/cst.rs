//! Format-preserving document tree.
//!
//! The plain data tree comes from `serde_yaml`; this module only recovers
//! *where* every key, value, and sequence item sits in the raw text so that
//! edits can splice new text into exactly one span and copy everything else
//! (comments, blank lines, quoting, indentation) through untouched.
//!
//! Supported: block mappings and sequences (including compact `- key: value`
//! items and sequences indented at their parent key's column), flow
//! collections, plain/quoted/multi-line scalars, literal and folded block
//! scalars, anchors and tags as value prefixes, comments, and document
//! markers. Explicit `?` keys are rejected with
//! [`DocumentError::Unsupported`].

use std::ops::Range;

use crate::error::DocumentError;

/// A node of the document tree with the byte span of its value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub span: Range<usize>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// No value text at all (`key:` or a bare `-`). The span is empty and
    /// sits right after the indicator.
    Null,
    Scalar(ScalarStyle),
    Map(Collection<Entry>),
    Seq(Collection<Item>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStyle {
    /// Block collection whose keys or dashes start at `column`.
    Block { column: usize },
    Flow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection<T> {
    pub style: CollectionStyle,
    pub children: Vec<T>,
}

/// One `key: value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub key_span: Range<usize>,
    /// Offset just past the `:` indicator (or past the key for a flow key
    /// without a value).
    pub colon_end: usize,
    pub value: Node,
}

impl Entry {
    /// Key through the end of the value.
    pub fn span(&self) -> Range<usize> {
        self.key_span.start..self.value.span.end.max(self.colon_end)
    }
}

/// One sequence item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Offset of the `-` indicator for block items, of the value for flow items.
    pub start: usize,
    pub value: Node,
}

impl Item {
    pub fn span(&self) -> Range<usize> {
        self.start..self.value.span.end.max(self.start + 1)
    }
}

impl Node {
    pub fn entries(&self) -> Option<&[Entry]> {
        match &self.kind {
            NodeKind::Map(map) => Some(&map.children),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Item]> {
        match &self.kind {
            NodeKind::Seq(seq) => Some(&seq.children),
            _ => None,
        }
    }

    pub fn style(&self) -> Option<CollectionStyle> {
        match &self.kind {
            NodeKind::Map(map) => Some(map.style),
            NodeKind::Seq(seq) => Some(seq.style),
            _ => None,
        }
    }

    pub fn is_block_collection(&self) -> bool {
        matches!(self.style(), Some(CollectionStyle::Block { .. }))
    }
}

/// Where a path landed in the tree, with enough context to edit around it.
#[derive(Debug, Clone, Copy)]
pub enum Slot<'t> {
    Root(&'t Node),
    Entry {
        parent: &'t Node,
        index: usize,
        entry: &'t Entry,
    },
    Item {
        parent: &'t Node,
        index: usize,
        item: &'t Item,
    },
}

impl<'t> Slot<'t> {
    pub fn value(&self) -> &'t Node {
        match self {
            Slot::Root(node) => node,
            Slot::Entry { entry, .. } => &entry.value,
            Slot::Item { item, .. } => &item.value,
        }
    }
}

/// The format-preserving parse result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentTree {
    /// `None` for documents without any content lines.
    pub root: Option<Node>,
}

impl DocumentTree {
    /// Parses `text`. The text is expected to be valid YAML already (the
    /// caller checks it with `serde_yaml`), so errors here mean the document
    /// uses a construct the tree does not model.
    pub fn parse(text: &str) -> Result<DocumentTree, DocumentError> {
        let parser = Parser::new(text)?;
        let Some(first) = parser.next_content(0) else {
            return Ok(DocumentTree { root: None });
        };

        let column = parser.lines[first].indent;
        let root = parser.parse_block_at(first, column, -1)?;

        let last_line = parser.line_of(root.span.end);
        if let Some(extra) = parser.next_content(last_line + 1) {
            return Err(parser.unsupported(
                parser.lines[extra].content_start(),
                "content outside the root node",
            ));
        }

        Ok(DocumentTree { root: Some(root) })
    }

    /// Resolves a dotted path. `""` is the root; numeric segments index
    /// sequences and are plain keys inside mappings.
    pub fn locate(&self, path: &str) -> Option<Slot<'_>> {
        let root = self.root.as_ref()?;
        let mut slot = Slot::Root(root);

        for segment in split_path(path) {
            let parent = slot.value();
            slot = match &parent.kind {
                NodeKind::Map(map) => {
                    let (index, entry) = map
                        .children
                        .iter()
                        .enumerate()
                        .find(|(_, entry)| entry.key == segment)?;
                    Slot::Entry {
                        parent,
                        index,
                        entry,
                    }
                }
                NodeKind::Seq(seq) => {
                    let index: usize = segment.parse().ok()?;
                    let item = seq.children.get(index)?;
                    Slot::Item {
                        parent,
                        index,
                        item,
                    }
                }
                _ => return None,
            };
        }

        Some(slot)
    }
}

/// Splits a dotted path into segments; the empty path has none.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Content,
    /// `---`, `...` and `%` directives.
    Marker,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    /// Exclusive, before the line break.
    end: usize,
    indent: usize,
    kind: LineKind,
}

impl Line {
    fn content_start(&self) -> usize {
        self.start + self.indent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Root,
    MapValue,
    SeqItem,
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    lines: Vec<Line>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, DocumentError> {
        let mut lines = Vec::new();
        let mut start = 0;
        for raw in text.split_inclusive('\n') {
            let body = raw.trim_end_matches('\n').trim_end_matches('\r');
            let end = start + body.len();
            let indent = body.len() - body.trim_start_matches(' ').len();
            let trimmed = body.trim();

            let kind = if trimmed.is_empty() {
                LineKind::Blank
            } else if trimmed.starts_with('#') {
                LineKind::Comment
            } else if indent == 0 && (body.starts_with('%') || is_document_marker(body)) {
                LineKind::Marker
            } else {
                LineKind::Content
            };

            if kind == LineKind::Marker && !body.starts_with('%') {
                let rest = body[3..].trim();
                if !rest.is_empty() && !rest.starts_with('#') {
                    return Err(DocumentError::Unsupported {
                        offset: start,
                        message: "content after a document marker".into(),
                    });
                }
            }

            lines.push(Line {
                start,
                end,
                indent,
                kind,
            });
            start += raw.len();
        }

        Ok(Parser {
            text,
            bytes: text.as_bytes(),
            lines,
        })
    }

    fn unsupported(&self, offset: usize, message: &str) -> DocumentError {
        DocumentError::Unsupported {
            offset,
            message: message.to_string(),
        }
    }

    /// Index of the line containing `offset` (a line's end offset belongs to it).
    fn line_of(&self, offset: usize) -> usize {
        match self.lines.binary_search_by(|line| line.start.cmp(&offset)) {
            Ok(index) => index,
            Err(index) => index.saturating_sub(1),
        }
    }

    fn next_content(&self, from: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&i| self.lines[i].kind == LineKind::Content)
    }

    fn is_dash_at(&self, offset: usize) -> bool {
        self.bytes.get(offset) == Some(&b'-')
            && matches!(self.bytes.get(offset + 1), None | Some(b' ' | b'\t' | b'\n' | b'\r'))
    }

    fn is_dash_line(&self, line: usize) -> bool {
        self.is_dash_at(self.lines[line].content_start())
    }

    fn skip_spaces(&self, mut offset: usize, limit: usize) -> usize {
        while offset < limit && matches!(self.bytes[offset], b' ' | b'\t') {
            offset += 1;
        }
        offset
    }

    /// True when only whitespace or a comment remains between `offset` and `limit`.
    fn only_trivia(&self, offset: usize, limit: usize) -> bool {
        let offset = self.skip_spaces(offset, limit);
        offset >= limit || self.bytes[offset] == b'#'
    }

    /// A block node whose first token sits at `column` of `line`.
    fn parse_block_at(
        &self,
        line: usize,
        column: usize,
        parent_indent: isize,
    ) -> Result<Node, DocumentError> {
        let offset = self.lines[line].start + column;
        if self.is_dash_at(offset) {
            self.parse_block_seq(line, column)
        } else if self.parse_key(offset, self.lines[line].end)?.is_some() {
            self.parse_block_map(line, column)
        } else {
            self.parse_inline(offset, parent_indent, Context::Root)
        }
    }

    fn parse_block_map(&self, first_line: usize, column: usize) -> Result<Node, DocumentError> {
        let mut entries: Vec<Entry> = Vec::new();
        let mut line = first_line;

        loop {
            let key_start = self.lines[line].start + column;
            let Some((key, key_span, colon)) = self.parse_key(key_start, self.lines[line].end)?
            else {
                return Err(self.unsupported(key_start, "expected a mapping key"));
            };
            let colon_end = colon + 1;
            let value = self.parse_value(colon_end, column as isize, Context::MapValue)?;
            let last_line = self.line_of(value.span.end.max(colon_end));

            entries.push(Entry {
                key,
                key_span,
                colon_end,
                value,
            });

            let Some(next) = self.next_content(last_line + 1) else {
                break;
            };
            let indent = self.lines[next].indent;
            if indent < column || (indent == column && self.is_dash_line(next)) {
                break;
            }
            if indent > column {
                return Err(self.unsupported(
                    self.lines[next].content_start(),
                    "unexpected indentation inside a mapping",
                ));
            }
            line = next;
        }

        let start = entries[0].key_span.start;
        let end = entries.last().map(|entry| entry.span().end).unwrap_or(start);
        Ok(Node {
            span: start..end,
            kind: NodeKind::Map(Collection {
                style: CollectionStyle::Block { column },
                children: entries,
            }),
        })
    }

    fn parse_block_seq(&self, first_line: usize, column: usize) -> Result<Node, DocumentError> {
        let mut items: Vec<Item> = Vec::new();
        let mut line = first_line;

        loop {
            let dash = self.lines[line].start + column;
            let value = self.parse_value(dash + 1, column as isize, Context::SeqItem)?;
            let item = Item { start: dash, value };
            let last_line = self.line_of(item.span().end);
            items.push(item);

            let Some(next) = self.next_content(last_line + 1) else {
                break;
            };
            let indent = self.lines[next].indent;
            if indent < column || (indent == column && !self.is_dash_line(next)) {
                break;
            }
            if indent > column {
                return Err(self.unsupported(
                    self.lines[next].content_start(),
                    "unexpected indentation inside a sequence",
                ));
            }
            line = next;
        }

        let start = items[0].start;
        let end = items.last().map(|item| item.span().end).unwrap_or(start);
        Ok(Node {
            span: start..end,
            kind: NodeKind::Seq(Collection {
                style: CollectionStyle::Block { column },
                children: items,
            }),
        })
    }

    /// The value following a `:` or `-` indicator at `offset`.
    fn parse_value(
        &self,
        offset: usize,
        parent_indent: isize,
        context: Context,
    ) -> Result<Node, DocumentError> {
        let line = self.line_of(offset);
        let line_end = self.lines[line].end;
        let mut cursor = self.skip_spaces(offset, line_end);

        // anchors and tags prefix the value they annotate
        while cursor < line_end && matches!(self.bytes[cursor], b'&' | b'!') {
            while cursor < line_end && !matches!(self.bytes[cursor], b' ' | b'\t') {
                cursor += 1;
            }
            cursor = self.skip_spaces(cursor, line_end);
        }

        if !self.only_trivia(cursor, line_end) {
            return self.parse_inline(cursor, parent_indent, context);
        }

        if let Some(next) = self.next_content(line + 1) {
            let indent = self.lines[next].indent as isize;
            let same_column_seq =
                context == Context::MapValue && indent == parent_indent && self.is_dash_line(next);
            if indent > parent_indent || same_column_seq {
                return self.parse_block_at(next, indent as usize, parent_indent);
            }
        }

        Ok(Node {
            span: offset..offset,
            kind: NodeKind::Null,
        })
    }

    /// A value whose first character sits at `offset`, on the same line as
    /// its indicator (or starting a block of its own).
    fn parse_inline(
        &self,
        offset: usize,
        parent_indent: isize,
        context: Context,
    ) -> Result<Node, DocumentError> {
        let line = self.line_of(offset);
        let line_end = self.lines[line].end;
        let column = offset - self.lines[line].start;

        match self.bytes[offset] {
            b'[' | b'{' => {
                let node = FlowParser { parser: self }.node(offset)?;
                let end_line = self.lines[self.line_of(node.span.end)];
                if !self.only_trivia(node.span.end, end_line.end) {
                    return Err(self.unsupported(node.span.end, "content after a flow collection"));
                }
                Ok(node)
            }
            b'|' | b'>' => Ok(self.parse_block_scalar(offset, parent_indent)),
            b'?' if matches!(self.bytes.get(offset + 1), None | Some(b' ' | b'\n')) => {
                Err(self.unsupported(offset, "explicit mapping keys are not supported"))
            }
            _ if context == Context::SeqItem && self.is_dash_at(offset) => {
                self.parse_block_seq(line, column)
            }
            _ if context != Context::MapValue && self.parse_key(offset, line_end)?.is_some() => {
                self.parse_block_map(line, column)
            }
            b'"' | b'\'' => {
                let end = self.scan_quoted(offset)?;
                let end_line = self.lines[self.line_of(end)];
                if !self.only_trivia(end, end_line.end) {
                    return Err(self.unsupported(end, "content after a quoted scalar"));
                }
                let style = if self.bytes[offset] == b'"' {
                    ScalarStyle::DoubleQuoted
                } else {
                    ScalarStyle::SingleQuoted
                };
                Ok(Node {
                    span: offset..end,
                    kind: NodeKind::Scalar(style),
                })
            }
            _ => Ok(self.parse_plain(offset, parent_indent)),
        }
    }

    fn parse_plain(&self, offset: usize, parent_indent: isize) -> Node {
        let line = self.line_of(offset);
        let mut end = self.plain_end(offset, self.lines[line].end);

        // continuation lines are more indented than the owning key or dash
        let mut cursor = line + 1;
        while cursor < self.lines.len() {
            let next = self.lines[cursor];
            match next.kind {
                LineKind::Blank => {
                    cursor += 1;
                    continue;
                }
                LineKind::Content if next.indent as isize > parent_indent => {
                    end = self.plain_end(next.content_start(), next.end);
                    cursor += 1;
                }
                _ => break,
            }
        }

        Node {
            span: offset..end,
            kind: NodeKind::Scalar(ScalarStyle::Plain),
        }
    }

    /// End of a plain scalar on one line: before a ` #` comment, trailing
    /// whitespace trimmed.
    fn plain_end(&self, offset: usize, line_end: usize) -> usize {
        let mut end = line_end;
        for i in offset..line_end {
            if self.bytes[i] == b'#' && i > offset && matches!(self.bytes[i - 1], b' ' | b'\t') {
                end = i;
                break;
            }
        }
        while end > offset && matches!(self.bytes[end - 1], b' ' | b'\t') {
            end -= 1;
        }
        end
    }

    fn parse_block_scalar(&self, offset: usize, parent_indent: isize) -> Node {
        let line = self.line_of(offset);
        let header_end = self.plain_end(offset, self.lines[line].end);
        let mut end = header_end;

        for next in &self.lines[line + 1..] {
            if next.kind == LineKind::Blank {
                continue;
            }
            if next.indent as isize <= parent_indent || next.kind == LineKind::Marker {
                break;
            }
            end = next.end;
        }

        let style = if self.bytes[offset] == b'|' {
            ScalarStyle::Literal
        } else {
            ScalarStyle::Folded
        };
        Node {
            span: offset..end,
            kind: NodeKind::Scalar(style),
        }
    }

    /// End offset (exclusive) of the quoted scalar opening at `offset`.
    fn scan_quoted(&self, offset: usize) -> Result<usize, DocumentError> {
        let quote = self.bytes[offset];
        let mut i = offset + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' if quote == b'"' => i += 2,
                b'\'' if quote == b'\'' && self.bytes.get(i + 1) == Some(&b'\'') => i += 2,
                byte if byte == quote => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err(self.unsupported(offset, "unterminated quoted scalar"))
    }

    /// Recognizes `key:` at `offset`. Returns the unquoted key, its span, and
    /// the offset of the `:` indicator.
    fn parse_key(
        &self,
        offset: usize,
        line_end: usize,
    ) -> Result<Option<(String, Range<usize>, usize)>, DocumentError> {
        if offset >= line_end {
            return Ok(None);
        }

        match self.bytes[offset] {
            b'"' | b'\'' => {
                let end = self.scan_quoted(offset)?;
                if end > line_end {
                    return Ok(None);
                }
                let colon = self.skip_spaces(end, line_end);
                if colon < line_end && self.is_value_indicator(colon, line_end) {
                    let key = unquote(&self.text[offset..end]);
                    Ok(Some((key, offset..end, colon)))
                } else {
                    Ok(None)
                }
            }
            b'[' | b'{' | b'#' | b'|' | b'>' | b'&' | b'*' | b'!' => Ok(None),
            _ if self.is_dash_at(offset) => Ok(None),
            _ => {
                for i in offset..line_end {
                    match self.bytes[i] {
                        b'#' if i > offset && matches!(self.bytes[i - 1], b' ' | b'\t') => {
                            return Ok(None);
                        }
                        b':' if self.is_value_indicator(i, line_end) => {
                            let key = self.text[offset..i].trim_end();
                            let span = offset..offset + key.len();
                            return Ok(Some((key.to_string(), span, i)));
                        }
                        _ => {}
                    }
                }
                Ok(None)
            }
        }
    }

    fn is_value_indicator(&self, offset: usize, line_end: usize) -> bool {
        self.bytes[offset] == b':'
            && (offset + 1 >= line_end || matches!(self.bytes[offset + 1], b' ' | b'\t'))
    }
}

fn is_document_marker(line: &str) -> bool {
    (line.starts_with("---") || line.starts_with("..."))
        && matches!(line.as_bytes().get(3), None | Some(b' ' | b'\t'))
}

/// Interprets a quoted key the way YAML does; falls back to stripping quotes.
fn unquote(raw: &str) -> String {
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(serde_yaml::Value::String(key)) => key,
        _ => raw.trim_matches(|c| c == '"' || c == '\'').to_string(),
    }
}

/// Recursive descent over flow collections, which may span lines.
struct FlowParser<'p, 'a> {
    parser: &'p Parser<'a>,
}

impl FlowParser<'_, '_> {
    fn bytes(&self) -> &[u8] {
        self.parser.bytes
    }

    fn skip_trivia(&self, mut i: usize) -> usize {
        let bytes = self.bytes();
        while i < bytes.len() {
            match bytes[i] {
                b' ' | b'\t' | b'\n' | b'\r' => i += 1,
                b'#' => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                _ => break,
            }
        }
        i
    }

    fn expect_more(&self, i: usize) -> Result<u8, DocumentError> {
        self.bytes()
            .get(i)
            .copied()
            .ok_or_else(|| self.parser.unsupported(i, "unterminated flow collection"))
    }

    fn node(&self, offset: usize) -> Result<Node, DocumentError> {
        let start = self.skip_trivia(offset);
        match self.expect_more(start)? {
            b'[' => self.seq(start),
            b'{' => self.map(start),
            b'"' | b'\'' => {
                let end = self.parser.scan_quoted(start)?;
                let style = if self.bytes()[start] == b'"' {
                    ScalarStyle::DoubleQuoted
                } else {
                    ScalarStyle::SingleQuoted
                };
                Ok(Node {
                    span: start..end,
                    kind: NodeKind::Scalar(style),
                })
            }
            _ => Ok(Node {
                span: start..self.plain_end(start),
                kind: NodeKind::Scalar(ScalarStyle::Plain),
            }),
        }
    }

    fn plain_end(&self, start: usize) -> usize {
        let bytes = self.bytes();
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b',' | b']' | b'}' | b'\n' | b'\r' => break,
                b':' if matches!(bytes.get(i + 1), None | Some(b' ' | b',' | b'}' | b']' | b'\n')) => {
                    break
                }
                b'#' if i > start && matches!(bytes[i - 1], b' ' | b'\t') => break,
                _ => i += 1,
            }
        }
        while i > start && matches!(bytes[i - 1], b' ' | b'\t') {
            i -= 1;
        }
        i
    }

    fn seq(&self, open: usize) -> Result<Node, DocumentError> {
        let mut items = Vec::new();
        let mut i = self.skip_trivia(open + 1);

        loop {
            if self.expect_more(i)? == b']' {
                i += 1;
                break;
            }
            let value = self.node(i)?;
            i = self.skip_trivia(value.span.end);
            if self.expect_more(i)? == b':' {
                return Err(self
                    .parser
                    .unsupported(i, "single-pair mappings inside flow sequences are not supported"));
            }
            items.push(Item {
                start: value.span.start,
                value,
            });
            match self.expect_more(i)? {
                b',' => i = self.skip_trivia(i + 1),
                b']' => {
                    i += 1;
                    break;
                }
                _ => return Err(self.parser.unsupported(i, "expected ',' or ']'")),
            }
        }

        Ok(Node {
            span: open..i,
            kind: NodeKind::Seq(Collection {
                style: CollectionStyle::Flow,
                children: items,
            }),
        })
    }

    fn map(&self, open: usize) -> Result<Node, DocumentError> {
        let mut entries = Vec::new();
        let mut i = self.skip_trivia(open + 1);

        loop {
            if self.expect_more(i)? == b'}' {
                i += 1;
                break;
            }

            let key_node = self.node(i)?;
            let key_span = key_node.span.clone();
            let key = match key_node.kind {
                NodeKind::Scalar(ScalarStyle::Plain) => self.parser.text[key_span.clone()].to_string(),
                NodeKind::Scalar(_) => unquote(&self.parser.text[key_span.clone()]),
                _ => return Err(self.parser.unsupported(i, "complex flow mapping keys are not supported")),
            };

            i = self.skip_trivia(key_span.end);
            let (colon_end, value) = if self.expect_more(i)? == b':' {
                let colon_end = i + 1;
                let after = self.skip_trivia(colon_end);
                if matches!(self.expect_more(after)?, b',' | b'}') {
                    (
                        colon_end,
                        Node {
                            span: colon_end..colon_end,
                            kind: NodeKind::Null,
                        },
                    )
                } else {
                    (colon_end, self.node(after)?)
                }
            } else {
                (
                    key_span.end,
                    Node {
                        span: key_span.end..key_span.end,
                        kind: NodeKind::Null,
                    },
                )
            };

            i = self.skip_trivia(value.span.end.max(colon_end));
            entries.push(Entry {
                key,
                key_span,
                colon_end,
                value,
            });

            match self.expect_more(i)? {
                b',' => i = self.skip_trivia(i + 1),
                b'}' => {
                    i += 1;
                    break;
                }
                _ => return Err(self.parser.unsupported(i, "expected ',' or '}'")),
            }
        }

        Ok(Node {
            span: open..i,
            kind: NodeKind::Map(Collection {
                style: CollectionStyle::Flow,
                children: entries,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice<'a>(text: &'a str, node: &Node) -> &'a str {
        &text[node.span.clone()]
    }

    fn value_text<'a>(text: &'a str, tree: &DocumentTree, path: &str) -> &'a str {
        let slot = tree.locate(path).unwrap_or_else(|| panic!("missing path {path}"));
        slice(text, slot.value())
    }

    #[test]
    fn test_empty_and_comment_only_documents_have_no_root() {
        assert_eq!(DocumentTree::parse("").unwrap().root, None);
        assert_eq!(DocumentTree::parse("# just a comment\n\n").unwrap().root, None);
        assert_eq!(DocumentTree::parse("---\n# c\n").unwrap().root, None);
    }

    #[test]
    fn test_nested_block_mapping_spans() {
        let text = "meta:\n  title: Demo # trailing\n  graph-version: 1\nnodes:\n  a:\n    label: \"Start\"\n";
        let tree = DocumentTree::parse(text).unwrap();

        assert_eq!(value_text(text, &tree, "meta.title"), "Demo");
        assert_eq!(value_text(text, &tree, "meta.graph-version"), "1");
        assert_eq!(value_text(text, &tree, "nodes.a.label"), "\"Start\"");
        assert_eq!(value_text(text, &tree, "nodes.a"), "label: \"Start\"");
        assert!(tree.locate("nodes.b").is_none());
        assert!(tree.locate("meta.title.x").is_none());
    }

    #[test]
    fn test_block_sequences_and_compact_items() {
        let text = "edges:\n  - from: a\n    to: b\n  - from: b\n    to: c\ntags:\n- x\n- 'y'\n";
        let tree = DocumentTree::parse(text).unwrap();

        assert_eq!(value_text(text, &tree, "edges.1.to"), "c");
        assert_eq!(value_text(text, &tree, "edges.0"), "from: a\n    to: b");
        assert_eq!(value_text(text, &tree, "tags.1"), "'y'");

        let Some(Slot::Item { item, .. }) = tree.locate("edges.1") else {
            panic!("expected an item slot");
        };
        assert_eq!(&text[item.span()], "- from: b\n    to: c");
    }

    #[test]
    fn test_flow_collections() {
        let text = "edges: []\nmeta: { title: Demo, tags: [a, \"b c\"] }\nempty:\n";
        let tree = DocumentTree::parse(text).unwrap();

        let edges = tree.locate("edges").unwrap().value();
        assert_eq!(edges.style(), Some(CollectionStyle::Flow));
        assert_eq!(edges.items().map(|items| items.len()), Some(0));
        assert_eq!(value_text(text, &tree, "meta.title"), "Demo");
        assert_eq!(value_text(text, &tree, "meta.tags.1"), "\"b c\"");
        assert_eq!(tree.locate("empty").unwrap().value().kind, NodeKind::Null);
    }

    #[test]
    fn test_block_scalars_and_multiline_plain() {
        let text = "a:\n  description: |\n    line one\n    # not a comment\n\n  next: plain\n    continued\nb: 2\n";
        let tree = DocumentTree::parse(text).unwrap();

        assert_eq!(
            value_text(text, &tree, "a.description"),
            "|\n    line one\n    # not a comment"
        );
        assert_eq!(value_text(text, &tree, "a.next"), "plain\n    continued");
        assert_eq!(value_text(text, &tree, "b"), "2");
    }

    #[test]
    fn test_quoted_keys_anchors_and_urls() {
        let text = "\"odd key\": &anchor value\nurl: http://example.com:8080/x\n";
        let tree = DocumentTree::parse(text).unwrap();

        assert_eq!(value_text(text, &tree, "odd key"), "value");
        assert_eq!(value_text(text, &tree, "url"), "http://example.com:8080/x");
    }

    #[test]
    fn test_explicit_keys_are_unsupported() {
        let result = DocumentTree::parse("? complex\n: value\n");
        assert!(matches!(result, Err(DocumentError::Unsupported { .. })));
    }
}
