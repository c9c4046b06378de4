//! Rendering `serde_yaml` values as YAML text for insertion into a document.

use itertools::Itertools;
use serde_yaml::Value;

use super::cst::ScalarStyle;

/// Characters that change meaning at the start of a plain scalar.
const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

const FLOW_INDICATORS: &[char] = &[',', '[', ']', '{', '}'];

fn spaces(count: usize) -> String {
    " ".repeat(count)
}

/// A scalar rendered on one line, or `None` for collections.
///
/// `preferred` carries the quoting style of the value being replaced so that
/// edits keep a document's existing quoting.
pub fn scalar(value: &Value, preferred: Option<ScalarStyle>) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(string(text, preferred, false)),
        Value::Tagged(tagged) => scalar(&tagged.value, preferred),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn string(text: &str, preferred: Option<ScalarStyle>, in_flow: bool) -> String {
    if text.contains(['\n', '\r']) {
        return double_quoted(text);
    }
    match preferred {
        Some(ScalarStyle::DoubleQuoted) => double_quoted(text),
        Some(ScalarStyle::SingleQuoted) => format!("'{}'", text.replace('\'', "''")),
        _ if needs_quotes(text, in_flow) => double_quoted(text),
        _ => text.to_string(),
    }
}

fn needs_quotes(text: &str, in_flow: bool) -> bool {
    if text.is_empty() || text != text.trim() || text.starts_with(INDICATORS) {
        return true;
    }
    if text.contains(": ") || text.contains(" #") || text.ends_with(':') || text.contains('\t') {
        return true;
    }
    if in_flow && text.contains(FLOW_INDICATORS) {
        return true;
    }
    // anything YAML would read back as a number, boolean or null
    !matches!(serde_yaml::from_str::<Value>(text), Ok(Value::String(ref read)) if read == text)
}

fn double_quoted(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\x{:02x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Single-line rendering: scalars and empty collections.
pub fn inline(value: &Value, preferred: Option<ScalarStyle>) -> Option<String> {
    match value {
        Value::Sequence(items) if items.is_empty() => Some("[]".to_string()),
        Value::Mapping(map) if map.is_empty() => Some("{}".to_string()),
        Value::Tagged(tagged) => inline(&tagged.value, preferred),
        _ => scalar(value, preferred),
    }
}

/// Flow-style rendering for insertion into `[...]` or `{...}`.
pub fn flow(value: &Value) -> String {
    match value {
        Value::String(text) => string(text, None, true),
        Value::Sequence(items) => format!("[{}]", items.iter().map(flow).join(", ")),
        Value::Mapping(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(key, value)| format!("{}: {}", flow(key), flow(value)))
                .join(", ")
        ),
        Value::Tagged(tagged) => flow(&tagged.value),
        other => scalar(other, None).unwrap_or_default(),
    }
}

/// A mapping key.
pub fn key(key: &Value) -> String {
    match key {
        Value::String(text) => string(text, None, false),
        other => inline(other, None).unwrap_or_else(|| flow(other)),
    }
}

/// Text following `key:` for a value whose key sits at `key_column`.
pub fn entry_value(value: &Value, key_column: usize, indent: usize) -> String {
    match inline(value, None) {
        Some(text) => format!(" {text}"),
        None => {
            let column = key_column + indent;
            format!("\n{}{}", spaces(column), body(value, column, indent))
        }
    }
}

/// A collection whose first line starts at `column` (the cursor is already
/// there); following lines are indented to `column`.
pub fn body(value: &Value, column: usize, indent: usize) -> String {
    let separator = format!("\n{}", spaces(column));
    match value {
        Value::Mapping(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| format!("{}:{}", key(k), entry_value(v, column, indent)))
            .join(&separator),
        Value::Sequence(items) if !items.is_empty() => items
            .iter()
            .map(|item| seq_item(item, column, indent))
            .join(&separator),
        Value::Tagged(tagged) => body(&tagged.value, column, indent),
        other => inline(other, None).unwrap_or_default(),
    }
}

/// A block sequence item, starting with its `-` at `dash_column`.
pub fn seq_item(value: &Value, dash_column: usize, indent: usize) -> String {
    match inline(value, None) {
        Some(text) => format!("- {text}"),
        None => format!("- {}", body(value, dash_column + 2, indent)),
    }
}
