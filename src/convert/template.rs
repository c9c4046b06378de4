//! Placeholder templates and Mermaid-safe text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::Value;

/// `{name}` placeholders. Mermaid's own brace shapes (`{"..."}`, `{{...}}`)
/// never match because their contents start with a quote or brace.
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_\-\.]+)\}").unwrap());

/// Values substituted into one template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Adds every scalar field of `element`, escaped for labels.
    pub fn set_fields(&mut self, element: &Value) -> &mut Self {
        if let Value::Mapping(map) = element {
            for (key, value) in map {
                if let (Some(key), Some(text)) = (scalar_text(key), scalar_text(value)) {
                    self.values.insert(key, escape_label(&text));
                }
            }
        }
        self
    }

    /// Replaces known placeholders; unknown ones are left as written.
    pub fn render(&self, template: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &Captures| match self.values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Text of a scalar value; `None` for null and collections.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// The scalar text of `element[field]`, ignoring empty strings.
pub fn field_text(element: &Value, field: &str) -> Option<String> {
    element
        .get(field)
        .and_then(scalar_text)
        .filter(|text| !text.trim().is_empty())
}

/// A Mermaid node id: `[A-Za-z0-9_]` only. `end` is a Mermaid keyword and
/// gets a suffix.
pub fn sanitize_id(id: &str) -> String {
    let mut sanitized: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        sanitized.push('_');
    }
    if sanitized.eq_ignore_ascii_case("end") {
        sanitized.push('_');
    }
    sanitized
}

/// Label text safe inside a quoted Mermaid label.
pub fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_placeholders() {
        let mut vars = TemplateVars::new();
        vars.set("id", "start").set("label", "Start");
        assert_eq!(vars.render(r#"{id}(["{label}"])"#), r#"start(["Start"])"#);
        assert_eq!(vars.render("{id} --> {missing}"), "start --> {missing}");
    }

    #[test]
    fn test_mermaid_braces_are_not_placeholders() {
        let mut vars = TemplateVars::new();
        vars.set("id", "check").set("label", "Ok?");
        assert_eq!(vars.render(r#"{id}{"{label}"}"#), r#"check{"Ok?"}"#);
        assert_eq!(vars.render(r#"{id}{{"{label}"}}"#), r#"check{{"Ok?"}}"#);
    }

    #[test]
    fn test_set_fields_uses_scalars_only() {
        let element: Value =
            serde_yaml::from_str("owner: \"Ana \\\"A\\\"\"\nweight: 3\ntags: [a]\nnote: null\n")
                .unwrap();
        let mut vars = TemplateVars::new();
        vars.set_fields(&element);
        assert_eq!(vars.get("owner"), Some("Ana #quot;A#quot;"));
        assert_eq!(vars.get("weight"), Some("3"));
        assert_eq!(vars.get("tags"), None);
        assert_eq!(vars.get("note"), None);
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("start"), "start");
        assert_eq!(sanitize_id("step-2.b"), "step_2_b");
        assert_eq!(sanitize_id("end"), "end_");
        assert_eq!(sanitize_id("End"), "End_");
        assert_eq!(sanitize_id(""), "_");
    }

    #[test]
    fn test_field_text_skips_blank_values() {
        let element: Value = serde_yaml::from_str("label: ''\nname: Build\n").unwrap();
        assert_eq!(field_text(&element, "label"), None);
        assert_eq!(field_text(&element, "name"), Some("Build".to_string()));
        assert_eq!(field_text(&element, "missing"), None);
    }
}
