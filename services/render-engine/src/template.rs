//! Template contract
//!
//! A template maps a data structure to a markup fragment. Renderers build a
//! serializable view, encode it to a `serde_json::Value` and hand it over;
//! template failures are opaque and bubble up unchanged.
//!
//! [`PlaceholderTemplate`] substitutes `{{ path.to.field }}` placeholders
//! with values looked up in the data.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::RenderError;

/// Errors raised by a template engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unable to load template {path}: {message}")]
    Load { path: String, message: String },

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),

    #[error("template field not found: {0}")]
    MissingField(String),

    #[error("{0}")]
    Failed(String),
}

/// Turns template data into a markup fragment.
pub trait Template: Send + Sync {
    fn render_with(&self, data: &Value) -> Result<String, TemplateError>;
}

/// Encode `view` and render it through `template`.
pub fn render_view<T: Serialize>(template: &dyn Template, view: &T) -> Result<String, RenderError> {
    let data = serde_json::to_value(view)?;
    Ok(template.render_with(&data)?)
}

/// Template with `{{ field }}` placeholders resolved against JSON data.
///
/// Dotted paths descend into objects (`{{ anchor.x }}`). Strings are inserted
/// verbatim, other scalars in their JSON form, `null` as an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderTemplate {
    source: String,
}

impl PlaceholderTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Load template source from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map(Self::new)
            .map_err(|e| TemplateError::Load {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Template for PlaceholderTemplate {
    fn render_with(&self, data: &Value) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or(TemplateError::Unterminated(offset + start))?;

            let path = after_open[..end].trim();
            let value = lookup(data, path).ok_or_else(|| TemplateError::MissingField(path.to_string()))?;
            push_value(&mut out, value);

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() || path == "." {
        return Some(data);
    }
    path.split('.').try_fold(data, |value, key| match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitutes_nested_fields() {
        let tmpl = PlaceholderTemplate::new(r#"{"x": {{anchor.x}}, "text": "{{ name }}"}"#);
        let out = tmpl
            .render_with(&json!({"anchor": {"x": 120, "y": 4}, "name": "Kitchen"}))
            .unwrap();
        assert_eq!(out, r#"{"x": 120, "text": "Kitchen"}"#);
    }

    #[test]
    fn test_whole_value_placeholder() {
        let tmpl = PlaceholderTemplate::new("[{{ . }}]");
        assert_eq!(tmpl.render_with(&json!("2024-01-01")).unwrap(), "[2024-01-01]");
    }

    #[test]
    fn test_missing_field_fails() {
        let tmpl = PlaceholderTemplate::new("{{ missing }}");
        assert_eq!(
            tmpl.render_with(&json!({})),
            Err(TemplateError::MissingField("missing".to_string()))
        );
    }

    #[test]
    fn test_unterminated_placeholder_fails() {
        let tmpl = PlaceholderTemplate::new("abc {{ name");
        assert_eq!(
            tmpl.render_with(&json!({"name": "x"})),
            Err(TemplateError::Unterminated(4))
        );
    }

    #[test]
    fn test_null_renders_empty_and_bools_render_as_json() {
        let tmpl = PlaceholderTemplate::new("<{{a}}|{{b}}>");
        assert_eq!(tmpl.render_with(&json!({"a": null, "b": true})).unwrap(), "<|true>");
    }

    #[test]
    fn test_from_missing_file() {
        let err = PlaceholderTemplate::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, TemplateError::Load { .. }));
    }

    #[test]
    fn test_render_view_encodes_struct() {
        #[derive(Serialize)]
        struct View {
            period: String,
        }
        let tmpl = PlaceholderTemplate::new("{{period}}");
        let out = render_view(&tmpl, &View { period: "2024-02".to_string() }).unwrap();
        assert_eq!(out, "2024-02");
    }
}
