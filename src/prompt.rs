//! Prompt templates with a validated placeholder contract.
//!
//! A template must contain the `{log_json}` placeholder exactly where the
//! serialized chunk goes, and nothing that looks like another placeholder.
//! Both are checked when the template is constructed — a bad template is a
//! configuration error caught during pipeline setup, never a runtime
//! formatting surprise halfway through a paid run.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// The one recognized placeholder: replaced with the chunk's serialized form.
pub const LOG_PLACEHOLDER: &str = "{log_json}";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\}").expect("invalid placeholder regex"));

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read prompt template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt template {name}: missing required placeholder {LOG_PLACEHOLDER}")]
    MissingPlaceholder { name: String },

    #[error("prompt template {name}: unrecognized placeholder {found}")]
    UnknownPlaceholder { name: String, found: String },
}

/// A validated prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    text: String,
}

impl PromptTemplate {
    /// Validate and wrap template text.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Result<Self, TemplateError> {
        let name = name.into();
        let text = text.into();

        if !text.contains(LOG_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder { name });
        }
        for m in PLACEHOLDER.find_iter(&text) {
            if m.as_str() != LOG_PLACEHOLDER {
                return Err(TemplateError::UnknownPlaceholder {
                    name,
                    found: m.as_str().to_string(),
                });
            }
        }

        Ok(Self { name, text })
    }

    /// Load and validate a template file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(path.display().to_string(), text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitute the serialized chunk into the placeholder.
    pub fn render(&self, log_json: &str) -> String {
        self.text.replace(LOG_PLACEHOLDER, log_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_chunk() {
        let t = PromptTemplate::new("t", "Review these events:\n{log_json}\nFlag anything odd.")
            .unwrap();
        let rendered = t.render("[{\"LineNumber\":1}]");
        assert!(rendered.contains("[{\"LineNumber\":1}]"));
        assert!(!rendered.contains(LOG_PLACEHOLDER));
    }

    #[test]
    fn missing_placeholder_rejected() {
        let err = PromptTemplate::new("t", "no placeholder here").unwrap_err();
        assert!(matches!(err, TemplateError::MissingPlaceholder { .. }));
    }

    #[test]
    fn unknown_placeholder_rejected() {
        let err =
            PromptTemplate::new("t", "events: {log_json} and also {md_content}").unwrap_err();
        match err {
            TemplateError::UnknownPlaceholder { found, .. } => {
                assert_eq!(found, "{md_content}");
            }
            other => panic!("expected UnknownPlaceholder, got {other:?}"),
        }
    }

    #[test]
    fn json_braces_in_template_are_not_placeholders() {
        // An example record in the instructions contains braces but no
        // identifier-shaped placeholder.
        let t = PromptTemplate::new(
            "t",
            "Respond with records like {\"LineNumber\": 1, ...}\n\n{log_json}",
        );
        assert!(t.is_ok());
    }
}
