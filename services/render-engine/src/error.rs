//! Error taxonomy for the render engine
//!
//! - `SourceUnavailable`: the event source could not serve a fetch. Non-fatal
//!   during bootstrap; state stays as it was.
//! - `NoDataYet`: a renderer was asked for content before its first event.
//! - `Template`: the template engine failed; propagated verbatim.
//! - `Composition`: the compositor could not assemble a usable response.

use thiserror::Error;

use crate::source::SourceError;
use crate::template::TemplateError;

/// Top-level render error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("event source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("no {what} available")]
    NoDataYet { what: &'static str },

    #[error("template rendering failed: {0}")]
    Template(#[from] TemplateError),

    #[error("unable to encode template data: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("composition failed: {0}")]
    Composition(#[from] CompositionError),
}

/// Reasons a composed response could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// Every item renderer produced nothing, or failed before producing anything.
    #[error("no content produced for node {node_id}")]
    NoContent {
        node_id: String,
        /// Messages of item renderers that failed along the way
        failures: Vec<String>,
    },

    /// Some content was produced, but at least one item renderer failed.
    #[error("{} item renderer(s) failed for node {node_id}: {}", failures.len(), failures.join("; "))]
    ItemFailures {
        node_id: String,
        failures: Vec<String>,
    },
}

impl RenderError {
    /// Whether this error means the compositor produced nothing usable.
    pub fn is_composition_failure(&self) -> bool {
        matches!(self, RenderError::Composition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_display() {
        let err = RenderError::NoDataYet {
            what: "billing report",
        };
        assert_eq!(err.to_string(), "no billing report available");
        assert!(!err.is_composition_failure());
    }

    #[test]
    fn test_item_failures_display() {
        let err = CompositionError::ItemFailures {
            node_id: "Display1".to_string(),
            failures: vec!["boom".to_string(), "bang".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "2 item renderer(s) failed for node Display1: boom; bang"
        );
    }

    #[test]
    fn test_composition_wraps_into_render_error() {
        let err: RenderError = CompositionError::NoContent {
            node_id: "Display1".to_string(),
            failures: vec![],
        }
        .into();
        assert!(err.is_composition_failure());
        assert_eq!(
            err.to_string(),
            "composition failed: no content produced for node Display1"
        );
    }
}
