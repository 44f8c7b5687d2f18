//! Response compositor
//!
//! Runs an ordered list of item renderers, joins their fragments with `,`
//! and wraps the result into the outer response template together with a
//! fresh render id and the node id.
//!
//! Failure policy:
//! - every item renderer runs, even after an earlier one failed;
//! - nothing joined ⇒ [`CompositionError::NoContent`];
//! - otherwise any item failure ⇒ [`CompositionError::ItemFailures`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use types::ids::{NodeId, RenderId};
use types::layout::Size;

use crate::error::{CompositionError, RenderError};
use crate::metrics::RenderMetrics;
use crate::renderer::ItemRenderer;
use crate::template::{render_view, Template};

/// Separator between item fragments.
pub const FRAGMENT_DELIMITER: char = ',';

#[derive(Serialize)]
struct ResponseData {
    render_id: String,
    node_id: String,
    items: String,
}

/// Assembles the full response for one display node.
pub struct ResponseCompositor {
    template: Arc<dyn Template>,
    node_id: NodeId,
    items: Vec<Arc<dyn ItemRenderer>>,
    metrics: Arc<RenderMetrics>,
}

impl ResponseCompositor {
    /// Footprint of the 7.5" panel.
    pub const SIZE: Size = Size {
        height: 528,
        width: 880,
    };

    pub fn new(template: Arc<dyn Template>, node_id: NodeId, items: Vec<Arc<dyn ItemRenderer>>) -> Self {
        Self {
            template,
            node_id,
            items,
            metrics: Arc::new(RenderMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RenderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Run every item renderer and join what they produced.
    pub fn collect_items(&self) -> Result<String, CompositionError> {
        let mut fragments = Vec::with_capacity(self.items.len());
        let mut failures = Vec::new();

        for (position, item) in self.items.iter().enumerate() {
            match item.content() {
                Ok(fragment) => {
                    self.metrics.record_render(true);
                    fragments.push(fragment);
                }
                Err(err) => {
                    self.metrics.record_render(false);
                    warn!(node = %self.node_id, position, error = %err, "Item renderer failed");
                    failures.push(err.to_string());
                }
            }
        }

        let joined = join_fragments(&fragments);
        if joined.is_empty() {
            return Err(CompositionError::NoContent {
                node_id: self.node_id.to_string(),
                failures,
            });
        }
        if !failures.is_empty() {
            return Err(CompositionError::ItemFailures {
                node_id: self.node_id.to_string(),
                failures,
            });
        }
        Ok(joined)
    }
}

#[async_trait]
impl ItemRenderer for ResponseCompositor {
    fn content(&self) -> Result<String, RenderError> {
        let started = Instant::now();
        let result = self.collect_items().map_err(RenderError::from).and_then(|items| {
            let data = ResponseData {
                render_id: RenderId::new().to_string(),
                node_id: self.node_id.to_string(),
                items,
            };
            render_view(self.template.as_ref(), &data)
        });

        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.metrics.record_composition(result.is_ok(), elapsed_us);
        debug!(node = %self.node_id, ok = result.is_ok(), elapsed_us, "Response composed");
        result
    }

    fn size(&self) -> Size {
        Self::SIZE
    }
}

/// Join fragments with a single delimiter.
///
/// Surrounding whitespace and delimiters are stripped from each fragment and
/// empty fragments are skipped, so the result never starts or ends with a
/// delimiter and never doubles one at a seam.
pub fn join_fragments<S: AsRef<str>>(fragments: &[S]) -> String {
    fragments
        .iter()
        .map(|fragment| {
            fragment
                .as_ref()
                .trim_matches(|c: char| c == FRAGMENT_DELIMITER || c.is_whitespace())
        })
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
