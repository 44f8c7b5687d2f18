use std::sync::Arc;

use render_engine::compositor::ResponseCompositor;
use render_engine::config::DisplayConfig;
use render_engine::metrics::RenderMetrics;
use render_engine::renderer::{ErrorRenderer, ItemRenderer};
use render_engine::source::MemorySource;
use types::ids::NodeId;

use crate::renderers::Renderers;
use crate::templates::Templates;

#[derive(Clone)]
pub struct AppState {
    pub renderers: Renderers,
    pub displays: Arc<DisplayConfig>,
    pub templates: Templates,
    pub metrics: Arc<RenderMetrics>,
    pub source: Arc<MemorySource>,
    pub minify: bool,
}

impl AppState {
    pub fn new(
        renderers: Renderers,
        displays: DisplayConfig,
        templates: Templates,
        metrics: Arc<RenderMetrics>,
        source: Arc<MemorySource>,
        minify: bool,
    ) -> Self {
        Self {
            renderers,
            displays: Arc::new(displays),
            templates,
            metrics,
            source,
            minify,
        }
    }

    /// Full response for a display node.
    pub fn compositor(&self, node_id: NodeId) -> ResponseCompositor {
        ResponseCompositor::new(self.templates.response.clone(), node_id, self.renderers.items())
            .with_metrics(self.metrics.clone())
    }

    /// Response showing `message` in place of the regular items.
    pub fn error_compositor(&self, node_id: NodeId, message: &str) -> ResponseCompositor {
        let items: Vec<Arc<dyn ItemRenderer>> = vec![
            Arc::new(ErrorRenderer::new(self.templates.error.clone(), node_id.clone(), message)),
            self.renderers.timestamp.clone(),
        ];
        ResponseCompositor::new(self.templates.response.clone(), node_id, items)
            .with_metrics(self.metrics.clone())
    }
}
